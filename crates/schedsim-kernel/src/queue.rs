//! FIFO ready queue.
//!
//! Holds process records in the scheduler's queues and mutex records in the
//! killed-resource queue. Items are moved in and out; a record sitting in a
//! queue is owned by that queue.

use std::collections::VecDeque;

#[derive(Debug)]
pub struct ReadyQueue<T> {
    items: VecDeque<T>,
}

impl<T> Default for ReadyQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> ReadyQueue<T> {
    pub fn new() -> Self {
        Self {
            items: VecDeque::new(),
        }
    }

    pub fn enqueue(&mut self, item: T) {
        self.items.push_back(item);
    }

    pub fn dequeue(&mut self) -> Option<T> {
        self.items.pop_front()
    }

    pub fn peek(&self) -> Option<&T> {
        self.items.front()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn contains_by(&self, pred: impl FnMut(&T) -> bool) -> bool {
        self.items.iter().any(pred)
    }

    /// Removes the first item matching `pred`, keeping the order of the rest.
    pub fn remove_matching(&mut self, pred: impl FnMut(&T) -> bool) -> Option<T> {
        let pos = self.items.iter().position(pred)?;
        self.items.remove(pos)
    }

    /// Detaches every item, front to back.
    pub fn drain(&mut self) -> impl Iterator<Item = T> + '_ {
        self.items.drain(..)
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.items.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut T> {
        self.items.iter_mut()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fifo_order() {
        let mut q = ReadyQueue::new();
        assert!(q.dequeue().is_none());
        q.enqueue(1);
        q.enqueue(2);
        q.enqueue(3);
        assert_eq!(q.peek(), Some(&1));
        assert_eq!(q.len(), 3);
        assert_eq!(q.dequeue(), Some(1));
        assert_eq!(q.dequeue(), Some(2));
        assert_eq!(q.dequeue(), Some(3));
        assert!(q.is_empty());
        assert!(q.peek().is_none());
    }

    #[test]
    fn remove_matching_keeps_order() {
        let mut q = ReadyQueue::new();
        for i in 0..5 {
            q.enqueue(i);
        }
        assert_eq!(q.remove_matching(|&i| i == 2), Some(2));
        assert_eq!(q.remove_matching(|&i| i == 9), None);
        assert_eq!(q.len(), 4);
        assert_eq!(q.drain().collect::<Vec<_>>(), vec![0, 1, 3, 4]);
        assert!(q.is_empty());
    }
}

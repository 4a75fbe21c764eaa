//! Multi-level feedback queue.
//!
//! `NUM_PRIORITIES` ready queues, each with its own quantum. Level 0 is the
//! highest priority and has the smallest quantum. A record's `priority`
//! always names the level it sits in.

use crate::config::NUM_PRIORITIES;
use crate::process::ProcessControlBlock;
use crate::queue::ReadyQueue;
use crate::types::ProcessId;
use core::fmt;

pub struct Mlfq {
    levels: [ReadyQueue<ProcessControlBlock>; NUM_PRIORITIES],
    quanta: [u64; NUM_PRIORITIES],
}

impl Mlfq {
    pub fn new(quanta: [u64; NUM_PRIORITIES]) -> Self {
        Self {
            levels: core::array::from_fn(|_| ReadyQueue::new()),
            quanta,
        }
    }

    /// Enqueues into the level named by the record's priority.
    pub fn enqueue(&mut self, mut pcb: ProcessControlBlock) {
        pcb.assign_priority(pcb.priority);
        self.levels[pcb.priority].enqueue(pcb);
    }

    /// Head of the highest-priority non-empty level.
    pub fn dequeue(&mut self) -> Option<ProcessControlBlock> {
        self.levels.iter_mut().find_map(ReadyQueue::dequeue)
    }

    pub fn peek(&self) -> Option<&ProcessControlBlock> {
        self.levels.iter().find_map(ReadyQueue::peek)
    }

    pub fn is_empty(&self) -> bool {
        self.levels.iter().all(ReadyQueue::is_empty)
    }

    pub fn len(&self) -> usize {
        self.levels.iter().map(ReadyQueue::len).sum()
    }

    pub fn level_len(&self, level: usize) -> usize {
        self.levels.get(level).map_or(0, ReadyQueue::len)
    }

    /// Quantum of the first non-empty level.
    pub fn next_quantum(&self) -> Option<u64> {
        self.levels
            .iter()
            .position(|level| !level.is_empty())
            .map(|level| self.quanta[level])
    }

    /// Linear search of every level for `pid`.
    pub fn remove_matching(&mut self, pid: ProcessId) -> Option<ProcessControlBlock> {
        self.levels
            .iter_mut()
            .find_map(|level| level.remove_matching(|pcb| pcb.pid == pid))
    }

    pub fn contains(&self, pid: ProcessId) -> bool {
        self.levels
            .iter()
            .any(|level| level.contains_by(|pcb| pcb.pid == pid))
    }

    /// Aging: appends every level below the top to level 0, in level order,
    /// resetting priorities to 0. Returns `false` if there was nothing queued.
    pub fn reset(&mut self) -> bool {
        if self.is_empty() {
            return false;
        }
        let (top, rest) = self.levels.split_at_mut(1);
        for level in rest.iter_mut() {
            for mut pcb in level.drain() {
                pcb.priority = 0;
                top[0].enqueue(pcb);
            }
        }
        true
    }

    /// Detaches everything, highest priority first.
    pub fn drain(&mut self) -> Vec<ProcessControlBlock> {
        self.levels
            .iter_mut()
            .flat_map(|level| level.drain().collect::<Vec<_>>())
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ProcessControlBlock> {
        self.levels.iter().flat_map(|level| level.iter())
    }
}

impl fmt::Display for Mlfq {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, level) in self.levels.iter().enumerate() {
            write!(f, "Q{:2} (quantum {:5}):", i, self.quanta[i])?;
            for pcb in level.iter() {
                write!(f, " {}", pcb.pid)?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

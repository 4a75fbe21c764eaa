//! Fixed-capacity resource table keyed by resource id.
//!
//! Open addressing with linear probing. Each slot also remembers whether a
//! probe ever had to step past it; lookups stop only at a slot that is empty
//! and was never stepped past, so removals do not cut probe chains.

use super::Mutex;
use crate::error::ResourceTableError;
use crate::types::ResourceId;
use core::fmt;

pub struct ResourceTable {
    slots: Vec<Option<Mutex>>,
    collided: Vec<bool>,
    len: usize,
}

impl ResourceTable {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            slots: (0..capacity).map(|_| None).collect(),
            collided: vec![false; capacity],
            len: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    fn canonical(&self, id: ResourceId) -> usize {
        id.val() as usize % self.capacity()
    }

    fn probe(&self, id: ResourceId) -> impl Iterator<Item = usize> {
        let start = self.canonical(id);
        let capacity = self.capacity();
        (0..capacity).map(move |step| (start + step) % capacity)
    }

    fn find(&self, id: ResourceId) -> Option<usize> {
        for idx in self.probe(id) {
            match &self.slots[idx] {
                Some(mutex) if mutex.id == id => return Some(idx),
                None if !self.collided[idx] => return None,
                _ => {}
            }
        }
        None
    }

    /// Stores `mutex` under its own id.
    pub fn insert(&mut self, mutex: Mutex) -> Result<(), ResourceTableError> {
        if self.find(mutex.id).is_some() {
            return Err(ResourceTableError::AlreadyPresent(mutex.id));
        }
        let start = self.canonical(mutex.id);
        let slot = self.probe(mutex.id).find(|&idx| self.slots[idx].is_none());
        let Some(slot) = slot else {
            return Err(ResourceTableError::Full {
                capacity: self.capacity(),
            });
        };

        // mark every slot the probe stepped over, plus the displaced one
        let mut idx = start;
        while idx != slot {
            self.collided[idx] = true;
            idx = (idx + 1) % self.capacity();
        }
        if slot != start {
            self.collided[slot] = true;
        }
        self.slots[slot] = Some(mutex);
        self.len += 1;
        Ok(())
    }

    pub fn get(&self, id: ResourceId) -> Option<&Mutex> {
        self.find(id).and_then(|idx| self.slots[idx].as_ref())
    }

    pub fn get_mut(&mut self, id: ResourceId) -> Option<&mut Mutex> {
        let idx = self.find(id)?;
        self.slots[idx].as_mut()
    }

    pub fn contains(&self, id: ResourceId) -> bool {
        self.find(id).is_some()
    }

    /// Takes the mutex out of the table. Dropping the returned value destroys it.
    pub fn remove(&mut self, id: ResourceId) -> Option<Mutex> {
        let idx = self.find(id)?;
        let mutex = self.slots[idx].take();
        if mutex.is_some() {
            self.len -= 1;
        }
        mutex
    }

    /// Slot index currently holding `id`.
    pub fn slot_of(&self, id: ResourceId) -> Option<usize> {
        self.find(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Mutex> {
        self.slots.iter().flatten()
    }

    /// Empties the table, returning every mutex it held.
    pub fn drain(&mut self) -> Vec<Mutex> {
        self.len = 0;
        self.collided.iter_mut().for_each(|c| *c = false);
        self.slots.iter_mut().filter_map(Option::take).collect()
    }
}

impl fmt::Display for ResourceTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "resource table: {}/{} slots used",
            self.len,
            self.capacity()
        )?;
        for (idx, slot) in self.slots.iter().enumerate() {
            let marker = if self.collided[idx] { "*" } else { " " };
            match slot {
                Some(mutex) => writeln!(f, "  [{:3}]{} {}", idx, marker, mutex)?,
                None if self.collided[idx] => writeln!(f, "  [{:3}]* <empty>", idx)?,
                None => {}
            }
        }
        Ok(())
    }
}

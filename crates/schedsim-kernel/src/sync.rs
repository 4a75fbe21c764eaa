pub mod resource_table;

use crate::error::SyncError;
use crate::types::{ProcessId, ResourceId};
use core::fmt;

pub use resource_table::ResourceTable;

/// Result of a lock attempt that did not fail outright.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockOutcome {
    Acquired,
    /// Held by the partner; the caller did not get the lock.
    Contended { holder: ProcessId },
}

/// Simulated condition variable: a single flag, consumed by a successful wait.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ConditionVariable {
    signaled: bool,
}

impl ConditionVariable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn signal(&mut self) {
        self.signaled = true;
    }

    /// Polls the flag. `true` means the waiter may proceed and the flag has
    /// been reset; `false` leaves the flag alone and the waiter must yield.
    pub fn wait(&mut self) -> bool {
        core::mem::take(&mut self.signaled)
    }

    pub fn is_signaled(&self) -> bool {
        self.signaled
    }
}

/// A lock shared by exactly two paired processes.
#[derive(Debug, Clone)]
pub struct Mutex {
    pub id: ResourceId,
    pub pair: [ProcessId; 2],
    pub cond: Option<ConditionVariable>,
    owner: Option<ProcessId>,
}

impl Mutex {
    pub fn new(id: ResourceId, pair: [ProcessId; 2]) -> Self {
        Self {
            id,
            pair,
            cond: None,
            owner: None,
        }
    }

    pub fn with_condition(mut self) -> Self {
        self.cond = Some(ConditionVariable::new());
        self
    }

    pub fn is_locked(&self) -> bool {
        self.owner.is_some()
    }

    pub fn owner(&self) -> Option<ProcessId> {
        self.owner
    }

    /// The other half of the pair, if `pid` belongs to it.
    pub fn partner_of(&self, pid: ProcessId) -> Option<ProcessId> {
        match self.pair {
            [a, b] if a == pid => Some(b),
            [a, b] if b == pid => Some(a),
            _ => None,
        }
    }

    fn check_paired(&self, pid: ProcessId) -> Result<(), SyncError> {
        if self.pair.contains(&pid) {
            Ok(())
        } else {
            Err(SyncError::NotPaired {
                resource: self.id,
                pid,
            })
        }
    }

    /// Never blocks: contention is reported so the scheduler can re-queue
    /// the requester instead.
    pub fn lock(&mut self, pid: ProcessId) -> Result<LockOutcome, SyncError> {
        self.check_paired(pid)?;
        match self.owner {
            Some(owner) if owner == pid => Err(SyncError::AlreadyHeld {
                resource: self.id,
                pid,
            }),
            Some(holder) => Ok(LockOutcome::Contended { holder }),
            None => {
                self.owner = Some(pid);
                Ok(LockOutcome::Acquired)
            }
        }
    }

    pub fn try_lock(&mut self, pid: ProcessId) -> bool {
        if self.owner.is_none() && self.pair.contains(&pid) {
            self.owner = Some(pid);
            true
        } else {
            false
        }
    }

    /// Clears the lock whoever holds it and returns the previous owner.
    pub fn unlock(&mut self) -> Result<ProcessId, SyncError> {
        self.owner.take().ok_or(SyncError::NotLocked(self.id))
    }
}

impl fmt::Display for Mutex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} pair=({}, {})", self.id, self.pair[0], self.pair[1])?;
        match self.owner {
            Some(owner) => write!(f, " locked by {}", owner)?,
            None => write!(f, " unlocked")?,
        }
        if let Some(cond) = &self.cond {
            write!(f, " signal={}", cond.is_signaled())?;
        }
        Ok(())
    }
}

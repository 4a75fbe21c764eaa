//! Process control block and the role model.
//!
//! A role is a sum type: each variant carries only the trap positions and
//! resource ids that make sense for it, so a compute-bound process simply has
//! no lock positions to look at.

use crate::config::NUM_PRIORITIES;
use crate::types::{ProcessId, ResourceId};
use core::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProcessState {
    New,
    Ready,
    Running,
    Interrupted,
    Waiting,
    Halted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RoleKind {
    Compute,
    IoBound,
    ProducerConsumer,
    SharedResource,
}

impl fmt::Display for RoleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RoleKind::Compute => "COMP",
            RoleKind::IoBound => "IO",
            RoleKind::ProducerConsumer => "PAIR",
            RoleKind::SharedResource => "SHARED",
        };
        f.write_str(name)
    }
}

/// Which half of a producer/consumer pair a process is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PairSide {
    Producer { signal_traps: Vec<u32> },
    Consumer { wait_traps: Vec<u32> },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Role {
    Compute,
    IoBound,
    ProducerConsumer {
        resource: ResourceId,
        side: PairSide,
        lock_traps: Vec<u32>,
        unlock_traps: Vec<u32>,
    },
    SharedResource {
        resources: [ResourceId; 2],
        lock_traps: [Vec<u32>; 2],
        unlock_traps: [Vec<u32>; 2],
    },
}

impl Role {
    pub fn kind(&self) -> RoleKind {
        match self {
            Role::Compute => RoleKind::Compute,
            Role::IoBound => RoleKind::IoBound,
            Role::ProducerConsumer { .. } => RoleKind::ProducerConsumer,
            Role::SharedResource { .. } => RoleKind::SharedResource,
        }
    }

    /// Resource ids this role is bound to, in R1, R2 order.
    pub fn resources(&self) -> Vec<ResourceId> {
        match self {
            Role::Compute | Role::IoBound => Vec::new(),
            Role::ProducerConsumer { resource, .. } => vec![*resource],
            Role::SharedResource { resources, .. } => resources.to_vec(),
        }
    }

    pub fn is_paired(&self) -> bool {
        matches!(
            self,
            Role::ProducerConsumer { .. } | Role::SharedResource { .. }
        )
    }
}

/// Synchronisation action triggered by reaching a trap position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceTrap {
    Lock(ResourceId),
    Unlock(ResourceId),
    Signal(ResourceId),
    Wait(ResourceId),
}

#[derive(Debug, Clone)]
pub struct ProcessControlBlock {
    pub pid: ProcessId,
    pub state: ProcessState,
    pub role: Role,
    /// MLFQ level, 0 is highest
    pub priority: usize,
    pub pc: u32,
    /// Length of one pass through the program
    pub max_pc: u32,
    /// Passes after which the process halts
    pub terminate: u32,
    pub term_count: u32,
    pub io_traps: [Vec<u32>; 2],
}

impl ProcessControlBlock {
    pub fn new(pid: ProcessId, role: Role, max_pc: u32, terminate: u32) -> Self {
        Self {
            pid,
            state: ProcessState::New,
            role,
            priority: 0,
            pc: 0,
            max_pc: max_pc.max(1),
            terminate,
            term_count: 0,
            io_traps: [Vec::new(), Vec::new()],
        }
    }

    pub fn with_io_traps(mut self, first: Vec<u32>, second: Vec<u32>) -> Self {
        self.io_traps = [first, second];
        self
    }

    pub fn kind(&self) -> RoleKind {
        self.role.kind()
    }

    /// Sets the priority, clamped to the lowest level.
    pub fn assign_priority(&mut self, priority: usize) {
        self.priority = priority.min(NUM_PRIORITIES - 1);
    }

    /// Priority after a timer preemption: one level lower, wrapping to the top.
    pub fn demoted_priority(&self) -> usize {
        (self.priority + 1) % NUM_PRIORITIES
    }

    /// Advances the program counter by one. Returns `true` when a full pass
    /// completed, in which case the counter wrapped to 0 and the termination
    /// counter was bumped.
    pub fn advance(&mut self) -> bool {
        self.pc += 1;
        if self.pc >= self.max_pc {
            self.pc = 0;
            if !self.is_exhausted() {
                self.term_count += 1;
            }
            return true;
        }
        false
    }

    pub fn is_exhausted(&self) -> bool {
        self.term_count >= self.terminate
    }

    /// Pins the termination counter at its threshold so the process halts on
    /// the next termination check.
    pub fn force_exhaustion(&mut self) {
        self.term_count = self.terminate;
    }

    pub fn is_io_trap(&self, pc: u32) -> bool {
        self.io_traps.iter().any(|traps| traps.contains(&pc))
    }

    pub fn lock_trap(&self, pc: u32) -> Option<ResourceId> {
        match &self.role {
            Role::ProducerConsumer {
                resource,
                lock_traps,
                ..
            } => lock_traps.contains(&pc).then_some(*resource),
            Role::SharedResource {
                resources,
                lock_traps,
                ..
            } => lock_traps
                .iter()
                .position(|traps| traps.contains(&pc))
                .map(|slot| resources[slot]),
            _ => None,
        }
    }

    pub fn unlock_trap(&self, pc: u32) -> Option<ResourceId> {
        match &self.role {
            Role::ProducerConsumer {
                resource,
                unlock_traps,
                ..
            } => unlock_traps.contains(&pc).then_some(*resource),
            Role::SharedResource {
                resources,
                unlock_traps,
                ..
            } => unlock_traps
                .iter()
                .position(|traps| traps.contains(&pc))
                .map(|slot| resources[slot]),
            _ => None,
        }
    }

    pub fn signal_trap(&self, pc: u32) -> Option<ResourceId> {
        match &self.role {
            Role::ProducerConsumer {
                resource,
                side: PairSide::Producer { signal_traps },
                ..
            } => signal_traps.contains(&pc).then_some(*resource),
            _ => None,
        }
    }

    pub fn wait_trap(&self, pc: u32) -> Option<ResourceId> {
        match &self.role {
            Role::ProducerConsumer {
                resource,
                side: PairSide::Consumer { wait_traps },
                ..
            } => wait_traps.contains(&pc).then_some(*resource),
            _ => None,
        }
    }

    /// The synchronisation action at the current program counter, if any.
    /// Lock positions win over unlock, unlock over signal, signal over wait.
    pub fn resource_trap(&self) -> Option<ResourceTrap> {
        let pc = self.pc;
        self.lock_trap(pc)
            .map(ResourceTrap::Lock)
            .or_else(|| self.unlock_trap(pc).map(ResourceTrap::Unlock))
            .or_else(|| self.signal_trap(pc).map(ResourceTrap::Signal))
            .or_else(|| self.wait_trap(pc).map(ResourceTrap::Wait))
    }
}

impl fmt::Display for ProcessControlBlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} [{}] {:?} prio={} pc={}/{} term={}/{}",
            self.pid,
            self.kind(),
            self.state,
            self.priority,
            self.pc,
            self.max_pc,
            self.term_count,
            self.terminate
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pid(n: u32) -> ProcessId {
        ProcessId::new(n).unwrap()
    }

    fn shared(r1: u32, r2: u32) -> Role {
        Role::SharedResource {
            resources: [ResourceId::new(r1), ResourceId::new(r2)],
            lock_traps: [vec![2, 20], vec![4, 22]],
            unlock_traps: [vec![8, 26], vec![6, 24]],
        }
    }

    #[test]
    fn new_process_starts_fresh() {
        let pcb = ProcessControlBlock::new(pid(1), Role::Compute, 40, 2);
        assert_eq!(pcb.state, ProcessState::New);
        assert_eq!(pcb.priority, 0);
        assert_eq!(pcb.pc, 0);
        assert_eq!(pcb.term_count, 0);
        assert_eq!(pcb.kind(), RoleKind::Compute);
    }

    #[test]
    fn priority_is_clamped() {
        let mut pcb = ProcessControlBlock::new(pid(1), Role::Compute, 40, 2);
        pcb.assign_priority(99);
        assert_eq!(pcb.priority, NUM_PRIORITIES - 1);
        pcb.assign_priority(3);
        assert_eq!(pcb.priority, 3);
    }

    #[test]
    fn demotion_wraps_past_lowest_level() {
        let mut pcb = ProcessControlBlock::new(pid(1), Role::Compute, 40, 2);
        pcb.assign_priority(NUM_PRIORITIES - 1);
        assert_eq!(pcb.demoted_priority(), 0);
        pcb.assign_priority(4);
        assert_eq!(pcb.demoted_priority(), 5);
    }

    #[test]
    fn advance_wraps_and_counts_passes() {
        let mut pcb = ProcessControlBlock::new(pid(1), Role::Compute, 3, 2);
        assert!(!pcb.advance());
        assert!(!pcb.advance());
        assert!(pcb.advance());
        assert_eq!(pcb.pc, 0);
        assert_eq!(pcb.term_count, 1);
        assert!(!pcb.is_exhausted());
        for _ in 0..3 {
            pcb.advance();
        }
        assert!(pcb.is_exhausted());
        // counter never passes its threshold
        for _ in 0..3 {
            pcb.advance();
        }
        assert_eq!(pcb.term_count, 2);
    }

    #[test]
    fn io_traps_cover_both_sets() {
        let pcb = ProcessControlBlock::new(pid(1), Role::IoBound, 100, 1)
            .with_io_traps(vec![5, 10], vec![50]);
        assert!(pcb.is_io_trap(10));
        assert!(pcb.is_io_trap(50));
        assert!(!pcb.is_io_trap(11));
    }

    #[test]
    fn shared_resource_traps_map_to_their_resource() {
        let pcb = ProcessControlBlock::new(pid(1), shared(7, 8), 40, 1);
        assert_eq!(pcb.lock_trap(2), Some(ResourceId::new(7)));
        assert_eq!(pcb.lock_trap(22), Some(ResourceId::new(8)));
        assert_eq!(pcb.unlock_trap(6), Some(ResourceId::new(8)));
        assert_eq!(pcb.unlock_trap(8), Some(ResourceId::new(7)));
        assert_eq!(pcb.signal_trap(2), None);
        assert_eq!(pcb.lock_trap(3), None);
    }

    #[test]
    fn producer_and_consumer_traps() {
        let r = ResourceId::new(3);
        let producer = ProcessControlBlock::new(
            pid(1),
            Role::ProducerConsumer {
                resource: r,
                side: PairSide::Producer {
                    signal_traps: vec![9],
                },
                lock_traps: vec![1],
                unlock_traps: vec![5],
            },
            40,
            1,
        );
        let mut consumer = producer.clone();
        consumer.role = Role::ProducerConsumer {
            resource: r,
            side: PairSide::Consumer {
                wait_traps: vec![9],
            },
            lock_traps: vec![1],
            unlock_traps: vec![5],
        };

        assert_eq!(producer.signal_trap(9), Some(r));
        assert_eq!(producer.wait_trap(9), None);
        assert_eq!(consumer.wait_trap(9), Some(r));
        assert_eq!(consumer.signal_trap(9), None);

        let mut at_lock = producer.clone();
        at_lock.pc = 1;
        assert_eq!(at_lock.resource_trap(), Some(ResourceTrap::Lock(r)));
        consumer.pc = 9;
        assert_eq!(consumer.resource_trap(), Some(ResourceTrap::Wait(r)));
    }

    #[test]
    fn compute_role_has_no_resources() {
        assert!(Role::Compute.resources().is_empty());
        assert!(!Role::IoBound.is_paired());
        assert_eq!(
            shared(1, 2).resources(),
            vec![ResourceId::new(1), ResourceId::new(2)]
        );
    }
}

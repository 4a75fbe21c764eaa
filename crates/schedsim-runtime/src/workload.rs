//! Random process factory.
//!
//! Every batch is a pair of processes sharing one role. Paired roles also
//! bring their mutexes: one (with a condition variable) for a
//! producer/consumer pair, two for a shared-resource pair.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use schedsim_kernel::{
    ConfigError, IdAllocator, Mutex, PairSide, ProcessBatch, ProcessControlBlock, ProcessId, ResourceId,
    Role, RoleKind,
};
use std::ops::{Range, RangeInclusive};

/// Processes in every batch the random factory produces.
pub const PAIR: usize = 2;

/// Anything that can hand the scheduler freshly built processes.
pub trait ProcessFactory: Send {
    fn next_batch(&mut self, ids: &mut IdAllocator) -> ProcessBatch;

    /// Number of processes every batch carries.
    fn batch_size(&self) -> usize;
}

#[derive(Debug, Clone)]
pub struct WorkloadConfig {
    /// Positions per trap category
    pub trap_count: usize,
    pub pc_range: Range<u32>,
    pub terminate_range: RangeInclusive<u32>,
    /// Relative weights for compute, I/O-bound, producer/consumer and
    /// shared-resource pairs
    pub role_weights: [u32; 4],
    /// Percent of shared-resource pairs built with crossed lock order
    pub deadlock_chance: u32,
    pub seed: u64,
}

impl Default for WorkloadConfig {
    fn default() -> Self {
        Self {
            trap_count: 4,
            pc_range: 30..300,
            terminate_range: 1..=3,
            role_weights: [4, 2, 1, 1],
            deadlock_chance: 25,
            seed: 0x5eed,
        }
    }
}

impl WorkloadConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.trap_count == 0 {
            return Err(ConfigError::Zero("trap_count"));
        }
        // Each trap slot needs room for four distinct positions.
        let min_pc = (self.trap_count as u32).saturating_mul(5).saturating_add(1);
        if self.pc_range.is_empty() || self.pc_range.start < min_pc {
            return Err(ConfigError::Range {
                name: "pc_range",
                min: self.pc_range.start,
                max: self.pc_range.end,
            });
        }
        if self.terminate_range.is_empty() {
            return Err(ConfigError::Range {
                name: "terminate_range",
                min: *self.terminate_range.start(),
                max: *self.terminate_range.end(),
            });
        }
        if self.role_weights.iter().all(|&w| w == 0) {
            return Err(ConfigError::Zero("role_weights"));
        }
        if self.deadlock_chance > 100 {
            return Err(ConfigError::Percentage {
                name: "deadlock_chance",
                value: self.deadlock_chance,
            });
        }
        Ok(())
    }
}

pub struct RandomWorkload {
    config: WorkloadConfig,
    rng: StdRng,
}

impl RandomWorkload {
    pub fn new(config: WorkloadConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            rng: StdRng::seed_from_u64(config.seed),
            config,
        })
    }

    fn choose_role(&mut self) -> RoleKind {
        let [compute, io, pair, shared] = self.config.role_weights;
        let roll = self.rng.gen_range(0..compute + io + pair + shared);
        if roll < compute {
            RoleKind::Compute
        } else if roll < compute + io {
            RoleKind::IoBound
        } else if roll < compute + io + pair {
            RoleKind::ProducerConsumer
        } else {
            RoleKind::SharedResource
        }
    }

    fn max_pc(&mut self) -> u32 {
        self.rng.gen_range(self.config.pc_range.clone())
    }

    fn terminate(&mut self) -> u32 {
        self.rng.gen_range(self.config.terminate_range.clone())
    }

    /// `trap_count` distinct positions in `1..max_pc`.
    fn io_traps(&mut self, max_pc: u32, taken: &[u32]) -> Vec<u32> {
        let mut traps: Vec<u32> = Vec::with_capacity(self.config.trap_count);
        while traps.len() < self.config.trap_count {
            let mut pos = self.rng.gen_range(1..max_pc);
            while traps.contains(&pos) || taken.contains(&pos) {
                pos = pos % (max_pc - 1) + 1;
            }
            traps.push(pos);
        }
        traps.sort_unstable();
        traps
    }

    /// Splits the program into one segment per trap slot and returns four
    /// ascending positions inside each segment, one per action.
    fn action_slots(&self, max_pc: u32) -> Vec<[u32; 4]> {
        let count = self.config.trap_count as u32;
        let segment = max_pc / count;
        let stride = (segment / 5).max(1);
        (0..count)
            .map(|k| {
                let base = k * segment + 1;
                [base, base + stride, base + 2 * stride, base + 3 * stride]
            })
            .collect()
    }

    fn process(&mut self, pid: ProcessId, role: Role, max_pc: u32) -> ProcessControlBlock {
        let terminate = self.terminate();
        ProcessControlBlock::new(pid, role, max_pc, terminate)
    }

    fn producer_consumer(&mut self, ids: &mut IdAllocator) -> ProcessBatch {
        let pids = [ids.next_pid(), ids.next_pid()];
        let resource = ids.next_resource();
        let first_produces = self.rng.gen_bool(0.5);

        let processes = pids
            .iter()
            .enumerate()
            .map(|(i, &pid)| {
                let max_pc = self.max_pc();
                let slots = self.action_slots(max_pc);
                let column = |n: usize| slots.iter().map(|s| s[n]).collect::<Vec<_>>();
                let role = if (i == 0) == first_produces {
                    Role::ProducerConsumer {
                        resource,
                        side: PairSide::Producer {
                            signal_traps: column(2),
                        },
                        lock_traps: column(0),
                        unlock_traps: column(1),
                    }
                } else {
                    Role::ProducerConsumer {
                        resource,
                        side: PairSide::Consumer {
                            wait_traps: column(0),
                        },
                        lock_traps: column(1),
                        unlock_traps: column(2),
                    }
                };
                self.process(pid, role, max_pc)
            })
            .collect();

        ProcessBatch {
            processes,
            resources: vec![Mutex::new(resource, pids).with_condition()],
        }
    }

    fn shared_resource(&mut self, ids: &mut IdAllocator) -> ProcessBatch {
        let pids = [ids.next_pid(), ids.next_pid()];
        let resources = [ids.next_resource(), ids.next_resource()];
        let crossed = self.rng.gen_range(0..100) < self.config.deadlock_chance;

        let processes = pids
            .iter()
            .enumerate()
            .map(|(i, &pid)| {
                let max_pc = self.max_pc();
                let slots = self.action_slots(max_pc);
                let column = |n: usize| slots.iter().map(|s| s[n]).collect::<Vec<_>>();
                // Nominal order: lock R1, lock R2, unlock R2, unlock R1.
                let (lock_traps, unlock_traps) = if crossed && i == 0 {
                    ([column(1), column(0)], [column(2), column(3)])
                } else {
                    ([column(0), column(1)], [column(3), column(2)])
                };
                let role = Role::SharedResource {
                    resources,
                    lock_traps,
                    unlock_traps,
                };
                self.process(pid, role, max_pc)
            })
            .collect();

        ProcessBatch {
            processes,
            resources: resources
                .iter()
                .map(|&id: &ResourceId| Mutex::new(id, pids))
                .collect(),
        }
    }
}

impl ProcessFactory for RandomWorkload {
    fn next_batch(&mut self, ids: &mut IdAllocator) -> ProcessBatch {
        match self.choose_role() {
            RoleKind::Compute => {
                let processes = (0..PAIR)
                    .map(|_| {
                        let max_pc = self.max_pc();
                        self.process(ids.next_pid(), Role::Compute, max_pc)
                    })
                    .collect();
                ProcessBatch {
                    processes,
                    resources: Vec::new(),
                }
            }
            RoleKind::IoBound => {
                let processes = (0..PAIR)
                    .map(|_| {
                        let max_pc = self.max_pc();
                        let first = self.io_traps(max_pc, &[]);
                        let second = self.io_traps(max_pc, &first);
                        self.process(ids.next_pid(), Role::IoBound, max_pc)
                            .with_io_traps(first, second)
                    })
                    .collect();
                ProcessBatch {
                    processes,
                    resources: Vec::new(),
                }
            }
            RoleKind::ProducerConsumer => self.producer_consumer(ids),
            RoleKind::SharedResource => self.shared_resource(ids),
        }
    }

    fn batch_size(&self) -> usize {
        PAIR
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use schedsim_kernel::process::ResourceTrap;

    fn only(role: usize, deadlock_chance: u32) -> RandomWorkload {
        let mut role_weights = [0; 4];
        role_weights[role] = 1;
        RandomWorkload::new(WorkloadConfig {
            role_weights,
            deadlock_chance,
            ..WorkloadConfig::default()
        })
        .unwrap()
    }

    /// Walks a program and records the synchronisation action at each position.
    fn actions(pcb: &ProcessControlBlock) -> Vec<ResourceTrap> {
        let mut probe = pcb.clone();
        (0..pcb.max_pc)
            .filter_map(|pc| {
                probe.pc = pc;
                probe.resource_trap()
            })
            .collect()
    }

    #[test]
    fn test_batches_are_pairs_with_fresh_ids() {
        let mut factory = RandomWorkload::new(WorkloadConfig::default()).unwrap();
        let mut ids = IdAllocator::new();
        let first = factory.next_batch(&mut ids);
        let second = factory.next_batch(&mut ids);
        assert_eq!(first.processes.len(), PAIR);
        assert_eq!(second.processes.len(), PAIR);
        assert_eq!(first.processes[0].pid.val(), 1);
        assert_eq!(second.processes[1].pid.val(), 4);
        assert_eq!(first.processes[0].kind(), first.processes[1].kind());
    }

    #[test]
    fn test_generated_programs_respect_ranges() {
        let config = WorkloadConfig::default();
        let mut factory = RandomWorkload::new(config.clone()).unwrap();
        let mut ids = IdAllocator::new();
        for _ in 0..200 {
            for pcb in factory.next_batch(&mut ids).processes {
                assert!(config.pc_range.contains(&pcb.max_pc));
                assert!(config.terminate_range.contains(&pcb.terminate));
                for traps in &pcb.io_traps {
                    assert!(traps.iter().all(|&t| t > 0 && t < pcb.max_pc));
                }
            }
        }
    }

    #[test]
    fn test_io_traps_only_for_io_bound() {
        let mut ids = IdAllocator::new();
        let batch = only(1, 0).next_batch(&mut ids);
        for pcb in &batch.processes {
            let [first, second] = &pcb.io_traps;
            assert_eq!(first.len(), 4);
            assert_eq!(second.len(), 4);
            assert!(first.iter().all(|t| !second.contains(t)));
        }
        assert!(batch.resources.is_empty());

        let batch = only(0, 0).next_batch(&mut ids);
        assert!(batch.processes.iter().all(|p| p.io_traps.iter().all(Vec::is_empty)));
    }

    #[test]
    fn test_producer_consumer_pair() {
        let mut ids = IdAllocator::new();
        let batch = only(2, 0).next_batch(&mut ids);
        assert_eq!(batch.resources.len(), 1);
        let mutex = &batch.resources[0];
        assert!(mutex.cond.is_some());
        assert_eq!(mutex.pair, [batch.processes[0].pid, batch.processes[1].pid]);

        let producers = batch
            .processes
            .iter()
            .filter(|p| {
                matches!(
                    p.role,
                    Role::ProducerConsumer {
                        side: PairSide::Producer { .. },
                        ..
                    }
                )
            })
            .count();
        assert_eq!(producers, 1);

        for pcb in &batch.processes {
            let seq = actions(pcb);
            assert_eq!(seq.len(), 12);
            let id = mutex.id;
            let expected = match &pcb.role {
                Role::ProducerConsumer {
                    side: PairSide::Producer { .. },
                    ..
                } => [ResourceTrap::Lock(id), ResourceTrap::Unlock(id), ResourceTrap::Signal(id)],
                _ => [ResourceTrap::Wait(id), ResourceTrap::Lock(id), ResourceTrap::Unlock(id)],
            };
            assert_eq!(&seq[..3], &expected);
        }
    }

    #[test]
    fn test_shared_pair_nominal_order() {
        let mut ids = IdAllocator::new();
        let batch = only(3, 0).next_batch(&mut ids);
        let [r1, r2] = [batch.resources[0].id, batch.resources[1].id];
        for pcb in &batch.processes {
            assert_eq!(
                &actions(pcb)[..4],
                &[
                    ResourceTrap::Lock(r1),
                    ResourceTrap::Lock(r2),
                    ResourceTrap::Unlock(r2),
                    ResourceTrap::Unlock(r1)
                ]
            );
        }
    }

    #[test]
    fn test_shared_pair_crossed_order() {
        let mut ids = IdAllocator::new();
        let batch = only(3, 100).next_batch(&mut ids);
        let [r1, r2] = [batch.resources[0].id, batch.resources[1].id];
        assert_eq!(
            &actions(&batch.processes[0])[..4],
            &[
                ResourceTrap::Lock(r2),
                ResourceTrap::Lock(r1),
                ResourceTrap::Unlock(r1),
                ResourceTrap::Unlock(r2)
            ]
        );
        assert_eq!(actions(&batch.processes[1])[0], ResourceTrap::Lock(r1));
    }

    #[test]
    fn test_invalid_configs_are_rejected() {
        let short = WorkloadConfig {
            pc_range: 5..10,
            ..WorkloadConfig::default()
        };
        assert!(matches!(
            short.validate(),
            Err(ConfigError::Range {
                name: "pc_range",
                ..
            })
        ));
        let no_roles = WorkloadConfig {
            role_weights: [0; 4],
            ..WorkloadConfig::default()
        };
        assert_eq!(no_roles.validate(), Err(ConfigError::Zero("role_weights")));
    }
}

use super::{missing_resource, transition, Scheduler};
use crate::event::SchedulerEvent;
use crate::process::{ProcessControlBlock, ProcessState};
use crate::types::ProcessId;
use log::debug;

impl Scheduler {
    /// Halts the running process if it has used up its passes. The process
    /// (and its partner, for paired roles) moves to the killed queue, then
    /// reclamation runs and the next process is dispatched.
    pub(crate) fn check_termination(&mut self) -> Option<ProcessId> {
        if !self.running.as_ref().is_some_and(|p| p.is_exhausted()) {
            return None;
        }
        let mut pcb = self.running.take()?;
        let pid = pcb.pid;
        if self.pending_trap == Some(pid) {
            self.pending_trap = None;
        }
        transition(self.sink.as_mut(), self.tick, &mut pcb, ProcessState::Halted);
        self.stats.halted += 1;
        self.kill(pcb);
        self.reclaim_if_due();
        self.dispatch();
        Some(pid)
    }

    /// Moves a halted process into the killed queue. A paired process takes
    /// its mutexes out of the resource table and drags its partner along.
    fn kill(&mut self, pcb: ProcessControlBlock) {
        let pid = pcb.pid;
        let resources = pcb.role.resources();
        self.killed.enqueue(pcb);

        if resources.is_empty() {
            self.sink.emit(&SchedulerEvent::Killed { pid, partner: None });
            return;
        }

        let mut partner = None;
        for id in resources {
            let Some(mutex) = self.resources.remove(id) else {
                missing_resource(&self.resources, id)
            };
            match mutex.partner_of(pid) {
                Some(other) => partner = Some(other),
                None => panic!("{} is bound to {} but not part of its pair", pid, id),
            }
            if !self.killed_resources.contains_by(|m| m.id == mutex.id) {
                self.killed_resources.enqueue(mutex);
            }
        }

        if let Some(partner) = partner {
            match self.take_partner(partner) {
                Some(mut other) => {
                    transition(self.sink.as_mut(), self.tick, &mut other, ProcessState::Halted);
                    self.stats.halted += 1;
                    self.killed.enqueue(other);
                }
                None if self.killed.contains_by(|p| p.pid == partner) => {}
                None => self.sink.emit(&SchedulerEvent::PartnerMissing { pid, partner }),
            }
        }
        self.sink.emit(&SchedulerEvent::Killed { pid, partner });
    }

    /// Pulls the partner out of whichever live container holds it.
    fn take_partner(&mut self, partner: ProcessId) -> Option<ProcessControlBlock> {
        self.ready.remove_matching(partner).or_else(|| {
            self.blocked
                .remove_matching(|entry| entry.pcb.pid == partner)
                .map(|entry| entry.pcb)
        })
    }

    /// Drops the killed queues once each reaches its batch threshold.
    pub(crate) fn reclaim_if_due(&mut self) {
        let processes = if self.killed.len() >= self.config.reclaim_batch {
            self.killed.drain().count()
        } else {
            0
        };
        let resources = if self.killed_resources.len() >= self.config.resource_reclaim_batch {
            self.killed_resources.drain().count()
        } else {
            0
        };
        if processes + resources == 0 {
            return;
        }
        debug!(
            "reclaiming {} processes and {} resources",
            processes, resources
        );
        self.stats.reclaimed_processes += processes;
        self.stats.reclaimed_resources += resources;
        self.sink.emit(&SchedulerEvent::Reclaimed {
            processes,
            resources,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SchedulerConfig;
    use crate::event::{EventRecorder, Interrupt};
    use crate::process::{PairSide, Role};
    use crate::scheduler::ProcessBatch;
    use crate::sync::Mutex;
    use crate::types::{IdAllocator, ResourceId};

    fn scheduler(config: SchedulerConfig) -> (Scheduler, EventRecorder) {
        let recorder = EventRecorder::new();
        let scheduler = Scheduler::new(config).unwrap().with_sink(recorder.clone());
        (scheduler, recorder)
    }

    fn shared_pair(ids: &mut IdAllocator, max_pc: u32) -> (ProcessBatch, [ProcessId; 2]) {
        let a = ids.next_pid();
        let b = ids.next_pid();
        let resources = [ids.next_resource(), ids.next_resource()];
        let role = Role::SharedResource {
            resources,
            lock_traps: [vec![50], vec![51]],
            unlock_traps: [vec![53], vec![52]],
        };
        (
            ProcessBatch {
                processes: vec![
                    ProcessControlBlock::new(a, role.clone(), max_pc, 1),
                    ProcessControlBlock::new(b, role, max_pc, 1),
                ],
                resources: resources.iter().map(|&id| Mutex::new(id, [a, b])).collect(),
            },
            [a, b],
        )
    }

    #[test]
    fn test_compute_process_halts_after_its_passes() {
        let (mut s, recorder) = scheduler(SchedulerConfig::default());
        let mut ids = IdAllocator::new();
        let pid = ids.next_pid();
        s.admit(ProcessBatch {
            processes: vec![ProcessControlBlock::new(pid, Role::Compute, 3, 2)],
            resources: Vec::new(),
        })
        .unwrap();

        let mut halted = None;
        for _ in 0..6 {
            halted = halted.or(s.step().halted);
        }
        assert_eq!(halted, Some(pid));
        assert!(s.running().is_none());
        assert_eq!(s.killed().len(), 1);
        assert_eq!(s.killed().peek().unwrap().state, ProcessState::Halted);
        assert_eq!(
            recorder.count(|e| matches!(e, SchedulerEvent::Killed { partner: None, .. })),
            1
        );
    }

    #[test]
    fn test_paired_termination_kills_partner_and_mutexes() {
        let (mut s, recorder) = scheduler(SchedulerConfig::default());
        let mut ids = IdAllocator::new();
        let (batch, [a, b]) = shared_pair(&mut ids, 10);
        s.admit(batch).unwrap();

        s.running_mut().unwrap().force_exhaustion();
        let outcome = s.step();

        assert_eq!(outcome.halted, Some(a));
        assert!(s.running().is_none());
        assert!(s.ready().is_empty());
        assert_eq!(s.killed().len(), 2);
        assert!(s.killed().contains_by(|p| p.pid == b));
        assert!(s.resources().is_empty());
        assert_eq!(s.killed_resources().len(), 2);
        assert_eq!(s.stats().halted, 2);
        assert!(recorder
            .events()
            .contains(&SchedulerEvent::Killed { pid: a, partner: Some(b) }));
    }

    #[test]
    fn test_partner_found_in_blocked_queue() {
        let (mut s, _) = scheduler(SchedulerConfig::default());
        let mut ids = IdAllocator::new();
        let (batch, [a, b]) = shared_pair(&mut ids, 10);
        s.admit(batch).unwrap();

        s.interrupt(Interrupt::IoTrap(a));
        assert_eq!(s.running().unwrap().pid, b);
        s.running_mut().unwrap().force_exhaustion();
        assert_eq!(s.step().halted, Some(b));

        assert!(s.blocked().is_empty());
        assert_eq!(s.killed().len(), 2);
    }

    #[test]
    fn test_producer_consumer_termination_kills_partner() {
        let (mut s, recorder) = scheduler(SchedulerConfig::default());
        let mut ids = IdAllocator::new();
        let producer = ids.next_pid();
        let consumer = ids.next_pid();
        let resource = ids.next_resource();
        let role = |side| Role::ProducerConsumer {
            resource,
            side,
            lock_traps: vec![4],
            unlock_traps: vec![5],
        };
        s.admit(ProcessBatch {
            processes: vec![
                ProcessControlBlock::new(
                    producer,
                    role(PairSide::Producer {
                        signal_traps: vec![6],
                    }),
                    10,
                    1,
                ),
                ProcessControlBlock::new(
                    consumer,
                    role(PairSide::Consumer {
                        wait_traps: vec![3],
                    }),
                    10,
                    1,
                ),
            ],
            resources: vec![Mutex::new(resource, [producer, consumer]).with_condition()],
        })
        .unwrap();

        s.interrupt(Interrupt::IoTrap(producer));
        assert_eq!(s.blocked().len(), 1);
        assert_eq!(s.running().unwrap().pid, consumer);
        s.running_mut().unwrap().force_exhaustion();
        assert_eq!(s.step().halted, Some(consumer));

        assert!(s.running().is_none());
        assert!(s.blocked().is_empty());
        assert_eq!(s.killed().len(), 2);
        assert!(s.killed().contains_by(|p| p.pid == producer));
        assert_eq!(s.killed_resources().len(), 1);
        assert!(s.resources().is_empty());
        assert!(recorder.events().contains(&SchedulerEvent::Killed {
            pid: consumer,
            partner: Some(producer),
        }));
    }

    #[test]
    #[should_panic(expected = "no entry in the resource table")]
    fn test_missing_resource_is_fatal() {
        let (mut s, _) = scheduler(SchedulerConfig::default());
        let mut ids = IdAllocator::new();
        let (batch, _) = shared_pair(&mut ids, 10);
        s.admit(batch).unwrap();

        s.resources_mut().remove(ResourceId::new(1));
        s.running_mut().unwrap().force_exhaustion();
        s.step();
    }

    #[test]
    fn test_reclamation_waits_for_full_batch() {
        let config = SchedulerConfig {
            reclaim_batch: 3,
            ..SchedulerConfig::default()
        };
        let (mut s, recorder) = scheduler(config);
        let mut ids = IdAllocator::new();
        let processes = (0..3)
            .map(|_| ProcessControlBlock::new(ids.next_pid(), Role::Compute, 5, 0))
            .collect();
        s.admit(ProcessBatch {
            processes,
            resources: Vec::new(),
        })
        .unwrap();

        s.step();
        s.step();
        assert_eq!(s.killed().len(), 2);
        assert_eq!(s.stats().reclaimed_processes, 0);

        s.step();
        assert!(s.killed().is_empty());
        assert_eq!(s.stats().reclaimed_processes, 3);
        assert!(recorder.events().contains(&SchedulerEvent::Reclaimed {
            processes: 3,
            resources: 0
        }));
    }

    #[test]
    fn test_resource_reclamation_has_its_own_threshold() {
        let config = SchedulerConfig {
            reclaim_batch: 10,
            resource_reclaim_batch: 2,
            ..SchedulerConfig::default()
        };
        let (mut s, _) = scheduler(config);
        let mut ids = IdAllocator::new();
        let (batch, _) = shared_pair(&mut ids, 10);
        s.admit(batch).unwrap();

        s.running_mut().unwrap().force_exhaustion();
        s.step();
        assert!(s.killed_resources().is_empty());
        assert_eq!(s.killed().len(), 2);
        assert_eq!(s.stats().reclaimed_resources, 2);
    }
}

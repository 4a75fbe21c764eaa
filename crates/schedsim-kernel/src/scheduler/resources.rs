use super::{missing_resource, transition, Scheduler};
use crate::event::SchedulerEvent;
use crate::process::{ProcessState, ResourceTrap};
use crate::sync::{LockOutcome, Mutex, ResourceTable};
use crate::types::ResourceId;

fn resource_mut(table: &mut ResourceTable, id: ResourceId) -> &mut Mutex {
    if !table.contains(id) {
        missing_resource(table, id)
    }
    match table.get_mut(id) {
        Some(mutex) => mutex,
        None => panic!("resource {} vanished during lookup", id),
    }
}

impl Scheduler {
    /// Performs the synchronisation action at the running process's program
    /// counter. Returns `true` when the process gave up the CPU.
    pub fn use_resource(&mut self) -> bool {
        let Some(running) = self.running.as_ref() else {
            return false;
        };
        let pid = running.pid;
        let Some(trap) = running.resource_trap() else {
            return false;
        };

        let (event, yields) = match trap {
            ResourceTrap::Lock(id) => match resource_mut(&mut self.resources, id).lock(pid) {
                Ok(LockOutcome::Acquired) => (SchedulerEvent::LockAcquired { pid, resource: id }, false),
                Ok(LockOutcome::Contended { holder }) => (
                    SchedulerEvent::LockBlocked {
                        pid,
                        resource: id,
                        holder,
                    },
                    true,
                ),
                Err(e) => (
                    SchedulerEvent::SyncRefused {
                        pid,
                        resource: id,
                        error: e,
                    },
                    false,
                ),
            },
            ResourceTrap::Unlock(id) => match resource_mut(&mut self.resources, id).unlock() {
                Ok(owner) => (
                    SchedulerEvent::Unlocked {
                        pid,
                        resource: id,
                        owner,
                    },
                    false,
                ),
                Err(e) => (
                    SchedulerEvent::SyncRefused {
                        pid,
                        resource: id,
                        error: e,
                    },
                    false,
                ),
            },
            ResourceTrap::Signal(id) => {
                match resource_mut(&mut self.resources, id).cond.as_mut() {
                    Some(cond) => cond.signal(),
                    None => panic!("producer {} signalled {} which has no condition", pid, id),
                }
                (SchedulerEvent::Signaled { pid, resource: id }, false)
            }
            ResourceTrap::Wait(id) => {
                let proceeded = match resource_mut(&mut self.resources, id).cond.as_mut() {
                    Some(cond) => cond.wait(),
                    None => panic!("consumer {} waited on {} which has no condition", pid, id),
                };
                (
                    SchedulerEvent::Waited {
                        pid,
                        resource: id,
                        proceeded,
                    },
                    !proceeded,
                )
            }
        };

        self.sink.emit(&event);
        if yields {
            self.yield_running();
        }
        yields
    }

    /// Voluntary context switch: the running process goes back to its MLFQ
    /// level and the head of the MLFQ takes over, possibly the same process.
    fn yield_running(&mut self) {
        if let Some(mut pcb) = self.running.take() {
            transition(self.sink.as_mut(), self.tick, &mut pcb, ProcessState::Ready);
            self.ready.enqueue(pcb);
        }
        self.dispatch();
    }
}

//! Event stream emitted by the scheduler.
//!
//! The scheduler does not print anything itself; it hands typed events to an
//! [`EventSink`]. [`LogSink`] renders them through `log`, [`EventRecorder`]
//! keeps them in memory.

use crate::error::SyncError;
use crate::process::{ProcessState, RoleKind};
use crate::types::{ProcessId, ResourceId};
use log::{debug, info, warn};
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interrupt {
    Timer,
    /// The running process reached an I/O trap position.
    IoTrap(ProcessId),
    IoCompletion,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchedulerEvent {
    StateChange {
        pid: ProcessId,
        role: RoleKind,
        from: ProcessState,
        to: ProcessState,
        tick: u64,
    },
    Interrupt {
        kind: Interrupt,
        tick: u64,
    },
    LockAcquired {
        pid: ProcessId,
        resource: ResourceId,
    },
    LockBlocked {
        pid: ProcessId,
        resource: ResourceId,
        holder: ProcessId,
    },
    /// `owner` held the lock before the unlock; it may be the partner.
    Unlocked {
        pid: ProcessId,
        resource: ResourceId,
        owner: ProcessId,
    },
    /// A lock or unlock the mutex refused.
    SyncRefused {
        pid: ProcessId,
        resource: ResourceId,
        error: SyncError,
    },
    Signaled {
        pid: ProcessId,
        resource: ResourceId,
    },
    Waited {
        pid: ProcessId,
        resource: ResourceId,
        proceeded: bool,
    },
    Deadlock {
        resources: [ResourceId; 2],
        pids: [ProcessId; 2],
        tick: u64,
    },
    Killed {
        pid: ProcessId,
        partner: Option<ProcessId>,
    },
    PartnerMissing {
        pid: ProcessId,
        partner: ProcessId,
    },
    Reclaimed {
        processes: usize,
        resources: usize,
    },
    /// `empty` means the MLFQ had nothing to drain.
    MlfqReset {
        empty: bool,
        tick: u64,
    },
}

impl SchedulerEvent {
    /// Short name of the event variant.
    pub fn kind(&self) -> &'static str {
        match self {
            SchedulerEvent::StateChange { .. } => "state change",
            SchedulerEvent::Interrupt { .. } => "interrupt",
            SchedulerEvent::LockAcquired { .. } => "lock acquired",
            SchedulerEvent::LockBlocked { .. } => "lock blocked",
            SchedulerEvent::Unlocked { .. } => "unlock",
            SchedulerEvent::SyncRefused { .. } => "refused",
            SchedulerEvent::Signaled { .. } => "signal",
            SchedulerEvent::Waited { .. } => "wait",
            SchedulerEvent::Deadlock { .. } => "deadlock",
            SchedulerEvent::Killed { .. } => "killed",
            SchedulerEvent::PartnerMissing { .. } => "partner missing",
            SchedulerEvent::Reclaimed { .. } => "reclaim",
            SchedulerEvent::MlfqReset { .. } => "mlfq reset",
        }
    }
}

pub trait EventSink: Send {
    fn emit(&mut self, event: &SchedulerEvent);
}

/// Writes events to the `log` facade.
#[derive(Debug, Default)]
pub struct LogSink;

impl EventSink for LogSink {
    fn emit(&mut self, event: &SchedulerEvent) {
        match event {
            SchedulerEvent::StateChange {
                pid,
                role,
                from,
                to,
                tick,
            } => debug!("[{}] {} ({}) {:?} -> {:?}", tick, pid, role, from, to),
            SchedulerEvent::Interrupt { kind, tick } => debug!("[{}] interrupt {:?}", tick, kind),
            SchedulerEvent::LockAcquired { pid, resource } => {
                debug!("{}: requested lock on {} - succeeded", pid, resource)
            }
            SchedulerEvent::LockBlocked {
                pid,
                resource,
                holder,
            } => debug!(
                "{}: requested lock on {} - blocked by {}",
                pid, resource, holder
            ),
            SchedulerEvent::Unlocked {
                pid,
                resource,
                owner,
            } => {
                if pid == owner {
                    debug!("{}: unlocked {}", pid, resource)
                } else {
                    debug!("{}: unlocked {} held by {}", pid, resource, owner)
                }
            }
            SchedulerEvent::SyncRefused {
                pid,
                resource,
                error,
            } => debug!("{}: operation on {} refused: {}", pid, resource, error),
            SchedulerEvent::Signaled { pid, resource } => {
                debug!("{}: signalled condition on {}", pid, resource)
            }
            SchedulerEvent::Waited {
                pid,
                resource,
                proceeded,
            } => debug!(
                "{}: wait on {} {}",
                pid,
                resource,
                if *proceeded { "proceeded" } else { "yielded" }
            ),
            SchedulerEvent::Deadlock {
                resources,
                pids,
                tick,
            } => info!(
                "[{}] deadlock detected for {} & {} over {} and {}",
                tick, pids[0], pids[1], resources[0], resources[1]
            ),
            SchedulerEvent::Killed { pid, partner } => match partner {
                Some(partner) => info!("{} killed together with partner {}", pid, partner),
                None => info!("{} killed", pid),
            },
            SchedulerEvent::PartnerMissing { pid, partner } => {
                warn!("{}: partner {} not found in the MLFQ", pid, partner)
            }
            SchedulerEvent::Reclaimed {
                processes,
                resources,
            } => info!(
                "reclaimed {} processes and {} resources",
                processes, resources
            ),
            SchedulerEvent::MlfqReset { empty, tick } => {
                if *empty {
                    debug!("[{}] MLFQ empty at reset", tick)
                } else {
                    debug!("[{}] MLFQ reset", tick)
                }
            }
        }
    }
}

/// Cloneable in-memory sink; every clone sees the same event list.
#[derive(Debug, Default, Clone)]
pub struct EventRecorder {
    events: Arc<Mutex<Vec<SchedulerEvent>>>,
}

impl EventRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<SchedulerEvent> {
        self.events.lock().clone()
    }

    pub fn count(&self, pred: impl Fn(&SchedulerEvent) -> bool) -> usize {
        self.events.lock().iter().filter(|e| pred(e)).count()
    }
}

impl EventSink for EventRecorder {
    fn emit(&mut self, event: &SchedulerEvent) {
        self.events.lock().push(event.clone());
    }
}

/// Counts events by kind without keeping them; clones share the counts.
#[derive(Debug, Default, Clone)]
pub struct EventTally {
    counts: Arc<Mutex<BTreeMap<&'static str, usize>>>,
}

impl EventTally {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn counts(&self) -> BTreeMap<&'static str, usize> {
        self.counts.lock().clone()
    }
}

impl EventSink for EventTally {
    fn emit(&mut self, event: &SchedulerEvent) {
        *self.counts.lock().entry(event.kind()).or_default() += 1;
    }
}

/// Sends every event to two sinks.
pub struct Tee<A, B>(pub A, pub B);

impl<A: EventSink, B: EventSink> EventSink for Tee<A, B> {
    fn emit(&mut self, event: &SchedulerEvent) {
        self.0.emit(event);
        self.1.emit(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn killed(pid: u32) -> SchedulerEvent {
        SchedulerEvent::Killed {
            pid: ProcessId::new(pid).unwrap(),
            partner: None,
        }
    }

    #[test]
    fn recorder_clones_share_events() {
        let recorder = EventRecorder::new();
        let mut sink = recorder.clone();
        sink.emit(&killed(1));
        sink.emit(&SchedulerEvent::Reclaimed {
            processes: 5,
            resources: 0,
        });
        assert_eq!(recorder.events().len(), 2);
        assert_eq!(
            recorder.count(|e| matches!(e, SchedulerEvent::Killed { .. })),
            1
        );
        assert_eq!(sink.events(), recorder.events());
    }

    #[test]
    fn tee_forwards_to_both_sinks() {
        let left = EventRecorder::new();
        let right = EventRecorder::new();
        let mut tee = Tee(left.clone(), right.clone());
        tee.emit(&killed(7));
        assert_eq!(left.events(), vec![killed(7)]);
        assert_eq!(right.events(), vec![killed(7)]);
    }

    #[test]
    fn tally_counts_by_kind() {
        let tally = EventTally::new();
        let mut sink = tally.clone();
        sink.emit(&killed(1));
        sink.emit(&killed(2));
        sink.emit(&SchedulerEvent::MlfqReset {
            empty: true,
            tick: 2000,
        });
        let counts = tally.counts();
        assert_eq!(counts.get("killed"), Some(&2));
        assert_eq!(counts.get("mlfq reset"), Some(&1));
        assert_eq!(counts.len(), 2);
    }
}

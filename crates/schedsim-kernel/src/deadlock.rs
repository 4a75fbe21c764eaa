//! Deadlock monitor for shared-resource pairs.
//!
//! A pair deadlocks when each process holds one of the two shared mutexes
//! and is about to request the other. The monitor only inspects ownership;
//! it never breaks a lock itself. Instead it pins the running process's
//! termination counter so the process halts at its next termination check,
//! which kills the partner and releases both mutexes with it.

use crate::event::SchedulerEvent;
use crate::process::Role;
use crate::scheduler::{missing_resource, Scheduler};
use crate::sync::ResourceTable;
use crate::types::{ProcessId, ResourceId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeadlockReport {
    pub resources: [ResourceId; 2],
    /// The pair as recorded on the first mutex
    pub pids: [ProcessId; 2],
}

/// Checks whether `pid` and its partner each own one of `resources`.
pub fn detect(
    table: &ResourceTable,
    pid: ProcessId,
    resources: [ResourceId; 2],
) -> Option<DeadlockReport> {
    let [first, second] = resources.map(|id| match table.get(id) {
        Some(mutex) => mutex,
        None => missing_resource(table, id),
    });

    let (Some(a), Some(b)) = (first.owner(), second.owner()) else {
        return None;
    };
    if a == b {
        return None;
    }
    let partner = first.partner_of(pid)?;
    let held_by_pair = (a == pid && b == partner) || (a == partner && b == pid);
    held_by_pair.then_some(DeadlockReport {
        resources,
        pids: first.pair,
    })
}

impl Scheduler {
    /// Runs detection for the running process if it is a shared-resource
    /// process, forcing it to halt when its pair is deadlocked.
    pub fn deadlock_monitor(&mut self) -> Option<DeadlockReport> {
        let running = self.running.as_mut()?;
        let Role::SharedResource { resources, .. } = running.role else {
            return None;
        };
        let report = detect(&self.resources, running.pid, resources)?;

        running.force_exhaustion();
        self.stats.deadlocks += 1;
        self.stats.deadlock_pairs.push(report.pids);
        self.sink.emit(&SchedulerEvent::Deadlock {
            resources: report.resources,
            pids: report.pids,
            tick: self.tick,
        });
        Some(report)
    }
}

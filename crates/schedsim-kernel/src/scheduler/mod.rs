//! The scheduler: owns every container a process record can live in and
//! moves records between them.
//!
//! Records are moved, never shared: `created` → MLFQ level → `running` →
//! (`interrupted` →) MLFQ / `blocked` / `killed`. Mutexes live in the
//! resource table until their pair is killed, then in `killed_resources`.

mod interrupt;
mod resources;
mod termination;

pub use interrupt::InterruptOutcome;

use crate::config::SchedulerConfig;
use crate::error::SchedulerError;
use crate::event::{EventSink, LogSink, SchedulerEvent};
use crate::mlfq::Mlfq;
use crate::process::{ProcessControlBlock, ProcessState, RoleKind};
use crate::queue::ReadyQueue;
use crate::sync::{Mutex, ResourceTable};
use crate::types::{ProcessId, ResourceId};
use crate::DeadlockReport;
use core::fmt;
use log::debug;
use rand::rngs::StdRng;
use rand::SeedableRng;

/// A process waiting for I/O, with the ticks left before it may complete.
#[derive(Debug)]
pub struct Blocked {
    pub pcb: ProcessControlBlock,
    pub remaining: u32,
}

/// Processes handed over by the factory together with the mutexes they share.
#[derive(Debug, Default)]
pub struct ProcessBatch {
    pub processes: Vec<ProcessControlBlock>,
    pub resources: Vec<Mutex>,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RoleCounts {
    pub compute: usize,
    pub io_bound: usize,
    pub producer_consumer: usize,
    pub shared_resource: usize,
}

impl RoleCounts {
    pub fn record(&mut self, kind: RoleKind) {
        match kind {
            RoleKind::Compute => self.compute += 1,
            RoleKind::IoBound => self.io_bound += 1,
            RoleKind::ProducerConsumer => self.producer_consumer += 1,
            RoleKind::SharedResource => self.shared_resource += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.compute + self.io_bound + self.producer_consumer + self.shared_resource
    }
}

#[derive(Debug, Default, Clone)]
pub struct SchedulerStats {
    pub roles: RoleCounts,
    pub admitted: usize,
    pub context_switches: u64,
    pub timer_interrupts: u64,
    pub io_traps: u64,
    pub io_completions: u64,
    pub halted: usize,
    pub deadlocks: u64,
    pub deadlock_pairs: Vec<[ProcessId; 2]>,
    pub reclaimed_processes: usize,
    pub reclaimed_resources: usize,
}

/// What one tick of simulated execution did.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct StepOutcome {
    /// Running process reached an I/O trap; deliver `Interrupt::IoTrap` for it.
    pub io_trap: Option<ProcessId>,
    /// A lock or wait forced a voluntary context switch.
    pub switched: bool,
    pub deadlock: Option<DeadlockReport>,
    pub halted: Option<ProcessId>,
}

pub struct Scheduler {
    pub(crate) config: SchedulerConfig,
    pub(crate) created: ReadyQueue<ProcessControlBlock>,
    pub(crate) ready: Mlfq,
    pub(crate) blocked: ReadyQueue<Blocked>,
    pub(crate) killed: ReadyQueue<ProcessControlBlock>,
    pub(crate) killed_resources: ReadyQueue<Mutex>,
    pub(crate) resources: ResourceTable,
    pub(crate) running: Option<ProcessControlBlock>,
    pub(crate) interrupted: Option<ProcessControlBlock>,
    pub(crate) idle: bool,
    pub(crate) pending_trap: Option<ProcessId>,
    pub(crate) switches_since_check: u32,
    pub(crate) tick: u64,
    pub(crate) stats: SchedulerStats,
    pub(crate) rng: StdRng,
    pub(crate) sink: Box<dyn EventSink>,
}

/// Changes a record's state and reports the transition.
pub(crate) fn transition(
    sink: &mut dyn EventSink,
    tick: u64,
    pcb: &mut ProcessControlBlock,
    to: ProcessState,
) {
    let from = pcb.state;
    pcb.state = to;
    if from != to {
        sink.emit(&SchedulerEvent::StateChange {
            pid: pcb.pid,
            role: pcb.kind(),
            from,
            to,
            tick,
        });
    }
}

/// Fatal: the scheduler's bookkeeping names a resource the table does not hold.
pub(crate) fn missing_resource(table: &ResourceTable, id: ResourceId) -> ! {
    panic!(
        "resource {} has no entry in the resource table; scheduler state is corrupt\n{}",
        id, table
    )
}

impl Scheduler {
    pub fn new(config: SchedulerConfig) -> Result<Self, SchedulerError> {
        config.validate()?;
        Ok(Self {
            ready: Mlfq::new(config.quanta()),
            resources: ResourceTable::new(config.resource_capacity),
            rng: StdRng::seed_from_u64(config.seed),
            config,
            created: ReadyQueue::new(),
            blocked: ReadyQueue::new(),
            killed: ReadyQueue::new(),
            killed_resources: ReadyQueue::new(),
            running: None,
            interrupted: None,
            idle: true,
            pending_trap: None,
            switches_since_check: 0,
            tick: 0,
            stats: SchedulerStats::default(),
            sink: Box::new(LogSink),
        })
    }

    pub fn with_sink(mut self, sink: impl EventSink + 'static) -> Self {
        self.set_sink(Box::new(sink));
        self
    }

    pub fn set_sink(&mut self, sink: Box<dyn EventSink>) {
        self.sink = sink;
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    pub fn tick(&self) -> u64 {
        self.tick
    }

    pub fn stats(&self) -> &SchedulerStats {
        &self.stats
    }

    pub fn is_idle(&self) -> bool {
        self.idle
    }

    pub fn running(&self) -> Option<&ProcessControlBlock> {
        self.running.as_ref()
    }

    #[cfg(test)]
    pub(crate) fn running_mut(&mut self) -> Option<&mut ProcessControlBlock> {
        self.running.as_mut()
    }

    pub fn ready(&self) -> &Mlfq {
        &self.ready
    }

    pub fn blocked(&self) -> &ReadyQueue<Blocked> {
        &self.blocked
    }

    pub fn killed(&self) -> &ReadyQueue<ProcessControlBlock> {
        &self.killed
    }

    pub fn killed_resources(&self) -> &ReadyQueue<Mutex> {
        &self.killed_resources
    }

    pub fn resources(&self) -> &ResourceTable {
        &self.resources
    }

    #[cfg(test)]
    pub(crate) fn resources_mut(&mut self) -> &mut ResourceTable {
        &mut self.resources
    }

    pub fn pending_trap(&self) -> Option<ProcessId> {
        self.pending_trap
    }

    /// Quantum for the next timer sleep; the top-level quantum when nothing is ready.
    pub fn next_quantum(&self) -> u64 {
        self.ready
            .next_quantum()
            .unwrap_or(self.config.base_quantum)
    }

    /// True when no process is running, ready or blocked.
    pub fn is_drained(&self) -> bool {
        self.running.is_none()
            && self.interrupted.is_none()
            && self.ready.is_empty()
            && self.blocked.is_empty()
    }

    /// Takes a batch from the process factory. The batch's mutexes go into
    /// the resource table first, all or nothing; then every process moves
    /// NEW → READY into the MLFQ.
    pub fn admit(&mut self, batch: ProcessBatch) -> Result<Vec<ProcessId>, SchedulerError> {
        let mut inserted = Vec::with_capacity(batch.resources.len());
        for mutex in batch.resources {
            let id = mutex.id;
            if let Err(e) = self.resources.insert(mutex) {
                for id in inserted {
                    self.resources.remove(id);
                }
                return Err(e.into());
            }
            inserted.push(id);
        }

        for mut pcb in batch.processes {
            self.stats.roles.record(pcb.kind());
            transition(self.sink.as_mut(), self.tick, &mut pcb, ProcessState::New);
            self.created.enqueue(pcb);
        }

        let mut admitted = Vec::new();
        while let Some(mut pcb) = self.created.dequeue() {
            debug!("enqueuing newly created {} into MLFQ", pcb.pid);
            transition(self.sink.as_mut(), self.tick, &mut pcb, ProcessState::Ready);
            admitted.push(pcb.pid);
            self.ready.enqueue(pcb);
        }
        self.stats.admitted += admitted.len();

        if self.running.is_none() && self.interrupted.is_none() {
            self.dispatch();
        }
        Ok(admitted)
    }

    /// Makes the head of the highest non-empty MLFQ level the running
    /// process, or leaves the CPU idle.
    pub(crate) fn dispatch(&mut self) {
        assert!(
            self.running.is_none(),
            "dispatch over a live running slot ({:?})",
            self.running.as_ref().map(|p| p.pid)
        );
        self.running = match self.ready.dequeue() {
            Some(mut pcb) => {
                transition(self.sink.as_mut(), self.tick, &mut pcb, ProcessState::Running);
                self.idle = false;
                Some(pcb)
            }
            None => None,
        };
    }

    /// One tick of simulated execution of the running process.
    pub fn step(&mut self) -> StepOutcome {
        let mut outcome = StepOutcome::default();

        if let Some(pid) = self.check_termination() {
            outcome.halted = Some(pid);
        } else if let Some(running) = self.running.as_ref() {
            let pid = running.pid;
            if running.role.is_paired() && self.use_resource() {
                outcome.switched = true;
                self.stats.context_switches += 1;
                self.switches_since_check += 1;
                if self.switches_since_check >= self.config.deadlock_check_interval {
                    self.switches_since_check = 0;
                    outcome.deadlock = self.deadlock_monitor();
                }
            }

            if !outcome.switched {
                if self.pending_trap != Some(pid) {
                    if let Some(running) = self.running.as_mut() {
                        running.advance();
                        if running.is_io_trap(running.pc) {
                            self.pending_trap = Some(pid);
                            outcome.io_trap = Some(pid);
                        }
                    }
                }
                outcome.halted = self.check_termination();
            }
        }

        self.tick += 1;
        for entry in self.blocked.iter_mut() {
            entry.remaining = entry.remaining.saturating_sub(1);
        }
        if self.tick % self.config.aging_interval == 0 {
            self.age();
        }
        outcome
    }

    /// Drains every lower level into level 0. With nothing queued and the
    /// CPU free the scheduler marks itself idle instead.
    pub fn age(&mut self) {
        let moved = self.ready.reset();
        if !moved && self.running.is_none() && self.interrupted.is_none() {
            self.idle = true;
        }
        self.sink.emit(&SchedulerEvent::MlfqReset {
            empty: !moved,
            tick: self.tick,
        });
    }

    pub fn summary(&self) -> RunSummary {
        RunSummary {
            ticks: self.tick,
            stats: self.stats.clone(),
            remaining_ready: self.ready.len(),
            remaining_created: self.created.len(),
            remaining_blocked: self.blocked.len(),
            remaining_killed: self.killed.len(),
            remaining_killed_resources: self.killed_resources.len(),
            remaining_resources: self.resources.len(),
            running: self.running.as_ref().map(|p| p.pid),
        }
    }

    /// Final teardown: every record still held is dropped here, after the
    /// counts have been taken.
    pub fn into_summary(mut self) -> RunSummary {
        let summary = self.summary();
        let processes = self.ready.drain().len()
            + self.created.drain().count()
            + self.blocked.drain().count()
            + self.killed.drain().count()
            + usize::from(self.running.take().is_some())
            + usize::from(self.interrupted.take().is_some());
        let resources = self.resources.drain().len() + self.killed_resources.drain().count();
        debug!(
            "teardown released {} processes and {} resources",
            processes, resources
        );
        summary
    }
}

/// End-of-run counts.
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub ticks: u64,
    pub stats: SchedulerStats,
    pub remaining_ready: usize,
    pub remaining_created: usize,
    pub remaining_blocked: usize,
    pub remaining_killed: usize,
    pub remaining_killed_resources: usize,
    pub remaining_resources: usize,
    pub running: Option<ProcessId>,
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let roles = &self.stats.roles;
        writeln!(f, "TOTAL ROLE TYPES: {}", roles.total())?;
        writeln!(f, "  COMP:   {}", roles.compute)?;
        writeln!(f, "  IO:     {}", roles.io_bound)?;
        writeln!(f, "  PAIR:   {}", roles.producer_consumer)?;
        writeln!(f, "  SHARED: {}", roles.shared_resource)?;
        writeln!(f, "Ticks: {}", self.ticks)?;
        writeln!(f, "Processes admitted: {}", self.stats.admitted)?;
        writeln!(f, "Processes halted: {}", self.stats.halted)?;
        writeln!(f, "Voluntary context switches: {}", self.stats.context_switches)?;
        writeln!(f, "Timer interrupts: {}", self.stats.timer_interrupts)?;
        writeln!(
            f,
            "I/O traps / completions: {} / {}",
            self.stats.io_traps, self.stats.io_completions
        )?;
        writeln!(f, "Remaining in MLFQ: {}", self.remaining_ready)?;
        writeln!(f, "Remaining in created: {}", self.remaining_created)?;
        writeln!(f, "Remaining in blocked: {}", self.remaining_blocked)?;
        writeln!(f, "Remaining in killed: {}", self.remaining_killed)?;
        writeln!(
            f,
            "Remaining resources in killed: {}",
            self.remaining_killed_resources
        )?;
        writeln!(f, "Resources still mapped: {}", self.remaining_resources)?;
        writeln!(
            f,
            "Reclaimed: {} processes, {} resources",
            self.stats.reclaimed_processes, self.stats.reclaimed_resources
        )?;
        if self.stats.deadlocks == 0 {
            writeln!(f, "No deadlock detected in this run")?;
        } else {
            writeln!(f, "Deadlock occurrences: {}", self.stats.deadlocks)?;
            for [a, b] in &self.stats.deadlock_pairs {
                writeln!(f, "  {} & {}", a, b)?;
            }
        }
        Ok(())
    }
}

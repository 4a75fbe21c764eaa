use super::{transition, Blocked, Scheduler};
use crate::event::{Interrupt, SchedulerEvent};
use crate::process::ProcessState;
use crate::types::ProcessId;
use log::{debug, trace};
use rand::Rng;

/// What an interrupt did to the process containers.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct InterruptOutcome {
    /// A process moved into the blocked queue.
    pub blocked: Option<ProcessId>,
    /// A blocked process finished its I/O and moved back to the MLFQ.
    pub completed: Option<ProcessId>,
    /// Process running once the interrupt returns.
    pub running: Option<ProcessId>,
    /// The interrupt was discarded without touching any state.
    pub ignored: bool,
}

impl Scheduler {
    /// Interrupt service: saves the running process, routes it according to
    /// the interrupt kind, reclaims if due and dispatches the next process.
    pub fn interrupt(&mut self, kind: Interrupt) -> InterruptOutcome {
        let mut outcome = InterruptOutcome::default();

        if let Interrupt::IoTrap(pid) = kind {
            if self.pending_trap == Some(pid) {
                self.pending_trap = None;
            }
            if self.running.as_ref().map(|p| p.pid) != Some(pid) {
                debug!("stale I/O trap for {} dropped", pid);
                outcome.ignored = true;
                outcome.running = self.running.as_ref().map(|p| p.pid);
                return outcome;
            }
        }

        self.sink.emit(&SchedulerEvent::Interrupt {
            kind,
            tick: self.tick,
        });

        match kind {
            Interrupt::Timer => {
                self.stats.timer_interrupts += 1;
                self.save_running();
                if let Some(mut pcb) = self.interrupted.take() {
                    let priority = pcb.demoted_priority();
                    pcb.assign_priority(priority);
                    transition(self.sink.as_mut(), self.tick, &mut pcb, ProcessState::Ready);
                    self.ready.enqueue(pcb);
                }
            }
            Interrupt::IoTrap(_) => {
                self.stats.io_traps += 1;
                self.save_running();
                if let Some(mut pcb) = self.interrupted.take() {
                    let remaining = self.rng.gen_range(1..=self.config.max_io_delay);
                    trace!("{} blocked for {} ticks", pcb.pid, remaining);
                    transition(self.sink.as_mut(), self.tick, &mut pcb, ProcessState::Waiting);
                    outcome.blocked = Some(pcb.pid);
                    self.blocked.enqueue(Blocked { pcb, remaining });
                }
            }
            Interrupt::IoCompletion => {
                let due = self
                    .blocked
                    .peek()
                    .map_or(false, |entry| entry.remaining == 0);
                if due {
                    if let Some(Blocked { mut pcb, .. }) = self.blocked.dequeue() {
                        self.stats.io_completions += 1;
                        transition(self.sink.as_mut(), self.tick, &mut pcb, ProcessState::Ready);
                        outcome.completed = Some(pcb.pid);
                        self.ready.enqueue(pcb);
                    }
                }
                // The running process keeps the CPU; only an idle CPU picks up work.
                if self.running.is_none() {
                    self.dispatch();
                }
                outcome.running = self.running.as_ref().map(|p| p.pid);
                return outcome;
            }
        }

        self.reclaim_if_due();
        self.dispatch();
        outcome.running = self.running.as_ref().map(|p| p.pid);
        outcome
    }

    /// Moves the running process into the interrupted slot.
    fn save_running(&mut self) {
        if let Some(mut pcb) = self.running.take() {
            transition(
                self.sink.as_mut(),
                self.tick,
                &mut pcb,
                ProcessState::Interrupted,
            );
            self.interrupted = Some(pcb);
        }
    }
}

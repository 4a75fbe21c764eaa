//! The three interrupt sources.
//!
//! Each actor is a named OS thread that takes the coarse scheduler lock for
//! the duration of one interrupt. Handoffs are channels: the primary loop
//! sends the trapping pid to the I/O-trap actor, which pings the completion
//! actor whenever a process lands in the blocked queue. Dropping a sender
//! cancels the receiver, so shutdown cascades loop → I/O trap → completion.

use crate::error::SimulationError;
use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender};
use log::{debug, trace};
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use schedsim_kernel::{Interrupt, ProcessId, Scheduler};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

pub type SharedScheduler = Arc<Mutex<Scheduler>>;

#[derive(Debug, Clone)]
pub struct ActorConfig {
    /// Wall-clock length of one quantum unit
    pub quantum_unit: Duration,
    /// Delay between completion polls while the blocked queue is non-empty
    pub poll_interval: Duration,
    /// Percent chance that a poll raises an I/O completion
    pub completion_chance: u32,
    pub seed: u64,
}

pub struct Actors {
    timer: Option<JoinHandle<()>>,
    io_trap: Option<JoinHandle<()>>,
    io_completion: Option<JoinHandle<()>>,
    cancel: Option<Sender<()>>,
    traps: Option<Sender<ProcessId>>,
    shutdown: Arc<AtomicBool>,
}

impl Actors {
    pub fn spawn(scheduler: &SharedScheduler, config: &ActorConfig) -> Result<Self, SimulationError> {
        let shutdown = Arc::new(AtomicBool::new(false));
        let (cancel_tx, cancel_rx) = unbounded();
        let (trap_tx, trap_rx) = unbounded();
        let (blocked_tx, blocked_rx) = unbounded();

        let mut actors = Self {
            timer: None,
            io_trap: None,
            io_completion: None,
            cancel: Some(cancel_tx),
            traps: Some(trap_tx),
            shutdown: Arc::clone(&shutdown),
        };

        let sched = Arc::clone(scheduler);
        let unit = config.quantum_unit;
        let flag = Arc::clone(&shutdown);
        actors.timer = Some(
            thread::Builder::new()
                .name("timer".to_string())
                .spawn(move || timer_loop(sched, cancel_rx, flag, unit))?,
        );

        let sched = Arc::clone(scheduler);
        let flag = Arc::clone(&shutdown);
        actors.io_trap = Some(
            thread::Builder::new()
                .name("io-trap".to_string())
                .spawn(move || io_trap_loop(sched, trap_rx, blocked_tx, flag))?,
        );

        let sched = Arc::clone(scheduler);
        let flag = Arc::clone(&shutdown);
        let poll = config.poll_interval;
        let chance = config.completion_chance;
        let rng = StdRng::seed_from_u64(config.seed);
        actors.io_completion = Some(
            thread::Builder::new()
                .name("io-completion".to_string())
                .spawn(move || io_completion_loop(sched, blocked_rx, flag, poll, chance, rng))?,
        );

        Ok(actors)
    }

    /// Hands a trapping pid to the I/O-trap actor. Returns `false` once the
    /// actor is gone.
    pub fn raise_io_trap(&self, pid: ProcessId) -> bool {
        self.traps
            .as_ref()
            .is_some_and(|traps| traps.send(pid).is_ok())
    }

    /// True if any actor has exited, which only happens early on a panic.
    pub fn any_finished(&self) -> bool {
        [&self.timer, &self.io_trap, &self.io_completion]
            .into_iter()
            .any(|h| h.as_ref().is_some_and(JoinHandle::is_finished))
    }

    /// Raises the shutdown flag, cancels every channel wait and joins all
    /// three threads. The first panicked actor is reported.
    pub fn shutdown(mut self) -> Result<(), SimulationError> {
        self.shutdown.store(true, Ordering::SeqCst);
        self.cancel.take();
        self.traps.take();

        let mut result = Ok(());
        for (name, handle) in [
            ("timer", self.timer.take()),
            ("io-trap", self.io_trap.take()),
            ("io-completion", self.io_completion.take()),
        ] {
            let Some(handle) = handle else { continue };
            if handle.join().is_err() && result.is_ok() {
                result = Err(SimulationError::ActorPanicked(name));
            }
        }
        debug!("interrupt actors joined");
        result
    }
}

impl Drop for Actors {
    fn drop(&mut self) {
        // Dropped without `shutdown` (e.g. a spawn failure): release the
        // threads so they exit on their own.
        self.shutdown.store(true, Ordering::SeqCst);
        self.cancel.take();
        self.traps.take();
    }
}

/// Sleeps for the current quantum, then forces a timer interrupt.
fn timer_loop(
    scheduler: SharedScheduler,
    cancel: Receiver<()>,
    shutdown: Arc<AtomicBool>,
    unit: Duration,
) {
    loop {
        let quantum = scheduler.lock().next_quantum();
        let sleep = unit.saturating_mul(u32::try_from(quantum).unwrap_or(u32::MAX));
        match cancel.recv_timeout(sleep) {
            Err(RecvTimeoutError::Timeout) => {}
            Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
        }
        if shutdown.load(Ordering::Relaxed) {
            break;
        }
        scheduler.lock().interrupt(Interrupt::Timer);
    }
    trace!("timer actor exiting");
}

/// Delivers each I/O trap the primary loop hands over.
fn io_trap_loop(
    scheduler: SharedScheduler,
    traps: Receiver<ProcessId>,
    blocked: Sender<()>,
    shutdown: Arc<AtomicBool>,
) {
    for pid in traps.iter() {
        if shutdown.load(Ordering::Relaxed) {
            break;
        }
        let outcome = scheduler.lock().interrupt(Interrupt::IoTrap(pid));
        if outcome.blocked.is_some() && blocked.send(()).is_err() {
            break;
        }
    }
    trace!("io-trap actor exiting");
}

/// Waits for a process to block, then polls until the blocked queue drains,
/// raising a completion with `chance` percent probability per poll.
fn io_completion_loop(
    scheduler: SharedScheduler,
    blocked: Receiver<()>,
    shutdown: Arc<AtomicBool>,
    poll: Duration,
    chance: u32,
    mut rng: StdRng,
) {
    'wait: while blocked.recv().is_ok() {
        loop {
            if shutdown.load(Ordering::Relaxed) {
                break 'wait;
            }
            thread::sleep(poll);
            let mut sched = scheduler.lock();
            if rng.gen_range(0..100) < chance {
                sched.interrupt(Interrupt::IoCompletion);
            }
            if sched.blocked().is_empty() {
                break;
            }
        }
    }
    trace!("io-completion actor exiting");
}

//! Concurrent harness around the scheduler kernel: a primary loop that
//! advances simulated execution and admits new work, plus timer, I/O-trap
//! and I/O-completion actors running on their own threads.

pub mod actors;
pub mod error;
pub mod workload;

pub use actors::{ActorConfig, Actors, SharedScheduler};
pub use error::SimulationError;
pub use workload::{ProcessFactory, RandomWorkload, WorkloadConfig};

use log::{info, warn};
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use schedsim_kernel::{
    ConfigError, EventSink, IdAllocator, RunSummary, Scheduler, SchedulerConfig,
    SchedulerError,
};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct SimulationConfig {
    pub scheduler: SchedulerConfig,
    pub workload: WorkloadConfig,
    pub max_ticks: u64,
    /// Ceiling on processes admitted over the whole run
    pub max_processes: usize,
    /// Percent chance per tick that a new batch is admitted
    pub admit_chance: u32,
    /// Percent chance per poll that blocked I/O completes
    pub io_completion_chance: u32,
    pub quantum_unit: Duration,
    pub io_poll_interval: Duration,
    pub seed: u64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            scheduler: SchedulerConfig::default(),
            workload: WorkloadConfig::default(),
            max_ticks: 100_000,
            max_processes: 300,
            admit_chance: 5,
            io_completion_chance: 10,
            quantum_unit: Duration::from_micros(1),
            io_poll_interval: Duration::from_micros(50),
            seed: 0x5eed,
        }
    }
}

impl SimulationConfig {
    /// Reseeds every random source from one seed.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self.scheduler.seed = seed;
        self.workload.seed = seed.wrapping_add(1);
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.scheduler.validate()?;
        self.workload.validate()?;
        if self.max_ticks == 0 {
            return Err(ConfigError::Zero("max_ticks"));
        }
        for (name, value) in [
            ("admit_chance", self.admit_chance),
            ("io_completion_chance", self.io_completion_chance),
        ] {
            if value > 100 {
                return Err(ConfigError::Percentage { name, value });
            }
        }
        Ok(())
    }

    fn actors(&self) -> ActorConfig {
        ActorConfig {
            quantum_unit: self.quantum_unit,
            poll_interval: self.io_poll_interval,
            completion_chance: self.io_completion_chance,
            seed: self.seed.wrapping_add(2),
        }
    }
}

pub struct Simulation<F: ProcessFactory = RandomWorkload> {
    config: SimulationConfig,
    scheduler: SharedScheduler,
    factory: F,
    ids: IdAllocator,
    rng: StdRng,
}

impl Simulation<RandomWorkload> {
    pub fn new(config: SimulationConfig) -> Result<Self, SimulationError> {
        let factory = RandomWorkload::new(config.workload.clone())?;
        Self::with_factory(config, factory)
    }
}

impl<F: ProcessFactory> Simulation<F> {
    pub fn with_factory(config: SimulationConfig, factory: F) -> Result<Self, SimulationError> {
        config.validate()?;
        let scheduler = Scheduler::new(config.scheduler.clone())?;
        Ok(Self {
            rng: StdRng::seed_from_u64(config.seed),
            scheduler: Arc::new(Mutex::new(scheduler)),
            factory,
            ids: IdAllocator::new(),
            config,
        })
    }

    /// Replaces the scheduler's event sink (the default logs every event).
    pub fn with_sink(self, sink: impl EventSink + 'static) -> Self {
        self.scheduler.lock().set_sink(Box::new(sink));
        self
    }

    pub fn scheduler(&self) -> &SharedScheduler {
        &self.scheduler
    }

    /// Admits a batch if the ceiling leaves room. Returns the number of
    /// processes admitted.
    fn admit_batch(&mut self, scheduler: &mut Scheduler, admitted: usize) -> Result<usize, SimulationError> {
        if admitted + self.factory.batch_size() > self.config.max_processes {
            return Ok(0);
        }
        let batch = self.factory.next_batch(&mut self.ids);
        match scheduler.admit(batch) {
            Ok(pids) => Ok(pids.len()),
            Err(SchedulerError::Admission(e)) => {
                warn!("batch rejected: {}", e);
                Ok(0)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Runs the primary loop to completion and returns the final summary.
    /// Every actor is joined before the summary is taken.
    pub fn run(mut self) -> Result<RunSummary, SimulationError> {
        let actors = Actors::spawn(&self.scheduler, &self.config.actors())?;
        let scheduler = Arc::clone(&self.scheduler);
        let ceiling_gap = self.factory.batch_size();

        let mut admitted = {
            let mut sched = scheduler.lock();
            self.admit_batch(&mut sched, 0)?
        };

        let mut ticks = 0;
        while ticks < self.config.max_ticks {
            let (outcome, drained) = {
                let mut sched = scheduler.lock();
                if self.rng.gen_range(0..100) < self.config.admit_chance {
                    admitted += self.admit_batch(&mut sched, admitted)?;
                }
                let outcome = sched.step();
                (outcome, sched.is_drained())
            };
            ticks += 1;

            if let Some(pid) = outcome.io_trap {
                if !actors.raise_io_trap(pid) {
                    warn!("I/O-trap actor is gone, stopping");
                    break;
                }
            }
            if drained && admitted + ceiling_gap > self.config.max_processes {
                info!("process ceiling reached and all work finished");
                break;
            }
            if actors.any_finished() {
                warn!("an interrupt actor exited early, stopping");
                break;
            }
            thread::yield_now();
        }

        actors.shutdown()?;
        info!("primary loop stopped after {} ticks", ticks);
        drop(scheduler);

        let summary = match Arc::try_unwrap(self.scheduler) {
            Ok(scheduler) => scheduler.into_inner().into_summary(),
            Err(shared) => shared.lock().summary(),
        };
        Ok(summary)
    }
}

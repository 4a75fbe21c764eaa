use schedsim_kernel::{ConfigError, SchedulerError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SimulationError {
    #[error("scheduler error: {0}")]
    Scheduler(#[from] SchedulerError),

    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("failed to spawn actor thread: {0}")]
    Spawn(#[from] std::io::Error),

    #[error("{0} actor panicked")]
    ActorPanicked(&'static str),
}

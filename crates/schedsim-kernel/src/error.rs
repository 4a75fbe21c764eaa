use crate::types::{ProcessId, ResourceId};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ResourceTableError {
    #[error("resource table is full (capacity {capacity})")]
    Full { capacity: usize },

    #[error("resource {0} is already present in the table")]
    AlreadyPresent(ResourceId),
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SyncError {
    #[error("{pid} already holds {resource}")]
    AlreadyHeld { resource: ResourceId, pid: ProcessId },

    #[error("{0} is not locked")]
    NotLocked(ResourceId),

    #[error("{pid} is not paired with {resource}")]
    NotPaired { resource: ResourceId, pid: ProcessId },
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} must be greater than zero")]
    Zero(&'static str),

    #[error("{name} is a percentage, got {value}")]
    Percentage { name: &'static str, value: u32 },

    #[error("invalid range for {name}: {min}..{max}")]
    Range {
        name: &'static str,
        min: u32,
        max: u32,
    },
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SchedulerError {
    #[error("admission rejected: {0}")]
    Admission(#[from] ResourceTableError),

    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),
}

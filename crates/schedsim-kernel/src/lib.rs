//! Schedsim kernel: an MLFQ process scheduler with paired-process
//! synchronisation, deadlock monitoring and batched reclamation.
//!
//! The kernel is single-threaded. Concurrent drivers (timer, I/O) live in
//! `schedsim-runtime` and call into a [`Scheduler`] behind a lock.

pub mod config;
pub mod deadlock;
pub mod error;
pub mod event;
pub mod mlfq;
pub mod process;
pub mod queue;
pub mod scheduler;
pub mod sync;
pub mod types;

pub use config::{SchedulerConfig, NUM_PRIORITIES};
pub use deadlock::DeadlockReport;
pub use error::{ConfigError, ResourceTableError, SchedulerError, SyncError};
pub use event::{EventRecorder, EventSink, EventTally, Interrupt, LogSink, SchedulerEvent};
pub use process::{PairSide, ProcessControlBlock, ProcessState, Role, RoleKind};
pub use scheduler::{
    InterruptOutcome, ProcessBatch, RoleCounts, RunSummary, Scheduler, SchedulerStats,
    StepOutcome,
};
pub use sync::{ConditionVariable, LockOutcome, Mutex, ResourceTable};
pub use types::{IdAllocator, ProcessId, ResourceId};

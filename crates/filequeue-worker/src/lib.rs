//! Job processing for FileQueue.
//!
//! This crate provides:
//! - A job queue that enqueues, claims, and settles jobs against storage
//! - A job executor that dispatches jobs to handlers by name
//! - A worker loop with lifecycle events and adaptive polling
//! - A scheduler that turns recurrence rules into jobs

pub mod events;
pub mod executor;
pub mod queue;
pub mod recurrence;
pub mod runner;
pub mod scheduler;

pub use events::{EventBus, WorkerEvent, WorkerEventPayload};
pub use executor::{JobExecutionError, JobExecutor, JobHandler};
pub use queue::{JobQueue, ProcessBatch};
pub use runner::{Worker, WorkerStats};
pub use scheduler::{ScheduledRun, Scheduler};

//! # filequeue-entity
//!
//! Domain models shared by storage, queue, worker, and scheduler: the
//! durable [`Job`] record with its state machine, and the recurring
//! [`Schedule`] definitions that materialize new jobs.

pub mod job;
pub mod schedule;

pub use job::{Job, JobErrorDetail, JobMetadata, JobOptions, JobPayload, JobStatus};
pub use schedule::{Recurrence, Schedule, ScheduleType};

//! # filequeue
//!
//! A file-backed background job queue: durable jobs with retries and
//! delayed execution, a polling worker with lifecycle events, and an
//! in-memory scheduler for recurring work.
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use filequeue::{AppConfig, AppResult, JobExecutionError, JobOptions, JobPayload, JobQueue, Worker};
//! use serde_json::json;
//!
//! # async fn demo() -> AppResult<()> {
//! let config = AppConfig::load("development")?;
//! filequeue::init_logging(&config.logging)?;
//!
//! let queue = Arc::new(JobQueue::from_config(&config).await?);
//! queue.add("email", JobPayload::new(), JobOptions::new()).await?;
//!
//! let mut worker = Worker::with_config(Arc::clone(&queue), &config.worker);
//! worker.register_handler("email", |_payload: JobPayload, job: filequeue::Job| async move {
//!     Ok::<_, JobExecutionError>(json!({ "sent": job.id().to_string() }))
//! });
//! worker.run(10, None).await?;
//! # Ok(())
//! # }
//! ```

use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt;

pub use filequeue_cache::JobCache;
pub use filequeue_core::config::AppConfig;
pub use filequeue_core::config::logging::LoggingConfig;
pub use filequeue_core::types::{JobId, ScheduleId};
pub use filequeue_core::{AppError, AppResult, ErrorKind};
pub use filequeue_entity::{
    Job, JobErrorDetail, JobOptions, JobPayload, JobStatus, Recurrence, Schedule, ScheduleType,
};
pub use filequeue_storage::providers::{FileStorage, MemoryStorage};
pub use filequeue_storage::{CleanupThreshold, JobStorage, StorageManager, StorageStats};
pub use filequeue_worker::{
    EventBus, JobExecutionError, JobExecutor, JobHandler, JobQueue, ProcessBatch, ScheduledRun,
    Scheduler, Worker, WorkerEvent, WorkerEventPayload, WorkerStats,
};

/// Install the global tracing subscriber.
///
/// `RUST_LOG` takes precedence over the configured level. Fails if a
/// global subscriber is already installed.
pub fn init_logging(config: &LoggingConfig) -> AppResult<()> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    let result = match config.format.as_str() {
        "json" => fmt()
            .json()
            .with_env_filter(filter)
            .with_target(true)
            .with_thread_ids(true)
            .try_init(),
        _ => fmt()
            .pretty()
            .with_env_filter(filter)
            .with_target(true)
            .try_init(),
    };

    result.map_err(|e| AppError::configuration(format!("Failed to initialize logging: {e}")))
}

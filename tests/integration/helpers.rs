//! Shared test helpers for integration tests.

use std::sync::Arc;

use serde_json::Value;
use tempfile::TempDir;

use filequeue::{
    FileStorage, JobCache, JobExecutionError, JobPayload, JobQueue, JobStatus,
};
use filequeue_core::config::queue::QueueConfig;

/// A queue over a throwaway storage root.
pub struct TestQueue {
    /// Keeps the storage root alive for the test's duration.
    pub dir: TempDir,
    /// The storage the queue writes to.
    pub storage: Arc<FileStorage>,
    /// The queue under test.
    pub queue: Arc<JobQueue>,
}

impl TestQueue {
    /// File-backed queue with the default cache.
    pub async fn new() -> Self {
        Self::with_cache(Some(JobCache::new(50))).await
    }

    /// File-backed queue with an explicit cache setting.
    pub async fn with_cache(cache: Option<JobCache>) -> Self {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let storage = Arc::new(
            FileStorage::new(dir.path().join("queue"), cache)
                .await
                .expect("Failed to open storage"),
        );
        let queue = Arc::new(JobQueue::new(storage.clone(), QueueConfig::default()));
        Self {
            dir,
            storage,
            queue,
        }
    }

    /// A second queue sharing the same storage root, as another process would.
    pub async fn sibling(&self) -> Arc<JobQueue> {
        let storage = FileStorage::new(self.storage.root(), None)
            .await
            .expect("Failed to open storage");
        Arc::new(JobQueue::new(Arc::new(storage), QueueConfig::default()))
    }

    /// Number of committed records in a partition directory.
    pub fn files_in(&self, status: JobStatus) -> usize {
        std::fs::read_dir(self.storage.partition_dir(status))
            .expect("Failed to list partition")
            .filter_map(Result::ok)
            .filter(|entry| entry.path().extension().is_some_and(|ext| ext == "json"))
            .count()
    }
}

/// Build a payload from a JSON object literal.
pub fn payload(value: Value) -> JobPayload {
    match value {
        Value::Object(map) => map,
        other => panic!("payload must be an object, got {other}"),
    }
}

/// Handler that echoes the payload back.
pub async fn echo(payload: JobPayload, _job: filequeue::Job) -> Result<Value, JobExecutionError> {
    Ok(Value::Object(payload))
}

/// Handler that always fails.
pub async fn always_fail(
    _payload: JobPayload,
    _job: filequeue::Job,
) -> Result<Value, JobExecutionError> {
    Err(JobExecutionError::with_code("always fails", 7))
}

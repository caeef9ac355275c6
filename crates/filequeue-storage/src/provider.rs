//! The job storage contract shared by every provider.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use filequeue_core::result::AppResult;
use filequeue_core::types::{JobId, now_epoch};
use filequeue_entity::job::{Job, JobStatus};

/// Threshold above which a raw cleanup value is read as an absolute epoch.
pub const ABSOLUTE_CUTOFF_THRESHOLD: i64 = 1_000_000_000;

/// Durable store for jobs, partitioned by status.
///
/// Implementations must keep every job in exactly one partition and must
/// make [`JobStorage::update_status`] a compare-and-swap: the job's
/// in-memory status is the partition the caller expects the record to be
/// in, and the move only happens if it is still there.
#[async_trait]
pub trait JobStorage: Send + Sync + std::fmt::Debug + 'static {
    /// Short provider name (`file`, `memory`).
    fn provider_type(&self) -> &str;

    /// Persist the job under its current status partition.
    async fn save(&self, job: &Job) -> AppResult<()>;

    /// Fetch a job by id from the cache or any partition.
    async fn get(&self, id: &JobId) -> AppResult<Option<Job>>;

    /// Remove the job from its current partition. Returns `false` when
    /// nothing was stored there.
    async fn delete(&self, job: &Job) -> AppResult<bool>;

    /// Atomically move the job from its current partition to `status`.
    ///
    /// On success the job's status (and audit stamps) are updated in place
    /// and the new content is persisted. If the record is no longer in the
    /// expected partition the call fails with `ErrorKind::Conflict` and the
    /// job is left untouched.
    async fn update_status(&self, job: &mut Job, status: JobStatus) -> AppResult<()>;

    /// First pending job whose scheduled time has arrived.
    async fn next_pending_job(&self) -> AppResult<Option<Job>>;

    /// Every job in the pending partition, ready or not.
    async fn pending_jobs(&self) -> AppResult<Vec<Job>>;

    /// Jobs in one partition, optionally truncated to `limit`.
    async fn jobs_by_status(&self, status: JobStatus, limit: Option<usize>)
    -> AppResult<Vec<Job>>;

    /// Partition counts and cache occupancy.
    async fn stats(&self) -> AppResult<StorageStats>;

    /// Delete completed jobs that finished before the threshold. Returns the
    /// number removed.
    async fn cleanup(&self, threshold: CleanupThreshold) -> AppResult<usize>;

    /// Drop every cached snapshot.
    async fn clear_cache(&self) -> AppResult<()>;
}

/// Partition counts reported by a storage provider.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageStats {
    /// Jobs waiting to run.
    pub pending: usize,
    /// Jobs currently claimed.
    pub processing: usize,
    /// Jobs that finished successfully.
    pub completed: usize,
    /// Jobs that exhausted their attempts.
    pub failed: usize,
    /// Sum of all partitions.
    pub total: usize,
    /// Entries currently held in the cache.
    pub cache_size: u64,
}

impl StorageStats {
    /// Record the count for one partition and keep `total` in step.
    pub fn record(&mut self, status: JobStatus, count: usize) {
        match status {
            JobStatus::Pending => self.pending = count,
            JobStatus::Processing => self.processing = count,
            JobStatus::Completed => self.completed = count,
            JobStatus::Failed => self.failed = count,
        }
        self.total = self.pending + self.processing + self.completed + self.failed;
    }
}

/// Age threshold for [`JobStorage::cleanup`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CleanupThreshold {
    /// Jobs completed more than this many seconds ago.
    OlderThan(u64),
    /// Jobs completed before this epoch second.
    Before(i64),
}

impl CleanupThreshold {
    /// Interpret a raw number the way older callers pass it: values above
    /// one billion are absolute epochs, anything else is an age in seconds.
    pub fn from_raw(value: i64) -> Self {
        if value > ABSOLUTE_CUTOFF_THRESHOLD {
            Self::Before(value)
        } else {
            Self::OlderThan(value.max(0) as u64)
        }
    }

    /// Absolute cutoff relative to `now`.
    pub fn cutoff_at(&self, now: i64) -> i64 {
        match *self {
            Self::OlderThan(secs) => now.saturating_sub(i64::try_from(secs).unwrap_or(i64::MAX)),
            Self::Before(epoch) => epoch,
        }
    }

    /// Absolute cutoff relative to the current time.
    pub fn cutoff(&self) -> i64 {
        self.cutoff_at(now_epoch())
    }

    /// Whether a completed job falls before the cutoff. A missing
    /// `completed_at` counts as the epoch.
    pub fn is_expired(job: &Job, cutoff: i64) -> bool {
        job.completed_at().unwrap_or(0) < cutoff
    }
}

//! Process-local job storage.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

use filequeue_core::error::AppError;
use filequeue_core::result::AppResult;
use filequeue_core::types::{JobId, now_epoch};
use filequeue_entity::job::{Job, JobStatus};

use crate::provider::{CleanupThreshold, JobStorage, StorageStats};

/// Job storage held in a map keyed by id.
///
/// Jobs do not survive the process. Iteration follows id order, which for
/// v7 ids is creation order.
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    /// Every stored job; the job's own status is its partition.
    jobs: Arc<RwLock<BTreeMap<JobId, Job>>>,
}

impl MemoryStorage {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    async fn collect(&self, status: JobStatus, limit: Option<usize>) -> Vec<Job> {
        let jobs = self.jobs.read().await;
        jobs.values()
            .filter(|job| job.status() == status)
            .take(limit.unwrap_or(usize::MAX))
            .cloned()
            .collect()
    }
}

#[async_trait]
impl JobStorage for MemoryStorage {
    fn provider_type(&self) -> &str {
        "memory"
    }

    async fn save(&self, job: &Job) -> AppResult<()> {
        self.jobs.write().await.insert(*job.id(), job.clone());
        Ok(())
    }

    async fn get(&self, id: &JobId) -> AppResult<Option<Job>> {
        Ok(self.jobs.read().await.get(id).cloned())
    }

    async fn delete(&self, job: &Job) -> AppResult<bool> {
        let mut jobs = self.jobs.write().await;
        let present = jobs
            .get(job.id())
            .is_some_and(|stored| stored.status() == job.status());
        if present {
            jobs.remove(job.id());
        }
        Ok(present)
    }

    async fn update_status(&self, job: &mut Job, status: JobStatus) -> AppResult<()> {
        let mut jobs = self.jobs.write().await;
        let from = job.status();

        match jobs.get(job.id()) {
            Some(stored) if stored.status() == from && stored.revision() == job.revision() => {}
            _ => {
                return Err(AppError::conflict(format!(
                    "Job {} is no longer {from} at revision {}",
                    job.id(),
                    job.revision()
                )));
            }
        }

        let mut updated = job.clone();
        updated.set_status(status);
        updated.advance_revision();
        jobs.insert(*updated.id(), updated.clone());
        debug!(job_id = %job.id(), from = %from, to = %status, "Moved job");
        *job = updated;
        Ok(())
    }

    async fn next_pending_job(&self) -> AppResult<Option<Job>> {
        let now = now_epoch();
        let jobs = self.jobs.read().await;
        Ok(jobs.values().find(|job| job.is_ready_at(now)).cloned())
    }

    async fn pending_jobs(&self) -> AppResult<Vec<Job>> {
        Ok(self.collect(JobStatus::Pending, None).await)
    }

    async fn jobs_by_status(
        &self,
        status: JobStatus,
        limit: Option<usize>,
    ) -> AppResult<Vec<Job>> {
        Ok(self.collect(status, limit).await)
    }

    async fn stats(&self) -> AppResult<StorageStats> {
        let jobs = self.jobs.read().await;
        let mut stats = StorageStats::default();
        for status in JobStatus::ALL {
            let count = jobs.values().filter(|job| job.status() == status).count();
            stats.record(status, count);
        }
        Ok(stats)
    }

    async fn cleanup(&self, threshold: CleanupThreshold) -> AppResult<usize> {
        let cutoff = threshold.cutoff();
        let mut jobs = self.jobs.write().await;
        let before = jobs.len();
        jobs.retain(|_, job| {
            job.status() != JobStatus::Completed || !CleanupThreshold::is_expired(job, cutoff)
        });
        Ok(before - jobs.len())
    }

    async fn clear_cache(&self) -> AppResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use filequeue_core::ErrorKind;
    use filequeue_entity::job::{JobOptions, JobPayload};

    fn job(name: &str) -> Job {
        Job::new(name, JobPayload::new(), JobOptions::new()).expect("job")
    }

    #[tokio::test]
    async fn test_claim_is_compare_and_swap() {
        let storage = MemoryStorage::new();
        let job = job("log");
        storage.save(&job).await.expect("save");

        let mut first = job.clone();
        let mut second = job.clone();
        storage
            .update_status(&mut first, JobStatus::Processing)
            .await
            .expect("claim");
        let err = storage
            .update_status(&mut second, JobStatus::Processing)
            .await
            .unwrap_err();

        assert_eq!(err.kind, ErrorKind::Conflict);
        assert_eq!(second.status(), JobStatus::Pending);
        assert!(storage.next_pending_job().await.expect("next").is_none());
    }

    #[tokio::test]
    async fn test_stale_claim_after_requeue_conflicts() {
        let storage = MemoryStorage::new();
        storage.save(&job("flaky")).await.expect("save");

        let mut stale = storage.next_pending_job().await.expect("next").expect("job");

        let mut current = stale.clone();
        current.increment_attempts();
        storage
            .update_status(&mut current, JobStatus::Processing)
            .await
            .expect("claim");
        current.set_metadata("error", "first attempt failed");
        storage
            .update_status(&mut current, JobStatus::Pending)
            .await
            .expect("requeue");

        stale.increment_attempts();
        let err = storage
            .update_status(&mut stale, JobStatus::Processing)
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::Conflict);

        let stored = storage.get(current.id()).await.expect("get").expect("found");
        assert_eq!(stored.status(), JobStatus::Pending);
        assert_eq!(stored.attempts(), 1);
        assert_eq!(stored.revision(), 2);
        assert!(stored.metadata_value("error").is_some());
    }

    #[tokio::test]
    async fn test_delete_respects_partition() {
        let storage = MemoryStorage::new();
        let mut job = job("log");
        storage.save(&job).await.expect("save");

        let mut stale = job.clone();
        stale.assume_status(JobStatus::Failed);
        assert!(!storage.delete(&stale).await.expect("delete"));

        storage
            .update_status(&mut job, JobStatus::Completed)
            .await
            .expect("complete");
        assert!(storage.delete(&job).await.expect("delete"));
        assert!(storage.get(job.id()).await.expect("get").is_none());
    }

    #[tokio::test]
    async fn test_stats_and_cleanup() {
        let storage = MemoryStorage::new();
        let mut done = job("done");
        storage.save(&done).await.expect("save");
        storage
            .update_status(&mut done, JobStatus::Completed)
            .await
            .expect("complete");
        storage.save(&job("waiting")).await.expect("save");

        let stats = storage.stats().await.expect("stats");
        assert_eq!((stats.pending, stats.completed, stats.total), (1, 1, 2));

        let removed = storage
            .cleanup(CleanupThreshold::Before(now_epoch() + 1))
            .await
            .expect("cleanup");
        assert_eq!(removed, 1);
        assert_eq!(storage.stats().await.expect("stats").total, 1);
    }
}

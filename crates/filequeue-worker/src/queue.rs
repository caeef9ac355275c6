//! Job queue: enqueue, claim, run, and settle jobs against storage.

use std::sync::Arc;

use serde_json::Value;
use tracing;

use filequeue_core::config::AppConfig;
use filequeue_core::config::queue::QueueConfig;
use filequeue_core::error::{AppError, ErrorKind};
use filequeue_core::result::AppResult;
use filequeue_core::types::{JobId, now_epoch};
use filequeue_entity::job::metadata;
use filequeue_entity::job::{Job, JobOptions, JobPayload, JobStatus};
use filequeue_storage::{CleanupThreshold, JobStorage, StorageManager, StorageStats};

use crate::executor::JobHandler;

/// Outcome of [`JobQueue::process_jobs`].
#[derive(Debug, Default)]
pub struct ProcessBatch {
    /// Jobs that completed, in processing order.
    pub processed: Vec<Job>,
    /// Errors raised along the way.
    pub errors: Vec<AppError>,
}

/// Job queue for enqueuing and processing work.
#[derive(Debug, Clone)]
pub struct JobQueue {
    /// Backing job storage.
    storage: Arc<dyn JobStorage>,
    /// Retry and cleanup defaults.
    config: QueueConfig,
}

impl JobQueue {
    /// Create a queue over an existing storage provider.
    pub fn new(storage: Arc<dyn JobStorage>, config: QueueConfig) -> Self {
        Self { storage, config }
    }

    /// Build the configured storage provider and wrap it in a queue.
    pub async fn from_config(config: &AppConfig) -> AppResult<Self> {
        let storage = StorageManager::new(&config.storage, &config.cache).await?;
        Ok(Self::new(storage.provider(), config.queue.clone()))
    }

    /// The backing storage.
    pub fn storage(&self) -> Arc<dyn JobStorage> {
        Arc::clone(&self.storage)
    }

    /// Queue defaults.
    pub fn config(&self) -> &QueueConfig {
        &self.config
    }

    /// Enqueue a new job.
    pub async fn add(
        &self,
        name: impl Into<String>,
        payload: JobPayload,
        mut options: JobOptions,
    ) -> AppResult<Job> {
        options
            .max_attempts
            .get_or_insert(self.config.default_max_attempts);

        let job = Job::new(name, payload, options)?;
        self.storage.save(&job).await?;

        tracing::debug!(
            "Enqueued job: id={}, type='{}', execute_at={:?}",
            job.id(),
            job.name(),
            job.execute_at()
        );

        Ok(job)
    }

    /// Enqueue a job that becomes runnable `delay_seconds` from now.
    pub async fn later(
        &self,
        name: impl Into<String>,
        payload: JobPayload,
        delay_seconds: u64,
        options: JobOptions,
    ) -> AppResult<Job> {
        let delay = i64::try_from(delay_seconds)
            .map_err(|_| AppError::invalid_job(format!("Delay too large: {delay_seconds}s")))?;
        self.later_at(name, payload, now_epoch().saturating_add(delay), options)
            .await
    }

    /// Enqueue a job that becomes runnable at an absolute epoch second.
    pub async fn later_at(
        &self,
        name: impl Into<String>,
        payload: JobPayload,
        execute_at: i64,
        options: JobOptions,
    ) -> AppResult<Job> {
        self.add(name, payload, options.execute_at(execute_at)).await
    }

    /// Look up a job by id.
    pub async fn get_job(&self, id: &JobId) -> AppResult<Option<Job>> {
        self.storage.get(id).await
    }

    /// Look up a job by id, failing with `JobNotFound` when absent.
    pub async fn find_job(&self, id: &JobId) -> AppResult<Job> {
        self.storage
            .get(id)
            .await?
            .ok_or_else(|| AppError::job_not_found(format!("Job not found: {id}")))
    }

    /// Remove a job from its current partition.
    pub async fn delete(&self, job: &Job) -> AppResult<bool> {
        self.storage.delete(job).await
    }

    /// Claim the next ready job, run it through `handler`, and settle it.
    ///
    /// Returns `Ok(None)` when nothing is ready. When the handler fails the
    /// job is moved back to pending (or to failed once its attempts are used
    /// up) before the error is returned as `JobFailed` or
    /// `MaxAttemptsExceeded`.
    pub async fn process_next<H>(&self, handler: &H) -> AppResult<Option<Job>>
    where
        H: JobHandler + ?Sized,
    {
        let mut job = loop {
            let Some(mut candidate) = self.storage.next_pending_job().await? else {
                return Ok(None);
            };

            candidate.increment_attempts();
            match self
                .storage
                .update_status(&mut candidate, JobStatus::Processing)
                .await
            {
                Ok(()) => break candidate,
                Err(e) if e.kind == ErrorKind::Conflict => {
                    tracing::debug!("Lost claim on job {}, trying next", candidate.id());
                }
                Err(e) => return Err(e),
            }
        };

        tracing::debug!(
            "Claimed job: id={}, type='{}', attempt={}/{}",
            job.id(),
            job.name(),
            job.attempts(),
            job.max_attempts()
        );

        match handler.execute(job.payload(), &job).await {
            Ok(result) => {
                self.complete(&mut job, result).await?;
                Ok(Some(job))
            }
            Err(err) => {
                job.record_error(&err.detail())?;
                let exhausted = job.has_reached_max_attempts();
                let (status, kind) = if exhausted {
                    (JobStatus::Failed, ErrorKind::MaxAttemptsExceeded)
                } else {
                    (JobStatus::Pending, ErrorKind::JobFailed)
                };
                self.storage.update_status(&mut job, status).await?;

                if exhausted {
                    tracing::error!(
                        "Job {} failed permanently after {} attempts: {}",
                        job.id(),
                        job.attempts(),
                        err
                    );
                } else {
                    tracing::warn!(
                        "Job {} failed (attempt {}/{}), will retry: {}",
                        job.id(),
                        job.attempts(),
                        job.max_attempts(),
                        err
                    );
                }

                Err(AppError::with_source(
                    kind,
                    format!("Job {} failed: {}", job.id(), err),
                    err,
                ))
            }
        }
    }

    async fn complete(&self, job: &mut Job, result: Value) -> AppResult<()> {
        job.set_metadata(metadata::RESULT, result);
        self.storage
            .update_status(job, JobStatus::Completed)
            .await?;
        tracing::debug!("Job completed: id={}", job.id());
        Ok(())
    }

    /// Process up to `count` jobs (`0` = until none are ready).
    ///
    /// With a count, the batch stops at the first failure. Without one, job
    /// failures are collected and processing continues. Any other error ends
    /// the batch and is collected as well.
    pub async fn process_jobs<H>(&self, handler: &H, count: usize) -> AppResult<ProcessBatch>
    where
        H: JobHandler + ?Sized,
    {
        let limit = if count > 0 { count } else { usize::MAX };
        let mut batch = ProcessBatch::default();

        for _ in 0..limit {
            match self.process_next(handler).await {
                Ok(Some(job)) => batch.processed.push(job),
                Ok(None) => break,
                Err(e) => {
                    let keep_going = count == 0 && e.kind.is_job_failure();
                    batch.errors.push(e);
                    if !keep_going {
                        break;
                    }
                }
            }
        }

        Ok(batch)
    }

    /// Delete completed jobs older than the threshold.
    pub async fn cleanup(&self, threshold: CleanupThreshold) -> AppResult<usize> {
        let removed = self.storage.cleanup(threshold).await?;
        tracing::info!("Cleaned up {} completed jobs", removed);
        Ok(removed)
    }

    /// Delete completed jobs older than the configured cleanup age.
    pub async fn cleanup_expired(&self) -> AppResult<usize> {
        self.cleanup(CleanupThreshold::OlderThan(self.config.cleanup_age_seconds))
            .await
    }

    /// Requeue a failed job with a fresh attempt budget.
    pub async fn retry(&self, id: &JobId) -> AppResult<Job> {
        let mut job = self.find_job(id).await?;
        if job.status() != JobStatus::Failed {
            return Err(AppError::invalid_job(format!(
                "Only failed jobs can be retried; job {} is {}",
                id,
                job.status()
            )));
        }

        job.reset_attempts();
        self.storage
            .update_status(&mut job, JobStatus::Pending)
            .await?;

        tracing::debug!("Job retried: id={}", id);
        Ok(job)
    }

    /// Jobs parked in the failed partition.
    pub async fn failed_jobs(&self) -> AppResult<Vec<Job>> {
        self.storage.jobs_by_status(JobStatus::Failed, None).await
    }

    /// Jobs waiting in the pending partition, ready or not.
    pub async fn pending_jobs(&self) -> AppResult<Vec<Job>> {
        self.storage.pending_jobs().await
    }

    /// Storage statistics.
    pub async fn stats(&self) -> AppResult<StorageStats> {
        self.storage.stats().await
    }
}

//! Job entity model.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use filequeue_core::error::AppError;
use filequeue_core::result::AppResult;
use filequeue_core::types::{JobId, now_epoch};

use super::metadata::{self, JobErrorDetail, JobMetadata};
use super::payload::JobPayload;
use super::status::JobStatus;

/// Attempts allowed when neither the caller nor the queue overrides it.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// A durable unit of work.
///
/// Serialized with the field names `id`, `name`, `payload`, `status`,
/// `executeAt`, `attempts`, `maxAttempts`, `metadata`, `revision`. Fields are private so
/// the identifier cannot change after construction; status changes go
/// through [`Job::set_status`], which storage backends call while moving the
/// record between partitions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    /// Unique job identifier.
    id: JobId,
    /// Handler type tag.
    name: String,
    /// Input for the handler.
    #[serde(default)]
    payload: JobPayload,
    /// Current status.
    #[serde(default = "default_status")]
    status: JobStatus,
    /// Earliest execution time in epoch seconds (None = immediate).
    #[serde(default)]
    execute_at: Option<i64>,
    /// Number of claimed attempts so far.
    #[serde(default)]
    attempts: u32,
    /// Ceiling on attempts.
    #[serde(default = "default_max_attempts")]
    max_attempts: u32,
    /// Audit fields.
    #[serde(default)]
    metadata: JobMetadata,
    /// Number of status moves committed to storage.
    #[serde(default)]
    revision: u64,
}

fn default_status() -> JobStatus {
    JobStatus::Pending
}

fn default_max_attempts() -> u32 {
    DEFAULT_MAX_ATTEMPTS
}

impl Job {
    /// Create a new pending job.
    ///
    /// Fails with `InvalidJob` when the name is blank or `max_attempts` is zero.
    pub fn new(name: impl Into<String>, payload: JobPayload, options: JobOptions) -> AppResult<Self> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(AppError::invalid_job("Job name must not be empty"));
        }

        let max_attempts = options.max_attempts.unwrap_or(DEFAULT_MAX_ATTEMPTS);
        if max_attempts == 0 {
            return Err(AppError::invalid_job(format!(
                "Job '{name}' must allow at least one attempt"
            )));
        }

        let mut metadata = JobMetadata::new();
        metadata.insert(metadata::CREATED_AT.to_string(), Value::from(now_epoch()));

        Ok(Self {
            id: JobId::new(),
            name,
            payload,
            status: JobStatus::Pending,
            execute_at: options.execute_at,
            attempts: 0,
            max_attempts,
            metadata,
            revision: 0,
        })
    }

    /// Unique job identifier.
    pub fn id(&self) -> &JobId {
        &self.id
    }

    /// Handler type tag.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Handler input.
    pub fn payload(&self) -> &JobPayload {
        &self.payload
    }

    /// Current status.
    pub fn status(&self) -> JobStatus {
        self.status
    }

    /// Earliest execution time in epoch seconds.
    pub fn execute_at(&self) -> Option<i64> {
        self.execute_at
    }

    /// Number of claimed attempts.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Ceiling on attempts.
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Storage revision this snapshot was read at.
    ///
    /// A status move only succeeds if the stored record still carries the
    /// same revision.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Step to the next revision. Called by storage backends when they
    /// commit a status move.
    pub fn advance_revision(&mut self) {
        self.revision += 1;
    }

    /// All audit metadata.
    pub fn metadata(&self) -> &JobMetadata {
        &self.metadata
    }

    /// A single metadata value.
    pub fn metadata_value(&self, key: &str) -> Option<&Value> {
        self.metadata.get(key)
    }

    /// Set a metadata value, replacing any previous one.
    pub fn set_metadata(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.metadata.insert(key.into(), value.into());
    }

    /// Epoch seconds at which the job completed, if it has.
    pub fn completed_at(&self) -> Option<i64> {
        self.metadata
            .get(metadata::COMPLETED_AT)
            .and_then(Value::as_i64)
    }

    /// Handler result stored on completion.
    pub fn result(&self) -> Option<&Value> {
        self.metadata.get(metadata::RESULT)
    }

    /// Error detail of the latest failed attempt.
    pub fn last_error(&self) -> Option<JobErrorDetail> {
        self.metadata
            .get(metadata::ERROR)
            .cloned()
            .and_then(|v| serde_json::from_value(v).ok())
    }

    /// Record a failed attempt's error detail.
    pub fn record_error(&mut self, detail: &JobErrorDetail) -> AppResult<()> {
        let value = serde_json::to_value(detail)?;
        self.metadata.insert(metadata::ERROR.to_string(), value);
        Ok(())
    }

    /// Explicitly (re)schedule the job. `None` makes it runnable immediately.
    pub fn schedule_at(&mut self, execute_at: Option<i64>) {
        self.execute_at = execute_at;
    }

    /// Count one more attempt. Called exactly once per claim.
    pub fn increment_attempts(&mut self) {
        self.attempts += 1;
    }

    /// Whether the attempt budget is used up.
    pub fn has_reached_max_attempts(&self) -> bool {
        self.attempts >= self.max_attempts
    }

    /// Reset the attempt counter for a manual retry of a failed job.
    pub fn reset_attempts(&mut self) {
        self.attempts = 0;
        self.metadata
            .insert(metadata::RETRIED_AT.to_string(), Value::from(now_epoch()));
    }

    /// Move to a new status and stamp the matching audit timestamp.
    ///
    /// This only mutates the in-memory record. Persisting the move between
    /// partitions is the storage backend's job.
    pub fn set_status(&mut self, status: JobStatus) {
        self.status = status;

        let stamp = match status {
            JobStatus::Processing => Some(metadata::PROCESSING_STARTED_AT),
            JobStatus::Completed => Some(metadata::COMPLETED_AT),
            JobStatus::Failed => Some(metadata::FAILED_AT),
            JobStatus::Pending => None,
        };

        if let Some(key) = stamp {
            self.metadata
                .insert(key.to_string(), Value::from(now_epoch()));
        }
    }

    /// Restore the status read from a storage partition without stamping metadata.
    pub fn assume_status(&mut self, status: JobStatus) {
        self.status = status;
    }

    /// Whether the job is pending and its scheduled time has arrived.
    pub fn is_ready_to_execute(&self) -> bool {
        self.is_ready_at(now_epoch())
    }

    /// Readiness against an explicit clock.
    pub fn is_ready_at(&self, now: i64) -> bool {
        if self.status != JobStatus::Pending {
            return false;
        }

        match self.execute_at {
            None => true,
            Some(at) => now >= at,
        }
    }
}

/// Per-job overrides accepted when enqueuing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobOptions {
    /// Earliest execution time in epoch seconds.
    #[serde(default)]
    pub execute_at: Option<i64>,
    /// Attempts allowed for this job.
    #[serde(default)]
    pub max_attempts: Option<u32>,
}

impl JobOptions {
    /// Options with no overrides.
    pub fn new() -> Self {
        Self::default()
    }

    /// Delay the job until the given epoch second.
    pub fn execute_at(mut self, at: i64) -> Self {
        self.execute_at = Some(at);
        self
    }

    /// Override the attempt ceiling.
    pub fn max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = Some(attempts);
        self
    }
}

//! File-system job storage.
//!
//! Layout: `<root>/<status>/<id>.json`, one pretty-printed JSON document per
//! job. A status change is a `rename` between partition directories, which
//! is atomic on a single file system; whichever process renames first owns
//! the move and everyone else sees the source vanish.

use std::io;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;
use tracing::{debug, warn};

use filequeue_cache::JobCache;
use filequeue_core::error::{AppError, ErrorKind};
use filequeue_core::result::AppResult;
use filequeue_core::types::{JobId, now_epoch};
use filequeue_entity::job::{Job, JobStatus};

use crate::provider::{CleanupThreshold, JobStorage, StorageStats};

/// Extension of committed job records.
const RECORD_EXTENSION: &str = "json";

/// Job storage backed by one directory per status.
#[derive(Debug, Clone)]
pub struct FileStorage {
    /// Root directory holding the partition directories.
    root: PathBuf,
    /// Optional snapshot cache.
    cache: Option<JobCache>,
}

impl FileStorage {
    /// Open (or create) a store rooted at `root_path`.
    pub async fn new(root_path: impl AsRef<Path>, cache: Option<JobCache>) -> AppResult<Self> {
        let root = root_path.as_ref().to_path_buf();
        for status in JobStatus::ALL {
            let dir = root.join(status.as_str());
            fs::create_dir_all(&dir).await.map_err(|e| {
                AppError::with_source(
                    ErrorKind::Storage,
                    format!("Failed to create partition directory: {}", dir.display()),
                    e,
                )
            })?;
        }

        debug!(root = %root.display(), cached = cache.is_some(), "Opened file job storage");
        Ok(Self { root, cache })
    }

    /// Root directory of the store.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory of one status partition.
    pub fn partition_dir(&self, status: JobStatus) -> PathBuf {
        self.root.join(status.as_str())
    }

    /// Path of a job record inside a partition.
    pub fn job_path(&self, status: JobStatus, id: &JobId) -> PathBuf {
        self.partition_dir(status)
            .join(format!("{id}.{RECORD_EXTENSION}"))
    }

    fn temp_path(&self, status: JobStatus, id: &JobId) -> PathBuf {
        self.partition_dir(status)
            .join(format!(".{id}.{RECORD_EXTENSION}.tmp"))
    }

    fn cache_insert(&self, job: &Job) {
        if let Some(cache) = &self.cache {
            cache.insert(job);
        }
    }

    fn cache_remove(&self, id: &JobId) {
        if let Some(cache) = &self.cache {
            cache.remove(id);
        }
    }

    /// Write the record through a temp file so readers never see a partial document.
    async fn write_record(&self, status: JobStatus, job: &Job) -> AppResult<()> {
        let path = self.job_path(status, job.id());
        let temp = self.temp_path(status, job.id());
        let bytes = serde_json::to_vec_pretty(job)?;

        fs::write(&temp, &bytes).await.map_err(|e| {
            AppError::with_source(
                ErrorKind::Storage,
                format!("Failed to write job file: {}", temp.display()),
                e,
            )
        })?;

        fs::rename(&temp, &path).await.map_err(|e| {
            AppError::with_source(
                ErrorKind::Storage,
                format!("Failed to commit job file: {}", path.display()),
                e,
            )
        })
    }

    /// Read one record. Missing files yield `None`; corrupt or unreadable
    /// files are logged and also yield `None`.
    async fn read_record(&self, path: &Path, partition: JobStatus) -> Option<Job> {
        let bytes = match fs::read(path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return None,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Skipping unreadable job file");
                return None;
            }
        };

        let mut job: Job = match serde_json::from_slice(&bytes) {
            Ok(job) => job,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Skipping corrupt job file");
                return None;
            }
        };

        if job.status() != partition {
            warn!(
                job_id = %job.id(),
                recorded = %job.status(),
                partition = %partition,
                "Job record disagrees with its partition, using partition status"
            );
            job.assume_status(partition);
        }

        Some(job)
    }

    /// Revision of the record at `path`. Missing or corrupt records yield `None`.
    async fn stored_revision(&self, path: &Path) -> AppResult<Option<u64>> {
        let bytes = match fs::read(path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(AppError::with_source(
                    ErrorKind::Storage,
                    format!("Failed to read job file: {}", path.display()),
                    e,
                ));
            }
        };
        Ok(serde_json::from_slice::<Job>(&bytes)
            .ok()
            .map(|job| job.revision()))
    }

    /// Undo a move whose revision check failed.
    async fn move_back(&self, moved: &Path, original: &Path) -> AppResult<()> {
        fs::rename(moved, original).await.map_err(|e| {
            AppError::with_source(
                ErrorKind::Storage,
                format!("Failed to restore job file: {}", original.display()),
                e,
            )
        })?;
        warn!(path = %original.display(), "Rejected stale status move");
        Ok(())
    }

    /// Committed record paths of a partition in file-name order.
    async fn list_partition(&self, status: JobStatus) -> AppResult<Vec<PathBuf>> {
        let dir = self.partition_dir(status);
        let mut entries = match fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(AppError::with_source(
                    ErrorKind::Storage,
                    format!("Failed to list partition: {}", dir.display()),
                    e,
                ));
            }
        };

        let mut paths = Vec::new();
        while let Some(entry) = entries.next_entry().await.map_err(|e| {
            AppError::with_source(
                ErrorKind::Storage,
                format!("Failed to read partition entry in {}", dir.display()),
                e,
            )
        })? {
            let path = entry.path();
            if is_record_path(&path) {
                paths.push(path);
            }
        }

        paths.sort();
        Ok(paths)
    }

    async fn load_partition(&self, status: JobStatus, limit: Option<usize>) -> AppResult<Vec<Job>> {
        let mut jobs = Vec::new();
        for path in self.list_partition(status).await? {
            if limit.is_some_and(|limit| jobs.len() >= limit) {
                break;
            }
            if let Some(job) = self.read_record(&path, status).await {
                jobs.push(job);
            }
        }
        Ok(jobs)
    }
}

/// Whether a directory entry is a committed job record.
fn is_record_path(path: &Path) -> bool {
    let is_json = path
        .extension()
        .is_some_and(|ext| ext == RECORD_EXTENSION);
    let hidden = path
        .file_name()
        .and_then(|name| name.to_str())
        .is_none_or(|name| name.starts_with('.'));
    is_json && !hidden
}

fn conflict(job: &Job) -> AppError {
    AppError::conflict(format!(
        "Job {} is no longer {} at revision {}",
        job.id(),
        job.status(),
        job.revision()
    ))
}

#[async_trait]
impl JobStorage for FileStorage {
    fn provider_type(&self) -> &str {
        "file"
    }

    async fn save(&self, job: &Job) -> AppResult<()> {
        self.write_record(job.status(), job).await?;
        self.cache_insert(job);
        debug!(job_id = %job.id(), status = %job.status(), "Saved job");
        Ok(())
    }

    async fn get(&self, id: &JobId) -> AppResult<Option<Job>> {
        if let Some(job) = self.cache.as_ref().and_then(|cache| cache.get(id)) {
            return Ok(Some(job));
        }

        for status in JobStatus::ALL {
            let path = self.job_path(status, id);
            if let Some(job) = self.read_record(&path, status).await {
                self.cache_insert(&job);
                return Ok(Some(job));
            }
        }

        Ok(None)
    }

    async fn delete(&self, job: &Job) -> AppResult<bool> {
        self.cache_remove(job.id());

        let path = self.job_path(job.status(), job.id());
        match fs::remove_file(&path).await {
            Ok(()) => {
                debug!(job_id = %job.id(), "Deleted job");
                Ok(true)
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(AppError::with_source(
                ErrorKind::Storage,
                format!("Failed to delete job file: {}", path.display()),
                e,
            )),
        }
    }

    async fn update_status(&self, job: &mut Job, status: JobStatus) -> AppResult<()> {
        let from = job.status();
        let source = self.job_path(from, job.id());
        let target = self.job_path(status, job.id());

        if from != status {
            match fs::rename(&source, &target).await {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::NotFound => return Err(conflict(job)),
                Err(e) => {
                    return Err(AppError::with_source(
                        ErrorKind::Storage,
                        format!("Failed to move job {} from {from} to {status}", job.id()),
                        e,
                    ));
                }
            }
        }

        // The rename only proves the record was in `from`; it may have been
        // claimed and requeued since the caller read it.
        if self.stored_revision(&target).await? != Some(job.revision()) {
            if from != status {
                self.move_back(&target, &source).await?;
            }
            self.cache_remove(job.id());
            return Err(conflict(job));
        }

        let mut updated = job.clone();
        updated.set_status(status);
        updated.advance_revision();
        self.write_record(status, &updated).await?;
        self.cache_insert(&updated);

        debug!(
            job_id = %job.id(),
            from = %from,
            to = %status,
            revision = updated.revision(),
            "Moved job"
        );
        *job = updated;
        Ok(())
    }

    async fn next_pending_job(&self) -> AppResult<Option<Job>> {
        let now = now_epoch();
        for path in self.list_partition(JobStatus::Pending).await? {
            if let Some(job) = self.read_record(&path, JobStatus::Pending).await {
                if job.is_ready_at(now) {
                    return Ok(Some(job));
                }
            }
        }
        Ok(None)
    }

    async fn pending_jobs(&self) -> AppResult<Vec<Job>> {
        self.load_partition(JobStatus::Pending, None).await
    }

    async fn jobs_by_status(
        &self,
        status: JobStatus,
        limit: Option<usize>,
    ) -> AppResult<Vec<Job>> {
        self.load_partition(status, limit).await
    }

    async fn stats(&self) -> AppResult<StorageStats> {
        let mut stats = StorageStats::default();
        for status in JobStatus::ALL {
            let count = self.list_partition(status).await?.len();
            stats.record(status, count);
        }
        stats.cache_size = self.cache.as_ref().map_or(0, JobCache::len);
        Ok(stats)
    }

    async fn cleanup(&self, threshold: CleanupThreshold) -> AppResult<usize> {
        let cutoff = threshold.cutoff();
        let mut removed = 0;

        for job in self.load_partition(JobStatus::Completed, None).await? {
            if CleanupThreshold::is_expired(&job, cutoff) && self.delete(&job).await? {
                removed += 1;
            }
        }

        if removed > 0 {
            debug!(removed, cutoff, "Cleaned up completed jobs");
        }
        Ok(removed)
    }

    async fn clear_cache(&self) -> AppResult<()> {
        if let Some(cache) = &self.cache {
            cache.clear();
        }
        Ok(())
    }
}

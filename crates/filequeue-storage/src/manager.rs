//! Storage manager: selects the configured provider and delegates to it.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use filequeue_cache::JobCache;
use filequeue_core::config::cache::CacheConfig;
use filequeue_core::config::storage::StorageConfig;
use filequeue_core::error::AppError;
use filequeue_core::result::AppResult;
use filequeue_core::types::JobId;
use filequeue_entity::job::{Job, JobStatus};

use crate::provider::{CleanupThreshold, JobStorage, StorageStats};
#[cfg(feature = "file")]
use crate::providers::FileStorage;
use crate::providers::MemoryStorage;

/// Front for the storage provider chosen by configuration.
#[derive(Debug, Clone)]
pub struct StorageManager {
    /// The active provider.
    provider: Arc<dyn JobStorage>,
}

impl StorageManager {
    /// Build the provider named by `storage.provider`.
    ///
    /// Unknown providers fail with `ErrorKind::Configuration`.
    pub async fn new(storage: &StorageConfig, cache: &CacheConfig) -> AppResult<Self> {
        let provider: Arc<dyn JobStorage> = match storage.provider.as_str() {
            #[cfg(feature = "file")]
            "file" => Arc::new(
                FileStorage::new(&storage.root_path, JobCache::from_config(cache)).await?,
            ),
            "memory" => Arc::new(MemoryStorage::new()),
            other => {
                return Err(AppError::configuration(format!(
                    "Unknown storage provider: {other}"
                )));
            }
        };

        info!(
            provider = provider.provider_type(),
            root = %storage.root_path,
            cache_capacity = cache.enabled.then_some(cache.capacity),
            "Job storage initialized"
        );
        Ok(Self { provider })
    }

    /// Wrap an already-built provider.
    pub fn with_provider(provider: Arc<dyn JobStorage>) -> Self {
        Self { provider }
    }

    /// The active provider.
    pub fn provider(&self) -> Arc<dyn JobStorage> {
        Arc::clone(&self.provider)
    }
}

#[async_trait]
impl JobStorage for StorageManager {
    fn provider_type(&self) -> &str {
        self.provider.provider_type()
    }

    async fn save(&self, job: &Job) -> AppResult<()> {
        self.provider.save(job).await
    }

    async fn get(&self, id: &JobId) -> AppResult<Option<Job>> {
        self.provider.get(id).await
    }

    async fn delete(&self, job: &Job) -> AppResult<bool> {
        self.provider.delete(job).await
    }

    async fn update_status(&self, job: &mut Job, status: JobStatus) -> AppResult<()> {
        self.provider.update_status(job, status).await
    }

    async fn next_pending_job(&self) -> AppResult<Option<Job>> {
        self.provider.next_pending_job().await
    }

    async fn pending_jobs(&self) -> AppResult<Vec<Job>> {
        self.provider.pending_jobs().await
    }

    async fn jobs_by_status(
        &self,
        status: JobStatus,
        limit: Option<usize>,
    ) -> AppResult<Vec<Job>> {
        self.provider.jobs_by_status(status, limit).await
    }

    async fn stats(&self) -> AppResult<StorageStats> {
        self.provider.stats().await
    }

    async fn cleanup(&self, threshold: CleanupThreshold) -> AppResult<usize> {
        self.provider.cleanup(threshold).await
    }

    async fn clear_cache(&self) -> AppResult<()> {
        self.provider.clear_cache().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use filequeue_core::ErrorKind;

    #[tokio::test]
    async fn test_selects_memory_provider() {
        let storage = StorageConfig {
            provider: "memory".to_string(),
            ..StorageConfig::default()
        };
        let manager = StorageManager::new(&storage, &CacheConfig::default())
            .await
            .expect("manager");
        assert_eq!(manager.provider_type(), "memory");
    }

    #[tokio::test]
    async fn test_selects_file_provider() {
        let dir = tempfile::tempdir().expect("tempdir");
        let storage = StorageConfig {
            provider: "file".to_string(),
            root_path: dir.path().join("jobs").to_string_lossy().into_owned(),
        };
        let manager = StorageManager::new(&storage, &CacheConfig::default())
            .await
            .expect("manager");
        assert_eq!(manager.provider_type(), "file");
        assert!(dir.path().join("jobs").join("pending").is_dir());
    }

    #[tokio::test]
    async fn test_unknown_provider_rejected() {
        let storage = StorageConfig {
            provider: "redis".to_string(),
            ..StorageConfig::default()
        };
        let err = StorageManager::new(&storage, &CacheConfig::default())
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::Configuration);
    }
}

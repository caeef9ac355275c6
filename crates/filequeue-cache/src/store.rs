//! In-memory job cache implementation using the moka crate.

use moka::policy::EvictionPolicy;
use moka::sync::Cache;
use tracing::trace;

use filequeue_core::config::cache::CacheConfig;
use filequeue_core::types::JobId;
use filequeue_entity::job::Job;

/// Bounded map from job id to the last job snapshot seen by this process.
///
/// Eviction is least-recently-used and is applied synchronously on every
/// insert, so the cache never holds more than `capacity` entries once
/// `insert` returns. For entries that are never read back this is
/// insertion order.
#[derive(Debug, Clone)]
pub struct JobCache {
    /// The underlying moka cache.
    cache: Cache<JobId, Job>,
    /// Maximum number of entries.
    capacity: u64,
}

impl JobCache {
    /// Create a cache holding at most `capacity` jobs.
    pub fn new(capacity: u64) -> Self {
        let cache = Cache::builder()
            .max_capacity(capacity)
            .eviction_policy(EvictionPolicy::lru())
            .build();

        Self { cache, capacity }
    }

    /// Build from configuration. Returns `None` when caching is disabled.
    pub fn from_config(config: &CacheConfig) -> Option<Self> {
        if !config.enabled || config.capacity == 0 {
            return None;
        }
        Some(Self::new(config.capacity))
    }

    /// Configured capacity.
    pub fn capacity(&self) -> u64 {
        self.capacity
    }

    /// Look up a job snapshot.
    pub fn get(&self, id: &JobId) -> Option<Job> {
        self.cache.get(id)
    }

    /// Whether a snapshot is cached, without touching recency.
    pub fn contains(&self, id: &JobId) -> bool {
        self.cache.contains_key(id)
    }

    /// Add or overwrite a snapshot, evicting if the cache is over capacity.
    pub fn insert(&self, job: &Job) {
        self.cache.insert(*job.id(), job.clone());
        self.cache.run_pending_tasks();
        trace!(job_id = %job.id(), entries = self.cache.entry_count(), "Cached job");
    }

    /// Drop a snapshot.
    pub fn remove(&self, id: &JobId) {
        self.cache.invalidate(id);
        self.cache.run_pending_tasks();
    }

    /// Drop every snapshot.
    pub fn clear(&self) {
        self.cache.invalidate_all();
        self.cache.run_pending_tasks();
    }

    /// Number of cached snapshots.
    pub fn len(&self) -> u64 {
        self.cache.run_pending_tasks();
        self.cache.entry_count()
    }

    /// Whether the cache holds nothing.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

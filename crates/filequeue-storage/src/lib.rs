//! # filequeue-storage
//!
//! Durable job storage for FileQueue. Records are partitioned by status;
//! moving a job between partitions is a single atomic step so two workers
//! can never both hold the same job in `processing`.
//!
//! Providers: a directory-per-status file store (the default) and a
//! process-local in-memory store.

pub mod manager;
pub mod provider;
pub mod providers;

pub use manager::StorageManager;
pub use provider::{CleanupThreshold, JobStorage, StorageStats};

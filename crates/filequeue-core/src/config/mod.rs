//! Queue configuration schemas.
//!
//! All configuration structs are deserialized from TOML files via the
//! `config` crate. Each sub-module represents a logical configuration
//! section, and every field has a serde default so a missing file yields
//! a working configuration.

pub mod cache;
pub mod logging;
pub mod queue;
pub mod scheduler;
pub mod storage;
pub mod worker;

use serde::{Deserialize, Serialize};

use self::cache::CacheConfig;
use self::logging::LoggingConfig;
use self::queue::QueueConfig;
use self::scheduler::SchedulerConfig;
use self::storage::StorageConfig;
use self::worker::WorkerConfig;

use crate::error::AppError;

/// Root configuration.
///
/// This struct is the top-level deserialization target for the merged
/// TOML configuration files (default.toml + environment overlay).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Job storage settings.
    #[serde(default)]
    pub storage: StorageConfig,
    /// In-memory job cache settings.
    #[serde(default)]
    pub cache: CacheConfig,
    /// Queue retry and cleanup settings.
    #[serde(default)]
    pub queue: QueueConfig,
    /// Worker polling settings.
    #[serde(default)]
    pub worker: WorkerConfig,
    /// Recurring schedule settings.
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Load configuration from TOML files.
    ///
    /// Merges the default configuration with an environment-specific overlay
    /// and environment variables prefixed with `FILEQUEUE__`.
    pub fn load(env: &str) -> Result<Self, AppError> {
        Self::load_from("config", env)
    }

    /// Load configuration from a specific directory.
    pub fn load_from(dir: &str, env: &str) -> Result<Self, AppError> {
        let config = config::Config::builder()
            .add_source(config::File::with_name(&format!("{dir}/default")).required(false))
            .add_source(config::File::with_name(&format!("{dir}/{env}")).required(false))
            .add_source(
                config::Environment::with_prefix("FILEQUEUE")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| AppError::configuration(format!("Failed to build config: {e}")))?;

        let loaded: Self = config
            .try_deserialize()
            .map_err(|e| AppError::configuration(format!("Failed to deserialize config: {e}")))?;

        tracing::debug!(
            provider = %loaded.storage.provider,
            root = %loaded.storage.root_path,
            env,
            "Loaded queue configuration"
        );

        Ok(loaded)
    }
}

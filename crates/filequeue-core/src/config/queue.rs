//! Queue retry and cleanup configuration.

use serde::{Deserialize, Serialize};

/// Queue-level defaults applied when jobs are created and cleaned up.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueConfig {
    /// Attempts allowed for a job unless overridden per call.
    #[serde(default = "default_max_attempts")]
    pub default_max_attempts: u32,
    /// Age in seconds after which completed jobs are removed by `cleanup_expired`.
    #[serde(default = "default_cleanup_age")]
    pub cleanup_age_seconds: u64,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            default_max_attempts: default_max_attempts(),
            cleanup_age_seconds: default_cleanup_age(),
        }
    }
}

fn default_max_attempts() -> u32 {
    3
}

fn default_cleanup_age() -> u64 {
    86_400
}

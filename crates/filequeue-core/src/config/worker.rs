//! Background worker configuration.

use serde::{Deserialize, Serialize};

/// Worker polling configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerConfig {
    /// Base sleep between polls that found no job, in milliseconds.
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,
    /// Whether the idle sleep grows after consecutive empty polls.
    #[serde(default)]
    pub adaptive_polling: bool,
    /// Upper bound for the adaptive idle sleep, in milliseconds.
    #[serde(default = "default_max_poll_interval")]
    pub max_poll_interval_ms: u64,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval(),
            adaptive_polling: false,
            max_poll_interval_ms: default_max_poll_interval(),
        }
    }
}

fn default_poll_interval() -> u64 {
    1_000
}

fn default_max_poll_interval() -> u64 {
    10_000
}

//! Recurring schedule configuration.

use serde::{Deserialize, Serialize};

/// Scheduler loop configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Seconds between scheduler evaluations when running as a loop.
    #[serde(default = "default_tick")]
    pub tick_seconds: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            tick_seconds: default_tick(),
        }
    }
}

fn default_tick() -> u64 {
    60
}

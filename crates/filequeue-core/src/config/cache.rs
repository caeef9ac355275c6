//! Job cache configuration.

use serde::{Deserialize, Serialize};

/// In-memory job cache configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Whether reads go through the in-memory cache at all.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Maximum number of jobs held in the cache.
    #[serde(default = "default_capacity")]
    pub capacity: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            capacity: default_capacity(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_capacity() -> u64 {
    50
}

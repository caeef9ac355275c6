//! Job storage configuration.

use serde::{Deserialize, Serialize};

/// Job storage configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Storage provider: `"file"` or `"memory"`.
    #[serde(default = "default_provider")]
    pub provider: String,
    /// Root directory holding one sub-directory per job status.
    #[serde(default = "default_root_path")]
    pub root_path: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            root_path: default_root_path(),
        }
    }
}

fn default_provider() -> String {
    "file".to_string()
}

fn default_root_path() -> String {
    "./data/queue".to_string()
}

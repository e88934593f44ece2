//! Audit logging configuration.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Configuration for mutation audit logging.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditConfig {
    /// Whether audit logging is enabled.
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Directory holding `audit.log` (JSON Lines).
    #[serde(default = "default_directory")]
    pub directory: PathBuf,

    /// Mirror every event to stderr as a human-readable line.
    #[serde(default)]
    pub stdout: bool,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            directory: default_directory(),
            stdout: false,
        }
    }
}

impl AuditConfig {
    /// Full path of the JSON Lines audit file.
    pub fn log_path(&self) -> PathBuf {
        self.directory.join("audit.log")
    }
}

fn default_enabled() -> bool {
    true
}

fn default_directory() -> PathBuf {
    PathBuf::from("logs")
}

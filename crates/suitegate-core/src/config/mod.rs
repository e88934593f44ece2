//! Configuration types for Suitegate.
//!
//! Configuration is loaded from a YAML file (`suitegate.yaml`). Every section
//! has defaults, so an empty file (or no file at all) yields a usable
//! configuration that talks to the public SmartSuite API.
//!
//! # Example
//!
//! ```yaml
//! api:
//!   timeout_secs: 10
//! mcp:
//!   transport: http
//!   port: 3000
//! knowledge:
//!   path: knowledge/
//! mappings:
//!   directory: mappings/
//! ```

pub mod api;
pub mod audit;
pub mod knowledge;
pub mod mcp;

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub use api::{ApiConfig, ApiCredentials};
pub use audit::AuditConfig;
pub use knowledge::{KnowledgeConfig, MappingsConfig, SafetyConfig};
pub use mcp::{McpConfig, Transport};

/// Complete Suitegate configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SuiteGateConfig {
    /// SmartSuite API connection.
    #[serde(default)]
    pub api: ApiConfig,

    /// MCP server configuration.
    #[serde(default)]
    pub mcp: McpConfig,

    /// Audit logging configuration.
    #[serde(default)]
    pub audit: AuditConfig,

    /// Knowledge corpus configuration.
    #[serde(default)]
    pub knowledge: KnowledgeConfig,

    /// Field mapping tables.
    #[serde(default)]
    pub mappings: MappingsConfig,

    /// Safety classifier thresholds.
    #[serde(default)]
    pub safety: SafetyConfig,
}

/// Error type for configuration loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl SuiteGateConfig {
    /// Load configuration from a YAML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path.as_ref())?;
        Self::from_yaml(&content)
    }

    /// Parse configuration from YAML content.
    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(content).map_err(ConfigError::from)
    }

    /// Load configuration and resolve relative paths against the file's directory.
    ///
    /// This resolves:
    /// - `knowledge.path`
    /// - `mappings.directory`
    /// - `audit.directory`
    pub fn load_with_context(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let mut config = Self::from_file(path)?;

        let base_dir = path
            .parent()
            .map(|p| p.to_path_buf())
            .unwrap_or_else(|| PathBuf::from("."));

        if let Some(knowledge_path) = &config.knowledge.path {
            config.knowledge.path = Some(resolve(&base_dir, knowledge_path));
        }
        if let Some(mappings_dir) = &config.mappings.directory {
            config.mappings.directory = Some(resolve(&base_dir, mappings_dir));
        }
        config.audit.directory = resolve(&base_dir, &config.audit.directory);

        config.validate()?;
        Ok(config)
    }

    /// Reject values that would make the server misbehave at runtime.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.api.timeout_secs == 0 {
            return Err(ConfigError::Config(
                "api.timeout_secs must be greater than zero".to_string(),
            ));
        }
        if self.knowledge.cache_capacity == 0 {
            return Err(ConfigError::Config(
                "knowledge.cache_capacity must be greater than zero".to_string(),
            ));
        }
        if self.safety.bulk_limit == 0 {
            return Err(ConfigError::Config(
                "safety.bulk_limit must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

fn resolve(base_dir: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base_dir.join(path)
    }
}

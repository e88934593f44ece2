//! CLI command implementations for the Suitegate binary.

pub mod analyze;
pub mod knowledge;
pub mod serve;
pub mod tools;

use anyhow::{Context, Result};
use std::path::Path;
use suitegate_core::SuiteGateConfig;

/// Load the configuration file, falling back to defaults when it is absent.
pub fn load_config(path: &Path) -> Result<SuiteGateConfig> {
    if !path.exists() {
        tracing::info!(path = %path.display(), "No configuration file, using defaults");
        return Ok(SuiteGateConfig::default());
    }
    SuiteGateConfig::load_with_context(path)
        .with_context(|| format!("Failed to load configuration from {:?}", path))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_config_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_config(&dir.path().join("absent.yaml")).unwrap();
        assert_eq!(config.safety.bulk_limit, 25);
    }

    #[test]
    fn test_config_paths_resolved_against_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("suitegate.yaml");
        std::fs::write(&path, "mappings:\n  directory: mappings\n").unwrap();

        let config = load_config(&path).unwrap();
        assert_eq!(config.mappings.directory, Some(dir.path().join("mappings")));
    }

    #[test]
    fn test_invalid_config_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("suitegate.yaml");
        std::fs::write(&path, "safety:\n  bulk_limit: 0\n").unwrap();
        assert!(load_config(&path).is_err());
    }
}

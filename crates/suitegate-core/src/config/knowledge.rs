//! Knowledge corpus, field mapping and safety settings.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Where the knowledge corpus comes from and how lookups are memoized.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnowledgeConfig {
    /// Extra knowledge file or directory (YAML/JSON). Missing paths are tolerated.
    #[serde(default)]
    pub path: Option<PathBuf>,

    /// Whether to load the corpus bundled with the binary.
    #[serde(default = "default_true")]
    pub include_builtin: bool,

    /// Maximum number of memoized lookups.
    #[serde(default = "default_cache_capacity")]
    pub cache_capacity: usize,

    /// Lifetime of a memoized lookup, in seconds.
    #[serde(default = "default_cache_ttl_secs")]
    pub cache_ttl_secs: u64,

    /// Observed examples retained per entry.
    #[serde(default = "default_max_examples")]
    pub max_examples: usize,
}

impl Default for KnowledgeConfig {
    fn default() -> Self {
        Self {
            path: None,
            include_builtin: true,
            cache_capacity: default_cache_capacity(),
            cache_ttl_secs: default_cache_ttl_secs(),
            max_examples: default_max_examples(),
        }
    }
}

/// Field mapping tables (human field names to SmartSuite field codes).
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct MappingsConfig {
    /// Directory of mapping YAML files.
    #[serde(default)]
    pub directory: Option<PathBuf>,
}

/// Thresholds used by the safety classifier.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SafetyConfig {
    /// Maximum records per bulk request.
    #[serde(default = "default_bulk_limit")]
    pub bulk_limit: usize,
}

impl Default for SafetyConfig {
    fn default() -> Self {
        Self {
            bulk_limit: default_bulk_limit(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_cache_capacity() -> usize {
    100
}

fn default_cache_ttl_secs() -> u64 {
    300
}

fn default_max_examples() -> usize {
    10
}

fn default_bulk_limit() -> usize {
    25
}

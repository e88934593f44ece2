//! Error types for the knowledge crate.

use thiserror::Error;

/// Errors raised while loading or querying the knowledge corpus.
#[derive(Debug, Error)]
pub enum KnowledgeError {
    /// A knowledge document could not be parsed.
    #[error("failed to parse knowledge document: {0}")]
    Parse(String),

    /// An entry declares an endpoint pattern that is not a valid regex.
    #[error("invalid endpoint pattern for entry '{id}': {source}")]
    InvalidPattern {
        id: String,
        #[source]
        source: regex::Error,
    },

    /// An entry is structurally invalid.
    #[error("invalid knowledge entry '{id}': {reason}")]
    InvalidEntry { id: String, reason: String },

    /// The corpus lock was poisoned by a panicking writer.
    #[error("knowledge corpus is unavailable: lock poisoned")]
    Unavailable,

    /// IO error while reading a knowledge source.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serde_yaml::Error> for KnowledgeError {
    fn from(err: serde_yaml::Error) -> Self {
        KnowledgeError::Parse(err.to_string())
    }
}

impl From<serde_json::Error> for KnowledgeError {
    fn from(err: serde_json::Error) -> Self {
        KnowledgeError::Parse(err.to_string())
    }
}

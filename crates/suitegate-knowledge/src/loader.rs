//! Reading knowledge definitions from YAML and JSON files.
//!
//! A knowledge document is either a list of entries or a mapping with an
//! `entries` list:
//!
//! ```yaml
//! entries:
//!   - id: records-list-requires-post
//!     match:
//!       methods: [GET]
//!       endpoint: '^/applications/[^/]+/records/?$'
//!     safety_level: RED
//! ```
//!
//! Loading is tolerant: a missing path yields no definitions, and unreadable
//! files or malformed entries are reported as warnings and skipped.

use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::entry::{EntryDefinition, EntryOrigin, KnowledgeEntry};
use crate::error::KnowledgeError;

/// File extensions recognised in a knowledge directory.
const EXTENSIONS: [&str; 3] = ["yaml", "yml", "json"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFormat {
    Yaml,
    Json,
}

impl DocumentFormat {
    /// Pick a format from a file extension (YAML unless `.json`).
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => DocumentFormat::Json,
            _ => DocumentFormat::Yaml,
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawDocument<V> {
    Wrapped { entries: Vec<V> },
    List(Vec<V>),
}

impl<V> RawDocument<V> {
    fn into_entries(self) -> Vec<V> {
        match self {
            RawDocument::Wrapped { entries } => entries,
            RawDocument::List(entries) => entries,
        }
    }
}

/// Definitions read from a source, with the problems found along the way.
#[derive(Debug, Default)]
pub struct LoadReport {
    pub definitions: Vec<EntryDefinition>,
    pub warnings: Vec<String>,
    pub files_read: usize,
}

/// Parse a document, returning one result per entry.
///
/// Fails only when the document as a whole is unreadable.
pub fn parse_document(
    content: &str,
    format: DocumentFormat,
) -> Result<Vec<Result<EntryDefinition, String>>, KnowledgeError> {
    if content.trim().is_empty() {
        return Ok(Vec::new());
    }
    let parsed = match format {
        DocumentFormat::Yaml => serde_yaml::from_str::<RawDocument<serde_yaml::Value>>(content)?
            .into_entries()
            .into_iter()
            .map(|v| serde_yaml::from_value::<EntryDefinition>(v).map_err(|e| e.to_string()))
            .collect(),
        DocumentFormat::Json => serde_json::from_str::<RawDocument<serde_json::Value>>(content)?
            .into_entries()
            .into_iter()
            .map(|v| serde_json::from_value::<EntryDefinition>(v).map_err(|e| e.to_string()))
            .collect(),
    };
    Ok(parsed)
}

/// Load definitions from a file or directory. Never fails.
pub fn load_path(path: &Path) -> LoadReport {
    let mut report = LoadReport::default();

    if !path.exists() {
        report
            .warnings
            .push(format!("knowledge source {} does not exist", path.display()));
        return report;
    }

    let files = if path.is_dir() {
        match knowledge_files(path) {
            Ok(files) => files,
            Err(e) => {
                report
                    .warnings
                    .push(format!("cannot read directory {}: {}", path.display(), e));
                return report;
            }
        }
    } else {
        vec![path.to_path_buf()]
    };

    for file in files {
        load_file_into(&file, &mut report);
    }
    report
}

fn load_file_into(file: &Path, report: &mut LoadReport) {
    let content = match fs::read_to_string(file) {
        Ok(content) => content,
        Err(e) => {
            report
                .warnings
                .push(format!("cannot read {}: {}", file.display(), e));
            return;
        }
    };

    match parse_document(&content, DocumentFormat::from_path(file)) {
        Ok(entries) => {
            report.files_read += 1;
            for (index, entry) in entries.into_iter().enumerate() {
                match entry {
                    Ok(def) => report.definitions.push(def),
                    Err(e) => report.warnings.push(format!(
                        "{}: skipping entry #{}: {}",
                        file.display(),
                        index,
                        e
                    )),
                }
            }
        }
        Err(e) => report
            .warnings
            .push(format!("{}: {}", file.display(), e)),
    }
}

/// Knowledge files in a directory, sorted by name.
fn knowledge_files(dir: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut files: Vec<PathBuf> = fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.is_file())
        .filter(|p| {
            p.extension()
                .and_then(|e| e.to_str())
                .is_some_and(|ext| EXTENSIONS.iter().any(|x| x.eq_ignore_ascii_case(ext)))
        })
        .collect();
    files.sort();
    Ok(files)
}

/// Strictly validate a single knowledge file.
///
/// Unlike [`load_path`], any malformed entry, invalid regex or duplicate id
/// is an error. Returns the number of entries on success.
pub fn validate_file(path: &Path) -> Result<usize, KnowledgeError> {
    let content = fs::read_to_string(path)?;
    let entries = parse_document(&content, DocumentFormat::from_path(path))?;

    let mut seen = std::collections::HashSet::new();
    let mut count = 0;
    for (index, entry) in entries.into_iter().enumerate() {
        let def = entry.map_err(|reason| KnowledgeError::InvalidEntry {
            id: format!("#{}", index),
            reason,
        })?;
        if !seen.insert(def.id.clone()) {
            return Err(KnowledgeError::InvalidEntry {
                id: def.id,
                reason: "duplicate id".to_string(),
            });
        }
        KnowledgeEntry::from_definition(def, EntryOrigin::Static)?;
        count += 1;
    }
    Ok(count)
}

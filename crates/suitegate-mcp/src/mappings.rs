//! Field mappings and table resolution.
//!
//! A mapping file names one SmartSuite application and maps human-readable
//! field names to API field codes:
//!
//! ```yaml
//! tableName: Projects
//! tableId: 64f1c2a9b8e7d6c5
//! fields:
//!   Title: title
//!   Status: s3f9a2c1d0
//! ```

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MappingError {
    #[error("failed to read mapping file {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid mapping file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_yaml::Error,
    },

    #[error("table '{0}' is mapped more than once")]
    Duplicate(String),
}

/// One application's field mapping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableMapping {
    pub table_name: String,
    pub table_id: String,
    /// Human name → API field code.
    #[serde(default)]
    pub fields: BTreeMap<String, String>,
}

impl TableMapping {
    pub fn translator(&self) -> FieldTranslator {
        FieldTranslator::new(&self.fields)
    }
}

/// Rewrites payload keys between human names and API field codes.
///
/// Keys without a mapping pass through unchanged in both directions.
#[derive(Debug, Clone, Default)]
pub struct FieldTranslator {
    to_api: HashMap<String, String>,
    to_human: HashMap<String, String>,
}

impl FieldTranslator {
    pub fn new(fields: &BTreeMap<String, String>) -> Self {
        Self {
            to_api: fields.iter().map(|(h, c)| (h.clone(), c.clone())).collect(),
            to_human: fields.iter().map(|(h, c)| (c.clone(), h.clone())).collect(),
        }
    }

    /// Translator that changes nothing.
    pub fn identity() -> Self {
        Self::default()
    }

    pub fn field_to_api<'a>(&'a self, name: &'a str) -> &'a str {
        self.to_api.get(name).map(String::as_str).unwrap_or(name)
    }

    pub fn field_to_human<'a>(&'a self, code: &'a str) -> &'a str {
        self.to_human.get(code).map(String::as_str).unwrap_or(code)
    }

    /// Rename the keys of a record (or each record of an array) to API codes.
    pub fn to_api(&self, value: &Value) -> Value {
        rename_keys(value, &self.to_api)
    }

    /// Rename the keys of a record (or each record of an array) to human names.
    pub fn to_human(&self, value: &Value) -> Value {
        rename_keys(value, &self.to_human)
    }

    /// Like [`FieldTranslator::to_human`], but also reaches into the
    /// `items` array of a list response.
    pub fn response_to_human(&self, value: &Value) -> Value {
        match value {
            Value::Object(map) if map.get("items").is_some_and(Value::is_array) => {
                let mut out = map.clone();
                if let Some(items) = map.get("items") {
                    out.insert("items".to_string(), self.to_human(items));
                }
                Value::Object(out)
            }
            other => self.to_human(other),
        }
    }

    /// Translate the `field` references of a filter or sort clause.
    pub fn translate_field_refs(&self, value: &Value) -> Value {
        match value {
            Value::Object(map) => Value::Object(
                map.iter()
                    .map(|(k, v)| {
                        let v = match (k.as_str(), v) {
                            ("field", Value::String(name)) => {
                                Value::String(self.field_to_api(name).to_string())
                            }
                            _ => self.translate_field_refs(v),
                        };
                        (k.clone(), v)
                    })
                    .collect(),
            ),
            Value::Array(items) => {
                Value::Array(items.iter().map(|v| self.translate_field_refs(v)).collect())
            }
            other => other.clone(),
        }
    }
}

fn rename_keys(value: &Value, names: &HashMap<String, String>) -> Value {
    match value {
        Value::Object(map) => {
            let renamed: Map<String, Value> = map
                .iter()
                .map(|(k, v)| (names.get(k).cloned().unwrap_or_else(|| k.clone()), v.clone()))
                .collect();
            Value::Object(renamed)
        }
        Value::Array(items) => Value::Array(items.iter().map(|v| rename_keys(v, names)).collect()),
        other => other.clone(),
    }
}

/// Resolves table references (id or name) against the loaded mappings.
#[derive(Debug, Clone, Default)]
pub struct TableResolver {
    tables: Vec<TableMapping>,
}

impl TableResolver {
    pub fn new(tables: Vec<TableMapping>) -> Result<Self, MappingError> {
        let mut seen = std::collections::HashSet::new();
        for table in &tables {
            if !seen.insert(table.table_id.as_str()) {
                return Err(MappingError::Duplicate(table.table_id.clone()));
            }
        }
        Ok(Self { tables })
    }

    /// Load every `*.yaml`/`*.yml` file in `dir`, in name order.
    ///
    /// A missing directory yields an empty resolver.
    pub fn load_dir(dir: &Path) -> Result<Self, MappingError> {
        let entries = match std::fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::warn!(path = %dir.display(), "Mappings directory not found, continuing without field mappings");
                return Ok(Self::default());
            }
            Err(source) => {
                return Err(MappingError::Io {
                    path: dir.to_path_buf(),
                    source,
                });
            }
        };

        let mut paths: Vec<PathBuf> = entries
            .filter_map(|e| e.ok().map(|e| e.path()))
            .filter(|p| {
                p.extension()
                    .and_then(|e| e.to_str())
                    .is_some_and(|e| e == "yaml" || e == "yml")
            })
            .collect();
        paths.sort();

        let mut tables = Vec::with_capacity(paths.len());
        for path in paths {
            let content = std::fs::read_to_string(&path).map_err(|source| MappingError::Io {
                path: path.clone(),
                source,
            })?;
            let table: TableMapping =
                serde_yaml::from_str(&content).map_err(|source| MappingError::Parse {
                    path: path.clone(),
                    source,
                })?;
            tracing::debug!(table = %table.table_name, fields = table.fields.len(), "Loaded field mapping");
            tables.push(table);
        }

        tracing::info!(count = tables.len(), path = %dir.display(), "Loaded field mappings");
        Self::new(tables)
    }

    pub fn tables(&self) -> &[TableMapping] {
        &self.tables
    }

    /// Match by exact id, then by case-insensitive name.
    pub fn resolve(&self, table: &str) -> Option<&TableMapping> {
        self.tables
            .iter()
            .find(|t| t.table_id == table)
            .or_else(|| {
                self.tables
                    .iter()
                    .find(|t| t.table_name.eq_ignore_ascii_case(table))
            })
    }

    /// Resolved application id, or the input when nothing matches.
    pub fn table_id(&self, table: &str) -> String {
        self.resolve(table)
            .map(|t| t.table_id.clone())
            .unwrap_or_else(|| table.to_string())
    }

    pub fn translator(&self, table: &str) -> FieldTranslator {
        self.resolve(table)
            .map(TableMapping::translator)
            .unwrap_or_else(FieldTranslator::identity)
    }
}

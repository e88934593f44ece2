//! The knowledge base: a versioned corpus of entries plus a lookup cache.
//!
//! The corpus and its version counter live behind one `RwLock`, so a
//! learning write (mutation + version bump) is never observed half-applied.
//! Entries are shared as `Arc`s and replaced copy-on-write when learning
//! touches them; readers holding an older `Arc` keep a consistent view.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use std::collections::HashSet;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, RwLock};
use std::time::Duration;
use suitegate_core::{HttpMethod, KnowledgeConfig};

use crate::cache::{CacheStats, MatchCache};
use crate::entry::{
    EntryDefinition, EntryOrigin, FailureMode, KnowledgeEntry, OperationExample, PatternDefinition,
    SafetyLevel,
};
use crate::error::KnowledgeError;
use crate::loader::{self, DocumentFormat};
use crate::pattern::{normalize_endpoint, payload_shape};

const BUILTIN_CORPUS: &str = include_str!("../data/knowledge.yaml");

/// One entry that applies to an operation.
#[derive(Debug, Clone)]
pub struct KnowledgeMatch {
    pub entry: Arc<KnowledgeEntry>,
    /// Specificity; higher is more specific.
    pub score: f64,
    pub reason: String,
}

/// Corpus version report.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct KnowledgeVersion {
    pub version: u64,
    pub pattern_count: usize,
    pub last_updated: DateTime<Utc>,
}

/// An operation fed to the learning hook.
#[derive(Debug, Clone)]
pub struct ObservedOperation {
    pub method: HttpMethod,
    pub endpoint: String,
    pub payload: Option<Value>,
}

/// How an observed operation ended.
#[derive(Debug, Clone)]
pub enum OperationOutcome {
    Success,
    Failure {
        error: String,
        suggestion: Option<String>,
    },
}

/// What the learning hook did with an observation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LearningResult {
    ExampleRecorded { entry_id: String },
    FailureModeAdded { entry_id: String },
    EntryCreated { entry_id: String },
    Unchanged,
}

/// Summary of a load call.
#[derive(Debug, Clone, Default)]
pub struct LoadSummary {
    pub loaded: usize,
    pub skipped: usize,
    pub warnings: Vec<String>,
}

/// Read/learn interface to a knowledge corpus.
pub trait KnowledgeProvider: Send + Sync {
    /// Entries that apply to the operation, most specific first.
    fn find_relevant_knowledge(
        &self,
        method: HttpMethod,
        endpoint: &str,
        payload: Option<&Value>,
    ) -> Result<Vec<KnowledgeMatch>, KnowledgeError>;

    /// Fold an observed operation back into the corpus.
    fn learn_from_operation(
        &self,
        operation: &ObservedOperation,
        outcome: &OperationOutcome,
    ) -> Result<LearningResult, KnowledgeError>;

    fn version(&self) -> Result<KnowledgeVersion, KnowledgeError>;
}

struct Corpus {
    entries: Vec<Arc<KnowledgeEntry>>,
    version: u64,
    last_updated: DateTime<Utc>,
}

impl Corpus {
    fn bump(&mut self) {
        self.version += 1;
        self.last_updated = Utc::now();
    }

    /// Indices of matching entries with score and reason, best first.
    fn rank(
        &self,
        method: HttpMethod,
        endpoint: &str,
        payload: Option<&Value>,
    ) -> Vec<(usize, f64, String)> {
        let mut ranked: Vec<(usize, f64, String)> = self
            .entries
            .iter()
            .enumerate()
            .filter_map(|(i, e)| e.evaluate(method, endpoint, payload).map(|(s, r)| (i, s, r)))
            .collect();
        // Stable sort keeps registration order for equal scores.
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1));
        ranked
    }
}

/// In-memory knowledge corpus.
pub struct KnowledgeBase {
    corpus: RwLock<Corpus>,
    cache: Mutex<MatchCache>,
    max_examples: usize,
}

impl KnowledgeBase {
    /// Empty knowledge base with default cache settings.
    pub fn new() -> Self {
        Self::with_settings(&KnowledgeConfig::default())
    }

    /// Empty knowledge base using cache settings from configuration.
    pub fn with_settings(config: &KnowledgeConfig) -> Self {
        Self {
            corpus: RwLock::new(Corpus {
                entries: Vec::new(),
                version: 0,
                last_updated: Utc::now(),
            }),
            cache: Mutex::new(MatchCache::new(
                config.cache_capacity,
                Duration::from_secs(config.cache_ttl_secs),
            )),
            max_examples: config.max_examples.max(1),
        }
    }

    /// Knowledge base holding only the built-in corpus.
    pub fn with_builtin() -> Self {
        let kb = Self::new();
        kb.load_builtin();
        kb
    }

    /// Build a knowledge base as described by configuration.
    ///
    /// Problems with the configured path are logged and never fatal.
    pub fn from_config(config: &KnowledgeConfig) -> Self {
        let kb = Self::with_settings(config);
        if config.include_builtin {
            kb.load_builtin();
        }
        if let Some(path) = &config.path {
            kb.load(path);
        }
        kb
    }

    /// Load the corpus embedded in the crate.
    pub fn load_builtin(&self) -> LoadSummary {
        self.load_str(BUILTIN_CORPUS, DocumentFormat::Yaml, "builtin")
    }

    /// Load a knowledge file or directory.
    ///
    /// A missing path loads nothing and logs a warning.
    pub fn load(&self, source: &Path) -> LoadSummary {
        let report = loader::load_path(source);
        let mut summary = self.add_definitions(report.definitions);
        let mut warnings = report.warnings;
        warnings.append(&mut summary.warnings);
        summary.warnings = warnings;
        for warning in &summary.warnings {
            tracing::warn!(source = %source.display(), "{}", warning);
        }
        tracing::info!(
            source = %source.display(),
            files = report.files_read,
            loaded = summary.loaded,
            skipped = summary.skipped,
            "Loaded knowledge"
        );
        summary
    }

    /// Load a knowledge document from a string.
    pub fn load_str(&self, content: &str, format: DocumentFormat, source: &str) -> LoadSummary {
        let mut warnings = Vec::new();
        let mut definitions = Vec::new();
        let mut malformed = 0;
        match loader::parse_document(content, format) {
            Ok(entries) => {
                for (index, entry) in entries.into_iter().enumerate() {
                    match entry {
                        Ok(def) => definitions.push(def),
                        Err(e) => {
                            malformed += 1;
                            warnings.push(format!("skipping entry #{}: {}", index, e));
                        }
                    }
                }
            }
            Err(e) => warnings.push(e.to_string()),
        }

        let mut summary = self.add_definitions(definitions);
        summary.skipped += malformed;
        warnings.append(&mut summary.warnings);
        summary.warnings = warnings;
        for warning in &summary.warnings {
            tracing::warn!(source = %source, "{}", warning);
        }
        tracing::debug!(source = %source, loaded = summary.loaded, "Loaded knowledge");
        summary
    }

    fn add_definitions(&self, definitions: Vec<EntryDefinition>) -> LoadSummary {
        let mut summary = LoadSummary::default();
        if definitions.is_empty() {
            return summary;
        }

        let mut corpus = self.corpus.write().unwrap_or_else(|e| e.into_inner());
        let mut ids: HashSet<String> = corpus.entries.iter().map(|e| e.id.clone()).collect();

        for def in definitions {
            if ids.contains(&def.id) {
                summary.skipped += 1;
                summary
                    .warnings
                    .push(format!("duplicate knowledge entry '{}' ignored", def.id));
                continue;
            }
            match KnowledgeEntry::from_definition(def, EntryOrigin::Static) {
                Ok(entry) => {
                    ids.insert(entry.id.clone());
                    corpus.entries.push(Arc::new(entry));
                    summary.loaded += 1;
                }
                Err(e) => {
                    summary.skipped += 1;
                    summary.warnings.push(e.to_string());
                }
            }
        }

        if summary.loaded > 0 {
            corpus.bump();
        }
        summary
    }

    /// Snapshot of all entries in registration order.
    pub fn entries(&self) -> Result<Vec<Arc<KnowledgeEntry>>, KnowledgeError> {
        let corpus = self.corpus.read().map_err(|_| KnowledgeError::Unavailable)?;
        Ok(corpus.entries.clone())
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.lock_cache().stats()
    }

    fn lock_cache(&self) -> MutexGuard<'_, MatchCache> {
        // The cache only memoizes; a poisoned one is still usable.
        self.cache.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Default for KnowledgeBase {
    fn default() -> Self {
        Self::new()
    }
}

impl KnowledgeProvider for KnowledgeBase {
    fn find_relevant_knowledge(
        &self,
        method: HttpMethod,
        endpoint: &str,
        payload: Option<&Value>,
    ) -> Result<Vec<KnowledgeMatch>, KnowledgeError> {
        let corpus = self.corpus.read().map_err(|_| KnowledgeError::Unavailable)?;
        let key = format!(
            "{} {} {}",
            method,
            normalize_endpoint(endpoint),
            payload_shape(payload)
        );

        let mut cache = self.lock_cache();
        if let Some(hit) = cache.get(&key, corpus.version) {
            tracing::debug!(key = %key, "Knowledge cache hit");
            return Ok(hit);
        }
        tracing::debug!(key = %key, "Knowledge cache miss");

        let matches: Vec<KnowledgeMatch> = corpus
            .rank(method, endpoint, payload)
            .into_iter()
            .map(|(index, score, reason)| KnowledgeMatch {
                entry: Arc::clone(&corpus.entries[index]),
                score,
                reason,
            })
            .collect();

        cache.insert(key, corpus.version, matches.clone());
        Ok(matches)
    }

    fn learn_from_operation(
        &self,
        operation: &ObservedOperation,
        outcome: &OperationOutcome,
    ) -> Result<LearningResult, KnowledgeError> {
        let mut corpus = self.corpus.write().map_err(|_| KnowledgeError::Unavailable)?;
        let payload = operation.payload.as_ref();
        let best = corpus
            .rank(operation.method, &operation.endpoint, payload)
            .first()
            .map(|(index, _, _)| *index);

        let result = match (outcome, best) {
            (OperationOutcome::Success, None) => LearningResult::Unchanged,
            (OperationOutcome::Success, Some(index)) => {
                let mut entry = KnowledgeEntry::clone(&corpus.entries[index]);
                entry.push_example(example(operation, true), self.max_examples);
                let entry_id = entry.id.clone();
                corpus.entries[index] = Arc::new(entry);
                corpus.bump();
                LearningResult::ExampleRecorded { entry_id }
            }
            (OperationOutcome::Failure { suggestion: None, .. }, _) => LearningResult::Unchanged,
            (
                OperationOutcome::Failure {
                    error,
                    suggestion: Some(suggestion),
                },
                Some(index),
            ) => {
                let mode = learned_failure_mode(error, suggestion);
                let existing = &corpus.entries[index];
                if existing
                    .failure_modes
                    .iter()
                    .any(|m| m.description == mode.description)
                {
                    LearningResult::Unchanged
                } else {
                    let mut entry = KnowledgeEntry::clone(existing);
                    entry.failure_modes.push(mode);
                    entry.push_example(example(operation, false), self.max_examples);
                    let entry_id = entry.id.clone();
                    corpus.entries[index] = Arc::new(entry);
                    corpus.bump();
                    LearningResult::FailureModeAdded { entry_id }
                }
            }
            (
                OperationOutcome::Failure {
                    error,
                    suggestion: Some(suggestion),
                },
                None,
            ) => {
                let learned = corpus
                    .entries
                    .iter()
                    .filter(|e| e.origin == EntryOrigin::Learned)
                    .count();
                let id = format!(
                    "learned-{}-{}",
                    operation.method.as_str().to_ascii_lowercase(),
                    learned + 1
                );
                let def = EntryDefinition {
                    id: id.clone(),
                    description: Some(format!(
                        "Learned from a failed {} {}",
                        operation.method, operation.endpoint
                    )),
                    pattern: PatternDefinition {
                        methods: vec![operation.method],
                        endpoint: endpoint_template(&operation.endpoint),
                    },
                    safety_level: SafetyLevel::Yellow,
                    failure_modes: vec![learned_failure_mode(error, suggestion)],
                    protocols: Vec::new(),
                    validation_rules: Vec::new(),
                    correction: None,
                    examples: vec![example(operation, false)],
                };
                let entry = KnowledgeEntry::from_definition(def, EntryOrigin::Learned)?;
                corpus.entries.push(Arc::new(entry));
                corpus.bump();
                LearningResult::EntryCreated { entry_id: id }
            }
        };

        if result != LearningResult::Unchanged {
            tracing::info!(
                method = %operation.method,
                endpoint = %operation.endpoint,
                version = corpus.version,
                result = ?result,
                "Knowledge updated"
            );
        }
        Ok(result)
    }

    fn version(&self) -> Result<KnowledgeVersion, KnowledgeError> {
        let corpus = self.corpus.read().map_err(|_| KnowledgeError::Unavailable)?;
        Ok(KnowledgeVersion {
            version: corpus.version,
            pattern_count: corpus.entries.len(),
            last_updated: corpus.last_updated,
        })
    }
}

fn example(operation: &ObservedOperation, succeeded: bool) -> OperationExample {
    let mut payload_keys: Vec<String> = operation
        .payload
        .as_ref()
        .and_then(Value::as_object)
        .map(|o| o.keys().cloned().collect())
        .unwrap_or_default();
    payload_keys.sort();
    OperationExample {
        method: operation.method,
        endpoint: operation.endpoint.clone(),
        payload_keys,
        succeeded,
        observed_at: Utc::now(),
    }
}

fn learned_failure_mode(error: &str, suggestion: &str) -> FailureMode {
    FailureMode {
        description: error.to_string(),
        cause: "Observed at runtime".to_string(),
        prevention: suggestion.to_string(),
        recovery: None,
        safe_alternative: None,
        example_error: Some(error.to_string()),
    }
}

/// Anchored regex for an endpoint, with `{placeholder}` segments as wildcards.
pub fn endpoint_template(endpoint: &str) -> String {
    let normalized = normalize_endpoint(endpoint);
    let segments: Vec<String> = normalized
        .trim_end_matches('/')
        .split('/')
        .map(|segment| {
            if segment.starts_with('{') && segment.ends_with('}') {
                "[^/]+".to_string()
            } else {
                regex::escape(segment)
            }
        })
        .collect();
    format!("^{}/?$", segments.join("/"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn failure(suggestion: Option<&str>) -> OperationOutcome {
        OperationOutcome::Failure {
            error: "API error 404: Not Found".to_string(),
            suggestion: suggestion.map(str::to_string),
        }
    }

    fn op(method: HttpMethod, endpoint: &str) -> ObservedOperation {
        ObservedOperation {
            method,
            endpoint: endpoint.to_string(),
            payload: None,
        }
    }

    #[test]
    fn test_builtin_corpus_loads_cleanly() {
        let kb = KnowledgeBase::new();
        let summary = kb.load_builtin();
        assert!(summary.warnings.is_empty(), "{:?}", summary.warnings);
        assert_eq!(summary.skipped, 0);
        let version = kb.version().unwrap();
        assert_eq!(version.pattern_count, summary.loaded);
        assert_eq!(version.version, 1);
    }

    #[test]
    fn test_missing_source_yields_empty_corpus() {
        let kb = KnowledgeBase::new();
        let summary = kb.load(Path::new("/nope/knowledge"));
        assert_eq!(summary.loaded, 0);
        assert_eq!(kb.version().unwrap().pattern_count, 0);
        let matches = kb
            .find_relevant_knowledge(HttpMethod::Get, "/applications/x/records", None)
            .unwrap();
        assert!(matches.is_empty());
    }

    #[test]
    fn test_lookup_is_deterministic() {
        let kb = KnowledgeBase::with_builtin();
        let payload = json!({"filter": {}});
        let ids = |kb: &KnowledgeBase| -> Vec<String> {
            kb.find_relevant_knowledge(HttpMethod::Post, "/applications/t/records/list/", Some(&payload))
                .unwrap()
                .iter()
                .map(|m| m.entry.id.clone())
                .collect()
        };
        let first = ids(&kb);
        let second = ids(&kb);
        assert!(!first.is_empty());
        assert_eq!(first, second);
        assert_eq!(kb.cache_stats().hits, 1);
    }

    #[test]
    fn test_wrong_method_entry_ranks_first() {
        let kb = KnowledgeBase::with_builtin();
        let matches = kb
            .find_relevant_knowledge(HttpMethod::Get, "/applications/{id}/records", None)
            .unwrap();
        assert_eq!(matches[0].entry.id, "records-list-requires-post");
        assert_eq!(matches[0].entry.safety_level, SafetyLevel::Red);
    }

    #[test]
    fn test_ties_break_by_registration_order() {
        let kb = KnowledgeBase::new();
        kb.load_str(
            r#"
- id: first
  match: { endpoint: '^/x' }
  safety_level: GREEN
- id: second
  match: { endpoint: '^/x' }
  safety_level: YELLOW
"#,
            DocumentFormat::Yaml,
            "test",
        );
        let matches = kb.find_relevant_knowledge(HttpMethod::Get, "/x", None).unwrap();
        let ids: Vec<&str> = matches.iter().map(|m| m.entry.id.as_str()).collect();
        assert_eq!(ids, vec!["first", "second"]);
    }

    #[test]
    fn test_duplicate_and_invalid_entries_are_skipped() {
        let kb = KnowledgeBase::new();
        let summary = kb.load_str(
            r#"
- id: a
  match: { endpoint: '^/a' }
  safety_level: GREEN
- id: a
  match: { endpoint: '^/b' }
  safety_level: GREEN
- id: bad
  match: { endpoint: '(' }
  safety_level: GREEN
"#,
            DocumentFormat::Yaml,
            "test",
        );
        assert_eq!(summary.loaded, 1);
        assert_eq!(summary.skipped, 2);
    }

    #[test]
    fn test_cache_stays_bounded() {
        let kb = KnowledgeBase::with_builtin();
        for i in 0..150 {
            kb.find_relevant_knowledge(HttpMethod::Get, &format!("/applications/app{}/records", i), None)
                .unwrap();
            assert!(kb.cache_stats().size <= 100);
        }
        assert_eq!(kb.cache_stats().size, 100);
    }

    #[test]
    fn test_success_appends_example_and_bumps_version() {
        let kb = KnowledgeBase::with_builtin();
        let before = kb.version().unwrap().version;
        kb.find_relevant_knowledge(HttpMethod::Get, "/applications/t/records", None)
            .unwrap();

        let result = kb
            .learn_from_operation(&op(HttpMethod::Get, "/applications/t/records"), &OperationOutcome::Success)
            .unwrap();
        assert_eq!(
            result,
            LearningResult::ExampleRecorded {
                entry_id: "records-list-requires-post".to_string()
            }
        );
        assert_eq!(kb.version().unwrap().version, before + 1);

        // The cached lookup predates the bump and must not be served.
        let matches = kb
            .find_relevant_knowledge(HttpMethod::Get, "/applications/t/records", None)
            .unwrap();
        assert_eq!(matches[0].entry.examples.len(), 1);
    }

    #[test]
    fn test_success_without_match_is_noop() {
        let kb = KnowledgeBase::with_builtin();
        let before = kb.version().unwrap();
        let result = kb
            .learn_from_operation(&op(HttpMethod::Get, "/solutions/"), &OperationOutcome::Success)
            .unwrap();
        assert_eq!(result, LearningResult::Unchanged);
        assert_eq!(kb.version().unwrap().version, before.version);
    }

    #[test]
    fn test_failure_creates_learned_entry_once() {
        let kb = KnowledgeBase::new();
        let observed = op(HttpMethod::Post, "/applications/{id}/archive");
        let result = kb
            .learn_from_operation(&observed, &failure(Some("Check the endpoint path")))
            .unwrap();
        assert_eq!(
            result,
            LearningResult::EntryCreated {
                entry_id: "learned-post-1".to_string()
            }
        );

        let matches = kb
            .find_relevant_knowledge(HttpMethod::Post, "/applications/abc/archive/", None)
            .unwrap();
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].entry.safety_level, SafetyLevel::Yellow);

        // Same failure again is deduplicated.
        let again = kb
            .learn_from_operation(&observed, &failure(Some("Check the endpoint path")))
            .unwrap();
        assert_eq!(again, LearningResult::Unchanged);
        assert_eq!(kb.version().unwrap().pattern_count, 1);
    }

    #[test]
    fn test_failure_augments_existing_entry() {
        let kb = KnowledgeBase::with_builtin();
        let result = kb
            .learn_from_operation(
                &op(HttpMethod::Get, "/applications/t/records"),
                &failure(Some("Use POST /records/list/")),
            )
            .unwrap();
        assert!(matches!(result, LearningResult::FailureModeAdded { .. }));
        let matches = kb
            .find_relevant_knowledge(HttpMethod::Get, "/applications/t/records", None)
            .unwrap();
        assert_eq!(matches[0].entry.failure_modes.len(), 2);
    }

    #[test]
    fn test_failure_without_suggestion_is_noop() {
        let kb = KnowledgeBase::new();
        let result = kb
            .learn_from_operation(&op(HttpMethod::Get, "/x"), &failure(None))
            .unwrap();
        assert_eq!(result, LearningResult::Unchanged);
        assert_eq!(kb.version().unwrap().version, 0);
    }

    #[test]
    fn test_endpoint_template() {
        assert_eq!(
            endpoint_template("/applications/{id}/records/list/"),
            "^/applications/[^/]+/records/list/?$"
        );
        assert_eq!(endpoint_template("a.b"), r"^/a\.b/?$");
    }

    #[test]
    fn test_concurrent_learning_and_lookup() {
        let kb = Arc::new(KnowledgeBase::with_builtin());
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let kb = Arc::clone(&kb);
                std::thread::spawn(move || {
                    for j in 0..50 {
                        let endpoint = format!("/applications/t{}/records", j);
                        if i % 2 == 0 {
                            kb.find_relevant_knowledge(HttpMethod::Get, &endpoint, None)
                                .unwrap();
                        } else {
                            kb.learn_from_operation(&op(HttpMethod::Get, &endpoint), &OperationOutcome::Success)
                                .unwrap();
                        }
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert!(kb.cache_stats().size <= 100);
        let matches = kb
            .find_relevant_knowledge(HttpMethod::Get, "/applications/t/records", None)
            .unwrap();
        assert_eq!(matches[0].entry.examples.len(), 10);
    }
}

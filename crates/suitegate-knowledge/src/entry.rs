//! Knowledge entries: one documented failure mode or behavioral rule of the
//! SmartSuite API.
//!
//! Entries are declared as [`EntryDefinition`]s (the YAML/JSON form) and
//! compiled into [`KnowledgeEntry`] values owned by the knowledge base.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use suitegate_core::HttpMethod;

use crate::error::KnowledgeError;
use crate::pattern::{PatternMatcher, PayloadTrigger, lookup, max_array_len};

/// Score contributed by an endpoint match.
const ENDPOINT_SCORE: f64 = 0.5;
/// Bonus for entries restricted to specific methods.
const METHOD_BONUS: f64 = 0.2;
/// Bonus for entries whose payload protocol fired.
const PROTOCOL_BONUS: f64 = 0.3;

/// Severity tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SafetyLevel {
    Green,
    Yellow,
    Red,
}

impl fmt::Display for SafetyLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SafetyLevel::Green => write!(f, "GREEN"),
            SafetyLevel::Yellow => write!(f, "YELLOW"),
            SafetyLevel::Red => write!(f, "RED"),
        }
    }
}

/// One way an operation can go wrong.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailureMode {
    pub description: String,
    pub cause: String,
    pub prevention: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recovery: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub safe_alternative: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub example_error: Option<String>,
}

/// A payload-sensitive safety protocol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SafetyProtocol {
    pub name: String,
    pub description: String,
    #[serde(default)]
    pub trigger: PayloadTrigger,
    /// Payload that exhibits the problem.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wrong: Option<Value>,
    /// Payload that avoids it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correct: Option<Value>,
}

/// Kind of structural check a validation rule performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleKind {
    /// Array-valued `fields` may hold at most `limit` items.
    MaxArrayLength,
    /// All `fields` must be present.
    RequiredKeys,
}

/// A structural check applied to payloads of matching operations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationRule {
    pub name: String,
    pub kind: RuleKind,
    #[serde(default)]
    pub fields: Vec<String>,
    #[serde(default)]
    pub limit: usize,
    pub message: String,
}

/// A failed validation rule.
#[derive(Debug, Clone, PartialEq)]
pub struct RuleBreach {
    pub rule: String,
    pub kind: RuleKind,
    pub limit: usize,
    pub observed: usize,
    pub message: String,
}

impl ValidationRule {
    /// Evaluate the rule; `None` means the payload complies.
    pub fn evaluate(&self, payload: Option<&Value>) -> Option<RuleBreach> {
        match self.kind {
            RuleKind::MaxArrayLength => {
                let observed = payload.map(|p| max_array_len(p, &self.fields)).unwrap_or(0);
                (observed > self.limit).then(|| RuleBreach {
                    rule: self.name.clone(),
                    kind: self.kind,
                    limit: self.limit,
                    observed,
                    message: format!("{} (got {}, limit {})", self.message, observed, self.limit),
                })
            }
            RuleKind::RequiredKeys => {
                let missing: Vec<&str> = self
                    .fields
                    .iter()
                    .filter(|f| payload.and_then(|p| lookup(p, f)).is_none())
                    .map(String::as_str)
                    .collect();
                (!missing.is_empty()).then(|| RuleBreach {
                    rule: self.name.clone(),
                    kind: self.kind,
                    limit: self.fields.len(),
                    observed: self.fields.len() - missing.len(),
                    message: format!("{} (missing: {})", self.message, missing.join(", ")),
                })
            }
        }
    }
}

/// A `from` → `to` rewrite.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Substitution<T> {
    pub from: T,
    pub to: T,
}

/// Known fix for an entry's failure mode.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Correction {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<Substitution<HttpMethod>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<Substitution<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameter: Option<Substitution<String>>,
}

impl Correction {
    pub fn is_empty(&self) -> bool {
        self.method.is_none() && self.endpoint.is_none() && self.parameter.is_none()
    }
}

/// An observed operation recorded by the learning hook.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationExample {
    pub method: HttpMethod,
    pub endpoint: String,
    #[serde(default)]
    pub payload_keys: Vec<String>,
    pub succeeded: bool,
    pub observed_at: DateTime<Utc>,
}

/// Request shape an entry matches on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatternDefinition {
    #[serde(default)]
    pub methods: Vec<HttpMethod>,
    pub endpoint: String,
}

/// Declarative form of a knowledge entry, as stored in YAML/JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntryDefinition {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(rename = "match")]
    pub pattern: PatternDefinition,
    pub safety_level: SafetyLevel,
    #[serde(default)]
    pub failure_modes: Vec<FailureMode>,
    #[serde(default)]
    pub protocols: Vec<SafetyProtocol>,
    #[serde(default)]
    pub validation_rules: Vec<ValidationRule>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correction: Option<Correction>,
    #[serde(default)]
    pub examples: Vec<OperationExample>,
}

/// Where an entry came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryOrigin {
    /// Loaded from static data.
    Static,
    /// Synthesized by the learning hook.
    Learned,
}

/// Compiled knowledge entry.
#[derive(Debug, Clone)]
pub struct KnowledgeEntry {
    pub id: String,
    pub description: Option<String>,
    pub pattern: PatternMatcher,
    pub safety_level: SafetyLevel,
    pub failure_modes: Vec<FailureMode>,
    pub protocols: Vec<SafetyProtocol>,
    pub validation_rules: Vec<ValidationRule>,
    pub correction: Option<Correction>,
    pub examples: Vec<OperationExample>,
    pub origin: EntryOrigin,
}

impl KnowledgeEntry {
    /// Compile a definition.
    pub fn from_definition(def: EntryDefinition, origin: EntryOrigin) -> Result<Self, KnowledgeError> {
        if def.id.trim().is_empty() {
            return Err(KnowledgeError::InvalidEntry {
                id: def.id,
                reason: "id must not be empty".to_string(),
            });
        }
        let pattern = PatternMatcher::new(def.pattern.methods, &def.pattern.endpoint).map_err(
            |source| KnowledgeError::InvalidPattern {
                id: def.id.clone(),
                source,
            },
        )?;
        let correction = def.correction.filter(|c| !c.is_empty());

        Ok(Self {
            id: def.id,
            description: def.description,
            pattern,
            safety_level: def.safety_level,
            failure_modes: def.failure_modes,
            protocols: def.protocols,
            validation_rules: def.validation_rules,
            correction,
            examples: def.examples,
            origin,
        })
    }

    /// Match this entry against an operation.
    ///
    /// Returns the specificity score and a short reason, or `None` when the
    /// entry does not apply. Entries that declare protocols only apply when
    /// at least one protocol trigger fires.
    pub fn evaluate(
        &self,
        method: HttpMethod,
        endpoint: &str,
        payload: Option<&Value>,
    ) -> Option<(f64, String)> {
        if !self.pattern.matches(method, endpoint) {
            return None;
        }

        let mut score = ENDPOINT_SCORE;
        let mut reason = format!("{} {} matches {}", method, endpoint, self.pattern.endpoint_pattern());
        if self.pattern.is_method_specific() {
            score += METHOD_BONUS;
        }

        if !self.protocols.is_empty() {
            let fired = self.triggered_protocols(payload);
            let first = fired.first()?;
            score += PROTOCOL_BONUS;
            reason = format!("{}; protocol {} triggered", reason, first.name);
        }

        Some((score, reason))
    }

    /// Protocols whose trigger fires for the payload.
    pub fn triggered_protocols(&self, payload: Option<&Value>) -> Vec<&SafetyProtocol> {
        self.protocols
            .iter()
            .filter(|p| p.trigger.is_satisfied(payload))
            .collect()
    }

    /// Breached validation rules for the payload.
    pub fn rule_breaches(&self, payload: Option<&Value>) -> Vec<RuleBreach> {
        self.validation_rules
            .iter()
            .filter_map(|r| r.evaluate(payload))
            .collect()
    }

    /// Record an observed example, keeping at most `max_examples` (oldest dropped).
    pub fn push_example(&mut self, example: OperationExample, max_examples: usize) {
        self.examples.push(example);
        if self.examples.len() > max_examples {
            let excess = self.examples.len() - max_examples;
            self.examples.drain(..excess);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pattern::PayloadTrigger;
    use serde_json::json;

    fn definition(id: &str, methods: Vec<HttpMethod>, endpoint: &str) -> EntryDefinition {
        EntryDefinition {
            id: id.to_string(),
            description: None,
            pattern: PatternDefinition {
                methods,
                endpoint: endpoint.to_string(),
            },
            safety_level: SafetyLevel::Yellow,
            failure_modes: Vec::new(),
            protocols: Vec::new(),
            validation_rules: Vec::new(),
            correction: None,
            examples: Vec::new(),
        }
    }

    #[test]
    fn test_invalid_regex_is_rejected() {
        let def = definition("bad", vec![], "^/applications/(");
        let err = KnowledgeEntry::from_definition(def, EntryOrigin::Static).unwrap_err();
        assert!(matches!(err, KnowledgeError::InvalidPattern { .. }));
    }

    #[test]
    fn test_method_specific_entries_score_higher() {
        let any = KnowledgeEntry::from_definition(
            definition("any", vec![], "^/applications/"),
            EntryOrigin::Static,
        )
        .unwrap();
        let get = KnowledgeEntry::from_definition(
            definition("get", vec![HttpMethod::Get], "^/applications/"),
            EntryOrigin::Static,
        )
        .unwrap();

        let (any_score, _) = any.evaluate(HttpMethod::Get, "/applications/x", None).unwrap();
        let (get_score, _) = get.evaluate(HttpMethod::Get, "/applications/x", None).unwrap();
        assert!(get_score > any_score);
    }

    #[test]
    fn test_protocol_gates_match() {
        let mut def = definition("uuid", vec![HttpMethod::Post], "change_field");
        def.protocols.push(SafetyProtocol {
            name: "select_options".to_string(),
            description: "select fields must use choices".to_string(),
            trigger: PayloadTrigger {
                field_types: vec!["singleselectfield".to_string()],
                any_keys: vec!["options".to_string()],
                array_longer_than: None,
            },
            wrong: None,
            correct: None,
        });
        let entry = KnowledgeEntry::from_definition(def, EntryOrigin::Static).unwrap();

        let hit = entry.evaluate(
            HttpMethod::Post,
            "/applications/x/change_field/",
            Some(&json!({"field_type": "singleselectfield", "options": []})),
        );
        assert!(hit.unwrap().1.contains("select_options"));

        let miss = entry.evaluate(
            HttpMethod::Post,
            "/applications/x/change_field/",
            Some(&json!({"field_type": "singleselectfield", "choices": []})),
        );
        assert!(miss.is_none());
    }

    #[test]
    fn test_max_array_rule() {
        let rule = ValidationRule {
            name: "bulk".to_string(),
            kind: RuleKind::MaxArrayLength,
            fields: vec!["records".to_string()],
            limit: 2,
            message: "too many records".to_string(),
        };
        assert!(rule.evaluate(Some(&json!({"records": [1, 2]}))).is_none());
        let breach = rule.evaluate(Some(&json!({"records": [1, 2, 3]}))).unwrap();
        assert_eq!(breach.observed, 3);
        assert!(breach.message.contains("limit 2"));
    }

    #[test]
    fn test_required_keys_rule() {
        let rule = ValidationRule {
            name: "slug".to_string(),
            kind: RuleKind::RequiredKeys,
            fields: vec!["slug".to_string(), "label".to_string()],
            limit: 0,
            message: "field changes need slug and label".to_string(),
        };
        let breach = rule.evaluate(Some(&json!({"slug": "s"}))).unwrap();
        assert!(breach.message.contains("label"));
        assert!(rule.evaluate(Some(&json!({"slug": "s", "label": "L"}))).is_none());
    }

    #[test]
    fn test_examples_are_bounded() {
        let mut entry = KnowledgeEntry::from_definition(
            definition("e", vec![], "^/"),
            EntryOrigin::Static,
        )
        .unwrap();
        for i in 0..5 {
            entry.push_example(
                OperationExample {
                    method: HttpMethod::Get,
                    endpoint: format!("/e/{}", i),
                    payload_keys: Vec::new(),
                    succeeded: true,
                    observed_at: Utc::now(),
                },
                3,
            );
        }
        assert_eq!(entry.examples.len(), 3);
        assert_eq!(entry.examples[0].endpoint, "/e/2");
    }
}

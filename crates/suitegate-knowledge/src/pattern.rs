//! Data-driven request matchers.
//!
//! A [`PatternMatcher`] recognises a request shape by HTTP method and endpoint
//! regex. A [`PayloadTrigger`] narrows a match further by inspecting the JSON
//! payload, so the corpus can say "select field AND payload has `options`"
//! without any hard-coded branches.

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use suitegate_core::HttpMethod;

/// Payload objects that SmartSuite nests request parameters under.
pub(crate) const NESTED_CONTAINERS: [&str; 2] = ["params", "field"];

/// Matches (method, endpoint) pairs.
#[derive(Debug, Clone)]
pub struct PatternMatcher {
    methods: Vec<HttpMethod>,
    endpoint: Regex,
}

impl PatternMatcher {
    /// Compile a matcher. An empty method list matches every method.
    pub fn new(methods: Vec<HttpMethod>, endpoint: &str) -> Result<Self, regex::Error> {
        Ok(Self {
            methods,
            endpoint: Regex::new(endpoint)?,
        })
    }

    /// Methods this matcher is restricted to (empty means any).
    pub fn methods(&self) -> &[HttpMethod] {
        &self.methods
    }

    /// Source text of the endpoint regex.
    pub fn endpoint_pattern(&self) -> &str {
        self.endpoint.as_str()
    }

    /// Whether the matcher names specific methods.
    pub fn is_method_specific(&self) -> bool {
        !self.methods.is_empty()
    }

    /// Check the method and endpoint, ignoring payload.
    pub fn matches(&self, method: HttpMethod, endpoint: &str) -> bool {
        if !self.methods.is_empty() && !self.methods.contains(&method) {
            return false;
        }
        self.endpoint.is_match(&normalize_endpoint(endpoint))
    }
}

/// Conditions on a payload. Every non-empty condition must hold.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PayloadTrigger {
    /// `field_type` must be one of these values (case-insensitive).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub field_types: Vec<String>,

    /// At least one of these keys must be present.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub any_keys: Vec<String>,

    /// One of the named array fields must be longer than `limit`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub array_longer_than: Option<ArrayLength>,
}

/// Array length condition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArrayLength {
    pub fields: Vec<String>,
    pub limit: usize,
}

impl PayloadTrigger {
    /// A trigger with no conditions.
    pub fn is_empty(&self) -> bool {
        self.field_types.is_empty() && self.any_keys.is_empty() && self.array_longer_than.is_none()
    }

    /// Evaluate the trigger against a payload.
    ///
    /// An empty trigger is always satisfied; a non-empty trigger is never
    /// satisfied by a missing payload.
    pub fn is_satisfied(&self, payload: Option<&Value>) -> bool {
        if self.is_empty() {
            return true;
        }
        let Some(payload) = payload else {
            return false;
        };

        if !self.field_types.is_empty() {
            let Some(field_type) = field_type(payload) else {
                return false;
            };
            if !self
                .field_types
                .iter()
                .any(|t| t.eq_ignore_ascii_case(field_type))
            {
                return false;
            }
        }

        if !self.any_keys.is_empty() && !self.any_keys.iter().any(|k| lookup(payload, k).is_some()) {
            return false;
        }

        if let Some(cond) = &self.array_longer_than {
            if max_array_len(payload, &cond.fields) <= cond.limit {
                return false;
            }
        }

        true
    }
}

/// Strip any query string and ensure a leading slash.
pub fn normalize_endpoint(endpoint: &str) -> String {
    let path = endpoint.split('?').next().unwrap_or_default().trim();
    if path.starts_with('/') {
        path.to_string()
    } else {
        format!("/{}", path)
    }
}

/// Look a key up at the top level of the payload, then inside nested parameter objects.
pub fn lookup<'a>(payload: &'a Value, key: &str) -> Option<&'a Value> {
    let obj = payload.as_object()?;
    if let Some(value) = obj.get(key) {
        return Some(value);
    }
    NESTED_CONTAINERS
        .iter()
        .filter_map(|container| obj.get(*container).and_then(Value::as_object))
        .find_map(|nested| nested.get(key))
}

/// The `field_type` declared by a field-change payload.
pub fn field_type(payload: &Value) -> Option<&str> {
    lookup(payload, "field_type").and_then(Value::as_str)
}

/// Largest array length among the named fields (0 when none are arrays).
pub fn max_array_len(payload: &Value, fields: &[String]) -> usize {
    fields
        .iter()
        .filter_map(|f| lookup(payload, f).and_then(Value::as_array))
        .map(Vec::len)
        .max()
        .unwrap_or(0)
}

/// Compact description of a payload's shape, used in cache keys.
///
/// Keys are sorted so logically identical payloads map to the same shape.
/// Array lengths and `field_type` values are included because triggers
/// depend on them.
pub fn payload_shape(payload: Option<&Value>) -> String {
    match payload {
        None => "-".to_string(),
        Some(value) => shape_of(value, 0),
    }
}

fn shape_of(value: &Value, depth: usize) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::Bool(_) => "b".to_string(),
        Value::Number(_) => "n".to_string(),
        Value::String(_) => "s".to_string(),
        Value::Array(items) => format!("a{}", items.len()),
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            let parts: Vec<String> = keys
                .into_iter()
                .map(|k| {
                    let v = &map[k];
                    if k == "field_type" {
                        if let Some(s) = v.as_str() {
                            return format!("{}={}", k, s.to_ascii_lowercase());
                        }
                    }
                    if depth < 2 && v.is_object() {
                        format!("{}:{}", k, shape_of(v, depth + 1))
                    } else {
                        let tag = match v {
                            Value::Object(_) => "o".to_string(),
                            other => shape_of(other, depth + 1),
                        };
                        format!("{}:{}", k, tag)
                    }
                })
                .collect();
            format!("{{{}}}", parts.join(","))
        }
    }
}

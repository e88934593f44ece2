//! Rewriting requests with the fixes recorded in knowledge entries.
//!
//! Corrections from every match apply in match order, on the endpoint
//! template (before `{id}` substitution). Each rewrite checks its own
//! precondition, so running the engine on an already corrected operation
//! changes nothing.

use serde::Serialize;
use serde_json::{Map, Value};
use suitegate_core::HttpMethod;

use crate::base::KnowledgeMatch;
use crate::entry::Correction;
use crate::pattern::NESTED_CONTAINERS;

/// Request fields the correction engine may rewrite.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CorrectableOperation {
    pub method: HttpMethod,
    pub endpoint: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload: Option<Value>,
}

/// A corrected operation with descriptions of what changed.
#[derive(Debug, Clone, PartialEq)]
pub struct CorrectionOutcome {
    pub operation: CorrectableOperation,
    pub applied: Vec<String>,
}

impl CorrectionOutcome {
    pub fn changed(&self) -> bool {
        !self.applied.is_empty()
    }
}

/// Applies knowledge corrections.
#[derive(Debug, Clone, Copy, Default)]
pub struct CorrectionEngine;

impl CorrectionEngine {
    pub fn new() -> Self {
        Self
    }

    /// Apply the corrections of all matches, in order.
    pub fn apply(&self, original: &CorrectableOperation, matches: &[KnowledgeMatch]) -> CorrectionOutcome {
        let mut corrected = original.clone();
        for m in matches {
            if let Some(correction) = &m.entry.correction {
                apply_one(&mut corrected, correction);
            }
        }

        let applied = describe(original, &corrected);
        if !applied.is_empty() {
            tracing::info!(
                endpoint = %original.endpoint,
                corrections = ?applied,
                "Applied knowledge corrections"
            );
        }
        CorrectionOutcome {
            operation: corrected,
            applied,
        }
    }
}

fn apply_one(op: &mut CorrectableOperation, correction: &Correction) {
    if let Some(method) = &correction.method {
        if op.method == method.from {
            op.method = method.to;
        }
    }

    if let Some(param) = &correction.parameter {
        if let Some(payload) = op.payload.as_mut() {
            rename_parameter(payload, &param.from, &param.to);
        }
    }

    if let Some(endpoint) = &correction.endpoint {
        if !endpoint.from.is_empty()
            && !op.endpoint.contains(endpoint.to.as_str())
            && op.endpoint.contains(endpoint.from.as_str())
        {
            op.endpoint = replace_segment(&op.endpoint, &endpoint.from, &endpoint.to);
        }
    }
}

/// Replace the first `from` with `to`, without doubling a `/` at the seam.
fn replace_segment(endpoint: &str, from: &str, to: &str) -> String {
    let Some(start) = endpoint.find(from) else {
        return endpoint.to_string();
    };
    let head = &endpoint[..start];
    let mut tail = &endpoint[start + from.len()..];
    if to.ends_with('/') {
        tail = tail.strip_prefix('/').unwrap_or(tail);
    }
    format!("{}{}{}", head, to, tail)
}

/// Rename a payload key at the top level and inside nested parameter objects.
/// Absent keys are left alone.
pub fn rename_parameter(payload: &mut Value, from: &str, to: &str) {
    if let Some(object) = payload.as_object_mut() {
        rename_key(object, from, to);
        for container in NESTED_CONTAINERS {
            if let Some(nested) = object.get_mut(container).and_then(Value::as_object_mut) {
                rename_key(nested, from, to);
            }
        }
    }
}

fn rename_key(object: &mut Map<String, Value>, from: &str, to: &str) {
    if let Some(value) = object.remove(from) {
        object.insert(to.to_string(), value);
    }
}

/// Substitute `{id}` with the table id and ensure a leading slash.
pub fn finalize_endpoint(endpoint: &str, table_id: Option<&str>) -> String {
    let substituted = match table_id {
        Some(id) if endpoint.contains("{id}") => endpoint.replace("{id}", id),
        _ => endpoint.to_string(),
    };
    if substituted.starts_with('/') {
        substituted
    } else {
        format!("/{}", substituted)
    }
}

/// Human-readable differences between two operations.
pub fn describe(original: &CorrectableOperation, corrected: &CorrectableOperation) -> Vec<String> {
    let mut changes = Vec::new();
    if original.method != corrected.method {
        changes.push(format!("HTTP method: {} → {}", original.method, corrected.method));
    }
    if original.endpoint != corrected.endpoint {
        changes.push(format!("Endpoint: {} → {}", original.endpoint, corrected.endpoint));
    }

    let before = describe_keys(original.payload.as_ref());
    let after = describe_keys(corrected.payload.as_ref());
    if before != after {
        changes.push(format!("Parameters: {} → {}", before, after));
    }
    changes
}

// Top-level keys plus keys of nested parameter objects, as `params.key`.
fn describe_keys(payload: Option<&Value>) -> String {
    let Some(object) = payload.and_then(Value::as_object) else {
        return String::new();
    };
    let mut keys: Vec<String> = Vec::new();
    for (key, value) in object {
        match value.as_object() {
            Some(nested) if NESTED_CONTAINERS.contains(&key.as_str()) => {
                keys.extend(nested.keys().map(|k| format!("{}.{}", key, k)));
            }
            _ => keys.push(key.clone()),
        }
    }
    keys.sort();
    keys.join(",")
}

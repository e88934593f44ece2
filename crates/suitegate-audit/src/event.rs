//! Audit event types.
//!
//! One event per record mutation attempted through `smartsuite_record`.
//! Each executed mutation carries a [`ReversalInstruction`] describing the
//! call that would undo it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use uuid::Uuid;

/// Type of audit event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditEventType {
    /// Mutation reached the API and succeeded.
    MutationExecuted,
    /// Mutation reached the API and failed.
    MutationFailed,
    /// Mutation was previewed in dry-run mode.
    MutationPreviewed,
    /// Mutation was stopped by the safety gate.
    MutationBlocked,
}

impl std::fmt::Display for AuditEventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MutationExecuted => write!(f, "MUTATION_EXECUTED"),
            Self::MutationFailed => write!(f, "MUTATION_FAILED"),
            Self::MutationPreviewed => write!(f, "MUTATION_PREVIEWED"),
            Self::MutationBlocked => write!(f, "MUTATION_BLOCKED"),
        }
    }
}

/// Record mutation performed through the record tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MutationKind {
    Create,
    Update,
    Delete,
    BulkUpdate,
    BulkDelete,
}

impl MutationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
            Self::BulkUpdate => "bulk_update",
            Self::BulkDelete => "bulk_delete",
        }
    }
}

impl std::fmt::Display for MutationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for MutationKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "create" => Ok(Self::Create),
            "update" => Ok(Self::Update),
            "delete" => Ok(Self::Delete),
            "bulk_update" => Ok(Self::BulkUpdate),
            "bulk_delete" => Ok(Self::BulkDelete),
            other => Err(format!(
                "unknown record operation '{}' (expected create, update, delete, bulk_update or bulk_delete)",
                other
            )),
        }
    }
}

/// How to undo a mutation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReversalInstruction {
    /// Record operation that undoes the mutation.
    pub operation: MutationKind,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub record_ids: Vec<String>,
    /// Data to send with the reversing operation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    pub note: String,
}

impl ReversalInstruction {
    /// Derive the reversal of a mutation.
    ///
    /// `prior_state` is the record (or records) as they were before the
    /// mutation; updates and deletes cannot be fully reversed without it.
    pub fn for_mutation(
        kind: MutationKind,
        record_ids: &[String],
        prior_state: Option<&Value>,
    ) -> Self {
        let ids = record_ids.to_vec();
        match kind {
            MutationKind::Create => Self {
                operation: MutationKind::Delete,
                record_ids: ids,
                data: None,
                note: "Delete the created record".to_string(),
            },
            MutationKind::Update | MutationKind::BulkUpdate => Self {
                operation: kind,
                record_ids: ids,
                data: prior_state.cloned(),
                note: match prior_state {
                    Some(_) => "Restore the prior field values".to_string(),
                    None => "Prior state unavailable; restore manually".to_string(),
                },
            },
            MutationKind::Delete | MutationKind::BulkDelete => Self {
                operation: MutationKind::Create,
                record_ids: ids,
                data: prior_state.cloned(),
                note: match prior_state {
                    Some(_) => "Recreate the deleted record(s) from the prior state".to_string(),
                    None => "Prior state unavailable; deleted data cannot be restored".to_string(),
                },
            },
        }
    }
}

/// An audit event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
    /// Unique event ID.
    pub event_id: Uuid,

    /// When the event occurred.
    pub occurred_at: DateTime<Utc>,

    pub event_type: AuditEventType,

    pub operation: MutationKind,

    /// SmartSuite application (table) id.
    pub table_id: String,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub record_ids: Vec<String>,

    /// Data sent with the mutation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload: Option<Value>,

    /// Record state before the mutation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prior_state: Option<Value>,

    /// API response.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,

    /// Changed fields, `{field: {old, new}}`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diff: Option<Value>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    #[serde(default)]
    pub dry_run: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,

    /// Safety verdict the mutation ran under (GREEN/YELLOW/RED).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub safety_level: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub reversal: Option<ReversalInstruction>,
}

impl AuditEvent {
    pub fn new(event_type: AuditEventType, operation: MutationKind, table_id: impl Into<String>) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            occurred_at: Utc::now(),
            event_type,
            operation,
            table_id: table_id.into(),
            record_ids: Vec::new(),
            payload: None,
            prior_state: None,
            result: None,
            diff: None,
            error: None,
            dry_run: false,
            duration_ms: None,
            safety_level: None,
            reversal: None,
        }
    }

    pub fn builder(
        event_type: AuditEventType,
        operation: MutationKind,
        table_id: impl Into<String>,
    ) -> AuditEventBuilder {
        AuditEventBuilder::new(event_type, operation, table_id)
    }

    /// Format the event as a human-readable log line.
    ///
    /// Format: `[timestamp] EVENT_TYPE operation=... table=... [records=...]`
    pub fn to_log_line(&self) -> String {
        let mut line = format!(
            "[{}] {} operation={} table={}",
            self.occurred_at.format("%Y-%m-%dT%H:%M:%S%.3fZ"),
            self.event_type,
            self.operation,
            self.table_id,
        );

        if !self.record_ids.is_empty() {
            line.push_str(&format!(" records=[{}]", self.record_ids.join(",")));
        }
        if let Some(level) = &self.safety_level {
            line.push_str(&format!(" safety={}", level));
        }
        if let Some(duration) = self.duration_ms {
            line.push_str(&format!(" duration_ms={}", duration));
        }
        if let Some(error) = &self.error {
            line.push_str(&format!(" error=\"{}\"", error.replace('"', "'")));
        }
        if self.dry_run {
            line.push_str(" dry_run=true");
        }
        if let Some(obj) = self.diff.as_ref().and_then(Value::as_object) {
            let changed: Vec<&str> = obj.keys().map(String::as_str).collect();
            if !changed.is_empty() {
                line.push_str(&format!(" changed_fields=[{}]", changed.join(",")));
            }
        }
        if let Some(reversal) = &self.reversal {
            line.push_str(&format!(" reversal={}", reversal.operation));
        }

        line
    }
}

/// Builder for creating audit events.
#[derive(Debug)]
pub struct AuditEventBuilder {
    event: AuditEvent,
}

impl AuditEventBuilder {
    pub fn new(event_type: AuditEventType, operation: MutationKind, table_id: impl Into<String>) -> Self {
        Self {
            event: AuditEvent::new(event_type, operation, table_id),
        }
    }

    pub fn record_id(mut self, id: impl Into<String>) -> Self {
        self.event.record_ids.push(id.into());
        self
    }

    pub fn record_ids(mut self, ids: Vec<String>) -> Self {
        self.event.record_ids = ids;
        self
    }

    pub fn payload(mut self, payload: Value) -> Self {
        self.event.payload = Some(payload);
        self
    }

    pub fn prior_state(mut self, state: Value) -> Self {
        self.event.prior_state = Some(state);
        self
    }

    pub fn result(mut self, result: Value) -> Self {
        self.event.result = Some(result);
        self
    }

    pub fn error(mut self, error: impl Into<String>) -> Self {
        self.event.error = Some(error.into());
        self
    }

    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.event.dry_run = dry_run;
        self
    }

    pub fn duration_ms(mut self, duration: u64) -> Self {
        self.event.duration_ms = Some(duration);
        self
    }

    pub fn safety_level(mut self, level: impl Into<String>) -> Self {
        self.event.safety_level = Some(level.into());
        self
    }

    pub fn reversal(mut self, reversal: ReversalInstruction) -> Self {
        self.event.reversal = Some(reversal);
        self
    }

    /// Derive the reversal instruction from the operation, record ids and prior state.
    pub fn derive_reversal(mut self) -> Self {
        self.event.reversal = Some(ReversalInstruction::for_mutation(
            self.event.operation,
            &self.event.record_ids,
            self.event.prior_state.as_ref(),
        ));
        self
    }

    /// Compute the diff between prior state and payload.
    pub fn compute_diff(mut self) -> Self {
        if let (Some(before), Some(after)) = (&self.event.prior_state, &self.event.payload) {
            let diff = changed_fields(before, after);
            if !diff.is_null() {
                self.event.diff = Some(diff);
            }
        }
        self
    }

    pub fn build(self) -> AuditEvent {
        self.event
    }
}

/// Fields in `update` whose value differs from `before`.
///
/// Only keys present in `update` are compared, since a record update sends
/// a partial object. Returns `Null` when nothing changed.
pub fn changed_fields(before: &Value, update: &Value) -> Value {
    match (before, update) {
        (Value::Object(before_obj), Value::Object(update_obj)) => {
            let mut diff = Map::new();
            for (key, new_value) in update_obj {
                let old_value = before_obj.get(key).unwrap_or(&Value::Null);
                if old_value != new_value {
                    diff.insert(key.clone(), json!({"old": old_value, "new": new_value}));
                }
            }
            if diff.is_empty() {
                Value::Null
            } else {
                Value::Object(diff)
            }
        }
        _ if before != update => json!({"old": before, "new": update}),
        _ => Value::Null,
    }
}

//! Three-tier safety classification of SmartSuite operations.
//!
//! A verdict combines two sources:
//!
//! - fixed critical checks that run on every operation (select option UUID
//!   corruption, bulk batch size, record listing verb), and
//! - the knowledge entries matched for the operation.
//!
//! RED operations carry the [`CONFIRMATION_BLOCKER`] until the caller
//! confirms them. Confirmation never lowers the level.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use suitegate_core::{HttpMethod, SafetyConfig};

use crate::base::KnowledgeMatch;
use crate::entry::{RuleKind, SafetyLevel};
use crate::pattern::{field_type, lookup, max_array_len, normalize_endpoint};

/// Blocker added to unconfirmed RED operations.
pub const CONFIRMATION_BLOCKER: &str = "RED level operation requires confirmation";

/// Recommendation emitted for select option UUID risk.
pub const USE_CHOICES: &str = "Use \"choices\" parameter instead of \"options\"";

const SELECT_FIELD_TYPES: [&str; 3] = ["singleselectfield", "multipleselectfield", "statusfield"];
const BULK_FIELDS: [&str; 2] = ["records", "items"];

const BLOCKER_PENALTY: i64 = 40;
const CRITICAL_PENALTY: i64 = 20;
const WARNING_PENALTY: i64 = 10;

/// Severity of a single warning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum WarningLevel {
    Info,
    Warning,
    Critical,
}

/// A leveled warning, optionally tied to the protocol that raised it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SafetyWarning {
    pub level: WarningLevel,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub protocol: Option<String>,
}

impl SafetyWarning {
    pub fn new(level: WarningLevel, message: impl Into<String>) -> Self {
        Self {
            level,
            message: message.into(),
            protocol: None,
        }
    }

    pub fn with_protocol(mut self, protocol: impl Into<String>) -> Self {
        self.protocol = Some(protocol.into());
        self
    }
}

/// Result of one critical check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckOutcome {
    Passed,
    /// Breached, but not enough to block.
    Warning,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtocolValidation {
    pub protocol: String,
    pub outcome: CheckOutcome,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recommendation: Option<String>,
}

impl ProtocolValidation {
    fn passed(protocol: &str, message: impl Into<String>) -> Self {
        Self {
            protocol: protocol.to_string(),
            outcome: CheckOutcome::Passed,
            message: message.into(),
            recommendation: None,
        }
    }

    fn breached(
        protocol: &str,
        outcome: CheckOutcome,
        message: impl Into<String>,
        recommendation: impl Into<String>,
    ) -> Self {
        Self {
            protocol: protocol.to_string(),
            outcome,
            message: message.into(),
            recommendation: Some(recommendation.into()),
        }
    }
}

/// Verdict for one operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SafetyAssessment {
    pub level: SafetyLevel,
    /// 0 to 100, higher is safer.
    pub score: u8,
    pub blockers: Vec<String>,
    pub warnings: Vec<SafetyWarning>,
    pub recommendations: Vec<String>,
    pub requires_confirmation: bool,
    pub validations: Vec<ProtocolValidation>,
    pub matched_patterns: Vec<String>,
}

impl SafetyAssessment {
    /// Fallback verdict when classification inputs are unavailable.
    pub fn conservative(reason: impl Into<String>) -> Self {
        let mut assessment = Self {
            level: SafetyLevel::Yellow,
            score: 100,
            blockers: Vec::new(),
            warnings: vec![SafetyWarning::new(WarningLevel::Warning, reason)],
            recommendations: Vec::new(),
            requires_confirmation: false,
            validations: Vec::new(),
            matched_patterns: Vec::new(),
        };
        assessment.rescore();
        assessment
    }

    /// Raise the level to at least YELLOW and explain why.
    pub fn escalate(&mut self, reason: impl Into<String>) {
        self.level = self.level.max(SafetyLevel::Yellow);
        self.warnings
            .push(SafetyWarning::new(WarningLevel::Warning, reason));
        self.rescore();
    }

    pub fn is_blocked(&self) -> bool {
        !self.blockers.is_empty()
    }

    /// Whether an operation with this verdict may run.
    pub fn allows_execution(&self, confirmed: bool) -> bool {
        self.level != SafetyLevel::Red || confirmed
    }

    fn rescore(&mut self) {
        let critical = self
            .warnings
            .iter()
            .filter(|w| w.level == WarningLevel::Critical)
            .count() as i64;
        let moderate = self
            .warnings
            .iter()
            .filter(|w| w.level == WarningLevel::Warning)
            .count() as i64;
        let score = 100
            - BLOCKER_PENALTY * self.blockers.len() as i64
            - CRITICAL_PENALTY * critical
            - WARNING_PENALTY * moderate;
        self.score = score.clamp(0, 100) as u8;
    }
}

/// The operation being classified.
#[derive(Debug, Clone, Copy)]
pub struct OperationView<'a> {
    pub method: HttpMethod,
    pub endpoint: &'a str,
    pub payload: Option<&'a Value>,
    pub confirmed: bool,
}

/// Produces [`SafetyAssessment`]s.
#[derive(Debug, Clone)]
pub struct SafetyClassifier {
    bulk_limit: usize,
}

impl SafetyClassifier {
    pub fn new(bulk_limit: usize) -> Self {
        Self {
            bulk_limit: bulk_limit.max(1),
        }
    }

    pub fn from_config(config: &SafetyConfig) -> Self {
        Self::new(config.bulk_limit)
    }

    pub fn bulk_limit(&self) -> usize {
        self.bulk_limit
    }

    /// Run the fixed checks. Always returns one validation per check.
    pub fn critical_checks(&self, op: &OperationView<'_>) -> Vec<ProtocolValidation> {
        vec![
            self.check_select_options(op),
            self.check_bulk_size(op),
            self.check_list_endpoint(op),
        ]
    }

    fn check_select_options(&self, op: &OperationView<'_>) -> ProtocolValidation {
        const PROTOCOL: &str = "uuid_corruption_prevention";

        let Some(payload) = op.payload else {
            return ProtocolValidation::passed(PROTOCOL, "No payload");
        };
        let select_type = field_type(payload)
            .is_some_and(|t| SELECT_FIELD_TYPES.iter().any(|s| s.eq_ignore_ascii_case(t)));

        if op.endpoint.contains("change_field") && select_type && lookup(payload, "options").is_some() {
            ProtocolValidation::breached(
                PROTOCOL,
                CheckOutcome::Failed,
                "Select field change uses \"options\", which regenerates option UUIDs and orphans existing record values",
                USE_CHOICES,
            )
        } else {
            ProtocolValidation::passed(PROTOCOL, "Select field options are preserved")
        }
    }

    fn check_bulk_size(&self, op: &OperationView<'_>) -> ProtocolValidation {
        const PROTOCOL: &str = "bulk_operation_limit";

        let count = bulk_size(op.payload);
        let limit = self.bulk_limit;
        let recommendation = format!("Split into batches of {} records or fewer", limit);

        if count <= limit {
            ProtocolValidation::passed(
                PROTOCOL,
                format!("{} records within the limit of {}", count, limit),
            )
        } else if count <= limit * 2 {
            ProtocolValidation::breached(
                PROTOCOL,
                CheckOutcome::Warning,
                format!(
                    "Bulk operation with {} records exceeds the recommended limit of {}",
                    count, limit
                ),
                recommendation,
            )
        } else {
            ProtocolValidation::breached(
                PROTOCOL,
                CheckOutcome::Failed,
                format!(
                    "Bulk operation with {} records exceeds twice the limit of {}",
                    count, limit
                ),
                recommendation,
            )
        }
    }

    fn check_list_endpoint(&self, op: &OperationView<'_>) -> ProtocolValidation {
        const PROTOCOL: &str = "endpoint_correctness";

        let endpoint = normalize_endpoint(op.endpoint);
        let path = endpoint.trim_end_matches('/');
        if op.method == HttpMethod::Get && path.ends_with("/records") {
            ProtocolValidation::breached(
                PROTOCOL,
                CheckOutcome::Failed,
                format!("GET {} does not list records", op.endpoint),
                "List records with POST to /records/list/",
            )
        } else {
            ProtocolValidation::passed(PROTOCOL, "Endpoint and method are consistent")
        }
    }

    /// Classify an operation against its knowledge matches.
    pub fn assess(&self, op: &OperationView<'_>, matches: &[KnowledgeMatch]) -> SafetyAssessment {
        let validations = self.critical_checks(op);

        let mut level = SafetyLevel::Green;
        let mut blockers = Vec::new();
        let mut warnings: Vec<SafetyWarning> = Vec::new();
        let mut recommendations: Vec<String> = Vec::new();

        for validation in &validations {
            match validation.outcome {
                CheckOutcome::Passed => continue,
                CheckOutcome::Failed => {
                    level = SafetyLevel::Red;
                    blockers.push(validation.message.clone());
                }
                CheckOutcome::Warning => {
                    level = level.max(SafetyLevel::Yellow);
                    warnings.push(
                        SafetyWarning::new(WarningLevel::Warning, validation.message.clone())
                            .with_protocol(validation.protocol.clone()),
                    );
                }
            }
            if let Some(rec) = &validation.recommendation {
                recommendations.push(rec.clone());
            }
        }

        for m in matches {
            let entry = &m.entry;
            level = level.max(entry.safety_level);

            let warning_level = match entry.safety_level {
                SafetyLevel::Red => WarningLevel::Critical,
                SafetyLevel::Yellow => WarningLevel::Warning,
                SafetyLevel::Green => WarningLevel::Info,
            };
            let protocol = entry
                .triggered_protocols(op.payload)
                .first()
                .map(|p| p.name.clone());

            for mode in &entry.failure_modes {
                let mut warning = SafetyWarning::new(warning_level, mode.description.clone());
                warning.protocol = protocol.clone();
                warnings.push(warning);
                recommendations.push(mode.prevention.clone());
                if let Some(alt) = &mode.safe_alternative {
                    recommendations.push(format!("Safe alternative: {}", alt));
                }
            }

            for breach in entry.rule_breaches(op.payload) {
                level = level.max(SafetyLevel::Yellow);
                warnings.push(
                    SafetyWarning::new(WarningLevel::Warning, breach.message.clone())
                        .with_protocol(breach.rule.clone()),
                );
                recommendations.push(match breach.kind {
                    RuleKind::MaxArrayLength => {
                        format!("Split into batches of {} records or fewer", breach.limit)
                    }
                    RuleKind::RequiredKeys => breach.message,
                });
            }
        }

        let requires_confirmation = level == SafetyLevel::Red;
        if requires_confirmation && !op.confirmed {
            blockers.push(CONFIRMATION_BLOCKER.to_string());
        }

        dedup_by_key(&mut warnings, |w| w.message.clone());
        dedup_by_key(&mut recommendations, |r| r.clone());

        let mut assessment = SafetyAssessment {
            level,
            score: 100,
            blockers,
            warnings,
            recommendations,
            requires_confirmation,
            validations,
            matched_patterns: matches.iter().map(|m| m.entry.id.clone()).collect(),
        };
        assessment.rescore();

        tracing::debug!(
            method = %op.method,
            endpoint = %op.endpoint,
            level = %assessment.level,
            score = assessment.score,
            blockers = assessment.blockers.len(),
            "Operation classified"
        );
        assessment
    }
}

impl Default for SafetyClassifier {
    fn default() -> Self {
        Self::from_config(&SafetyConfig::default())
    }
}

/// Number of records a bulk payload carries, looking inside nested parameter objects.
pub fn bulk_size(payload: Option<&Value>) -> usize {
    let fields: Vec<String> = BULK_FIELDS.iter().map(|f| f.to_string()).collect();
    payload.map(|p| max_array_len(p, &fields)).unwrap_or(0)
}

/// One summary warning for an assessment.
pub fn generate_warnings(assessment: &SafetyAssessment) -> SafetyWarning {
    match assessment.level {
        SafetyLevel::Red => SafetyWarning::new(
            WarningLevel::Critical,
            format!(
                "HIGH RISK: {} blocker(s) and {} warning(s); review before executing",
                assessment.blockers.len(),
                assessment.warnings.len()
            ),
        ),
        SafetyLevel::Yellow => SafetyWarning::new(
            WarningLevel::Warning,
            format!(
                "Moderate risk: {} warning(s) to review",
                assessment.warnings.len()
            ),
        ),
        SafetyLevel::Green => SafetyWarning::new(
            WarningLevel::Info,
            "Safe operation: no known issues",
        ),
    }
}

/// Keep the first occurrence of each key, preserving order.
fn dedup_by_key<T, K: Eq + std::hash::Hash>(items: &mut Vec<T>, key: impl Fn(&T) -> K) {
    let mut seen = std::collections::HashSet::new();
    items.retain(|item| seen.insert(key(item)));
}

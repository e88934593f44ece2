//! Knowledge-guided execution of raw SmartSuite API operations.
//!
//! Every operation runs through the same pipeline: knowledge lookup, safety
//! classification, then one of three modes.
//!
//! | Mode | Network | Result |
//! |------|---------|--------|
//! | `learn` | none | guidance text and an optional suggested correction |
//! | `dry_run` | one read-only probe | corrected request and `wouldExecute` |
//! | `execute` | one API call | API response, or a classified failure |
//!
//! `execute` refuses RED operations unless `confirmed` is set, before any
//! network traffic.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt::Write as _;
use std::sync::Arc;
use std::time::{Duration, Instant};
use suitegate_core::{HttpMethod, InvalidMethod};
use suitegate_knowledge::{
    CheckOutcome, CorrectableOperation, CorrectionEngine, KnowledgeMatch, KnowledgeProvider,
    KnowledgeVersion, ObservedOperation, OperationOutcome, OperationView, ProtocolValidation,
    SafetyAssessment, SafetyClassifier, SafetyLevel, SafetyWarning, bulk_size, finalize_endpoint,
    generate_warnings, rename_parameter,
};
use thiserror::Error;

use crate::client::{ApiRequest, ClientError, SuiteClient};

/// Default timeout for the single outbound call of `execute` and `dry_run`.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Default connectivity probe target.
pub const DEFAULT_PROBE_ENDPOINT: &str = "/solutions/";

/// Error text for a RED operation executed without confirmation.
pub const CONFIRMATION_REQUIRED: &str =
    "RED level operation requires confirmation: review the blockers and retry with confirmed=true";

#[derive(Debug, Error)]
pub enum IntelligentError {
    #[error("missing required argument: {0}")]
    MissingField(&'static str),

    #[error("invalid mode '{0}' (expected learn, dry_run or execute)")]
    InvalidMode(String),

    #[error(transparent)]
    InvalidMethod(#[from] InvalidMethod),

    #[error("invalid arguments: {0}")]
    InvalidArguments(String),

    #[error("SmartSuite client not configured")]
    ClientNotConfigured,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationMode {
    Learn,
    DryRun,
    Execute,
}

impl std::str::FromStr for OperationMode {
    type Err = IntelligentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "learn" => Ok(OperationMode::Learn),
            "dry_run" => Ok(OperationMode::DryRun),
            "execute" => Ok(OperationMode::Execute),
            other => Err(IntelligentError::InvalidMode(other.to_string())),
        }
    }
}

/// A validated operation request.
#[derive(Debug, Clone)]
pub struct OperationInput {
    pub mode: OperationMode,
    pub method: HttpMethod,
    pub endpoint: String,
    pub payload: Option<Value>,
    pub table_id: Option<String>,
    pub operation_description: String,
    pub confirmed: bool,
}

#[derive(Deserialize)]
struct RawInput {
    mode: Option<String>,
    endpoint: Option<String>,
    method: Option<String>,
    #[serde(default)]
    payload: Option<Value>,
    #[serde(default, rename = "tableId")]
    table_id: Option<String>,
    operation_description: Option<String>,
    #[serde(default)]
    confirmed: bool,
}

impl OperationInput {
    /// Validate tool arguments. Fails before any knowledge lookup.
    pub fn from_arguments(arguments: Value) -> Result<Self, IntelligentError> {
        let raw: RawInput = serde_json::from_value(arguments)
            .map_err(|e| IntelligentError::InvalidArguments(e.to_string()))?;

        let mode: OperationMode = required(raw.mode, "mode")?.parse()?;
        let endpoint = required(raw.endpoint, "endpoint")?;
        let method: HttpMethod = required(raw.method, "method")?.parse()?;
        let operation_description = required(raw.operation_description, "operation_description")?;

        if raw.payload.as_ref().is_some_and(|p| !p.is_object() && !p.is_null()) {
            return Err(IntelligentError::InvalidArguments(
                "payload must be a JSON object".to_string(),
            ));
        }

        Ok(Self {
            mode,
            method,
            endpoint,
            payload: raw.payload.filter(|p| !p.is_null()),
            table_id: raw.table_id.filter(|t| !t.is_empty()),
            operation_description,
            confirmed: raw.confirmed,
        })
    }

    fn view(&self) -> OperationView<'_> {
        OperationView {
            method: self.method,
            endpoint: &self.endpoint,
            payload: self.payload.as_ref(),
            confirmed: self.confirmed,
        }
    }

    fn correctable(&self) -> CorrectableOperation {
        CorrectableOperation {
            method: self.method,
            endpoint: self.endpoint.clone(),
            payload: self.payload.clone(),
        }
    }

    fn observed(&self) -> ObservedOperation {
        ObservedOperation {
            method: self.method,
            endpoint: self.endpoint.clone(),
            payload: self.payload.clone(),
        }
    }
}

fn required(value: Option<String>, field: &'static str) -> Result<String, IntelligentError> {
    value
        .filter(|v| !v.trim().is_empty())
        .ok_or(IntelligentError::MissingField(field))
}

/// Category of a failed `execute` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FailureCategory {
    EndpointNotFound,
    AuthenticationError,
    InvalidPayload,
    ServerError,
    NetworkError,
    UnknownError,
}

impl FailureCategory {
    /// Classify by the status code embedded in the error text.
    pub fn classify(error: &ClientError) -> Self {
        if matches!(error, ClientError::Timeout(_) | ClientError::Network(_)) {
            return FailureCategory::NetworkError;
        }
        let message = error.to_string();
        if message.contains("404") {
            FailureCategory::EndpointNotFound
        } else if message.contains("401") || message.contains("403") {
            FailureCategory::AuthenticationError
        } else if message.contains("400") {
            FailureCategory::InvalidPayload
        } else if message.contains("500") {
            FailureCategory::ServerError
        } else {
            FailureCategory::UnknownError
        }
    }

    /// Advice recorded with the failure, for categories caused by the
    /// request's shape.
    fn suggestion(&self) -> Option<&'static str> {
        match self {
            FailureCategory::EndpointNotFound => Some(
                "Verify the endpoint path; record listing uses POST /applications/{id}/records/list/",
            ),
            FailureCategory::InvalidPayload => {
                Some("Check payload field codes and value formats against the application schema")
            }
            _ => None,
        }
    }
}

/// Pipeline output attached to every result.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Analysis {
    pub safety_level: SafetyLevel,
    pub score: u8,
    pub blockers: Vec<String>,
    pub warnings: Vec<SafetyWarning>,
    pub recommendations: Vec<String>,
    pub requires_confirmation: bool,
    pub validations: Vec<ProtocolValidation>,
    pub matched_patterns: Vec<String>,
    pub corrections_applied: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub knowledge_version: Option<KnowledgeVersion>,
}

impl Analysis {
    fn new(assessment: &SafetyAssessment, knowledge_version: Option<KnowledgeVersion>) -> Self {
        Self {
            safety_level: assessment.level,
            score: assessment.score,
            blockers: assessment.blockers.clone(),
            warnings: assessment.warnings.clone(),
            recommendations: assessment.recommendations.clone(),
            requires_confirmation: assessment.requires_confirmation,
            validations: assessment.validations.clone(),
            matched_patterns: assessment.matched_patterns.clone(),
            corrections_applied: Vec::new(),
            knowledge_version,
        }
    }
}

/// A concrete fix proposed by `learn`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SuggestedCorrection {
    pub kind: CorrectionKind,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub method: Option<HttpMethod>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub batches: Option<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CorrectionKind {
    UuidProtection,
    MethodCorrection,
    BulkBatching,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationResult {
    pub mode: OperationMode,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_mode: Option<FailureCategory>,
    pub analysis: Analysis,
    pub summary: SafetyWarning,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub guidance: Option<String>,
    #[serde(rename = "suggested_correction", skip_serializing_if = "Option::is_none")]
    pub suggested_correction: Option<SuggestedCorrection>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub connectivity_valid: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub connectivity_error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub would_execute: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub final_method: Option<HttpMethod>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub final_endpoint: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub final_payload: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
}

impl OperationResult {
    fn new(mode: OperationMode, analysis: Analysis, assessment: &SafetyAssessment) -> Self {
        Self {
            mode,
            success: true,
            result: None,
            error: None,
            failure_mode: None,
            analysis,
            summary: generate_warnings(assessment),
            guidance: None,
            suggested_correction: None,
            connectivity_valid: None,
            connectivity_error: None,
            would_execute: None,
            final_method: None,
            final_endpoint: None,
            final_payload: None,
            duration_ms: None,
        }
    }
}

/// Knowledge matches and the verdict built from them.
#[derive(Debug, Clone)]
pub struct Classification {
    pub matches: Vec<KnowledgeMatch>,
    pub assessment: SafetyAssessment,
}

/// Runs operations through lookup, classification, correction and
/// (optionally) the SmartSuite API.
pub struct OperationExecutor {
    knowledge: Arc<dyn KnowledgeProvider>,
    classifier: SafetyClassifier,
    corrections: CorrectionEngine,
    client: Option<Arc<dyn SuiteClient>>,
    timeout: Duration,
    probe_endpoint: String,
}

impl OperationExecutor {
    pub fn new(knowledge: Arc<dyn KnowledgeProvider>) -> Self {
        Self {
            knowledge,
            classifier: SafetyClassifier::default(),
            corrections: CorrectionEngine::new(),
            client: None,
            timeout: DEFAULT_TIMEOUT,
            probe_endpoint: DEFAULT_PROBE_ENDPOINT.to_string(),
        }
    }

    pub fn with_client(mut self, client: Arc<dyn SuiteClient>) -> Self {
        self.client = Some(client);
        self
    }

    pub fn with_classifier(mut self, classifier: SafetyClassifier) -> Self {
        self.classifier = classifier;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_probe_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.probe_endpoint = endpoint.into();
        self
    }

    pub fn knowledge(&self) -> &Arc<dyn KnowledgeProvider> {
        &self.knowledge
    }

    pub fn client(&self) -> Option<&Arc<dyn SuiteClient>> {
        self.client.as_ref()
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Look up knowledge and classify. A failed lookup is treated as "no
    /// matches" and the verdict is raised to at least YELLOW.
    pub fn classify(&self, view: &OperationView<'_>) -> Classification {
        match self
            .knowledge
            .find_relevant_knowledge(view.method, view.endpoint, view.payload)
        {
            Ok(matches) => {
                let assessment = self.classifier.assess(view, &matches);
                Classification { matches, assessment }
            }
            Err(e) => {
                tracing::warn!(error = %e, endpoint = %view.endpoint, "Knowledge lookup failed");
                let mut assessment = self.classifier.assess(view, &[]);
                assessment.escalate(format!(
                    "Knowledge lookup failed ({}); known failure modes were not checked",
                    e
                ));
                Classification {
                    matches: Vec::new(),
                    assessment,
                }
            }
        }
    }

    fn knowledge_version(&self) -> Option<KnowledgeVersion> {
        match self.knowledge.version() {
            Ok(version) => Some(version),
            Err(e) => {
                tracing::warn!(error = %e, "Knowledge version unavailable");
                None
            }
        }
    }

    /// Validate raw tool arguments and run them.
    pub async fn run_arguments(&self, arguments: Value) -> Result<OperationResult, IntelligentError> {
        let input = OperationInput::from_arguments(arguments)?;
        self.run(&input).await
    }

    pub async fn run(&self, input: &OperationInput) -> Result<OperationResult, IntelligentError> {
        tracing::info!(
            mode = ?input.mode,
            method = %input.method,
            endpoint = %input.endpoint,
            description = %input.operation_description,
            "Intelligent operation"
        );

        match input.mode {
            OperationMode::Learn => Ok(self.learn(input)),
            OperationMode::DryRun => Ok(self.dry_run(input).await),
            OperationMode::Execute => self.execute(input).await,
        }
    }

    fn learn(&self, input: &OperationInput) -> OperationResult {
        let Classification {
            matches,
            assessment,
        } = self.classify(&input.view());

        let analysis = Analysis::new(&assessment, self.knowledge_version());
        let mut result = OperationResult::new(OperationMode::Learn, analysis, &assessment);
        result.guidance = Some(guidance(input, &matches, &assessment));
        result.suggested_correction = self.suggest_correction(input, &assessment);
        result
    }

    async fn dry_run(&self, input: &OperationInput) -> OperationResult {
        let Classification {
            matches,
            assessment,
        } = self.classify(&input.view());

        let outcome = self.corrections.apply(&input.correctable(), &matches);
        let final_endpoint = finalize_endpoint(&outcome.operation.endpoint, input.table_id.as_deref());

        let mut analysis = Analysis::new(&assessment, self.knowledge_version());
        analysis.corrections_applied = outcome.applied;

        let mut result = OperationResult::new(OperationMode::DryRun, analysis, &assessment);
        result.would_execute = Some(assessment.allows_execution(input.confirmed));
        result.final_method = Some(outcome.operation.method);
        result.final_endpoint = Some(final_endpoint);
        result.final_payload = outcome.operation.payload;

        match self.probe().await {
            Ok(()) => result.connectivity_valid = Some(true),
            Err(e) => {
                tracing::warn!(error = %e, endpoint = %self.probe_endpoint, "Connectivity probe failed");
                result.connectivity_valid = Some(false);
                result.connectivity_error = Some(e);
            }
        }
        result
    }

    async fn probe(&self) -> Result<(), String> {
        let client = self
            .client
            .as_ref()
            .ok_or_else(|| IntelligentError::ClientNotConfigured.to_string())?;
        let request = ApiRequest::get(self.probe_endpoint.clone());
        match tokio::time::timeout(self.timeout, client.request(request)).await {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(e)) => Err(e.to_string()),
            Err(_) => Err(ClientError::Timeout(self.timeout).to_string()),
        }
    }

    async fn execute(&self, input: &OperationInput) -> Result<OperationResult, IntelligentError> {
        let client = self
            .client
            .as_ref()
            .ok_or(IntelligentError::ClientNotConfigured)?;

        let Classification {
            matches,
            assessment,
        } = self.classify(&input.view());
        let mut analysis = Analysis::new(&assessment, self.knowledge_version());

        if !assessment.allows_execution(input.confirmed) {
            tracing::warn!(
                method = %input.method,
                endpoint = %input.endpoint,
                blockers = ?assessment.blockers,
                "Execution blocked pending confirmation"
            );
            analysis.requires_confirmation = true;
            let mut result = OperationResult::new(OperationMode::Execute, analysis, &assessment);
            result.success = false;
            result.error = Some(CONFIRMATION_REQUIRED.to_string());
            return Ok(result);
        }

        let outcome = self.corrections.apply(&input.correctable(), &matches);
        let final_endpoint = finalize_endpoint(&outcome.operation.endpoint, input.table_id.as_deref());
        analysis.corrections_applied = outcome.applied;

        let request = ApiRequest::new(
            outcome.operation.method,
            final_endpoint.clone(),
            outcome.operation.payload.clone(),
        );
        let started = Instant::now();
        let response = match tokio::time::timeout(self.timeout, client.request(request)).await {
            Ok(response) => response,
            Err(_) => Err(ClientError::Timeout(self.timeout)),
        };
        let duration_ms = started.elapsed().as_millis() as u64;

        let mut result = OperationResult::new(OperationMode::Execute, analysis, &assessment);
        result.final_method = Some(outcome.operation.method);
        result.final_endpoint = Some(final_endpoint);
        result.duration_ms = Some(duration_ms);

        match response {
            Ok(value) => {
                tracing::info!(duration_ms, "Operation executed");
                self.record_outcome(input, OperationOutcome::Success);
                result.result = Some(value);
            }
            Err(e) => {
                let category = FailureCategory::classify(&e);
                tracing::warn!(error = %e, category = ?category, "Operation failed");
                self.record_outcome(
                    input,
                    OperationOutcome::Failure {
                        error: e.to_string(),
                        suggestion: category.suggestion().map(str::to_string),
                    },
                );
                result.success = false;
                result.error = Some(e.to_string());
                result.failure_mode = Some(category);
            }
        }
        Ok(result)
    }

    fn record_outcome(&self, input: &OperationInput, outcome: OperationOutcome) {
        match self.knowledge.learn_from_operation(&input.observed(), &outcome) {
            Ok(learned) => tracing::debug!(result = ?learned, "Learning hook"),
            Err(e) => tracing::warn!(error = %e, "Learning hook failed"),
        }
    }

    /// One concrete fix for the most serious detected problem.
    fn suggest_correction(
        &self,
        input: &OperationInput,
        assessment: &SafetyAssessment,
    ) -> Option<SuggestedCorrection> {
        let breached = |protocol: &str| {
            assessment
                .validations
                .iter()
                .find(|v| v.protocol == protocol && v.outcome != CheckOutcome::Passed)
        };

        if breached("uuid_corruption_prevention").is_some() {
            return Some(SuggestedCorrection {
                kind: CorrectionKind::UuidProtection,
                description: "Send \"choices\" with the existing option values instead of \"options\"".to_string(),
                method: None,
                endpoint: None,
                payload: input.payload.clone().map(|mut payload| {
                    rename_parameter(&mut payload, "options", "choices");
                    payload
                }),
                batches: None,
            });
        }

        if breached("endpoint_correctness").is_some() {
            let endpoint = format!("{}/list/", input.endpoint.trim_end_matches('/'));
            return Some(SuggestedCorrection {
                kind: CorrectionKind::MethodCorrection,
                description: format!("List records with POST {}", endpoint),
                method: Some(HttpMethod::Post),
                endpoint: Some(endpoint),
                payload: None,
                batches: None,
            });
        }

        if let Some(validation) = breached("bulk_operation_limit") {
            let limit = self.classifier.bulk_limit().max(1);
            let count = bulk_size(input.payload.as_ref());
            let batches = count.div_ceil(limit);
            return Some(SuggestedCorrection {
                kind: CorrectionKind::BulkBatching,
                description: format!(
                    "{}; split into {} batches of at most {} records",
                    validation.message, batches, limit
                ),
                method: None,
                endpoint: None,
                payload: None,
                batches: Some(batches),
            });
        }

        None
    }
}

/// Human-readable briefing for `learn` mode.
fn guidance(input: &OperationInput, matches: &[KnowledgeMatch], assessment: &SafetyAssessment) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Operation: {}", input.operation_description);
    let _ = writeln!(out, "Request: {} {}", input.method, input.endpoint);
    let _ = writeln!(
        out,
        "Safety level: {} (score {}/100)",
        assessment.level, assessment.score
    );
    let _ = writeln!(out, "Summary: {}", generate_warnings(assessment).message);

    if !matches.is_empty() {
        let _ = writeln!(out, "\nKnown failure modes:");
        let mut n = 0;
        for m in matches {
            for mode in &m.entry.failure_modes {
                n += 1;
                let _ = writeln!(out, "{}. [{}] {}", n, m.entry.id, mode.description);
                let _ = writeln!(out, "   Cause: {}", mode.cause);
                let _ = writeln!(out, "   Prevention: {}", mode.prevention);
                if let Some(alt) = &mode.safe_alternative {
                    let _ = writeln!(out, "   Safe alternative: {}", alt);
                }
            }
        }
    }

    if !assessment.blockers.is_empty() {
        let _ = writeln!(out, "\nBlockers:");
        for blocker in &assessment.blockers {
            let _ = writeln!(out, "- {}", blocker);
        }
    }

    if !assessment.warnings.is_empty() {
        let _ = writeln!(out, "\nWarnings:");
        for warning in &assessment.warnings {
            match &warning.protocol {
                Some(protocol) => {
                    let _ = writeln!(out, "- [{:?}] {} ({})", warning.level, warning.message, protocol);
                }
                None => {
                    let _ = writeln!(out, "- [{:?}] {}", warning.level, warning.message);
                }
            }
        }
    }

    if !assessment.recommendations.is_empty() {
        let _ = writeln!(out, "\nRecommendations:");
        for rec in &assessment.recommendations {
            let _ = writeln!(out, "- {}", rec);
        }
    }

    out.trim_end().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use suitegate_knowledge::KnowledgeBase;

    fn executor() -> OperationExecutor {
        OperationExecutor::new(Arc::new(KnowledgeBase::with_builtin()))
    }

    fn args(mode: &str, method: &str, endpoint: &str) -> Value {
        json!({
            "mode": mode,
            "method": method,
            "endpoint": endpoint,
            "operation_description": "test operation"
        })
    }

    #[test]
    fn test_input_validation() {
        let missing = OperationInput::from_arguments(json!({"mode": "learn"}));
        assert!(matches!(missing, Err(IntelligentError::MissingField("endpoint"))));

        let bad_mode = OperationInput::from_arguments(args("explode", "GET", "/x"));
        assert!(matches!(bad_mode, Err(IntelligentError::InvalidMode(_))));

        let bad_method = OperationInput::from_arguments(args("learn", "FETCH", "/x"));
        assert!(matches!(bad_method, Err(IntelligentError::InvalidMethod(_))));

        let mut no_description = args("learn", "GET", "/x");
        no_description["operation_description"] = json!("  ");
        assert!(matches!(
            OperationInput::from_arguments(no_description),
            Err(IntelligentError::MissingField("operation_description"))
        ));

        let ok = OperationInput::from_arguments(args("dry_run", "post", "/x")).unwrap();
        assert_eq!(ok.method, HttpMethod::Post);
        assert_eq!(ok.mode, OperationMode::DryRun);
        assert!(!ok.confirmed);
    }

    #[test]
    fn test_failure_classification() {
        let api = |status| ClientError::Api {
            status,
            message: "x".into(),
        };
        assert_eq!(FailureCategory::classify(&api(404)), FailureCategory::EndpointNotFound);
        assert_eq!(FailureCategory::classify(&api(403)), FailureCategory::AuthenticationError);
        assert_eq!(FailureCategory::classify(&api(400)), FailureCategory::InvalidPayload);
        assert_eq!(FailureCategory::classify(&api(500)), FailureCategory::ServerError);
        assert_eq!(FailureCategory::classify(&api(418)), FailureCategory::UnknownError);
        assert_eq!(
            FailureCategory::classify(&ClientError::Timeout(DEFAULT_TIMEOUT)),
            FailureCategory::NetworkError
        );
    }

    #[tokio::test]
    async fn test_learn_suggests_method_correction() {
        let result = executor()
            .run_arguments(args("learn", "GET", "/applications/{id}/records"))
            .await
            .unwrap();

        assert!(result.success);
        assert_eq!(result.analysis.safety_level, SafetyLevel::Red);
        assert!(result.analysis.knowledge_version.is_some());
        let guidance = result.guidance.unwrap();
        assert!(guidance.contains("records-list-requires-post"));

        let suggestion = result.suggested_correction.unwrap();
        assert_eq!(suggestion.kind, CorrectionKind::MethodCorrection);
        assert_eq!(suggestion.method, Some(HttpMethod::Post));
        assert_eq!(suggestion.endpoint.as_deref(), Some("/applications/{id}/records/list/"));
    }

    #[tokio::test]
    async fn test_learn_suggests_choices() {
        let mut arguments = args("learn", "POST", "/applications/a1/change_field/");
        arguments["payload"] = json!({"field_type": "singleselectfield", "options": [{"label": "Open"}]});
        let result = executor().run_arguments(arguments).await.unwrap();

        let suggestion = result.suggested_correction.unwrap();
        assert_eq!(suggestion.kind, CorrectionKind::UuidProtection);
        let payload = suggestion.payload.unwrap();
        assert!(payload.get("options").is_none());
        assert_eq!(payload["choices"][0]["label"], "Open");
    }

    #[tokio::test]
    async fn test_learn_suggests_batches() {
        let items: Vec<Value> = (0..60).map(|i| json!({"id": i})).collect();
        let mut arguments = args("learn", "PATCH", "/applications/a1/records/bulk/");
        arguments["payload"] = json!({"items": items});
        let result = executor().run_arguments(arguments).await.unwrap();

        let suggestion = result.suggested_correction.unwrap();
        assert_eq!(suggestion.kind, CorrectionKind::BulkBatching);
        assert_eq!(suggestion.batches, Some(3));

        let guidance = result.guidance.unwrap();
        assert!(guidance.contains("\nWarnings:\n"));
        assert!(guidance.contains(
            "- [Warning] Bulk batch exceeds the recommended size (got 60, limit 25) (bulk_batch_size)"
        ));
        assert!(guidance.contains("\nRecommendations:\n"));
    }

    #[tokio::test]
    async fn test_learn_batches_nested_bulk_payload() {
        let records: Vec<Value> = (0..60).map(|i| json!({"id": i})).collect();
        let mut arguments = args("learn", "PATCH", "/applications/a1/records/bulk/");
        arguments["payload"] = json!({"params": {"records": records}});
        let result = executor().run_arguments(arguments).await.unwrap();

        assert_eq!(result.analysis.safety_level, SafetyLevel::Red);
        let suggestion = result.suggested_correction.unwrap();
        assert_eq!(suggestion.batches, Some(3));
        assert!(suggestion.description.contains("split into 3 batches of at most 25"));
    }

    #[tokio::test]
    async fn test_learn_suggests_choices_for_nested_options() {
        let mut arguments = args("learn", "POST", "/applications/a1/change_field/");
        arguments["payload"] = json!({
            "field": {"field_type": "statusfield", "options": [{"label": "Done"}]}
        });
        let result = executor().run_arguments(arguments).await.unwrap();

        let payload = result.suggested_correction.unwrap().payload.unwrap();
        assert!(payload["field"].get("options").is_none());
        assert_eq!(payload["field"]["choices"][0]["label"], "Done");
    }

    #[tokio::test]
    async fn test_dry_run_without_client_reports_connectivity() {
        let mut arguments = args("dry_run", "GET", "/applications/{id}/records");
        arguments["tableId"] = json!("t1");
        let result = executor().run_arguments(arguments).await.unwrap();

        assert!(result.success);
        assert_eq!(result.connectivity_valid, Some(false));
        assert_eq!(result.would_execute, Some(false));
        assert_eq!(result.final_method, Some(HttpMethod::Post));
        assert_eq!(result.final_endpoint.as_deref(), Some("/applications/t1/records/list/"));
        assert!(!result.analysis.corrections_applied.is_empty());
    }

    #[tokio::test]
    async fn test_execute_without_client_is_an_error() {
        let err = executor()
            .run_arguments(args("execute", "GET", "/applications/"))
            .await
            .unwrap_err();
        assert!(matches!(err, IntelligentError::ClientNotConfigured));
    }

    #[test]
    fn test_result_serialization_keys() {
        let assessment = SafetyClassifier::default().assess(
            &OperationView {
                method: HttpMethod::Get,
                endpoint: "/applications/",
                payload: None,
                confirmed: false,
            },
            &[],
        );
        let mut result = OperationResult::new(
            OperationMode::Learn,
            Analysis::new(&assessment, None),
            &assessment,
        );
        result.suggested_correction = Some(SuggestedCorrection {
            kind: CorrectionKind::BulkBatching,
            description: "x".into(),
            method: None,
            endpoint: None,
            payload: None,
            batches: Some(2),
        });

        let value = serde_json::to_value(&result).unwrap();
        assert_eq!(value["mode"], "learn");
        assert_eq!(value["analysis"]["safetyLevel"], "GREEN");
        assert!(value["analysis"]["requiresConfirmation"].is_boolean());
        assert_eq!(value["suggested_correction"]["kind"], "bulk_batching");
    }
}

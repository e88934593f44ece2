//! End-to-end behaviour of the intelligent operation modes against a
//! call-counting client.

use async_trait::async_trait;
use serde_json::{Value, json};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use suitegate_core::HttpMethod;
use suitegate_knowledge::{
    KnowledgeBase, KnowledgeError, KnowledgeMatch, KnowledgeProvider, KnowledgeVersion,
    LearningResult, ObservedOperation, OperationOutcome,
};
use suitegate_mcp::{
    ApiRequest, ClientError, FailureCategory, OperationExecutor, SuiteClient,
};

#[derive(Default)]
struct CountingClient {
    calls: Mutex<Vec<ApiRequest>>,
    fail_with: Option<u16>,
    delay: Option<Duration>,
}

impl CountingClient {
    fn failing(status: u16) -> Self {
        Self {
            fail_with: Some(status),
            ..Default::default()
        }
    }

    fn hanging(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Default::default()
        }
    }

    fn calls(&self) -> Vec<ApiRequest> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl SuiteClient for CountingClient {
    async fn request(&self, request: ApiRequest) -> Result<Value, ClientError> {
        self.calls.lock().unwrap().push(request);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        match self.fail_with {
            Some(status) => Err(ClientError::Api {
                status,
                message: "rejected".to_string(),
            }),
            None => Ok(json!({"items": [], "total": 0})),
        }
    }
}

/// Knowledge base that remembers every outcome passed to the learning hook.
struct RecordingKnowledge {
    inner: KnowledgeBase,
    outcomes: Mutex<Vec<OperationOutcome>>,
}

impl KnowledgeProvider for RecordingKnowledge {
    fn find_relevant_knowledge(
        &self,
        method: HttpMethod,
        endpoint: &str,
        payload: Option<&Value>,
    ) -> Result<Vec<KnowledgeMatch>, KnowledgeError> {
        self.inner.find_relevant_knowledge(method, endpoint, payload)
    }

    fn learn_from_operation(
        &self,
        operation: &ObservedOperation,
        outcome: &OperationOutcome,
    ) -> Result<LearningResult, KnowledgeError> {
        self.outcomes.lock().unwrap().push(outcome.clone());
        self.inner.learn_from_operation(operation, outcome)
    }

    fn version(&self) -> Result<KnowledgeVersion, KnowledgeError> {
        self.inner.version()
    }
}

fn setup(client: CountingClient) -> (Arc<CountingClient>, Arc<KnowledgeBase>, OperationExecutor) {
    let client = Arc::new(client);
    let knowledge = Arc::new(KnowledgeBase::with_builtin());
    let executor = OperationExecutor::new(knowledge.clone()).with_client(client.clone());
    (client, knowledge, executor)
}

fn list_via_get(mode: &str) -> Value {
    json!({
        "mode": mode,
        "method": "GET",
        "endpoint": "/applications/{id}/records",
        "tableId": "t1",
        "operation_description": "List all records"
    })
}

#[tokio::test]
async fn learn_makes_no_network_calls() {
    let (client, _, executor) = setup(CountingClient::default());

    let result = executor.run_arguments(list_via_get("learn")).await.unwrap();

    assert!(result.success);
    assert!(result.guidance.is_some());
    assert!(client.calls().is_empty());
}

#[tokio::test]
async fn dry_run_makes_one_read_only_check() {
    let (client, _, executor) = setup(CountingClient::default());

    let result = executor.run_arguments(list_via_get("dry_run")).await.unwrap();

    assert_eq!(result.connectivity_valid, Some(true));
    assert_eq!(result.would_execute, Some(false));
    let calls = client.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].method, HttpMethod::Get);
    assert_eq!(calls[0].endpoint, "/solutions/");
}

#[tokio::test]
async fn dry_run_connectivity_failure_is_not_an_error() {
    let (client, _, executor) = setup(CountingClient::failing(401));

    let result = executor.run_arguments(list_via_get("dry_run")).await.unwrap();

    assert!(result.success);
    assert_eq!(result.connectivity_valid, Some(false));
    assert_eq!(client.calls().len(), 1);
}

#[tokio::test]
async fn execute_red_without_confirmation_is_blocked() {
    let (client, _, executor) = setup(CountingClient::default());

    let result = executor.run_arguments(list_via_get("execute")).await.unwrap();

    assert!(!result.success);
    assert!(result.error.as_deref().unwrap().contains("confirmation"));
    assert!(result.analysis.requires_confirmation);
    assert!(client.calls().is_empty());

    let value = serde_json::to_value(&result).unwrap();
    assert_eq!(value["analysis"]["requiresConfirmation"], true);
}

#[tokio::test]
async fn execute_confirmed_sends_corrected_request() {
    let (client, knowledge, executor) = setup(CountingClient::default());
    let before = knowledge.version().unwrap().version;

    let mut arguments = list_via_get("execute");
    arguments["confirmed"] = json!(true);
    let result = executor.run_arguments(arguments).await.unwrap();

    assert!(result.success, "{:?}", result.error);
    let calls = client.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].method, HttpMethod::Post);
    assert_eq!(calls[0].endpoint, "/applications/t1/records/list/");
    assert!(!result.analysis.corrections_applied.is_empty());

    // The success was folded back into the corpus.
    assert!(knowledge.version().unwrap().version > before);
}

#[tokio::test]
async fn execute_failure_is_classified() {
    let (client, _, executor) = setup(CountingClient::failing(404));

    let result = executor
        .run_arguments(json!({
            "mode": "execute",
            "method": "GET",
            "endpoint": "/applications/t1/",
            "operation_description": "Read application"
        }))
        .await
        .unwrap();

    assert!(!result.success);
    assert_eq!(result.failure_mode, Some(FailureCategory::EndpointNotFound));
    assert_eq!(client.calls().len(), 1);
}

#[tokio::test]
async fn invalid_input_fails_before_any_call() {
    let (client, _, executor) = setup(CountingClient::default());

    let err = executor
        .run_arguments(json!({"mode": "execute", "method": "GET"}))
        .await
        .unwrap_err();

    assert!(err.to_string().contains("endpoint"));
    assert!(client.calls().is_empty());
}

#[tokio::test]
async fn execute_timeout_is_a_network_failure() {
    let client = Arc::new(CountingClient::hanging(Duration::from_millis(500)));
    let knowledge = Arc::new(RecordingKnowledge {
        inner: KnowledgeBase::with_builtin(),
        outcomes: Mutex::default(),
    });
    let executor = OperationExecutor::new(knowledge.clone())
        .with_client(client.clone())
        .with_timeout(Duration::from_millis(50));

    let result = executor
        .run_arguments(json!({
            "mode": "execute",
            "method": "GET",
            "endpoint": "/applications/t1/",
            "operation_description": "Read application"
        }))
        .await
        .unwrap();

    assert!(!result.success);
    assert_eq!(result.failure_mode, Some(FailureCategory::NetworkError));
    assert!(result.error.as_deref().unwrap().contains("timed out"));
    assert_eq!(client.calls().len(), 1);

    let outcomes = knowledge.outcomes.lock().unwrap();
    assert_eq!(outcomes.len(), 1);
    match &outcomes[0] {
        OperationOutcome::Failure { error, .. } => assert!(error.contains("timed out")),
        OperationOutcome::Success => panic!("timeout recorded as success"),
    }
}

#[tokio::test]
async fn dry_run_connectivity_timeout_reports_failure() {
    let client = Arc::new(CountingClient::hanging(Duration::from_millis(500)));
    let executor = OperationExecutor::new(Arc::new(KnowledgeBase::with_builtin()))
        .with_client(client.clone())
        .with_timeout(Duration::from_millis(50));

    let result = executor.run_arguments(list_via_get("dry_run")).await.unwrap();

    assert!(result.success);
    assert_eq!(result.connectivity_valid, Some(false));
    assert!(result.connectivity_error.as_deref().unwrap().contains("timed out"));
    assert_eq!(client.calls().len(), 1);
}

#[tokio::test]
async fn execute_trailing_slash_listing_is_corrected() {
    let (client, _, executor) = setup(CountingClient::default());

    let mut arguments = list_via_get("execute");
    arguments["endpoint"] = json!("/applications/{id}/records/");
    arguments["confirmed"] = json!(true);
    let result = executor.run_arguments(arguments).await.unwrap();

    assert!(result.success, "{:?}", result.error);
    let calls = client.calls();
    assert_eq!(calls[0].method, HttpMethod::Post);
    assert_eq!(calls[0].endpoint, "/applications/t1/records/list/");
}

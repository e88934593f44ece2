//! Tool execution engine.
//!
//! This module maps MCP tool calls onto SmartSuite operations:
//! - Argument validation against the tool's input schema
//! - Table and field name resolution through the field mappings
//! - Safety classification and dry runs for record mutations
//! - Audit logging of executed, failed, previewed and blocked mutations

use crate::catalog::{
    DISCOVER_TOOL, INTELLIGENT_TOOL, QUERY_TOOL, RECORD_TOOL, SCHEMA_TOOL, default_registry,
};
use crate::client::{ApiRequest, ClientError, SuiteClient, record_endpoint, records_endpoint};
use crate::intelligent::OperationExecutor;
use crate::mappings::TableResolver;
use crate::protocol::{ToolContent, ToolDefinition};
use crate::tools::ToolRegistry;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;
use suitegate_audit::{AuditEvent, AuditEventType, AuditLogger, MutationKind};
use suitegate_core::HttpMethod;
use suitegate_knowledge::{OperationView, SafetyAssessment, generate_warnings};

/// Default page size for record queries.
pub const DEFAULT_QUERY_LIMIT: u64 = 200;

/// Largest page size a query may request.
pub const MAX_QUERY_LIMIT: u64 = 1000;

/// Result of a tool execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionResult {
    /// Whether the execution was successful.
    pub success: bool,
    /// The result content.
    pub content: Vec<ToolContent>,
    /// Whether this was a dry-run.
    #[serde(rename = "isDryRun")]
    pub is_dry_run: bool,
    /// Error message if failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ExecutionResult {
    /// Create a successful result with JSON content.
    pub fn success_json(value: Value) -> Self {
        Self {
            success: true,
            content: vec![ToolContent::Json { json: value }],
            is_dry_run: false,
            error: None,
        }
    }

    /// Create a successful dry-run result.
    pub fn dry_run(preview: Value) -> Self {
        Self {
            is_dry_run: true,
            ..Self::success_json(preview)
        }
    }

    /// Create an error result.
    pub fn error(message: impl Into<String>) -> Self {
        let msg = message.into();
        Self {
            success: false,
            content: vec![ToolContent::Text { text: msg.clone() }],
            is_dry_run: false,
            error: Some(msg),
        }
    }

    /// Create an error result that carries structured detail.
    pub fn failure_json(message: impl Into<String>, detail: Value) -> Self {
        Self {
            success: false,
            content: vec![ToolContent::Json { json: detail }],
            is_dry_run: false,
            error: Some(message.into()),
        }
    }
}

/// Runs tool calls against SmartSuite.
pub struct ToolExecutor {
    operations: Arc<OperationExecutor>,
    tools: ToolRegistry,
    tables: TableResolver,
    audit: Arc<AuditLogger>,
}

impl ToolExecutor {
    pub fn new(operations: Arc<OperationExecutor>) -> Self {
        Self {
            operations,
            tools: default_registry(),
            tables: TableResolver::default(),
            audit: Arc::new(AuditLogger::disabled()),
        }
    }

    pub fn with_tables(mut self, tables: TableResolver) -> Self {
        self.tables = tables;
        self
    }

    pub fn with_audit(mut self, audit: Arc<AuditLogger>) -> Self {
        self.audit = audit;
        self
    }

    pub fn operations(&self) -> &OperationExecutor {
        &self.operations
    }

    /// Execute a tool call.
    pub async fn execute(&self, tool: &ToolDefinition, arguments: Value) -> ExecutionResult {
        if let Err(e) = self.tools.validate(&tool.name, &arguments) {
            return ExecutionResult::error(e);
        }

        match tool.name.as_str() {
            QUERY_TOOL => self.execute_query(&arguments).await,
            RECORD_TOOL => self.execute_record(&arguments).await,
            SCHEMA_TOOL => self.execute_schema(&arguments).await,
            DISCOVER_TOOL => self.execute_discover(&arguments).await,
            INTELLIGENT_TOOL => self.execute_intelligent(arguments).await,
            other => ExecutionResult::error(format!("Unknown tool: {}", other)),
        }
    }

    fn client(&self) -> Result<&Arc<dyn SuiteClient>, ExecutionResult> {
        self.operations
            .client()
            .ok_or_else(|| ExecutionResult::error("SmartSuite client not configured"))
    }

    /// Run a client call under the configured timeout.
    async fn call<F>(&self, request: F) -> Result<Value, ClientError>
    where
        F: Future<Output = Result<Value, ClientError>>,
    {
        let timeout = self.operations.timeout();
        match tokio::time::timeout(timeout, request).await {
            Ok(result) => result,
            Err(_) => Err(ClientError::Timeout(timeout)),
        }
    }

    /// Execute `smartsuite_query`.
    async fn execute_query(&self, arguments: &Value) -> ExecutionResult {
        let client = match self.client() {
            Ok(c) => c,
            Err(e) => return e,
        };
        let operation = str_arg(arguments, "operation").unwrap_or_default();
        let table = str_arg(arguments, "tableId").unwrap_or_default();
        let table_id = self.tables.table_id(table);
        let translator = self.tables.translator(table);

        if operation == "get" {
            let Some(record_id) = str_arg(arguments, "recordId") else {
                return ExecutionResult::error("Missing required field: recordId");
            };
            return match self.call(client.get_record(&table_id, record_id)).await {
                Ok(record) => ExecutionResult::success_json(translator.to_human(&record)),
                Err(e) => ExecutionResult::error(format!("SmartSuite error: {}", e)),
            };
        }

        let filters = arguments.get("filters").filter(|f| !f.is_null());
        if operation == "search" && filters.is_none() {
            return ExecutionResult::error("search requires filters");
        }

        let body = json!({
            "filter": filters.map(|f| translator.translate_field_refs(f)).unwrap_or_else(|| json!({})),
            "sort": arguments
                .get("sort")
                .filter(|s| !s.is_null())
                .map(|s| translator.translate_field_refs(s))
                .unwrap_or_else(|| json!([])),
        });
        let limit = arguments
            .get("limit")
            .and_then(Value::as_u64)
            .unwrap_or(DEFAULT_QUERY_LIMIT)
            .clamp(1, MAX_QUERY_LIMIT) as usize;
        let offset = arguments.get("offset").and_then(Value::as_u64).unwrap_or(0) as usize;

        tracing::info!(table = %table_id, operation, limit, offset, "Querying records");

        let response = match self
            .call(client.list_records(&table_id, body, limit, offset))
            .await
        {
            Ok(r) => r,
            Err(e) => return ExecutionResult::error(format!("SmartSuite error: {}", e)),
        };

        if operation == "count" {
            let returned = response
                .get("items")
                .and_then(Value::as_array)
                .map(Vec::len)
                .unwrap_or(0);
            let total = response
                .get("total")
                .and_then(Value::as_u64)
                .unwrap_or(returned as u64);
            return ExecutionResult::success_json(json!({ "tableId": table_id, "count": total }));
        }

        ExecutionResult::success_json(translator.response_to_human(&response))
    }

    /// Execute `smartsuite_record`.
    async fn execute_record(&self, arguments: &Value) -> ExecutionResult {
        let kind: MutationKind = match str_arg(arguments, "operation").unwrap_or_default().parse() {
            Ok(k) => k,
            Err(e) => return ExecutionResult::error(e),
        };
        let table = str_arg(arguments, "tableId").unwrap_or_default();
        let table_id = self.tables.table_id(table);
        let translator = self.tables.translator(table);
        let data = arguments
            .get("data")
            .filter(|d| !d.is_null())
            .map(|d| translator.to_api(d));

        let plan = match MutationPlan::build(kind, &table_id, str_arg(arguments, "recordId"), data) {
            Ok(p) => p,
            Err(e) => return ExecutionResult::error(e),
        };

        let dry_run = arguments.get("dry_run").and_then(Value::as_bool).unwrap_or(true);
        let confirmed = arguments.get("confirmed").and_then(Value::as_bool).unwrap_or(false);

        let view = OperationView {
            method: plan.request.method,
            endpoint: &plan.request.endpoint,
            payload: plan.request.data.as_ref(),
            confirmed,
        };
        let assessment = self.operations.classify(&view).assessment;

        if dry_run {
            self.audit_event(
                plan.event(AuditEventType::MutationPreviewed, &assessment)
                    .dry_run(true)
                    .build(),
            )
            .await;
            return ExecutionResult::dry_run(json!({
                "dryRun": true,
                "operation": kind,
                "tableId": table_id,
                "request": plan.request,
                "wouldExecute": assessment.allows_execution(confirmed),
                "summary": generate_warnings(&assessment),
                "safety": assessment,
            }));
        }

        if !assessment.allows_execution(confirmed) {
            let reason = assessment.blockers.join("; ");
            if let Err(e) = self
                .audit
                .log_blocked(kind, &table_id, plan.record_ids.clone(), &reason)
                .await
            {
                tracing::warn!(error = %e, "Failed to write audit event");
            }
            return ExecutionResult::failure_json(
                "Operation requires confirmation",
                json!({
                    "success": false,
                    "error": "RED level operation requires confirmation: retry with confirmed=true",
                    "requiresConfirmation": true,
                    "safety": assessment,
                }),
            );
        }

        let client = match self.client() {
            Ok(c) => c,
            Err(e) => return e,
        };

        let prior_state = match (&plan.kind, plan.record_ids.first()) {
            (MutationKind::Update | MutationKind::Delete, Some(record_id)) => {
                match self.call(client.get_record(&table_id, record_id)).await {
                    Ok(state) => Some(state),
                    Err(e) => {
                        tracing::warn!(error = %e, record = %record_id, "Could not read prior state");
                        None
                    }
                }
            }
            _ => None,
        };

        let started = Instant::now();
        let response = self.call(client.request(plan.request.clone())).await;
        let duration_ms = started.elapsed().as_millis() as u64;

        match response {
            Ok(result) => {
                let mut record_ids = plan.record_ids.clone();
                if let Some(id) = result.get("id").and_then(Value::as_str) {
                    if !record_ids.iter().any(|r| r == id) {
                        record_ids.push(id.to_string());
                    }
                }

                let mut builder = plan
                    .event(AuditEventType::MutationExecuted, &assessment)
                    .record_ids(record_ids)
                    .result(result.clone())
                    .duration_ms(duration_ms);
                if let Some(state) = prior_state {
                    builder = builder.prior_state(state);
                }
                let event = builder.compute_diff().derive_reversal().build();
                let audit_id = event.event_id;
                let reversal = event.reversal.clone();
                self.audit_event(event).await;

                tracing::info!(operation = %kind, table = %table_id, duration_ms, "Record mutation executed");
                ExecutionResult::success_json(json!({
                    "success": true,
                    "operation": kind,
                    "tableId": table_id,
                    "result": translator.response_to_human(&result),
                    "auditId": audit_id,
                    "reversal": reversal,
                }))
            }
            Err(e) => {
                tracing::warn!(error = %e, operation = %kind, table = %table_id, "Record mutation failed");
                if let Err(audit_err) = self
                    .audit
                    .log_mutation_failed(kind, &table_id, plan.record_ids.clone(), &e.to_string())
                    .await
                {
                    tracing::warn!(error = %audit_err, "Failed to write audit event");
                }
                ExecutionResult::error(format!("SmartSuite error: {}", e))
            }
        }
    }

    async fn audit_event(&self, event: AuditEvent) {
        if let Err(e) = self.audit.log_mutation(event).await {
            tracing::warn!(error = %e, "Failed to write audit event");
        }
    }

    /// Execute `smartsuite_schema`.
    async fn execute_schema(&self, arguments: &Value) -> ExecutionResult {
        let client = match self.client() {
            Ok(c) => c,
            Err(e) => return e,
        };
        let table_id = self.tables.table_id(str_arg(arguments, "tableId").unwrap_or_default());
        let mode = str_arg(arguments, "output_mode").unwrap_or("summary");

        let schema = match self.call(client.get_schema(&table_id)).await {
            Ok(s) => s,
            Err(e) => return ExecutionResult::error(format!("SmartSuite error: {}", e)),
        };

        match mode {
            "full" => ExecutionResult::success_json(schema),
            "fields" => ExecutionResult::success_json(json!({
                "id": schema.get("id"),
                "name": schema.get("name"),
                "fields": schema_fields(&schema),
            })),
            _ => {
                let labels: Vec<&str> = structure(&schema)
                    .iter()
                    .filter_map(|f| f.get("label").and_then(Value::as_str))
                    .collect();
                ExecutionResult::success_json(json!({
                    "id": schema.get("id"),
                    "name": schema.get("name"),
                    "fieldCount": labels.len(),
                    "fields": labels,
                }))
            }
        }
    }

    /// Execute `smartsuite_discover`.
    async fn execute_discover(&self, arguments: &Value) -> ExecutionResult {
        match str_arg(arguments, "scope").unwrap_or("tables") {
            "fields" => self.discover_fields(arguments).await,
            _ => self.discover_tables().await,
        }
    }

    async fn discover_tables(&self) -> ExecutionResult {
        let mut tables: Vec<Value> = self
            .tables
            .tables()
            .iter()
            .map(|t| {
                json!({
                    "name": t.table_name,
                    "id": t.table_id,
                    "fieldCount": t.fields.len(),
                    "source": "mapping",
                })
            })
            .collect();

        let mut api_error = None;
        if let Some(client) = self.operations.client() {
            match self.call(client.list_applications()).await {
                Ok(apps) => {
                    for app in items(&apps) {
                        let Some(id) = app.get("id").and_then(Value::as_str) else {
                            continue;
                        };
                        if self.tables.resolve(id).is_some() {
                            continue;
                        }
                        tables.push(json!({
                            "name": app.get("name"),
                            "id": id,
                            "source": "api",
                        }));
                    }
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Could not list applications");
                    api_error = Some(e.to_string());
                }
            }
        }

        let mut response = json!({ "tables": tables });
        if let Some(e) = api_error {
            response["apiError"] = json!(e);
        }
        ExecutionResult::success_json(response)
    }

    async fn discover_fields(&self, arguments: &Value) -> ExecutionResult {
        let Some(table) = str_arg(arguments, "tableId") else {
            return ExecutionResult::error("Missing required field: tableId");
        };

        if let Some(mapping) = self.tables.resolve(table) {
            let fields: Vec<Value> = mapping
                .fields
                .iter()
                .map(|(name, code)| json!({ "name": name, "code": code }))
                .collect();
            return ExecutionResult::success_json(json!({
                "table": mapping.table_name,
                "id": mapping.table_id,
                "source": "mapping",
                "fields": fields,
            }));
        }

        let Some(client) = self.operations.client() else {
            return ExecutionResult::error(format!(
                "No field mapping for table '{}' and SmartSuite client not configured",
                table
            ));
        };
        match self.call(client.get_schema(table)).await {
            Ok(schema) => {
                let fields: Vec<Value> = structure(&schema)
                    .iter()
                    .map(|f| json!({ "name": f.get("label"), "code": f.get("slug") }))
                    .collect();
                ExecutionResult::success_json(json!({
                    "table": schema.get("name"),
                    "id": table,
                    "source": "api",
                    "fields": fields,
                }))
            }
            Err(e) => ExecutionResult::error(format!("SmartSuite error: {}", e)),
        }
    }

    /// Execute `smartsuite_intelligent`.
    async fn execute_intelligent(&self, arguments: Value) -> ExecutionResult {
        match self.operations.run_arguments(arguments).await {
            Ok(result) => {
                let success = result.success;
                let error = result.error.clone();
                match serde_json::to_value(&result) {
                    Ok(value) if success => ExecutionResult::success_json(value),
                    Ok(value) => ExecutionResult::failure_json(
                        error.unwrap_or_else(|| "Operation failed".to_string()),
                        value,
                    ),
                    Err(e) => ExecutionResult::error(format!("Failed to serialize result: {}", e)),
                }
            }
            Err(e) => ExecutionResult::error(e.to_string()),
        }
    }
}

/// The API call behind a record mutation.
#[derive(Debug, Clone)]
struct MutationPlan {
    kind: MutationKind,
    table_id: String,
    record_ids: Vec<String>,
    request: ApiRequest,
}

impl MutationPlan {
    fn build(
        kind: MutationKind,
        table_id: &str,
        record_id: Option<&str>,
        data: Option<Value>,
    ) -> Result<Self, String> {
        let require_id = || record_id.ok_or_else(|| format!("{} requires recordId", kind));
        let require_object = |data: Option<Value>| match data {
            Some(d) if d.is_object() => Ok(d),
            _ => Err(format!("{} requires data as an object of fields", kind)),
        };
        let require_array = |data: Option<Value>| match data {
            Some(Value::Array(items)) if !items.is_empty() => Ok(items),
            _ => Err(format!("{} requires data as a non-empty array", kind)),
        };

        let (record_ids, request) = match kind {
            MutationKind::Create => (
                vec![],
                ApiRequest::new(HttpMethod::Post, records_endpoint(table_id), Some(require_object(data)?)),
            ),
            MutationKind::Update => {
                let id = require_id()?;
                (
                    vec![id.to_string()],
                    ApiRequest::new(
                        HttpMethod::Patch,
                        record_endpoint(table_id, id),
                        Some(require_object(data)?),
                    ),
                )
            }
            MutationKind::Delete => {
                let id = require_id()?;
                (
                    vec![id.to_string()],
                    ApiRequest::new(HttpMethod::Delete, record_endpoint(table_id, id), None),
                )
            }
            MutationKind::BulkUpdate => {
                let items = require_array(data)?;
                let ids = items
                    .iter()
                    .map(|item| {
                        item.get("id")
                            .and_then(Value::as_str)
                            .map(str::to_string)
                            .ok_or_else(|| "bulk_update items must each carry an \"id\"".to_string())
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                (
                    ids,
                    ApiRequest::new(
                        HttpMethod::Patch,
                        format!("/applications/{}/records/bulk/", table_id),
                        Some(json!({ "items": items })),
                    ),
                )
            }
            MutationKind::BulkDelete => {
                let items = require_array(data)?;
                let ids = items
                    .iter()
                    .map(|item| {
                        item.as_str()
                            .map(str::to_string)
                            .ok_or_else(|| "bulk_delete data must be an array of record ids".to_string())
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                (
                    ids.clone(),
                    ApiRequest::new(
                        HttpMethod::Patch,
                        format!("/applications/{}/records/bulk_delete/", table_id),
                        Some(json!({ "items": ids })),
                    ),
                )
            }
        };

        Ok(Self {
            kind,
            table_id: table_id.to_string(),
            record_ids,
            request,
        })
    }

    fn event(
        &self,
        event_type: AuditEventType,
        assessment: &SafetyAssessment,
    ) -> suitegate_audit::AuditEventBuilder {
        let mut builder = AuditEvent::builder(event_type, self.kind, &self.table_id)
            .record_ids(self.record_ids.clone())
            .safety_level(assessment.level.to_string());
        if let Some(data) = &self.request.data {
            builder = builder.payload(data.clone());
        }
        builder
    }
}

fn str_arg<'a>(arguments: &'a Value, key: &str) -> Option<&'a str> {
    arguments.get(key).and_then(Value::as_str).filter(|s| !s.is_empty())
}

/// Elements of a bare array or of an `items` array.
fn items(value: &Value) -> &[Value] {
    value
        .as_array()
        .or_else(|| value.get("items").and_then(Value::as_array))
        .map(Vec::as_slice)
        .unwrap_or(&[])
}

fn structure(schema: &Value) -> &[Value] {
    schema
        .get("structure")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or(&[])
}

fn schema_fields(schema: &Value) -> Vec<Value> {
    structure(schema)
        .iter()
        .map(|f| {
            json!({
                "slug": f.get("slug"),
                "label": f.get("label"),
                "type": f.get("field_type"),
                "required": f
                    .pointer("/params/required")
                    .and_then(Value::as_bool)
                    .unwrap_or(false),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog;
    use crate::mappings::TableMapping;
    use async_trait::async_trait;
    use std::collections::BTreeMap;
    use std::sync::Mutex;
    use suitegate_knowledge::KnowledgeBase;

    #[derive(Default)]
    struct ScriptedClient {
        seen: Mutex<Vec<ApiRequest>>,
    }

    #[async_trait]
    impl SuiteClient for ScriptedClient {
        async fn request(&self, request: ApiRequest) -> Result<Value, ClientError> {
            let response = match (request.method, request.endpoint.as_str()) {
                (HttpMethod::Get, "/applications/") => json!([
                    {"id": "app_projects", "name": "Projects"},
                    {"id": "app_people", "name": "People"}
                ]),
                (HttpMethod::Get, e) if e.ends_with("/records/r1/") => {
                    json!({"id": "r1", "title": "Old", "s1a2b3": "Open"})
                }
                (HttpMethod::Get, _) => json!({
                    "id": "app_projects",
                    "name": "Projects",
                    "structure": [
                        {"slug": "title", "label": "Title", "field_type": "textfield", "params": {"required": true}},
                        {"slug": "s1a2b3", "label": "Status", "field_type": "statusfield", "params": {}}
                    ]
                }),
                (HttpMethod::Post, e) if e.contains("/records/list/") => json!({
                    "items": [{"id": "r1", "s1a2b3": "Open"}],
                    "total": 42
                }),
                (HttpMethod::Post, _) => json!({"id": "new1"}),
                _ => json!({"ok": true}),
            };
            self.seen.lock().unwrap().push(request);
            Ok(response)
        }
    }

    fn projects() -> TableMapping {
        TableMapping {
            table_name: "Projects".into(),
            table_id: "app_projects".into(),
            fields: BTreeMap::from([
                ("Title".to_string(), "title".to_string()),
                ("Status".to_string(), "s1a2b3".to_string()),
            ]),
        }
    }

    fn executor(client: Arc<ScriptedClient>) -> ToolExecutor {
        let operations = OperationExecutor::new(Arc::new(KnowledgeBase::with_builtin()))
            .with_client(client);
        ToolExecutor::new(Arc::new(operations))
            .with_tables(TableResolver::new(vec![projects()]).unwrap())
    }

    fn tool(name: &str) -> ToolDefinition {
        catalog::default_registry().get(name).cloned().unwrap()
    }

    fn json_content(result: &ExecutionResult) -> &Value {
        match &result.content[0] {
            ToolContent::Json { json } => json,
            ToolContent::Text { text } => panic!("expected json content, got {}", text),
        }
    }

    #[tokio::test]
    async fn test_arguments_checked_against_schema() {
        let client = Arc::new(ScriptedClient::default());
        let executor = executor(client.clone());
        let query = tool(QUERY_TOOL);

        let missing = executor.execute(&query, json!({"operation": "list"})).await;
        assert!(missing.error.unwrap().contains("tableId"));

        let bad_enum = executor
            .execute(&query, json!({"operation": "drop", "tableId": "t"}))
            .await;
        assert!(bad_enum.error.unwrap().contains("/operation"));

        let too_many = executor
            .execute(&query, json!({"operation": "list", "tableId": "t", "limit": 5000}))
            .await;
        assert!(too_many.error.unwrap().contains("/limit"));

        let bad_sort = executor
            .execute(
                &query,
                json!({"operation": "list", "tableId": "t", "sort": [{"field": "x", "direction": "sideways"}]}),
            )
            .await;
        assert!(!bad_sort.success);
        assert!(bad_sort.error.unwrap().contains("/sort/0/direction"));

        assert!(client.seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_query_translates_fields_and_defaults_limit() {
        let client = Arc::new(ScriptedClient::default());
        let executor = executor(client.clone());

        let result = executor
            .execute(
                &tool(QUERY_TOOL),
                json!({
                    "operation": "list",
                    "tableId": "projects",
                    "filters": {"operator": "and", "fields": [{"field": "Status", "comparison": "is", "value": "Open"}]}
                }),
            )
            .await;
        assert!(result.success, "{:?}", result.error);
        assert_eq!(json_content(&result)["items"][0]["Status"], "Open");

        let seen = client.seen.lock().unwrap();
        assert_eq!(
            seen[0].endpoint,
            "/applications/app_projects/records/list/?limit=200&offset=0"
        );
        assert_eq!(seen[0].data.as_ref().unwrap()["filter"]["fields"][0]["field"], "s1a2b3");
    }

    #[tokio::test]
    async fn test_query_count_and_search_requirements() {
        let executor = executor(Arc::new(ScriptedClient::default()));

        let count = executor
            .execute(&tool(QUERY_TOOL), json!({"operation": "count", "tableId": "app_projects"}))
            .await;
        assert_eq!(json_content(&count)["count"], 42);

        let search = executor
            .execute(&tool(QUERY_TOOL), json!({"operation": "search", "tableId": "app_projects"}))
            .await;
        assert!(!search.success);
    }

    #[tokio::test]
    async fn test_record_defaults_to_dry_run() {
        let client = Arc::new(ScriptedClient::default());
        let executor = executor(client.clone());

        let result = executor
            .execute(
                &tool(RECORD_TOOL),
                json!({"operation": "update", "tableId": "Projects", "recordId": "r1", "data": {"Status": "Done"}}),
            )
            .await;

        assert!(result.success);
        assert!(result.is_dry_run);
        let preview = json_content(&result);
        assert_eq!(preview["request"]["method"], "PATCH");
        assert_eq!(preview["request"]["data"]["s1a2b3"], "Done");
        assert!(client.seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_record_red_operation_blocked_without_confirmation() {
        let client = Arc::new(ScriptedClient::default());
        let executor = executor(client.clone());

        let result = executor
            .execute(
                &tool(RECORD_TOOL),
                json!({"operation": "bulk_delete", "tableId": "app_projects", "data": ["r1", "r2"], "dry_run": false}),
            )
            .await;

        assert!(!result.success);
        assert_eq!(json_content(&result)["requiresConfirmation"], true);
        assert!(client.seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_record_update_reads_prior_state_and_audits() {
        let dir = tempfile::tempdir().unwrap();
        let audit = Arc::new(
            AuditLogger::new(suitegate_core::AuditConfig {
                enabled: true,
                directory: dir.path().to_path_buf(),
                stdout: false,
            })
            .unwrap(),
        );
        let client = Arc::new(ScriptedClient::default());
        let executor = executor(client.clone()).with_audit(audit.clone());

        let result = executor
            .execute(
                &tool(RECORD_TOOL),
                json!({"operation": "update", "tableId": "app_projects", "recordId": "r1", "data": {"Title": "New"}, "dry_run": false}),
            )
            .await;
        assert!(result.success, "{:?}", result.error);

        let reversal = &json_content(&result)["reversal"];
        assert_eq!(reversal["operation"], "update");
        assert_eq!(reversal["data"]["title"], "Old");

        let seen = client.seen.lock().unwrap();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[0].method, HttpMethod::Get);
        assert_eq!(seen[1].method, HttpMethod::Patch);

        let events = audit.recent_for_table("app_projects", 10).await.unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_type, AuditEventType::MutationExecuted);
        assert!(events[0].prior_state.is_some());
    }

    #[tokio::test]
    async fn test_record_create_requires_object() {
        let executor = executor(Arc::new(ScriptedClient::default()));
        let result = executor
            .execute(
                &tool(RECORD_TOOL),
                json!({"operation": "create", "tableId": "app_projects", "data": [1, 2]}),
            )
            .await;
        assert!(!result.success);
        assert!(result.error.unwrap().contains("object"));
    }

    #[tokio::test]
    async fn test_schema_modes() {
        let executor = executor(Arc::new(ScriptedClient::default()));

        let summary = executor
            .execute(&tool(SCHEMA_TOOL), json!({"tableId": "projects"}))
            .await;
        assert_eq!(json_content(&summary)["fieldCount"], 2);

        let fields = executor
            .execute(&tool(SCHEMA_TOOL), json!({"tableId": "projects", "output_mode": "fields"}))
            .await;
        assert_eq!(json_content(&fields)["fields"][0]["required"], true);
    }

    #[tokio::test]
    async fn test_discover_merges_mappings_and_api() {
        let executor = executor(Arc::new(ScriptedClient::default()));

        let tables = executor.execute(&tool(DISCOVER_TOOL), json!({})).await;
        let list = json_content(&tables)["tables"].as_array().unwrap().clone();
        assert_eq!(list.len(), 2);
        assert_eq!(list[0]["source"], "mapping");
        assert_eq!(list[1]["id"], "app_people");

        let fields = executor
            .execute(&tool(DISCOVER_TOOL), json!({"scope": "fields", "tableId": "Projects"}))
            .await;
        assert_eq!(json_content(&fields)["fields"].as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_query_without_client() {
        let operations = OperationExecutor::new(Arc::new(KnowledgeBase::with_builtin()));
        let executor = ToolExecutor::new(Arc::new(operations));
        let result = executor
            .execute(&tool(QUERY_TOOL), json!({"operation": "list", "tableId": "t"}))
            .await;
        assert!(!result.success);
        assert!(result.error.unwrap().contains("not configured"));
    }
}

//! SmartSuite REST client.
//!
//! [`SuiteClient`] is the seam between tool handlers and the network: the
//! server uses [`HttpSuiteClient`], tests plug in recording mocks.

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use serde_json::{Value, json};
use std::time::Duration;
use suitegate_core::{ApiConfig, ApiCredentials, HttpMethod};
use thiserror::Error;

/// A single call against the SmartSuite API.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ApiRequest {
    pub method: HttpMethod,
    pub endpoint: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl ApiRequest {
    pub fn new(method: HttpMethod, endpoint: impl Into<String>, data: Option<Value>) -> Self {
        Self {
            method,
            endpoint: endpoint.into(),
            data,
        }
    }

    pub fn get(endpoint: impl Into<String>) -> Self {
        Self::new(HttpMethod::Get, endpoint, None)
    }
}

/// Errors from the SmartSuite API or the transport beneath it.
///
/// The display form of [`ClientError::Api`] always contains the status code.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("SmartSuite API error {status}: {message}")]
    Api { status: u16, message: String },

    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    #[error("network error: {0}")]
    Network(String),

    #[error("invalid response: {0}")]
    InvalidResponse(String),

    #[error("failed to build HTTP client: {0}")]
    Setup(String),
}

impl ClientError {
    /// HTTP status of an API error.
    pub fn status(&self) -> Option<u16> {
        match self {
            ClientError::Api { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            ClientError::Timeout(Duration::ZERO)
        } else if e.is_decode() {
            ClientError::InvalidResponse(e.to_string())
        } else {
            ClientError::Network(e.to_string())
        }
    }
}

/// Access to the SmartSuite REST API.
///
/// Only [`SuiteClient::request`] must be implemented; the record and schema
/// helpers are expressed in terms of it.
#[async_trait]
pub trait SuiteClient: Send + Sync {
    async fn request(&self, request: ApiRequest) -> Result<Value, ClientError>;

    /// `body` carries `filter` and `sort`; paging goes in the query string.
    async fn list_records(
        &self,
        table_id: &str,
        body: Value,
        limit: usize,
        offset: usize,
    ) -> Result<Value, ClientError> {
        self.request(ApiRequest::new(
            HttpMethod::Post,
            format!(
                "/applications/{}/records/list/?limit={}&offset={}",
                table_id, limit, offset
            ),
            Some(body),
        ))
        .await
    }

    async fn get_record(&self, table_id: &str, record_id: &str) -> Result<Value, ClientError> {
        self.request(ApiRequest::get(record_endpoint(table_id, record_id)))
            .await
    }

    async fn create_record(&self, table_id: &str, data: Value) -> Result<Value, ClientError> {
        self.request(ApiRequest::new(
            HttpMethod::Post,
            records_endpoint(table_id),
            Some(data),
        ))
        .await
    }

    async fn update_record(
        &self,
        table_id: &str,
        record_id: &str,
        data: Value,
    ) -> Result<Value, ClientError> {
        self.request(ApiRequest::new(
            HttpMethod::Patch,
            record_endpoint(table_id, record_id),
            Some(data),
        ))
        .await
    }

    async fn delete_record(&self, table_id: &str, record_id: &str) -> Result<Value, ClientError> {
        self.request(ApiRequest::new(
            HttpMethod::Delete,
            record_endpoint(table_id, record_id),
            None,
        ))
        .await
    }

    async fn bulk_update(&self, table_id: &str, items: Vec<Value>) -> Result<Value, ClientError> {
        self.request(ApiRequest::new(
            HttpMethod::Patch,
            format!("/applications/{}/records/bulk/", table_id),
            Some(json!({ "items": items })),
        ))
        .await
    }

    async fn bulk_delete(&self, table_id: &str, ids: Vec<String>) -> Result<Value, ClientError> {
        self.request(ApiRequest::new(
            HttpMethod::Patch,
            format!("/applications/{}/records/bulk_delete/", table_id),
            Some(json!({ "items": ids })),
        ))
        .await
    }

    async fn get_schema(&self, table_id: &str) -> Result<Value, ClientError> {
        self.request(ApiRequest::get(format!("/applications/{}/", table_id)))
            .await
    }

    async fn list_applications(&self) -> Result<Value, ClientError> {
        self.request(ApiRequest::get("/applications/")).await
    }
}

pub fn records_endpoint(table_id: &str) -> String {
    format!("/applications/{}/records/", table_id)
}

pub fn record_endpoint(table_id: &str, record_id: &str) -> String {
    format!("/applications/{}/records/{}/", table_id, record_id)
}

/// [`SuiteClient`] over HTTPS.
pub struct HttpSuiteClient {
    http: Client,
    base_url: String,
    credentials: ApiCredentials,
}

impl HttpSuiteClient {
    pub fn new(config: &ApiConfig, credentials: ApiCredentials) -> Result<Self, ClientError> {
        let http = Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| ClientError::Setup(e.to_string()))?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            credentials,
        })
    }

    fn url(&self, endpoint: &str) -> String {
        if endpoint.starts_with('/') {
            format!("{}{}", self.base_url, endpoint)
        } else {
            format!("{}/{}", self.base_url, endpoint)
        }
    }
}

fn reqwest_method(method: HttpMethod) -> reqwest::Method {
    match method {
        HttpMethod::Get => reqwest::Method::GET,
        HttpMethod::Post => reqwest::Method::POST,
        HttpMethod::Put => reqwest::Method::PUT,
        HttpMethod::Patch => reqwest::Method::PATCH,
        HttpMethod::Delete => reqwest::Method::DELETE,
    }
}

#[async_trait]
impl SuiteClient for HttpSuiteClient {
    async fn request(&self, request: ApiRequest) -> Result<Value, ClientError> {
        let url = self.url(&request.endpoint);
        tracing::debug!(method = %request.method, url = %url, "SmartSuite request");

        let mut builder = self
            .http
            .request(reqwest_method(request.method), &url)
            .header("Authorization", format!("Token {}", self.credentials.api_key))
            .header("ACCOUNT-ID", &self.credentials.workspace_id)
            .header("Accept", "application/json");
        if let Some(data) = &request.data {
            builder = builder.json(data);
        }

        let response = builder.send().await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(ClientError::Api {
                status: status.as_u16(),
                message: body.chars().take(500).collect(),
            });
        }

        if body.trim().is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&body).map_err(|e| ClientError::InvalidResponse(e.to_string()))
    }
}

//! HTTP transport for the MCP server.
//!
//! JSON-RPC messages are accepted on `POST /mcp` and forwarded over a
//! channel to the request handler task.

use crate::error::McpError;
use crate::protocol::{JsonRpcRequest, JsonRpcResponse, error_codes};
use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use std::sync::Arc;
use tokio::sync::mpsc;
use tower_http::trace::TraceLayer;

/// Channel end that reaches the request handler.
pub type RequestSender = mpsc::Sender<(JsonRpcRequest, mpsc::Sender<JsonRpcResponse>)>;

/// HTTP transport handler state.
pub struct HttpTransportState {
    request_tx: RequestSender,
}

impl HttpTransportState {
    pub fn new(request_tx: RequestSender) -> Self {
        Self { request_tx }
    }
}

/// Create the HTTP router for MCP.
pub fn create_router(state: Arc<HttpTransportState>) -> Router {
    Router::new()
        .route("/mcp", post(handle_mcp_post))
        .route("/health", get(handle_health))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Handle POST requests to /mcp (JSON-RPC over HTTP).
async fn handle_mcp_post(
    State(state): State<Arc<HttpTransportState>>,
    Json(request): Json<JsonRpcRequest>,
) -> Response {
    let notification = request.is_notification();
    let (response_tx, mut response_rx) = mpsc::channel(1);

    if state.request_tx.send((request, response_tx)).await.is_err() {
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(JsonRpcResponse::error(
                None,
                error_codes::INTERNAL_ERROR,
                "MCP server unavailable",
            )),
        )
            .into_response();
    }

    match response_rx.recv().await {
        Some(_) if notification => StatusCode::ACCEPTED.into_response(),
        Some(response) => (StatusCode::OK, Json(response)).into_response(),
        None => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(JsonRpcResponse::error(
                None,
                error_codes::INTERNAL_ERROR,
                "No response from MCP server",
            )),
        )
            .into_response(),
    }
}

/// Handle health check requests.
async fn handle_health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": "suitegate",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// HTTP server for MCP transport.
pub struct HttpServer {
    address: String,
    state: Arc<HttpTransportState>,
}

impl HttpServer {
    pub fn new(address: impl Into<String>, request_tx: RequestSender) -> Self {
        Self {
            address: address.into(),
            state: Arc::new(HttpTransportState::new(request_tx)),
        }
    }

    /// Run the HTTP server.
    pub async fn run(self) -> Result<(), McpError> {
        let app = create_router(self.state);

        let listener = tokio::net::TcpListener::bind(&self.address)
            .await
            .map_err(|e| McpError::StartupFailed(format!("failed to bind {}: {}", self.address, e)))?;

        tracing::info!(address = %self.address, "MCP HTTP server listening");

        axum::serve(listener, app)
            .await
            .map_err(|e| McpError::TransportError(e.to_string()))?;

        Ok(())
    }
}

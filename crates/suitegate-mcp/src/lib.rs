//! # suitegate-mcp
//!
//! MCP (Model Context Protocol) server that exposes the SmartSuite API to AI
//! agents as a small set of safety-gated tools.
//!
//! ## Architecture
//!
//! ```text
//! AI Agent
//!       │
//!       │ MCP protocol (list tools / call tool)
//!       ▼
//! ┌──────────────────────┐
//! │  Suitegate MCP Server│
//! │  1. Validate args    │
//! │  2. Match knowledge  │  ← suitegate-knowledge
//! │  3. Classify safety  │
//! │  4. Correct request  │
//! │  5. Dry-run, block   │
//! │     or execute       │
//! │  6. Audit mutations  │  ← suitegate-audit
//! └──────────┬───────────┘
//!            │
//!            ▼
//!    SmartSuite REST API
//! ```
//!
//! ## Example Usage
//!
//! ```ignore
//! use std::sync::Arc;
//! use suitegate_core::McpConfig;
//! use suitegate_knowledge::KnowledgeBase;
//! use suitegate_mcp::{McpServer, OperationExecutor, ToolExecutor};
//!
//! let operations = OperationExecutor::new(Arc::new(KnowledgeBase::with_builtin()));
//! let server = McpServer::new(McpConfig::default())
//!     .with_executor(ToolExecutor::new(Arc::new(operations)));
//! server.run().await?;
//! ```

pub mod catalog;
pub mod client;
pub mod error;
pub mod executor;
pub mod http_transport;
pub mod intelligent;
pub mod mappings;
pub mod protocol;
pub mod server;
pub mod tools;

pub use catalog::{builtin_tools, default_registry};
pub use client::{ApiRequest, ClientError, HttpSuiteClient, SuiteClient};
pub use error::McpError;
pub use executor::{ExecutionResult, ToolExecutor};
pub use intelligent::{
    Analysis, FailureCategory, IntelligentError, OperationExecutor, OperationInput, OperationMode,
    OperationResult, SuggestedCorrection,
};
pub use mappings::{FieldTranslator, MappingError, TableMapping, TableResolver};
pub use protocol::{JsonRpcRequest, JsonRpcResponse, ToolContent, ToolDefinition};
pub use server::McpServer;
pub use tools::ToolRegistry;

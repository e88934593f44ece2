//! `suitegate serve`: run the MCP server over stdio or HTTP.

use anyhow::{Context, Result};
use clap::Args;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use suitegate_audit::AuditLogger;
use suitegate_core::{SuiteGateConfig, Transport};
use suitegate_knowledge::{KnowledgeBase, KnowledgeProvider, SafetyClassifier};
use suitegate_mcp::{HttpSuiteClient, McpServer, OperationExecutor, SuiteClient, TableResolver, ToolExecutor};
use tracing::{info, warn};

/// Arguments for `suitegate serve`.
#[derive(Debug, Args)]
pub struct ServeArgs {
    /// Transport: stdio or http.
    #[arg(short, long)]
    pub transport: Option<String>,

    /// HTTP bind host.
    #[arg(long)]
    pub host: Option<String>,

    /// HTTP port.
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Extra knowledge file or directory.
    #[arg(long)]
    pub knowledge: Option<PathBuf>,

    /// Directory of table mapping files.
    #[arg(long)]
    pub mappings: Option<PathBuf>,

    /// Disable audit logging.
    #[arg(long, default_value_t = false)]
    pub no_audit: bool,
}

impl ServeArgs {
    /// Fold command-line overrides into the loaded configuration.
    fn apply(&self, config: &mut SuiteGateConfig) -> Result<()> {
        if let Some(transport) = &self.transport {
            config.mcp.transport = transport
                .parse::<Transport>()
                .map_err(|e| anyhow::anyhow!(e))?;
        }
        if let Some(host) = &self.host {
            config.mcp.host = host.clone();
        }
        if let Some(port) = self.port {
            config.mcp.port = port;
        }
        if let Some(path) = &self.knowledge {
            config.knowledge.path = Some(path.clone());
        }
        if let Some(dir) = &self.mappings {
            config.mappings.directory = Some(dir.clone());
        }
        if self.no_audit {
            config.audit.enabled = false;
        }
        Ok(())
    }
}

pub async fn run(config_path: &Path, args: ServeArgs) -> Result<()> {
    let mut config = super::load_config(config_path)?;
    args.apply(&mut config)?;
    config.validate()?;

    let server = build_server(&config)?;

    info!(
        transport = ?config.mcp.transport,
        tools = server.tools().len(),
        "Starting Suitegate MCP server"
    );
    if config.mcp.transport == Transport::Http {
        info!(address = %config.mcp.bind_address(), "HTTP transport enabled");
    }

    tokio::select! {
        result = server.run() => {
            result.context("MCP server failed")?;
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received shutdown signal");
        }
    }

    Ok(())
}

/// Assemble the knowledge base, client, mappings and audit log into a server.
pub fn build_server(config: &SuiteGateConfig) -> Result<McpServer> {
    let knowledge = KnowledgeBase::from_config(&config.knowledge);
    match knowledge.version() {
        Ok(version) => info!(
            version = version.version,
            patterns = version.pattern_count,
            "Knowledge base loaded"
        ),
        Err(e) => warn!(error = %e, "Knowledge base version unavailable"),
    }

    let mut operations = OperationExecutor::new(Arc::new(knowledge))
        .with_classifier(SafetyClassifier::from_config(&config.safety))
        .with_timeout(config.api.timeout())
        .with_probe_endpoint(config.api.probe_endpoint.clone());

    match connect(config) {
        Ok(client) => operations = operations.with_client(client),
        Err(e) => warn!(
            error = %e,
            "SmartSuite credentials unavailable; only learn and dry_run modes will work"
        ),
    }

    let tables = match &config.mappings.directory {
        Some(dir) => TableResolver::load_dir(dir)
            .with_context(|| format!("Failed to load table mappings from {:?}", dir))?,
        None => TableResolver::default(),
    };
    info!(tables = tables.tables().len(), "Table mappings loaded");

    let audit = AuditLogger::new(config.audit.clone()).context("Failed to initialize audit log")?;

    let executor = ToolExecutor::new(Arc::new(operations))
        .with_tables(tables)
        .with_audit(Arc::new(audit));

    Ok(McpServer::new(config.mcp.clone()).with_executor(executor))
}

fn connect(config: &SuiteGateConfig) -> Result<Arc<dyn SuiteClient>> {
    let credentials = config.api.credentials_from_env()?;
    let client = HttpSuiteClient::new(&config.api, credentials)?;
    Ok(Arc::new(client))
}

//! `suitegate analyze`: offline knowledge check of a single API operation.
//!
//! Runs the operation in `learn` mode, so nothing is sent to SmartSuite.

use anyhow::{Context, Result};
use clap::Args;
use serde_json::{Value, json};
use std::path::Path;
use std::sync::Arc;
use suitegate_knowledge::{KnowledgeBase, SafetyClassifier};
use suitegate_mcp::{OperationExecutor, OperationResult};

/// Arguments for `suitegate analyze`.
#[derive(Debug, Args)]
pub struct AnalyzeArgs {
    /// HTTP method (GET, POST, PUT, PATCH, DELETE).
    pub method: String,

    /// API endpoint, e.g. /applications/{id}/records/list/
    pub endpoint: String,

    /// Request payload as a JSON string.
    #[arg(short = 'd', long)]
    pub payload: Option<String>,

    /// Table id substituted for `{id}` placeholders.
    #[arg(long)]
    pub table_id: Option<String>,

    /// What the operation is meant to do.
    #[arg(long, default_value = "ad-hoc analysis")]
    pub description: String,

    /// Print the raw JSON result.
    #[arg(long, default_value_t = false)]
    pub json: bool,
}

impl AnalyzeArgs {
    fn to_arguments(&self) -> Result<Value> {
        let mut arguments = json!({
            "mode": "learn",
            "method": self.method.to_ascii_uppercase(),
            "endpoint": self.endpoint,
            "operation_description": self.description,
        });
        if let Some(payload) = &self.payload {
            let payload: Value =
                serde_json::from_str(payload).context("--payload is not valid JSON")?;
            arguments["payload"] = payload;
        }
        if let Some(table_id) = &self.table_id {
            arguments["tableId"] = json!(table_id);
        }
        Ok(arguments)
    }
}

pub async fn run(config_path: &Path, args: AnalyzeArgs) -> Result<()> {
    let config = super::load_config(config_path)?;

    let executor = OperationExecutor::new(Arc::new(KnowledgeBase::from_config(&config.knowledge)))
        .with_classifier(SafetyClassifier::from_config(&config.safety));

    let result = executor.run_arguments(args.to_arguments()?).await?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        print_report(&result);
    }
    Ok(())
}

fn print_report(result: &OperationResult) {
    let analysis = &result.analysis;

    println!("\n🛡  Safety: {} (score {})", analysis.safety_level, analysis.score);
    println!("   {}", result.summary.message);

    if !analysis.matched_patterns.is_empty() {
        println!("\n📚 Matched knowledge:");
        for id in &analysis.matched_patterns {
            println!("   • {}", id);
        }
    }

    if !analysis.blockers.is_empty() {
        println!("\n⛔ Blockers:");
        for blocker in &analysis.blockers {
            println!("   • {}", blocker);
        }
    }

    if !analysis.warnings.is_empty() {
        println!("\n⚠️  Warnings:");
        for warning in &analysis.warnings {
            println!("   • [{:?}] {}", warning.level, warning.message);
        }
    }

    if !analysis.recommendations.is_empty() {
        println!("\n💡 Recommendations:");
        for rec in &analysis.recommendations {
            println!("   • {}", rec);
        }
    }

    if let Some(correction) = &result.suggested_correction {
        println!("\n🔧 Suggested correction: {}", correction.description);
    }

    if analysis.requires_confirmation {
        println!("\nExecution requires confirmed=true.");
    }
    println!();
}

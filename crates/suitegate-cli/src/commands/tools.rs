//! `suitegate tools`: list the MCP tools the server exposes.

use anyhow::Result;
use suitegate_mcp::{ToolDefinition, default_registry};

fn badges(tool: &ToolDefinition) -> Vec<&'static str> {
    let annotations = tool.annotations.as_ref();
    let mut badges = Vec::new();
    if annotations.is_some_and(|a| a.read_only == Some(true)) {
        badges.push("read");
    } else {
        badges.push("write");
    }
    if annotations.is_some_and(|a| a.destructive == Some(true)) {
        badges.push("destructive");
    }
    if annotations.is_some_and(|a| a.dry_run_supported == Some(true)) {
        badges.push("dry-run");
    }
    badges
}

pub fn list(verbose: bool) -> Result<()> {
    let registry = default_registry();
    let tools = registry.list();

    println!("\n🔧 Available Tools ({}):", tools.len());
    for tool in tools {
        println!("   • {} ({})", tool.name, badges(tool).join(", "));
        if let Some(desc) = &tool.description {
            println!("     {}", desc);
        }
        if verbose {
            println!(
                "     Schema: {}",
                serde_json::to_string_pretty(&tool.input_schema)?
            );
        }
    }
    println!();
    Ok(())
}

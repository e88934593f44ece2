//! `suitegate knowledge`: inspect the loaded corpus or validate a file.

use anyhow::{Context, Result};
use clap::Subcommand;
use std::path::{Path, PathBuf};
use suitegate_knowledge::{EntryOrigin, KnowledgeBase, KnowledgeProvider, validate_file};

#[derive(Debug, Subcommand)]
pub enum KnowledgeCommand {
    /// Show the corpus the server would load.
    Show,

    /// Strictly validate a knowledge file (YAML or JSON).
    Check {
        /// File to validate.
        file: PathBuf,
    },
}

pub fn run(config_path: &Path, cmd: KnowledgeCommand) -> Result<()> {
    match cmd {
        KnowledgeCommand::Show => show(config_path),
        KnowledgeCommand::Check { file } => check(&file),
    }
}

fn show(config_path: &Path) -> Result<()> {
    let config = super::load_config(config_path)?;
    let kb = KnowledgeBase::from_config(&config.knowledge);
    let version = kb.version()?;

    println!("\n📚 Knowledge base v{} ({} patterns)", version.version, version.pattern_count);
    println!("   Last updated: {}", version.last_updated.to_rfc3339());

    for entry in kb.entries()? {
        let origin = match entry.origin {
            EntryOrigin::Static => "",
            EntryOrigin::Learned => " [learned]",
        };
        println!(
            "   • {:<6} {}{}",
            entry.safety_level.to_string(),
            entry.id,
            origin
        );
        if let Some(description) = &entry.description {
            println!("            {}", description);
        }
    }

    let stats = kb.cache_stats();
    println!(
        "\n🗄  Match cache: {}/{} entries, {} hits, {} misses\n",
        stats.size, stats.capacity, stats.hits, stats.misses
    );
    Ok(())
}

fn check(file: &Path) -> Result<()> {
    let count = validate_file(file).with_context(|| format!("Invalid knowledge file {:?}", file))?;
    println!("✅ {}: {} entries", file.display(), count);
    Ok(())
}

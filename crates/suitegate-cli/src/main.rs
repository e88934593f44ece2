use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser, Debug)]
#[command(name = "suitegate", version, about = "Safety-gated SmartSuite MCP server")]
struct Cli {
    /// Configuration file. A missing file means built-in defaults.
    #[arg(short, long, global = true, env = "SUITEGATE_CONFIG", default_value = "suitegate.yaml")]
    config: PathBuf,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the MCP server.
    Serve(commands::serve::ServeArgs),

    /// Analyze an API operation against the knowledge base without calling SmartSuite.
    Analyze(commands::analyze::AnalyzeArgs),

    /// Inspect or validate knowledge files.
    Knowledge {
        #[command(subcommand)]
        cmd: commands::knowledge::KnowledgeCommand,
    },

    /// List the MCP tools the server exposes.
    Tools {
        /// Print each tool's input schema.
        #[arg(short, long, default_value_t = false)]
        verbose: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // stdout carries the stdio transport; logs go to stderr.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.cmd {
        Command::Serve(args) => commands::serve::run(&cli.config, args).await?,
        Command::Analyze(args) => commands::analyze::run(&cli.config, args).await?,
        Command::Knowledge { cmd } => commands::knowledge::run(&cli.config, cmd)?,
        Command::Tools { verbose } => commands::tools::list(verbose)?,
    }

    Ok(())
}

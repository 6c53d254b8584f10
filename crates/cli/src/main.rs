//! Mediquery CLI
//!
//! Main entry point for the mediquery command-line tool.
//! Answers natural-language questions over a corpus of clinical-guideline
//! documents using retrieval-augmented generation.

mod commands;

use clap::{Parser, Subcommand};
use commands::{AskCommand, IngestCommand, StatsCommand};
use mediquery_core::{config::AppConfig, logging, AppResult};
use std::path::PathBuf;

/// Mediquery CLI - question answering over clinical guideline documents
#[derive(Parser, Debug)]
#[command(name = "mediquery")]
#[command(about = "Ask questions about a clinical-guideline corpus (RAG)", long_about = None)]
#[command(version)]
struct Cli {
    /// Corpus directory (default: ./corpus)
    #[arg(long, global = true, env = "MEDIQUERY_CORPUS")]
    corpus: Option<PathBuf>,

    /// Index directory (default: .mediquery/index)
    #[arg(long, global = true, env = "MEDIQUERY_INDEX")]
    index: Option<PathBuf>,

    /// Provider for completions and embeddings (ollama, openai, mock)
    #[arg(short, long, global = true, env = "MEDIQUERY_PROVIDER")]
    provider: Option<String>,

    /// Completion model identifier
    #[arg(short, long, global = true, env = "MEDIQUERY_MODEL")]
    model: Option<String>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, global = true, env = "RUST_LOG")]
    log_level: Option<String>,

    /// Enable verbose output (sets log level to debug)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Disable colored output
    #[arg(long, global = true, env = "NO_COLOR")]
    no_color: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Rebuild the vector index from the corpus directory
    Ingest(IngestCommand),

    /// Ask a question against the ingested corpus
    Ask(AskCommand),

    /// Show index statistics
    Stats(StatsCommand),
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("An error occurred: {}", e);
        std::process::exit(1);
    }
}

async fn run() -> AppResult<()> {
    // Parse command-line arguments first (needed for logging config)
    let cli = Cli::parse();

    // Load base configuration from file and environment
    let config = AppConfig::load()?;

    // Apply CLI overrides
    let config = config.with_overrides(
        cli.corpus,
        cli.index,
        cli.provider,
        cli.model,
        cli.log_level,
        cli.verbose,
        cli.no_color,
    );

    // Initialize logging with final configuration
    logging::init_logging(config.log_level.as_deref(), config.no_color)?;

    config.validate()?;

    tracing::info!("Mediquery CLI starting");
    tracing::debug!("Corpus: {:?}", config.corpus_dir);
    tracing::debug!("Index: {:?}", config.index_dir);
    tracing::debug!("Provider: {}", config.provider);

    let command_name = match &cli.command {
        Commands::Ingest(_) => "ingest",
        Commands::Ask(_) => "ask",
        Commands::Stats(_) => "stats",
    };
    let _span = tracing::info_span!("command", name = command_name).entered();

    let result = match cli.command {
        Commands::Ingest(cmd) => cmd.execute(&config).await,
        Commands::Ask(cmd) => cmd.execute(&config).await,
        Commands::Stats(cmd) => cmd.execute(&config).await,
    };

    match &result {
        Ok(_) => tracing::info!("Command completed successfully"),
        Err(e) => tracing::error!("Command failed: {}", e),
    }

    result
}

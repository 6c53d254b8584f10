//! Ingest command handler.
//!
//! Rebuilds the vector index from the corpus directory. Per-file load
//! failures are reported as warnings; the command still succeeds.

use clap::Args;
use mediquery_core::{config::AppConfig, AppResult};
use mediquery_rag::create_provider;

/// Rebuild the vector index from the corpus directory
#[derive(Args, Debug)]
pub struct IngestCommand {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl IngestCommand {
    /// Execute the ingest command.
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing ingest command");

        let embedder = create_provider(config)?;
        let report = mediquery_rag::ingest(config, embedder).await?;

        if self.json {
            let output = serde_json::json!({
                "documents": report.documents,
                "pages": report.pages,
                "chunksIndexed": report.chunks_indexed,
                "skippedEmpty": report.skipped_empty,
                "durationSecs": report.duration_secs,
                "warnings": report.warnings,
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
            return Ok(());
        }

        if report.skipped_empty {
            println!(
                "No documents to index under {:?}; existing index left untouched",
                config.corpus_dir
            );
        } else {
            println!(
                "Indexed {} chunks from {} documents ({} pages) in {:.2}s",
                report.chunks_indexed, report.documents, report.pages, report.duration_secs
            );
        }

        if !report.warnings.is_empty() {
            println!();
            println!("Warnings ({} files skipped):", report.warnings.len());
            for warning in &report.warnings {
                println!("- {:?}: {}", warning.path, warning.message);
            }
        }

        Ok(())
    }
}

//! Stats command handler.
//!
//! Shows what the persisted index currently holds.

use clap::Args;
use mediquery_core::{config::AppConfig, AppError, AppResult};
use mediquery_rag::IndexReader;

/// Show index statistics
#[derive(Args, Debug)]
pub struct StatsCommand {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl StatsCommand {
    /// Execute the stats command.
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing stats command");

        let reader = match IndexReader::open(&config.index_dir).await {
            Ok(reader) => reader,
            Err(AppError::IndexNotFound(path)) => {
                println!("No index at {:?}. Run `mediquery ingest` first.", path);
                return Ok(());
            }
            Err(e) => return Err(e),
        };

        let manifest = reader.manifest();
        let chunk_count = reader.chunk_count().await?;
        let index_size = directory_size(&config.index_dir);

        if self.json {
            let output = serde_json::json!({
                "chunkCount": chunk_count,
                "embeddingProvider": manifest.provider,
                "embeddingModel": manifest.model,
                "dimensions": manifest.dimensions,
                "chunkSize": manifest.chunk_size,
                "chunkOverlap": manifest.chunk_overlap,
                "indexSizeBytes": index_size,
                "createdAt": manifest.created_at,
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
            return Ok(());
        }

        println!("Index: {:?}", config.index_dir);
        println!("Chunks: {}", chunk_count);
        println!(
            "Embeddings: {}/{} ({} dims)",
            manifest.provider, manifest.model, manifest.dimensions
        );
        println!(
            "Chunking: {} chars, {} overlap",
            manifest.chunk_size, manifest.chunk_overlap
        );
        println!("Size: {} bytes", index_size);
        println!("Built: {}", manifest.created_at.to_rfc3339());

        Ok(())
    }
}

/// Total size in bytes of all files under a directory.
fn directory_size(dir: &std::path::Path) -> u64 {
    let mut total = 0;
    let mut stack = vec![dir.to_path_buf()];

    while let Some(path) = stack.pop() {
        let Ok(entries) = std::fs::read_dir(&path) else {
            continue;
        };
        for entry in entries.flatten() {
            let entry_path = entry.path();
            if entry_path.is_dir() {
                stack.push(entry_path);
            } else if let Ok(metadata) = entry.metadata() {
                total += metadata.len();
            }
        }
    }

    total
}

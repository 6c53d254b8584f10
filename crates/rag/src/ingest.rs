//! Ingestion pipeline: loader → chunker → embedder → index build.
//!
//! Ingestion is an explicit, operator-triggered action. Per-file extraction
//! failures are recovered and aggregated into a warning list; embedding
//! service failures propagate uncaught to the caller.

use crate::chunker;
use crate::embeddings::EmbeddingProvider;
use crate::index::{self, IndexManifest};
use crate::loader;
use crate::types::{IngestReport, PageText};
use chrono::Utc;
use mediquery_core::{AppConfig, AppResult};
use sha2::{Digest, Sha256};
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Instant;

/// Chunk texts per embedding request.
const EMBED_BATCH_SIZE: usize = 64;

/// Rebuild the vector index from the configured corpus directory.
///
/// A corpus that yields zero chunks is a no-op: the run reports
/// `skipped_empty` and any prior index is left untouched, never replaced by
/// an empty one. Otherwise the previous index is wholesale-replaced via an
/// atomic swap once the new one is fully written.
pub async fn ingest(
    config: &AppConfig,
    embedder: Arc<dyn EmbeddingProvider>,
) -> AppResult<IngestReport> {
    let start = Instant::now();

    tracing::info!("Starting ingestion from {:?}", config.corpus_dir);

    let (pages, warnings) = loader::load_corpus(&config.corpus_dir)?;

    let documents = pages
        .iter()
        .map(|p| p.document.as_path())
        .collect::<BTreeSet<_>>()
        .len() as u32;

    let chunks = chunker::chunk_pages(&pages, config.chunk_size, config.chunk_overlap);

    if chunks.is_empty() {
        tracing::warn!(
            "Corpus at {:?} produced no chunks; skipping index build",
            config.corpus_dir
        );
        return Ok(IngestReport {
            documents,
            pages: pages.len() as u32,
            chunks_indexed: 0,
            warnings,
            skipped_empty: true,
            duration_secs: start.elapsed().as_secs_f64(),
        });
    }

    tracing::info!(
        "Embedding {} chunks with {} ({})",
        chunks.len(),
        embedder.provider_name(),
        embedder.model_name()
    );

    let mut records = Vec::with_capacity(chunks.len());
    for batch in chunks.chunks(EMBED_BATCH_SIZE) {
        let texts: Vec<String> = batch.iter().map(|c| c.text.clone()).collect();
        let embeddings = embedder.embed_batch(&texts).await?;

        for (chunk, embedding) in batch.iter().zip(embeddings) {
            records.push((chunk.clone(), embedding));
        }
    }

    let manifest = IndexManifest {
        provider: embedder.provider_name().to_string(),
        model: embedder.model_name().to_string(),
        dimensions: embedder.dimensions(),
        chunk_size: config.chunk_size,
        chunk_overlap: config.chunk_overlap,
        chunk_count: records.len() as u64,
        corpus_fingerprint: corpus_fingerprint(&pages),
        created_at: Utc::now(),
    };

    index::build_index(&config.index_dir, &manifest, &records).await?;

    let duration_secs = start.elapsed().as_secs_f64();

    tracing::info!(
        "Ingestion complete: {} documents, {} pages, {} chunks in {:.2}s ({} warnings)",
        documents,
        pages.len(),
        records.len(),
        duration_secs,
        warnings.len()
    );

    Ok(IngestReport {
        documents,
        pages: pages.len() as u32,
        chunks_indexed: records.len() as u32,
        warnings,
        skipped_empty: false,
        duration_secs,
    })
}

/// SHA-256 over the sorted set of document paths in the corpus.
fn corpus_fingerprint(pages: &[PageText]) -> String {
    let paths: BTreeSet<String> = pages
        .iter()
        .map(|p| p.document.to_string_lossy().to_string())
        .collect();

    let mut hasher = Sha256::new();
    for path in paths {
        hasher.update(path.as_bytes());
        hasher.update(b"\n");
    }
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn page(document: &str, page: u32, text: &str) -> PageText {
        PageText {
            document: PathBuf::from(document),
            page,
            text: text.to_string(),
        }
    }

    #[test]
    fn test_fingerprint_ignores_page_order() {
        let a = vec![page("a.pdf", 1, "x"), page("b.pdf", 1, "y")];
        let b = vec![page("b.pdf", 2, "z"), page("a.pdf", 3, "w")];
        assert_eq!(corpus_fingerprint(&a), corpus_fingerprint(&b));
    }

    #[test]
    fn test_fingerprint_changes_with_documents() {
        let a = vec![page("a.pdf", 1, "x")];
        let b = vec![page("c.pdf", 1, "x")];
        assert_ne!(corpus_fingerprint(&a), corpus_fingerprint(&b));
    }
}

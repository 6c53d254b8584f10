//! Query-time retrieval against the persisted index.

use crate::embeddings::EmbeddingProvider;
use crate::index::{IndexManifest, IndexReader};
use crate::types::ScoredChunk;
use mediquery_core::{AppError, AppResult};
use std::path::Path;
use std::sync::Arc;

/// Read-only retriever over a persisted index.
///
/// Safe to share across concurrent queries; all methods take `&self`.
pub struct Retriever {
    index: IndexReader,
    embedder: Arc<dyn EmbeddingProvider>,
}

impl Retriever {
    /// Open the index at `index_dir` for querying.
    ///
    /// Fails with [`AppError::IndexNotFound`] when nothing has been ingested
    /// yet, and with a configuration error when the active embedding
    /// provider does not match the one the index was built with; querying
    /// across models silently degrades retrieval, so it is refused outright.
    pub async fn open(index_dir: &Path, embedder: Arc<dyn EmbeddingProvider>) -> AppResult<Self> {
        let index = IndexReader::open(index_dir).await?;

        let manifest = index.manifest();
        if manifest.provider != embedder.provider_name()
            || manifest.model != embedder.model_name()
            || manifest.dimensions != embedder.dimensions()
        {
            return Err(AppError::Config(format!(
                "Index was built with embedding model '{}/{}' ({} dims) but the active \
                 configuration uses '{}/{}' ({} dims). Re-run ingest or restore the \
                 original embedding settings.",
                manifest.provider,
                manifest.model,
                manifest.dimensions,
                embedder.provider_name(),
                embedder.model_name(),
                embedder.dimensions()
            )));
        }

        Ok(Self { index, embedder })
    }

    /// Retrieve up to `k` chunks for a query, most similar first.
    ///
    /// Chunks from the same document all count toward `k`; deduplication
    /// happens only at source-display time.
    pub async fn retrieve(&self, query: &str, k: usize) -> AppResult<Vec<ScoredChunk>> {
        tracing::debug!("Embedding query ({} chars)", query.len());
        let query_embedding = self.embedder.embed(query).await?;

        let results = self.index.search(&query_embedding, k).await?;

        if results.is_empty() {
            tracing::info!("No chunks retrieved for query");
        } else {
            tracing::info!(
                "Retrieved {} chunks (top score: {:.3})",
                results.len(),
                results[0].score
            );
        }

        Ok(results)
    }

    /// The manifest of the opened index.
    pub fn manifest(&self) -> &IndexManifest {
        self.index.manifest()
    }

    /// Number of chunks in the opened index.
    pub async fn chunk_count(&self) -> AppResult<u64> {
        self.index.chunk_count().await
    }
}

//! LanceDB-backed persistent vector index.
//!
//! One table (`chunks`) holds a row per chunk: identifiers, provenance,
//! text, and a fixed-size embedding vector. A `manifest.json` alongside the
//! table records the embedding settings the index was built with so queries
//! can refuse a mismatched model.
//!
//! Rebuilds are wholesale: the new index is written to a staging directory
//! and swapped into place with renames, so a reader mid-query sees either
//! the old index or the new one, never a partially written one.

use crate::types::{DocumentChunk, ScoredChunk};
use arrow_array::{
    Array, FixedSizeListArray, Float32Array, RecordBatch, RecordBatchIterator, StringArray,
    UInt32Array,
};
use arrow_schema::{ArrowError, DataType, Field, Schema};
use chrono::{DateTime, Utc};
use lancedb::query::{ExecutableQuery, QueryBase};
use lancedb::Table;
use mediquery_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Name of the LanceDB table holding chunk rows.
const CHUNKS_TABLE: &str = "chunks";

/// Manifest file written next to the table data.
const MANIFEST_FILE: &str = "manifest.json";

/// Rows per Arrow batch when writing the table.
const WRITE_BATCH_SIZE: usize = 512;

/// Embedding and chunking settings recorded at index build time.
///
/// Retrieval quality silently degrades if the query embedding comes from a
/// different model than the indexed vectors, so the retriever validates the
/// active provider against this manifest before serving any query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexManifest {
    /// Embedding provider name ("ollama", "openai", "mock")
    pub provider: String,

    /// Embedding model identifier
    pub model: String,

    /// Embedding vector dimension
    pub dimensions: usize,

    /// Chunk size used at build time
    pub chunk_size: usize,

    /// Chunk overlap used at build time
    pub chunk_overlap: usize,

    /// Number of chunk rows written
    pub chunk_count: u64,

    /// SHA-256 over the sorted document paths of the corpus
    pub corpus_fingerprint: String,

    /// When the index was built
    pub created_at: DateTime<Utc>,
}

impl IndexManifest {
    /// Load the manifest from an index directory.
    pub fn load(index_dir: &Path) -> AppResult<Self> {
        let path = index_dir.join(MANIFEST_FILE);
        let contents = std::fs::read_to_string(&path).map_err(|e| {
            AppError::Index(format!("Failed to read manifest at {:?}: {}", path, e))
        })?;
        let manifest = serde_json::from_str(&contents)?;
        Ok(manifest)
    }

    /// Save the manifest into an index directory.
    pub fn save(&self, index_dir: &Path) -> AppResult<()> {
        let path = index_dir.join(MANIFEST_FILE);
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(&path, contents).map_err(|e| {
            AppError::Index(format!("Failed to write manifest at {:?}: {}", path, e))
        })?;
        Ok(())
    }
}

/// Build a fresh index at `index_dir`, replacing any prior one atomically.
///
/// The table and manifest are written to a staging directory first; only a
/// fully written staging index is swapped into place. On failure the staging
/// directory is removed and the prior index stays untouched.
pub async fn build_index(
    index_dir: &Path,
    manifest: &IndexManifest,
    records: &[(DocumentChunk, Vec<f32>)],
) -> AppResult<()> {
    if records.is_empty() {
        return Err(AppError::Index(
            "Refusing to build an index with zero chunks".to_string(),
        ));
    }

    let staging = sibling(index_dir, "staging");
    if staging.exists() {
        std::fs::remove_dir_all(&staging)?;
    }
    std::fs::create_dir_all(&staging)?;

    let result = async {
        write_table(&staging, manifest, records).await?;
        manifest.save(&staging)
    }
    .await;

    match result {
        Ok(()) => {
            swap_into_place(&staging, index_dir)?;
            tracing::info!(
                "Built index at {:?} ({} chunks, {} dims)",
                index_dir,
                records.len(),
                manifest.dimensions
            );
            Ok(())
        }
        Err(e) => {
            let _ = std::fs::remove_dir_all(&staging);
            Err(e)
        }
    }
}

/// Write the chunks table into a (staging) directory.
async fn write_table(
    dir: &Path,
    manifest: &IndexManifest,
    records: &[(DocumentChunk, Vec<f32>)],
) -> AppResult<()> {
    let schema = chunks_schema(manifest.dimensions);

    let mut batches: Vec<RecordBatch> = Vec::new();
    for slice in records.chunks(WRITE_BATCH_SIZE) {
        batches.push(records_to_batch(slice, manifest.dimensions, schema.clone())?);
    }

    let uri = dir.to_string_lossy().to_string();
    let conn = lancedb::connect(&uri)
        .execute()
        .await
        .map_err(|e| AppError::Index(format!("Failed to connect to LanceDB: {}", e)))?;

    conn.create_table(
        CHUNKS_TABLE,
        RecordBatchIterator::new(batches.into_iter().map(Ok::<_, ArrowError>), schema),
    )
    .execute()
    .await
    .map_err(|e| AppError::Index(format!("Failed to create chunks table: {}", e)))?;

    Ok(())
}

/// Swap a fully written staging index into the live location.
fn swap_into_place(staging: &Path, live: &Path) -> AppResult<()> {
    if let Some(parent) = live.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let retired = sibling(live, "old");
    if retired.exists() {
        std::fs::remove_dir_all(&retired)?;
    }

    if live.exists() {
        std::fs::rename(live, &retired)?;
    }

    std::fs::rename(staging, live)?;

    if retired.exists() {
        if let Err(e) = std::fs::remove_dir_all(&retired) {
            tracing::warn!("Failed to remove replaced index at {:?}: {}", retired, e);
        }
    }

    Ok(())
}

/// Sibling path `<name>.<suffix>` next to `path`.
fn sibling(path: &Path, suffix: &str) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "index".to_string());
    path.with_file_name(format!("{}.{}", name, suffix))
}

/// Arrow schema for the chunks table.
fn chunks_schema(dimensions: usize) -> Arc<Schema> {
    Arc::new(Schema::new(vec![
        Field::new("id", DataType::Utf8, false),
        Field::new("document", DataType::Utf8, false),
        Field::new("page", DataType::UInt32, false),
        Field::new("seq", DataType::UInt32, false),
        Field::new("text", DataType::Utf8, false),
        Field::new(
            "embedding",
            DataType::FixedSizeList(
                Arc::new(Field::new("item", DataType::Float32, true)),
                dimensions as i32,
            ),
            false,
        ),
    ]))
}

/// Convert chunk records to an Arrow RecordBatch.
fn records_to_batch(
    records: &[(DocumentChunk, Vec<f32>)],
    dimensions: usize,
    schema: Arc<Schema>,
) -> AppResult<RecordBatch> {
    let mut flat = Vec::with_capacity(records.len() * dimensions);
    for (chunk, embedding) in records {
        if embedding.len() != dimensions {
            return Err(AppError::Index(format!(
                "Embedding dimension mismatch for chunk {}: expected {}, got {}",
                chunk.id,
                dimensions,
                embedding.len()
            )));
        }
        flat.extend_from_slice(embedding);
    }

    let ids = StringArray::from(records.iter().map(|(c, _)| c.id.as_str()).collect::<Vec<_>>());
    let documents = StringArray::from(
        records
            .iter()
            .map(|(c, _)| c.document.as_str())
            .collect::<Vec<_>>(),
    );
    let pages = UInt32Array::from(records.iter().map(|(c, _)| c.page).collect::<Vec<_>>());
    let seqs = UInt32Array::from(records.iter().map(|(c, _)| c.seq).collect::<Vec<_>>());
    let texts = StringArray::from(
        records
            .iter()
            .map(|(c, _)| c.text.as_str())
            .collect::<Vec<_>>(),
    );
    let embeddings = FixedSizeListArray::new(
        Arc::new(Field::new("item", DataType::Float32, true)),
        dimensions as i32,
        Arc::new(Float32Array::from(flat)),
        None,
    );

    RecordBatch::try_new(
        schema,
        vec![
            Arc::new(ids),
            Arc::new(documents),
            Arc::new(pages),
            Arc::new(seqs),
            Arc::new(texts),
            Arc::new(embeddings),
        ],
    )
    .map_err(|e| AppError::Index(format!("Failed to create RecordBatch: {}", e)))
}

/// Read-only handle to a persisted index.
pub struct IndexReader {
    table: Table,
    manifest: IndexManifest,
}

impl IndexReader {
    /// Open an existing index.
    ///
    /// Fails with [`AppError::IndexNotFound`] when no index exists at the
    /// location: a distinct "not ingested" condition, not a generic I/O
    /// error.
    pub async fn open(index_dir: &Path) -> AppResult<Self> {
        if !index_dir.exists() {
            return Err(AppError::IndexNotFound(index_dir.to_path_buf()));
        }

        let manifest = IndexManifest::load(index_dir)?;

        let uri = index_dir.to_string_lossy().to_string();
        let conn = lancedb::connect(&uri)
            .execute()
            .await
            .map_err(|e| AppError::Index(format!("Failed to connect to LanceDB: {}", e)))?;

        let table = conn
            .open_table(CHUNKS_TABLE)
            .execute()
            .await
            .map_err(|e| AppError::Index(format!("Failed to open chunks table: {}", e)))?;

        tracing::debug!("Opened index at {:?}", index_dir);

        Ok(Self { table, manifest })
    }

    /// The manifest recorded when this index was built.
    pub fn manifest(&self) -> &IndexManifest {
        &self.manifest
    }

    /// Number of chunk rows in the index.
    pub async fn chunk_count(&self) -> AppResult<u64> {
        let count = self
            .table
            .count_rows(None)
            .await
            .map_err(|e| AppError::Index(format!("Failed to count rows: {}", e)))?;
        Ok(count as u64)
    }

    /// Nearest-neighbor search, returning up to `top_k` chunks ordered by
    /// non-increasing cosine similarity.
    pub async fn search(
        &self,
        query_embedding: &[f32],
        top_k: usize,
    ) -> AppResult<Vec<ScoredChunk>> {
        if query_embedding.len() != self.manifest.dimensions {
            return Err(AppError::Index(format!(
                "Query embedding dimension mismatch: expected {}, got {}",
                self.manifest.dimensions,
                query_embedding.len()
            )));
        }

        use futures::TryStreamExt;

        let batches = self
            .table
            .query()
            .nearest_to(query_embedding.to_vec())
            .map_err(|e| AppError::Index(format!("Failed to create query: {}", e)))?
            .limit(top_k)
            .execute()
            .await
            .map_err(|e| AppError::Index(format!("Failed to execute search: {}", e)))?
            .try_collect::<Vec<_>>()
            .await
            .map_err(|e| AppError::Index(format!("Failed to collect results: {}", e)))?;

        let mut scored = Vec::new();
        for batch in &batches {
            for row in 0..batch.num_rows() {
                let (chunk, embedding) = row_to_chunk(batch, row)?;
                let score = cosine_similarity(query_embedding, &embedding);
                scored.push(ScoredChunk { chunk, score });
            }
        }

        scored.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        scored.truncate(top_k);

        tracing::debug!("Retrieved {} chunks (requested top-{})", scored.len(), top_k);

        Ok(scored)
    }
}

/// Convert one Arrow row back into a chunk plus its stored embedding.
fn row_to_chunk(batch: &RecordBatch, row: usize) -> AppResult<(DocumentChunk, Vec<f32>)> {
    let id = batch
        .column(0)
        .as_any()
        .downcast_ref::<StringArray>()
        .ok_or_else(|| AppError::Index("Invalid id column".to_string()))?
        .value(row)
        .to_string();

    let document = batch
        .column(1)
        .as_any()
        .downcast_ref::<StringArray>()
        .ok_or_else(|| AppError::Index("Invalid document column".to_string()))?
        .value(row)
        .to_string();

    let page = batch
        .column(2)
        .as_any()
        .downcast_ref::<UInt32Array>()
        .ok_or_else(|| AppError::Index("Invalid page column".to_string()))?
        .value(row);

    let seq = batch
        .column(3)
        .as_any()
        .downcast_ref::<UInt32Array>()
        .ok_or_else(|| AppError::Index("Invalid seq column".to_string()))?
        .value(row);

    let text = batch
        .column(4)
        .as_any()
        .downcast_ref::<StringArray>()
        .ok_or_else(|| AppError::Index("Invalid text column".to_string()))?
        .value(row)
        .to_string();

    let embedding_list = batch
        .column(5)
        .as_any()
        .downcast_ref::<FixedSizeListArray>()
        .ok_or_else(|| AppError::Index("Invalid embedding column".to_string()))?;

    let embedding_values = embedding_list.value(row);
    let embedding_values = embedding_values
        .as_any()
        .downcast_ref::<Float32Array>()
        .ok_or_else(|| AppError::Index("Invalid embedding values".to_string()))?;

    let embedding: Vec<f32> = (0..embedding_values.len())
        .map(|i| embedding_values.value(i))
        .collect();

    Ok((
        DocumentChunk {
            id,
            document,
            page,
            seq,
            text,
        },
        embedding,
    ))
}

/// Cosine similarity between two vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot_product / (norm_a * norm_b)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_manifest() -> IndexManifest {
        IndexManifest {
            provider: "mock".to_string(),
            model: "hash-embed-v1".to_string(),
            dimensions: 4,
            chunk_size: 1000,
            chunk_overlap: 200,
            chunk_count: 2,
            corpus_fingerprint: "abc".to_string(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_manifest_round_trip() {
        let temp = tempfile::TempDir::new().unwrap();
        let manifest = sample_manifest();
        manifest.save(temp.path()).unwrap();

        let loaded = IndexManifest::load(temp.path()).unwrap();
        assert_eq!(loaded.provider, "mock");
        assert_eq!(loaded.model, "hash-embed-v1");
        assert_eq!(loaded.dimensions, 4);
        assert_eq!(loaded.chunk_count, 2);
    }

    #[test]
    fn test_cosine_similarity() {
        assert!((cosine_similarity(&[1.0, 0.0], &[1.0, 0.0]) - 1.0).abs() < 1e-6);
        assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).abs() < 1e-6);
        assert!((cosine_similarity(&[1.0, 0.0], &[-1.0, 0.0]) + 1.0).abs() < 1e-6);
        assert_eq!(cosine_similarity(&[1.0], &[1.0, 2.0]), 0.0);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 2.0]), 0.0);
    }

    #[test]
    fn test_records_to_batch_dimension_check() {
        let schema = chunks_schema(4);
        let chunk = DocumentChunk {
            id: "1".to_string(),
            document: "guide.pdf".to_string(),
            page: 1,
            seq: 0,
            text: "text".to_string(),
        };

        let bad = records_to_batch(&[(chunk.clone(), vec![0.1; 3])], 4, schema.clone());
        assert!(bad.is_err());

        let good = records_to_batch(&[(chunk, vec![0.1; 4])], 4, schema).unwrap();
        assert_eq!(good.num_rows(), 1);
        assert_eq!(good.num_columns(), 6);
    }

    #[test]
    fn test_sibling_path() {
        let path = Path::new("/data/.mediquery/index");
        assert_eq!(
            sibling(path, "staging"),
            PathBuf::from("/data/.mediquery/index.staging")
        );
    }

    #[tokio::test]
    async fn test_open_missing_index_is_not_ingested() {
        let temp = tempfile::TempDir::new().unwrap();
        let missing = temp.path().join("never-built");

        match IndexReader::open(&missing).await {
            Err(AppError::IndexNotFound(path)) => assert_eq!(path, missing),
            other => panic!("Expected IndexNotFound, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_build_rejects_empty_records() {
        let temp = tempfile::TempDir::new().unwrap();
        let manifest = sample_manifest();

        let result = futures::executor::block_on(build_index(
            &temp.path().join("index"),
            &manifest,
            &[],
        ));
        assert!(result.is_err());
    }
}

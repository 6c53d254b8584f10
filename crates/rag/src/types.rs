//! RAG pipeline type definitions.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// One page of extracted text, tagged with its provenance.
///
/// The loader emits one of these per non-empty page of a source document.
/// Plain-text documents count as a single page 1.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageText {
    /// Source document path
    pub document: PathBuf,

    /// 1-based page number within the document
    pub page: u32,

    /// Extracted text for this page
    pub text: String,
}

/// A recovered per-file extraction failure.
///
/// The failing file is skipped; ingestion continues with the rest of the
/// corpus and reports these in the [`IngestReport`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoadWarning {
    /// File that failed to load
    pub path: PathBuf,

    /// Why it failed
    pub message: String,
}

/// A bounded, overlapping window of a document's text.
///
/// Immutable once created; its lifetime is bound to the index rebuild that
/// produced it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentChunk {
    /// Unique chunk identifier (UUID v4)
    pub id: String,

    /// Owning document path
    pub document: String,

    /// 1-based page number the chunk came from
    pub page: u32,

    /// Sequence index within the document
    pub seq: u32,

    /// Chunk text content
    pub text: String,
}

/// A retrieved chunk paired with its similarity score.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredChunk {
    /// The retrieved chunk
    pub chunk: DocumentChunk,

    /// Cosine similarity to the query (higher is more relevant)
    pub score: f32,
}

/// A deduplicated source citation backing an answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceRef {
    /// Source document path
    pub document: String,

    /// Page number within the document
    pub page: u32,

    /// Short excerpt of the supporting chunk
    pub excerpt: String,
}

/// Outcome of an ingestion run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestReport {
    /// Number of documents successfully loaded
    pub documents: u32,

    /// Number of pages extracted
    pub pages: u32,

    /// Number of chunks embedded and written to the index
    pub chunks_indexed: u32,

    /// Per-file extraction failures (recovered, files skipped)
    pub warnings: Vec<LoadWarning>,

    /// True when the corpus produced no chunks and the run was a no-op
    /// (any prior index is left untouched)
    pub skipped_empty: bool,

    /// Wall-clock duration in seconds
    pub duration_secs: f64,
}

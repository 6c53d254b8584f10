//! Retrieval-augmented answering over a document corpus.
//!
//! Two pipelines share one persisted vector index:
//! - **Ingestion** (offline, operator-triggered): loader → chunker →
//!   embedder → index build with atomic swap. See [`ingest`].
//! - **Answering** (online, per question): embed query → nearest-neighbor
//!   retrieval → grounded prompt → streamed answer with cited sources.
//!   See [`Retriever`] and [`answer`].

pub mod answer;
pub mod chunker;
pub mod embeddings;
pub mod index;
pub mod ingest;
pub mod loader;
pub mod retrieve;
pub mod types;

// Re-export commonly used types
pub use answer::{
    answer, answer_text, synthesize, AnswerOptions, AnswerOutcome, FragmentStream,
    GroundedAnswer, NO_CONTEXT_MESSAGE,
};
pub use embeddings::{create_provider, EmbeddingProvider};
pub use index::{IndexManifest, IndexReader};
pub use ingest::ingest;
pub use retrieve::Retriever;
pub use types::{
    DocumentChunk, IngestReport, LoadWarning, PageText, ScoredChunk, SourceRef,
};

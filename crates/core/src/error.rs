//! Error types for the Mediquery CLI.
//!
//! This module defines a unified error enum that covers all error categories
//! in the application: configuration, I/O, document loading, indexing, and
//! the external embedding/generation service boundaries.

use std::path::PathBuf;
use thiserror::Error;

/// Unified error type for the Mediquery CLI.
///
/// All functions in the application return `Result<T, AppError>`.
/// We never panic; errors must be represented and propagated.
///
/// Two conditions from the pipeline are deliberately NOT errors: an empty
/// corpus at ingestion time (reported as a no-op `IngestReport`) and
/// retrieval returning nothing relevant (a normal terminal outcome carrying
/// a canned message). Both are values, not `Err` paths.
#[derive(Error, Debug)]
pub enum AppError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O and filesystem errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Per-file text extraction failure. Recovered during ingestion
    /// (the file is skipped and the error aggregated into a warning list).
    #[error("Failed to load {path:?}: {message}")]
    Load { path: PathBuf, message: String },

    /// Query attempted before any ingestion. Kept distinct from generic
    /// I/O failure so callers can tell the user to ingest first.
    #[error("No index found at {0:?}. Run `mediquery ingest` first.")]
    IndexNotFound(PathBuf),

    /// Vector index errors (storage, schema, search)
    #[error("Index error: {0}")]
    Index(String),

    /// Embedding service failures (auth, rate limit, network)
    #[error("Embedding service error: {0}")]
    Embedding(String),

    /// Language model generation failures
    #[error("Generation error: {0}")]
    Generation(String),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Generic errors
    #[error("{0}")]
    Other(String),
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

impl From<serde_yaml::Error> for AppError {
    fn from(err: serde_yaml::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

/// Convenience type alias for Results with AppError.
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_index_not_found_display() {
        let err = AppError::IndexNotFound(PathBuf::from("/tmp/idx"));
        let msg = err.to_string();
        assert!(msg.contains("/tmp/idx"));
        assert!(msg.contains("ingest"));
    }

    #[test]
    fn test_load_error_display() {
        let err = AppError::Load {
            path: PathBuf::from("bad.pdf"),
            message: "not a PDF".to_string(),
        };
        assert!(err.to_string().contains("bad.pdf"));
    }
}

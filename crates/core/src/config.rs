//! Configuration management for the Mediquery CLI.
//!
//! This module handles loading and merging configuration from multiple
//! sources, in increasing precedence:
//! - Built-in defaults
//! - Config file (`mediquery.yaml`)
//! - Environment variables
//! - Command-line flags
//!
//! The resulting `AppConfig` is passed explicitly into every pipeline stage
//! (loader, chunker, indexer, retriever, synthesizer) so stages stay
//! independently testable with injected fakes. No stage reads the
//! environment on its own.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::{AppError, AppResult};

/// Default chunk size in characters.
pub const DEFAULT_CHUNK_SIZE: usize = 1000;

/// Default overlap between adjacent chunks in characters.
pub const DEFAULT_CHUNK_OVERLAP: usize = 200;

/// Default number of chunks retrieved per query.
pub const DEFAULT_TOP_K: usize = 5;

/// Main application configuration.
///
/// Holds everything the ingestion and answering pipelines need: where the
/// corpus lives, where the persisted index lives, which provider serves
/// embeddings and completions, and the chunking/retrieval parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Directory holding the source documents (PDFs)
    pub corpus_dir: PathBuf,

    /// Directory-rooted persistent vector index location
    pub index_dir: PathBuf,

    /// Optional config file path
    pub config_file: Option<PathBuf>,

    /// Provider for completions and embeddings ("ollama", "openai", "mock")
    pub provider: String,

    /// Completion model identifier
    pub model: String,

    /// Embedding model identifier. Must be the same model for indexing and
    /// querying; the index manifest enforces this at query time.
    pub embedding_model: String,

    /// Embedding vector dimension
    pub embedding_dimensions: usize,

    /// Optional custom provider endpoint URL
    pub endpoint: Option<String>,

    /// API key for providers that require one
    pub api_key: Option<String>,

    /// Chunk size in characters
    pub chunk_size: usize,

    /// Overlap between adjacent chunks in characters
    pub chunk_overlap: usize,

    /// Number of chunks retrieved per query
    pub top_k: usize,

    /// Log level override
    pub log_level: Option<String>,

    /// Verbose mode (enables debug logging)
    pub verbose: bool,

    /// Disable colored output
    pub no_color: bool,
}

/// Full configuration file structure (`mediquery.yaml`).
#[derive(Debug, Clone, Serialize, Deserialize)]
struct ConfigFile {
    corpus: Option<String>,
    index: Option<String>,
    llm: Option<LlmSection>,
    chunking: Option<ChunkingSection>,
    retrieval: Option<RetrievalSection>,
    logging: Option<LoggingSection>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct LlmSection {
    provider: Option<String>,
    model: Option<String>,
    #[serde(rename = "embeddingModel")]
    embedding_model: Option<String>,
    #[serde(rename = "embeddingDimensions")]
    embedding_dimensions: Option<usize>,
    endpoint: Option<String>,
    #[serde(rename = "apiKeyEnv")]
    api_key_env: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ChunkingSection {
    #[serde(rename = "chunkSize")]
    chunk_size: Option<usize>,
    #[serde(rename = "chunkOverlap")]
    chunk_overlap: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct RetrievalSection {
    #[serde(rename = "topK")]
    top_k: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct LoggingSection {
    level: Option<String>,
    color: Option<bool>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            corpus_dir: PathBuf::from("corpus"),
            index_dir: PathBuf::from(".mediquery/index"),
            config_file: None,
            provider: "ollama".to_string(), // Local-first default
            model: "llama3.2".to_string(),
            embedding_model: "nomic-embed-text".to_string(),
            embedding_dimensions: 768,
            endpoint: None,
            api_key: None,
            chunk_size: DEFAULT_CHUNK_SIZE,
            chunk_overlap: DEFAULT_CHUNK_OVERLAP,
            top_k: DEFAULT_TOP_K,
            log_level: None,
            verbose: false,
            no_color: false,
        }
    }
}

impl AppConfig {
    /// Load configuration from the config file and environment variables.
    ///
    /// Environment variables:
    /// - `MEDIQUERY_CORPUS`: Corpus directory
    /// - `MEDIQUERY_INDEX`: Index directory
    /// - `MEDIQUERY_CONFIG`: Path to config file
    /// - `MEDIQUERY_PROVIDER`: Provider name
    /// - `MEDIQUERY_MODEL`: Completion model
    /// - `MEDIQUERY_EMBEDDING_MODEL`: Embedding model
    /// - `MEDIQUERY_API_KEY`: API key
    /// - `RUST_LOG`: Log level
    /// - `NO_COLOR`: Disable colored output
    pub fn load() -> AppResult<Self> {
        let mut config = Self::default();

        if let Ok(config_file) = std::env::var("MEDIQUERY_CONFIG") {
            config.config_file = Some(PathBuf::from(config_file));
        }

        let config_path = config
            .config_file
            .clone()
            .unwrap_or_else(|| PathBuf::from("mediquery.yaml"));

        if config_path.exists() {
            config = config.merge_yaml(&config_path)?;
        }

        // Environment variables override the YAML config
        if let Ok(corpus) = std::env::var("MEDIQUERY_CORPUS") {
            config.corpus_dir = PathBuf::from(corpus);
        }

        if let Ok(index) = std::env::var("MEDIQUERY_INDEX") {
            config.index_dir = PathBuf::from(index);
        }

        if let Ok(provider) = std::env::var("MEDIQUERY_PROVIDER") {
            config.provider = provider;
        }

        if let Ok(model) = std::env::var("MEDIQUERY_MODEL") {
            config.model = model;
        }

        if let Ok(embedding_model) = std::env::var("MEDIQUERY_EMBEDDING_MODEL") {
            config.embedding_model = embedding_model;
        }

        if let Ok(key) = std::env::var("MEDIQUERY_API_KEY") {
            config.api_key = Some(key);
        }

        if config.log_level.is_none() {
            config.log_level = std::env::var("RUST_LOG").ok();
        }

        if std::env::var("NO_COLOR").is_ok() {
            config.no_color = true;
        }

        Ok(config)
    }

    /// Merge a YAML configuration file into this config.
    fn merge_yaml(&mut self, path: &PathBuf) -> AppResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            AppError::Config(format!("Failed to read config file {:?}: {}", path, e))
        })?;

        let config_file: ConfigFile = serde_yaml::from_str(&contents).map_err(|e| {
            AppError::Config(format!("Failed to parse config file {:?}: {}", path, e))
        })?;

        let mut result = self.clone();

        if let Some(corpus) = config_file.corpus {
            result.corpus_dir = PathBuf::from(corpus);
        }

        if let Some(index) = config_file.index {
            result.index_dir = PathBuf::from(index);
        }

        if let Some(llm) = config_file.llm {
            if let Some(provider) = llm.provider {
                result.provider = provider;
            }
            if let Some(model) = llm.model {
                result.model = model;
            }
            if let Some(embedding_model) = llm.embedding_model {
                result.embedding_model = embedding_model;
            }
            if let Some(dims) = llm.embedding_dimensions {
                result.embedding_dimensions = dims;
            }
            if let Some(endpoint) = llm.endpoint {
                result.endpoint = Some(endpoint);
            }
            if let Some(env_var) = llm.api_key_env {
                if let Ok(key) = std::env::var(&env_var) {
                    result.api_key = Some(key);
                }
            }
        }

        if let Some(chunking) = config_file.chunking {
            if let Some(size) = chunking.chunk_size {
                result.chunk_size = size;
            }
            if let Some(overlap) = chunking.chunk_overlap {
                result.chunk_overlap = overlap;
            }
        }

        if let Some(retrieval) = config_file.retrieval {
            if let Some(top_k) = retrieval.top_k {
                result.top_k = top_k;
            }
        }

        if let Some(logging) = config_file.logging {
            if let Some(level) = logging.level {
                result.log_level = Some(level);
            }
            if let Some(color) = logging.color {
                result.no_color = !color;
            }
        }

        Ok(result)
    }

    /// Apply CLI overrides to the configuration.
    ///
    /// CLI flags take precedence over environment variables and the config
    /// file.
    #[allow(clippy::too_many_arguments)]
    pub fn with_overrides(
        mut self,
        corpus_dir: Option<PathBuf>,
        index_dir: Option<PathBuf>,
        provider: Option<String>,
        model: Option<String>,
        log_level: Option<String>,
        verbose: bool,
        no_color: bool,
    ) -> Self {
        if let Some(corpus_dir) = corpus_dir {
            self.corpus_dir = corpus_dir;
        }

        if let Some(index_dir) = index_dir {
            self.index_dir = index_dir;
        }

        if let Some(provider) = provider {
            self.provider = provider;
        }

        if let Some(model) = model {
            self.model = model;
        }

        if let Some(log_level) = log_level {
            self.log_level = Some(log_level);
        }

        if verbose {
            self.verbose = true;
            // Verbose mode implies debug logging
            if self.log_level.is_none() {
                self.log_level = Some("debug".to_string());
            }
        }

        if no_color {
            self.no_color = true;
        }

        self
    }

    /// Validate configuration for the active provider and pipeline.
    pub fn validate(&self) -> AppResult<()> {
        let known_providers = ["ollama", "openai", "mock"];

        if !known_providers.contains(&self.provider.as_str()) {
            return Err(AppError::Config(format!(
                "Unknown provider: {}. Supported: {}",
                self.provider,
                known_providers.join(", ")
            )));
        }

        if self.provider == "openai" && self.resolve_api_key().is_none() {
            return Err(AppError::Config(
                "OpenAI provider requires an API key (MEDIQUERY_API_KEY or OPENAI_API_KEY)"
                    .to_string(),
            ));
        }

        if self.chunk_size == 0 {
            return Err(AppError::Config("chunk_size must be positive".to_string()));
        }

        if self.chunk_overlap >= self.chunk_size {
            return Err(AppError::Config(format!(
                "chunk_overlap ({}) must be smaller than chunk_size ({})",
                self.chunk_overlap, self.chunk_size
            )));
        }

        if self.top_k == 0 {
            return Err(AppError::Config("top_k must be positive".to_string()));
        }

        Ok(())
    }

    /// Resolve the API key for the active provider.
    ///
    /// Checks the explicit config value first, then the provider's
    /// conventional environment variable.
    pub fn resolve_api_key(&self) -> Option<String> {
        if let Some(ref key) = self.api_key {
            return Some(key.clone());
        }

        if self.provider == "openai" {
            return std::env::var("OPENAI_API_KEY").ok();
        }

        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.provider, "ollama");
        assert_eq!(config.chunk_size, 1000);
        assert_eq!(config.chunk_overlap, 200);
        assert_eq!(config.top_k, 5);
        assert!(!config.verbose);
    }

    #[test]
    fn test_with_overrides() {
        let config = AppConfig::default();
        let overridden = config.with_overrides(
            Some(PathBuf::from("docs")),
            None,
            Some("mock".to_string()),
            None,
            None,
            true,
            false,
        );

        assert_eq!(overridden.corpus_dir, PathBuf::from("docs"));
        assert_eq!(overridden.provider, "mock");
        assert!(overridden.verbose);
        assert_eq!(overridden.log_level, Some("debug".to_string()));
    }

    #[test]
    fn test_validate_unknown_provider() {
        let mut config = AppConfig::default();
        config.provider = "unknown".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_overlap_bound() {
        let mut config = AppConfig::default();
        config.chunk_overlap = config.chunk_size;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_ollama() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_merge_yaml() {
        let temp = tempfile::TempDir::new().unwrap();
        let path = temp.path().join("mediquery.yaml");
        std::fs::write(
            &path,
            r#"
corpus: guidelines
llm:
  provider: mock
  embeddingDimensions: 384
chunking:
  chunkSize: 500
  chunkOverlap: 100
retrieval:
  topK: 3
"#,
        )
        .unwrap();

        let merged = AppConfig::default().merge_yaml(&path).unwrap();
        assert_eq!(merged.corpus_dir, PathBuf::from("guidelines"));
        assert_eq!(merged.provider, "mock");
        assert_eq!(merged.embedding_dimensions, 384);
        assert_eq!(merged.chunk_size, 500);
        assert_eq!(merged.chunk_overlap, 100);
        assert_eq!(merged.top_k, 3);
    }
}

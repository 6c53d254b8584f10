//! Embedding providers for chunk and query vectors.
//!
//! The same provider and model MUST be used at indexing time and query
//! time, or retrieval quality silently degrades. The index manifest records
//! the provider/model/dimensions used at build time and the retriever
//! refuses to open an index with mismatched settings.

mod hash;
mod ollama;
mod openai;

pub use hash::HashEmbedder;
pub use ollama::OllamaEmbedder;
pub use openai::OpenAiEmbedder;

use mediquery_core::{AppConfig, AppError, AppResult};
use std::sync::Arc;

/// Trait for embedding providers.
#[async_trait::async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Get provider name (e.g., "ollama", "openai", "mock")
    fn provider_name(&self) -> &str;

    /// Get model identifier
    fn model_name(&self) -> &str;

    /// Get embedding dimensions
    fn dimensions(&self) -> usize;

    /// Generate embeddings for multiple texts in a batch.
    async fn embed_batch(&self, texts: &[String]) -> AppResult<Vec<Vec<f32>>>;

    /// Generate embedding for a single text (convenience method).
    async fn embed(&self, text: &str) -> AppResult<Vec<f32>> {
        let mut results = self.embed_batch(&[text.to_string()]).await?;
        results
            .pop()
            .ok_or_else(|| AppError::Embedding("No embedding returned".to_string()))
    }
}

/// Create an embedding provider from the application configuration.
pub fn create_provider(config: &AppConfig) -> AppResult<Arc<dyn EmbeddingProvider>> {
    match config.provider.as_str() {
        "ollama" => {
            let endpoint = config
                .endpoint
                .clone()
                .unwrap_or_else(|| "http://localhost:11434".to_string());
            Ok(Arc::new(OllamaEmbedder::new(
                endpoint,
                config.embedding_model.clone(),
                config.embedding_dimensions,
            )))
        }
        "openai" => {
            let api_key = config.resolve_api_key().ok_or_else(|| {
                AppError::Config("OpenAI provider requires an API key".to_string())
            })?;
            Ok(Arc::new(OpenAiEmbedder::new(
                api_key,
                config.endpoint.clone(),
                config.embedding_model.clone(),
                config.embedding_dimensions,
            )))
        }
        "mock" => Ok(Arc::new(HashEmbedder::new(config.embedding_dimensions))),
        _ => Err(AppError::Config(format!(
            "Unknown embedding provider: '{}'. Supported providers: ollama, openai, mock",
            config.provider
        ))),
    }
}

//! Mock LLM provider for testing and offline development.
//!
//! Returns scripted content instead of calling an external service. The
//! streaming path splits the scripted content into word-sized fragments so
//! consumers exercise real incremental delivery.

use crate::client::{LlmClient, LlmRequest, LlmResponse, LlmStream, LlmStreamChunk};
use mediquery_core::AppResult;

/// Mock client with a fixed scripted response.
pub struct MockClient {
    content: String,
}

impl MockClient {
    /// Create a mock client that answers every request with `content`.
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
        }
    }

    /// Create a mock client that echoes the request prompt back.
    ///
    /// Useful in tests that assert the assembled prompt contains the
    /// retrieved context.
    pub fn echo() -> Self {
        Self {
            content: String::new(),
        }
    }

    fn response_for(&self, request: &LlmRequest) -> String {
        if self.content.is_empty() {
            request.prompt.clone()
        } else {
            self.content.clone()
        }
    }
}

impl Default for MockClient {
    fn default() -> Self {
        Self::new("mock response")
    }
}

#[async_trait::async_trait]
impl LlmClient for MockClient {
    fn provider_name(&self) -> &str {
        "mock"
    }

    async fn complete(&self, request: &LlmRequest) -> AppResult<LlmResponse> {
        Ok(LlmResponse {
            content: self.response_for(request),
            model: request.model.clone(),
            done: true,
        })
    }

    async fn stream(&self, request: &LlmRequest) -> AppResult<LlmStream> {
        let content = self.response_for(request);

        let mut chunks: Vec<AppResult<LlmStreamChunk>> = content
            .split_inclusive(' ')
            .map(|fragment| {
                Ok(LlmStreamChunk {
                    content: fragment.to_string(),
                    done: false,
                })
            })
            .collect();

        chunks.push(Ok(LlmStreamChunk {
            content: String::new(),
            done: true,
        }));

        Ok(Box::pin(futures::stream::iter(chunks)))
    }
}

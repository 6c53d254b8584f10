//! Answer synthesis: grounded prompt assembly and streamed generation.
//!
//! Retrieved chunk texts are concatenated in retrieval order into a single
//! context block, embedded with the question into a fixed instruction
//! template that constrains the model to answer only from that context. The
//! answer is delivered as a forward-only stream of text fragments alongside
//! the deduplicated list of sources backing it.
//!
//! One query moves through: received → embedded → retrieved →
//! {no context found | context assembled → generating → completed}, with
//! failure reachable from any non-terminal step. The terminal outcomes are
//! the [`AnswerOutcome`] variants; failures are ordinary `Err` values.

use crate::retrieve::Retriever;
use crate::types::{ScoredChunk, SourceRef};
use futures::stream::{AbortHandle, Stream};
use futures::StreamExt;
use mediquery_core::AppResult;
use mediquery_llm::{LlmClient, LlmRequest};
use std::pin::Pin;
use std::sync::Arc;

/// Delimiter between chunk texts in the assembled context block.
pub const CONTEXT_DELIMITER: &str = "\n\n---\n\n";

/// Canned reply when retrieval finds nothing; the model is never invoked.
pub const NO_CONTEXT_MESSAGE: &str =
    "I couldn't find any relevant information in the provided documents.";

/// Characters of chunk text preserved as source evidence.
const EXCERPT_LENGTH: usize = 200;

/// Grounding template. The context block and question are substituted in;
/// the instruction forbids answering from outside knowledge.
const PROMPT_TEMPLATE: &str = "\
Answer the question based only on the following context:

{context}

---

Answer the question based on the above context: {question}";

const SYSTEM_PROMPT: &str = "\
You answer questions about clinical guidelines using only the context supplied \
in the prompt. Do not draw on outside knowledge. If the context does not \
contain the answer, say that you could not find this information in the \
available documents.";

/// Options for one answering run.
#[derive(Debug, Clone)]
pub struct AnswerOptions {
    /// Number of chunks retrieved into context
    pub top_k: usize,

    /// Completion model identifier
    pub model: String,

    /// Sampling temperature (0.0 keeps answers factual)
    pub temperature: f32,

    /// Maximum tokens to generate
    pub max_tokens: Option<u32>,
}

impl AnswerOptions {
    /// Defaults: top-5 retrieval, temperature 0.
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            top_k: 5,
            model: model.into(),
            temperature: 0.0,
            max_tokens: None,
        }
    }

    /// Set the number of chunks retrieved into context.
    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }
}

/// Stream of answer fragments in generation order.
///
/// Forward-only and consumed exactly once. If generation fails partway, the
/// consumer sees the fragments produced so far followed by an `Err` item.
pub type FragmentStream = Pin<Box<dyn Stream<Item = AppResult<String>> + Send>>;

/// A streaming answer with its supporting sources.
pub struct GroundedAnswer {
    /// Answer text fragments; their ordered concatenation is the answer
    pub fragments: FragmentStream,

    /// Cancellation handle: aborting ends the stream and drops the
    /// underlying generation request
    pub cancel: AbortHandle,

    /// Deduplicated (document, page) provenance, in retrieval order
    pub sources: Vec<SourceRef>,
}

/// Terminal outcome of one answering run.
pub enum AnswerOutcome {
    /// Retrieval found nothing; carries the canned message and the model
    /// was never invoked
    NoContext { message: String },

    /// Generation started; fragments stream as they arrive
    Answer(GroundedAnswer),
}

/// Answer a question with streamed output.
pub async fn answer(
    retriever: &Retriever,
    llm: Arc<dyn LlmClient>,
    question: &str,
    options: &AnswerOptions,
) -> AppResult<AnswerOutcome> {
    let results = retriever.retrieve(question, options.top_k).await?;
    synthesize(&results, llm, question, options).await
}

/// Synthesize a streamed answer from already-retrieved chunks.
///
/// An empty result set terminates with the canned no-context message; the
/// model is never invoked.
pub async fn synthesize(
    results: &[ScoredChunk],
    llm: Arc<dyn LlmClient>,
    question: &str,
    options: &AnswerOptions,
) -> AppResult<AnswerOutcome> {
    if results.is_empty() {
        return Ok(AnswerOutcome::NoContext {
            message: NO_CONTEXT_MESSAGE.to_string(),
        });
    }

    let sources = dedup_sources(results);
    let request = build_request(results, question, options).with_streaming();

    tracing::debug!("Starting grounded generation ({} context chunks)", results.len());
    let llm_stream = llm.stream(&request).await?;

    let fragments = llm_stream.filter_map(|item| {
        futures::future::ready(match item {
            Ok(chunk) if chunk.content.is_empty() => None,
            Ok(chunk) => Some(Ok(chunk.content)),
            Err(e) => Some(Err(e)),
        })
    });

    let (fragments, cancel) = futures::stream::abortable(fragments);

    Ok(AnswerOutcome::Answer(GroundedAnswer {
        fragments: Box::pin(fragments),
        cancel,
        sources,
    }))
}

/// Answer a question as a single completed string.
///
/// Returns the canned no-context message with an empty source list when
/// retrieval finds nothing.
pub async fn answer_text(
    retriever: &Retriever,
    llm: Arc<dyn LlmClient>,
    question: &str,
    options: &AnswerOptions,
) -> AppResult<(String, Vec<SourceRef>)> {
    let results = retriever.retrieve(question, options.top_k).await?;

    if results.is_empty() {
        return Ok((NO_CONTEXT_MESSAGE.to_string(), Vec::new()));
    }

    let sources = dedup_sources(&results);
    let request = build_request(&results, question, options);

    tracing::debug!("Starting grounded generation ({} context chunks)", results.len());
    let response = llm.complete(&request).await?;

    Ok((response.content, sources))
}

/// Build the grounded LLM request for a retrieved context.
fn build_request(results: &[ScoredChunk], question: &str, options: &AnswerOptions) -> LlmRequest {
    let context = build_context(results);
    let prompt = PROMPT_TEMPLATE
        .replace("{context}", &context)
        .replace("{question}", question);

    let mut request = LlmRequest::new(prompt, &options.model)
        .with_system(SYSTEM_PROMPT)
        .with_temperature(options.temperature);

    if let Some(max_tokens) = options.max_tokens {
        request = request.with_max_tokens(max_tokens);
    }

    request
}

/// Concatenate retrieved chunk texts, in retrieval order, into one context
/// block.
fn build_context(results: &[ScoredChunk]) -> String {
    results
        .iter()
        .map(|r| r.chunk.text.as_str())
        .collect::<Vec<_>>()
        .join(CONTEXT_DELIMITER)
}

/// Deduplicate retrieved chunks into displayable source references.
///
/// Keyed by (document, page), preserving retrieval order; each keeps an
/// excerpt of the first chunk seen for that key as evidence.
fn dedup_sources(results: &[ScoredChunk]) -> Vec<SourceRef> {
    let mut seen = std::collections::HashSet::new();
    let mut sources = Vec::new();

    for result in results {
        let key = (result.chunk.document.clone(), result.chunk.page);
        if seen.insert(key) {
            sources.push(SourceRef {
                document: result.chunk.document.clone(),
                page: result.chunk.page,
                excerpt: excerpt(&result.chunk.text, EXCERPT_LENGTH),
            });
        }
    }

    sources
}

/// First `max_chars` characters, truncated at a word boundary.
fn excerpt(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }

    let truncated: String = text.chars().take(max_chars).collect();
    match truncated.rfind(char::is_whitespace) {
        Some(last_space) => format!("{}...", &truncated[..last_space]),
        None => format!("{}...", truncated),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::DocumentChunk;

    fn scored(document: &str, page: u32, seq: u32, text: &str, score: f32) -> ScoredChunk {
        ScoredChunk {
            chunk: DocumentChunk {
                id: format!("{}-{}-{}", document, page, seq),
                document: document.to_string(),
                page,
                seq,
                text: text.to_string(),
            },
            score,
        }
    }

    #[test]
    fn test_build_context_uses_delimiter_in_order() {
        let results = vec![
            scored("a.pdf", 1, 0, "first chunk", 0.9),
            scored("b.pdf", 3, 0, "second chunk", 0.7),
        ];

        let context = build_context(&results);
        assert_eq!(context, "first chunk\n\n---\n\nsecond chunk");
    }

    #[test]
    fn test_build_request_embeds_context_and_question() {
        let results = vec![scored("a.pdf", 1, 0, "hydration monitoring guidance", 0.9)];
        let options = AnswerOptions::new("llama3.2");

        let request = build_request(&results, "What about exercise in heat?", &options);
        assert!(request.prompt.contains("hydration monitoring guidance"));
        assert!(request.prompt.contains("What about exercise in heat?"));
        assert!(request.prompt.contains("based only on the following context"));
        assert_eq!(request.temperature, Some(0.0));
        assert!(request.system.is_some());
    }

    #[test]
    fn test_dedup_sources_by_document_and_page() {
        let results = vec![
            scored("a.pdf", 1, 0, "chunk one", 0.9),
            scored("a.pdf", 1, 1, "chunk two", 0.8),
            scored("a.pdf", 2, 2, "chunk three", 0.7),
            scored("b.pdf", 1, 0, "chunk four", 0.6),
        ];

        let sources = dedup_sources(&results);
        assert_eq!(sources.len(), 3);
        assert_eq!(sources[0].document, "a.pdf");
        assert_eq!(sources[0].page, 1);
        assert_eq!(sources[0].excerpt, "chunk one");
        assert_eq!(sources[1].page, 2);
        assert_eq!(sources[2].document, "b.pdf");
    }

    #[test]
    fn test_excerpt_truncates_at_word_boundary() {
        let short = "short text";
        assert_eq!(excerpt(short, 200), "short text");

        let long = "this is a rather long passage that keeps going ".repeat(10);
        let result = excerpt(&long, 50);
        assert!(result.len() <= 53);
        assert!(result.ends_with("..."));
        assert!(!result[..result.len() - 3].ends_with(char::is_whitespace));
    }

    #[tokio::test]
    async fn test_synthesize_without_context_skips_the_model() {
        use mediquery_llm::providers::MockClient;

        let llm = Arc::new(MockClient::new("should never appear"));
        let options = AnswerOptions::new("mock-model");

        let outcome = synthesize(&[], llm, "anything", &options).await.unwrap();
        match outcome {
            AnswerOutcome::NoContext { message } => assert_eq!(message, NO_CONTEXT_MESSAGE),
            AnswerOutcome::Answer(_) => panic!("expected the canned no-context outcome"),
        }
    }

    #[tokio::test]
    async fn test_synthesize_streams_fragments() {
        use futures::StreamExt;
        use mediquery_llm::providers::MockClient;

        let results = vec![scored("a.pdf", 1, 0, "context text", 0.9)];
        let llm = Arc::new(MockClient::new("grounded reply"));
        let options = AnswerOptions::new("mock-model");

        let outcome = synthesize(&results, llm, "question", &options).await.unwrap();
        let mut grounded = match outcome {
            AnswerOutcome::Answer(grounded) => grounded,
            AnswerOutcome::NoContext { .. } => panic!("expected an answer"),
        };

        assert_eq!(grounded.sources.len(), 1);

        let mut collected = String::new();
        while let Some(fragment) = grounded.fragments.next().await {
            collected.push_str(&fragment.unwrap());
        }
        assert_eq!(collected, "grounded reply");
    }

    #[test]
    fn test_answer_options_defaults() {
        let options = AnswerOptions::new("gpt-4o-mini").with_top_k(3);
        assert_eq!(options.top_k, 3);
        assert_eq!(options.temperature, 0.0);
        assert!(options.max_tokens.is_none());
    }
}

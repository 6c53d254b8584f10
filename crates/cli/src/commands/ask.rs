//! Ask command handler.
//!
//! Retrieves relevant chunks for a question and streams the grounded
//! answer to stdout, followed by the deduplicated source list.

use clap::Args;
use futures::StreamExt;
use mediquery_core::{config::AppConfig, AppResult};
use mediquery_llm::{create_client, LlmClient};
use mediquery_rag::{
    answer, answer_text, create_provider, AnswerOptions, AnswerOutcome, Retriever, SourceRef,
};
use std::io::Write;
use std::sync::Arc;

/// Ask a question against the ingested corpus
#[derive(Args, Debug)]
pub struct AskCommand {
    /// The question to ask
    pub question: String,

    /// Number of chunks to retrieve into context
    #[arg(short = 'k', long)]
    pub top_k: Option<usize>,

    /// Maximum tokens in the answer
    #[arg(long)]
    pub max_tokens: Option<u32>,

    /// Disable streaming (print the answer once complete)
    #[arg(long)]
    pub no_stream: bool,

    /// Output as JSON (implies --no-stream)
    #[arg(long)]
    pub json: bool,
}

impl AskCommand {
    /// Execute the ask command.
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing ask command");

        let embedder = create_provider(config)?;
        let retriever = Retriever::open(&config.index_dir, embedder).await?;

        let api_key = config.resolve_api_key();
        let llm = create_client(&config.provider, config.endpoint.as_deref(), api_key.as_deref())?;

        let mut options =
            AnswerOptions::new(&config.model).with_top_k(self.top_k.unwrap_or(config.top_k));
        options.max_tokens = self.max_tokens;

        if self.json || self.no_stream {
            self.handle_complete(&retriever, llm, &options).await
        } else {
            self.handle_streaming(&retriever, llm, &options).await
        }
    }

    /// Collect the full answer before printing.
    async fn handle_complete(
        &self,
        retriever: &Retriever,
        llm: Arc<dyn LlmClient>,
        options: &AnswerOptions,
    ) -> AppResult<()> {
        let (text, sources) = answer_text(retriever, llm, &self.question, options).await?;

        if self.json {
            let output = serde_json::json!({
                "answer": text,
                "sources": sources,
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
            return Ok(());
        }

        println!("{}", text);
        print_sources(&sources);
        Ok(())
    }

    /// Stream fragments to stdout as they arrive.
    async fn handle_streaming(
        &self,
        retriever: &Retriever,
        llm: Arc<dyn LlmClient>,
        options: &AnswerOptions,
    ) -> AppResult<()> {
        let outcome = answer(retriever, llm, &self.question, options).await?;

        let mut grounded = match outcome {
            AnswerOutcome::NoContext { message } => {
                println!("{}", message);
                return Ok(());
            }
            AnswerOutcome::Answer(grounded) => grounded,
        };

        while let Some(fragment) = grounded.fragments.next().await {
            // A generation failure mid-stream leaves the partial answer on
            // screen and surfaces the error after it
            let fragment = fragment?;
            print!("{}", fragment);
            std::io::stdout().flush().ok();
        }
        println!();

        print_sources(&grounded.sources);
        Ok(())
    }
}

/// Print the deduplicated source list after an answer.
fn print_sources(sources: &[SourceRef]) {
    if sources.is_empty() {
        return;
    }

    println!();
    println!("Sources:");
    for source in sources {
        println!("- {} (page {})", source.document, source.page);
    }
}

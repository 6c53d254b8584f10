//! End-to-end pipeline tests: ingest a temp corpus with the offline hash
//! embedder, then answer questions against it with the mock LLM.

use futures::StreamExt;
use mediquery_core::{AppConfig, AppError};
use mediquery_llm::providers::MockClient;
use mediquery_rag::{
    answer, answer_text, create_provider, ingest, AnswerOptions, AnswerOutcome, Retriever,
};
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;

const HYDRATION_DOC: &str = "Exercise in hot environments requires additional hydration \
monitoring for patients with diabetes.";

fn test_config(root: &Path) -> AppConfig {
    let mut config = AppConfig::default();
    config.corpus_dir = root.join("corpus");
    config.index_dir = root.join("index");
    config.provider = "mock".to_string();
    config.embedding_dimensions = 384;
    config
}

#[tokio::test(flavor = "multi_thread")]
async fn ingest_then_answer_cites_the_document() {
    let temp = TempDir::new().unwrap();
    let config = test_config(temp.path());

    std::fs::create_dir_all(&config.corpus_dir).unwrap();
    std::fs::write(config.corpus_dir.join("heat.txt"), HYDRATION_DOC).unwrap();

    let embedder = create_provider(&config).unwrap();
    let report = ingest(&config, embedder.clone()).await.unwrap();

    assert_eq!(report.documents, 1);
    assert_eq!(report.chunks_indexed, 1);
    assert!(report.warnings.is_empty());
    assert!(!report.skipped_empty);

    let retriever = Retriever::open(&config.index_dir, embedder).await.unwrap();
    let results = retriever.retrieve("What about exercise in heat?", 5).await.unwrap();

    assert_eq!(results.len(), 1);
    assert!(results[0].chunk.text.contains("hydration monitoring"));
    assert!(results[0].chunk.document.ends_with("heat.txt"));
    assert_eq!(results[0].chunk.page, 1);

    // The mock echoes the grounded prompt back, so the synthesized answer
    // carries the retrieved evidence through to the caller.
    let llm = Arc::new(MockClient::echo());
    let options = AnswerOptions::new("mock-model");
    let (text, sources) = answer_text(&retriever, llm, "What about exercise in heat?", &options)
        .await
        .unwrap();

    assert!(text.contains("hydration monitoring"));
    assert_eq!(sources.len(), 1);
    assert!(sources[0].document.ends_with("heat.txt"));
    assert_eq!(sources[0].page, 1);
    assert!(sources[0].excerpt.contains("Exercise in hot environments"));
}

#[tokio::test(flavor = "multi_thread")]
async fn streaming_answer_delivers_fragments_and_sources() {
    let temp = TempDir::new().unwrap();
    let config = test_config(temp.path());

    std::fs::create_dir_all(&config.corpus_dir).unwrap();
    std::fs::write(config.corpus_dir.join("heat.txt"), HYDRATION_DOC).unwrap();

    let embedder = create_provider(&config).unwrap();
    ingest(&config, embedder.clone()).await.unwrap();

    let retriever = Retriever::open(&config.index_dir, embedder).await.unwrap();
    let llm = Arc::new(MockClient::new("monitor hydration closely during heat"));
    let options = AnswerOptions::new("mock-model");

    let outcome = answer(&retriever, llm, "What about exercise in heat?", &options)
        .await
        .unwrap();

    let mut grounded = match outcome {
        AnswerOutcome::Answer(grounded) => grounded,
        AnswerOutcome::NoContext { .. } => panic!("expected an answer"),
    };

    // Sources are available before the stream is consumed
    assert_eq!(grounded.sources.len(), 1);

    let mut fragment_count = 0;
    let mut collected = String::new();
    while let Some(fragment) = grounded.fragments.next().await {
        collected.push_str(&fragment.unwrap());
        fragment_count += 1;
    }

    assert!(fragment_count > 1, "expected incremental fragments");
    assert_eq!(collected, "monitor hydration closely during heat");
}

#[tokio::test(flavor = "multi_thread")]
async fn cancelled_stream_terminates_early() {
    let temp = TempDir::new().unwrap();
    let config = test_config(temp.path());

    std::fs::create_dir_all(&config.corpus_dir).unwrap();
    std::fs::write(config.corpus_dir.join("heat.txt"), HYDRATION_DOC).unwrap();

    let embedder = create_provider(&config).unwrap();
    ingest(&config, embedder.clone()).await.unwrap();

    let retriever = Retriever::open(&config.index_dir, embedder).await.unwrap();
    let llm = Arc::new(MockClient::new("a long answer that keeps going"));
    let options = AnswerOptions::new("mock-model");

    let outcome = answer(&retriever, llm, "exercise in heat", &options).await.unwrap();
    let mut grounded = match outcome {
        AnswerOutcome::Answer(grounded) => grounded,
        AnswerOutcome::NoContext { .. } => panic!("expected an answer"),
    };

    grounded.cancel.abort();
    assert!(grounded.fragments.next().await.is_none());
}

#[tokio::test(flavor = "multi_thread")]
async fn query_before_ingest_reports_not_ingested() {
    let temp = TempDir::new().unwrap();
    let config = test_config(temp.path());

    let embedder = create_provider(&config).unwrap();
    match Retriever::open(&config.index_dir, embedder).await {
        Err(AppError::IndexNotFound(path)) => assert_eq!(path, config.index_dir),
        Err(other) => panic!("expected IndexNotFound, got {}", other),
        Ok(_) => panic!("expected IndexNotFound"),
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn empty_corpus_is_a_noop_and_preserves_prior_index() {
    let temp = TempDir::new().unwrap();
    let mut config = test_config(temp.path());

    // Build a valid index first
    std::fs::create_dir_all(&config.corpus_dir).unwrap();
    std::fs::write(config.corpus_dir.join("heat.txt"), HYDRATION_DOC).unwrap();

    let embedder = create_provider(&config).unwrap();
    ingest(&config, embedder.clone()).await.unwrap();

    // Re-ingest from an empty directory: must report zero chunks and leave
    // the prior index queryable
    config.corpus_dir = temp.path().join("empty-corpus");
    std::fs::create_dir_all(&config.corpus_dir).unwrap();

    let report = ingest(&config, embedder.clone()).await.unwrap();
    assert_eq!(report.chunks_indexed, 0);
    assert!(report.skipped_empty);

    let retriever = Retriever::open(&config.index_dir, embedder).await.unwrap();
    assert_eq!(retriever.chunk_count().await.unwrap(), 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn reingestion_is_idempotent() {
    let temp = TempDir::new().unwrap();
    let config = test_config(temp.path());

    std::fs::create_dir_all(&config.corpus_dir).unwrap();
    std::fs::write(
        config.corpus_dir.join("guide.txt"),
        "Screen for retinopathy annually. ".repeat(120),
    )
    .unwrap();

    let embedder = create_provider(&config).unwrap();
    let first = ingest(&config, embedder.clone()).await.unwrap();
    let second = ingest(&config, embedder.clone()).await.unwrap();

    assert_eq!(first.chunks_indexed, second.chunks_indexed);

    // The index holds exactly one generation of chunks, no duplicates
    let retriever = Retriever::open(&config.index_dir, embedder).await.unwrap();
    assert_eq!(
        retriever.chunk_count().await.unwrap(),
        second.chunks_indexed as u64
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn corrupted_file_is_skipped_and_reported() {
    let temp = TempDir::new().unwrap();
    let config = test_config(temp.path());

    std::fs::create_dir_all(&config.corpus_dir).unwrap();
    std::fs::write(config.corpus_dir.join("broken.pdf"), b"garbage bytes").unwrap();
    std::fs::write(config.corpus_dir.join("valid.txt"), HYDRATION_DOC).unwrap();

    let embedder = create_provider(&config).unwrap();
    let report = ingest(&config, embedder).await.unwrap();

    assert_eq!(report.warnings.len(), 1);
    assert!(report.warnings[0].path.ends_with("broken.pdf"));
    assert_eq!(report.chunks_indexed, 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn retrieval_is_ordered_and_bounded() {
    let temp = TempDir::new().unwrap();
    let config = test_config(temp.path());

    std::fs::create_dir_all(&config.corpus_dir).unwrap();
    std::fs::write(config.corpus_dir.join("hydration.txt"), HYDRATION_DOC).unwrap();
    std::fs::write(
        config.corpus_dir.join("renal.txt"),
        "Annual renal screening uses the estimated glomerular filtration rate.",
    )
    .unwrap();
    std::fs::write(
        config.corpus_dir.join("billing.txt"),
        "Quarterly billing codes are submitted through the provincial portal.",
    )
    .unwrap();

    let embedder = create_provider(&config).unwrap();
    ingest(&config, embedder.clone()).await.unwrap();

    let retriever = Retriever::open(&config.index_dir, embedder).await.unwrap();
    let results = retriever
        .retrieve("hydration monitoring during exercise", 2)
        .await
        .unwrap();

    // Requesting k returns min(k, n) items in non-increasing score order
    assert_eq!(results.len(), 2);
    assert!(results[0].score >= results[1].score);
    assert!(results[0].chunk.document.ends_with("hydration.txt"));

    let all = retriever.retrieve("hydration", 10).await.unwrap();
    assert_eq!(all.len(), 3);
    for window in all.windows(2) {
        assert!(window[0].score >= window[1].score);
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn mismatched_embedding_settings_are_refused() {
    let temp = TempDir::new().unwrap();
    let config = test_config(temp.path());

    std::fs::create_dir_all(&config.corpus_dir).unwrap();
    std::fs::write(config.corpus_dir.join("heat.txt"), HYDRATION_DOC).unwrap();

    let embedder = create_provider(&config).unwrap();
    ingest(&config, embedder).await.unwrap();

    // Same provider, different dimensions: the index must refuse to open
    let mut altered = config.clone();
    altered.embedding_dimensions = 128;
    let altered_embedder = create_provider(&altered).unwrap();

    match Retriever::open(&config.index_dir, altered_embedder).await {
        Err(AppError::Config(message)) => assert!(message.contains("Re-run ingest")),
        Err(other) => panic!("expected a configuration error, got {}", other),
        Ok(_) => panic!("expected a configuration error"),
    }
}

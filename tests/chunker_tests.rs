//! End-to-end semantic chunker scenarios


use std::collections::HashMap;
use std::sync::Arc;

use futures::StreamExt;
use mockall::mock;
use serde_json::json;
use tokio_util::sync::CancellationToken;

use context_forge::{
    metadata_keys, ChunkerConfig, ContextError, EmbeddingProvider, MarkdownSplitter, Result,
    SemanticChunker, TextChunk, TiktokenTokenizer,
};
use test_helpers::{HashEmbedder, WhitespaceTokenizer};

async fn collect_chunks<E, T>(chunker: &SemanticChunker<E, T>, text: &str) -> Vec<TextChunk>
where
    E: EmbeddingProvider,
    T: context_forge::Tokenizer,
{
    chunker
        .chunk(text, CancellationToken::new())
        .map(|r| r.expect("chunking succeeds"))
        .collect()
        .await
}

#[tokio::test]
async fn test_basic_document_with_default_options() {
    test_helpers::init_tracing();
    let tokenizer = Arc::new(TiktokenTokenizer::for_model("cl100k_base").unwrap());
    let chunker =
        SemanticChunker::new(Arc::new(HashEmbedder), tokenizer, ChunkerConfig::default()).unwrap();

    let input = "Technology shapes our world. Software evolves. AI advances. Business adapts.";
    let chunks = collect_chunks(&chunker, input).await;

    assert!(!chunks.is_empty() && chunks.len() <= 4);
    for chunk in &chunks {
        let tokens = chunk.token_count();
        assert!(tokens <= 512);
        assert!(tokens >= 10 || chunk.is_fallback() || chunks.len() == 1);
        assert!(chunk.segment_count() >= 1);
    }

    // Every sentence is covered by some chunk.
    let combined: String = chunks
        .iter()
        .map(|c| c.text.as_str())
        .collect::<Vec<_>>()
        .join(" ");
    for sentence in [
        "Technology shapes our world.",
        "Software evolves.",
        "AI advances.",
        "Business adapts.",
    ] {
        assert!(combined.contains(sentence), "missing: {sentence}");
    }
}

#[tokio::test]
async fn test_chunking_empty_input() {
    let chunker = SemanticChunker::new(
        Arc::new(HashEmbedder),
        Arc::new(WhitespaceTokenizer),
        ChunkerConfig::default(),
    )
    .unwrap();

    assert!(collect_chunks(&chunker, "").await.is_empty());
    assert!(collect_chunks(&chunker, " \n\t  ").await.is_empty());
}

#[tokio::test]
async fn test_rechunking_is_idempotent() {
    let config = ChunkerConfig {
        min_tokens_per_chunk: 3,
        max_tokens_per_chunk: 24,
        ..ChunkerConfig::default()
    };
    let chunker = SemanticChunker::new(
        Arc::new(HashEmbedder),
        Arc::new(WhitespaceTokenizer),
        config,
    )
    .unwrap();

    let input = "Compilers transform source code. Gardens need regular watering. \
        Type systems catch mistakes early. Tomatoes ripen in late summer. \
        Borrow checking prevents data races. Basil grows well beside them.";

    let first = collect_chunks(&chunker, input).await;
    let second = collect_chunks(&chunker, input).await;
    assert_eq!(first, second);
    assert!(first.len() > 1);
}

#[tokio::test]
async fn test_chunks_are_ordered_subsequence_of_input() {
    let config = ChunkerConfig {
        min_tokens_per_chunk: 2,
        max_tokens_per_chunk: 12,
        ..ChunkerConfig::default()
    };
    let chunker = SemanticChunker::new(
        Arc::new(HashEmbedder),
        Arc::new(WhitespaceTokenizer),
        config,
    )
    .unwrap();

    let input = "Alpha one two. Beta three four. Gamma five six. Delta seven eight. \
        Epsilon nine ten. Zeta eleven twelve.";
    let chunks = collect_chunks(&chunker, input).await;

    // Chunk spans advance monotonically and never overlap.
    for pair in chunks.windows(2) {
        assert!(pair[0].end <= pair[1].start);
    }
    // Each chunk's text is made of input sentences in source order.
    for chunk in &chunks {
        assert!(chunk.start < chunk.end);
        assert!(chunk.end <= input.len());
    }
}

#[tokio::test]
async fn test_markdown_document_chunking() {
    let config = ChunkerConfig {
        min_tokens_per_chunk: 1,
        max_tokens_per_chunk: 64,
        ..ChunkerConfig::default()
    };
    let chunker = SemanticChunker::new(
        Arc::new(HashEmbedder),
        Arc::new(WhitespaceTokenizer),
        config,
    )
    .unwrap()
    .with_splitter(Box::new(MarkdownSplitter::new()));

    let input = "# Release notes\n\n- faster startup\n- lower memory use\n\n\
        The scheduler was rewritten. Latency dropped sharply.\n";
    let chunks = collect_chunks(&chunker, input).await;

    assert!(!chunks.is_empty());
    let combined: String = chunks
        .iter()
        .map(|c| c.text.as_str())
        .collect::<Vec<_>>()
        .join(" ");
    assert!(combined.contains("# Release notes"));
    assert!(combined.contains("- faster startup"));
    assert!(combined.contains("The scheduler was rewritten."));
}

#[tokio::test]
async fn test_document_metadata_flows_into_chunks() {
    let config = ChunkerConfig {
        min_tokens_per_chunk: 1,
        max_tokens_per_chunk: 64,
        ..ChunkerConfig::default()
    };
    let chunker = SemanticChunker::new(
        Arc::new(HashEmbedder),
        Arc::new(WhitespaceTokenizer),
        config,
    )
    .unwrap();

    let mut metadata = HashMap::new();
    metadata.insert("DocumentId".to_string(), json!("doc-42"));
    metadata.insert(metadata_keys::SEGMENT_COUNT.to_string(), json!("bogus"));

    let chunks: Vec<TextChunk> = chunker
        .chunk_document(
            "One short sentence. Another short sentence.",
            metadata,
            CancellationToken::new(),
        )
        .map(|r| r.unwrap())
        .collect()
        .await;

    for chunk in &chunks {
        assert_eq!(chunk.metadata.get("DocumentId").unwrap(), &json!("doc-42"));
        // Reserved keys always hold the chunker's own values.
        assert!(chunk.metadata[metadata_keys::SEGMENT_COUNT].is_u64());
        assert_eq!(
            chunk.metadata[metadata_keys::TOKEN_COUNT].as_u64().unwrap() as usize,
            chunk.token_count()
        );
    }
}

mock! {
    pub FlakyEmbedder {}

    #[async_trait::async_trait]
    impl EmbeddingProvider for FlakyEmbedder {
        async fn embed(&self, text: &str) -> Result<Vec<f32>>;
        fn dimension(&self) -> usize;
    }
}

#[tokio::test]
async fn test_provider_error_propagates_unchanged() {
    let mut embedder = MockFlakyEmbedder::new();
    embedder.expect_embed().returning(|_| {
        Err(ContextError::provider(std::io::Error::other(
            "backend exploded",
        )))
    });

    let chunker = SemanticChunker::new(
        Arc::new(embedder),
        Arc::new(WhitespaceTokenizer),
        ChunkerConfig::default(),
    )
    .unwrap();

    let mut stream = chunker.chunk(
        "First sentence here. Second sentence there.",
        CancellationToken::new(),
    );
    let first = stream.next().await.unwrap();
    match first {
        Err(ContextError::Provider { source }) => {
            assert!(source.to_string().contains("backend exploded"));
        }
        other => panic!("expected provider failure, got {other:?}"),
    }
}

#[tokio::test]
async fn test_cancellation_stops_the_stream() {
    let chunker = SemanticChunker::new(
        Arc::new(HashEmbedder),
        Arc::new(WhitespaceTokenizer),
        ChunkerConfig::default(),
    )
    .unwrap();

    let cancel = CancellationToken::new();
    cancel.cancel();
    let mut stream = chunker.chunk("Something here. Something else.", cancel);
    assert!(matches!(
        stream.next().await.unwrap(),
        Err(ContextError::Cancelled)
    ));
}

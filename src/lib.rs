//! Context Forge
//!
//! A library core for constructing AI-conversation and retrieval
//! contexts. Given a stream of documents or role-tagged chat messages
//! and a user query, it produces an ordered, token-budget-bounded
//! subset of content that is both relevant to the query and diverse
//! enough to avoid redundancy, with optional temporal bias toward
//! recent items.
//!
//! The core building blocks:
//! - Semantic chunking with embedding-similarity breakpoint detection
//! - A bounded, concurrent content-addressed embedding cache
//! - Maximum marginal relevance (MMR) selection
//! - Freshness-weighted, token-budgeted context rendering
//! - A generic multi-scorer ranking engine
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use context_forge::{ContextRenderer, RenderOptions, TiktokenTokenizer};
//! use tokio_util::sync::CancellationToken;
//!
//! # use context_forge::{EmbeddingProvider, Result};
//! # struct MyEmbedder;
//! # #[async_trait::async_trait]
//! # impl EmbeddingProvider for MyEmbedder {
//! #     async fn embed(&self, _: &str) -> Result<Vec<f32>> { Ok(vec![0.0; 8]) }
//! #     fn dimension(&self) -> usize { 8 }
//! # }
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let tokenizer = Arc::new(TiktokenTokenizer::for_model("cl100k_base")?);
//!     let mut renderer = ContextRenderer::builder(Arc::new(MyEmbedder), tokenizer).build();
//!
//!     renderer.add("The deployment runbook lives in ops/runbook.md.").await?;
//!     renderer.add("Rollbacks are performed with the release CLI.").await?;
//!
//!     let context = renderer
//!         .render("how do I roll back?", &RenderOptions::default(), &CancellationToken::new())
//!         .await?;
//!     for item in context {
//!         println!("{}", item.content);
//!     }
//!     Ok(())
//! }
//! ```

pub mod cache;
pub mod chunker;
pub mod clock;
pub mod config;
pub mod embedding;
pub mod error;
pub mod message;
pub mod mmr;
pub mod ranking;
pub mod renderer;
pub mod similarity;
pub mod splitter;
pub mod store;
pub mod tokenizer;

// Re-export main types
pub use cache::{CacheStats, EmbeddingCache, DEFAULT_MAX_CACHE_SIZE};
pub use chunker::{metadata_keys, SemanticChunker, TextChunk};
pub use clock::{system_clock, Clock, ManualClock, SystemClock};
pub use config::{CacheConfig, ChunkerConfig, ContextConfig, RendererConfig};
pub use embedding::EmbeddingProvider;
pub use error::{ContextError, ProviderError, Result};
pub use message::{
    assistant_message, system_message, user_message, ChatMessage, MessagePart, Role,
};
pub use mmr::mmr_select;
pub use ranking::{
    EmbeddingSimilarityScorer, RankedResult, RankingEngine, RankingStrategy, RecencyScorer,
    ScoreNormalizer, ScoringFunction, WeightedScorer, DEFAULT_HYBRID_ALPHA, DEFAULT_RRF_K,
};
pub use renderer::{ContextRenderer, ContextRendererBuilder, RenderOptions};
pub use similarity::{
    cosine_distance, cosine_similarity, distance_stats, find_breakpoints, percentile,
    DistanceStats,
};
pub use splitter::{
    MarkdownSplitter, SentenceSplitter, TextSegment, TextSplitter, DEFAULT_SENTENCE_PATTERN,
};
pub use store::{ContextItem, ContextStore};
pub use tokenizer::{TiktokenTokenizer, Tokenizer, SUPPORTED_ENCODINGS};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

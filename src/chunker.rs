//! Streaming semantic chunker
//!
//! Splits a document into token-bounded chunks whose boundaries follow
//! shifts in embedding similarity between neighboring sentence groups.

use async_stream::try_stream;
use futures::stream::BoxStream;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::cache::EmbeddingCache;
use crate::config::ChunkerConfig;
use crate::embedding::EmbeddingProvider;
use crate::error::{ContextError, Result};
use crate::similarity::{cosine_distance, distance_stats, find_breakpoints, percentile};
use crate::splitter::{SentenceSplitter, TextSegment, TextSplitter};
use crate::tokenizer::Tokenizer;

/// Reserved chunk metadata keys (case-sensitive)
pub mod metadata_keys {
    /// Token count of the chunk text (integer)
    pub const TOKEN_COUNT: &str = "TokenCount";
    /// Number of source segments in the chunk (integer)
    pub const SEGMENT_COUNT: &str = "SegmentCount";
    /// Present and true only when a fallback branch produced the chunk
    pub const IS_FALLBACK: &str = "IsFallback";
}

/// A contiguous, token-bounded emission from the chunker
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextChunk {
    pub text: String,
    pub start: usize,
    pub end: usize,
    pub metadata: HashMap<String, Value>,
}

impl TextChunk {
    pub fn token_count(&self) -> usize {
        self.metadata
            .get(metadata_keys::TOKEN_COUNT)
            .and_then(Value::as_u64)
            .unwrap_or(0) as usize
    }

    pub fn segment_count(&self) -> usize {
        self.metadata
            .get(metadata_keys::SEGMENT_COUNT)
            .and_then(Value::as_u64)
            .unwrap_or(0) as usize
    }

    pub fn is_fallback(&self) -> bool {
        self.metadata
            .get(metadata_keys::IS_FALLBACK)
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }
}

/// A buffered window of segments embedded as one unit
struct SentenceGroup {
    /// Center segment this window was built around; breakpoints between
    /// groups cut the segment stream at the anchors
    anchor: usize,
    combined: String,
    embedding: Option<Arc<Vec<f32>>>,
}

/// A candidate chunk during size enforcement
#[derive(Clone)]
struct Piece {
    first: usize,
    last: usize,
    text: String,
    start: usize,
    end: usize,
    tokens: usize,
    fallback: bool,
}

/// Semantic chunker over an embedding provider and a tokenizer
///
/// Generic at the boundary so the hot path stays monomorphic. A single
/// instance is not meant to be shared across concurrent mutators; the
/// entry points take `&self` and each call builds fresh state, so
/// re-calling on the same input restarts the stream.
pub struct SemanticChunker<E, T> {
    embedder: Arc<E>,
    tokenizer: Arc<T>,
    splitter: Box<dyn TextSplitter>,
    config: ChunkerConfig,
    cache: Option<Arc<EmbeddingCache>>,
}

impl<E, T> SemanticChunker<E, T>
where
    E: EmbeddingProvider,
    T: Tokenizer,
{
    /// Create a chunker with the default sentence splitter
    pub fn new(embedder: Arc<E>, tokenizer: Arc<T>, config: ChunkerConfig) -> Result<Self> {
        config.validate()?;
        let cache = if config.enable_embedding_caching {
            Some(Arc::new(EmbeddingCache::new(config.max_cache_size)?))
        } else {
            None
        };
        Ok(Self {
            embedder,
            tokenizer,
            splitter: Box::new(SentenceSplitter::new()),
            config,
            cache,
        })
    }

    /// Replace the splitter (e.g. with [`crate::splitter::MarkdownSplitter`])
    pub fn with_splitter(mut self, splitter: Box<dyn TextSplitter>) -> Self {
        self.splitter = splitter;
        self
    }

    /// Share an externally owned embedding cache
    pub fn with_shared_cache(mut self, cache: Arc<EmbeddingCache>) -> Self {
        if self.config.enable_embedding_caching {
            self.cache = Some(cache);
        }
        self
    }

    /// The cache consulted for group embeddings, if caching is enabled
    pub fn cache(&self) -> Option<&Arc<EmbeddingCache>> {
        self.cache.as_ref()
    }

    pub fn config(&self) -> &ChunkerConfig {
        &self.config
    }

    /// Chunk a document, yielding chunks lazily in source order
    pub fn chunk<'a>(
        &'a self,
        text: &'a str,
        cancel: CancellationToken,
    ) -> BoxStream<'a, Result<TextChunk>> {
        self.chunk_document(text, HashMap::new(), cancel)
    }

    /// Chunk a document, seeding every chunk's metadata with
    /// caller-supplied keys
    ///
    /// Reserved keys (`TokenCount`, `SegmentCount`, `IsFallback`) always
    /// reflect the chunker's own values; caller entries under those
    /// names are overwritten. All other caller keys are preserved.
    pub fn chunk_document<'a>(
        &'a self,
        text: &'a str,
        metadata: HashMap<String, Value>,
        cancel: CancellationToken,
    ) -> BoxStream<'a, Result<TextChunk>> {
        Box::pin(try_stream! {
            if text.trim().is_empty() {
                return;
            }

            // (a) Split into segments, observing cancellation between them.
            let mut segments: Vec<TextSegment> = Vec::new();
            {
                let mut segment_stream = self.splitter.split(text, cancel.clone());
                while let Some(segment) = segment_stream.next().await {
                    segments.push(segment?);
                }
            }
            if segments.is_empty() {
                return;
            }
            let n = segments.len();

            // (b)+(c) Sliding sentence groups with pre-flight size check.
            let mut groups = self.build_groups(&segments)?;
            debug!(segments = n, groups = groups.len(), "Formed sentence groups");

            // (d) Embed each group, cache first.
            for group in groups.iter_mut() {
                if cancel.is_cancelled() {
                    Err(ContextError::Cancelled)?;
                }
                group.embedding = Some(self.embed_group(&group.combined).await?);
            }

            // (e)-(g) Distances, threshold, breakpoints.
            let distances: Vec<f32> = groups
                .windows(2)
                .map(|pair| {
                    let a = pair[0].embedding.as_deref().expect("group embedded");
                    let b = pair[1].embedding.as_deref().expect("group embedded");
                    cosine_distance(a, b)
                })
                .collect();

            let cuts: Vec<usize> = if distances.len() < 2 {
                // Degenerate percentile: no breakpoints, token-greedy
                // packing below does the work.
                warn!("Fewer than two group distances, falling back to token-greedy chunking");
                Vec::new()
            } else {
                let threshold =
                    percentile(&distances, self.config.breakpoint_percentile_threshold)?;
                let breakpoints = find_breakpoints(&distances, threshold);
                let stats = distance_stats(&distances);
                debug!(
                    threshold,
                    breakpoints = breakpoints.len(),
                    mean = stats.mean,
                    spread = stats.std_dev,
                    "Computed breakpoint threshold"
                );
                breakpoints
                    .into_iter()
                    .map(|j| groups[j + 1].anchor)
                    .filter(|&cut| cut > 0 && cut < n)
                    .collect::<BTreeSet<_>>()
                    .into_iter()
                    .collect()
            };

            // (h) Candidate chunks between cut positions.
            let mut starts = vec![0usize];
            starts.extend(&cuts);
            let mut pieces: Vec<Piece> = Vec::new();
            for (i, &first) in starts.iter().enumerate() {
                let last = starts.get(i + 1).copied().unwrap_or(n);
                // (i) part one: hard upper bound via greedy splitting.
                pieces.extend(self.split_to_size(&segments, first, last)?);
            }

            // (i) part two: minimum bound via forward merge. Emission
            // runs one piece behind so an undersized tail can still
            // fold into the chunk before it.
            let min = self.config.min_tokens_per_chunk;
            let max = self.config.max_tokens_per_chunk;
            let mut emitted = 0usize;
            let mut held: Option<Piece> = None;
            let mut idx = 0usize;
            while idx < pieces.len() {
                let piece = pieces[idx].clone();
                if !piece.fallback && piece.tokens < min {
                    if idx + 1 < pieces.len() {
                        // Merge into the following candidate when the
                        // merge stays within the bound; drop otherwise.
                        let next = &pieces[idx + 1];
                        let merged = self.build_piece(&segments, piece.first, next.last)?;
                        if merged.tokens <= max {
                            pieces[idx + 1] = merged;
                        } else {
                            warn!(tokens = piece.tokens, "Dropped undersized chunk");
                        }
                        idx += 1;
                        continue;
                    }
                    // Tail piece with no following candidate: fold it
                    // into the held chunk when possible.
                    match held.take() {
                        Some(previous) => {
                            let merged =
                                self.build_piece(&segments, previous.first, piece.last)?;
                            if merged.tokens <= max && !previous.fallback {
                                held = Some(merged);
                            } else {
                                held = Some(previous);
                                warn!(tokens = piece.tokens, "Dropped undersized trailing chunk");
                            }
                        }
                        None => {
                            // Sole chunk for the input.
                            held = Some(Piece { fallback: true, ..piece });
                        }
                    }
                    idx += 1;
                    continue;
                }

                if let Some(previous) = held.replace(piece) {
                    if cancel.is_cancelled() {
                        Err(ContextError::Cancelled)?;
                    }
                    yield self.finalize(previous, &metadata, false);
                    emitted += 1;
                }
                idx += 1;
            }

            if let Some(last) = held {
                if cancel.is_cancelled() {
                    Err(ContextError::Cancelled)?;
                }
                yield self.finalize(last, &metadata, false);
                emitted += 1;
            }

            info!(chunks = emitted, "Chunking complete");
        })
    }

    /// Sliding windows around each segment, split pre-flight so no group
    /// exceeds the chunk token bound before it reaches the provider
    fn build_groups(&self, segments: &[TextSegment]) -> Result<Vec<SentenceGroup>> {
        let n = segments.len();
        let buffer = self.config.buffer_size;
        let max = self.config.max_tokens_per_chunk;
        let mut groups = Vec::with_capacity(n);

        for i in 0..n {
            let first = i.saturating_sub(buffer);
            let last = (i + buffer + 1).min(n);
            let combined = join_texts(segments, first, last);
            let tokens = self.tokenizer.count_tokens(&combined)?;

            if tokens <= max {
                groups.push(SentenceGroup {
                    anchor: i,
                    combined,
                    embedding: None,
                });
                continue;
            }

            // Maximal prefix subgroups, each within the bound. A single
            // segment over the bound stays as its own group.
            let mut run_start = first;
            let mut j = first;
            while j < last {
                let candidate = join_texts(segments, run_start, j + 1);
                if self.tokenizer.count_tokens(&candidate)? <= max {
                    j += 1;
                    continue;
                }
                if run_start == j {
                    groups.push(SentenceGroup {
                        anchor: j,
                        combined: candidate,
                        embedding: None,
                    });
                    j += 1;
                } else {
                    groups.push(SentenceGroup {
                        anchor: i.clamp(run_start, j - 1),
                        combined: join_texts(segments, run_start, j),
                        embedding: None,
                    });
                }
                run_start = j;
            }
            if run_start < last {
                groups.push(SentenceGroup {
                    anchor: i.clamp(run_start, last - 1),
                    combined: join_texts(segments, run_start, last),
                    embedding: None,
                });
            }
        }

        Ok(groups)
    }

    async fn embed_group(&self, combined: &str) -> Result<Arc<Vec<f32>>> {
        if let Some(cache) = &self.cache {
            if let Some(hit) = cache.try_get(combined) {
                return Ok(hit);
            }
        }
        let vector = self.embedder.embed(combined).await?;
        if let Some(cache) = &self.cache {
            cache.store(combined, vector.clone());
        }
        Ok(Arc::new(vector))
    }

    fn build_piece(&self, segments: &[TextSegment], first: usize, last: usize) -> Result<Piece> {
        let text = join_texts(segments, first, last);
        let tokens = self.tokenizer.count_tokens(&text)?;
        Ok(Piece {
            first,
            last,
            text,
            start: segments[first].start,
            end: segments[last - 1].end,
            tokens,
            fallback: false,
        })
    }

    /// Split a candidate greedily by segments so every piece stays
    /// within the token bound; a lone oversized segment becomes a
    /// fallback piece
    fn split_to_size(
        &self,
        segments: &[TextSegment],
        first: usize,
        last: usize,
    ) -> Result<Vec<Piece>> {
        let max = self.config.max_tokens_per_chunk;
        let mut pieces = Vec::new();
        let mut run_start = first;
        let mut j = first;

        while j < last {
            let text = join_texts(segments, run_start, j + 1);
            let tokens = self.tokenizer.count_tokens(&text)?;
            if tokens <= max {
                j += 1;
                continue;
            }
            if run_start == j {
                pieces.push(Piece {
                    first: j,
                    last: j + 1,
                    text,
                    start: segments[j].start,
                    end: segments[j].end,
                    tokens,
                    fallback: true,
                });
                j += 1;
            } else {
                pieces.push(self.build_piece(segments, run_start, j)?);
            }
            run_start = j;
        }
        if run_start < last {
            pieces.push(self.build_piece(segments, run_start, last)?);
        }

        Ok(pieces)
    }

    fn finalize(
        &self,
        piece: Piece,
        base_metadata: &HashMap<String, Value>,
        force_fallback: bool,
    ) -> TextChunk {
        let mut metadata = base_metadata.clone();
        metadata.insert(metadata_keys::TOKEN_COUNT.to_string(), json!(piece.tokens));
        metadata.insert(
            metadata_keys::SEGMENT_COUNT.to_string(),
            json!(piece.last - piece.first),
        );
        if piece.fallback || force_fallback {
            metadata.insert(metadata_keys::IS_FALLBACK.to_string(), json!(true));
        } else {
            // Reserved key: present only when true.
            metadata.remove(metadata_keys::IS_FALLBACK);
        }

        TextChunk {
            text: piece.text,
            start: piece.start,
            end: piece.end,
            metadata,
        }
    }
}

fn join_texts(segments: &[TextSegment], first: usize, last: usize) -> String {
    segments[first..last]
        .iter()
        .map(|s| s.text.as_str())
        .collect::<Vec<_>>()
        .join(" ")
}

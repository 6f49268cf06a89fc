//! Freshness-weighted context rendering
//!
//! Composes the item store, the MMR kernel, and the tokenizer contract
//! into the final query-to-context pipeline: embed the query, bias item
//! embeddings toward recency, select with MMR, filter by token budget,
//! and return the survivors in chronological order.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use uuid::Uuid;

use crate::cache::EmbeddingCache;
use crate::clock::{system_clock, Clock};
use crate::config::RendererConfig;
use crate::embedding::EmbeddingProvider;
use crate::error::{ContextError, Result};
use crate::message::ChatMessage;
use crate::mmr::mmr_select;
use crate::store::{ContextItem, ContextStore};
use crate::tokenizer::Tokenizer;

/// Per-call rendering options
#[derive(Debug, Clone)]
pub struct RenderOptions {
    /// Upper bound on the summed token counts of returned items
    pub token_budget: Option<usize>,
    /// Relevance/diversity tradeoff passed to MMR
    pub lambda: f32,
    /// Pull toward recent items, in [0, 1]
    pub freshness_weight: f32,
    /// Return items in MMR selection order instead of chronological
    pub preserve_mmr_order: bool,
}

impl Default for RenderOptions {
    fn default() -> Self {
        RendererConfig::default().into()
    }
}

impl From<RendererConfig> for RenderOptions {
    fn from(config: RendererConfig) -> Self {
        Self {
            token_budget: config.token_budget,
            lambda: config.lambda,
            freshness_weight: config.freshness_weight,
            preserve_mmr_order: false,
        }
    }
}

impl RenderOptions {
    fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.lambda) || self.lambda.is_nan() {
            return Err(ContextError::InvalidArgument(format!(
                "lambda must be in [0, 1], got {}",
                self.lambda
            )));
        }
        if !(0.0..=1.0).contains(&self.freshness_weight) || self.freshness_weight.is_nan() {
            return Err(ContextError::InvalidArgument(format!(
                "freshness_weight must be in [0, 1], got {}",
                self.freshness_weight
            )));
        }
        if self.token_budget == Some(0) {
            return Err(ContextError::InvalidArgument(
                "token_budget must be positive when present".to_string(),
            ));
        }
        Ok(())
    }
}

/// Renders a token-budgeted, relevance-and-diversity balanced context
pub struct ContextRenderer<E, T> {
    store: ContextStore,
    embedder: Arc<E>,
    tokenizer: Arc<T>,
    cache: Option<Arc<EmbeddingCache>>,
}

/// Builder for [`ContextRenderer`]
pub struct ContextRendererBuilder<E, T> {
    embedder: Arc<E>,
    tokenizer: Arc<T>,
    clock: Arc<dyn Clock>,
    cache: Option<Arc<EmbeddingCache>>,
}

impl<E, T> ContextRendererBuilder<E, T>
where
    E: EmbeddingProvider,
    T: Tokenizer,
{
    pub fn new(embedder: Arc<E>, tokenizer: Arc<T>) -> Self {
        Self {
            embedder,
            tokenizer,
            clock: system_clock(),
            cache: None,
        }
    }

    /// Replace the wall clock (tests inject a manual clock here)
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Consult and populate a shared embedding cache for queries and
    /// added content
    pub fn cache(mut self, cache: Arc<EmbeddingCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn build(self) -> ContextRenderer<E, T> {
        ContextRenderer {
            store: ContextStore::with_clock(self.clock),
            embedder: self.embedder,
            tokenizer: self.tokenizer,
            cache: self.cache,
        }
    }
}

impl<E, T> ContextRenderer<E, T>
where
    E: EmbeddingProvider,
    T: Tokenizer,
{
    pub fn builder(embedder: Arc<E>, tokenizer: Arc<T>) -> ContextRendererBuilder<E, T> {
        ContextRendererBuilder::new(embedder, tokenizer)
    }

    /// Embed, count, and append a piece of content to the store
    pub async fn add(&mut self, content: &str) -> Result<Uuid> {
        let embedding = self.embed_text(content).await?;
        let token_count = self.tokenizer.count_tokens(content)?;
        self.store.add(content, embedding, token_count)
    }

    /// Same as [`add`](Self::add) with an explicit timestamp
    pub async fn add_with_timestamp(
        &mut self,
        content: &str,
        timestamp: DateTime<Utc>,
    ) -> Result<Uuid> {
        let embedding = self.embed_text(content).await?;
        let token_count = self.tokenizer.count_tokens(content)?;
        self.store
            .add_with_timestamp(content, embedding, token_count, timestamp)
    }

    /// Append a chat message in flattened `role: text` form
    pub async fn add_message(&mut self, message: &ChatMessage) -> Result<Uuid> {
        let flattened = message.flatten();
        self.add(&flattened).await
    }

    pub fn store(&self) -> &ContextStore {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut ContextStore {
        &mut self.store
    }

    /// Render a context for a plain query string
    pub async fn render(
        &self,
        query: &str,
        options: &RenderOptions,
        cancel: &CancellationToken,
    ) -> Result<Vec<ContextItem>> {
        options.validate()?;
        if query.trim().is_empty() {
            return Err(ContextError::InvalidQuery(
                "query must not be empty or whitespace".to_string(),
            ));
        }
        if self.store.is_empty() {
            return Ok(Vec::new());
        }
        if cancel.is_cancelled() {
            return Err(ContextError::Cancelled);
        }

        let query_embedding = self.embed_text(query).await?;
        let items = self.store.items();

        // Freshness boost: pull recent items' effective embeddings
        // toward the query. Stored embeddings stay untouched.
        let boosted = boost_embeddings(items, &query_embedding, options.freshness_weight);

        let selection = mmr_select(&boosted, &query_embedding, options.lambda, None)?;
        debug!(selected = selection.len(), "MMR selection done");

        let mut kept: Vec<usize> = Vec::with_capacity(selection.len());
        match options.token_budget {
            None => kept.extend(selection.iter().map(|(i, _)| *i)),
            Some(budget) => {
                // Greedy accumulation in selection order; a later,
                // smaller item may still fit, so no early abort.
                let mut total = 0usize;
                for (i, _) in &selection {
                    let cost = items[*i].token_count;
                    if total + cost <= budget {
                        total += cost;
                        kept.push(*i);
                    }
                }
                debug!(total_tokens = total, budget, "Applied token budget");
            }
        }

        if !options.preserve_mmr_order {
            // Chronological final order preserves the temporal sense of
            // the context once selection has done the semantic work.
            kept.sort_by(|a, b| {
                items[*a]
                    .timestamp
                    .cmp(&items[*b].timestamp)
                    .then(a.cmp(b))
            });
        }

        let result: Vec<ContextItem> = kept.into_iter().map(|i| items[i].clone()).collect();
        info!(
            items = result.len(),
            of = self.store.len(),
            "Rendered context"
        );
        Ok(result)
    }

    /// Render a context for a sequence of role-tagged messages
    ///
    /// Messages flatten to `role: content` lines; non-textual parts are
    /// ignored and empty messages still contribute an (empty) line.
    pub async fn render_messages(
        &self,
        messages: &[ChatMessage],
        options: &RenderOptions,
        cancel: &CancellationToken,
    ) -> Result<Vec<ContextItem>> {
        let flattened: Vec<String> = messages.iter().map(ChatMessage::flatten).collect();
        let query = flattened.join("\n");
        self.render(&query, options, cancel).await
    }

    async fn embed_text(&self, text: &str) -> Result<Vec<f32>> {
        if let Some(cache) = &self.cache {
            if let Some(hit) = cache.try_get(text) {
                return Ok(hit.as_ref().clone());
            }
        }
        let vector = self.embedder.embed(text).await?;
        if let Some(cache) = &self.cache {
            cache.store(text, vector.clone());
        }
        Ok(vector)
    }
}

/// Compute per-item boosted embeddings `(1 - b) * e + b * q`
///
/// `b = freshness_weight * (1 - age)` with age normalized over the
/// store's time range. A zero time range or zero weight skips boosting;
/// a dimension mismatch with the query leaves that item unboosted.
fn boost_embeddings(
    items: &[ContextItem],
    query: &[f32],
    freshness_weight: f32,
) -> Vec<Vec<f32>> {
    let originals: Vec<Vec<f32>> = items.iter().map(|i| i.embedding.as_ref().clone()).collect();
    if freshness_weight == 0.0 || items.len() < 2 {
        return originals;
    }

    let t_max = items.iter().map(|i| i.timestamp).max().expect("non-empty");
    let t_min = items.iter().map(|i| i.timestamp).min().expect("non-empty");
    let range_ms = (t_max - t_min).num_milliseconds();
    if range_ms == 0 {
        return originals;
    }

    items
        .iter()
        .zip(originals)
        .map(|(item, embedding)| {
            if embedding.len() != query.len() {
                return embedding;
            }
            let age = (t_max - item.timestamp).num_milliseconds() as f32 / range_ms as f32;
            let beta = freshness_weight * (1.0 - age);
            embedding
                .iter()
                .zip(query.iter())
                .map(|(e, q)| (1.0 - beta) * e + beta * q)
                .collect()
        })
        .collect()
}

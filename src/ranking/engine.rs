//! Ranking engine orchestration

use serde::Serialize;
use std::collections::HashMap;
use tracing::{debug, info};

use crate::error::{ContextError, Result};

use super::{RankingStrategy, ScoreNormalizer, WeightedScorer};

/// One ranked item with its fused and per-scorer scores
///
/// `rank` is 1-based and dense over the returned subset; the
/// per-scorer map holds normalized scores.
#[derive(Debug, Clone, Serialize)]
pub struct RankedResult<I> {
    pub item: I,
    pub final_score: f64,
    pub individual_scores: HashMap<String, f64>,
    pub rank: usize,
}

/// Multi-scorer, multi-normalizer, multi-strategy ranking engine
#[derive(Debug, Clone, Default)]
pub struct RankingEngine {
    default_normalizer: ScoreNormalizer,
    strategy: RankingStrategy,
}

impl RankingEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Normalizer used for scorers without a per-scorer override
    pub fn with_default_normalizer(mut self, normalizer: ScoreNormalizer) -> Self {
        self.default_normalizer = normalizer;
        self
    }

    /// Strategy used when the caller does not pass one explicitly
    pub fn with_strategy(mut self, strategy: RankingStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Rank every item with the engine's configured strategy
    pub fn rank<I: Clone>(
        &self,
        items: &[I],
        scorers: &[WeightedScorer<I>],
    ) -> Result<Vec<RankedResult<I>>> {
        self.rank_with_strategy(items, scorers, &self.strategy)
    }

    /// Rank every item with an explicit strategy
    pub fn rank_with_strategy<I: Clone>(
        &self,
        items: &[I],
        scorers: &[WeightedScorer<I>],
        strategy: &RankingStrategy,
    ) -> Result<Vec<RankedResult<I>>> {
        if items.is_empty() {
            return Ok(Vec::new());
        }

        // One batch call per scorer, then normalize each column with
        // its override or the engine default.
        let mut columns: Vec<Vec<f64>> = Vec::with_capacity(scorers.len());
        let mut weights: Vec<f64> = Vec::with_capacity(scorers.len());
        let mut names: Vec<String> = Vec::with_capacity(scorers.len());

        for weighted in scorers {
            let raw = weighted.scorer.score_batch(items);
            if raw.len() != items.len() {
                return Err(ContextError::InvalidArgument(format!(
                    "scorer '{}' returned {} scores for {} items",
                    weighted.scorer.name(),
                    raw.len(),
                    items.len()
                )));
            }
            let normalizer = weighted.normalizer.unwrap_or(self.default_normalizer);
            columns.push(normalizer.normalize(&raw));
            weights.push(weighted.weight);
            names.push(weighted.scorer.name().to_string());
        }
        debug!(scorers = scorers.len(), items = items.len(), "Scored batches");

        let final_scores = strategy.fuse(&columns, &weights, items.len());

        let mut order: Vec<usize> = (0..items.len()).collect();
        // Stable descending sort on the fused score.
        order.sort_by(|a, b| {
            final_scores[*b]
                .partial_cmp(&final_scores[*a])
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        let results: Vec<RankedResult<I>> = order
            .into_iter()
            .enumerate()
            .map(|(position, index)| {
                let individual_scores = names
                    .iter()
                    .zip(&columns)
                    .map(|(name, column)| (name.clone(), column[index]))
                    .collect();
                RankedResult {
                    item: items[index].clone(),
                    final_score: final_scores[index],
                    individual_scores,
                    rank: position + 1,
                }
            })
            .collect();

        info!(results = results.len(), "Ranking complete");
        Ok(results)
    }

    /// Rank and keep the top `k` results
    ///
    /// Produces exactly `rank(...)` truncated to `k`, with the same
    /// dense 1-based ranks.
    pub fn rank_top_k<I: Clone>(
        &self,
        items: &[I],
        scorers: &[WeightedScorer<I>],
        k: usize,
    ) -> Result<Vec<RankedResult<I>>> {
        self.rank_top_k_with_strategy(items, scorers, k, &self.strategy)
    }

    pub fn rank_top_k_with_strategy<I: Clone>(
        &self,
        items: &[I],
        scorers: &[WeightedScorer<I>],
        k: usize,
        strategy: &RankingStrategy,
    ) -> Result<Vec<RankedResult<I>>> {
        let mut results = self.rank_with_strategy(items, scorers, strategy)?;
        results.truncate(k);
        Ok(results)
    }
}

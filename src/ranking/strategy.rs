//! Score fusion strategies

use serde::{Deserialize, Serialize};

/// RRF smoothing constant
pub const DEFAULT_RRF_K: f64 = 60.0;

/// Hybrid blend between weighted-sum and RRF
pub const DEFAULT_HYBRID_ALPHA: f64 = 0.5;

/// How per-scorer normalized scores combine into one final score
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RankingStrategy {
    /// `final = sum_k(w_k * norm_k)`
    WeightedSum,
    /// `final = sum_k(w_k / (k_constant + rank_k))` with 1-based
    /// descending ranks per scorer
    ReciprocalRankFusion { k: f64 },
    /// `final = alpha * weighted_sum + (1 - alpha) * rrf`
    Hybrid { alpha: f64 },
}

impl Default for RankingStrategy {
    fn default() -> Self {
        RankingStrategy::WeightedSum
    }
}

impl RankingStrategy {
    pub fn reciprocal_rank_fusion() -> Self {
        RankingStrategy::ReciprocalRankFusion { k: DEFAULT_RRF_K }
    }

    pub fn hybrid() -> Self {
        RankingStrategy::Hybrid {
            alpha: DEFAULT_HYBRID_ALPHA,
        }
    }

    /// Fuse per-scorer normalized score columns into final scores
    ///
    /// `columns[k]` holds scorer `k`'s normalized scores for every
    /// item; `weights[k]` is its signed weight.
    pub(crate) fn fuse(&self, columns: &[Vec<f64>], weights: &[f64], item_count: usize) -> Vec<f64> {
        match self {
            RankingStrategy::WeightedSum => weighted_sum(columns, weights, item_count),
            RankingStrategy::ReciprocalRankFusion { k } => rrf(columns, weights, item_count, *k),
            RankingStrategy::Hybrid { alpha } => {
                let ws = weighted_sum(columns, weights, item_count);
                let rr = rrf(columns, weights, item_count, DEFAULT_RRF_K);
                ws.into_iter()
                    .zip(rr)
                    .map(|(a, b)| alpha * a + (1.0 - alpha) * b)
                    .collect()
            }
        }
    }
}

fn weighted_sum(columns: &[Vec<f64>], weights: &[f64], item_count: usize) -> Vec<f64> {
    let mut totals = vec![0.0f64; item_count];
    for (column, weight) in columns.iter().zip(weights) {
        for (total, score) in totals.iter_mut().zip(column) {
            *total += weight * score;
        }
    }
    totals
}

/// 1-based descending ranks over one scorer's column, ties broken by
/// original index for determinism
fn descending_ranks(column: &[f64]) -> Vec<usize> {
    let mut order: Vec<usize> = (0..column.len()).collect();
    order.sort_by(|a, b| column[*b].total_cmp(&column[*a]).then(a.cmp(b)));

    let mut ranks = vec![0usize; column.len()];
    for (position, index) in order.into_iter().enumerate() {
        ranks[index] = position + 1;
    }
    ranks
}

fn rrf(columns: &[Vec<f64>], weights: &[f64], item_count: usize, k: f64) -> Vec<f64> {
    let mut totals = vec![0.0f64; item_count];
    for (column, weight) in columns.iter().zip(weights) {
        let ranks = descending_ranks(column);
        for (total, rank) in totals.iter_mut().zip(ranks) {
            *total += weight / (k + rank as f64);
        }
    }
    totals
}

//! Maximum marginal relevance selection kernel
//!
//! Pure CPU kernel: no await points, runs to completion once invoked.

use tracing::debug;

use crate::error::{ContextError, Result};
use crate::similarity::cosine_similarity;

/// Greedily select vectors balancing query relevance against diversity
///
/// Each round picks the remaining index maximizing
/// `lambda * rel + (1 - lambda) * (1 - avg_sim_to_selected)`, where the
/// average similarity over an empty selection is 0. Results come back
/// in selection order. Exact score ties prefer the candidate with the
/// larger diversity component, then the smaller original index.
/// Non-finite scores lose every comparison.
pub fn mmr_select<'a>(
    vectors: &'a [Vec<f32>],
    query: &[f32],
    lambda: f32,
    top_k: Option<usize>,
) -> Result<Vec<(usize, &'a Vec<f32>)>> {
    if !(0.0..=1.0).contains(&lambda) || lambda.is_nan() {
        return Err(ContextError::InvalidArgument(format!(
            "lambda must be in [0, 1], got {lambda}"
        )));
    }

    let n = vectors.len();
    if n == 0 || top_k == Some(0) {
        return Ok(Vec::new());
    }
    let k = top_k.unwrap_or(n).min(n);

    // One query pass up front; the selection loop never re-embeds it.
    let relevance: Vec<f32> = vectors
        .iter()
        .map(|v| cosine_similarity(v, query))
        .collect();

    let mut remaining = vec![true; n];
    // Running sum of similarity to everything selected so far, updated
    // incrementally so no n x n matrix is materialized.
    let mut sim_sum = vec![0.0f32; n];
    let mut selected: Vec<usize> = Vec::with_capacity(k);

    while selected.len() < k {
        let mut best: Option<(usize, f32, f32)> = None;

        for i in 0..n {
            if !remaining[i] {
                continue;
            }
            let avg_sim = if selected.is_empty() {
                0.0
            } else {
                sim_sum[i] / selected.len() as f32
            };
            let mut diversity = (1.0 - lambda) * (1.0 - avg_sim);
            if !diversity.is_finite() {
                diversity = f32::NEG_INFINITY;
            }
            let mut score = lambda * relevance[i] + diversity;
            if !score.is_finite() {
                score = f32::NEG_INFINITY;
            }

            best = match best {
                None => Some((i, score, diversity)),
                Some((_, best_score, best_diversity))
                    if score > best_score
                        || (score == best_score && diversity > best_diversity) =>
                {
                    Some((i, score, diversity))
                }
                other => other,
            };
        }

        let Some((winner, _, _)) = best else { break };
        remaining[winner] = false;
        for i in 0..n {
            if remaining[i] {
                sim_sum[i] += cosine_similarity(&vectors[i], &vectors[winner]);
            }
        }
        selected.push(winner);
    }

    debug!(selected = selected.len(), candidates = n, "MMR selection complete");
    Ok(selected.into_iter().map(|i| (i, &vectors[i])).collect())
}

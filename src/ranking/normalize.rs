//! Score normalizers

use serde::{Deserialize, Serialize};

/// Normalization applied to one scorer's raw output before fusion
///
/// All variants are stable on constant inputs, and all treat non-finite
/// raw values as the minimum finite value in the batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreNormalizer {
    /// `(x - min) / (max - min)`; all zeros when `max == min`
    #[default]
    MinMax,
    /// `(x - mean) / stddev`; all zeros when `stddev == 0`
    ZScore,
    /// Rank-based, mapped linearly onto [0, 1]; ties share the average
    /// rank
    Percentile,
}

impl ScoreNormalizer {
    pub fn normalize(&self, scores: &[f64]) -> Vec<f64> {
        if scores.is_empty() {
            return Vec::new();
        }
        let scores = sanitize(scores);
        match self {
            ScoreNormalizer::MinMax => min_max(&scores),
            ScoreNormalizer::ZScore => z_score(&scores),
            ScoreNormalizer::Percentile => percentile_ranks(&scores),
        }
    }
}

/// Replace non-finite values with the batch's minimum finite value
fn sanitize(scores: &[f64]) -> Vec<f64> {
    let min = scores
        .iter()
        .copied()
        .filter(|x| x.is_finite())
        .fold(f64::INFINITY, f64::min);
    if !min.is_finite() {
        // Nothing finite in the batch at all.
        return vec![0.0; scores.len()];
    }
    scores
        .iter()
        .map(|x| if x.is_finite() { *x } else { min })
        .collect()
}

fn min_max(scores: &[f64]) -> Vec<f64> {
    let min = scores.iter().copied().fold(f64::INFINITY, f64::min);
    let max = scores.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if max == min {
        return vec![0.0; scores.len()];
    }
    scores.iter().map(|x| (x - min) / (max - min)).collect()
}

fn z_score(scores: &[f64]) -> Vec<f64> {
    let n = scores.len() as f64;
    let mean = scores.iter().sum::<f64>() / n;
    let variance = scores.iter().map(|x| (x - mean) * (x - mean)).sum::<f64>() / n;
    let std_dev = variance.sqrt();
    if std_dev == 0.0 {
        return vec![0.0; scores.len()];
    }
    scores.iter().map(|x| (x - mean) / std_dev).collect()
}

fn percentile_ranks(scores: &[f64]) -> Vec<f64> {
    let n = scores.len();
    if n == 1 {
        return vec![0.5];
    }

    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|a, b| scores[*a].total_cmp(&scores[*b]));

    // Ascending 1-based ranks with ties sharing the average rank.
    let mut ranks = vec![0.0f64; n];
    let mut i = 0;
    while i < n {
        let mut j = i;
        while j + 1 < n && scores[order[j + 1]] == scores[order[i]] {
            j += 1;
        }
        let average_rank = (i + j) as f64 / 2.0 + 1.0;
        for &index in &order[i..=j] {
            ranks[index] = average_rank;
        }
        i = j + 1;
    }

    ranks
        .into_iter()
        .map(|r| (r - 1.0) / (n as f64 - 1.0))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_min_max_bounds() {
        let out = ScoreNormalizer::MinMax.normalize(&[10.0, 20.0, 15.0]);
        assert!(approx(out[0], 0.0));
        assert!(approx(out[1], 1.0));
        assert!(approx(out[2], 0.5));
    }

    #[test]
    fn test_min_max_constant_input() {
        let out = ScoreNormalizer::MinMax.normalize(&[5.0, 5.0, 5.0]);
        assert_eq!(out, vec![0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_z_score() {
        let out = ScoreNormalizer::ZScore.normalize(&[1.0, 2.0, 3.0]);
        assert!(approx(out[1], 0.0));
        assert!(approx(out[0], -out[2]));
        assert!(out[2] > 1.2 && out[2] < 1.3);
    }

    #[test]
    fn test_z_score_constant_input() {
        let out = ScoreNormalizer::ZScore.normalize(&[4.0, 4.0]);
        assert_eq!(out, vec![0.0, 0.0]);
    }

    #[test]
    fn test_percentile_ranks_with_ties() {
        let out = ScoreNormalizer::Percentile.normalize(&[1.0, 2.0, 2.0, 3.0]);
        // Ranks: 1, 2.5, 2.5, 4 mapped onto [0, 1].
        assert!(approx(out[0], 0.0));
        assert!(approx(out[1], 0.5));
        assert!(approx(out[2], 0.5));
        assert!(approx(out[3], 1.0));
    }

    #[test]
    fn test_non_finite_treated_as_minimum() {
        let out = ScoreNormalizer::MinMax.normalize(&[f64::NAN, 1.0, 3.0]);
        assert!(approx(out[0], 0.0));
        assert!(approx(out[1], 0.0));
        assert!(approx(out[2], 1.0));

        let out = ScoreNormalizer::Percentile.normalize(&[f64::INFINITY, 2.0, 1.0]);
        // Infinity collapses to the minimum (1.0), tying with index 2.
        assert!(approx(out[1], 1.0));
        assert!(approx(out[0], out[2]));
    }

    #[test]
    fn test_empty_input() {
        assert!(ScoreNormalizer::MinMax.normalize(&[]).is_empty());
        assert!(ScoreNormalizer::ZScore.normalize(&[]).is_empty());
        assert!(ScoreNormalizer::Percentile.normalize(&[]).is_empty());
    }
}

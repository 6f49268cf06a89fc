//! Vector similarity kernel and distance statistics

use crate::error::{ContextError, Result};
use serde::Serialize;

/// Cosine similarity between two dense vectors
///
/// Mismatched lengths, empty vectors, and zero-norm vectors all yield
/// 0.0 rather than an error.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.is_empty() || a.len() != b.len() {
        return 0.0;
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot_product / (norm_a * norm_b)
}

/// Cosine distance, `1 - cosine_similarity`
pub fn cosine_distance(a: &[f32], b: &[f32]) -> f32 {
    1.0 - cosine_similarity(a, b)
}

/// Linear-interpolation percentile over the finite values of `xs`
///
/// `p` must be within `[0, 1]`. An empty input (after filtering
/// non-finite values) yields 0.0.
pub fn percentile(xs: &[f32], p: f64) -> Result<f32> {
    if !(0.0..=1.0).contains(&p) || p.is_nan() {
        return Err(ContextError::InvalidArgument(format!(
            "percentile must be in [0, 1], got {p}"
        )));
    }

    let mut sorted: Vec<f32> = xs.iter().copied().filter(|x| x.is_finite()).collect();
    if sorted.is_empty() {
        return Ok(0.0);
    }
    sorted.sort_by(|a, b| a.total_cmp(b));

    let rank = p * (sorted.len() - 1) as f64;
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;
    if lower == upper {
        return Ok(sorted[lower]);
    }

    let weight = (rank - lower as f64) as f32;
    Ok(sorted[lower] + (sorted[upper] - sorted[lower]) * weight)
}

/// Summary statistics over a set of distances
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DistanceStats {
    pub mean: f32,
    pub min: f32,
    pub max: f32,
    pub std_dev: f32,
}

impl DistanceStats {
    pub const ZERO: DistanceStats = DistanceStats {
        mean: 0.0,
        min: 0.0,
        max: 0.0,
        std_dev: 0.0,
    };
}

/// Mean/min/max/stddev over the finite values of `xs`
pub fn distance_stats(xs: &[f32]) -> DistanceStats {
    let finite: Vec<f32> = xs.iter().copied().filter(|x| x.is_finite()).collect();
    if finite.is_empty() {
        return DistanceStats::ZERO;
    }

    let n = finite.len() as f32;
    let mean = finite.iter().sum::<f32>() / n;
    let min = finite.iter().copied().fold(f32::INFINITY, f32::min);
    let max = finite.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let variance = finite.iter().map(|x| (x - mean) * (x - mean)).sum::<f32>() / n;

    DistanceStats {
        mean,
        min,
        max,
        std_dev: variance.sqrt(),
    }
}

/// Indices `i` where `xs[i] >= threshold`, skipping non-finite entries
pub fn find_breakpoints(xs: &[f32], threshold: f32) -> Vec<usize> {
    xs.iter()
        .enumerate()
        .filter(|(_, x)| x.is_finite() && **x >= threshold)
        .map(|(i, _)| i)
        .collect()
}

//! Ready-made scoring functions
//!
//! Callers bring their own scorers for domain signals; these cover the
//! two the context pipeline always has on hand: embedding similarity
//! to a query and timestamp recency.

use chrono::{DateTime, Utc};

use crate::similarity::cosine_similarity;

use super::ScoringFunction;

/// Scores items by cosine similarity between their embedding and a
/// fixed query embedding
pub struct EmbeddingSimilarityScorer<F> {
    name: String,
    query: Vec<f32>,
    embedding_of: F,
}

impl<F> EmbeddingSimilarityScorer<F> {
    pub fn new(name: impl Into<String>, query: Vec<f32>, embedding_of: F) -> Self {
        Self {
            name: name.into(),
            query,
            embedding_of,
        }
    }
}

impl<I, F> ScoringFunction<I> for EmbeddingSimilarityScorer<F>
where
    F: for<'a> Fn(&'a I) -> &'a [f32] + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn score(&self, item: &I) -> f64 {
        cosine_similarity((self.embedding_of)(item), &self.query) as f64
    }
}

/// Scores items by recency relative to a reference instant
///
/// The raw score is the negated age in seconds, so newer items score
/// higher; pair with a normalizer to land on a comparable scale.
pub struct RecencyScorer<F> {
    name: String,
    reference: DateTime<Utc>,
    timestamp_of: F,
}

impl<F> RecencyScorer<F> {
    pub fn new(name: impl Into<String>, reference: DateTime<Utc>, timestamp_of: F) -> Self {
        Self {
            name: name.into(),
            reference,
            timestamp_of,
        }
    }
}

impl<I, F> ScoringFunction<I> for RecencyScorer<F>
where
    F: Fn(&I) -> DateTime<Utc> + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn score(&self, item: &I) -> f64 {
        let age = self.reference - (self.timestamp_of)(item);
        -(age.num_milliseconds() as f64 / 1000.0)
    }
}

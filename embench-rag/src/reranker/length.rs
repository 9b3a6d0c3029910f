//! Content-length reranking.

use async_trait::async_trait;

use crate::document::{ComponentScores, RerankedResult, SearchResult, rank_reranked};
use crate::error::{RagError, Result};

use super::{Reranker, blend, validate_weight};

/// Prefers chunks whose length is close to an ideal number of characters.
///
/// `length_score = 1 / (1 + |len - L| / L)`, with length counted in chars.
#[derive(Debug, Clone)]
pub struct LengthReranker {
    ideal_length: usize,
    weight: f64,
}

impl Default for LengthReranker {
    fn default() -> Self {
        Self { ideal_length: Self::DEFAULT_IDEAL_LENGTH, weight: Self::DEFAULT_WEIGHT }
    }
}

impl LengthReranker {
    /// Preferred content length in characters.
    pub const DEFAULT_IDEAL_LENGTH: usize = 200;
    /// Share of the blended score taken by the length signal.
    pub const DEFAULT_WEIGHT: f64 = 0.1;

    /// Create a reranker with an explicit ideal length and weight.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Config`] if `ideal_length` is zero or `weight` is
    /// outside `[0, 1]`.
    pub fn new(ideal_length: usize, weight: f64) -> Result<Self> {
        if ideal_length == 0 {
            return Err(RagError::Config("ideal_length must be greater than zero".to_string()));
        }
        Ok(Self { ideal_length, weight: validate_weight("length", weight)? })
    }

    /// Length score of `content`, in `(0, 1]`.
    pub fn score(&self, content: &str) -> f64 {
        let ideal = self.ideal_length as f64;
        let length = content.chars().count() as f64;
        1.0 / (1.0 + (length - ideal).abs() / ideal)
    }
}

#[async_trait]
impl Reranker for LengthReranker {
    fn name(&self) -> &str {
        "length"
    }

    fn signal(&self, scores: &ComponentScores) -> Option<f64> {
        scores.length_score
    }

    async fn rerank(
        &self,
        _query: &str,
        candidates: Vec<SearchResult>,
        top_k: Option<usize>,
    ) -> Result<Vec<RerankedResult>> {
        let reranked = candidates
            .into_iter()
            .map(|candidate| {
                let score = self.score(&candidate.content);
                let combined = blend(candidate.similarity, score, self.weight);
                RerankedResult::from_search(candidate)
                    .with_length_score(score)
                    .with_rerank_score(combined)
            })
            .collect();
        Ok(rank_reranked(reranked, top_k))
    }
}

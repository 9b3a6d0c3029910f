//! Chunk-position reranking.

use async_trait::async_trait;

use crate::document::{ComponentScores, RerankedResult, SearchResult, rank_reranked};
use crate::error::Result;

use super::{Reranker, blend, validate_weight};

/// Score decay per chunk index.
const POSITION_DECAY: f64 = 0.1;

/// Prefers chunks that appear early in their source document.
///
/// `position_score = 1 / (1 + chunk_index * 0.1)`.
#[derive(Debug, Clone)]
pub struct PositionReranker {
    weight: f64,
}

impl Default for PositionReranker {
    fn default() -> Self {
        Self { weight: Self::DEFAULT_WEIGHT }
    }
}

impl PositionReranker {
    /// Share of the blended score taken by the position signal.
    pub const DEFAULT_WEIGHT: f64 = 0.1;

    /// Create a position reranker with an explicit weight.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Config`](crate::RagError::Config) if `weight` is
    /// outside `[0, 1]`.
    pub fn new(weight: f64) -> Result<Self> {
        Ok(Self { weight: validate_weight("position", weight)? })
    }

    /// Position score of the chunk at `chunk_index`, in `(0, 1]`.
    pub fn score(chunk_index: u32) -> f64 {
        1.0 / (1.0 + f64::from(chunk_index) * POSITION_DECAY)
    }
}

#[async_trait]
impl Reranker for PositionReranker {
    fn name(&self) -> &str {
        "position"
    }

    fn signal(&self, scores: &ComponentScores) -> Option<f64> {
        scores.position_score
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
                let score = Self::score(candidate.chunk_index);
                let combined = blend(candidate.similarity, score, self.weight);
                RerankedResult::from_search(candidate)
                    .with_position_score(score)
                    .with_rerank_score(combined)
            })
            .collect();
        Ok(rank_reranked(reranked, top_k))
    }
}

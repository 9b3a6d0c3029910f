//! Weighted combination of several rerankers.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::document::{ComponentScores, RerankedResult, SearchResult, rank_reranked};
use crate::error::{RagError, Result};

use super::Reranker;

/// Share of the final score taken by the original similarity.
const SIMILARITY_SHARE: f64 = 0.5;

/// Weighted blend of several rerankers.
///
/// Each sub-reranker scores the full candidate list and contributes its named
/// signal ([`Reranker::signal`]), e.g. `keyword_score` for a
/// [`KeywordReranker`](super::KeywordReranker). A sub-reranker without a named
/// signal contributes its `rerank_score`. The final score is
/// `0.5 * similarity + 0.5 * Σ(wᵢ · scoreᵢ) / Σwᵢ`, and the component scores
/// of every sub-reranker are carried onto the result.
///
/// # Example
///
/// ```rust,ignore
/// use std::sync::Arc;
/// use embench_rag::{CombinedReranker, KeywordReranker, LengthReranker};
///
/// let reranker = CombinedReranker::new(vec![
///     (Arc::new(KeywordReranker::default()) as _, 0.7),
///     (Arc::new(LengthReranker::default()) as _, 0.3),
/// ])?;
/// ```
pub struct CombinedReranker {
    rerankers: Vec<(Arc<dyn Reranker>, f64)>,
    total_weight: f64,
}

impl CombinedReranker {
    /// Combine `rerankers` with their weights.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Config`] if the list is empty, a weight is
    /// negative or non-finite, or the weights sum to zero.
    pub fn new(rerankers: Vec<(Arc<dyn Reranker>, f64)>) -> Result<Self> {
        if rerankers.is_empty() {
            return Err(RagError::Config(
                "combined reranker needs at least one sub-reranker".to_string(),
            ));
        }
        if let Some((reranker, weight)) =
            rerankers.iter().find(|(_, w)| !w.is_finite() || *w < 0.0)
        {
            return Err(RagError::Config(format!(
                "weight for the {} reranker ({weight}) must be a non-negative number",
                reranker.name()
            )));
        }
        let total_weight: f64 = rerankers.iter().map(|(_, w)| w).sum();
        if total_weight <= 0.0 {
            return Err(RagError::Config("combined reranker weights sum to zero".to_string()));
        }
        Ok(Self { rerankers, total_weight })
    }

    /// Names of the sub-rerankers, in execution order.
    pub fn reranker_names(&self) -> Vec<&str> {
        self.rerankers.iter().map(|(r, _)| r.name()).collect()
    }
}

#[derive(Default, Clone, Copy)]
struct Contribution {
    weighted_sum: f64,
    scores: ComponentScores,
}

#[async_trait]
impl Reranker for CombinedReranker {
    fn name(&self) -> &str {
        "combined"
    }

    async fn rerank(
        &self,
        query: &str,
        candidates: Vec<SearchResult>,
        top_k: Option<usize>,
    ) -> Result<Vec<RerankedResult>> {
        if candidates.is_empty() {
            return Ok(Vec::new());
        }

        let mut contributions: HashMap<String, Contribution> = HashMap::new();
        for (reranker, weight) in &self.rerankers {
            let scored = reranker.rerank(query, candidates.clone(), None).await?;
            debug!(reranker = reranker.name(), weight, scored = scored.len(), "sub-reranker finished");
            for item in scored {
                let entry = contributions.entry(item.result.chunk_id.clone()).or_default();
                let score = reranker.signal(&item.scores).unwrap_or(item.rerank_score);
                entry.weighted_sum += weight * score;
                entry.scores = entry.scores.merge(item.scores);
            }
        }

        let reranked = candidates
            .into_iter()
            .map(|candidate| {
                let contribution =
                    contributions.get(&candidate.chunk_id).copied().unwrap_or_default();
                let weighted = contribution.weighted_sum / self.total_weight;
                let combined = SIMILARITY_SHARE * candidate.similarity
                    + (1.0 - SIMILARITY_SHARE) * weighted;
                RerankedResult {
                    result: candidate,
                    scores: contribution.scores,
                    rerank_score: combined,
                }
            })
            .collect();
        Ok(rank_reranked(reranked, top_k))
    }
}

//! Re-embedding reranking with the model under evaluation.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::warn;

use crate::document::{ComponentScores, RerankedResult, SearchResult, rank_reranked};
use crate::embedding::{Encoder, check_dimension, cosine_similarity};
use crate::error::Result;
use crate::registry::ModelDescriptor;

use super::{Reranker, blend, validate_weight};

/// Re-embeds query and candidate content and scores their cosine similarity.
///
/// If the encoder fails, the affected candidates use their retrieval
/// similarity as `semantic_score`.
pub struct SemanticReranker {
    encoder: Arc<dyn Encoder>,
    model: ModelDescriptor,
    weight: f64,
}

impl SemanticReranker {
    /// Share of the blended score taken by the semantic signal.
    pub const DEFAULT_WEIGHT: f64 = 0.4;

    /// Create a semantic reranker that encodes with `model`.
    pub fn new(encoder: Arc<dyn Encoder>, model: ModelDescriptor) -> Self {
        Self { encoder, model, weight: Self::DEFAULT_WEIGHT }
    }

    /// Replace the blend weight.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Config`](crate::RagError::Config) if `weight` is
    /// outside `[0, 1]`.
    pub fn with_weight(mut self, weight: f64) -> Result<Self> {
        self.weight = validate_weight("semantic", weight)?;
        Ok(self)
    }

    /// Fresh similarity per candidate, `None` where encoding failed.
    async fn semantic_scores(&self, query: &str, candidates: &[SearchResult]) -> Vec<Option<f64>> {
        let query_vector = match self.encoder.encode_query(query, &self.model).await {
            Ok(v) if check_dimension(&self.model, &v).is_ok() => v,
            Ok(v) => {
                warn!(model = %self.model.id, actual = v.len(), "query vector has wrong dimension, keeping similarity");
                return vec![None; candidates.len()];
            }
            Err(e) => {
                warn!(model = %self.model.id, error = %e, "query re-encoding failed, keeping similarity");
                return vec![None; candidates.len()];
            }
        };

        let texts: Vec<&str> = candidates.iter().map(|c| c.content.as_str()).collect();
        match self.encoder.encode_batch(&texts, &self.model).await {
            Ok(vectors) if vectors.len() == candidates.len() => vectors
                .iter()
                .map(|v| {
                    check_dimension(&self.model, v)
                        .ok()
                        .map(|()| cosine_similarity(&query_vector, v))
                        .filter(|s| s.is_finite())
                })
                .collect(),
            Ok(vectors) => {
                warn!(
                    model = %self.model.id,
                    expected = candidates.len(),
                    actual = vectors.len(),
                    "encoder returned the wrong number of vectors, keeping similarity"
                );
                vec![None; candidates.len()]
            }
            Err(e) => {
                warn!(model = %self.model.id, error = %e, "content re-encoding failed, keeping similarity");
                vec![None; candidates.len()]
            }
        }
    }
}

#[async_trait]
impl Reranker for SemanticReranker {
    fn name(&self) -> &str {
        "semantic"
    }

    fn signal(&self, scores: &ComponentScores) -> Option<f64> {
        scores.semantic_score
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

        let scores = self.semantic_scores(query, &candidates).await;
        let reranked = candidates
            .into_iter()
            .zip(scores)
            .map(|(candidate, score)| {
                let score = score.unwrap_or(candidate.similarity);
                let combined = blend(candidate.similarity, score, self.weight);
                RerankedResult::from_search(candidate)
                    .with_semantic_score(score)
                    .with_rerank_score(combined)
            })
            .collect();
        Ok(rank_reranked(reranked, top_k))
    }
}

//! Rerankers that reorder retrieval candidates using auxiliary signals.
//!
//! Every single-signal reranker blends its signal with the original
//! similarity as `(1 - w) * similarity + w * signal`:
//!
//! | Reranker | Signal | Default `w` |
//! |---|---|---|
//! | [`KeywordReranker`] | query/content keyword overlap | 0.3 |
//! | [`LengthReranker`] | closeness to an ideal length | 0.1 |
//! | [`PositionReranker`] | earlier chunks in the source | 0.1 |
//! | [`SemanticReranker`] | fresh re-embedding similarity | 0.4 |
//!
//! [`CombinedReranker`] runs several rerankers and blends their scores.

mod combined;
mod keyword;
mod length;
mod position;
mod semantic;

use async_trait::async_trait;

use crate::document::{ComponentScores, RerankedResult, SearchResult};
use crate::error::{RagError, Result};

pub use combined::CombinedReranker;
pub use keyword::KeywordReranker;
pub use length::LengthReranker;
pub use position::PositionReranker;
pub use semantic::SemanticReranker;

/// A reranker that re-scores and reorders search results.
///
/// Empty input yields empty output. Without `top_k` every candidate is
/// returned, reordered. Output is sorted by `rerank_score` descending with
/// ties broken by ascending chunk id.
#[async_trait]
pub trait Reranker: Send + Sync {
    /// Short name used in logs and reports.
    fn name(&self) -> &str;

    /// The named signal this reranker records on `scores`.
    ///
    /// [`CombinedReranker`] blends this value instead of the
    /// similarity-weighted `rerank_score`. Rerankers without a named signal
    /// return `None` and contribute their `rerank_score`.
    fn signal(&self, _scores: &ComponentScores) -> Option<f64> {
        None
    }

    /// Rerank `candidates` for `query`.
    async fn rerank(
        &self,
        query: &str,
        candidates: Vec<SearchResult>,
        top_k: Option<usize>,
    ) -> Result<Vec<RerankedResult>>;
}

/// `(1 - weight) * similarity + weight * signal`.
pub(crate) fn blend(similarity: f64, signal: f64, weight: f64) -> f64 {
    (1.0 - weight) * similarity + weight * signal
}

pub(crate) fn validate_weight(reranker: &str, weight: f64) -> Result<f64> {
    if !weight.is_finite() || !(0.0..=1.0).contains(&weight) {
        return Err(RagError::Config(format!(
            "{reranker} reranker weight ({weight}) must be within [0, 1]"
        )));
    }
    Ok(weight)
}

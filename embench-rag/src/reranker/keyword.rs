//! Keyword-overlap reranking.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::document::{ComponentScores, RerankedResult, SearchResult, rank_reranked};
use crate::error::Result;
use crate::keywords::{CachedKeywordExtractor, KeywordExtractor, RegexKeywordExtractor};

use super::{Reranker, blend, validate_weight};

/// Boosts candidates that share keywords with the query.
///
/// `keyword_score = |query_kw ∩ content_kw| / |query_kw|`, or 0 when the
/// query has no keywords.
///
/// # Example
///
/// ```rust,ignore
/// use embench_rag::KeywordReranker;
///
/// let reranker = KeywordReranker::default();
/// let reranked = reranker.rerank("deposit support", candidates, Some(5)).await?;
/// ```
pub struct KeywordReranker {
    extractor: Arc<dyn KeywordExtractor>,
    weight: f64,
}

impl Default for KeywordReranker {
    fn default() -> Self {
        let extractor = CachedKeywordExtractor::new(Arc::new(RegexKeywordExtractor));
        Self { extractor: Arc::new(extractor), weight: Self::DEFAULT_WEIGHT }
    }
}

impl KeywordReranker {
    /// Share of the blended score taken by the keyword signal.
    pub const DEFAULT_WEIGHT: f64 = 0.3;

    /// Create a keyword reranker around `extractor`.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Config`](crate::RagError::Config) if `weight` is
    /// outside `[0, 1]`.
    pub fn new(extractor: Arc<dyn KeywordExtractor>, weight: f64) -> Result<Self> {
        Ok(Self { extractor, weight: validate_weight("keyword", weight)? })
    }
}

fn overlap(query_keywords: &HashSet<String>, content_keywords: &HashSet<String>) -> f64 {
    if query_keywords.is_empty() {
        return 0.0;
    }
    query_keywords.intersection(content_keywords).count() as f64 / query_keywords.len() as f64
}

#[async_trait]
impl Reranker for KeywordReranker {
    fn name(&self) -> &str {
        "keyword"
    }

    fn signal(&self, scores: &ComponentScores) -> Option<f64> {
        scores.keyword_score
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

        let query_keywords: HashSet<String> =
            self.extractor.extract(query).await.into_iter().collect();
        debug!(keyword_count = query_keywords.len(), "extracted query keywords");

        let mut reranked = Vec::with_capacity(candidates.len());
        for candidate in candidates {
            let content_keywords: HashSet<String> =
                self.extractor.extract(&candidate.content).await.into_iter().collect();
            let score = overlap(&query_keywords, &content_keywords);
            let combined = blend(candidate.similarity, score, self.weight);
            reranked.push(
                RerankedResult::from_search(candidate)
                    .with_keyword_score(score)
                    .with_rerank_score(combined),
            );
        }
        Ok(rank_reranked(reranked, top_k))
    }
}

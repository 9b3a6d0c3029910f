//! Configuration for vector retrieval.

use serde::{Deserialize, Serialize};

use crate::error::{RagError, Result};

/// Configuration parameters for a [`VectorRetriever`](crate::VectorRetriever).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RetrievalConfig {
    /// Number of results returned when the caller does not pick one.
    pub top_k: usize,
    /// Minimum similarity score for results (results below this are filtered out).
    pub min_similarity: f64,
    /// How many times `top_k` candidates are fetched before reranking.
    pub rerank_pool_factor: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self { top_k: 5, min_similarity: 0.0, rerank_pool_factor: 4 }
    }
}

impl RetrievalConfig {
    /// Create a new builder for constructing a [`RetrievalConfig`].
    pub fn builder() -> RetrievalConfigBuilder {
        RetrievalConfigBuilder::default()
    }

    /// Size of the candidate pool fetched for reranking `top_k` results.
    pub fn rerank_pool(&self, top_k: usize) -> usize {
        top_k.saturating_mul(self.rerank_pool_factor)
    }
}

/// Builder for constructing a validated [`RetrievalConfig`].
#[derive(Debug, Clone, Default)]
pub struct RetrievalConfigBuilder {
    config: RetrievalConfig,
}

impl RetrievalConfigBuilder {
    /// Set the default number of results.
    pub fn top_k(mut self, k: usize) -> Self {
        self.config.top_k = k;
        self
    }

    /// Set the minimum similarity threshold for filtering results.
    pub fn min_similarity(mut self, threshold: f64) -> Self {
        self.config.min_similarity = threshold;
        self
    }

    /// Set the candidate pool multiplier used before reranking.
    pub fn rerank_pool_factor(mut self, factor: usize) -> Self {
        self.config.rerank_pool_factor = factor;
        self
    }

    /// Build the [`RetrievalConfig`], validating that parameters are consistent.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Config`] if:
    /// - `top_k == 0`
    /// - `rerank_pool_factor == 0`
    /// - `min_similarity` is not a finite value in `[-1, 1]`
    pub fn build(self) -> Result<RetrievalConfig> {
        if self.config.top_k == 0 {
            return Err(RagError::Config("top_k must be greater than zero".to_string()));
        }
        if self.config.rerank_pool_factor == 0 {
            return Err(RagError::Config(
                "rerank_pool_factor must be greater than zero".to_string(),
            ));
        }
        let threshold = self.config.min_similarity;
        if !threshold.is_finite() || !(-1.0..=1.0).contains(&threshold) {
            return Err(RagError::Config(format!(
                "min_similarity ({threshold}) must be a finite value in [-1, 1]"
            )));
        }
        Ok(self.config)
    }
}

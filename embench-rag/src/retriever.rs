//! Per-model similarity search with optional reranking.
//!
//! A [`VectorRetriever`] is bound to one [`ModelDescriptor`] and therefore to
//! one partition of the vector store. It opens its partition session lazily
//! on the first search and keeps it until [`close`](VectorRetriever::close).
//!
//! # Example
//!
//! ```rust,ignore
//! use embench_rag::{VectorRetriever, RetrievalConfig};
//!
//! let retriever = VectorRetriever::builder()
//!     .descriptor(model.clone())
//!     .encoder(encoder)
//!     .store(store)
//!     .reranker(reranker) // optional
//!     .config(RetrievalConfig::default())
//!     .build()?;
//!
//! let results = retriever.search("적금 해지 방법", 5, 0.3).await?;
//! let reranked = retriever.search_with_reranking("적금 해지 방법", 5, None).await?;
//! retriever.close().await;
//! ```

use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, error, info};

use crate::config::RetrievalConfig;
use crate::document::{RerankedResult, SearchResult, rank_search_results};
use crate::embedding::{Encoder, check_dimension};
use crate::error::{RagError, Result};
use crate::registry::ModelDescriptor;
use crate::reranker::Reranker;
use crate::vectorstore::{PartitionSession, VectorStore};

/// Similarity search against a single model's partition.
///
/// Construct one via [`VectorRetriever::builder()`]. The partition session is
/// guarded by a mutex, so a retriever can be shared across tasks; concurrent
/// searches on the same retriever are serialized on the session.
pub struct VectorRetriever {
    descriptor: ModelDescriptor,
    encoder: Arc<dyn Encoder>,
    store: Arc<dyn VectorStore>,
    reranker: Option<Arc<dyn Reranker>>,
    config: RetrievalConfig,
    session: Mutex<Option<Box<dyn PartitionSession>>>,
}

impl VectorRetriever {
    /// Create a new [`VectorRetrieverBuilder`].
    pub fn builder() -> VectorRetrieverBuilder {
        VectorRetrieverBuilder::default()
    }

    /// The model this retriever searches with.
    pub fn descriptor(&self) -> &ModelDescriptor {
        &self.descriptor
    }

    pub fn config(&self) -> &RetrievalConfig {
        &self.config
    }

    pub fn has_reranker(&self) -> bool {
        self.reranker.is_some()
    }

    /// Whether a partition session is currently open.
    pub async fn is_connected(&self) -> bool {
        self.session.lock().await.is_some()
    }

    /// Search the model's partition for chunks similar to `query`.
    ///
    /// Returns at most `top_k` results with `similarity >= min_similarity`,
    /// ordered by descending similarity with ties broken by ascending chunk
    /// id. An empty partition yields an empty list.
    ///
    /// # Errors
    ///
    /// Returns an encoding error ([`RagError::Encoding`] or
    /// [`RagError::DimensionMismatch`]) if the query cannot be embedded, and
    /// [`RagError::Retrieval`] if the store fails. Neither is retried.
    pub async fn search(
        &self,
        query: &str,
        top_k: usize,
        min_similarity: f64,
    ) -> Result<Vec<SearchResult>> {
        let model = &self.descriptor;
        let query_vector = self.encoder.encode_query(query, model).await.map_err(|e| {
            error!(model = %model.id, error = %e, "query encoding failed");
            e
        })?;
        check_dimension(model, &query_vector)?;

        let candidates = {
            let mut guard = self.session.lock().await;
            if guard.is_none() {
                *guard = Some(self.open_session().await?);
            }
            let session = guard.as_deref().ok_or_else(|| {
                RagError::retrieval(self.store.backend(), "partition session unavailable")
            })?;
            session.nearest(&query_vector, top_k).await.map_err(|e| {
                error!(model = %model.id, error = %e, "partition search failed");
                e
            })?
        };

        let filtered: Vec<SearchResult> =
            candidates.into_iter().filter(|r| r.similarity >= min_similarity).collect();
        let results = rank_search_results(filtered, top_k);

        debug!(model = %model.id, top_k, min_similarity, result_count = results.len(), "search completed");
        Ok(results)
    }

    /// Search with a wider candidate pool, rerank it, and keep `top_k`.
    ///
    /// The pool size is `rerank_top_k`, defaulting to
    /// `top_k * rerank_pool_factor` (4 unless configured otherwise).
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Config`] if no reranker is configured, plus every
    /// error of [`search`](Self::search) and of the reranker.
    pub async fn search_with_reranking(
        &self,
        query: &str,
        top_k: usize,
        rerank_top_k: Option<usize>,
    ) -> Result<Vec<RerankedResult>> {
        let reranker = self.reranker.as_ref().ok_or_else(|| {
            RagError::Config(format!("no reranker configured for model '{}'", self.descriptor.id))
        })?;

        let pool = rerank_top_k.unwrap_or_else(|| self.config.rerank_pool(top_k));
        let candidates = self.search(query, pool, self.config.min_similarity).await?;
        let candidate_count = candidates.len();

        let mut reranked = reranker.rerank(query, candidates, Some(top_k)).await.map_err(|e| {
            error!(model = %self.descriptor.id, reranker = reranker.name(), error = %e, "reranking failed");
            e
        })?;
        reranked.truncate(top_k);

        debug!(
            model = %self.descriptor.id,
            reranker = reranker.name(),
            candidate_count,
            result_count = reranked.len(),
            "reranked search completed"
        );
        Ok(reranked)
    }

    async fn open_session(&self) -> Result<Box<dyn PartitionSession>> {
        let model = &self.descriptor;
        let session = self.store.connect(&model.partition).await.map_err(|e| {
            error!(model = %model.id, partition = %model.partition, error = %e, "failed to open partition");
            e
        })?;
        debug!(
            model = %model.id,
            partition = %model.partition,
            backend = self.store.backend(),
            "opened partition session"
        );
        Ok(session)
    }

    /// Release the partition session. Calling this again is a no-op.
    pub async fn close(&self) {
        if self.session.lock().await.take().is_some() {
            info!(model = %self.descriptor.id, "closed partition session");
        }
    }
}

/// Builder for constructing a [`VectorRetriever`].
///
/// `descriptor`, `encoder`, and `store` are required; `reranker` is optional
/// and `config` defaults to [`RetrievalConfig::default()`].
#[derive(Default)]
pub struct VectorRetrieverBuilder {
    descriptor: Option<ModelDescriptor>,
    encoder: Option<Arc<dyn Encoder>>,
    store: Option<Arc<dyn VectorStore>>,
    reranker: Option<Arc<dyn Reranker>>,
    config: Option<RetrievalConfig>,
}

impl VectorRetrieverBuilder {
    /// Set the model whose partition is searched.
    pub fn descriptor(mut self, descriptor: ModelDescriptor) -> Self {
        self.descriptor = Some(descriptor);
        self
    }

    /// Set the query encoder.
    pub fn encoder(mut self, encoder: Arc<dyn Encoder>) -> Self {
        self.encoder = Some(encoder);
        self
    }

    /// Set the vector store backend.
    pub fn store(mut self, store: Arc<dyn VectorStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Set the reranker used by [`VectorRetriever::search_with_reranking`].
    pub fn reranker(mut self, reranker: Arc<dyn Reranker>) -> Self {
        self.reranker = Some(reranker);
        self
    }

    /// Set the retrieval configuration.
    pub fn config(mut self, config: RetrievalConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Build the [`VectorRetriever`], validating that all required fields are set.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Config`] if any required field is missing.
    pub fn build(self) -> Result<VectorRetriever> {
        let descriptor = self
            .descriptor
            .ok_or_else(|| RagError::Config("descriptor is required".to_string()))?;
        let encoder =
            self.encoder.ok_or_else(|| RagError::Config("encoder is required".to_string()))?;
        let store = self.store.ok_or_else(|| RagError::Config("store is required".to_string()))?;

        Ok(VectorRetriever {
            descriptor,
            encoder,
            store,
            reranker: self.reranker,
            config: self.config.unwrap_or_default(),
            session: Mutex::new(None),
        })
    }
}

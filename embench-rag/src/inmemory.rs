//! In-memory vector store using cosine similarity.
//!
//! This module provides [`InMemoryVectorStore`], a vector store backed by
//! `HashMap`s protected by a `tokio::sync::RwLock`. Similarity search is a
//! client-side scan of one partition. It is suitable for development,
//! testing, and corpus snapshots that fit in memory.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::document::{ChunkEmbedding, DocumentChunk, SearchResult, rank_search_results};
use crate::embedding::cosine_similarity;
use crate::error::{RagError, Result};
use crate::registry::{ModelRegistry, PartitionKey};
use crate::vectorstore::{PartitionSession, VectorStore};

const BACKEND: &str = "InMemory";

#[derive(Debug, Default)]
struct StoreState {
    chunks: HashMap<String, DocumentChunk>,
    partitions: HashMap<PartitionKey, Partition>,
}

#[derive(Debug)]
struct Partition {
    dimension: usize,
    vectors: HashMap<String, Vec<f32>>,
}

/// An in-memory, model-partitioned vector store.
///
/// Cloning the store is cheap and shares the underlying data.
///
/// # Example
///
/// ```rust,ignore
/// use embench_rag::{InMemoryVectorStore, VectorStore};
///
/// let store = InMemoryVectorStore::new();
/// store.create_partition(&partition, 768).await?;
/// ```
#[derive(Debug, Default, Clone)]
pub struct InMemoryVectorStore {
    state: Arc<RwLock<StoreState>>,
}

impl InMemoryVectorStore {
    /// Create a new empty in-memory vector store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store from a corpus snapshot.
    ///
    /// A partition is created for every registered model that has vectors in
    /// the snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::UnknownModel`] if the snapshot contains vectors for
    /// a model that is not registered, or [`RagError::Retrieval`] if a vector
    /// has the wrong dimension.
    pub async fn from_snapshot(snapshot: CorpusSnapshot, registry: &ModelRegistry) -> Result<Self> {
        let store = Self::new();
        store.upsert_chunks(&snapshot.chunks).await?;

        let mut model_ids: Vec<&String> = snapshot.embeddings.keys().collect();
        model_ids.sort();
        for model_id in model_ids {
            let model = registry.resolve(model_id)?;
            let embeddings: Vec<ChunkEmbedding> = snapshot.embeddings[model_id]
                .iter()
                .map(|v| ChunkEmbedding {
                    chunk_id: v.chunk_id.clone(),
                    model_id: model_id.clone(),
                    vector: v.vector.clone(),
                })
                .collect();
            store.create_partition(&model.partition, model.dimension).await?;
            store.upsert_embeddings(&model.partition, &embeddings).await?;
        }

        info!(
            chunk_count = snapshot.chunks.len(),
            partition_count = snapshot.embeddings.len(),
            "loaded corpus snapshot"
        );
        Ok(store)
    }

    /// Read a JSON corpus snapshot from `path` and build a store from it.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Retrieval`] if the file cannot be read or parsed,
    /// plus every error of [`from_snapshot`](Self::from_snapshot).
    pub async fn load_snapshot(path: impl AsRef<Path>, registry: &ModelRegistry) -> Result<Self> {
        let path = path.as_ref();
        let raw = tokio::fs::read_to_string(path).await.map_err(|e| {
            RagError::retrieval(BACKEND, format!("failed to read '{}': {e}", path.display()))
        })?;
        let snapshot: CorpusSnapshot = serde_json::from_str(&raw).map_err(|e| {
            RagError::retrieval(BACKEND, format!("failed to parse '{}': {e}", path.display()))
        })?;
        Self::from_snapshot(snapshot, registry).await
    }
}

/// Serialized corpus: shared chunk content plus per-model vectors.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CorpusSnapshot {
    pub chunks: Vec<DocumentChunk>,
    /// Model id → vectors computed by that model.
    pub embeddings: HashMap<String, Vec<SnapshotVector>>,
}

/// One stored vector inside a [`CorpusSnapshot`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SnapshotVector {
    pub chunk_id: String,
    pub vector: Vec<f32>,
}

fn missing_partition(partition: &PartitionKey) -> RagError {
    RagError::retrieval(BACKEND, format!("partition '{partition}' does not exist"))
}

#[async_trait]
impl VectorStore for InMemoryVectorStore {
    fn backend(&self) -> &str {
        BACKEND
    }

    async fn create_partition(&self, partition: &PartitionKey, dimension: usize) -> Result<()> {
        let mut state = self.state.write().await;
        let existing = state
            .partitions
            .entry(partition.clone())
            .or_insert_with(|| Partition { dimension, vectors: HashMap::new() });
        if existing.dimension != dimension {
            return Err(RagError::retrieval(
                BACKEND,
                format!(
                    "partition '{partition}' already exists with {} dimensions, not {dimension}",
                    existing.dimension
                ),
            ));
        }
        debug!(%partition, dimension, "created partition");
        Ok(())
    }

    async fn delete_partition(&self, partition: &PartitionKey) -> Result<()> {
        let mut state = self.state.write().await;
        state.partitions.remove(partition);
        Ok(())
    }

    async fn upsert_chunks(&self, chunks: &[DocumentChunk]) -> Result<()> {
        let mut state = self.state.write().await;
        for chunk in chunks {
            state.chunks.insert(chunk.chunk_id.clone(), chunk.clone());
        }
        Ok(())
    }

    async fn upsert_embeddings(
        &self,
        partition: &PartitionKey,
        embeddings: &[ChunkEmbedding],
    ) -> Result<()> {
        let mut state = self.state.write().await;
        let store = state.partitions.get_mut(partition).ok_or_else(|| missing_partition(partition))?;
        if let Some(bad) = embeddings.iter().find(|e| e.vector.len() != store.dimension) {
            return Err(RagError::retrieval(
                BACKEND,
                format!(
                    "vector for chunk '{}' has {} dimensions, partition '{partition}' expects {}",
                    bad.chunk_id,
                    bad.vector.len(),
                    store.dimension
                ),
            ));
        }
        for embedding in embeddings {
            store.vectors.insert(embedding.chunk_id.clone(), embedding.vector.clone());
        }
        Ok(())
    }

    async fn connect(&self, partition: &PartitionKey) -> Result<Box<dyn PartitionSession>> {
        if !self.state.read().await.partitions.contains_key(partition) {
            return Err(missing_partition(partition));
        }
        Ok(Box::new(InMemorySession { partition: partition.clone(), state: self.state.clone() }))
    }
}

/// A session over one partition of an [`InMemoryVectorStore`].
struct InMemorySession {
    partition: PartitionKey,
    state: Arc<RwLock<StoreState>>,
}

#[async_trait]
impl PartitionSession for InMemorySession {
    fn partition(&self) -> &PartitionKey {
        &self.partition
    }

    async fn nearest(&self, query: &[f32], limit: usize) -> Result<Vec<SearchResult>> {
        let state = self.state.read().await;
        let store =
            state.partitions.get(&self.partition).ok_or_else(|| missing_partition(&self.partition))?;
        if query.len() != store.dimension {
            return Err(RagError::DimensionMismatch {
                model: self.partition.to_string(),
                expected: store.dimension,
                actual: query.len(),
            });
        }

        let scored: Vec<SearchResult> = store
            .vectors
            .iter()
            .filter_map(|(chunk_id, vector)| {
                let chunk = state.chunks.get(chunk_id)?;
                Some(SearchResult::from_chunk(chunk, cosine_similarity(query, vector)))
            })
            .collect();

        Ok(rank_search_results(scored, limit))
    }

    async fn count(&self) -> Result<usize> {
        let state = self.state.read().await;
        state
            .partitions
            .get(&self.partition)
            .map(|p| p.vectors.len())
            .ok_or_else(|| missing_partition(&self.partition))
    }
}

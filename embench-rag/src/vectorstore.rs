//! Vector store traits for model-partitioned similarity search.

use async_trait::async_trait;

use crate::document::{ChunkEmbedding, DocumentChunk, SearchResult};
use crate::error::Result;
use crate::registry::PartitionKey;

/// A storage backend holding one vector partition per embedding model.
///
/// Chunk content lives in a single shared table; vectors live in per-model
/// partitions keyed by [`PartitionKey`]. Searches never cross partitions:
/// callers [`connect`](VectorStore::connect) to exactly one partition and
/// query it through the returned [`PartitionSession`].
///
/// # Example
///
/// ```rust,ignore
/// use embench_rag::{InMemoryVectorStore, VectorStore};
///
/// let store = InMemoryVectorStore::new();
/// store.create_partition(&model.partition, model.dimension).await?;
/// store.upsert_chunks(&chunks).await?;
/// store.upsert_embeddings(&model.partition, &embeddings).await?;
/// let session = store.connect(&model.partition).await?;
/// let results = session.nearest(&query_vector, 5).await?;
/// ```
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Short backend name used in errors and logs.
    fn backend(&self) -> &str;

    /// Create a partition for vectors of `dimension`.
    ///
    /// No-op if it already exists with the same dimension; an existing
    /// partition with another dimension is a retrieval error.
    async fn create_partition(&self, partition: &PartitionKey, dimension: usize) -> Result<()>;

    /// Delete a partition and all its vectors. Chunk content is kept.
    async fn delete_partition(&self, partition: &PartitionKey) -> Result<()>;

    /// Insert or replace chunks in the shared content table.
    async fn upsert_chunks(&self, chunks: &[DocumentChunk]) -> Result<()>;

    /// Insert or replace vectors in one partition.
    ///
    /// Every vector must match the partition's dimension.
    async fn upsert_embeddings(
        &self,
        partition: &PartitionKey,
        embeddings: &[ChunkEmbedding],
    ) -> Result<()>;

    /// Open a session scoped to one partition.
    async fn connect(&self, partition: &PartitionKey) -> Result<Box<dyn PartitionSession>>;
}

/// A connection scope bound to exactly one partition.
///
/// The session is released when dropped.
#[async_trait]
pub trait PartitionSession: Send + Sync {
    /// The partition this session reads from.
    fn partition(&self) -> &PartitionKey;

    /// Return at most `limit` chunks nearest to `query` by cosine similarity.
    ///
    /// Results are ordered by descending similarity, ties broken by
    /// ascending chunk id. Chunks without a content row are skipped.
    async fn nearest(&self, query: &[f32], limit: usize) -> Result<Vec<SearchResult>>;

    /// Number of vectors stored in the partition.
    async fn count(&self) -> Result<usize>;
}

//! Model-partitioned vector retrieval and reranking.
//!
//! `embench-rag` is the retrieval half of embench. Each embedding model that is
//! being compared owns an isolated partition of a [`VectorStore`]; a
//! [`VectorRetriever`] encodes a query with that model, runs a cosine
//! similarity search against the model's partition only, and optionally hands
//! a wider candidate pool to a [`Reranker`].
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use embench_rag::{InMemoryVectorStore, KeywordReranker, ModelRegistry, VectorRetriever};
//!
//! let registry = ModelRegistry::builtin();
//! let retriever = VectorRetriever::builder()
//!     .descriptor(registry.resolve("BAAI/bge-m3")?.clone())
//!     .encoder(encoder)
//!     .store(Arc::new(store))
//!     .reranker(Arc::new(KeywordReranker::default()))
//!     .build()?;
//!
//! let results = retriever.search("대출 금리 문의", 5, 0.0).await?;
//! ```

pub mod config;
pub mod document;
pub mod embedding;
pub mod error;
pub mod generation;
pub mod inmemory;
pub mod keywords;
pub mod registry;
pub mod reranker;
pub mod retriever;
pub mod vectorstore;

#[cfg(feature = "openai")]
pub mod openai;
#[cfg(feature = "pgvector")]
pub mod pgvector;

pub use config::{RetrievalConfig, RetrievalConfigBuilder};
pub use document::{ChunkEmbedding, ComponentScores, DocumentChunk, RerankedResult, SearchResult};
pub use embedding::{Encoder, check_dimension, cosine_similarity};
pub use error::{RagError, Result};
pub use generation::TextGenerator;
pub use inmemory::{CorpusSnapshot, InMemoryVectorStore, SnapshotVector};
pub use keywords::{
    CachedKeywordExtractor, KeywordExtractor, LlmKeywordExtractor, RegexKeywordExtractor,
};
pub use registry::{ModelDescriptor, ModelRegistry, PartitionKey, PoolingMode};
pub use reranker::{
    CombinedReranker, KeywordReranker, LengthReranker, PositionReranker, Reranker,
    SemanticReranker,
};
pub use retriever::{VectorRetriever, VectorRetrieverBuilder};
pub use vectorstore::{PartitionSession, VectorStore};

#[cfg(feature = "openai")]
pub use openai::{OpenAiChatGenerator, OpenAiCompatibleEncoder};
#[cfg(feature = "pgvector")]
pub use pgvector::PgVectorStore;

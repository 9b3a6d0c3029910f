//! Shared fixtures for the integration tests.
#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use embench_rag::{
    ChunkEmbedding, DocumentChunk, Encoder, InMemoryVectorStore, ModelDescriptor, PoolingMode,
    RagError, Result, SearchResult, VectorStore,
};

/// Encoder that answers from a fixed text → vector table.
#[derive(Default)]
pub struct MapEncoder {
    vectors: HashMap<String, Vec<f32>>,
    calls: AtomicUsize,
}

impl MapEncoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, text: &str, vector: Vec<f32>) -> Self {
        self.vectors.insert(text.to_string(), vector);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Encoder for MapEncoder {
    async fn encode_query(&self, text: &str, model: &ModelDescriptor) -> Result<Vec<f32>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.vectors.get(text).cloned().ok_or_else(|| RagError::Encoding {
            model: model.id.clone(),
            message: format!("no vector for '{text}'"),
        })
    }
}

/// Encoder that always fails.
pub struct FailingEncoder;

#[async_trait]
impl Encoder for FailingEncoder {
    async fn encode_query(&self, _text: &str, model: &ModelDescriptor) -> Result<Vec<f32>> {
        Err(RagError::Encoding { model: model.id.clone(), message: "encoder offline".to_string() })
    }
}

pub fn model(dimension: usize) -> ModelDescriptor {
    ModelDescriptor::new(format!("test/model-{dimension}d"), dimension, PoolingMode::Mean, 128)
        .unwrap()
}

pub fn chunk(id: &str, content: &str, chunk_index: u32) -> DocumentChunk {
    DocumentChunk {
        chunk_id: id.to_string(),
        source_id: "doc-1".to_string(),
        content: content.to_string(),
        chunk_index,
        token_count: 0,
        metadata: HashMap::new(),
    }
}

pub fn candidate(id: &str, content: &str, similarity: f64) -> SearchResult {
    SearchResult {
        chunk_id: id.to_string(),
        source_id: "doc-1".to_string(),
        content: content.to_string(),
        chunk_index: 0,
        similarity,
        metadata: HashMap::new(),
    }
}

/// Unit vector in 2D whose cosine similarity with `[1, 0]` is `s`.
pub fn unit_2d(s: f64) -> Vec<f32> {
    vec![s as f32, (1.0 - s * s).sqrt() as f32]
}

/// Store with one partition for `model` holding `(chunk, vector)` pairs.
pub async fn store_with(
    model: &ModelDescriptor,
    entries: Vec<(DocumentChunk, Vec<f32>)>,
) -> Arc<InMemoryVectorStore> {
    let store = InMemoryVectorStore::new();
    store.create_partition(&model.partition, model.dimension).await.unwrap();
    let chunks: Vec<DocumentChunk> = entries.iter().map(|(c, _)| c.clone()).collect();
    let embeddings: Vec<ChunkEmbedding> = entries
        .into_iter()
        .map(|(c, vector)| ChunkEmbedding { chunk_id: c.chunk_id, model_id: model.id.clone(), vector })
        .collect();
    store.upsert_chunks(&chunks).await.unwrap();
    store.upsert_embeddings(&model.partition, &embeddings).await.unwrap();
    Arc::new(store)
}

mod common;

use std::sync::Arc;

use embench_rag::{
    InMemoryVectorStore, KeywordReranker, RagError, RetrievalConfig, VectorRetriever,
};

use common::{FailingEncoder, MapEncoder, chunk, model, unit_2d};

const SIMILARITIES: [f64; 5] = [0.95, 0.80, 0.60, 0.40, 0.20];

async fn five_chunk_retriever() -> VectorRetriever {
    let descriptor = model(2);
    let entries = SIMILARITIES
        .iter()
        .enumerate()
        .map(|(i, s)| (chunk(&format!("c{i}"), &format!("chunk {i}"), i as u32), unit_2d(*s)))
        .collect();
    let store = common::store_with(&descriptor, entries).await;
    VectorRetriever::builder()
        .descriptor(descriptor)
        .encoder(Arc::new(MapEncoder::new().with("q", vec![1.0, 0.0])))
        .store(store)
        .reranker(Arc::new(KeywordReranker::default()))
        .build()
        .unwrap()
}

#[tokio::test]
async fn search_keeps_top_k_above_threshold() {
    let retriever = five_chunk_retriever().await;

    let results = retriever.search("q", 3, 0.5).await.unwrap();

    let ids: Vec<&str> = results.iter().map(|r| r.chunk_id.as_str()).collect();
    assert_eq!(ids, ["c0", "c1", "c2"]);
    for (result, expected) in results.iter().zip(SIMILARITIES) {
        assert!((result.similarity - expected).abs() < 1e-4, "{} vs {expected}", result.similarity);
    }
}

#[tokio::test]
async fn threshold_can_cut_below_top_k() {
    let retriever = five_chunk_retriever().await;
    let results = retriever.search("q", 5, 0.7).await.unwrap();
    assert_eq!(results.len(), 2);
}

#[tokio::test]
async fn session_opens_lazily_and_close_is_idempotent() {
    let retriever = five_chunk_retriever().await;
    assert!(!retriever.is_connected().await);

    retriever.search("q", 1, 0.0).await.unwrap();
    assert!(retriever.is_connected().await);

    retriever.close().await;
    retriever.close().await;
    assert!(!retriever.is_connected().await);

    // A closed retriever reconnects on the next search.
    assert_eq!(retriever.search("q", 1, 0.0).await.unwrap().len(), 1);
}

#[tokio::test]
async fn empty_partition_returns_nothing() {
    let descriptor = model(2);
    let store = common::store_with(&descriptor, vec![]).await;
    let retriever = VectorRetriever::builder()
        .descriptor(descriptor)
        .encoder(Arc::new(MapEncoder::new().with("q", vec![1.0, 0.0])))
        .store(store)
        .build()
        .unwrap();
    assert!(retriever.search("q", 5, 0.0).await.unwrap().is_empty());
}

#[tokio::test]
async fn encoder_failure_surfaces_as_encoding_error() {
    let descriptor = model(2);
    let store = common::store_with(&descriptor, vec![]).await;
    let retriever = VectorRetriever::builder()
        .descriptor(descriptor)
        .encoder(Arc::new(FailingEncoder))
        .store(store)
        .build()
        .unwrap();

    let err = retriever.search("q", 5, 0.0).await.unwrap_err();
    assert!(err.is_encoding());
    assert!(!retriever.is_connected().await);
}

#[tokio::test]
async fn wrong_vector_length_is_a_dimension_mismatch() {
    let descriptor = model(2);
    let store = common::store_with(&descriptor, vec![]).await;
    let retriever = VectorRetriever::builder()
        .descriptor(descriptor)
        .encoder(Arc::new(MapEncoder::new().with("q", vec![1.0, 0.0, 0.0])))
        .store(store)
        .build()
        .unwrap();

    let err = retriever.search("q", 5, 0.0).await.unwrap_err();
    assert!(matches!(err, RagError::DimensionMismatch { expected: 2, actual: 3, .. }));
}

#[tokio::test]
async fn missing_partition_is_a_retrieval_error() {
    let retriever = VectorRetriever::builder()
        .descriptor(model(2))
        .encoder(Arc::new(MapEncoder::new().with("q", vec![1.0, 0.0])))
        .store(Arc::new(InMemoryVectorStore::new()))
        .build()
        .unwrap();

    let err = retriever.search("q", 5, 0.0).await.unwrap_err();
    assert!(err.is_retrieval());
}

#[tokio::test]
async fn reranking_requires_a_reranker() {
    let descriptor = model(2);
    let store = common::store_with(&descriptor, vec![]).await;
    let retriever = VectorRetriever::builder()
        .descriptor(descriptor)
        .encoder(Arc::new(MapEncoder::new().with("q", vec![1.0, 0.0])))
        .store(store)
        .build()
        .unwrap();

    let err = retriever.search_with_reranking("q", 5, None).await.unwrap_err();
    assert!(matches!(err, RagError::Config(_)));
}

#[tokio::test]
async fn reranked_search_draws_from_a_wider_pool() {
    let descriptor = model(2);
    let entries = vec![
        (chunk("a", "unrelated text", 0), unit_2d(0.80)),
        (chunk("b", "other words", 1), unit_2d(0.79)),
        (chunk("c", "deposit support", 2), unit_2d(0.75)),
    ];
    let store = common::store_with(&descriptor, entries).await;
    let retriever = VectorRetriever::builder()
        .descriptor(descriptor)
        .encoder(Arc::new(MapEncoder::new().with("deposit support", vec![1.0, 0.0])))
        .store(store)
        .reranker(Arc::new(KeywordReranker::default()))
        .config(RetrievalConfig::builder().rerank_pool_factor(3).build().unwrap())
        .build()
        .unwrap();

    let plain = retriever.search("deposit support", 1, 0.0).await.unwrap();
    assert_eq!(plain[0].chunk_id, "a");

    let reranked = retriever.search_with_reranking("deposit support", 1, None).await.unwrap();
    assert_eq!(reranked.len(), 1);
    assert_eq!(reranked[0].chunk_id(), "c");
    assert_eq!(reranked[0].scores.keyword_score, Some(1.0));
}

#[test]
fn builder_rejects_missing_fields() {
    let err = VectorRetriever::builder().descriptor(model(2)).build().err().unwrap();
    assert!(matches!(err, RagError::Config(msg) if msg.contains("encoder")));
}

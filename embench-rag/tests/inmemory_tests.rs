//! Property tests for partition search ordering, bounds, and filtering.

mod common;

use std::sync::Arc;

use embench_rag::{
    ChunkEmbedding, CorpusSnapshot, DocumentChunk, InMemoryVectorStore, ModelRegistry,
    SnapshotVector, VectorRetriever, VectorStore,
};
use proptest::prelude::*;

use common::{MapEncoder, chunk, model};

const DIM: usize = 8;

/// Generate a non-zero L2-normalized embedding of the given dimension.
fn arb_normalized_embedding(dim: usize) -> impl Strategy<Value = Vec<f32>> {
    proptest::collection::vec(-1.0f32..1.0f32, dim).prop_filter_map(
        "non-zero embedding",
        |mut v| {
            let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
            if norm < 1e-4 {
                return None;
            }
            for val in &mut v {
                *val /= norm;
            }
            Some(v)
        },
    )
}

/// Generate distinct chunks with normalized embeddings; duplicated vectors
/// exercise the chunk-id tie-break.
fn arb_corpus(dim: usize) -> impl Strategy<Value = Vec<(DocumentChunk, Vec<f32>)>> {
    proptest::collection::vec(("[a-z ]{5,30}", arb_normalized_embedding(dim), any::<bool>()), 1..20)
        .prop_map(|items| {
            let mut previous: Option<Vec<f32>> = None;
            items
                .into_iter()
                .enumerate()
                .map(|(i, (text, embedding, repeat))| {
                    let vector = match (&previous, repeat) {
                        (Some(prev), true) => prev.clone(),
                        _ => embedding,
                    };
                    previous = Some(vector.clone());
                    (chunk(&format!("c{i:03}"), &text, i as u32), vector)
                })
                .collect()
        })
}

/// *For any* corpus stored in one partition, `search` SHALL return results
/// ordered by descending similarity (ties by ascending chunk id), with
/// `similarity >= min_similarity`, at most `top_k` of them, and identical
/// output on repeated calls.
mod prop_partition_search {
    use super::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        #[test]
        fn search_is_ordered_filtered_bounded_and_deterministic(
            corpus in arb_corpus(DIM),
            query in arb_normalized_embedding(DIM),
            top_k in 1usize..25,
            min_similarity in -1.0f64..1.0f64,
        ) {
            let rt = tokio::runtime::Runtime::new().unwrap();
            let stored = corpus.len();
            let (first, second) = rt.block_on(async {
                let descriptor = model(DIM);
                let store = common::store_with(&descriptor, corpus).await;
                let encoder = Arc::new(MapEncoder::new().with("q", query));
                let retriever = VectorRetriever::builder()
                    .descriptor(descriptor)
                    .encoder(encoder)
                    .store(store)
                    .build()
                    .unwrap();
                let first = retriever.search("q", top_k, min_similarity).await.unwrap();
                let second = retriever.search("q", top_k, min_similarity).await.unwrap();
                (first, second)
            });

            prop_assert!(first.len() <= top_k);
            prop_assert!(first.len() <= stored);
            prop_assert_eq!(&first, &second);

            for result in &first {
                prop_assert!(result.similarity >= min_similarity);
            }
            for pair in first.windows(2) {
                let ordered = pair[0].similarity > pair[1].similarity
                    || (pair[0].similarity == pair[1].similarity
                        && pair[0].chunk_id < pair[1].chunk_id);
                prop_assert!(
                    ordered,
                    "out of order: {} ({}) before {} ({})",
                    pair[0].chunk_id, pair[0].similarity, pair[1].chunk_id, pair[1].similarity
                );
            }
        }
    }
}

#[tokio::test]
async fn partitions_are_isolated() {
    let small = model(2);
    let large = model(3);
    let store = InMemoryVectorStore::new();
    store.create_partition(&small.partition, 2).await.unwrap();
    store.create_partition(&large.partition, 3).await.unwrap();
    store.upsert_chunks(&[chunk("a", "alpha", 0), chunk("b", "beta", 1)]).await.unwrap();
    store
        .upsert_embeddings(
            &small.partition,
            &[ChunkEmbedding { chunk_id: "a".into(), model_id: small.id.clone(), vector: vec![1.0, 0.0] }],
        )
        .await
        .unwrap();

    let small_session = store.connect(&small.partition).await.unwrap();
    let large_session = store.connect(&large.partition).await.unwrap();
    assert_eq!(small_session.count().await.unwrap(), 1);
    assert_eq!(large_session.count().await.unwrap(), 0);
    assert!(large_session.nearest(&[1.0, 0.0, 0.0], 5).await.unwrap().is_empty());
}

#[tokio::test]
async fn wrong_dimension_upsert_is_rejected() {
    let descriptor = model(2);
    let store = InMemoryVectorStore::new();
    store.create_partition(&descriptor.partition, 2).await.unwrap();
    let err = store
        .upsert_embeddings(
            &descriptor.partition,
            &[ChunkEmbedding { chunk_id: "a".into(), model_id: descriptor.id.clone(), vector: vec![1.0] }],
        )
        .await
        .unwrap_err();
    assert!(err.is_retrieval());
}

#[tokio::test]
async fn recreating_a_partition_with_another_dimension_fails() {
    let descriptor = model(2);
    let store = InMemoryVectorStore::new();
    store.create_partition(&descriptor.partition, 2).await.unwrap();
    store.create_partition(&descriptor.partition, 2).await.unwrap();

    let err = store.create_partition(&descriptor.partition, 3).await.unwrap_err();
    assert!(err.is_retrieval());
    assert!(err.to_string().contains("already exists"));
}

#[tokio::test]
async fn snapshot_file_round_trips_into_a_store() {
    let registry = ModelRegistry::builtin();
    let descriptor = registry.resolve("jhgan/ko-sroberta-multitask").unwrap().clone();
    let mut vector = vec![0.0f32; descriptor.dimension];
    vector[0] = 1.0;

    let snapshot = CorpusSnapshot {
        chunks: vec![chunk("c1", "예금 금리 안내", 0)],
        embeddings: [(
            descriptor.id.clone(),
            vec![SnapshotVector { chunk_id: "c1".into(), vector: vector.clone() }],
        )]
        .into_iter()
        .collect(),
    };

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("corpus.json");
    std::fs::write(&path, serde_json::to_string(&snapshot).unwrap()).unwrap();

    let store = InMemoryVectorStore::load_snapshot(&path, &registry).await.unwrap();
    let session = store.connect(&descriptor.partition).await.unwrap();
    let results = session.nearest(&vector, 5).await.unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].content, "예금 금리 안내");
    assert!((results[0].similarity - 1.0).abs() < 1e-6);
}

#[tokio::test]
async fn snapshot_with_unregistered_model_fails() {
    let registry = ModelRegistry::builtin();
    let snapshot = CorpusSnapshot {
        chunks: vec![],
        embeddings: [("someone/unknown".to_string(), vec![])].into_iter().collect(),
    };
    let err = InMemoryVectorStore::from_snapshot(snapshot, &registry).await.unwrap_err();
    assert!(matches!(err, embench_rag::RagError::UnknownModel(_)));
}

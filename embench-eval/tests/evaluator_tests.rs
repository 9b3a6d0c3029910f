//! End-to-end evaluator tests against an in-memory corpus.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use embench_eval::{
    EvalConfig, EvalError, EvaluationQuery, EvaluationReport, EvaluationStatus, Evaluator,
    model_key,
};
use embench_rag::{
    ChunkEmbedding, DocumentChunk, Encoder, InMemoryVectorStore, KeywordReranker,
    ModelDescriptor, ModelRegistry, PoolingMode, RagError, Result, VectorStore,
};

const HEALTHY: &str = "test/healthy";
const MISSING: &str = "test/missing-partition";

/// Every text encodes to the same unit vector.
struct ConstantEncoder;

#[async_trait]
impl Encoder for ConstantEncoder {
    async fn encode_query(&self, _text: &str, _model: &ModelDescriptor) -> Result<Vec<f32>> {
        Ok(vec![1.0, 0.0])
    }
}

fn descriptor(id: &str) -> ModelDescriptor {
    ModelDescriptor::new(id, 2, PoolingMode::Cls, 512).unwrap()
}

fn chunk(id: &str, content: &str) -> DocumentChunk {
    DocumentChunk {
        chunk_id: id.to_string(),
        source_id: "faq".to_string(),
        content: content.to_string(),
        chunk_index: 0,
        token_count: 0,
        metadata: HashMap::new(),
    }
}

/// Only the healthy model has a partition.
async fn evaluator(config: EvalConfig) -> Evaluator {
    let healthy = descriptor(HEALTHY);
    let store = InMemoryVectorStore::new();
    store.create_partition(&healthy.partition, 2).await.unwrap();
    store
        .upsert_chunks(&[chunk("c1", "주택담보대출 금리 안내"), chunk("c2", "해외 송금 수수료 안내")])
        .await
        .unwrap();
    let embedding = |id: &str, vector: Vec<f32>| ChunkEmbedding {
        chunk_id: id.to_string(),
        model_id: HEALTHY.to_string(),
        vector,
    };
    store
        .upsert_embeddings(&healthy.partition, &[embedding("c1", vec![1.0, 0.0]), embedding("c2", vec![0.6, 0.8])])
        .await
        .unwrap();

    Evaluator::builder()
        .registry(ModelRegistry::from_descriptors(vec![healthy, descriptor(MISSING)]).unwrap())
        .encoder(Arc::new(ConstantEncoder))
        .store(Arc::new(store))
        .reranker(Arc::new(KeywordReranker::default()))
        .config(config)
        .build()
        .unwrap()
}

fn queries() -> Vec<EvaluationQuery> {
    vec![
        EvaluationQuery::new("대출 금리").with_keywords(["대출"]),
        EvaluationQuery::new("송금 수수료").with_keywords(["송금"]),
    ]
}

fn model_ids() -> Vec<String> {
    vec![HEALTHY.to_string(), MISSING.to_string()]
}

#[tokio::test]
async fn healthy_model_completes_with_metrics() {
    let evaluator = evaluator(EvalConfig::default()).await;

    let result = evaluator.evaluate_model(HEALTHY, &queries(), 2, false).await.unwrap();

    assert_eq!(result.model_key, HEALTHY);
    assert_eq!(result.total_queries, 2);
    assert_eq!(result.successful_queries, 2);
    let metrics = result.metrics().unwrap();
    assert_eq!(metrics.queries_with_ground_truth, 2);
    assert_eq!(metrics.standard.hit_rate_at_3, 1.0);
    // "대출 금리" hits at rank 1, "송금 수수료" at rank 2.
    assert!((metrics.standard.mrr - 0.75).abs() < 1e-9);
}

#[tokio::test]
async fn retrieval_failure_is_recorded_not_raised() {
    let evaluator = evaluator(EvalConfig::default()).await;

    let result = evaluator.evaluate_model(MISSING, &queries(), 2, false).await.unwrap();

    assert!(result.is_failed());
    assert_eq!(result.successful_queries, 0);
    assert!(matches!(&result.status, EvaluationStatus::Failed { error } if error.contains("does not exist")));
}

#[tokio::test]
async fn unknown_model_is_a_configuration_error() {
    let evaluator = evaluator(EvalConfig::default()).await;

    let err = evaluator.evaluate_model("nobody/nothing", &queries(), 2, false).await.unwrap_err();
    assert!(matches!(err, EvalError::Rag(RagError::UnknownModel(_))));

    let ids = vec![HEALTHY.to_string(), "nobody/nothing".to_string()];
    assert!(evaluator.evaluate_all(&ids, &queries(), 2, false).await.is_err());
}

#[tokio::test]
async fn partial_failure_does_not_abort_the_batch() {
    let config = EvalConfig::builder().model_concurrency(2).build().unwrap();
    let evaluator = evaluator(config).await;

    let batch = evaluator.evaluate_all(&model_ids(), &queries(), 2, true).await.unwrap();

    let keys: Vec<&str> = batch.results.iter().map(|r| r.model_key.as_str()).collect();
    assert_eq!(
        keys,
        [
            HEALTHY.to_string(),
            model_key(HEALTHY, true),
            MISSING.to_string(),
            model_key(MISSING, true)
        ]
    );
    assert_eq!(batch.failed().count(), 2);

    // Failed runs are excluded from leaderboards and deltas.
    assert_eq!(batch.comparison.comparisons.len(), 2);
    let rankings = &batch.comparison.rankings;
    for winner in [&rankings.fastest, &rankings.most_accurate, &rankings.best_recall, &rankings.best_mrr] {
        assert!(winner.as_deref().is_some_and(|key| key.starts_with(HEALTHY)));
    }
    let reranking = batch.reranking_comparison.as_ref().unwrap();
    assert!(reranking.get(HEALTHY).is_some());
    assert!(reranking.get(MISSING).is_none());
}

#[tokio::test]
async fn run_follows_the_configured_mode() {
    let config = EvalConfig::builder().use_reranking(true).top_k(1).build().unwrap();
    let evaluator = evaluator(config).await;

    let batch = evaluator.run(&[HEALTHY.to_string()], &queries()).await.unwrap();

    assert_eq!(batch.results.len(), 1);
    assert!(batch.results[0].use_reranking);
    assert!(batch.reranking_comparison.is_none());
}

#[tokio::test]
async fn report_has_the_documented_shape() {
    let evaluator = evaluator(EvalConfig::default()).await;
    let batch = evaluator.evaluate_all(&model_ids(), &queries(), 2, true).await.unwrap();
    let report = EvaluationReport::from_batch(&batch);

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("report.json");
    report.write_json(&path).await.unwrap();

    let json: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    let healthy = &json["evaluation_results"][HEALTHY];
    assert_eq!(healthy["model_name"], HEALTHY);
    assert_eq!(healthy["use_reranking"], false);
    assert!(healthy["metrics"]["standard"]["ndcg_at_5"].is_number());
    assert!(json["evaluation_results"][MISSING]["error"].is_string());
    assert!(json["comparison"]["rankings"]["fastest"].is_string());
    assert!(json["comparison"]["comparisons"].is_array());
    assert!(json["reranking_comparison"][HEALTHY]["latency_overhead_ms"].is_number());
    assert!(json["summary"].as_str().unwrap().contains("FAILED"));
    assert!(json["timestamp"].is_string());
}

#[tokio::test]
async fn per_model_reranker_factory_sees_the_evaluated_model() {
    let seen = Arc::new(std::sync::Mutex::new(Vec::new()));
    let recorder = seen.clone();
    let base = evaluator(EvalConfig::default()).await;
    let evaluator = Evaluator::builder()
        .registry(base.registry().clone())
        .encoder(Arc::new(ConstantEncoder))
        .store(Arc::new(InMemoryVectorStore::new()))
        .reranker_factory(Arc::new(move |model: &ModelDescriptor| {
            recorder.lock().unwrap().push(model.id.clone());
            Ok(Arc::new(KeywordReranker::default()) as Arc<dyn embench_rag::Reranker>)
        }))
        .build()
        .unwrap();

    let batch = evaluator.evaluate_all(&model_ids(), &queries(), 2, true).await.unwrap();

    assert_eq!(batch.results.len(), 4);
    assert_eq!(*seen.lock().unwrap(), [HEALTHY, MISSING]);
}

#[tokio::test]
async fn reranked_run_without_reranker_is_a_configuration_error() {
    let evaluator = Evaluator::builder()
        .registry(ModelRegistry::from_descriptors(vec![descriptor(HEALTHY)]).unwrap())
        .encoder(Arc::new(ConstantEncoder))
        .store(Arc::new(InMemoryVectorStore::new()))
        .build()
        .unwrap();

    let err = evaluator.evaluate_model(HEALTHY, &queries(), 2, true).await.unwrap_err();
    assert!(matches!(err, EvalError::Config(_)));
}

#[tokio::test]
async fn reranker_factory_failure_is_recorded_per_model() {
    let base = evaluator(EvalConfig::default()).await;
    let evaluator = Evaluator::builder()
        .registry(base.registry().clone())
        .encoder(Arc::new(ConstantEncoder))
        .store(Arc::new(InMemoryVectorStore::new()))
        .reranker_factory(Arc::new(|model: &ModelDescriptor| {
            if model.id == MISSING {
                return Err(RagError::Config("no reranker for this model".to_string()));
            }
            Ok(Arc::new(KeywordReranker::default()) as Arc<dyn embench_rag::Reranker>)
        }))
        .build()
        .unwrap();

    let batch = evaluator.evaluate_all(&model_ids(), &queries(), 2, true).await.unwrap();

    assert_eq!(batch.results.len(), 4);
    let rejected = &batch.results[3];
    assert_eq!(rejected.model_key, model_key(MISSING, true));
    assert!(rejected.error().is_some_and(|e| e.contains("no reranker for this model")));
    assert_eq!(rejected.total_queries, 2);
}

#[tokio::test]
async fn compared_reranking_without_reranker_fails_before_running() {
    let evaluator = Evaluator::builder()
        .registry(ModelRegistry::from_descriptors(vec![descriptor(HEALTHY)]).unwrap())
        .encoder(Arc::new(ConstantEncoder))
        .store(Arc::new(InMemoryVectorStore::new()))
        .build()
        .unwrap();

    let err = evaluator
        .evaluate_all(&[HEALTHY.to_string()], &queries(), 2, true)
        .await
        .unwrap_err();
    assert!(matches!(err, EvalError::Config(_)));
}

#[tokio::test]
async fn duplicate_queries_count_once_whether_the_run_completes_or_fails() {
    let evaluator = evaluator(EvalConfig::default()).await;
    let mut queries = queries();
    queries.push(queries[0].clone());

    let completed = evaluator.evaluate_model(HEALTHY, &queries, 2, false).await.unwrap();
    let failed = evaluator.evaluate_model(MISSING, &queries, 2, false).await.unwrap();

    assert!(failed.is_failed());
    assert_eq!(completed.total_queries, 2);
    assert_eq!(failed.total_queries, completed.total_queries);
}

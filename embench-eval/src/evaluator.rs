//! Runs the query set against one or more models.
//!
//! The evaluator is the first layer that turns a retrieval failure into a
//! recorded result: a model whose search fails is reported as
//! [`EvaluationStatus::Failed`] and the batch moves on to the next model.
//!
//! # Example
//!
//! ```rust,ignore
//! use embench_eval::{Evaluator, EvalConfig, default_queries};
//!
//! let evaluator = Evaluator::builder()
//!     .registry(ModelRegistry::builtin())
//!     .encoder(encoder)
//!     .store(store)
//!     .reranker(reranker)
//!     .config(EvalConfig::default())
//!     .build()?;
//!
//! let batch = evaluator.evaluate_all(&model_ids, &default_queries(), 5, true).await?;
//! ```

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use embench_rag::{
    Encoder, ModelDescriptor, ModelRegistry, Reranker, RetrievalConfig, VectorRetriever,
    VectorStore,
};
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};

use crate::comparison::{ModelComparison, RerankingComparison};
use crate::config::EvalConfig;
use crate::error::{EvalError, Result};
use crate::metrics::{ComprehensiveMetrics, MetricsCalculator, QueryRun, RankedItem};
use crate::queries::{EvaluationQuery, expected_keywords};

/// Outcome of one model run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum EvaluationStatus {
    Completed { metrics: ComprehensiveMetrics },
    Failed { error: String },
}

/// One (model, reranking) evaluation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EvaluationResult {
    pub model_id: String,
    /// `model_id`, suffixed with `_reranked` for reranked runs.
    pub model_key: String,
    pub use_reranking: bool,
    pub total_queries: usize,
    pub successful_queries: usize,
    #[serde(flatten)]
    pub status: EvaluationStatus,
    pub timestamp: DateTime<Utc>,
}

impl EvaluationResult {
    pub fn metrics(&self) -> Option<&ComprehensiveMetrics> {
        match &self.status {
            EvaluationStatus::Completed { metrics } => Some(metrics),
            EvaluationStatus::Failed { .. } => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match &self.status {
            EvaluationStatus::Completed { .. } => None,
            EvaluationStatus::Failed { error } => Some(error),
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self.status, EvaluationStatus::Failed { .. })
    }
}

/// Key under which a run is reported.
pub fn model_key(model_id: &str, use_reranking: bool) -> String {
    if use_reranking { format!("{model_id}_reranked") } else { model_id.to_string() }
}

/// Every run of a batch plus the cross-model comparisons.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BatchResult {
    pub results: Vec<EvaluationResult>,
    pub comparison: ModelComparison,
    pub reranking_comparison: Option<RerankingComparison>,
}

impl BatchResult {
    pub fn failed(&self) -> impl Iterator<Item = &EvaluationResult> {
        self.results.iter().filter(|r| r.is_failed())
    }
}

/// Number of distinct query texts; runs are keyed by text.
fn distinct_queries(queries: &[EvaluationQuery]) -> usize {
    queries.iter().map(|q| q.text.as_str()).collect::<BTreeSet<_>>().len()
}

/// Builds the reranker used for one model's reranked run.
pub type RerankerFactory =
    Arc<dyn Fn(&ModelDescriptor) -> embench_rag::Result<Arc<dyn Reranker>> + Send + Sync>;

#[derive(Clone)]
enum RerankerSource {
    Shared(Arc<dyn Reranker>),
    PerModel(RerankerFactory),
}

impl RerankerSource {
    fn for_model(&self, model: &ModelDescriptor) -> embench_rag::Result<Arc<dyn Reranker>> {
        match self {
            Self::Shared(reranker) => Ok(reranker.clone()),
            Self::PerModel(factory) => factory(model),
        }
    }
}

/// Evaluates registered models over a query set.
pub struct Evaluator {
    registry: ModelRegistry,
    encoder: Arc<dyn Encoder>,
    store: Arc<dyn VectorStore>,
    reranker: Option<RerankerSource>,
    retrieval: RetrievalConfig,
    config: EvalConfig,
    calculator: MetricsCalculator,
}

impl Evaluator {
    pub fn builder() -> EvaluatorBuilder {
        EvaluatorBuilder::default()
    }

    pub fn config(&self) -> &EvalConfig {
        &self.config
    }

    pub fn registry(&self) -> &ModelRegistry {
        &self.registry
    }

    /// Evaluate one model over `queries`.
    ///
    /// Search failures, and a reranker factory that rejects the model, are
    /// recorded in the returned result, not raised. `total_queries` counts
    /// distinct query texts.
    ///
    /// # Errors
    ///
    /// Returns an error only for configuration problems: an unknown model or
    /// `use_reranking` without a configured reranker.
    pub async fn evaluate_model(
        &self,
        model_id: &str,
        queries: &[EvaluationQuery],
        top_k: usize,
        use_reranking: bool,
    ) -> Result<EvaluationResult> {
        let descriptor = self.registry.resolve(model_id)?.clone();
        let key = model_key(model_id, use_reranking);
        let total_queries = distinct_queries(queries);
        let failed = |error: String| EvaluationResult {
            model_id: model_id.to_string(),
            model_key: key.clone(),
            use_reranking,
            total_queries,
            successful_queries: 0,
            status: EvaluationStatus::Failed { error },
            timestamp: Utc::now(),
        };

        let reranker = if use_reranking {
            let source = self.reranker_source(model_id)?;
            match source.for_model(&descriptor) {
                Ok(reranker) => Some(reranker),
                Err(e) => {
                    error!(model = %model_id, error = %e, "failed to build reranker");
                    return Ok(failed(e.to_string()));
                }
            }
        } else {
            None
        };

        let mut builder = VectorRetriever::builder()
            .descriptor(descriptor)
            .encoder(self.encoder.clone())
            .store(self.store.clone())
            .config(self.retrieval.clone());
        if let Some(reranker) = reranker {
            builder = builder.reranker(reranker);
        }
        let retriever = builder.build()?;

        info!(model = %model_id, use_reranking, query_count = queries.len(), top_k, "evaluating model");
        let outcome = self.run_queries(&retriever, queries, top_k, use_reranking).await;
        retriever.close().await;

        let result = match outcome {
            Ok(runs) => {
                let metrics = self.calculator.calculate(&runs, Some(&expected_keywords(queries)));
                info!(
                    model = %model_id,
                    use_reranking,
                    successful_queries = metrics.successful_queries,
                    avg_latency_ms = metrics.latency.avg_ms,
                    "model evaluation completed"
                );
                EvaluationResult {
                    model_id: model_id.to_string(),
                    model_key: key.clone(),
                    use_reranking,
                    total_queries,
                    successful_queries: metrics.successful_queries,
                    status: EvaluationStatus::Completed { metrics },
                    timestamp: Utc::now(),
                }
            }
            Err(e) => {
                error!(model = %model_id, use_reranking, error = %e, "model evaluation failed");
                failed(e.to_string())
            }
        };
        Ok(result)
    }

    fn reranker_source(&self, model_id: &str) -> Result<&RerankerSource> {
        self.reranker.as_ref().ok_or_else(|| {
            EvalError::Config(format!(
                "reranking requested for '{model_id}' but no reranker is configured"
            ))
        })
    }

    async fn run_queries(
        &self,
        retriever: &VectorRetriever,
        queries: &[EvaluationQuery],
        top_k: usize,
        use_reranking: bool,
    ) -> embench_rag::Result<BTreeMap<String, QueryRun>> {
        let mut runs = BTreeMap::new();
        for query in queries {
            let started = Instant::now();
            let results: Vec<RankedItem> = if use_reranking {
                retriever
                    .search_with_reranking(&query.text, top_k, None)
                    .await?
                    .into_iter()
                    .map(RankedItem::from)
                    .collect()
            } else {
                retriever
                    .search(&query.text, top_k, self.retrieval.min_similarity)
                    .await?
                    .into_iter()
                    .map(RankedItem::from)
                    .collect()
            };
            let latency_ms = started.elapsed().as_secs_f64() * 1000.0;
            debug!(
                model = %retriever.descriptor().id,
                result_count = results.len(),
                latency_ms,
                "query evaluated"
            );
            runs.insert(query.text.clone(), QueryRun { results, latency_ms });
        }
        Ok(runs)
    }

    /// Evaluate every model in `model_ids`, optionally a second time with
    /// reranking, and compare the runs.
    ///
    /// Up to `model_concurrency` runs are in flight at once; results keep
    /// the input order.
    ///
    /// # Errors
    ///
    /// Returns [`EvalError::Rag`] if any model id is unknown, or
    /// [`EvalError::Config`] if reranking is compared without a reranker.
    /// Nothing is evaluated in either case.
    pub async fn evaluate_all(
        &self,
        model_ids: &[String],
        queries: &[EvaluationQuery],
        top_k: usize,
        compare_reranking: bool,
    ) -> Result<BatchResult> {
        let jobs: Vec<(&str, bool)> = model_ids
            .iter()
            .flat_map(|id| {
                let reranked = compare_reranking.then_some((id.as_str(), true));
                std::iter::once((id.as_str(), false)).chain(reranked)
            })
            .collect();
        self.evaluate_jobs(&jobs, queries, top_k, compare_reranking).await
    }

    /// Evaluate `model_ids` as configured by [`EvalConfig`].
    ///
    /// With `compare_reranking` every model runs twice; otherwise once, with
    /// or without reranking per `use_reranking`.
    pub async fn run(&self, model_ids: &[String], queries: &[EvaluationQuery]) -> Result<BatchResult> {
        if self.config.compare_reranking {
            return self.evaluate_all(model_ids, queries, self.config.top_k, true).await;
        }
        let jobs: Vec<(&str, bool)> =
            model_ids.iter().map(|id| (id.as_str(), self.config.use_reranking)).collect();
        self.evaluate_jobs(&jobs, queries, self.config.top_k, false).await
    }

    async fn evaluate_jobs(
        &self,
        jobs: &[(&str, bool)],
        queries: &[EvaluationQuery],
        top_k: usize,
        compare_reranking: bool,
    ) -> Result<BatchResult> {
        for (model_id, use_reranking) in jobs {
            self.registry.resolve(model_id)?;
            if *use_reranking {
                self.reranker_source(model_id)?;
            }
        }

        let results: Vec<EvaluationResult> = stream::iter(jobs.iter().copied())
            .map(|(model_id, use_reranking)| {
                self.evaluate_model(model_id, queries, top_k, use_reranking)
            })
            .buffered(self.config.model_concurrency.max(1))
            .collect::<Vec<_>>()
            .await
            .into_iter()
            .collect::<Result<_>>()?;

        let comparison = ModelComparison::from_results(&results);
        let reranking_comparison =
            compare_reranking.then(|| RerankingComparison::from_results(&results));

        let failed = results.iter().filter(|r| r.is_failed()).count();
        info!(run_count = results.len(), failed, "evaluation batch completed");
        Ok(BatchResult { results, comparison, reranking_comparison })
    }
}

/// Builder for an [`Evaluator`].
///
/// `registry`, `encoder` and `store` are required.
#[derive(Default)]
pub struct EvaluatorBuilder {
    registry: Option<ModelRegistry>,
    encoder: Option<Arc<dyn Encoder>>,
    store: Option<Arc<dyn VectorStore>>,
    reranker: Option<RerankerSource>,
    retrieval: Option<RetrievalConfig>,
    config: Option<EvalConfig>,
}

impl EvaluatorBuilder {
    pub fn registry(mut self, registry: ModelRegistry) -> Self {
        self.registry = Some(registry);
        self
    }

    pub fn encoder(mut self, encoder: Arc<dyn Encoder>) -> Self {
        self.encoder = Some(encoder);
        self
    }

    pub fn store(mut self, store: Arc<dyn VectorStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Reranker shared by every reranked run.
    pub fn reranker(mut self, reranker: Arc<dyn Reranker>) -> Self {
        self.reranker = Some(RerankerSource::Shared(reranker));
        self
    }

    /// Build a reranker per model, e.g. one that re-embeds with the model
    /// under evaluation.
    pub fn reranker_factory(mut self, factory: RerankerFactory) -> Self {
        self.reranker = Some(RerankerSource::PerModel(factory));
        self
    }

    /// Retrieval settings passed to every retriever (defaults to
    /// [`RetrievalConfig::default()`]).
    pub fn retrieval_config(mut self, retrieval: RetrievalConfig) -> Self {
        self.retrieval = Some(retrieval);
        self
    }

    pub fn config(mut self, config: EvalConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// # Errors
    ///
    /// Returns [`EvalError::Config`] if a required field is missing.
    pub fn build(self) -> Result<Evaluator> {
        let registry =
            self.registry.ok_or_else(|| EvalError::Config("registry is required".to_string()))?;
        let encoder =
            self.encoder.ok_or_else(|| EvalError::Config("encoder is required".to_string()))?;
        let store = self.store.ok_or_else(|| EvalError::Config("store is required".to_string()))?;
        let config = self.config.unwrap_or_default();
        let calculator = MetricsCalculator::new(config.domain_vocabulary.iter().cloned());

        Ok(Evaluator {
            registry,
            encoder,
            store,
            reranker: self.reranker,
            retrieval: self.retrieval.unwrap_or_default(),
            config,
            calculator,
        })
    }
}

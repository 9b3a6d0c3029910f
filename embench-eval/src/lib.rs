//! Evaluation of embedding models over a retrieval corpus.
//!
//! `embench-eval` runs a query set against every model partition through
//! [`embench_rag::VectorRetriever`], measures each run with the
//! [`MetricsCalculator`], and compares the runs:
//!
//! - [`Evaluator`] - per-model and batch evaluation, recording failures
//!   instead of aborting the batch
//! - [`MetricsCalculator`] - precision/recall/F1/hit rate/NDCG at 1, 3 and 5,
//!   MRR, latency statistics and domain coverage
//! - [`ModelComparison`] / [`RerankingComparison`] - leaderboards and
//!   baseline-vs-reranked deltas
//! - [`EvaluationReport`] - the JSON artifact

pub mod comparison;
pub mod config;
pub mod error;
pub mod evaluator;
pub mod metrics;
pub mod queries;
pub mod report;

pub use comparison::{ComparisonRow, ModelComparison, Rankings, RerankingComparison, RerankingDelta};
pub use config::{DEFAULT_DOMAIN_VOCABULARY, EvalConfig, EvalConfigBuilder};
pub use error::{EvalError, Result};
pub use evaluator::{
    BatchResult, EvaluationResult, EvaluationStatus, Evaluator, EvaluatorBuilder, RerankerFactory,
    model_key,
};
pub use metrics::{
    ComprehensiveMetrics, KoreanMetrics, LatencyMetrics, MetricsCalculator, QueryRun, RankedItem,
    StandardMetrics,
};
pub use queries::{EvaluationQuery, default_queries, expected_keywords, load_queries};
pub use report::{EvaluationReport, ReportEntry};

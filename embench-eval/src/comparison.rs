//! Cross-model leaderboards and the reranking delta report.
//!
//! Failed runs are excluded from both. Leaderboard ties go to the run that
//! comes first in the batch.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::evaluator::EvaluationResult;
use crate::metrics::ComprehensiveMetrics;

/// Model keys of the best run per criterion; `None` without completed runs.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Rankings {
    /// Lowest average latency.
    pub fastest: Option<String>,
    /// Highest average similarity.
    pub most_accurate: Option<String>,
    /// Highest recall@5.
    pub best_recall: Option<String>,
    /// Highest MRR.
    pub best_mrr: Option<String>,
}

/// Headline numbers of one completed run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ComparisonRow {
    pub model_key: String,
    pub model_id: String,
    pub use_reranking: bool,
    pub successful_queries: usize,
    pub avg_latency_ms: f64,
    pub avg_similarity: f64,
    pub precision_at_5: f64,
    pub recall_at_5: f64,
    pub mrr: f64,
    pub ndcg_at_5: f64,
}

impl ComparisonRow {
    fn new(result: &EvaluationResult, metrics: &ComprehensiveMetrics) -> Self {
        Self {
            model_key: result.model_key.clone(),
            model_id: result.model_id.clone(),
            use_reranking: result.use_reranking,
            successful_queries: result.successful_queries,
            avg_latency_ms: metrics.latency.avg_ms,
            avg_similarity: metrics.avg_similarity,
            precision_at_5: metrics.standard.precision_at_5,
            recall_at_5: metrics.standard.recall_at_5,
            mrr: metrics.standard.mrr,
            ndcg_at_5: metrics.standard.ndcg_at_5,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ModelComparison {
    pub rankings: Rankings,
    pub comparisons: Vec<ComparisonRow>,
}

impl ModelComparison {
    pub fn from_results(results: &[EvaluationResult]) -> Self {
        let comparisons: Vec<ComparisonRow> = results
            .iter()
            .filter_map(|r| r.metrics().map(|m| ComparisonRow::new(r, m)))
            .collect();

        let rankings = Rankings {
            fastest: best_by(&comparisons, |row| -row.avg_latency_ms),
            most_accurate: best_by(&comparisons, |row| row.avg_similarity),
            best_recall: best_by(&comparisons, |row| row.recall_at_5),
            best_mrr: best_by(&comparisons, |row| row.mrr),
        };
        Self { rankings, comparisons }
    }
}

/// Key of the row with the greatest finite `score`; the first one wins ties.
fn best_by(rows: &[ComparisonRow], score: impl Fn(&ComparisonRow) -> f64) -> Option<String> {
    let mut best: Option<(&ComparisonRow, f64)> = None;
    for row in rows {
        let value = score(row);
        if !value.is_finite() {
            continue;
        }
        if best.is_none_or(|(_, top)| value > top) {
            best = Some((row, value));
        }
    }
    best.map(|(row, _)| row.model_key.clone())
}

/// Change from a model's baseline run to its reranked run.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct RerankingDelta {
    pub baseline_similarity: f64,
    pub reranked_similarity: f64,
    /// Relative similarity change in percent; 0 when the baseline is 0.
    pub similarity_change_pct: f64,
    /// Extra average latency of the reranked run.
    pub latency_overhead_ms: f64,
    pub recall_at_5_change: f64,
    pub ndcg_at_5_change: f64,
}

impl RerankingDelta {
    pub fn between(baseline: &ComprehensiveMetrics, reranked: &ComprehensiveMetrics) -> Self {
        let base = baseline.avg_similarity;
        let similarity_change_pct =
            if base == 0.0 { 0.0 } else { (reranked.avg_similarity - base) / base.abs() * 100.0 };
        Self {
            baseline_similarity: base,
            reranked_similarity: reranked.avg_similarity,
            similarity_change_pct,
            latency_overhead_ms: reranked.latency.avg_ms - baseline.latency.avg_ms,
            recall_at_5_change: reranked.standard.recall_at_5 - baseline.standard.recall_at_5,
            ndcg_at_5_change: reranked.standard.ndcg_at_5 - baseline.standard.ndcg_at_5,
        }
    }
}

/// Per-model deltas, keyed by model id.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(transparent)]
pub struct RerankingComparison {
    pub deltas: BTreeMap<String, RerankingDelta>,
}

impl RerankingComparison {
    /// Pair every model's completed baseline and reranked runs.
    pub fn from_results(results: &[EvaluationResult]) -> Self {
        let baselines = completed_runs(results, false);
        let reranked = completed_runs(results, true);

        let deltas = baselines
            .iter()
            .filter_map(|(id, base)| {
                reranked.get(id).map(|re| (id.to_string(), RerankingDelta::between(base, re)))
            })
            .collect();
        Self { deltas }
    }

    pub fn get(&self, model_id: &str) -> Option<&RerankingDelta> {
        self.deltas.get(model_id)
    }
}

fn completed_runs(
    results: &[EvaluationResult],
    use_reranking: bool,
) -> BTreeMap<&str, &ComprehensiveMetrics> {
    results
        .iter()
        .filter(|r| r.use_reranking == use_reranking)
        .filter_map(|r| r.metrics().map(|m| (r.model_id.as_str(), m)))
        .collect()
}

//! The JSON evaluation report.

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::comparison::{ModelComparison, RerankingComparison};
use crate::error::{EvalError, Result};
use crate::evaluator::{BatchResult, EvaluationResult};
use crate::metrics::ComprehensiveMetrics;

/// One run as it appears under `evaluation_results`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReportEntry {
    pub model_name: String,
    pub total_queries: usize,
    pub successful_queries: usize,
    pub use_reranking: bool,
    pub metrics: Option<ComprehensiveMetrics>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl From<&EvaluationResult> for ReportEntry {
    fn from(result: &EvaluationResult) -> Self {
        Self {
            model_name: result.model_id.clone(),
            total_queries: result.total_queries,
            successful_queries: result.successful_queries,
            use_reranking: result.use_reranking,
            metrics: result.metrics().cloned(),
            error: result.error().map(str::to_string),
            timestamp: result.timestamp,
        }
    }
}

/// The persisted artifact of an evaluation batch.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EvaluationReport {
    /// Runs keyed by model key (`<model>` or `<model>_reranked`).
    pub evaluation_results: BTreeMap<String, ReportEntry>,
    pub comparison: ModelComparison,
    pub reranking_comparison: Option<RerankingComparison>,
    pub summary: String,
    pub timestamp: DateTime<Utc>,
}

impl EvaluationReport {
    pub fn from_batch(batch: &BatchResult) -> Self {
        Self {
            evaluation_results: batch
                .results
                .iter()
                .map(|r| (r.model_key.clone(), ReportEntry::from(r)))
                .collect(),
            comparison: batch.comparison.clone(),
            reranking_comparison: batch.reranking_comparison.clone(),
            summary: summarize(batch),
            timestamp: Utc::now(),
        }
    }

    /// Serialize the report as pretty-printed JSON.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| EvalError::Report(format!("failed to serialize report: {e}")))
    }

    /// Write the report to `path`, replacing any existing file.
    ///
    /// # Errors
    ///
    /// Returns [`EvalError::Report`] if serialization or the write fails.
    pub async fn write_json(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let json = self.to_json()?;
        tokio::fs::write(path, json).await.map_err(|e| {
            EvalError::Report(format!("failed to write '{}': {e}", path.display()))
        })?;
        info!(path = %path.display(), "wrote evaluation report");
        Ok(())
    }
}

fn summarize(batch: &BatchResult) -> String {
    let mut out = String::new();
    let failed = batch.failed().count();
    let _ = writeln!(
        out,
        "Evaluated {} run(s): {} completed, {failed} failed.",
        batch.results.len(),
        batch.results.len() - failed
    );

    for row in &batch.comparison.comparisons {
        let _ = writeln!(
            out,
            "- {}: avg similarity {:.4}, recall@5 {:.4}, MRR {:.4}, NDCG@5 {:.4}, avg latency {:.1} ms",
            row.model_key, row.avg_similarity, row.recall_at_5, row.mrr, row.ndcg_at_5, row.avg_latency_ms
        );
    }
    for result in batch.failed() {
        let _ = writeln!(out, "- {}: FAILED ({})", result.model_key, result.error().unwrap_or("unknown error"));
    }

    let rankings = &batch.comparison.rankings;
    for (label, winner) in [
        ("Fastest", &rankings.fastest),
        ("Most accurate", &rankings.most_accurate),
        ("Best recall@5", &rankings.best_recall),
        ("Best MRR", &rankings.best_mrr),
    ] {
        if let Some(key) = winner {
            let _ = writeln!(out, "{label}: {key}");
        }
    }

    if let Some(reranking) = &batch.reranking_comparison {
        for (model, delta) in &reranking.deltas {
            let _ = writeln!(
                out,
                "Reranking {model}: similarity {:+.2}%, latency {:+.1} ms, recall@5 {:+.4}, NDCG@5 {:+.4}",
                delta.similarity_change_pct,
                delta.latency_overhead_ms,
                delta.recall_at_5_change,
                delta.ndcg_at_5_change
            );
        }
    }
    out.trim_end().to_string()
}

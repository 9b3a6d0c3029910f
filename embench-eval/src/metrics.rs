//! Retrieval quality, latency and domain-coverage metrics.
//!
//! [`MetricsCalculator::calculate`] is a pure function of the per-query runs
//! of one model. Relevance is operational: a result is relevant to a query
//! when its content contains, case-insensitively, at least one of the query's
//! expected keywords.
//!
//! Ratio metrics are computed at the cutoffs 1, 3 and 5 and averaged over
//! the queries that have expected keywords. Queries without ground truth
//! still count towards result and latency statistics.
//!
//! # References
//!
//! - Järvelin & Kekäläinen (2002). "Cumulated gain-based evaluation of IR techniques"

use std::collections::{BTreeMap, BTreeSet, HashMap};

use embench_rag::{RerankedResult, SearchResult};
use serde::{Deserialize, Serialize};

/// One ranked result as seen by the metrics.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RankedItem {
    pub chunk_id: String,
    pub content: String,
    /// Retrieval similarity; for reranked runs, the original similarity.
    pub similarity: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rerank_score: Option<f64>,
}

impl From<SearchResult> for RankedItem {
    fn from(result: SearchResult) -> Self {
        Self {
            chunk_id: result.chunk_id,
            content: result.content,
            similarity: result.similarity,
            rerank_score: None,
        }
    }
}

impl From<RerankedResult> for RankedItem {
    fn from(reranked: RerankedResult) -> Self {
        Self { rerank_score: Some(reranked.rerank_score), ..Self::from(reranked.result) }
    }
}

/// The ranked results and wall-clock latency of one query.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct QueryRun {
    pub results: Vec<RankedItem>,
    pub latency_ms: f64,
}

/// Standard IR metrics, averaged over queries with ground truth.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct StandardMetrics {
    pub precision_at_1: f64,
    pub precision_at_3: f64,
    pub precision_at_5: f64,
    pub recall_at_1: f64,
    pub recall_at_3: f64,
    pub recall_at_5: f64,
    pub f1_at_1: f64,
    pub f1_at_3: f64,
    pub f1_at_5: f64,
    pub hit_rate_at_1: f64,
    pub hit_rate_at_3: f64,
    pub hit_rate_at_5: f64,
    pub mrr: f64,
    pub ndcg_at_1: f64,
    pub ndcg_at_3: f64,
    pub ndcg_at_5: f64,
}

/// Per-query latency statistics in milliseconds.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct LatencyMetrics {
    pub avg_ms: f64,
    pub median_ms: f64,
    pub min_ms: f64,
    pub max_ms: f64,
    /// Population standard deviation; 0 with fewer than two samples.
    pub std_dev_ms: f64,
    pub p50_ms: f64,
    pub p95_ms: f64,
    pub p99_ms: f64,
}

/// Domain vocabulary coverage and keyword metrics.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct KoreanMetrics {
    /// Mean share of the domain vocabulary found per returned result.
    pub domain_specificity: f64,
    /// Mean similarity of all returned results.
    pub semantic_coherence: f64,
    /// Mean `|found| / |expected|` keywords per query.
    pub keyword_precision: f64,
    /// Same formula as `keyword_precision`; the two are always equal.
    pub keyword_recall: f64,
}

/// Everything measured for one model run.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ComprehensiveMetrics {
    pub total_queries: usize,
    /// Queries that returned at least one result.
    pub successful_queries: usize,
    pub queries_with_ground_truth: usize,
    pub total_results: usize,
    pub avg_results_per_query: f64,
    /// Mean similarity over all returned results.
    pub avg_similarity: f64,
    pub standard: StandardMetrics,
    pub latency: LatencyMetrics,
    pub korean: KoreanMetrics,
}

/// Computes [`ComprehensiveMetrics`] for a batch of query runs.
#[derive(Debug, Clone)]
pub struct MetricsCalculator {
    domain_vocabulary: Vec<String>,
}

impl MetricsCalculator {
    /// Create a calculator that measures coverage of `domain_vocabulary`.
    pub fn new<I, S>(domain_vocabulary: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut vocabulary: Vec<String> =
            domain_vocabulary.into_iter().map(|t| t.into().to_lowercase()).collect();
        vocabulary.sort();
        vocabulary.dedup();
        Self { domain_vocabulary: vocabulary }
    }

    /// Compute all metrics for one model's runs, keyed by query text.
    ///
    /// `expected_keywords` maps query text to its ground truth; queries that
    /// are missing from it or map to an empty set have no ground truth.
    pub fn calculate(
        &self,
        runs: &BTreeMap<String, QueryRun>,
        expected_keywords: Option<&HashMap<String, BTreeSet<String>>>,
    ) -> ComprehensiveMetrics {
        let all_results: Vec<&RankedItem> = runs.values().flat_map(|r| r.results.iter()).collect();
        let similarities: Vec<f64> = all_results.iter().map(|r| r.similarity).collect();

        let mut per_query = Vec::new();
        let mut keyword_coverage = Vec::new();
        for (query, run) in runs {
            let Some(expected) = expected_keywords
                .and_then(|map| map.get(query))
                .filter(|set| !set.is_empty())
            else {
                continue;
            };
            let expected: Vec<String> = expected.iter().map(|k| k.to_lowercase()).collect();
            per_query.push(QueryScores::compute(&run.results, &expected));
            keyword_coverage.push(keyword_coverage_ratio(&run.results, &expected));
        }

        let latencies: Vec<f64> = runs.values().map(|r| r.latency_ms).collect();
        let domain_scores: Vec<f64> =
            all_results.iter().map(|r| self.domain_specificity(&r.content)).collect();
        let keyword_ratio = mean(&keyword_coverage);
        let avg_similarity = mean(&similarities);

        ComprehensiveMetrics {
            total_queries: runs.len(),
            successful_queries: runs.values().filter(|r| !r.results.is_empty()).count(),
            queries_with_ground_truth: per_query.len(),
            total_results: all_results.len(),
            avg_results_per_query: if runs.is_empty() {
                0.0
            } else {
                all_results.len() as f64 / runs.len() as f64
            },
            avg_similarity,
            standard: QueryScores::average(&per_query),
            latency: latency_metrics(&latencies),
            korean: KoreanMetrics {
                domain_specificity: mean(&domain_scores),
                semantic_coherence: avg_similarity,
                keyword_precision: keyword_ratio,
                keyword_recall: keyword_ratio,
            },
        }
    }

    fn domain_specificity(&self, content: &str) -> f64 {
        if self.domain_vocabulary.is_empty() {
            return 0.0;
        }
        let content = content.to_lowercase();
        let found = self.domain_vocabulary.iter().filter(|t| content.contains(t.as_str())).count();
        found as f64 / self.domain_vocabulary.len() as f64
    }
}

const CUTOFFS: [usize; 3] = [1, 3, 5];

/// Binary relevance of every result, in rank order.
fn relevance(results: &[RankedItem], expected: &[String]) -> Vec<bool> {
    results
        .iter()
        .map(|r| {
            let content = r.content.to_lowercase();
            expected.iter().any(|k| content.contains(k.as_str()))
        })
        .collect()
}

fn keyword_coverage_ratio(results: &[RankedItem], expected: &[String]) -> f64 {
    let contents: Vec<String> = results.iter().map(|r| r.content.to_lowercase()).collect();
    let found = expected.iter().filter(|k| contents.iter().any(|c| c.contains(k.as_str()))).count();
    found as f64 / expected.len() as f64
}

/// Ratio metrics of one query, indexed like [`CUTOFFS`].
#[derive(Debug, Default)]
struct QueryScores {
    precision: [f64; 3],
    recall: [f64; 3],
    f1: [f64; 3],
    hit_rate: [f64; 3],
    ndcg: [f64; 3],
    mrr: f64,
}

impl QueryScores {
    fn compute(results: &[RankedItem], expected: &[String]) -> Self {
        let relevant = relevance(results, expected);
        let mut scores = Self::default();

        for (i, &k) in CUTOFFS.iter().enumerate() {
            let top = &relevant[..k.min(relevant.len())];
            let hits = top.iter().filter(|&&r| r).count() as f64;

            let precision = if top.is_empty() { 0.0 } else { hits / top.len() as f64 };
            let recall = (hits / expected.len() as f64).min(1.0);
            scores.precision[i] = precision;
            scores.recall[i] = recall;
            scores.f1[i] = f1(precision, recall);
            scores.hit_rate[i] = if hits > 0.0 { 1.0 } else { 0.0 };
            scores.ndcg[i] = ndcg(top, k.min(expected.len()));
        }

        scores.mrr = relevant.iter().position(|&r| r).map_or(0.0, |rank| 1.0 / (rank + 1) as f64);
        scores
    }

    fn average(queries: &[Self]) -> StandardMetrics {
        let at = |pick: fn(&Self) -> [f64; 3], i: usize| {
            mean(&queries.iter().map(|q| pick(q)[i]).collect::<Vec<_>>())
        };
        StandardMetrics {
            precision_at_1: at(|q| q.precision, 0),
            precision_at_3: at(|q| q.precision, 1),
            precision_at_5: at(|q| q.precision, 2),
            recall_at_1: at(|q| q.recall, 0),
            recall_at_3: at(|q| q.recall, 1),
            recall_at_5: at(|q| q.recall, 2),
            f1_at_1: at(|q| q.f1, 0),
            f1_at_3: at(|q| q.f1, 1),
            f1_at_5: at(|q| q.f1, 2),
            hit_rate_at_1: at(|q| q.hit_rate, 0),
            hit_rate_at_3: at(|q| q.hit_rate, 1),
            hit_rate_at_5: at(|q| q.hit_rate, 2),
            mrr: mean(&queries.iter().map(|q| q.mrr).collect::<Vec<_>>()),
            ndcg_at_1: at(|q| q.ndcg, 0),
            ndcg_at_3: at(|q| q.ndcg, 1),
            ndcg_at_5: at(|q| q.ndcg, 2),
        }
    }
}

fn f1(precision: f64, recall: f64) -> f64 {
    if precision + recall == 0.0 {
        0.0
    } else {
        2.0 * precision * recall / (precision + recall)
    }
}

/// Position discount for 1-based rank `rank`.
fn discount(rank: usize) -> f64 {
    1.0 / ((rank + 1) as f64).log2()
}

/// NDCG with binary relevance; the ideal ranking has `ideal_hits` relevant
/// results at the top.
fn ndcg(relevant: &[bool], ideal_hits: usize) -> f64 {
    let dcg: f64 =
        relevant.iter().enumerate().filter(|(_, r)| **r).map(|(i, _)| discount(i + 1)).sum();
    let idcg: f64 = (1..=ideal_hits).map(discount).sum();
    if idcg == 0.0 { 0.0 } else { (dcg / idcg).min(1.0) }
}

/// Arithmetic mean of the finite samples, 0 if there are none.
pub(crate) fn mean(values: &[f64]) -> f64 {
    let finite: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
    if finite.is_empty() {
        return 0.0;
    }
    finite.iter().sum::<f64>() / finite.len() as f64
}

/// Percentile `p` (0-100) of sorted samples, interpolating between ranks.
fn percentile(sorted: &[f64], p: f64) -> f64 {
    match sorted.len() {
        0 => 0.0,
        1 => sorted[0],
        n => {
            let rank = p / 100.0 * (n - 1) as f64;
            let lower = rank.floor() as usize;
            let upper = rank.ceil() as usize;
            let fraction = rank - lower as f64;
            sorted[lower] + (sorted[upper] - sorted[lower]) * fraction
        }
    }
}

fn latency_metrics(latencies: &[f64]) -> LatencyMetrics {
    let mut samples: Vec<f64> = latencies.iter().copied().filter(|v| v.is_finite()).collect();
    if samples.is_empty() {
        return LatencyMetrics::default();
    }
    samples.sort_by(f64::total_cmp);

    let avg = mean(&samples);
    let std_dev = if samples.len() < 2 {
        0.0
    } else {
        let variance =
            samples.iter().map(|v| (v - avg).powi(2)).sum::<f64>() / samples.len() as f64;
        variance.sqrt()
    };
    let median = percentile(&samples, 50.0);

    LatencyMetrics {
        avg_ms: avg,
        median_ms: median,
        min_ms: samples[0],
        max_ms: samples[samples.len() - 1],
        std_dev_ms: std_dev,
        p50_ms: median,
        p95_ms: percentile(&samples, 95.0),
        p99_ms: percentile(&samples, 99.0),
    }
}

//! Data types for indexed chunks, per-model embeddings, and ranked results.

use std::cmp::Ordering;
use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// A unit of indexed text, shared by every model partition.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DocumentChunk {
    /// Unique identifier for the chunk.
    pub chunk_id: String,
    /// The ID of the source document the chunk was cut from.
    pub source_id: String,
    /// The text content of the chunk.
    pub content: String,
    /// Zero-based position of the chunk inside its source document.
    pub chunk_index: u32,
    /// Number of tokens counted by the ingestion pipeline.
    #[serde(default)]
    pub token_count: u32,
    /// Key-value metadata inherited from the source document.
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

/// One model's vector for one chunk.
///
/// Embeddings belong to exactly one model partition and are never shared.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChunkEmbedding {
    /// The chunk this vector was computed for.
    pub chunk_id: String,
    /// The model that produced the vector.
    pub model_id: String,
    /// The embedding vector; its length equals the model's dimension.
    pub vector: Vec<f32>,
}

/// A candidate returned by similarity search.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SearchResult {
    /// The matched chunk's identifier.
    pub chunk_id: String,
    /// The ID of the source document.
    pub source_id: String,
    /// The matched chunk's text.
    pub content: String,
    /// Position of the chunk inside its source document.
    pub chunk_index: u32,
    /// `1 - cosine_distance` between the query and the chunk vector.
    pub similarity: f64,
    /// Metadata carried over from the chunk.
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

impl SearchResult {
    /// Build a search result from a stored chunk and its similarity.
    pub fn from_chunk(chunk: &DocumentChunk, similarity: f64) -> Self {
        Self {
            chunk_id: chunk.chunk_id.clone(),
            source_id: chunk.source_id.clone(),
            content: chunk.content.clone(),
            chunk_index: chunk.chunk_index,
            similarity,
            metadata: chunk.metadata.clone(),
        }
    }
}

/// Named auxiliary scores attached to a reranked candidate.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct ComponentScores {
    /// Lexical overlap between query and content keywords.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub keyword_score: Option<f64>,
    /// Proximity of the content length to the ideal length.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub length_score: Option<f64>,
    /// Preference for chunks near the start of their source document.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position_score: Option<f64>,
    /// Similarity from a fresh re-embedding of query and content.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub semantic_score: Option<f64>,
}

impl ComponentScores {
    /// Overlay every score that is set on `other` onto `self`.
    pub fn merge(self, other: ComponentScores) -> Self {
        Self {
            keyword_score: other.keyword_score.or(self.keyword_score),
            length_score: other.length_score.or(self.length_score),
            position_score: other.position_score.or(self.position_score),
            semantic_score: other.semantic_score.or(self.semantic_score),
        }
    }
}

/// A [`SearchResult`] with its blended ranking score.
///
/// Records are immutable: every reranking pass builds a new record from the
/// previous one instead of mutating a shared candidate.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RerankedResult {
    /// The underlying search result, including the original similarity.
    #[serde(flatten)]
    pub result: SearchResult,
    /// Auxiliary scores computed by the rerankers that touched this result.
    #[serde(flatten)]
    pub scores: ComponentScores,
    /// The final score used for ordering.
    pub rerank_score: f64,
}

impl RerankedResult {
    /// Wrap a search result whose ranking score is still its similarity.
    pub fn from_search(result: SearchResult) -> Self {
        let rerank_score = result.similarity;
        Self { result, scores: ComponentScores::default(), rerank_score }
    }

    /// The matched chunk's identifier.
    pub fn chunk_id(&self) -> &str {
        &self.result.chunk_id
    }

    /// The original retrieval similarity.
    pub fn similarity(&self) -> f64 {
        self.result.similarity
    }

    /// Record the keyword-overlap score.
    pub fn with_keyword_score(self, score: f64) -> Self {
        let scores = ComponentScores { keyword_score: Some(score), ..self.scores };
        Self { scores, ..self }
    }

    /// Record the length-proximity score.
    pub fn with_length_score(self, score: f64) -> Self {
        let scores = ComponentScores { length_score: Some(score), ..self.scores };
        Self { scores, ..self }
    }

    /// Record the chunk-position score.
    pub fn with_position_score(self, score: f64) -> Self {
        let scores = ComponentScores { position_score: Some(score), ..self.scores };
        Self { scores, ..self }
    }

    /// Record the re-embedding similarity.
    pub fn with_semantic_score(self, score: f64) -> Self {
        let scores = ComponentScores { semantic_score: Some(score), ..self.scores };
        Self { scores, ..self }
    }

    /// Replace the ranking score.
    pub fn with_rerank_score(self, rerank_score: f64) -> Self {
        Self { rerank_score, ..self }
    }
}

/// Ranking order: score descending, then chunk id ascending.
pub fn rank_order(a_score: f64, a_id: &str, b_score: f64, b_id: &str) -> Ordering {
    b_score.total_cmp(&a_score).then_with(|| a_id.cmp(b_id))
}

/// Drop non-finite similarities, sort by similarity, and keep `top_k`.
pub(crate) fn rank_search_results(mut results: Vec<SearchResult>, top_k: usize) -> Vec<SearchResult> {
    results.retain(|r| r.similarity.is_finite());
    results.sort_by(|a, b| rank_order(a.similarity, &a.chunk_id, b.similarity, &b.chunk_id));
    results.truncate(top_k);
    results
}

/// Drop non-finite rerank scores, sort by rerank score, and optionally truncate.
pub(crate) fn rank_reranked(
    mut results: Vec<RerankedResult>,
    top_k: Option<usize>,
) -> Vec<RerankedResult> {
    results.retain(|r| r.rerank_score.is_finite());
    results.sort_by(|a, b| rank_order(a.rerank_score, a.chunk_id(), b.rerank_score, b.chunk_id()));
    if let Some(k) = top_k {
        results.truncate(k);
    }
    results
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(id: &str, similarity: f64) -> SearchResult {
        SearchResult {
            chunk_id: id.to_string(),
            source_id: "doc".to_string(),
            content: String::new(),
            chunk_index: 0,
            similarity,
            metadata: HashMap::new(),
        }
    }

    #[test]
    fn ties_break_by_ascending_chunk_id() {
        let ranked = rank_search_results(
            vec![result("c", 0.5), result("a", 0.5), result("b", 0.9)],
            10,
        );
        let ids: Vec<_> = ranked.iter().map(|r| r.chunk_id.as_str()).collect();
        assert_eq!(ids, ["b", "a", "c"]);
    }

    #[test]
    fn non_finite_scores_are_dropped() {
        let ranked = rank_search_results(
            vec![result("a", f64::NAN), result("b", f64::INFINITY), result("c", 0.1)],
            10,
        );
        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].chunk_id, "c");
    }

    #[test]
    fn builders_do_not_touch_other_scores() {
        let base = RerankedResult::from_search(result("a", 0.4)).with_keyword_score(1.0);
        let next = base.clone().with_length_score(0.5).with_rerank_score(0.9);
        assert_eq!(base.scores.length_score, None);
        assert_eq!(base.rerank_score, 0.4);
        assert_eq!(next.scores.keyword_score, Some(1.0));
        assert_eq!(next.scores.length_score, Some(0.5));
        assert_eq!(next.rerank_score, 0.9);
    }
}

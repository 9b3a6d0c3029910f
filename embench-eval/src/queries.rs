//! Evaluation query sets.

use std::collections::{BTreeSet, HashMap};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{EvalError, Result};

/// A query and, optionally, the keywords a relevant result must contain.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EvaluationQuery {
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_keywords: Option<BTreeSet<String>>,
}

impl EvaluationQuery {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into(), expected_keywords: None }
    }

    pub fn with_keywords<I, S>(mut self, keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.expected_keywords = Some(keywords.into_iter().map(Into::into).collect());
        self
    }
}

/// Ground truth keyed by query text, as consumed by the metrics.
pub fn expected_keywords(queries: &[EvaluationQuery]) -> HashMap<String, BTreeSet<String>> {
    queries
        .iter()
        .filter_map(|q| q.expected_keywords.clone().map(|k| (q.text.clone(), k)))
        .collect()
}

const DEFAULT_QUERIES: &[(&str, &[&str])] = &[
    ("주택담보대출 금리는 어떻게 되나요?", &["대출", "금리", "담보"]),
    ("정기예금 중도 해지 시 이자는 어떻게 계산되나요?", &["예금", "해지", "이자"]),
    ("적금 만기 후 자동 재예치가 가능한가요?", &["적금", "만기"]),
    ("해외 송금 수수료는 얼마인가요?", &["송금", "수수료"]),
    ("신용카드 한도 상향 신청 방법을 알려주세요", &["카드", "한도", "신용"]),
    ("계좌 이체 한도를 변경하고 싶어요", &["계좌", "이체", "한도"]),
    ("대출 연체 시 불이익이 있나요?", &["대출", "연체"]),
    ("환전 우대율은 어떻게 적용되나요?", &["환전"]),
    ("통장 재발급에 필요한 서류는 무엇인가요?", &["통장"]),
    ("펀드 투자 시 원금 손실 가능성이 있나요?", &["펀드", "투자"]),
];

/// Built-in Korean banking questions.
pub fn default_queries() -> Vec<EvaluationQuery> {
    DEFAULT_QUERIES
        .iter()
        .map(|(text, keywords)| EvaluationQuery::new(*text).with_keywords(keywords.iter().copied()))
        .collect()
}

/// Read a JSON array of queries from `path`.
///
/// # Errors
///
/// Returns [`EvalError::Config`] if the file cannot be read or parsed, or
/// holds no queries.
pub async fn load_queries(path: impl AsRef<Path>) -> Result<Vec<EvaluationQuery>> {
    let path = path.as_ref();
    let raw = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| EvalError::Config(format!("failed to read '{}': {e}", path.display())))?;
    let queries: Vec<EvaluationQuery> = serde_json::from_str(&raw)
        .map_err(|e| EvalError::Config(format!("failed to parse '{}': {e}", path.display())))?;
    if queries.is_empty() {
        return Err(EvalError::Config(format!("'{}' contains no queries", path.display())));
    }
    Ok(queries)
}

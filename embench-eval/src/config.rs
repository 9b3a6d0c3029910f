//! Configuration for evaluation runs.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::error::{EvalError, Result};

/// Banking terms counted by the domain-specificity metric.
pub const DEFAULT_DOMAIN_VOCABULARY: &[&str] = &[
    "대출", "예금", "적금", "금리", "이자", "계좌", "카드", "송금", "이체", "수수료", "보험", "펀드",
    "투자", "신용", "담보", "상환", "환전", "입금", "출금", "통장", "한도", "연체", "만기", "해지",
];

/// Parameters shared by every model run of an evaluation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EvalConfig {
    /// Number of results retrieved per query.
    pub top_k: usize,
    /// Evaluate with reranking instead of plain search.
    pub use_reranking: bool,
    /// Evaluate every model twice, with and without reranking.
    pub compare_reranking: bool,
    /// Number of models evaluated at the same time.
    pub model_concurrency: usize,
    /// Terms counted by the domain-specificity metric.
    pub domain_vocabulary: BTreeSet<String>,
}

impl Default for EvalConfig {
    fn default() -> Self {
        Self {
            top_k: 5,
            use_reranking: false,
            compare_reranking: false,
            model_concurrency: 1,
            domain_vocabulary: DEFAULT_DOMAIN_VOCABULARY.iter().map(|t| t.to_string()).collect(),
        }
    }
}

impl EvalConfig {
    pub fn builder() -> EvalConfigBuilder {
        EvalConfigBuilder::default()
    }
}

/// Builder for a validated [`EvalConfig`].
#[derive(Debug, Clone, Default)]
pub struct EvalConfigBuilder {
    config: EvalConfig,
}

impl EvalConfigBuilder {
    pub fn top_k(mut self, k: usize) -> Self {
        self.config.top_k = k;
        self
    }

    pub fn use_reranking(mut self, enabled: bool) -> Self {
        self.config.use_reranking = enabled;
        self
    }

    pub fn compare_reranking(mut self, enabled: bool) -> Self {
        self.config.compare_reranking = enabled;
        self
    }

    pub fn model_concurrency(mut self, n: usize) -> Self {
        self.config.model_concurrency = n;
        self
    }

    /// Replace the domain vocabulary.
    pub fn domain_vocabulary<I, S>(mut self, terms: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.domain_vocabulary = terms.into_iter().map(Into::into).collect();
        self
    }

    /// # Errors
    ///
    /// Returns [`EvalError::Config`] if `top_k` or `model_concurrency` is zero
    /// or the domain vocabulary is empty.
    pub fn build(self) -> Result<EvalConfig> {
        if self.config.top_k == 0 {
            return Err(EvalError::Config("top_k must be greater than zero".to_string()));
        }
        if self.config.model_concurrency == 0 {
            return Err(EvalError::Config(
                "model_concurrency must be greater than zero".to_string(),
            ));
        }
        if self.config.domain_vocabulary.is_empty() {
            return Err(EvalError::Config("domain vocabulary must not be empty".to_string()));
        }
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = EvalConfig::builder().build().unwrap();
        assert_eq!(config, EvalConfig::default());
        assert_eq!(config.domain_vocabulary.len(), DEFAULT_DOMAIN_VOCABULARY.len());
    }

    #[test]
    fn rejects_zero_and_empty_values() {
        assert!(EvalConfig::builder().top_k(0).build().is_err());
        assert!(EvalConfig::builder().model_concurrency(0).build().is_err());
        assert!(EvalConfig::builder().domain_vocabulary(Vec::<String>::new()).build().is_err());
    }
}

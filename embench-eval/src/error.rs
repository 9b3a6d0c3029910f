//! Error types for the `embench-eval` crate.

use embench_rag::RagError;
use thiserror::Error;

/// Errors that can occur while evaluating models or writing reports.
#[derive(Debug, Error)]
pub enum EvalError {
    /// A retrieval-layer error that is fatal to the whole evaluation, such
    /// as an unknown model id.
    #[error(transparent)]
    Rag(#[from] RagError),

    /// A configuration validation error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// The report could not be serialized or written.
    #[error("Report error: {0}")]
    Report(String),
}

/// A convenience result type for evaluation operations.
pub type Result<T> = std::result::Result<T, EvalError>;

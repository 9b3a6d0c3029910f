//! Error types for the `embench-rag` crate.

use thiserror::Error;

/// Errors that can occur during retrieval and reranking.
#[derive(Debug, Error)]
pub enum RagError {
    /// The encoder failed to turn text into a vector.
    #[error("Encoding error ({model}): {message}")]
    Encoding {
        /// The model the text was being encoded for.
        model: String,
        /// A description of the failure.
        message: String,
    },

    /// The encoder returned a vector whose length does not match the model.
    #[error("Dimension mismatch ({model}): expected {expected}, got {actual}")]
    DimensionMismatch {
        /// The model whose descriptor was violated.
        model: String,
        /// The dimension declared by the model descriptor.
        expected: usize,
        /// The length of the vector that was produced or stored.
        actual: usize,
    },

    /// The vector store or its connection failed.
    #[error("Retrieval error ({backend}): {message}")]
    Retrieval {
        /// The vector store backend that produced the error.
        backend: String,
        /// A description of the failure.
        message: String,
    },

    /// A model id was not found in the registry.
    #[error("Unknown model: {0}")]
    UnknownModel(String),

    /// The text-generation capability failed.
    #[error("Generation error ({provider}): {message}")]
    Generation {
        /// The generation provider that produced the error.
        provider: String,
        /// A description of the failure.
        message: String,
    },

    /// A configuration validation error.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl RagError {
    /// Returns `true` for failures that happened while encoding text.
    pub fn is_encoding(&self) -> bool {
        matches!(self, Self::Encoding { .. } | Self::DimensionMismatch { .. })
    }

    /// Returns `true` for storage and connection failures.
    pub fn is_retrieval(&self) -> bool {
        matches!(self, Self::Retrieval { .. })
    }

    pub(crate) fn retrieval(backend: &str, message: impl Into<String>) -> Self {
        Self::Retrieval { backend: backend.to_string(), message: message.into() }
    }
}

/// A convenience result type for retrieval operations.
pub type Result<T> = std::result::Result<T, RagError>;

//! Text-generation capability consumed by LLM keyword extraction.

use async_trait::async_trait;

use crate::error::Result;

/// A provider that completes a prompt with generated text.
///
/// Callers are responsible for bounding the call with a timeout.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Generate a completion for `prompt`.
    async fn generate(&self, prompt: &str) -> Result<String>;
}

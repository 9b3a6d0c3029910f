//! Encoder trait for turning text into model-specific vectors.

use async_trait::async_trait;

use crate::error::{RagError, Result};
use crate::registry::ModelDescriptor;

/// An external capability that embeds text with a given model.
///
/// Implementations wrap a concrete inference backend behind one async
/// interface. The default [`encode_batch`](Encoder::encode_batch)
/// implementation calls [`encode_query`](Encoder::encode_query)
/// sequentially; backends that support native batching should override it.
///
/// # Example
///
/// ```rust,ignore
/// use embench_rag::{Encoder, ModelRegistry};
///
/// let registry = ModelRegistry::builtin();
/// let model = registry.resolve("BAAI/bge-m3")?;
/// let vector = encoder.encode_query("예금 금리", model).await?;
/// assert_eq!(vector.len(), model.dimension);
/// ```
#[async_trait]
pub trait Encoder: Send + Sync {
    /// Embed a single text with `model`.
    async fn encode_query(&self, text: &str, model: &ModelDescriptor) -> Result<Vec<f32>>;

    /// Embed several texts with `model`.
    async fn encode_batch(&self, texts: &[&str], model: &ModelDescriptor) -> Result<Vec<Vec<f32>>> {
        let mut vectors = Vec::with_capacity(texts.len());
        for text in texts {
            vectors.push(self.encode_query(text, model).await?);
        }
        Ok(vectors)
    }
}

/// Verify that `vector` has the dimension declared by `model`.
///
/// # Errors
///
/// Returns [`RagError::DimensionMismatch`] if the lengths differ.
pub fn check_dimension(model: &ModelDescriptor, vector: &[f32]) -> Result<()> {
    if vector.len() != model.dimension {
        return Err(RagError::DimensionMismatch {
            model: model.id.clone(),
            expected: model.dimension,
            actual: vector.len(),
        });
    }
    Ok(())
}

/// Compute cosine similarity between two vectors.
///
/// Accumulates in `f64`. Returns 0.0 if either vector has zero magnitude or
/// the lengths differ.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    if a.len() != b.len() {
        return 0.0;
    }
    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;
    for (x, y) in a.iter().zip(b) {
        let (x, y) = (f64::from(*x), f64::from(*y));
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a.sqrt() * norm_b.sqrt())
}

//! Static table of the embedding models under comparison.
//!
//! The registry is built once at startup and resolves a model id to its
//! [`ModelDescriptor`], including the [`PartitionKey`] that names the model's
//! isolated slice of the vector store.

use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{RagError, Result};

/// How token vectors are pooled into one sentence vector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PoolingMode {
    Mean,
    Cls,
    LastToken,
}

/// Identifier of one model's vector partition.
///
/// Keys only contain lower-case ASCII alphanumerics and `_`, so they can be
/// used directly as physical table names.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PartitionKey(String);

impl PartitionKey {
    /// Sanitize `raw` into a partition key.
    ///
    /// Every character that is not an ASCII alphanumeric becomes `_`.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Config`] if nothing but separators remains.
    pub fn new(raw: &str) -> Result<Self> {
        let sanitized: String = raw
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_lowercase() } else { '_' })
            .collect();
        if sanitized.chars().all(|c| c == '_') {
            return Err(RagError::Config(format!(
                "partition key '{raw}' is empty after sanitization"
            )));
        }
        Ok(Self(sanitized))
    }

    /// The sanitized key, usable as a table name.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PartitionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for PartitionKey {
    type Error = RagError;

    fn try_from(value: String) -> Result<Self> {
        Self::new(&value)
    }
}

impl From<PartitionKey> for String {
    fn from(key: PartitionKey) -> Self {
        key.0
    }
}

/// One embedding model's fixed properties.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelDescriptor {
    /// Model identifier, also sent to the encoder.
    pub id: String,
    /// Length of every vector the model produces.
    pub dimension: usize,
    /// Pooling strategy used by the encoder.
    pub pooling: PoolingMode,
    /// Maximum number of input tokens.
    pub max_seq_length: usize,
    /// The model's partition in the vector store.
    pub partition: PartitionKey,
}

impl ModelDescriptor {
    /// Create a descriptor whose partition key is derived from `id`.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Config`] if `dimension` is zero or `id` cannot be
    /// turned into a partition key.
    pub fn new(
        id: impl Into<String>,
        dimension: usize,
        pooling: PoolingMode,
        max_seq_length: usize,
    ) -> Result<Self> {
        let id = id.into();
        if dimension == 0 {
            return Err(RagError::Config(format!("model '{id}' must have a non-zero dimension")));
        }
        let partition = PartitionKey::new(&id)?;
        Ok(Self { id, dimension, pooling, max_seq_length, partition })
    }

    /// Override the derived partition key.
    pub fn with_partition(mut self, partition: PartitionKey) -> Self {
        self.partition = partition;
        self
    }
}

/// Read-only table of registered models, in registration order.
#[derive(Debug, Clone)]
pub struct ModelRegistry {
    models: Vec<ModelDescriptor>,
}

impl ModelRegistry {
    /// The Korean-capable sentence embedding models compared by default.
    pub fn builtin() -> Self {
        let entry = |id: &str,
                     partition: &str,
                     dimension: usize,
                     pooling: PoolingMode,
                     max_seq_length: usize| {
            ModelDescriptor {
                id: id.to_string(),
                dimension,
                pooling,
                max_seq_length,
                partition: PartitionKey(partition.to_string()),
            }
        };
        Self {
            models: vec![
                entry("jhgan/ko-sroberta-multitask", "ko_sroberta", 768, PoolingMode::Mean, 128),
                entry("BM-K/KoSimCSE-roberta", "kosimcse", 768, PoolingMode::Cls, 512),
                entry("intfloat/multilingual-e5-large", "me5_large", 1024, PoolingMode::Mean, 512),
                entry("BAAI/bge-m3", "bge_m3", 1024, PoolingMode::Cls, 8192),
                entry("nlpai-lab/KURE-v1", "kure_v1", 1024, PoolingMode::Cls, 8192),
            ],
        }
    }

    /// Build a registry from explicit descriptors.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Config`] if two descriptors share an id or a
    /// partition key.
    pub fn from_descriptors(models: Vec<ModelDescriptor>) -> Result<Self> {
        {
            let mut ids = HashSet::new();
            let mut partitions = HashSet::new();
            for model in &models {
                if !ids.insert(model.id.as_str()) {
                    return Err(RagError::Config(format!("model '{}' registered twice", model.id)));
                }
                if !partitions.insert(&model.partition) {
                    return Err(RagError::Config(format!(
                        "partition '{}' is shared by more than one model",
                        model.partition
                    )));
                }
            }
        }
        Ok(Self { models })
    }

    /// Look up a model by id.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::UnknownModel`] if `model_id` is not registered.
    pub fn resolve(&self, model_id: &str) -> Result<&ModelDescriptor> {
        self.models
            .iter()
            .find(|m| m.id == model_id)
            .ok_or_else(|| RagError::UnknownModel(model_id.to_string()))
    }

    /// Registered model ids, in registration order.
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.models.iter().map(|m| m.id.as_str())
    }

    /// Registered descriptors, in registration order.
    pub fn descriptors(&self) -> &[ModelDescriptor] {
        &self.models
    }

    /// Number of registered models.
    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partition_keys_are_sanitized() {
        let key = PartitionKey::new("BAAI/bge-m3").unwrap();
        assert_eq!(key.as_str(), "baai_bge_m3");
        assert!(PartitionKey::new("//--").is_err());
    }

    #[test]
    fn builtin_partitions_are_unique() {
        let builtin = ModelRegistry::builtin();
        let rebuilt = ModelRegistry::from_descriptors(builtin.descriptors().to_vec());
        assert!(rebuilt.is_ok());
    }

    #[test]
    fn resolve_unknown_model_fails() {
        let registry = ModelRegistry::builtin();
        assert!(registry.resolve("BAAI/bge-m3").is_ok());
        let err = registry.resolve("no-such-model").unwrap_err();
        assert!(matches!(err, RagError::UnknownModel(id) if id == "no-such-model"));
    }
}

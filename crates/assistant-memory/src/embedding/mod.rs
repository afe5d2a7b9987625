//! Embedding providers: text in, fixed-length vector out
//!
//! The dimension is fixed for the lifetime of a provider and must match the
//! dimension recorded in the database the vectors are written to.

pub mod cache;
pub mod hashing;
pub mod http;

pub use cache::CachedEmbeddingProvider;
pub use hashing::HashingEmbeddingProvider;
pub use http::HttpEmbeddingProvider;

use async_trait::async_trait;

use crate::error::{MemoryError, Result};

#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    fn dimension(&self) -> usize;

    fn model_name(&self) -> &str;

    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut embeddings = Vec::with_capacity(texts.len());
        for text in texts {
            embeddings.push(self.embed(text).await?);
        }
        Ok(embeddings)
    }
}

/// Rejects vectors that must never reach the store: wrong length,
/// non-finite components, or all zeros.
pub fn validate_embedding(embedding: &[f32], dimension: usize) -> Result<()> {
    if embedding.len() != dimension {
        return Err(MemoryError::InvalidEmbedding {
            expected: dimension,
            actual: embedding.len(),
        });
    }
    if embedding.iter().any(|v| !v.is_finite()) {
        return Err(MemoryError::Embedding(
            "embedding contains non-finite values".to_string(),
        ));
    }
    if embedding.iter().all(|v| *v == 0.0) {
        return Err(MemoryError::Embedding("embedding is all zeros".to_string()));
    }
    Ok(())
}

/// Embeds `text` and validates the result in one step.
pub async fn embed_checked(provider: &dyn EmbeddingProvider, text: &str) -> Result<Vec<f32>> {
    let embedding = provider.embed(text).await?;
    validate_embedding(&embedding, provider.dimension())?;
    Ok(embedding)
}

/// Provider whose backend is always down.
#[cfg(test)]
pub(crate) struct UnreachableEmbedder(pub usize);

#[cfg(test)]
#[async_trait]
impl EmbeddingProvider for UnreachableEmbedder {
    fn dimension(&self) -> usize {
        self.0
    }

    fn model_name(&self) -> &str {
        "unreachable"
    }

    async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
        Err(MemoryError::Embedding("connection refused".to_string()))
    }
}

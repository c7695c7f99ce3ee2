//! Embedding collaborator.

use async_trait::async_trait;
use thiserror::Error;

/// Errors reported by an embedder.
#[derive(Debug, Error)]
pub enum EmbeddingError {
    #[error("embedder unavailable: {0}")]
    Unavailable(String),
    #[error("embedding failed: {0}")]
    Failed(String),
}

/// Maps text to a dense vector.
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError>;
}

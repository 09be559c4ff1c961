//! Embedder client abstraction.
//!
//! Provides a trait for generating vector embeddings from text, plus the
//! shape check every vector passes before it leaves an embedder.
//!
//! # Implementations
//! - [`ollama::OllamaEmbedder`] — local embedding service over HTTP (`/embeddings`).

pub mod ollama;

use crate::errors::{EmbeddingError, Result};
use crate::utils::try_join_ordered;

/// A vector embedding (f32 components).
pub type Embedding = Vec<f32>;

/// Default embedding dimension (`mxbai-embed-large`).
pub const DEFAULT_EMBEDDING_DIM: usize = 1024;

/// Trait for text-to-vector embedding clients.
#[allow(async_fn_in_trait)]
pub trait EmbedderClient: Send + Sync {
    /// Generate an embedding for a single text string.
    ///
    /// Implementations must return only vectors that pass [`validate_embedding`].
    async fn embed(&self, text: &str) -> Result<Embedding>;

    /// Embed `texts` with at most `concurrency` requests in flight.
    ///
    /// Results keep the order of `texts`. The first failure aborts the call.
    async fn embed_batch(&self, texts: &[&str], concurrency: usize) -> Result<Vec<Embedding>> {
        try_join_ordered(texts.iter().map(|text| self.embed(text)), concurrency).await
    }

    /// Returns the dimensionality of embeddings produced by this client.
    fn dim(&self) -> usize;
}

/// Check that `values` is a complete, finite vector of exactly `dim` components.
pub fn validate_embedding(values: Embedding, dim: usize) -> std::result::Result<Embedding, EmbeddingError> {
    if values.is_empty() {
        return Err(EmbeddingError::EmptyEmbedding);
    }
    if values.len() != dim {
        return Err(EmbeddingError::DimensionMismatch {
            expected: dim,
            actual: values.len(),
        });
    }
    if let Some(index) = values.iter().position(|v| !v.is_finite()) {
        return Err(EmbeddingError::NonFinite { index });
    }
    Ok(values)
}

/// Narrow wire values to `f32` and validate them.
///
/// Magnitudes beyond `f32::MAX` become infinite here and are rejected.
pub fn embedding_from_wire(values: Vec<f64>, dim: usize) -> std::result::Result<Embedding, EmbeddingError> {
    validate_embedding(values.into_iter().map(|v| v as f32).collect(), dim)
}

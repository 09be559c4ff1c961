//! Error types for lore-rs.

/// Alias for Results returning [`LoreError`].
pub type Result<T> = std::result::Result<T, LoreError>;

/// Top-level error type for lore-rs.
#[derive(Debug, thiserror::Error)]
pub enum LoreError {
    #[error("Embedding error: {0}")]
    Embedding(#[from] EmbeddingError),

    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Checkpoint failed: {0}")]
    Checkpoint(String),

    #[error("Store error: {0}")]
    Store(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A batch run stopped early. `processed` counts items already processed:
    /// earlier batches on an item failure, plus the current batch when its
    /// checkpoint failed.
    #[error("Batch run aborted after {processed} items: {source}")]
    RunAborted {
        processed: usize,
        #[source]
        source: Box<LoreError>,
    },
}

impl LoreError {
    /// Unwrap a [`LoreError::RunAborted`] to the error that caused it.
    pub fn root(&self) -> &LoreError {
        match self {
            LoreError::RunAborted { source, .. } => source.root(),
            other => other,
        }
    }
}

/// Embedding-service errors.
#[derive(Debug, thiserror::Error)]
pub enum EmbeddingError {
    #[error("Cannot reach embedding service: {0}")]
    Transport(String),

    #[error("Embedding request timed out")]
    Timeout,

    #[error("API error: HTTP {status}: {message}")]
    Api { status: u16, message: String },

    #[error("Embedding service returned an empty vector")]
    EmptyEmbedding,

    #[error("Embedding has {actual} dimensions, expected {expected}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Embedding contains a non-finite value at index {index}")]
    NonFinite { index: usize },

    #[error("Embedding model '{0}' is not installed")]
    ModelNotInstalled(String),

    #[error("Malformed response: {0}")]
    MalformedResponse(String),
}

impl EmbeddingError {
    /// Whether the failure may succeed on retry.
    ///
    /// Shape errors are deterministic and never retried.
    pub fn is_transient(&self) -> bool {
        match self {
            EmbeddingError::Transport(_) | EmbeddingError::Timeout => true,
            EmbeddingError::Api { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}

impl From<reqwest::Error> for EmbeddingError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            EmbeddingError::Timeout
        } else if err.is_decode() {
            EmbeddingError::MalformedResponse(err.to_string())
        } else if let Some(status) = err.status() {
            EmbeddingError::Api {
                status: status.as_u16(),
                message: err.to_string(),
            }
        } else {
            EmbeddingError::Transport(err.to_string())
        }
    }
}

/// LLM-specific errors.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("Rate limited")]
    RateLimit,

    #[error("Model refused to respond")]
    Refusal,

    #[error("Empty response from LLM")]
    EmptyResponse,

    #[error("Authentication failed")]
    Authentication,

    #[error("API error: HTTP {status}: {message}")]
    Api { status: u16, message: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_classification() {
        assert!(EmbeddingError::Timeout.is_transient());
        assert!(EmbeddingError::Transport("refused".into()).is_transient());
        assert!(EmbeddingError::Api { status: 503, message: String::new() }.is_transient());
        assert!(EmbeddingError::Api { status: 429, message: String::new() }.is_transient());
        assert!(!EmbeddingError::Api { status: 400, message: String::new() }.is_transient());
        assert!(!EmbeddingError::EmptyEmbedding.is_transient());
        assert!(!EmbeddingError::NonFinite { index: 3 }.is_transient());
        assert!(!EmbeddingError::DimensionMismatch { expected: 4, actual: 3 }.is_transient());
        assert!(!EmbeddingError::ModelNotInstalled("m".into()).is_transient());
    }

    #[test]
    fn root_unwraps_nested_aborts() {
        let err = LoreError::RunAborted {
            processed: 4,
            source: Box::new(LoreError::Checkpoint("disk full".into())),
        };
        assert!(matches!(err.root(), LoreError::Checkpoint(_)));
        assert!(err.to_string().contains("after 4 items"));
    }
}

//! Embedding and index errors.

use thiserror::Error;

/// Result type alias for embedding operations.
pub type Result<T> = std::result::Result<T, EmbeddingError>;

/// Errors from providers, the gateway contract and the vector index.
#[derive(Error, Debug)]
pub enum EmbeddingError {
    /// The provider has no credentials.
    #[error("embedding provider not configured")]
    ProviderNotConfigured,

    /// The provider answered with an error status.
    #[error("embedding request failed: {0}")]
    ApiRequest(String),

    /// The provider answered with an unusable body.
    #[error("invalid embedding response: {0}")]
    InvalidResponse(String),

    /// The provider asked us to back off.
    #[error("rate limited, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    /// A vector does not have the agreed dimension.
    #[error("dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// The provider returned NaN or infinite components.
    #[error("embedding contains non-finite values")]
    NonFinite,

    /// The provider did not answer in time.
    #[error("embedding request timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    /// The index would exceed the supported matrix size.
    #[error("index too large: {rows} rows of dimension {dimension}")]
    IndexTooLarge { rows: usize, dimension: usize },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
}

//! Error types for document persistence.

use thiserror::Error;

/// Result type alias for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Errors that can occur while loading or persisting documents.
#[derive(Error, Debug)]
pub enum StoreError {
    /// The remote store has no URL or API key.
    #[error("document store not configured: {0}")]
    NotConfigured(String),

    /// The remote store answered with a non-success status.
    #[error("document store rejected request ({status}): {body}")]
    Rejected { status: u16, body: String },

    /// The remote store answered but the payload is unusable.
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// The call did not complete in time.
    #[error("document store timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    /// Failed to read the snapshot file.
    #[error("failed to read snapshot: {0}")]
    ReadSnapshot(String),

    /// Failed to write the snapshot file.
    #[error("failed to write snapshot: {0}")]
    WriteSnapshot(String),

    /// Serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// HTTP error.
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
}

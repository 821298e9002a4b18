//! Error types for the retrieval engine.

use std::path::PathBuf;

use thiserror::Error;

use kb_document_store::StoreError;
use kb_embeddings::EmbeddingError;

/// Result type alias for engine initialization.
pub type Result<T> = std::result::Result<T, InitError>;

/// Errors that prevent the engine from starting.
///
/// An unreachable durable store is not one of them: it selects the local
/// fallback instead.
#[derive(Error, Debug)]
pub enum InitError {
    /// The local fallback snapshot exists but cannot be read.
    #[error("local fallback store unavailable: {0}")]
    Fallback(#[source] StoreError),
}

/// Errors returned by [`add`](crate::RetrievalEngine::add).
///
/// The collection is unchanged whenever one of these is returned.
#[derive(Error, Debug)]
pub enum AddError {
    /// `initialize` has not completed.
    #[error("engine not initialized")]
    NotInitialized,

    /// Text exceeds the configured maximum length.
    #[error("text too long: {length} characters, max {max_length}")]
    TextTooLong { length: usize, max_length: usize },

    /// Uploaded content is not valid UTF-8 text.
    #[error("invalid content: {0}")]
    InvalidContent(String),

    /// No embedding could be produced.
    #[error("embedding error: {0}")]
    Embedding(#[from] EmbeddingError),

    /// The active backend did not persist the document.
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

/// Errors rebuilding the vector index.
#[derive(Error, Debug)]
pub enum RebuildError {
    /// The index builder rejected the collection.
    #[error("index build failed: {0}")]
    Build(#[from] EmbeddingError),

    /// The blocking build task panicked or was cancelled.
    #[error("index build task aborted: {0}")]
    Aborted(String),
}

/// Configuration errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to read the configuration file.
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The configuration file is not valid TOML for this schema.
    #[error("invalid configuration: {0}")]
    Parse(#[from] toml::de::Error),

    /// A value is out of range.
    #[error("invalid configuration value: {0}")]
    Invalid(String),
}

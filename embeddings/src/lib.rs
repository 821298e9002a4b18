//! # Embeddings
//!
//! Embedding generation and exact nearest-neighbour search for the
//! knowledge retrieval engine.
//!
//! ## Features
//!
//! - **Embedding Gateway**: Convert text to fixed-dimension vectors, bounded
//!   by a timeout and checked against the agreed dimension
//! - **Providers**: OpenAI-compatible HTTP API, or a deterministic mock
//! - **Vector Index**: Flat matrix with squared L2 distance search
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                    Embeddings System                            │
//! ├─────────────────────────────────────────────────────────────────┤
//! │  EmbeddingProvider ──► EmbeddingGateway ──► Embedding          │
//! │       │                                        │                │
//! │       ▼                                        ▼                │
//! │  OpenAI / Mock                            VectorIndex           │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

pub mod distance;
pub mod error;
pub mod gateway;
pub mod index;
pub mod provider;

pub use distance::squared_l2;
pub use error::{EmbeddingError, Result};
pub use gateway::{EmbeddingGateway, GatewayMode, GatewayStatus};
pub use index::{MAX_INDEX_VALUES, Neighbor, VectorIndex};
pub use provider::{
    EmbeddingProvider, EmbeddingRequest, EmbeddingResponse, MockProvider, OpenAIProvider,
};

/// A dense vector embedding.
pub type Embedding = Vec<f32>;

/// Dimension of embeddings agreed with the provider.
pub const DEFAULT_DIMENSION: usize = 1536; // OpenAI text-embedding-3-small

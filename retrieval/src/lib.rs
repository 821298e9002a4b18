//! # Retrieval Engine
//!
//! Knowledge retrieval over a growing collection of text documents:
//!
//! - **Semantic search**: exact nearest neighbours of the query embedding
//! - **Lexical search**: keyword overlap, no embedding required
//! - **Persistence**: a durable remote store, or a local JSON snapshot when
//!   the remote store is unreachable at startup
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────┐
//! │                     Retrieval Engine                       │
//! ├───────────────────────────────────────────────────────────┤
//! │                                                            │
//! │  ┌──────────────┐   ┌──────────────┐   ┌──────────────┐   │
//! │  │  Embedding   │   │   Snapshot   │   │   Document   │   │
//! │  │   Gateway    │   │ docs + index │   │    Store     │   │
//! │  └──────────────┘   └──────────────┘   └──────────────┘   │
//! │         │                  ▲                  │            │
//! │         │    add: embed → persist → rebuild → swap        │
//! │         │                  │                              │
//! │         ▼                  │                              │
//! │  ┌──────────────┐   ┌──────────────┐                      │
//! │  │   Semantic   │   │   Lexical    │                      │
//! │  │    Search    │   │    Search    │                      │
//! │  └──────────────┘   └──────────────┘                      │
//! └───────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use kb_retrieval::{DocumentMetadata, RetrievalConfig, RetrievalEngine, SearchMode};
//!
//! let config = RetrievalConfig::load("kb.toml")?.with_process_env();
//! let engine = RetrievalEngine::from_config(config)?;
//! engine.initialize().await?;
//!
//! engine
//!     .add("Sick leave requires a note after 3 days.", DocumentMetadata::default())
//!     .await?;
//! let hits = engine.search("sick leave", 5, SearchMode::Semantic).await;
//! ```

pub mod config;
pub mod engine;
pub mod error;
pub mod lexical;
pub mod query;

pub use config::{EmbeddingConfig, EmbeddingProviderType, RetrievalConfig, StoreConfig};
pub use engine::{EngineStats, Persistence, RetrievalEngine, RetrievalEngineBuilder};
pub use error::{AddError, ConfigError, InitError, RebuildError, Result};
pub use query::{KnowledgeResult, SearchHit, SearchMode};

// Re-export from dependencies for convenience
pub use kb_document_store::{Document, DocumentId, DocumentMetadata, DocumentStore};
pub use kb_embeddings::{EmbeddingGateway, EmbeddingProvider, GatewayMode, GatewayStatus};

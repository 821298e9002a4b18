//! # Document Store
//!
//! Persistence backends for knowledge documents.
//!
//! Two interchangeable implementations of [`DocumentStore`]:
//!
//! - [`RemoteStore`]: the durable store, reached over a PostgREST-style HTTP
//!   API. The store assigns document ids.
//! - [`LocalStore`]: a single JSON snapshot of the whole collection, used when
//!   the durable store is unavailable. Ids are sequential.
//!
//! Stored embeddings arrive in several encodings (native arrays, JSON text,
//! list/tuple literals). They are normalized once, here, into
//! `Option<Vec<f32>>`; anything unparsable becomes `None`.

pub mod document;
pub mod embedding;
pub mod error;
pub mod local;
pub mod remote;
pub mod store;

pub use document::{Document, DocumentId, DocumentMetadata, NewDocument};
pub use embedding::parse_embedding;
pub use error::{Result, StoreError};
pub use local::LocalStore;
pub use remote::RemoteStore;
pub use store::DocumentStore;

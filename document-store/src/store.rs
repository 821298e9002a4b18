//! The persistence trait shared by both backends.

use async_trait::async_trait;

use crate::document::{Document, NewDocument};
use crate::error::Result;

/// Trait for document persistence backends.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Short backend name for logs.
    fn name(&self) -> &str;

    /// Load the full collection, in store order.
    async fn load(&self) -> Result<Vec<Document>>;

    /// Persist a new document and return it with its assigned id.
    async fn insert(&self, document: NewDocument) -> Result<Document>;
}

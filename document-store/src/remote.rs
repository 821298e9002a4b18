//! Durable store reached over a PostgREST-style HTTP API.

use async_trait::async_trait;
use reqwest::{Method, RequestBuilder};
use serde_json::Value;
use tracing::{debug, info};

use crate::document::{Document, NewDocument};
use crate::error::{Result, StoreError};
use crate::store::DocumentStore;

/// Default table holding knowledge documents.
pub const DEFAULT_TABLE: &str = "knowledge_documents";

/// Remote, durable document store.
///
/// Documents live in a single table with `id`, `text`, `metadata` and
/// `embedding` columns; the store generates `id` on insert.
pub struct RemoteStore {
    /// Base URL of the store (without the `/rest/v1` suffix).
    base_url: String,

    /// API key sent as `apikey` and bearer token.
    api_key: String,

    /// Table name.
    table: String,

    /// HTTP client.
    client: reqwest::Client,
}

impl RemoteStore {
    /// Create a store client. No network traffic happens here.
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            table: DEFAULT_TABLE.to_string(),
            client: reqwest::Client::new(),
        }
    }

    /// Create a store client from optional settings.
    ///
    /// Fails with [`StoreError::NotConfigured`] when the URL or key is missing
    /// or blank.
    pub fn from_settings(base_url: Option<&str>, api_key: Option<&str>) -> Result<Self> {
        let base_url = base_url
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| StoreError::NotConfigured("missing store URL".to_string()))?;
        let api_key = api_key
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| StoreError::NotConfigured("missing store API key".to_string()))?;

        Ok(Self::new(base_url, api_key))
    }

    /// Use a different table.
    pub fn with_table(mut self, table: impl Into<String>) -> Self {
        self.table = table.into();
        self
    }

    /// Table this store reads and writes.
    pub fn table(&self) -> &str {
        &self.table
    }

    fn table_url(&self) -> String {
        format!("{}/rest/v1/{}", self.base_url, self.table)
    }

    fn request(&self, method: Method) -> RequestBuilder {
        self.client
            .request(method, self.table_url())
            .header("apikey", &self.api_key)
            .bearer_auth(&self.api_key)
    }

    async fn rows(response: reqwest::Response) -> Result<Vec<Value>> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(StoreError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        match response.json::<Value>().await? {
            Value::Array(rows) => Ok(rows),
            other => Err(StoreError::InvalidResponse(format!(
                "expected an array of rows, got {other}"
            ))),
        }
    }

    /// Check that the table is reachable by fetching at most one row.
    pub async fn ping(&self) -> Result<()> {
        let response = self
            .request(Method::GET)
            .query(&[("select", "id"), ("limit", "1")])
            .send()
            .await?;
        Self::rows(response).await?;
        debug!("Document store table {} reachable", self.table);
        Ok(())
    }
}

#[async_trait]
impl DocumentStore for RemoteStore {
    fn name(&self) -> &str {
        "remote"
    }

    async fn load(&self) -> Result<Vec<Document>> {
        let response = self
            .request(Method::GET)
            .query(&[("select", "*")])
            .send()
            .await?;

        let rows = Self::rows(response).await?;
        let total = rows.len();
        let documents: Vec<Document> = rows.iter().filter_map(Document::from_row).collect();

        info!(
            "Loaded {} documents from table {} ({} rows skipped)",
            documents.len(),
            self.table,
            total - documents.len()
        );
        Ok(documents)
    }

    async fn insert(&self, document: NewDocument) -> Result<Document> {
        debug!(
            "Inserting document into {} (text length={}, embedding length={})",
            self.table,
            document.text.len(),
            document.embedding.len()
        );

        let response = self
            .request(Method::POST)
            .header("Prefer", "return=representation")
            .json(&document)
            .send()
            .await?;

        let rows = Self::rows(response).await?;
        let id = match rows.first().and_then(|row| row.get("id")) {
            Some(Value::String(id)) => id.clone(),
            Some(Value::Number(id)) => id.to_string(),
            _ => {
                return Err(StoreError::InvalidResponse(
                    "insert returned no document id".to_string(),
                ));
            }
        };

        info!("Added document to {} with id {id}", self.table);
        Ok(document.with_id(id))
    }
}

//! Configuration for the retrieval engine.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use kb_document_store::remote::DEFAULT_TABLE;
use kb_embeddings::DEFAULT_DIMENSION;

use crate::error::ConfigError;

/// Configuration for the retrieval engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    /// Embedding provider configuration.
    pub embedding: EmbeddingConfig,

    /// Durable document store configuration.
    pub store: StoreConfig,

    /// Path of the local fallback snapshot.
    pub snapshot_path: PathBuf,

    /// Maximum document length, in characters.
    pub max_document_chars: usize,

    /// Distance that maps to zero relevance in knowledge results.
    pub relevance_scale: f32,

    /// Default number of knowledge results.
    pub knowledge_top_k: usize,

    /// Default number of documents in conversation context.
    pub conversation_top_k: usize,
}

impl RetrievalConfig {
    /// Create a configuration that keeps its fallback snapshot at `snapshot_path`.
    pub fn new(snapshot_path: impl Into<PathBuf>) -> Self {
        Self {
            embedding: EmbeddingConfig::default(),
            store: StoreConfig::default(),
            snapshot_path: snapshot_path.into(),
            max_document_chars: 100_000,
            relevance_scale: 10.0,
            knowledge_top_k: 5,
            conversation_top_k: 3,
        }
    }

    /// Parse a TOML document. Missing keys take their defaults.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Read and parse a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    /// Overlay values from the process environment.
    pub fn with_process_env(self) -> Self {
        self.with_env(|key| std::env::var(key).ok())
    }

    /// Overlay values from an environment lookup.
    ///
    /// Recognized keys: `OPENAI_API_KEY`, `USE_MOCK_EMBEDDINGS`,
    /// `EMBEDDING_MODEL`, `DOCUMENT_STORE_URL`, `DOCUMENT_STORE_API_KEY`,
    /// `DOCUMENT_STORE_TABLE` and `KNOWLEDGE_SNAPSHOT_PATH`.
    pub fn with_env(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let lookup = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(key) = lookup("OPENAI_API_KEY") {
            self.embedding.api_key = Some(key);
        }
        if let Some(flag) = lookup("USE_MOCK_EMBEDDINGS") {
            self.embedding.provider = if flag.trim().eq_ignore_ascii_case("true") {
                EmbeddingProviderType::Mock
            } else {
                EmbeddingProviderType::OpenAI
            };
        }
        if let Some(model) = lookup("EMBEDDING_MODEL") {
            self.embedding.model = Some(model);
        }
        if let Some(url) = lookup("DOCUMENT_STORE_URL") {
            self.store.url = Some(url);
        }
        if let Some(key) = lookup("DOCUMENT_STORE_API_KEY") {
            self.store.api_key = Some(key);
        }
        if let Some(table) = lookup("DOCUMENT_STORE_TABLE") {
            self.store.table = table;
        }
        if let Some(path) = lookup("KNOWLEDGE_SNAPSHOT_PATH") {
            self.snapshot_path = PathBuf::from(path);
        }
        self
    }

    /// Set the embedding configuration.
    pub fn with_embedding(mut self, config: EmbeddingConfig) -> Self {
        self.embedding = config;
        self
    }

    /// Set the store configuration.
    pub fn with_store(mut self, config: StoreConfig) -> Self {
        self.store = config;
        self
    }

    /// Set the maximum document length.
    pub fn with_max_document_chars(mut self, max: usize) -> Self {
        self.max_document_chars = max;
        self
    }

    /// Check value ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.embedding.dimension == 0 {
            return Err(ConfigError::Invalid(
                "embedding.dimension must be positive".to_string(),
            ));
        }
        if !(self.relevance_scale.is_finite() && self.relevance_scale > 0.0) {
            return Err(ConfigError::Invalid(format!(
                "relevance_scale must be a positive number, got {}",
                self.relevance_scale
            )));
        }
        if self.max_document_chars == 0 {
            return Err(ConfigError::Invalid(
                "max_document_chars must be positive".to_string(),
            ));
        }
        if self.embedding.timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "embedding.timeout_ms must be positive".to_string(),
            ));
        }
        if self.store.timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "store.timeout_ms must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self::new("data/knowledge_documents.json")
    }
}

/// Configuration for the embedding provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// Which provider to use.
    pub provider: EmbeddingProviderType,

    /// Model to request. Provider default when unset.
    pub model: Option<String>,

    /// Required vector dimension.
    pub dimension: usize,

    /// API key for the remote provider.
    #[serde(skip_serializing)]
    pub api_key: Option<String>,

    /// Override for the provider base URL.
    pub base_url: Option<String>,

    /// Timeout for a single embedding call, in milliseconds.
    pub timeout_ms: u64,
}

impl EmbeddingConfig {
    /// Deterministic mock embeddings of the default dimension.
    pub fn mock() -> Self {
        Self {
            provider: EmbeddingProviderType::Mock,
            ..Self::default()
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: EmbeddingProviderType::OpenAI,
            model: None,
            dimension: DEFAULT_DIMENSION,
            api_key: None,
            base_url: None,
            timeout_ms: 30_000,
        }
    }
}

/// Type of embedding provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmbeddingProviderType {
    /// OpenAI embeddings API.
    #[serde(rename = "openai")]
    OpenAI,
    /// Deterministic offline vectors.
    Mock,
}

/// Configuration for the durable document store.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Base URL. The durable store is disabled when unset.
    pub url: Option<String>,

    /// API key.
    #[serde(skip_serializing)]
    pub api_key: Option<String>,

    /// Table holding the documents.
    pub table: String,

    /// Timeout for a single store call, in milliseconds.
    pub timeout_ms: u64,
}

impl StoreConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            url: None,
            api_key: None,
            table: DEFAULT_TABLE.to_string(),
            timeout_ms: 10_000,
        }
    }
}

//! Retrieval engine implementation.

use std::sync::{Arc, OnceLock};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, error, info, warn};

use kb_document_store::{
    Document, DocumentId, DocumentMetadata, DocumentStore, LocalStore, NewDocument, RemoteStore,
    StoreError,
};
use kb_embeddings::{
    EmbeddingGateway, EmbeddingProvider, GatewayStatus, MAX_INDEX_VALUES, OpenAIProvider,
    VectorIndex,
};

use crate::config::{EmbeddingConfig, EmbeddingProviderType, RetrievalConfig};
use crate::error::{AddError, ConfigError, InitError, RebuildError, Result};
use crate::lexical;
use crate::query::{KnowledgeResult, SearchHit, SearchMode, render_context};

/// Upload source recorded when none is given.
const UPLOAD_SOURCE: &str = "File Upload";

/// Upload category recorded when none is given.
const UPLOAD_CATEGORY: &str = "general";

/// Which backend holds the collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Persistence {
    /// The remote document store.
    Durable,
    /// The local JSON snapshot.
    LocalFallback,
}

/// Statistics about the retrieval engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineStats {
    /// Number of documents in the collection.
    pub documents: usize,

    /// Number of documents with a row in the vector index.
    pub indexed_rows: usize,

    /// Dimension of the vector index, if one exists.
    pub dimension: Option<usize>,

    /// Active backend, once initialized.
    pub persistence: Option<Persistence>,

    /// Whether the vector index lags the collection after a failed rebuild.
    pub index_stale: bool,
}

/// The collection and the index built from it, published together.
#[derive(Default)]
struct Snapshot {
    documents: Arc<Vec<Document>>,
    index: Option<Arc<VectorIndex>>,
    index_stale: bool,
}

struct Backend {
    store: Arc<dyn DocumentStore>,
    persistence: Persistence,
}

/// Knowledge retrieval engine.
///
/// Holds the document collection in memory together with an exact vector
/// index over it, and persists every added document to the active backend:
/// the durable store when it is reachable at startup, the local snapshot
/// otherwise. Searches read an immutable snapshot and never block on
/// writers; adds are serialized.
pub struct RetrievalEngine {
    config: RetrievalConfig,
    gateway: EmbeddingGateway,
    durable: Option<Arc<dyn DocumentStore>>,
    fallback: Arc<dyn DocumentStore>,

    /// Size cap passed to every index build.
    max_index_values: usize,

    /// Backend selected by `initialize`.
    backend: OnceLock<Backend>,

    /// Current collection and index. The lock is held only to swap the pointer.
    snapshot: RwLock<Arc<Snapshot>>,

    /// Serializes `initialize` and `add`.
    writer: Mutex<()>,
}

impl RetrievalEngine {
    /// Create a new engine builder.
    pub fn builder() -> RetrievalEngineBuilder {
        RetrievalEngineBuilder::new()
    }

    /// Create an engine from configuration.
    ///
    /// The embedding provider and stores are constructed from `config`; no
    /// network or disk access happens until [`initialize`](Self::initialize).
    pub fn from_config(config: RetrievalConfig) -> std::result::Result<Self, ConfigError> {
        Self::builder().with_config(config).build()
    }

    /// Select the backend and load the collection.
    ///
    /// Tries the durable store first and falls back to the local snapshot if
    /// it is not configured or fails. Calling this again is a no-op.
    pub async fn initialize(&self) -> Result<()> {
        let _writer = self.writer.lock().await;
        if self.backend.get().is_some() {
            debug!("Retrieval engine already initialized");
            return Ok(());
        }

        let (backend, documents) = match &self.durable {
            Some(store) => match self.call_store(store.load()).await {
                Ok(documents) => {
                    info!(
                        "Using durable document store ({}) with {} documents",
                        store.name(),
                        documents.len()
                    );
                    let backend = Backend {
                        store: Arc::clone(store),
                        persistence: Persistence::Durable,
                    };
                    (backend, documents)
                }
                Err(e) => {
                    warn!("Durable document store unavailable, using local fallback: {e}");
                    self.load_fallback().await?
                }
            },
            None => {
                warn!("Durable document store not configured, using local fallback");
                self.load_fallback().await?
            }
        };

        let documents = Arc::new(documents);
        let next = match build_index(Arc::clone(&documents), self.max_index_values).await {
            Ok(index) => Snapshot {
                documents,
                index: index.map(Arc::new),
                index_stale: false,
            },
            Err(e) => {
                error!("Vector index build failed at startup; semantic search disabled: {e}");
                Snapshot {
                    documents,
                    index: None,
                    index_stale: true,
                }
            }
        };

        info!(
            "Retrieval engine initialized: {} documents, {} indexed",
            next.documents.len(),
            next.index.as_ref().map_or(0, |index| index.len())
        );
        *self.snapshot.write().await = Arc::new(next);

        // Only `initialize` sets the backend and it holds the writer lock.
        let _ = self.backend.set(backend);
        Ok(())
    }

    async fn load_fallback(&self) -> Result<(Backend, Vec<Document>)> {
        let documents = self
            .call_store(self.fallback.load())
            .await
            .map_err(InitError::Fallback)?;
        let backend = Backend {
            store: Arc::clone(&self.fallback),
            persistence: Persistence::LocalFallback,
        };
        Ok((backend, documents))
    }

    /// Embed, persist and index a new document.
    ///
    /// The document is visible to searches once this returns. On error the
    /// collection is unchanged.
    pub async fn add(
        &self,
        text: &str,
        metadata: DocumentMetadata,
    ) -> std::result::Result<DocumentId, AddError> {
        let length = text.chars().count();
        let max_length = self.config.max_document_chars;
        if length > max_length {
            return Err(AddError::TextTooLong { length, max_length });
        }

        let backend = self.backend.get().ok_or(AddError::NotInitialized)?;
        let _writer = self.writer.lock().await;

        let embedding = self.gateway.embed(text).await.map_err(|e| {
            warn!("Not adding document, embedding failed: {e}");
            AddError::Embedding(e)
        })?;

        let document = self
            .call_store(backend.store.insert(NewDocument {
                text: text.to_string(),
                metadata,
                embedding,
            }))
            .await
            .map_err(|e| {
                warn!("Not adding document, {} store rejected it: {e}", backend.store.name());
                AddError::Store(e)
            })?;
        let id = document.id.clone();

        let current = self.current().await;
        let mut documents = Vec::with_capacity(current.documents.len() + 1);
        documents.extend(current.documents.iter().cloned());
        documents.push(document);
        let documents = Arc::new(documents);

        let next = match build_index(Arc::clone(&documents), self.max_index_values).await {
            Ok(index) => Snapshot {
                documents,
                index: index.map(Arc::new),
                index_stale: false,
            },
            Err(e) => {
                error!("Document {id} persisted but index rebuild failed; keeping previous index: {e}");
                Snapshot {
                    documents,
                    index: current.index.clone(),
                    index_stale: true,
                }
            }
        };
        *self.snapshot.write().await = Arc::new(next);

        debug!("Added document {id}");
        Ok(id)
    }

    /// Add an uploaded file.
    ///
    /// `metadata_json` may hold `title`, `source` and `category`; missing
    /// fields default to the file name, `"File Upload"` and `"general"`, and
    /// unparsable metadata is ignored.
    pub async fn add_file(
        &self,
        file_name: &str,
        content: &[u8],
        metadata_json: Option<&str>,
    ) -> std::result::Result<DocumentId, AddError> {
        let text = std::str::from_utf8(content)
            .map_err(|e| AddError::InvalidContent(format!("{file_name} is not UTF-8 text: {e}")))?;

        let upload = metadata_json
            .and_then(|raw| match serde_json::from_str::<UploadMetadata>(raw) {
                Ok(upload) => Some(upload),
                Err(e) => {
                    warn!("Ignoring invalid metadata for {file_name}: {e}");
                    None
                }
            })
            .unwrap_or_default();

        let metadata = DocumentMetadata::new(
            upload.title.unwrap_or_else(|| file_name.to_string()),
            upload.source.unwrap_or_else(|| UPLOAD_SOURCE.to_string()),
            upload.category.unwrap_or_else(|| UPLOAD_CATEGORY.to_string()),
        );
        self.add(text, metadata).await
    }

    /// Return up to `top_k` documents ranked by distance to `query`.
    ///
    /// Never fails: an unavailable embedding or a missing index yields an
    /// empty result for semantic search.
    pub async fn search(&self, query: &str, top_k: usize, mode: SearchMode) -> Vec<SearchHit> {
        let snapshot = self.current().await;
        let documents = &snapshot.documents;
        if documents.is_empty() || top_k == 0 {
            return Vec::new();
        }
        let k = top_k.min(documents.len());

        match mode {
            SearchMode::Lexical => {
                lexical::rank(query, documents.iter().map(|d| d.text.as_str()), k)
                    .into_iter()
                    .map(|m| SearchHit::new(&documents[m.position], m.distance()))
                    .collect()
            }
            SearchMode::Semantic => {
                let Some(index) = &snapshot.index else {
                    debug!("No vector index; semantic search returns nothing");
                    return Vec::new();
                };

                let embedding = match self.gateway.embed(query).await {
                    Ok(embedding) => embedding,
                    Err(e) => {
                        warn!("Semantic search unavailable, query embedding failed: {e}");
                        return Vec::new();
                    }
                };

                match index.search(&embedding, k) {
                    Ok(neighbors) => neighbors
                        .into_iter()
                        .map(|n| SearchHit::new(&documents[n.position], n.distance))
                        .collect(),
                    Err(e) => {
                        warn!("Semantic search failed: {e}");
                        Vec::new()
                    }
                }
            }
        }
    }

    /// Semantic search flattened for display.
    ///
    /// Uses the configured default when `top_k` is `None`.
    pub async fn search_knowledge(&self, query: &str, top_k: Option<usize>) -> Vec<KnowledgeResult> {
        let top_k = top_k.unwrap_or(self.config.knowledge_top_k);
        let scale = self.config.relevance_scale;
        self.search(query, top_k, SearchMode::Semantic)
            .await
            .into_iter()
            .map(|hit| KnowledgeResult::from_hit(hit, scale))
            .collect()
    }

    /// Lexical matches rendered as a chat context block.
    ///
    /// Empty when nothing matches.
    pub async fn conversation_context(&self, query: &str, top_k: Option<usize>) -> String {
        let top_k = top_k.unwrap_or(self.config.conversation_top_k);
        let hits = self.search(query, top_k, SearchMode::Lexical).await;
        render_context(&hits)
    }

    /// Probe the embedding provider.
    pub async fn embedding_status(&self) -> GatewayStatus {
        self.gateway.status().await
    }

    /// Active backend, once initialized.
    pub fn persistence(&self) -> Option<Persistence> {
        self.backend.get().map(|backend| backend.persistence)
    }

    /// Current collection, in insertion order.
    pub async fn documents(&self) -> Arc<Vec<Document>> {
        Arc::clone(&self.current().await.documents)
    }

    /// Get engine statistics.
    pub async fn stats(&self) -> EngineStats {
        let snapshot = self.current().await;
        EngineStats {
            documents: snapshot.documents.len(),
            indexed_rows: snapshot.index.as_ref().map_or(0, |index| index.len()),
            dimension: snapshot.index.as_ref().map(|index| index.dimension()),
            persistence: self.persistence(),
            index_stale: snapshot.index_stale,
        }
    }

    async fn current(&self) -> Arc<Snapshot> {
        Arc::clone(&*self.snapshot.read().await)
    }

    async fn call_store<T>(
        &self,
        call: impl Future<Output = kb_document_store::Result<T>>,
    ) -> kb_document_store::Result<T> {
        let timeout = self.config.store.timeout();
        tokio::time::timeout(timeout, call)
            .await
            .unwrap_or_else(|_| {
                Err(StoreError::Timeout {
                    timeout_ms: duration_ms(timeout),
                })
            })
    }
}

/// Build an index over `documents` off the async runtime.
async fn build_index(
    documents: Arc<Vec<Document>>,
    max_values: usize,
) -> std::result::Result<Option<VectorIndex>, RebuildError> {
    let index = tokio::task::spawn_blocking(move || {
        VectorIndex::build_with_limit(documents.iter().map(|d| d.embedding.as_deref()), max_values)
    })
    .await
    .map_err(|e| RebuildError::Aborted(e.to_string()))??;
    Ok(index)
}

fn duration_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

#[derive(Debug, Default, Deserialize)]
struct UploadMetadata {
    title: Option<String>,
    source: Option<String>,
    category: Option<String>,
}

/// Builder for the retrieval engine.
pub struct RetrievalEngineBuilder {
    config: RetrievalConfig,
    gateway: Option<EmbeddingGateway>,
    durable: Option<Arc<dyn DocumentStore>>,
    fallback: Option<Arc<dyn DocumentStore>>,
    max_index_values: usize,
}

impl RetrievalEngineBuilder {
    /// Create a new builder.
    pub fn new() -> Self {
        Self {
            config: RetrievalConfig::default(),
            gateway: None,
            durable: None,
            fallback: None,
            max_index_values: MAX_INDEX_VALUES,
        }
    }

    /// Set the configuration.
    pub fn with_config(mut self, config: RetrievalConfig) -> Self {
        self.config = config;
        self
    }

    /// Use `gateway` instead of one built from the embedding configuration.
    pub fn with_gateway(mut self, gateway: EmbeddingGateway) -> Self {
        self.gateway = Some(gateway);
        self
    }

    /// Use `store` as the durable backend instead of one built from the store configuration.
    pub fn with_durable_store(mut self, store: Arc<dyn DocumentStore>) -> Self {
        self.durable = Some(store);
        self
    }

    /// Use `store` as the fallback backend instead of the snapshot file.
    pub fn with_fallback_store(mut self, store: Arc<dyn DocumentStore>) -> Self {
        self.fallback = Some(store);
        self
    }

    /// Cap the vector index at `max_values` stored components.
    ///
    /// A rebuild that would exceed it fails and leaves the previous index in
    /// place.
    pub fn with_max_index_values(mut self, max_values: usize) -> Self {
        self.max_index_values = max_values;
        self
    }

    /// Build the engine.
    pub fn build(self) -> std::result::Result<RetrievalEngine, ConfigError> {
        let Self {
            config,
            gateway,
            durable,
            fallback,
            max_index_values,
        } = self;
        config.validate()?;

        let gateway = gateway.unwrap_or_else(|| gateway_from_config(&config.embedding));
        let durable = durable.or_else(|| durable_from_config(&config));
        let fallback = fallback.unwrap_or_else(|| {
            Arc::new(LocalStore::new(&config.snapshot_path)) as Arc<dyn DocumentStore>
        });

        Ok(RetrievalEngine {
            config,
            gateway,
            durable,
            fallback,
            max_index_values,
            backend: OnceLock::new(),
            snapshot: RwLock::new(Arc::new(Snapshot::default())),
            writer: Mutex::new(()),
        })
    }
}

impl Default for RetrievalEngineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

fn gateway_from_config(config: &EmbeddingConfig) -> EmbeddingGateway {
    let gateway = match config.provider {
        EmbeddingProviderType::Mock => EmbeddingGateway::mock(config.dimension),
        EmbeddingProviderType::OpenAI => {
            let mut provider = OpenAIProvider::new(config.api_key.clone());
            if let Some(url) = &config.base_url {
                provider = provider.with_base_url(url);
            }
            if let Some(model) = &config.model {
                provider = provider.with_model(model);
            }
            if provider.default_dimension() != config.dimension {
                info!(
                    "Requesting {}-dimensional vectors from {} (native {})",
                    config.dimension,
                    provider.default_model(),
                    provider.default_dimension()
                );
            }
            EmbeddingGateway::new(Arc::new(provider), config.dimension)
        }
    };

    let gateway = match &config.model {
        Some(model) => gateway.with_model(model),
        None => gateway,
    };
    gateway.with_timeout(config.timeout())
}

fn durable_from_config(config: &RetrievalConfig) -> Option<Arc<dyn DocumentStore>> {
    match RemoteStore::from_settings(config.store.url.as_deref(), config.store.api_key.as_deref())
    {
        Ok(store) => Some(Arc::new(store.with_table(&config.store.table))),
        Err(e) => {
            debug!("Durable document store disabled: {e}");
            None
        }
    }
}

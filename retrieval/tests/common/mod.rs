#![allow(dead_code)]

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;

use kb_document_store::{Document, DocumentStore, NewDocument, StoreError};
use kb_embeddings::{
    EmbeddingError, EmbeddingGateway, EmbeddingProvider, EmbeddingRequest, EmbeddingResponse,
};
use kb_retrieval::{EmbeddingConfig, RetrievalConfig, RetrievalEngine};

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Configuration with mock embeddings of `dimension` and a snapshot under `dir`.
pub fn mock_config(dir: &Path, dimension: usize) -> RetrievalConfig {
    let mut embedding = EmbeddingConfig::mock();
    embedding.dimension = dimension;
    RetrievalConfig::new(dir.join("documents.json")).with_embedding(embedding)
}

pub async fn mock_engine(dir: &Path, dimension: usize) -> RetrievalEngine {
    let engine = RetrievalEngine::from_config(mock_config(dir, dimension)).unwrap();
    engine.initialize().await.unwrap();
    engine
}

/// In-memory document store with switchable failures.
#[derive(Default)]
pub struct MemoryStore {
    documents: Mutex<Vec<Document>>,
    pub fail_load: AtomicBool,
    pub fail_insert: AtomicBool,
    pub load_delay: Option<Duration>,
    pub inserts: AtomicUsize,
}

impl MemoryStore {
    pub fn with_documents(documents: Vec<Document>) -> Self {
        Self {
            documents: Mutex::new(documents),
            ..Self::default()
        }
    }

    pub fn with_load_delay(delay: Duration) -> Self {
        Self {
            load_delay: Some(delay),
            ..Self::default()
        }
    }

    pub async fn documents(&self) -> Vec<Document> {
        self.documents.lock().await.clone()
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    fn name(&self) -> &str {
        "memory"
    }

    async fn load(&self) -> kb_document_store::Result<Vec<Document>> {
        if let Some(delay) = self.load_delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail_load.load(Ordering::SeqCst) {
            return Err(StoreError::Rejected {
                status: 503,
                body: "unavailable".to_string(),
            });
        }
        Ok(self.documents.lock().await.clone())
    }

    async fn insert(&self, document: NewDocument) -> kb_document_store::Result<Document> {
        self.inserts.fetch_add(1, Ordering::SeqCst);
        if self.fail_insert.load(Ordering::SeqCst) {
            return Err(StoreError::Rejected {
                status: 500,
                body: "insert failed".to_string(),
            });
        }
        let mut documents = self.documents.lock().await;
        let document = document.with_id(format!("mem-{}", documents.len()));
        documents.push(document.clone());
        Ok(document)
    }
}

/// Provider returning fixed vectors for known texts.
pub struct ScriptedProvider {
    vectors: HashMap<String, Vec<f32>>,
    dimension: usize,
    pub failing: AtomicBool,
    pub calls: AtomicUsize,
}

impl ScriptedProvider {
    pub fn new(dimension: usize, vectors: &[(&str, Vec<f32>)]) -> Self {
        Self {
            vectors: vectors
                .iter()
                .map(|(text, vector)| ((*text).to_string(), vector.clone()))
                .collect(),
            dimension,
            failing: AtomicBool::new(false),
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl EmbeddingProvider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    fn default_model(&self) -> &str {
        "scripted"
    }

    fn default_dimension(&self) -> usize {
        self.dimension
    }

    async fn embed(&self, request: EmbeddingRequest) -> kb_embeddings::Result<EmbeddingResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            return Err(EmbeddingError::ApiRequest("provider down".to_string()));
        }
        let embedding = self.vectors.get(&request.text).cloned().ok_or_else(|| {
            EmbeddingError::ApiRequest(format!("no vector for {:?}", request.text))
        })?;
        Ok(EmbeddingResponse {
            embedding,
            model: "scripted".to_string(),
            tokens_used: None,
        })
    }

    fn is_available(&self) -> bool {
        !self.failing.load(Ordering::SeqCst)
    }
}

pub fn scripted_gateway(provider: &Arc<ScriptedProvider>) -> EmbeddingGateway {
    let dimension = provider.dimension;
    EmbeddingGateway::new(Arc::clone(provider) as Arc<dyn EmbeddingProvider>, dimension)
}

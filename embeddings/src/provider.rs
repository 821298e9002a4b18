//! Embedding providers.
//!
//! The gateway talks to one of two providers: an OpenAI-compatible HTTP API,
//! or a deterministic mock used when no provider credits are available.

use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::error::{EmbeddingError, Result};
use crate::{DEFAULT_DIMENSION, Embedding};

/// Default OpenAI embedding model.
pub const DEFAULT_OPENAI_MODEL: &str = "text-embedding-3-small";

/// Request for generating embeddings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingRequest {
    /// Text to embed.
    pub text: String,

    /// Model to use (provider-specific).
    pub model: Option<String>,

    /// Dimensions for the output (if supported by provider).
    pub dimensions: Option<usize>,
}

impl EmbeddingRequest {
    /// Create a new embedding request.
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            model: None,
            dimensions: None,
        }
    }

    /// Set the model to use.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Set the output dimensions.
    pub fn with_dimensions(mut self, dimensions: usize) -> Self {
        self.dimensions = Some(dimensions);
        self
    }
}

/// Response from embedding generation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingResponse {
    /// The generated embedding.
    pub embedding: Embedding,

    /// Model used to generate the embedding.
    pub model: String,

    /// Token usage (if available).
    pub tokens_used: Option<u64>,
}

/// Trait for embedding providers.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Get the name of this provider.
    fn name(&self) -> &str;

    /// Get the default model for this provider.
    fn default_model(&self) -> &str;

    /// Get the default embedding dimension.
    fn default_dimension(&self) -> usize;

    /// Generate an embedding for the given text.
    async fn embed(&self, request: EmbeddingRequest) -> Result<EmbeddingResponse>;

    /// Whether the provider produces deterministic vectors without network I/O.
    fn is_mock(&self) -> bool {
        false
    }

    /// Check if the provider is usable (API key set, etc.).
    fn is_available(&self) -> bool;
}

/// Default OpenAI API base URL.
const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

/// Wait suggested when a 429 carries no usable `retry-after` header.
const DEFAULT_RETRY_AFTER_SECS: u64 = 60;

/// Provider for the OpenAI `/embeddings` endpoint and compatible servers.
pub struct OpenAIProvider {
    api_key: Option<String>,
    base_url: String,
    model: String,
    client: reqwest::Client,
}

impl OpenAIProvider {
    /// Create a provider with an explicit (possibly absent) API key.
    ///
    /// Without a key the provider reports itself unavailable and every
    /// `embed` call fails with [`EmbeddingError::ProviderNotConfigured`].
    pub fn new(api_key: Option<String>) -> Self {
        Self {
            api_key: api_key.filter(|key| !key.trim().is_empty()),
            base_url: OPENAI_BASE_URL.to_string(),
            model: DEFAULT_OPENAI_MODEL.to_string(),
            client: reqwest::Client::new(),
        }
    }

    /// Point the provider at another OpenAI-compatible server.
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    /// Model used when a request does not name one.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Map a non-success response onto an error.
    async fn rejection(response: reqwest::Response) -> EmbeddingError {
        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let retry_after_secs = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|value| value.to_str().ok())
                .and_then(|value| value.trim().parse().ok())
                .unwrap_or(DEFAULT_RETRY_AFTER_SECS);
            return EmbeddingError::RateLimited { retry_after_secs };
        }

        let body = response.text().await.unwrap_or_default();
        EmbeddingError::ApiRequest(format!("{status}: {body}"))
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAIProvider {
    fn name(&self) -> &str {
        "openai"
    }

    fn default_model(&self) -> &str {
        &self.model
    }

    fn default_dimension(&self) -> usize {
        if self.model == "text-embedding-3-large" {
            3072
        } else {
            DEFAULT_DIMENSION
        }
    }

    async fn embed(&self, request: EmbeddingRequest) -> Result<EmbeddingResponse> {
        let Some(api_key) = &self.api_key else {
            return Err(EmbeddingError::ProviderNotConfigured);
        };

        let body = EmbeddingsBody {
            input: &request.text,
            model: request.model.as_deref().unwrap_or(&self.model),
            dimensions: request.dimensions,
        };
        debug!(
            "Requesting {} embedding for {} chars",
            body.model,
            request.text.len()
        );

        let response = self
            .client
            .post(format!("{}/embeddings", self.base_url))
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(Self::rejection(response).await);
        }

        let EmbeddingsReply { data, model, usage } = response.json().await?;
        let Some(first) = data.into_iter().next() else {
            return Err(EmbeddingError::InvalidResponse(
                "response contained no embeddings".to_string(),
            ));
        };

        debug!("Received {}-dimensional embedding from {model}", first.embedding.len());
        Ok(EmbeddingResponse {
            embedding: first.embedding,
            model,
            tokens_used: usage.map(|usage| usage.total_tokens),
        })
    }

    fn is_available(&self) -> bool {
        self.api_key.is_some()
    }
}

/// Request body of `POST /embeddings`.
#[derive(Serialize)]
struct EmbeddingsBody<'a> {
    input: &'a str,
    model: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    dimensions: Option<usize>,
}

/// Response body of `POST /embeddings`.
#[derive(Deserialize)]
struct EmbeddingsReply {
    data: Vec<EmbeddingsItem>,
    model: String,
    usage: Option<EmbeddingsUsage>,
}

#[derive(Deserialize)]
struct EmbeddingsItem {
    embedding: Vec<f32>,
}

#[derive(Deserialize)]
struct EmbeddingsUsage {
    total_tokens: u64,
}

/// Deterministic embedding provider for development and tests.
///
/// The vector is drawn uniformly from `[0, 0.1)` with a generator seeded from
/// a SHA-256 digest of the text, so identical text always yields a
/// bit-identical vector.
pub struct MockProvider {
    dimension: usize,
}

impl MockProvider {
    /// Create a mock provider producing vectors of `dimension` components.
    pub fn new(dimension: usize) -> Self {
        Self { dimension }
    }

    fn seed(text: &str) -> u64 {
        let digest = Sha256::digest(text.as_bytes());
        let mut bytes = [0u8; 8];
        bytes.copy_from_slice(&digest[..8]);
        u64::from_le_bytes(bytes)
    }

    /// Generate the mock vector for `text` synchronously.
    pub fn vector_for(&self, text: &str) -> Embedding {
        Self::vector_of(text, self.dimension)
    }

    fn vector_of(text: &str, dimension: usize) -> Embedding {
        let mut rng = StdRng::seed_from_u64(Self::seed(text));
        (0..dimension).map(|_| rng.random::<f32>() * 0.1).collect()
    }
}

impl Default for MockProvider {
    fn default() -> Self {
        Self::new(DEFAULT_DIMENSION)
    }
}

#[async_trait]
impl EmbeddingProvider for MockProvider {
    fn name(&self) -> &str {
        "mock"
    }

    fn default_model(&self) -> &str {
        "mock"
    }

    fn default_dimension(&self) -> usize {
        self.dimension
    }

    async fn embed(&self, request: EmbeddingRequest) -> Result<EmbeddingResponse> {
        debug!("Generating mock embedding for {} chars", request.text.len());
        let dimension = request.dimensions.unwrap_or(self.dimension);
        Ok(EmbeddingResponse {
            embedding: Self::vector_of(&request.text, dimension),
            model: "mock".to_string(),
            tokens_used: None,
        })
    }

    fn is_mock(&self) -> bool {
        true
    }

    fn is_available(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_embedding_request() {
        let request = EmbeddingRequest::new("Hello world")
            .with_model("text-embedding-3-small")
            .with_dimensions(512);

        assert_eq!(request.text, "Hello world");
        assert_eq!(request.model, Some("text-embedding-3-small".to_string()));
        assert_eq!(request.dimensions, Some(512));
    }

    #[test]
    fn test_openai_provider_default_dimensions() {
        let provider = OpenAIProvider::new(None).with_model("text-embedding-3-large");
        assert_eq!(provider.default_dimension(), 3072);
        assert!(!provider.is_available());
    }

    #[test]
    fn test_mock_is_deterministic() {
        let provider = MockProvider::new(64);
        let a = provider.vector_for("annual leave policy");
        let b = MockProvider::new(64).vector_for("annual leave policy");
        let c = provider.vector_for("payroll schedule");

        assert_eq!(a.len(), 64);
        assert_eq!(
            a.iter().map(|x| x.to_bits()).collect::<Vec<_>>(),
            b.iter().map(|x| x.to_bits()).collect::<Vec<_>>()
        );
        assert_ne!(a, c);
        assert!(a.iter().all(|x| (0.0..=0.1).contains(x)));
    }

    #[tokio::test]
    async fn test_openai_embed_parses_response() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/embeddings"))
            .and(header("authorization", "Bearer sk-test"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": [{"embedding": [0.25, -0.5, 1.0], "index": 0}],
                "model": "text-embedding-3-small",
                "usage": {"prompt_tokens": 3, "total_tokens": 3}
            })))
            .mount(&server)
            .await;

        let provider = OpenAIProvider::new(Some("sk-test".to_string())).with_base_url(server.uri());
        let response = provider.embed(EmbeddingRequest::new("hi")).await.unwrap();

        assert_eq!(response.embedding, vec![0.25, -0.5, 1.0]);
        assert_eq!(response.tokens_used, Some(3));
    }

    #[tokio::test]
    async fn test_openai_rate_limited() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/embeddings"))
            .respond_with(ResponseTemplate::new(429).insert_header("retry-after", "7"))
            .mount(&server)
            .await;

        let provider = OpenAIProvider::new(Some("sk-test".to_string())).with_base_url(server.uri());
        let err = provider.embed(EmbeddingRequest::new("hi")).await.unwrap_err();
        assert!(matches!(
            err,
            EmbeddingError::RateLimited {
                retry_after_secs: 7
            }
        ));
    }

    #[tokio::test]
    async fn test_openai_request_body_and_server_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/embeddings"))
            .and(body_json(serde_json::json!({
                "input": "hi",
                "model": "text-embedding-3-large"
            })))
            .respond_with(ResponseTemplate::new(500).set_body_string("overloaded"))
            .mount(&server)
            .await;

        let provider = OpenAIProvider::new(Some("sk-test".to_string()))
            .with_base_url(format!("{}/", server.uri()))
            .with_model("text-embedding-3-large");
        let err = provider.embed(EmbeddingRequest::new("hi")).await.unwrap_err();
        match err {
            EmbeddingError::ApiRequest(message) => {
                assert!(message.starts_with("500"));
                assert!(message.contains("overloaded"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_openai_without_key_is_not_configured() {
        let provider = OpenAIProvider::new(Some("  ".to_string()));
        let err = provider.embed(EmbeddingRequest::new("hi")).await.unwrap_err();
        assert!(matches!(err, EmbeddingError::ProviderNotConfigured));
    }
}

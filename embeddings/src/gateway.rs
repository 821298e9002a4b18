//! Embedding gateway: the single entry point the engine uses to turn text
//! into vectors.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::Embedding;
use crate::distance::is_finite;
use crate::error::{EmbeddingError, Result};
use crate::provider::{EmbeddingProvider, EmbeddingRequest, MockProvider};

/// Text embedded when probing a real provider for availability.
const PROBE_TEXT: &str = "test";

/// Whether the gateway is backed by the deterministic mock or a real provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GatewayMode {
    /// Deterministic vectors seeded from the text.
    Mock,
    /// A remote embedding provider.
    Real,
}

/// Result of an availability probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewayStatus {
    /// Whether an embedding can currently be produced.
    pub available: bool,

    /// Which kind of provider backs the gateway.
    pub mode: GatewayMode,
}

/// Wraps a provider with the dimension contract and a call timeout.
#[derive(Clone)]
pub struct EmbeddingGateway {
    provider: Arc<dyn EmbeddingProvider>,
    model: Option<String>,
    dimension: usize,
    timeout: Duration,
}

impl EmbeddingGateway {
    /// Create a gateway over `provider`, expecting vectors of `dimension`.
    pub fn new(provider: Arc<dyn EmbeddingProvider>, dimension: usize) -> Self {
        Self {
            provider,
            model: None,
            dimension,
            timeout: Duration::from_secs(30),
        }
    }

    /// Create a gateway backed by the deterministic mock provider.
    pub fn mock(dimension: usize) -> Self {
        Self::new(Arc::new(MockProvider::new(dimension)), dimension)
    }

    /// Override the provider's default model.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Bound every provider call by `timeout`.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Dimension every returned vector is guaranteed to have.
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Mode of the underlying provider.
    pub fn mode(&self) -> GatewayMode {
        if self.provider.is_mock() {
            GatewayMode::Mock
        } else {
            GatewayMode::Real
        }
    }

    /// Embed `text`.
    ///
    /// Fails on provider errors, on timeout, and when the vector has the
    /// wrong dimension or non-finite components.
    pub async fn embed(&self, text: &str) -> Result<Embedding> {
        let mut request = EmbeddingRequest::new(text).with_dimensions(self.dimension);
        if let Some(model) = &self.model {
            request = request.with_model(model.clone());
        }

        let response = tokio::time::timeout(self.timeout, self.provider.embed(request))
            .await
            .map_err(|_| EmbeddingError::Timeout {
                timeout_ms: u64::try_from(self.timeout.as_millis()).unwrap_or(u64::MAX),
            })??;

        if response.embedding.len() != self.dimension {
            return Err(EmbeddingError::DimensionMismatch {
                expected: self.dimension,
                actual: response.embedding.len(),
            });
        }

        if !is_finite(&response.embedding) {
            return Err(EmbeddingError::NonFinite);
        }

        match response.tokens_used {
            Some(tokens) => debug!(
                "Embedded {} chars via {} ({}, {tokens} tokens)",
                text.len(),
                self.provider.name(),
                response.model
            ),
            None => debug!(
                "Embedded {} chars via {} ({})",
                text.len(),
                self.provider.name(),
                response.model
            ),
        }
        Ok(response.embedding)
    }

    /// Probe whether embeddings can be produced right now.
    ///
    /// The mock is always available; a real provider must be configured and
    /// answer a short probe request.
    pub async fn status(&self) -> GatewayStatus {
        let mode = self.mode();
        let available = match mode {
            GatewayMode::Mock => true,
            GatewayMode::Real if !self.provider.is_available() => false,
            GatewayMode::Real => match self.embed(PROBE_TEXT).await {
                Ok(_) => true,
                Err(e) => {
                    warn!("Embedding provider {} unavailable: {e}", self.provider.name());
                    false
                }
            },
        };

        GatewayStatus { available, mode }
    }
}

impl std::fmt::Debug for EmbeddingGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmbeddingGateway")
            .field("provider", &self.provider.name())
            .field("model", &self.model)
            .field("dimension", &self.dimension)
            .field("timeout", &self.timeout)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::EmbeddingResponse;
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;

    struct FixedProvider {
        embedding: Embedding,
        delay: Duration,
    }

    #[async_trait]
    impl EmbeddingProvider for FixedProvider {
        fn name(&self) -> &str {
            "fixed"
        }

        fn default_model(&self) -> &str {
            "fixed"
        }

        fn default_dimension(&self) -> usize {
            self.embedding.len()
        }

        async fn embed(&self, _request: EmbeddingRequest) -> Result<EmbeddingResponse> {
            tokio::time::sleep(self.delay).await;
            Ok(EmbeddingResponse {
                embedding: self.embedding.clone(),
                model: "fixed".to_string(),
                tokens_used: None,
            })
        }

        fn is_available(&self) -> bool {
            true
        }
    }

    fn fixed(embedding: Embedding, delay: Duration) -> Arc<dyn EmbeddingProvider> {
        Arc::new(FixedProvider { embedding, delay })
    }

    #[tokio::test]
    async fn test_mock_gateway_is_deterministic() {
        let gateway = EmbeddingGateway::mock(32);
        let a = gateway.embed("leave policy").await.unwrap();
        let b = gateway.embed("leave policy").await.unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 32);
        assert_eq!(gateway.mode(), GatewayMode::Mock);
    }

    #[test]
    fn test_mock_gateway_outside_async_context() {
        let gateway = EmbeddingGateway::mock(4);
        let embedding = tokio_test::block_on(gateway.embed("payroll")).unwrap();
        assert!(embedding.iter().all(|x| (0.0..=0.1).contains(x)));
    }

    #[tokio::test]
    async fn test_dimension_mismatch_is_rejected() {
        let gateway = EmbeddingGateway::new(fixed(vec![1.0, 2.0], Duration::ZERO), 3);
        let err = gateway.embed("x").await.unwrap_err();
        assert!(matches!(
            err,
            EmbeddingError::DimensionMismatch {
                expected: 3,
                actual: 2
            }
        ));
    }

    #[tokio::test]
    async fn test_non_finite_is_rejected() {
        let gateway = EmbeddingGateway::new(fixed(vec![1.0, f32::NAN], Duration::ZERO), 2);
        assert!(matches!(
            gateway.embed("x").await,
            Err(EmbeddingError::NonFinite)
        ));
    }

    #[tokio::test]
    async fn test_timeout() {
        let gateway = EmbeddingGateway::new(fixed(vec![1.0], Duration::from_secs(5)), 1)
            .with_timeout(Duration::from_millis(20));
        assert!(matches!(
            gateway.embed("x").await,
            Err(EmbeddingError::Timeout { timeout_ms: 20 })
        ));
    }

    #[tokio::test]
    async fn test_dimension_is_requested_from_provider() {
        use serde_json::json;
        use wiremock::matchers::{body_partial_json, method, path};
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/embeddings"))
            .and(body_partial_json(json!({
                "model": "text-embedding-3-large",
                "dimensions": 1536
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": [{"embedding": vec![0.01_f32; 1536]}],
                "model": "text-embedding-3-large",
                "usage": {"prompt_tokens": 1, "total_tokens": 1}
            })))
            .with_priority(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/embeddings"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": [{"embedding": vec![0.01_f32; 3072]}],
                "model": "text-embedding-3-large"
            })))
            .mount(&server)
            .await;

        let provider = crate::OpenAIProvider::new(Some("sk-test".to_string()))
            .with_base_url(server.uri());
        let gateway =
            EmbeddingGateway::new(Arc::new(provider), 1536).with_model("text-embedding-3-large");

        let embedding = gateway.embed("hello").await.unwrap();
        assert_eq!(embedding.len(), 1536);
    }

    #[tokio::test]
    async fn test_status() {
        let mock = EmbeddingGateway::mock(8).status().await;
        assert_eq!(
            mock,
            GatewayStatus {
                available: true,
                mode: GatewayMode::Mock
            }
        );

        let real = EmbeddingGateway::new(fixed(vec![0.5; 4], Duration::ZERO), 4)
            .status()
            .await;
        assert_eq!(
            real,
            GatewayStatus {
                available: true,
                mode: GatewayMode::Real
            }
        );

        let unconfigured =
            EmbeddingGateway::new(Arc::new(crate::OpenAIProvider::new(None)), 1536)
                .status()
                .await;
        assert!(!unconfigured.available);
    }
}

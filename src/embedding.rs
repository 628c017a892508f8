//! HTTP embedding providers.
//!
//! [`OpenAiEmbedder`] calls an OpenAI-compatible `/embeddings` endpoint
//! through the resilient call layer. It implements the core
//! [`EmbeddingProvider`] trait, which is soft-failing: blank input, a
//! missing API key, a non-2xx response, a malformed body and exhausted
//! retries all come back as `None`.
//!
//! Use [`create_provider`] to pick the provider named in `[embedding]`:
//!
//! ```rust
//! use cellar_search::config::EmbeddingConfig;
//! use cellar_search::embedding::{create_provider, EmbeddingProvider};
//!
//! let provider = create_provider(&EmbeddingConfig::default()).unwrap();
//! assert_eq!(provider.model_name(), "disabled");
//! ```

use std::sync::Arc;

use anyhow::{bail, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use cellar_search_core::embedding::{truncate_chars, DisabledProvider};
pub use cellar_search_core::embedding::EmbeddingProvider;

use crate::config::EmbeddingConfig;
use crate::http::{call, CallOptions, HttpRequest, HttpTransport, ReqwestTransport};

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a str,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingDatum>,
}

#[derive(Deserialize)]
struct EmbeddingDatum {
    embedding: Vec<f32>,
}

/// OpenAI-compatible embeddings client.
pub struct OpenAiEmbedder {
    transport: Arc<dyn HttpTransport>,
    endpoint: String,
    model: String,
    dims: usize,
    api_key: Option<String>,
    max_input_chars: usize,
    call_opts: CallOptions,
}

impl OpenAiEmbedder {
    /// Build from config, reading the key from `config.api_key_env`.
    ///
    /// A missing key is not an error here; every `embed` call then yields
    /// `None` without touching the network.
    pub fn from_config(config: &EmbeddingConfig, transport: Arc<dyn HttpTransport>) -> Result<Self> {
        let model = config
            .model
            .clone()
            .ok_or_else(|| anyhow::anyhow!("embedding.model required for OpenAI provider"))?;
        let dims = config
            .dims
            .ok_or_else(|| anyhow::anyhow!("embedding.dims required for OpenAI provider"))?;
        let api_key = std::env::var(&config.api_key_env)
            .ok()
            .filter(|k| !k.trim().is_empty());
        if api_key.is_none() {
            warn!(
                env = %config.api_key_env,
                "embedding API key not set, semantic search will return no matches"
            );
        }

        Ok(Self {
            transport,
            endpoint: config.endpoint.clone(),
            model,
            dims,
            api_key,
            max_input_chars: config.max_input_chars,
            call_opts: CallOptions::new(config.timeout(), config.max_retries, config.backoff()),
        })
    }

    pub fn with_api_key(mut self, api_key: Option<String>) -> Self {
        self.api_key = api_key;
        self
    }

    async fn request(&self, api_key: &str, text: &str) -> Option<Vec<f32>> {
        let body = EmbeddingRequest {
            model: &self.model,
            input: truncate_chars(text, self.max_input_chars),
        };
        let request = match HttpRequest::post_json(&self.endpoint, &body) {
            Ok(r) => r.header("Authorization", format!("Bearer {api_key}")),
            Err(e) => {
                warn!(error = %e, "failed to encode embedding request");
                return None;
            }
        };

        let resp = match call(self.transport.as_ref(), &request, &self.call_opts).await {
            Ok(resp) => resp,
            Err(e) => {
                warn!(error = %e, "embedding request failed");
                return None;
            }
        };
        if !resp.is_success() {
            warn!(status = resp.status, body = %resp.body, "embedding provider returned an error");
            return None;
        }

        match resp.json::<EmbeddingResponse>() {
            Ok(parsed) => match parsed.data.into_iter().next() {
                Some(datum) if !datum.embedding.is_empty() => Some(datum.embedding),
                _ => {
                    warn!("embedding response contained no vector");
                    None
                }
            },
            Err(e) => {
                warn!(error = %e, "malformed embedding response");
                None
            }
        }
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAiEmbedder {
    fn model_name(&self) -> &str {
        &self.model
    }

    fn dims(&self) -> usize {
        self.dims
    }

    async fn embed(&self, text: &str) -> Option<Vec<f32>> {
        if text.trim().is_empty() {
            return None;
        }
        let Some(api_key) = self.api_key.as_deref() else {
            debug!("no embedding API key, skipping call");
            return None;
        };
        self.request(api_key, text).await
    }
}

/// Create the provider named by `config.provider`.
pub fn create_provider(config: &EmbeddingConfig) -> Result<Arc<dyn EmbeddingProvider>> {
    create_provider_with_transport(config, Arc::new(ReqwestTransport::new()))
}

pub fn create_provider_with_transport(
    config: &EmbeddingConfig,
    transport: Arc<dyn HttpTransport>,
) -> Result<Arc<dyn EmbeddingProvider>> {
    match config.provider.as_str() {
        "disabled" => Ok(Arc::new(DisabledProvider)),
        "openai" => Ok(Arc::new(OpenAiEmbedder::from_config(config, transport)?)),
        other => bail!("Unknown embedding provider: {}", other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::testing::{ScriptedTransport, Step};
    use cellar_search_core::SearchError;

    fn config() -> EmbeddingConfig {
        EmbeddingConfig {
            provider: "openai".into(),
            model: Some("text-embedding-3-small".into()),
            dims: Some(3),
            endpoint: "http://embed.test/v1/embeddings".into(),
            api_key_env: "CELLAR_TEST_UNSET_EMBEDDING_KEY".into(),
            max_retries: 2,
            ..EmbeddingConfig::default()
        }
    }

    fn embedder(transport: Arc<ScriptedTransport>) -> OpenAiEmbedder {
        OpenAiEmbedder::from_config(&config(), transport)
            .unwrap()
            .with_api_key(Some("sk-test".into()))
    }

    const OK_BODY: &str = r#"{"data":[{"embedding":[0.1,0.2,0.3]}]}"#;

    #[tokio::test]
    async fn test_blank_text_makes_no_call() {
        let transport = Arc::new(ScriptedTransport::always(200, OK_BODY));
        let e = embedder(transport.clone());
        assert!(e.embed("   ").await.is_none());
        assert_eq!(transport.calls(), 0);
    }

    #[tokio::test]
    async fn test_missing_key_makes_no_call() {
        let transport = Arc::new(ScriptedTransport::always(200, OK_BODY));
        let e = OpenAiEmbedder::from_config(&config(), transport.clone()).unwrap();
        assert!(e.embed("pinot noir").await.is_none());
        assert_eq!(transport.calls(), 0);
    }

    #[tokio::test]
    async fn test_success_parses_vector_and_sends_model() {
        let transport = Arc::new(ScriptedTransport::always(200, OK_BODY));
        let e = embedder(transport.clone());
        assert_eq!(e.embed("pinot noir").await, Some(vec![0.1, 0.2, 0.3]));

        let req = transport.last_request().unwrap();
        assert_eq!(req.body["model"], "text-embedding-3-small");
        assert_eq!(req.body["input"], "pinot noir");
        assert!(req
            .headers
            .iter()
            .any(|(k, v)| k == "Authorization" && v == "Bearer sk-test"));
    }

    #[tokio::test]
    async fn test_input_truncated() {
        let transport = Arc::new(ScriptedTransport::always(200, OK_BODY));
        let e = embedder(transport.clone());
        let long = "あ".repeat(9000);
        e.embed(&long).await;
        let req = transport.last_request().unwrap();
        assert_eq!(req.body["input"].as_str().unwrap().chars().count(), 8000);
    }

    #[tokio::test]
    async fn test_client_error_yields_none() {
        let transport = Arc::new(ScriptedTransport::always(401, "unauthorized"));
        let e = embedder(transport.clone());
        assert!(e.embed("sake").await.is_none());
        assert_eq!(transport.calls(), 1);
    }

    #[tokio::test]
    async fn test_malformed_body_yields_none() {
        let transport = Arc::new(ScriptedTransport::always(200, "{\"data\":"));
        assert!(embedder(transport).embed("sake").await.is_none());

        let empty = Arc::new(ScriptedTransport::always(200, r#"{"data":[]}"#));
        assert!(embedder(empty).embed("sake").await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausted_retries_yield_none() {
        let transport = Arc::new(ScriptedTransport::new(vec![
            Step::Fail(SearchError::Network("refused".into())),
            Step::Fail(SearchError::Network("refused".into())),
            Step::Fail(SearchError::Network("refused".into())),
        ]));
        let e = embedder(transport.clone());
        assert!(e.embed("sake").await.is_none());
        assert_eq!(transport.calls(), 3);
    }

    #[test]
    fn test_create_provider_selects_by_name() {
        let disabled = create_provider(&EmbeddingConfig::default()).unwrap();
        assert_eq!(disabled.dims(), 0);

        let openai = create_provider(&config()).unwrap();
        assert_eq!(openai.model_name(), "text-embedding-3-small");
        assert_eq!(openai.dims(), 3);

        let mut bad = config();
        bad.provider = "cohere".into();
        assert!(create_provider(&bad).is_err());
    }
}

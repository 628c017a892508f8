//! Resilient outbound HTTP calls.
//!
//! Every request the adapters make goes through [`call`]: each attempt runs
//! under its own timeout, and retryable failures are retried with
//! exponential backoff (`backoff × 2^attempt`) up to `retries` extra times.
//!
//! | Outcome of an attempt | Attempts left | Result |
//! |-----------------------|---------------|--------|
//! | status in `retryable_statuses` | yes | sleep, retry |
//! | status in `retryable_statuses` | no | the response is returned |
//! | any other status (2xx or not) | - | the response is returned |
//! | network error or timeout | yes | sleep, retry |
//! | network error or timeout | no | the last error is returned |
//! | any other error | - | returned immediately |
//!
//! Non-2xx responses are never turned into errors here; the adapter above
//! decides what a given status means for its endpoint.
//!
//! The transport sits behind [`HttpTransport`] so tests can script
//! responses without a socket. [`ReqwestTransport`] is the real one.

use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};

use cellar_search_core::backoff::{RetryDecision, RetryState};
use cellar_search_core::{CallResult, SearchError};

/// Statuses retried by default: rate limiting and transient server errors.
pub const DEFAULT_RETRYABLE_STATUSES: [u16; 5] = [429, 500, 502, 503, 504];

/// A prepared outbound request. Always JSON-bodied.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: serde_json::Value,
}

impl HttpRequest {
    pub fn post_json(url: impl Into<String>, body: &impl Serialize) -> CallResult<Self> {
        Ok(Self {
            url: url.into(),
            headers: Vec::new(),
            body: serde_json::to_value(body)?,
        })
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }
}

/// A settled response, whatever its status.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn json<T: DeserializeOwned>(&self) -> CallResult<T> {
        Ok(serde_json::from_str(&self.body)?)
    }
}

/// Sends one request, once. Retrying is [`call`]'s job.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn send(&self, request: &HttpRequest) -> CallResult<HttpResponse>;
}

/// `reqwest`-backed transport.
#[derive(Clone, Default)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn send(&self, request: &HttpRequest) -> CallResult<HttpResponse> {
        let mut builder = self.client.post(&request.url).json(&request.body);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        let resp = builder
            .send()
            .await
            .map_err(|e| SearchError::Network(e.to_string()))?;
        let status = resp.status().as_u16();
        let body = resp
            .text()
            .await
            .map_err(|e| SearchError::Network(e.to_string()))?;

        Ok(HttpResponse { status, body })
    }
}

/// Timeout and retry budget for one [`call`].
#[derive(Debug, Clone)]
pub struct CallOptions {
    pub timeout: Duration,
    /// Extra attempts after the first.
    pub retries: u32,
    pub backoff: Duration,
    pub retryable_statuses: Vec<u16>,
}

impl Default for CallOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(15),
            retries: 2,
            backoff: Duration::from_millis(1000),
            retryable_statuses: DEFAULT_RETRYABLE_STATUSES.to_vec(),
        }
    }
}

impl CallOptions {
    pub fn new(timeout: Duration, retries: u32, backoff: Duration) -> Self {
        Self {
            timeout,
            retries,
            backoff,
            ..Self::default()
        }
    }
}

/// Issue `request` with per-attempt timeout and bounded backoff retry.
///
/// Returns the first response that is not retryable, or the last response
/// once attempts run out. Errors are returned only when the final attempt
/// itself failed, or immediately for errors that are not retryable.
pub async fn call(
    transport: &dyn HttpTransport,
    request: &HttpRequest,
    opts: &CallOptions,
) -> CallResult<HttpResponse> {
    let mut state: RetryState<SearchError> = RetryState::new(opts.retries, opts.backoff);

    loop {
        let attempt = state.attempt();
        let outcome = match tokio::time::timeout(opts.timeout, transport.send(request)).await {
            Ok(result) => result,
            Err(_) => Err(SearchError::Timeout(opts.timeout)),
        };

        let delay = match outcome {
            Ok(resp) if opts.retryable_statuses.contains(&resp.status) => {
                let status = resp.status;
                let err = SearchError::Http {
                    status,
                    body: resp.body.clone(),
                };
                match state.fail(err) {
                    RetryDecision::RetryAfter(delay) => {
                        debug!(url = %request.url, attempt, status, ?delay, "retryable status");
                        delay
                    }
                    RetryDecision::GiveUp => {
                        warn!(url = %request.url, attempt, status, "retries exhausted, returning last response");
                        return Ok(resp);
                    }
                }
            }
            Ok(resp) => return Ok(resp),
            Err(err) if err.is_retryable() => match state.fail(err) {
                RetryDecision::RetryAfter(delay) => {
                    debug!(
                        url = %request.url,
                        attempt,
                        ?delay,
                        error = ?state.last_error(),
                        "attempt failed, retrying"
                    );
                    delay
                }
                RetryDecision::GiveUp => {
                    let err = state
                        .into_last_error()
                        .unwrap_or_else(|| SearchError::Network("retries exhausted".into()));
                    warn!(url = %request.url, attempt, error = %err, "retries exhausted");
                    return Err(err);
                }
            },
            Err(err) => return Err(err),
        };

        tokio::time::sleep(delay).await;
    }
}

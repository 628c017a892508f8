//! Error taxonomy shared by every adapter.
//!
//! | Variant | Origin | Retried |
//! |---------|--------|---------|
//! | [`SearchError::Network`] | transport failure | yes |
//! | [`SearchError::Timeout`] | per-attempt timer fired | yes |
//! | [`SearchError::Http`] | non-2xx from the vector store | no |
//! | [`SearchError::MetadataTooLarge`] / [`SearchError::TooManyMetadataKeys`] | upsert validation | no, never sent |
//! | [`SearchError::MalformedResponse`] | body did not parse | no |
//! | [`SearchError::Persistence`] | key-value backend | no |

use std::time::Duration;

/// Errors raised below the search orchestrator.
#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    #[error("network error: {0}")]
    Network(String),

    #[error("request timed out after {}ms", .0.as_millis())]
    Timeout(Duration),

    #[error("vector store returned HTTP {status}: {body}")]
    Http { status: u16, body: String },

    #[error("metadata for '{id}' is {size} bytes, limit is {limit} bytes")]
    MetadataTooLarge { id: String, size: usize, limit: usize },

    #[error("metadata for '{id}' has {count} keys, limit is {limit}")]
    TooManyMetadataKeys {
        id: String,
        count: usize,
        limit: usize,
    },

    #[error("malformed response: {0}")]
    MalformedResponse(String),

    #[error("persistence error: {0}")]
    Persistence(String),
}

impl SearchError {
    /// Only transport failures and timeouts are worth another attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(self, SearchError::Network(_) | SearchError::Timeout(_))
    }

    /// True for the upsert validation failures that are raised before any request.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            SearchError::MetadataTooLarge { .. } | SearchError::TooManyMetadataKeys { .. }
        )
    }
}

impl From<serde_json::Error> for SearchError {
    fn from(err: serde_json::Error) -> Self {
        SearchError::MalformedResponse(err.to_string())
    }
}

/// Result alias used by the adapters and ports.
pub type CallResult<T> = std::result::Result<T, SearchError>;

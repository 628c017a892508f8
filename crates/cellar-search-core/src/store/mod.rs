//! Vector store abstraction.
//!
//! The [`VectorStore`] trait covers the three operations the engine needs
//! from an external similarity-search service: query, upsert, and delete.
//! The HTTP implementation lives in the app crate; [`memory::InMemoryVectorStore`]
//! backs tests and offline runs.
//!
//! Upserts are validated against [`MetadataLimits`] before anything leaves
//! the process. A violation is a [`SearchError`] validation variant and the
//! whole batch is rejected.

pub mod memory;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{CallResult, SearchError};

/// One hit from a vector query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorMatch {
    pub id: String,
    pub score: f64,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

/// A vector to write, with its metadata payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorRecord {
    pub id: String,
    pub values: Vec<f32>,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

/// Parameters for [`VectorStore::query`].
#[derive(Debug, Clone)]
pub struct QueryOptions {
    pub top_k: usize,
    pub namespace: String,
    /// Metadata filter in the store's filter syntax (`{"type": {"$eq": "wine"}}`).
    pub filter: Option<Value>,
    pub include_metadata: bool,
}

impl Default for QueryOptions {
    fn default() -> Self {
        Self {
            top_k: 10,
            namespace: String::new(),
            filter: None,
            include_metadata: true,
        }
    }
}

/// Hard limits on per-vector metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetadataLimits {
    /// Maximum serialized JSON size in bytes.
    pub max_bytes: usize,
    /// Maximum number of top-level keys.
    pub max_keys: usize,
}

impl Default for MetadataLimits {
    fn default() -> Self {
        Self {
            max_bytes: 40 * 1024,
            max_keys: 100,
        }
    }
}

impl MetadataLimits {
    /// Check one record's metadata.
    pub fn validate(&self, record: &VectorRecord) -> CallResult<()> {
        let count = record.metadata.len();
        if count > self.max_keys {
            return Err(SearchError::TooManyMetadataKeys {
                id: record.id.clone(),
                count,
                limit: self.max_keys,
            });
        }
        let size = serde_json::to_vec(&record.metadata)?.len();
        if size > self.max_bytes {
            return Err(SearchError::MetadataTooLarge {
                id: record.id.clone(),
                size,
                limit: self.max_bytes,
            });
        }
        Ok(())
    }

    /// Check every record; the first violation rejects the batch.
    pub fn validate_all(&self, records: &[VectorRecord]) -> CallResult<()> {
        records.iter().try_for_each(|r| self.validate(r))
    }
}

/// External similarity-search service.
///
/// # Operations
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`query`](VectorStore::query) | Nearest neighbours of a vector |
/// | [`upsert`](VectorStore::upsert) | Insert or replace vectors (validated first) |
/// | [`delete`](VectorStore::delete) | Remove vectors by id |
#[async_trait]
pub trait VectorStore: Send + Sync {
    async fn query(&self, vector: &[f32], opts: &QueryOptions) -> CallResult<Vec<VectorMatch>>;

    /// Returns the number of vectors written.
    async fn upsert(&self, records: &[VectorRecord], namespace: &str) -> CallResult<usize>;

    async fn delete(&self, ids: &[String], namespace: &str) -> CallResult<()>;
}

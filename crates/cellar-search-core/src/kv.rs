//! Key-value persistence port and the versioned envelope stored under it.
//!
//! History, trending and context data are each kept under one fixed key as
//! a JSON envelope `{version, timestamp, payload}`. Reads never fail: a
//! missing key, a backend error, unparseable JSON or a version mismatch all
//! degrade to `T::default()`.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::{CallResult, SearchError};

/// Minimal string key-value store.
#[async_trait]
pub trait KvStore: Send + Sync {
    async fn get(&self, key: &str) -> CallResult<Option<String>>;
    async fn set(&self, key: &str, value: &str) -> CallResult<()>;
    async fn delete(&self, key: &str) -> CallResult<()>;
}

/// Persisted wrapper around a payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope<T> {
    pub version: u32,
    /// Write time, epoch milliseconds.
    pub timestamp: i64,
    pub payload: T,
}

/// Why an envelope read fell back to the default.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnvelopeMiss {
    Missing,
    Backend(String),
    Parse(String),
    Version { found: u32, expected: u32 },
}

/// Decode an envelope, checking its version.
pub fn decode_envelope<T: DeserializeOwned>(
    raw: &str,
    version: u32,
) -> Result<T, EnvelopeMiss> {
    let envelope: Envelope<T> =
        serde_json::from_str(raw).map_err(|e| EnvelopeMiss::Parse(e.to_string()))?;
    if envelope.version != version {
        return Err(EnvelopeMiss::Version {
            found: envelope.version,
            expected: version,
        });
    }
    Ok(envelope.payload)
}

/// Read the payload under `key`, or explain why it could not be read.
pub async fn try_load_envelope<T: DeserializeOwned>(
    kv: &dyn KvStore,
    key: &str,
    version: u32,
) -> Result<T, EnvelopeMiss> {
    let raw = kv
        .get(key)
        .await
        .map_err(|e| EnvelopeMiss::Backend(e.to_string()))?
        .ok_or(EnvelopeMiss::Missing)?;
    decode_envelope(&raw, version)
}

/// Write `payload` under `key` in a fresh envelope.
pub async fn save_envelope<T: Serialize + Sync>(
    kv: &dyn KvStore,
    key: &str,
    version: u32,
    payload: &T,
) -> CallResult<()> {
    let envelope = Envelope {
        version,
        timestamp: chrono::Utc::now().timestamp_millis(),
        payload,
    };
    let raw = serde_json::to_string(&envelope)
        .map_err(|e| SearchError::Persistence(e.to_string()))?;
    kv.set(key, &raw).await
}

/// In-memory [`KvStore`] for tests and single-process runs.
#[derive(Default)]
pub struct MemoryKv {
    entries: RwLock<HashMap<String, String>>,
}

impl MemoryKv {
    pub fn new() -> Self {
        Self::default()
    }
}

fn poisoned() -> SearchError {
    SearchError::Persistence("kv lock poisoned".to_string())
}

#[async_trait]
impl KvStore for MemoryKv {
    async fn get(&self, key: &str) -> CallResult<Option<String>> {
        Ok(self.entries.read().map_err(|_| poisoned())?.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> CallResult<()> {
        self.entries
            .write()
            .map_err(|_| poisoned())?
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn delete(&self, key: &str) -> CallResult<()> {
        self.entries.write().map_err(|_| poisoned())?.remove(key);
        Ok(())
    }
}

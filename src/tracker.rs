//! Persisted search history, global trending counts and rolling context.
//!
//! Each list lives under one fixed key as a versioned envelope in a
//! [`KvStore`]. Updates are read-modify-write without a transaction. Writers
//! sharing one [`SearchTracker`] are serialised; separate processes on the
//! same store can still lose an update (last write wins).

use std::sync::Arc;

use serde::de::DeserializeOwned;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use cellar_search_core::category::CategoryTable;
use cellar_search_core::history;
use cellar_search_core::kv::{save_envelope, try_load_envelope, EnvelopeMiss, KvStore};
use cellar_search_core::models::{SearchContext, SearchHistoryEntry, TrendingSearch};
use cellar_search_core::CallResult;

use crate::config::HistoryConfig;

pub const HISTORY_KEY: &str = "cellar.search.history";
pub const TRENDING_KEY: &str = "cellar.search.trending";
pub const CONTEXT_KEY: &str = "cellar.search.context";
pub const ENVELOPE_VERSION: u32 = 1;

/// Load the payload under `key`, degrading to `T::default()` on any miss.
pub async fn load_envelope<T: DeserializeOwned + Default>(kv: &dyn KvStore, key: &str) -> T {
    match try_load_envelope(kv, key, ENVELOPE_VERSION).await {
        Ok(payload) => payload,
        Err(EnvelopeMiss::Missing) => {
            debug!(key, "no stored value, using default");
            T::default()
        }
        Err(miss) => {
            warn!(key, reason = ?miss, "stored value unusable, using default");
            T::default()
        }
    }
}

pub struct SearchTracker {
    kv: Arc<dyn KvStore>,
    categories: Arc<CategoryTable>,
    caps: HistoryConfig,
    /// Serialises read-modify-write cycles within this process.
    write_lock: Mutex<()>,
}

impl SearchTracker {
    pub fn new(kv: Arc<dyn KvStore>, categories: Arc<CategoryTable>, caps: HistoryConfig) -> Self {
        Self {
            kv,
            categories,
            caps,
            write_lock: Mutex::new(()),
        }
    }

    pub async fn history(&self) -> Vec<SearchHistoryEntry> {
        load_envelope(self.kv.as_ref(), HISTORY_KEY).await
    }

    pub async fn trending(&self) -> Vec<TrendingSearch> {
        load_envelope(self.kv.as_ref(), TRENDING_KEY).await
    }

    /// Rolling context snapshots, oldest first.
    pub async fn contexts(&self) -> Vec<SearchContext> {
        load_envelope(self.kv.as_ref(), CONTEXT_KEY).await
    }

    /// Record a committed search in both the history and the trending table.
    ///
    /// Leading and trailing whitespace is trimmed; a blank term is ignored.
    pub async fn record_search(&self, term: &str) -> CallResult<()> {
        let term = term.trim();
        if term.is_empty() {
            return Ok(());
        }
        let now = chrono::Utc::now().timestamp_millis();
        let _guard = self.write_lock.lock().await;

        let mut entries = self.history().await;
        history::record_history(&mut entries, term, now, self.caps.max_history);
        save_envelope(self.kv.as_ref(), HISTORY_KEY, ENVELOPE_VERSION, &entries).await?;

        let mut trending = self.trending().await;
        history::record_trending(&mut trending, term, &self.categories, self.caps.max_trending);
        save_envelope(self.kv.as_ref(), TRENDING_KEY, ENVELOPE_VERSION, &trending).await?;

        debug!(term, history = entries.len(), trending = trending.len(), "recorded search");
        Ok(())
    }

    pub async fn record_context(&self, context: SearchContext) -> CallResult<()> {
        let _guard = self.write_lock.lock().await;
        let mut contexts = self.contexts().await;
        history::record_context(&mut contexts, context, self.caps.max_context);
        save_envelope(self.kv.as_ref(), CONTEXT_KEY, ENVELOPE_VERSION, &contexts).await
    }

    pub async fn latest_context(&self) -> Option<SearchContext> {
        self.contexts().await.pop()
    }

    /// Forget this user's history and context. Trending is global and stays.
    pub async fn clear_history(&self) -> CallResult<()> {
        let _guard = self.write_lock.lock().await;
        self.kv.delete(HISTORY_KEY).await?;
        self.kv.delete(CONTEXT_KEY).await
    }
}

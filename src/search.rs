//! Search orchestration.
//!
//! [`SearchEngine`] drives one search strictly in sequence:
//!
//! 1. embed the query (a missing vector means zero semantic matches),
//! 2. query the vector store for `2 × limit` candidates,
//! 3. rank them with [`rank_matches`],
//! 4. generate suggestions for the stats,
//! 5. record the query in history and trending.
//!
//! Failures below the engine never reach the caller as errors. A vector
//! store failure is logged and turned into an empty response; a history
//! write failure is logged and the ranked response is still returned.
//!
//! The engine also owns the write path ([`SearchEngine::index_documents`],
//! [`SearchEngine::delete_documents`]), which does surface errors since
//! metadata validation failures are the caller's to fix.

use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

use cellar_search_core::category::CategoryTable;
use cellar_search_core::embedding::EmbeddingProvider;
use cellar_search_core::kv::KvStore;
use cellar_search_core::models::{
    ResultType, SearchContext, SearchHistoryEntry, SearchResponse, SearchStats, SuggestionItem,
    TrendingSearch,
};
use cellar_search_core::rank::{rank_matches, RankOptions};
use cellar_search_core::store::{QueryOptions, VectorRecord, VectorStore};
use cellar_search_core::suggest::{
    generate_suggestions, RelatedTerms, SuggestOptions, SuggestionSources,
};
use cellar_search_core::CallResult;

use crate::config::Config;
use crate::embedding::create_provider_with_transport;
use crate::http::ReqwestTransport;
use crate::sqlite_kv::SqliteKv;
use crate::tracker::SearchTracker;
use crate::vector_store::HttpVectorStore;

/// Per-call search options. Unset fields fall back to `[retrieval]`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SearchOptions {
    pub limit: Option<usize>,
    pub types: Option<Vec<ResultType>>,
    pub namespace: Option<String>,
    /// Passed through to the vector store untouched.
    pub filter: Option<Value>,
    pub highlight: bool,
    /// Record the query in history and trending.
    pub record: bool,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            limit: None,
            types: None,
            namespace: None,
            filter: None,
            highlight: false,
            record: true,
        }
    }
}

/// A document to embed and upsert.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexDocument {
    /// Derived from the content when absent.
    #[serde(default)]
    pub id: Option<String>,
    pub title: String,
    pub content: String,
    #[serde(rename = "type", default = "default_document_type")]
    pub result_type: ResultType,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

fn default_document_type() -> ResultType {
    ResultType::Article
}

impl IndexDocument {
    /// The explicit id, or the first 32 hex chars of
    /// `sha256(type + title + content)`.
    pub fn document_id(&self) -> String {
        if let Some(id) = self.id.as_deref().filter(|id| !id.trim().is_empty()) {
            return id.to_string();
        }
        let mut hasher = Sha256::new();
        hasher.update(self.result_type.as_str().as_bytes());
        hasher.update(self.title.as_bytes());
        hasher.update(self.content.as_bytes());
        let mut id = hex::encode(hasher.finalize());
        id.truncate(32);
        id
    }

    fn embedding_text(&self) -> String {
        format!("{}\n\n{}", self.title, self.content)
    }

    fn record_metadata(&self) -> Map<String, Value> {
        let mut metadata = self.metadata.clone();
        metadata.insert("title".into(), Value::String(self.title.clone()));
        metadata.insert("content".into(), Value::String(self.content.clone()));
        metadata.insert(
            "type".into(),
            Value::String(self.result_type.as_str().to_string()),
        );
        if let Some(url) = &self.url {
            metadata.insert("url".into(), Value::String(url.clone()));
        }
        metadata
    }
}

/// Outcome of [`SearchEngine::index_documents`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IndexReport {
    pub upserted: usize,
    /// Documents dropped because no embedding was available.
    pub skipped: usize,
    pub ids: Vec<String>,
}

pub struct SearchEngine {
    embedder: Arc<dyn EmbeddingProvider>,
    store: Arc<dyn VectorStore>,
    tracker: SearchTracker,
    categories: Arc<CategoryTable>,
    dictionary: RelatedTerms,
    rank_defaults: RankOptions,
    suggest_opts: SuggestOptions,
    namespace: String,
}

impl SearchEngine {
    pub fn new(
        config: &Config,
        embedder: Arc<dyn EmbeddingProvider>,
        store: Arc<dyn VectorStore>,
        kv: Arc<dyn KvStore>,
    ) -> Self {
        let categories = Arc::new(CategoryTable::default());
        Self {
            embedder,
            store,
            tracker: SearchTracker::new(kv, categories.clone(), config.history.clone()),
            categories,
            dictionary: config.suggestions.dictionary(),
            rank_defaults: config.retrieval.rank_options(),
            suggest_opts: config.suggestions.options(),
            namespace: config.vector_store.namespace.clone(),
        }
    }

    /// Wire up the real adapters: HTTP embedding and vector store clients
    /// sharing one `reqwest` client, and SQLite persistence.
    pub async fn from_config(config: &Config) -> Result<Self> {
        let transport = Arc::new(ReqwestTransport::new());
        let embedder = create_provider_with_transport(&config.embedding, transport.clone())?;
        let store = Arc::new(HttpVectorStore::from_config(&config.vector_store, transport));
        let kv = Arc::new(SqliteKv::open(config).await?);
        Ok(Self::new(config, embedder, store, kv))
    }

    pub fn tracker(&self) -> &SearchTracker {
        &self.tracker
    }

    fn namespace_or_default(&self, namespace: Option<&str>) -> String {
        namespace.unwrap_or(&self.namespace).to_string()
    }

    /// Run a hybrid search for `query`.
    pub async fn search(&self, query: &str, opts: &SearchOptions) -> SearchResponse {
        let query = query.trim();
        if query.is_empty() {
            return SearchResponse::empty(query);
        }
        let started = Instant::now();

        let mut rank_opts = self.rank_defaults.clone();
        if let Some(limit) = opts.limit.filter(|l| *l > 0) {
            rank_opts.limit = limit;
        }
        rank_opts.types = opts.types.clone().filter(|t| !t.is_empty());
        rank_opts.highlight = opts.highlight;

        let matches = match self.embedder.embed(query).await {
            Some(vector) => {
                let query_opts = QueryOptions {
                    top_k: rank_opts.limit.saturating_mul(2),
                    namespace: self.namespace_or_default(opts.namespace.as_deref()),
                    filter: opts.filter.clone(),
                    include_metadata: true,
                };
                match self.store.query(&vector, &query_opts).await {
                    Ok(matches) => matches,
                    Err(e) => {
                        warn!(query, error = %e, "vector query failed, returning no results");
                        return SearchResponse::empty(query);
                    }
                }
            }
            None => {
                debug!(query, "no query embedding, semantic stage yields no matches");
                Vec::new()
            }
        };
        let candidates = matches.len();
        let results = rank_matches(query, matches, &rank_opts);

        let suggestions = self
            .get_suggestions(SearchContext::for_query(query))
            .await
            .into_iter()
            .map(|s| s.term)
            .collect();

        if opts.record {
            if let Err(e) = self.tracker.record_search(query).await {
                warn!(query, error = %e, "failed to record search");
            }
        }

        let elapsed = started.elapsed().as_millis() as u64;
        debug!(query, candidates, results = results.len(), elapsed_ms = elapsed, "search complete");

        SearchResponse {
            stats: SearchStats {
                total_results: results.len(),
                search_time_ms: elapsed,
                query: query.to_string(),
                suggestions,
            },
            results,
        }
    }

    /// Suggestions for the query in `ctx`.
    ///
    /// A missing `previous_query` is filled from the latest stored context,
    /// unless that context holds the same query.
    pub async fn get_suggestions(&self, mut ctx: SearchContext) -> Vec<SuggestionItem> {
        if ctx.previous_query.is_none() {
            let current = ctx.current_query.trim().to_lowercase();
            ctx.previous_query = self
                .tracker
                .latest_context()
                .await
                .map(|c| c.current_query)
                .filter(|q| !q.trim().is_empty() && q.trim().to_lowercase() != current);
        }
        let history = self.tracker.history().await;
        let trending = self.tracker.trending().await;
        let sources = SuggestionSources {
            history: &history,
            trending: &trending,
            dictionary: &self.dictionary,
            categories: &self.categories,
        };
        generate_suggestions(&ctx, &sources, &self.suggest_opts)
    }

    pub async fn record_search(&self, term: &str) -> CallResult<()> {
        self.tracker.record_search(term).await
    }

    pub async fn record_context(&self, ctx: SearchContext) -> CallResult<()> {
        self.tracker.record_context(ctx).await
    }

    pub async fn history(&self) -> Vec<SearchHistoryEntry> {
        self.tracker.history().await
    }

    pub async fn trending(&self) -> Vec<TrendingSearch> {
        self.tracker.trending().await
    }

    pub async fn clear_history(&self) -> CallResult<()> {
        self.tracker.clear_history().await
    }

    /// Embed and upsert `docs`. The whole batch is validated before sending.
    pub async fn index_documents(
        &self,
        docs: &[IndexDocument],
        namespace: Option<&str>,
    ) -> CallResult<IndexReport> {
        let namespace = self.namespace_or_default(namespace);
        let mut records = Vec::with_capacity(docs.len());
        let mut skipped = 0;

        for doc in docs {
            let id = doc.document_id();
            match self.embedder.embed(&doc.embedding_text()).await {
                Some(values) => records.push(VectorRecord {
                    id,
                    values,
                    metadata: doc.record_metadata(),
                }),
                None => {
                    warn!(id = %id, title = %doc.title, "no embedding for document, skipping");
                    skipped += 1;
                }
            }
        }

        let upserted = self.store.upsert(&records, &namespace).await?;
        info!(upserted, skipped, namespace = %namespace, "indexed documents");
        Ok(IndexReport {
            upserted,
            skipped,
            ids: records.into_iter().map(|r| r.id).collect(),
        })
    }

    pub async fn delete_documents(&self, ids: &[String], namespace: Option<&str>) -> CallResult<()> {
        let namespace = self.namespace_or_default(namespace);
        self.store.delete(ids, &namespace).await?;
        info!(count = ids.len(), namespace = %namespace, "deleted documents");
        Ok(())
    }
}

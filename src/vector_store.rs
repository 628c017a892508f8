//! Pinecone-compatible vector store client.
//!
//! | Operation | Request |
//! |-----------|---------|
//! | query  | `POST {url}/query {vector, topK, namespace, includeMetadata, filter}` |
//! | upsert | `POST {url}/vectors/upsert {vectors: [{id, values, metadata}], namespace}` |
//! | delete | `POST {url}/vectors/delete {ids, namespace}` |
//!
//! Every request carries `Api-Key` and `X-Pinecone-API-Version` headers and
//! goes through [`crate::http::call`]. Upserts validate metadata first; a
//! violation is returned before any request is built. Non-2xx responses
//! become [`SearchError::Http`].

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, warn};

use cellar_search_core::store::{
    MetadataLimits, QueryOptions, VectorMatch, VectorRecord, VectorStore,
};
use cellar_search_core::{CallResult, SearchError};

use crate::config::VectorStoreConfig;
use crate::http::{call, CallOptions, HttpRequest, HttpResponse, HttpTransport};

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct QueryRequest<'a> {
    vector: &'a [f32],
    top_k: usize,
    namespace: &'a str,
    include_metadata: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    filter: Option<&'a Value>,
}

#[derive(Deserialize)]
struct QueryResponse {
    #[serde(default)]
    matches: Vec<MatchBody>,
}

#[derive(Deserialize)]
struct MatchBody {
    id: String,
    #[serde(default)]
    score: f64,
    #[serde(default)]
    metadata: Option<Map<String, Value>>,
}

#[derive(Serialize)]
struct UpsertRequest<'a> {
    vectors: &'a [VectorRecord],
    namespace: &'a str,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpsertResponse {
    upserted_count: Option<usize>,
}

#[derive(Serialize)]
struct DeleteRequest<'a> {
    ids: &'a [String],
    namespace: &'a str,
}

pub struct HttpVectorStore {
    transport: Arc<dyn HttpTransport>,
    base_url: String,
    api_key: String,
    api_version: String,
    limits: MetadataLimits,
    call_opts: CallOptions,
}

impl HttpVectorStore {
    pub fn new(
        config: &VectorStoreConfig,
        api_key: impl Into<String>,
        transport: Arc<dyn HttpTransport>,
    ) -> Self {
        Self {
            transport,
            base_url: config.url.trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            api_version: config.api_version.clone(),
            limits: config.metadata_limits(),
            call_opts: CallOptions::new(config.timeout(), config.max_retries, config.backoff()),
        }
    }

    /// Build from config, reading the key from `config.api_key_env`.
    pub fn from_config(config: &VectorStoreConfig, transport: Arc<dyn HttpTransport>) -> Self {
        let api_key = std::env::var(&config.api_key_env).unwrap_or_default();
        if api_key.is_empty() {
            warn!(env = %config.api_key_env, "vector store API key not set");
        }
        Self::new(config, api_key, transport)
    }

    async fn post(&self, path: &str, body: &impl Serialize) -> CallResult<HttpResponse> {
        let request = HttpRequest::post_json(format!("{}{}", self.base_url, path), body)?
            .header("Api-Key", self.api_key.as_str())
            .header("X-Pinecone-API-Version", self.api_version.as_str());
        let resp = call(self.transport.as_ref(), &request, &self.call_opts).await?;
        if !resp.is_success() {
            return Err(SearchError::Http {
                status: resp.status,
                body: resp.body,
            });
        }
        Ok(resp)
    }
}

#[async_trait]
impl VectorStore for HttpVectorStore {
    async fn query(&self, vector: &[f32], opts: &QueryOptions) -> CallResult<Vec<VectorMatch>> {
        let body = QueryRequest {
            vector,
            top_k: opts.top_k,
            namespace: &opts.namespace,
            include_metadata: opts.include_metadata,
            filter: opts.filter.as_ref(),
        };
        let parsed: QueryResponse = self.post("/query", &body).await?.json()?;
        debug!(matches = parsed.matches.len(), top_k = opts.top_k, "vector query");

        Ok(parsed
            .matches
            .into_iter()
            .map(|m| VectorMatch {
                id: m.id,
                score: m.score,
                metadata: m.metadata.unwrap_or_default(),
            })
            .collect())
    }

    async fn upsert(&self, records: &[VectorRecord], namespace: &str) -> CallResult<usize> {
        if let Err(e) = self.limits.validate_all(records) {
            warn!(error = %e, "rejecting upsert");
            return Err(e);
        }
        if records.is_empty() {
            return Ok(0);
        }

        let body = UpsertRequest {
            vectors: records,
            namespace,
        };
        let resp = self.post("/vectors/upsert", &body).await?;
        let count = resp
            .json::<UpsertResponse>()
            .ok()
            .and_then(|r| r.upserted_count)
            .unwrap_or(records.len());
        debug!(count, namespace, "upserted vectors");
        Ok(count)
    }

    async fn delete(&self, ids: &[String], namespace: &str) -> CallResult<()> {
        if ids.is_empty() {
            return Ok(());
        }
        let body = DeleteRequest { ids, namespace };
        self.post("/vectors/delete", &body).await?;
        debug!(count = ids.len(), namespace, "deleted vectors");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::http::testing::{ScriptedTransport, Step};
    use serde_json::json;

    fn store(transport: Arc<ScriptedTransport>) -> HttpVectorStore {
        let mut config = Config::minimal().vector_store;
        config.url = "http://index.test/".into();
        HttpVectorStore::new(&config, "pc-key", transport)
    }

    fn record(id: &str, metadata: Map<String, Value>) -> VectorRecord {
        VectorRecord {
            id: id.into(),
            values: vec![0.1, 0.2],
            metadata,
        }
    }

    #[tokio::test]
    async fn test_query_request_shape_and_parse() {
        let transport = Arc::new(ScriptedTransport::always(
            200,
            r#"{"matches":[{"id":"a","score":0.91,"metadata":{"title":"Pinot"}},{"id":"b","score":0.8}]}"#,
        ));
        let s = store(transport.clone());
        let opts = QueryOptions {
            top_k: 20,
            namespace: "wines".into(),
            filter: Some(json!({"type": {"$eq": "wine"}})),
            include_metadata: true,
        };
        let matches = s.query(&[0.5, 0.5], &opts).await.unwrap();
        assert_eq!(matches.len(), 2);
        assert_eq!(matches[0].metadata["title"], "Pinot");
        assert!(matches[1].metadata.is_empty());

        let req = transport.last_request().unwrap();
        assert_eq!(req.url, "http://index.test/query");
        assert_eq!(req.body["topK"], 20);
        assert_eq!(req.body["includeMetadata"], true);
        assert_eq!(req.body["namespace"], "wines");
        assert_eq!(req.body["filter"]["type"]["$eq"], "wine");
        assert!(req.headers.contains(&("Api-Key".into(), "pc-key".into())));
        assert!(req
            .headers
            .contains(&("X-Pinecone-API-Version".into(), "2024-07".into())));
    }

    #[tokio::test(start_paused = true)]
    async fn test_query_retries_then_succeeds() {
        let transport = Arc::new(ScriptedTransport::new(vec![
            Step::Respond(503, "unavailable".into()),
            Step::Respond(503, "unavailable".into()),
            Step::Respond(200, r#"{"matches":[]}"#.into()),
        ]));
        let s = store(transport.clone());
        let matches = s.query(&[1.0], &QueryOptions::default()).await.unwrap();
        assert!(matches.is_empty());
        assert_eq!(transport.calls(), 3);
    }

    #[tokio::test]
    async fn test_non_2xx_becomes_http_error() {
        let transport = Arc::new(ScriptedTransport::always(400, "bad vector"));
        let err = store(transport.clone())
            .query(&[1.0], &QueryOptions::default())
            .await
            .unwrap_err();
        match err {
            SearchError::Http { status, body } => {
                assert_eq!(status, 400);
                assert_eq!(body, "bad vector");
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(transport.calls(), 1);
    }

    #[tokio::test]
    async fn test_oversized_metadata_rejected_before_any_request() {
        let transport = Arc::new(ScriptedTransport::always(200, "{}"));
        let mut metadata = Map::new();
        metadata.insert("content".into(), json!("x".repeat(41_000)));

        let err = store(transport.clone())
            .upsert(&[record("big", metadata)], "")
            .await
            .unwrap_err();
        assert!(matches!(err, SearchError::MetadataTooLarge { .. }));
        assert_eq!(transport.calls(), 0);
    }

    #[tokio::test]
    async fn test_too_many_keys_rejected_before_any_request() {
        let transport = Arc::new(ScriptedTransport::always(200, "{}"));
        let metadata: Map<String, Value> = (0..101).map(|i| (format!("k{i}"), json!(i))).collect();
        let err = store(transport.clone())
            .upsert(&[record("wide", metadata)], "")
            .await
            .unwrap_err();
        assert!(matches!(err, SearchError::TooManyMetadataKeys { count: 101, .. }));
        assert_eq!(transport.calls(), 0);
    }

    #[tokio::test]
    async fn test_upsert_and_delete_requests() {
        let transport = Arc::new(ScriptedTransport::always(200, r#"{"upsertedCount":1}"#));
        let s = store(transport.clone());
        let n = s.upsert(&[record("a", Map::new())], "wines").await.unwrap();
        assert_eq!(n, 1);
        let req = transport.last_request().unwrap();
        assert_eq!(req.url, "http://index.test/vectors/upsert");
        assert_eq!(req.body["vectors"][0]["id"], "a");
        assert_eq!(req.body["namespace"], "wines");

        s.delete(&["a".to_string()], "wines").await.unwrap();
        let req = transport.last_request().unwrap();
        assert_eq!(req.url, "http://index.test/vectors/delete");
        assert_eq!(req.body["ids"], json!(["a"]));
    }

    #[tokio::test]
    async fn test_empty_batches_skip_network() {
        let transport = Arc::new(ScriptedTransport::always(200, "{}"));
        let s = store(transport.clone());
        assert_eq!(s.upsert(&[], "").await.unwrap(), 0);
        s.delete(&[], "").await.unwrap();
        assert_eq!(transport.calls(), 0);
    }
}

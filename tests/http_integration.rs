//! End-to-end tests against mock embedding and vector-store services
//! served by axum on an ephemeral port, using the real reqwest transport.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use axum::{extract::State, http::HeaderMap, http::StatusCode, routing::post, Json, Router};
use serde_json::{json, Value};

use cellar_search::config::Config;
use cellar_search::embedding::OpenAiEmbedder;
use cellar_search::http::{HttpTransport, ReqwestTransport};
use cellar_search::search::{IndexDocument, SearchEngine, SearchOptions};
use cellar_search::vector_store::HttpVectorStore;
use cellar_search_core::embedding::EmbeddingProvider;
use cellar_search_core::kv::MemoryKv;
use cellar_search_core::models::ResultType;
use cellar_search_core::store::{QueryOptions, VectorStore};
use cellar_search_core::SearchError;

#[derive(Default)]
struct Upstream {
    embed_calls: AtomicUsize,
    query_calls: AtomicUsize,
    upsert_calls: AtomicUsize,
    /// Number of leading `/query` calls answered with 503.
    query_failures: usize,
    last_upsert: std::sync::Mutex<Option<Value>>,
}

async fn embeddings(
    State(up): State<Arc<Upstream>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    up.embed_calls.fetch_add(1, Ordering::SeqCst);
    if headers.get("authorization").and_then(|v| v.to_str().ok()) != Some("Bearer sk-mock") {
        return (StatusCode::UNAUTHORIZED, Json(json!({"error": "bad key"})));
    }
    let input = body["input"].as_str().unwrap_or_default().to_lowercase();
    let wine = if input.contains("wine") { 1.0 } else { 0.0 };
    (
        StatusCode::OK,
        Json(json!({"data": [{"embedding": [wine, 0.0, 1.0]}]})),
    )
}

async fn query(
    State(up): State<Arc<Upstream>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    let n = up.query_calls.fetch_add(1, Ordering::SeqCst);
    if n < up.query_failures {
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({"error": "warming up"})),
        );
    }
    assert_eq!(headers.get("api-key").unwrap(), "pc-mock");
    assert_eq!(headers.get("x-pinecone-api-version").unwrap(), "2024-07");
    assert!(body["topK"].as_u64().unwrap() >= 2);
    (
        StatusCode::OK,
        Json(json!({"matches": [
            {"id": "chablis", "score": 0.95, "metadata": {
                "title": "Chablis", "content": "Crisp white wine from northern Burgundy.",
                "type": "wine", "url": "https://cellar.test/chablis"}},
            {"id": "lager", "score": 0.72, "metadata": {
                "title": "Lager", "content": "Cold-fermented beer.", "type": "article"}},
            {"id": "noise", "score": 0.40, "metadata": {"title": "Noise", "content": "x"}}
        ]})),
    )
}

async fn upsert(
    State(up): State<Arc<Upstream>>,
    Json(body): Json<Value>,
) -> Json<Value> {
    up.upsert_calls.fetch_add(1, Ordering::SeqCst);
    let count = body["vectors"].as_array().map_or(0, |v| v.len());
    *up.last_upsert.lock().unwrap() = Some(body);
    Json(json!({"upsertedCount": count}))
}

async fn delete(Json(_body): Json<Value>) -> Json<Value> {
    Json(json!({}))
}

async fn spawn_upstream(up: Arc<Upstream>) -> String {
    let app = Router::new()
        .route("/v1/embeddings", post(embeddings))
        .route("/query", post(query))
        .route("/vectors/upsert", post(upsert))
        .route("/vectors/delete", post(delete))
        .with_state(up);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

fn config(base: &str) -> Config {
    let mut config = Config::minimal();
    config.embedding.provider = "openai".into();
    config.embedding.model = Some("text-embedding-3-small".into());
    config.embedding.dims = Some(3);
    config.embedding.endpoint = format!("{base}/v1/embeddings");
    config.embedding.backoff_ms = 10;
    config.vector_store.url = base.to_string();
    config.vector_store.backoff_ms = 10;
    config
}

fn engine(config: &Config) -> SearchEngine {
    let transport: Arc<dyn HttpTransport> = Arc::new(ReqwestTransport::new());
    let embedder = OpenAiEmbedder::from_config(&config.embedding, transport.clone())
        .unwrap()
        .with_api_key(Some("sk-mock".into()));
    let store = HttpVectorStore::new(&config.vector_store, "pc-mock", transport);
    SearchEngine::new(
        config,
        Arc::new(embedder),
        Arc::new(store),
        Arc::new(MemoryKv::new()),
    )
}

#[tokio::test]
async fn test_search_end_to_end_after_transient_failures() {
    let up = Arc::new(Upstream {
        query_failures: 2,
        ..Upstream::default()
    });
    let base = spawn_upstream(up.clone()).await;
    let e = engine(&config(&base));

    let resp = e.search("white wine", &SearchOptions::default()).await;

    assert_eq!(up.query_calls.load(Ordering::SeqCst), 3);
    assert_eq!(up.embed_calls.load(Ordering::SeqCst), 1);
    let ids: Vec<&str> = resp.results.iter().map(|r| r.id.as_str()).collect();
    assert_eq!(ids, vec!["chablis", "lager"]);
    assert_eq!(resp.results[0].result_type, ResultType::Wine);
    assert!((resp.results[0].score - 0.965).abs() < 1e-9);
    assert!((resp.results[1].score - 0.504).abs() < 1e-9);
    assert_eq!(e.history().await[0].term, "white wine");
}

#[tokio::test]
async fn test_exhausted_vector_store_retries_degrade_to_empty() {
    let up = Arc::new(Upstream {
        query_failures: usize::MAX,
        ..Upstream::default()
    });
    let base = spawn_upstream(up.clone()).await;
    let e = engine(&config(&base));

    let resp = e.search("white wine", &SearchOptions::default()).await;
    assert!(resp.results.is_empty());
    assert_eq!(resp.stats.total_results, 0);
    assert_eq!(up.query_calls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_vector_store_surfaces_final_status() {
    let up = Arc::new(Upstream {
        query_failures: usize::MAX,
        ..Upstream::default()
    });
    let base = spawn_upstream(up.clone()).await;
    let cfg = config(&base);
    let store = HttpVectorStore::new(&cfg.vector_store, "pc-mock", Arc::new(ReqwestTransport::new()));

    let err = store
        .query(&[1.0, 0.0, 1.0], &QueryOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, SearchError::Http { status: 503, .. }));
}

#[tokio::test]
async fn test_wrong_embedding_key_soft_fails() {
    let up = Arc::new(Upstream::default());
    let base = spawn_upstream(up.clone()).await;
    let cfg = config(&base);
    let embedder = OpenAiEmbedder::from_config(&cfg.embedding, Arc::new(ReqwestTransport::new()))
        .unwrap()
        .with_api_key(Some("sk-wrong".into()));

    assert!(embedder.embed("white wine").await.is_none());
    // 401 is not retryable
    assert_eq!(up.embed_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_index_documents_upserts_over_http() {
    let up = Arc::new(Upstream::default());
    let base = spawn_upstream(up.clone()).await;
    let e = engine(&config(&base));

    let docs = vec![IndexDocument {
        id: Some("chablis".into()),
        title: "Chablis".into(),
        content: "Crisp white wine.".into(),
        result_type: ResultType::Wine,
        url: None,
        metadata: Default::default(),
    }];
    let report = e.index_documents(&docs, Some("wines")).await.unwrap();
    assert_eq!(report.upserted, 1);
    assert_eq!(report.ids, vec!["chablis"]);

    let body = up.last_upsert.lock().unwrap().clone().unwrap();
    assert_eq!(body["namespace"], "wines");
    assert_eq!(body["vectors"][0]["id"], "chablis");
    assert_eq!(body["vectors"][0]["values"], json!([1.0, 0.0, 1.0]));
    assert_eq!(body["vectors"][0]["metadata"]["type"], "wine");

    e.delete_documents(&report.ids, Some("wines")).await.unwrap();
}

#[tokio::test]
async fn test_oversized_upsert_never_reaches_upstream() {
    let up = Arc::new(Upstream::default());
    let base = spawn_upstream(up.clone()).await;
    let e = engine(&config(&base));

    let docs = vec![IndexDocument {
        id: None,
        title: "Encyclopedia".into(),
        content: "w".repeat(41_000),
        result_type: ResultType::Article,
        url: None,
        metadata: Default::default(),
    }];
    let err = e.index_documents(&docs, None).await.unwrap_err();
    assert!(matches!(err, SearchError::MetadataTooLarge { .. }));
    assert_eq!(up.upsert_calls.load(Ordering::SeqCst), 0);
}

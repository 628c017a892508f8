//! JSON HTTP API over the [`SearchEngine`].
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `POST` | `/search` | Hybrid search; body `{query, limit?, types?, namespace?, filter?, highlight?, record?}` |
//! | `POST` | `/suggest` | Suggestions for a search context, which is then recorded |
//! | `POST` | `/history` | Record a committed search `{term}` |
//! | `GET`  | `/history` | This store's search history |
//! | `DELETE` | `/history` | Clear history and context (trending is kept) |
//! | `GET`  | `/trending` | Global trending terms |
//! | `POST` | `/documents` | Embed and upsert documents |
//! | `POST` | `/documents/delete` | Delete documents by id |
//! | `GET`  | `/health` | Health check (returns version) |
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "bad_request", "message": "term must not be empty" } }
//! ```
//!
//! Error codes: `bad_request` (400), `validation` (400), `not_found` (404),
//! `upstream` (502), `internal` (500).
//!
//! Search itself never fails: upstream problems degrade to an empty result
//! set, exactly as they do for library callers.

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

use cellar_search_core::models::{
    SearchContext, SearchHistoryEntry, SearchResponse, SuggestionItem, TrendingSearch,
};
use cellar_search_core::SearchError;

use crate::config::Config;
use crate::search::{IndexDocument, IndexReport, SearchEngine, SearchOptions};

#[derive(Clone)]
struct AppState {
    engine: Arc<SearchEngine>,
}

/// Starts the HTTP server on `[server].bind` and runs until the process exits.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let engine = Arc::new(SearchEngine::from_config(config).await?);
    let listener = tokio::net::TcpListener::bind(&config.server.bind).await?;
    info!(addr = %listener.local_addr()?, "search server listening");
    axum::serve(listener, router(engine)).await?;
    Ok(())
}

/// Build the router. Exposed so tests can serve it on an ephemeral port.
pub fn router(engine: Arc<SearchEngine>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/search", post(handle_search))
        .route("/suggest", post(handle_suggest))
        .route(
            "/history",
            post(handle_record).get(handle_history).delete(handle_clear_history),
        )
        .route("/trending", get(handle_trending))
        .route("/documents", post(handle_index))
        .route("/documents/delete", post(handle_delete))
        .route("/health", get(handle_health))
        .layer(cors)
        .with_state(AppState { engine })
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

struct AppError {
    status: StatusCode,
    code: &'static str,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code.to_string(),
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request",
        message: message.into(),
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        bad_request(rejection.body_text())
    }
}

impl From<SearchError> for AppError {
    fn from(err: SearchError) -> Self {
        let (status, code) = if err.is_validation() {
            (StatusCode::BAD_REQUEST, "validation")
        } else {
            match err {
                SearchError::Persistence(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal"),
                SearchError::Http { status: 404, .. } => (StatusCode::NOT_FOUND, "not_found"),
                _ => (StatusCode::BAD_GATEWAY, "upstream"),
            }
        };
        AppError {
            status,
            code,
            message: err.to_string(),
        }
    }
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ============ POST /search ============

#[derive(Deserialize)]
struct SearchRequest {
    query: String,
    #[serde(flatten)]
    options: SearchOptions,
}

async fn handle_search(
    State(state): State<AppState>,
    body: Result<Json<SearchRequest>, JsonRejection>,
) -> Result<Json<SearchResponse>, AppError> {
    let Json(req) = body?;
    Ok(Json(state.engine.search(&req.query, &req.options).await))
}

// ============ POST /suggest ============

#[derive(Serialize)]
struct SuggestResponse {
    suggestions: Vec<SuggestionItem>,
}

async fn handle_suggest(
    State(state): State<AppState>,
    body: Result<Json<SearchContext>, JsonRejection>,
) -> Result<Json<SuggestResponse>, AppError> {
    let Json(ctx) = body?;
    let suggestions = state.engine.get_suggestions(ctx.clone()).await;
    if !ctx.current_query.trim().is_empty() {
        state.engine.record_context(ctx).await?;
    }
    Ok(Json(SuggestResponse { suggestions }))
}

// ============ /history ============

#[derive(Deserialize)]
struct RecordRequest {
    term: String,
}

#[derive(Serialize)]
struct HistoryResponse {
    history: Vec<SearchHistoryEntry>,
}

async fn handle_record(
    State(state): State<AppState>,
    body: Result<Json<RecordRequest>, JsonRejection>,
) -> Result<StatusCode, AppError> {
    let Json(req) = body?;
    if req.term.trim().is_empty() {
        return Err(bad_request("term must not be empty"));
    }
    state.engine.record_search(&req.term).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn handle_history(State(state): State<AppState>) -> Json<HistoryResponse> {
    Json(HistoryResponse {
        history: state.engine.history().await,
    })
}

async fn handle_clear_history(State(state): State<AppState>) -> Result<StatusCode, AppError> {
    state.engine.clear_history().await?;
    Ok(StatusCode::NO_CONTENT)
}

// ============ GET /trending ============

#[derive(Serialize)]
struct TrendingItem {
    #[serde(flatten)]
    entry: TrendingSearch,
    icon: &'static str,
}

#[derive(Serialize)]
struct TrendingResponse {
    trending: Vec<TrendingItem>,
}

async fn handle_trending(State(state): State<AppState>) -> Json<TrendingResponse> {
    let trending = state
        .engine
        .trending()
        .await
        .into_iter()
        .map(|entry| TrendingItem {
            icon: entry.trend.icon(),
            entry,
        })
        .collect();
    Json(TrendingResponse { trending })
}

// ============ /documents ============

#[derive(Deserialize)]
struct IndexRequest {
    documents: Vec<IndexDocument>,
    #[serde(default)]
    namespace: Option<String>,
}

async fn handle_index(
    State(state): State<AppState>,
    body: Result<Json<IndexRequest>, JsonRejection>,
) -> Result<Json<IndexReport>, AppError> {
    let Json(req) = body?;
    if req.documents.is_empty() {
        return Err(bad_request("documents must not be empty"));
    }
    let report = state
        .engine
        .index_documents(&req.documents, req.namespace.as_deref())
        .await?;
    Ok(Json(report))
}

#[derive(Deserialize)]
struct DeleteRequest {
    ids: Vec<String>,
    #[serde(default)]
    namespace: Option<String>,
}

async fn handle_delete(
    State(state): State<AppState>,
    body: Result<Json<DeleteRequest>, JsonRejection>,
) -> Result<StatusCode, AppError> {
    let Json(req) = body?;
    if req.ids.is_empty() {
        return Err(bad_request("ids must not be empty"));
    }
    state
        .engine
        .delete_documents(&req.ids, req.namespace.as_deref())
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classification() {
        let v: AppError = SearchError::MetadataTooLarge {
            id: "a".into(),
            size: 41_000,
            limit: 40_960,
        }
        .into();
        assert_eq!(v.status, StatusCode::BAD_REQUEST);
        assert_eq!(v.code, "validation");

        let u: AppError = SearchError::Timeout(std::time::Duration::from_secs(15)).into();
        assert_eq!(u.status, StatusCode::BAD_GATEWAY);
        assert_eq!(u.code, "upstream");

        let p: AppError = SearchError::Persistence("locked".into()).into();
        assert_eq!(p.code, "internal");

        let n: AppError = SearchError::Http {
            status: 404,
            body: "no such index".into(),
        }
        .into();
        assert_eq!(n.code, "not_found");
    }

    #[test]
    fn test_search_request_flattens_options() {
        let req: SearchRequest =
            serde_json::from_str(r#"{"query":"pinot","limit":5,"types":["wine"],"record":false}"#)
                .unwrap();
        assert_eq!(req.query, "pinot");
        assert_eq!(req.options.limit, Some(5));
        assert!(!req.options.record);
    }
}

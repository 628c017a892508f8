//! # Cellar Search
//!
//! Hybrid retrieval and suggestion engine for wine, sake and tasting
//! content.
//!
//! A free-text query is embedded, matched against an external vector index,
//! and re-ranked by fusing the vector score with a lexical match score.
//! Autocomplete suggestions are fused from the user's search history, global
//! trending terms and a static related-term dictionary.
//!
//! ## Architecture
//!
//! ```text
//!                 ┌──────────────┐
//!   query ──────▶ │ SearchEngine │ ──────▶ results + stats
//!                 └──────┬───────┘
//!          ┌─────────────┼──────────────┬───────────────┐
//!          ▼             ▼              ▼               ▼
//!   ┌────────────┐ ┌────────────┐ ┌──────────┐  ┌──────────────┐
//!   │ Embedding  │ │ VectorStore│ │ rank +   │  │ SearchTracker│
//!   │ (HTTP)     │ │ (HTTP)     │ │ suggest  │  │ (KvStore)    │
//!   └─────┬──────┘ └─────┬──────┘ └──────────┘  └──────┬───────┘
//!         └──── http::call ────┘    (core crate)        ▼
//!          timeout + backoff                     SQLite `kv` table
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! cellar init                          # create the key-value store
//! cellar index wines.json              # embed and upsert documents
//! cellar search "pinot noir" --highlight
//! cellar suggest "wi"
//! cellar serve                         # start the HTTP API
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`http`] | Resilient outbound calls (timeout + backoff) |
//! | [`embedding`] | OpenAI-compatible embedding provider |
//! | [`vector_store`] | Pinecone-compatible vector store client |
//! | [`tracker`] | Persisted history, trending and context |
//! | [`search`] | The search orchestrator |
//! | [`server`] | JSON HTTP API |
//! | [`commands`] | CLI command runners |
//! | [`sqlite_kv`] | SQLite key-value backend |
//! | [`db`] | SQLite pool and schema |
//!
//! Pure ranking, suggestion and bookkeeping logic lives in the
//! `cellar-search-core` crate.

pub mod commands;
pub mod config;
pub mod db;
pub mod embedding;
pub mod http;
pub mod search;
pub mod server;
pub mod sqlite_kv;
pub mod tracker;
pub mod vector_store;

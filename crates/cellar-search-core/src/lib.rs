//! # Cellar Search Core
//!
//! Runtime-free logic for Cellar Search: data models, the shared category
//! bucket table, hybrid ranking, history/trending bookkeeping, the
//! suggestion pipeline, retry backoff, and the port traits the application
//! crate plugs real I/O into.
//!
//! This crate contains no tokio, sqlx, reqwest, or filesystem I/O. Every
//! function here is deterministic given its inputs (timestamps are passed
//! in by the caller), which keeps the ranking and suggestion rules testable
//! without timers or network fakes.

pub mod backoff;
pub mod category;
pub mod embedding;
pub mod error;
pub mod history;
pub mod kv;
pub mod models;
pub mod rank;
pub mod store;
pub mod suggest;

pub use error::{CallResult, SearchError};

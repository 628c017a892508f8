//! SQLite-backed [`KvStore`].
//!
//! One row per key in the `kv` table created by [`crate::db::ensure_schema`].
//! Each write replaces the row and stamps `updated_at` (epoch seconds).

use anyhow::Result;
use async_trait::async_trait;
use sqlx::SqlitePool;

use cellar_search_core::kv::KvStore;
use cellar_search_core::{CallResult, SearchError};

use crate::config::Config;
use crate::db;

pub struct SqliteKv {
    pool: SqlitePool,
}

impl SqliteKv {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Connect to the configured database and make sure the table exists.
    pub async fn open(config: &Config) -> Result<Self> {
        let pool = db::connect(config).await?;
        db::ensure_schema(&pool).await?;
        Ok(Self::new(pool))
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

fn persistence(err: sqlx::Error) -> SearchError {
    SearchError::Persistence(err.to_string())
}

#[async_trait]
impl KvStore for SqliteKv {
    async fn get(&self, key: &str) -> CallResult<Option<String>> {
        sqlx::query_scalar::<_, String>("SELECT value FROM kv WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await
            .map_err(persistence)
    }

    async fn set(&self, key: &str, value: &str) -> CallResult<()> {
        sqlx::query(
            r#"
            INSERT INTO kv (key, value, updated_at) VALUES (?, ?, ?)
            ON CONFLICT(key) DO UPDATE SET
                value = excluded.value,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(key)
        .bind(value)
        .bind(chrono::Utc::now().timestamp())
        .execute(&self.pool)
        .await
        .map_err(persistence)?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> CallResult<()> {
        sqlx::query("DELETE FROM kv WHERE key = ?")
            .bind(key)
            .execute(&self.pool)
            .await
            .map_err(persistence)?;
        Ok(())
    }
}

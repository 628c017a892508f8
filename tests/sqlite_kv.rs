//! SQLite key-value backend and tracker persistence across reopen.

use std::sync::Arc;

use cellar_search::config::Config;
use cellar_search::db;
use cellar_search::sqlite_kv::SqliteKv;
use cellar_search::tracker::{SearchTracker, HISTORY_KEY};
use cellar_search_core::category::CategoryTable;
use cellar_search_core::kv::KvStore;

fn config_in(dir: &tempfile::TempDir) -> Config {
    let mut config = Config::minimal();
    config.db.path = dir.path().join("nested").join("cellar.sqlite");
    config
}

#[tokio::test]
async fn test_get_set_delete() {
    let dir = tempfile::tempdir().unwrap();
    let kv = SqliteKv::open(&config_in(&dir)).await.unwrap();

    assert_eq!(kv.get("missing").await.unwrap(), None);
    kv.set("k", "v1").await.unwrap();
    kv.set("k", "v2").await.unwrap();
    assert_eq!(kv.get("k").await.unwrap().as_deref(), Some("v2"));

    let rows: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM kv")
        .fetch_one(kv.pool())
        .await
        .unwrap();
    assert_eq!(rows, 1);

    kv.delete("k").await.unwrap();
    assert_eq!(kv.get("k").await.unwrap(), None);
    kv.delete("k").await.unwrap();
}

#[tokio::test]
async fn test_init_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let config = config_in(&dir);
    db::init(&config).await.unwrap();
    db::init(&config).await.unwrap();
    assert!(config.db.path.exists());
}

#[tokio::test]
async fn test_history_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let config = config_in(&dir);

    {
        let kv = Arc::new(SqliteKv::open(&config).await.unwrap());
        let tracker = SearchTracker::new(
            kv.clone(),
            Arc::new(CategoryTable::default()),
            config.history.clone(),
        );
        tracker.record_search("junmai daiginjo").await.unwrap();
        tracker.record_search("junmai daiginjo").await.unwrap();
        kv.pool().close().await;
    }

    let kv = Arc::new(SqliteKv::open(&config).await.unwrap());
    let raw = kv.get(HISTORY_KEY).await.unwrap().unwrap();
    assert!(raw.contains("\"version\":1"));

    let tracker = SearchTracker::new(kv, Arc::new(CategoryTable::default()), config.history);
    let history = tracker.history().await;
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].frequency, 2);
    assert_eq!(tracker.trending().await[0].search_count, 2);
}

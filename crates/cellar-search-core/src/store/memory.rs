//! In-memory [`VectorStore`] implementation for tests and offline runs.
//!
//! Uses a `HashMap` of namespaces behind `std::sync::RwLock`. Queries are
//! brute-force cosine similarity. Filters support exact values and the
//! `$eq`, `$ne` and `$in` operators on top-level metadata keys.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::embedding::cosine_similarity;
use crate::error::{CallResult, SearchError};

use super::{MetadataLimits, QueryOptions, VectorMatch, VectorRecord, VectorStore};

/// In-memory vector store, partitioned by namespace.
pub struct InMemoryVectorStore {
    namespaces: RwLock<HashMap<String, Vec<VectorRecord>>>,
    limits: MetadataLimits,
}

impl InMemoryVectorStore {
    pub fn new() -> Self {
        Self::with_limits(MetadataLimits::default())
    }

    pub fn with_limits(limits: MetadataLimits) -> Self {
        Self {
            namespaces: RwLock::new(HashMap::new()),
            limits,
        }
    }

    /// Number of vectors stored in `namespace`.
    pub fn len(&self, namespace: &str) -> usize {
        self.namespaces
            .read()
            .map(|ns| ns.get(namespace).map_or(0, Vec::len))
            .unwrap_or(0)
    }

    pub fn is_empty(&self, namespace: &str) -> bool {
        self.len(namespace) == 0
    }
}

impl Default for InMemoryVectorStore {
    fn default() -> Self {
        Self::new()
    }
}

fn lock_poisoned() -> SearchError {
    SearchError::Persistence("vector store lock poisoned".to_string())
}

/// Evaluate a filter object against a metadata map.
fn matches_filter(metadata: &Map<String, Value>, filter: &Value) -> bool {
    let Some(conditions) = filter.as_object() else {
        return true;
    };
    conditions.iter().all(|(key, cond)| {
        let actual = metadata.get(key);
        match cond.as_object() {
            Some(ops) => ops.iter().all(|(op, expected)| match op.as_str() {
                "$eq" => actual == Some(expected),
                "$ne" => actual != Some(expected),
                "$in" => expected
                    .as_array()
                    .is_some_and(|options| actual.is_some_and(|a| options.contains(a))),
                _ => false,
            }),
            None => actual == Some(cond),
        }
    })
}

#[async_trait]
impl VectorStore for InMemoryVectorStore {
    async fn query(&self, vector: &[f32], opts: &QueryOptions) -> CallResult<Vec<VectorMatch>> {
        let namespaces = self.namespaces.read().map_err(|_| lock_poisoned())?;
        let Some(records) = namespaces.get(&opts.namespace) else {
            return Ok(Vec::new());
        };

        let mut matches: Vec<VectorMatch> = records
            .iter()
            .filter(|r| {
                opts.filter
                    .as_ref()
                    .map_or(true, |f| matches_filter(&r.metadata, f))
            })
            .map(|r| VectorMatch {
                id: r.id.clone(),
                score: cosine_similarity(vector, &r.values) as f64,
                metadata: if opts.include_metadata {
                    r.metadata.clone()
                } else {
                    Map::new()
                },
            })
            .collect();

        matches.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        matches.truncate(opts.top_k);
        Ok(matches)
    }

    async fn upsert(&self, records: &[VectorRecord], namespace: &str) -> CallResult<usize> {
        self.limits.validate_all(records)?;

        let mut namespaces = self.namespaces.write().map_err(|_| lock_poisoned())?;
        let stored = namespaces.entry(namespace.to_string()).or_default();
        for record in records {
            stored.retain(|r| r.id != record.id);
            stored.push(record.clone());
        }
        Ok(records.len())
    }

    async fn delete(&self, ids: &[String], namespace: &str) -> CallResult<()> {
        let mut namespaces = self.namespaces.write().map_err(|_| lock_poisoned())?;
        if let Some(stored) = namespaces.get_mut(namespace) {
            stored.retain(|r| !ids.contains(&r.id));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(id: &str, values: Vec<f32>, kind: &str) -> VectorRecord {
        let mut metadata = Map::new();
        metadata.insert("type".into(), json!(kind));
        VectorRecord {
            id: id.to_string(),
            values,
            metadata,
        }
    }

    #[tokio::test]
    async fn test_query_orders_by_similarity() {
        let store = InMemoryVectorStore::new();
        store
            .upsert(
                &[
                    record("a", vec![1.0, 0.0], "wine"),
                    record("b", vec![0.7, 0.7], "course"),
                    record("c", vec![0.0, 1.0], "faq"),
                ],
                "",
            )
            .await
            .unwrap();

        let matches = store
            .query(&[1.0, 0.0], &QueryOptions::default())
            .await
            .unwrap();
        let ids: Vec<&str> = matches.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
        assert!((matches[0].score - 1.0).abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_query_respects_namespace_and_top_k() {
        let store = InMemoryVectorStore::new();
        store
            .upsert(&[record("a", vec![1.0], "wine")], "cellar")
            .await
            .unwrap();
        store
            .upsert(
                &[record("b", vec![1.0], "wine"), record("c", vec![1.0], "wine")],
                "games",
            )
            .await
            .unwrap();

        let opts = QueryOptions {
            top_k: 1,
            namespace: "games".into(),
            ..Default::default()
        };
        let matches = store.query(&[1.0], &opts).await.unwrap();
        assert_eq!(matches.len(), 1);
        assert_ne!(matches[0].id, "a");
    }

    #[tokio::test]
    async fn test_query_filter_operators() {
        let store = InMemoryVectorStore::new();
        store
            .upsert(
                &[
                    record("a", vec![1.0], "wine"),
                    record("b", vec![1.0], "course"),
                    record("c", vec![1.0], "game"),
                ],
                "",
            )
            .await
            .unwrap();

        let query = |filter: Value| {
            let opts = QueryOptions {
                filter: Some(filter),
                ..Default::default()
            };
            let store = &store;
            async move {
                let mut ids: Vec<String> = store
                    .query(&[1.0], &opts)
                    .await
                    .unwrap()
                    .into_iter()
                    .map(|m| m.id)
                    .collect();
                ids.sort();
                ids
            }
        };

        assert_eq!(query(json!({"type": "wine"})).await, vec!["a"]);
        assert_eq!(query(json!({"type": {"$eq": "course"}})).await, vec!["b"]);
        assert_eq!(query(json!({"type": {"$ne": "course"}})).await, vec!["a", "c"]);
        assert_eq!(
            query(json!({"type": {"$in": ["game", "wine"]}})).await,
            vec!["a", "c"]
        );
    }

    #[tokio::test]
    async fn test_upsert_replaces_and_delete_removes() {
        let store = InMemoryVectorStore::new();
        store
            .upsert(&[record("a", vec![1.0, 0.0], "wine")], "")
            .await
            .unwrap();
        store
            .upsert(&[record("a", vec![0.0, 1.0], "faq")], "")
            .await
            .unwrap();
        assert_eq!(store.len(""), 1);

        store.delete(&["a".to_string()], "").await.unwrap();
        assert!(store.is_empty(""));
    }

    #[tokio::test]
    async fn test_upsert_validation_rejects_batch() {
        let store = InMemoryVectorStore::new();
        let mut big = record("big", vec![1.0], "article");
        big.metadata
            .insert("content".into(), json!("z".repeat(41_000)));
        let err = store
            .upsert(&[record("ok", vec![1.0], "wine"), big], "")
            .await
            .unwrap_err();
        assert!(err.is_validation());
        assert!(store.is_empty(""));
    }

    #[tokio::test]
    async fn test_query_without_metadata() {
        let store = InMemoryVectorStore::new();
        store
            .upsert(&[record("a", vec![1.0], "wine")], "")
            .await
            .unwrap();
        let opts = QueryOptions {
            include_metadata: false,
            ..Default::default()
        };
        let matches = store.query(&[1.0], &opts).await.unwrap();
        assert!(matches[0].metadata.is_empty());
    }
}

use std::collections::HashMap;
use std::sync::RwLock;

use crate::vector_store::{BoxFuture, ScoredVectorPoint, VectorPoint, VectorStore, VectorStoreError};

struct StoredPoint {
    vector: Vec<f32>,
    payload: HashMap<String, serde_json::Value>,
}

#[derive(Default)]
struct Collection {
    dimension: Option<u64>,
    namespaces: HashMap<String, HashMap<String, StoredPoint>>,
}

/// Process-local vector store with brute-force cosine search.
pub struct InMemoryVectorStore {
    inner: RwLock<Collection>,
}

impl InMemoryVectorStore {
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Collection::default()),
        }
    }
}

impl Default for InMemoryVectorStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for InMemoryVectorStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryVectorStore").finish_non_exhaustive()
    }
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

impl VectorStore for InMemoryVectorStore {
    fn ensure_collection(&self, vector_size: u64) -> BoxFuture<'_, Result<(), VectorStoreError>> {
        Box::pin(async move {
            let mut col = self
                .inner
                .write()
                .map_err(|e| VectorStoreError::Collection(e.to_string()))?;
            match col.dimension {
                Some(expected) if expected != vector_size => {
                    Err(VectorStoreError::DimensionMismatch {
                        expected,
                        actual: vector_size,
                    })
                }
                Some(_) => Ok(()),
                None => {
                    col.dimension = Some(vector_size);
                    Ok(())
                }
            }
        })
    }

    fn upsert(
        &self,
        namespace: &str,
        points: Vec<VectorPoint>,
    ) -> BoxFuture<'_, Result<(), VectorStoreError>> {
        let namespace = namespace.to_owned();
        Box::pin(async move {
            let mut col = self
                .inner
                .write()
                .map_err(|e| VectorStoreError::Upsert(e.to_string()))?;
            let Some(expected) = col.dimension else {
                return Err(VectorStoreError::Upsert("collection not initialized".into()));
            };
            if let Some(bad) = points.iter().find(|p| p.vector.len() as u64 != expected) {
                return Err(VectorStoreError::DimensionMismatch {
                    expected,
                    actual: bad.vector.len() as u64,
                });
            }
            let ns = col.namespaces.entry(namespace).or_default();
            for p in points {
                ns.insert(
                    p.id,
                    StoredPoint {
                        vector: p.vector,
                        payload: p.payload,
                    },
                );
            }
            Ok(())
        })
    }

    fn search(
        &self,
        namespace: &str,
        vector: Vec<f32>,
        limit: u64,
    ) -> BoxFuture<'_, Result<Vec<ScoredVectorPoint>, VectorStoreError>> {
        let namespace = namespace.to_owned();
        Box::pin(async move {
            let col = self
                .inner
                .read()
                .map_err(|e| VectorStoreError::Search(e.to_string()))?;
            let Some(points) = col.namespaces.get(&namespace) else {
                return Ok(Vec::new());
            };

            let mut scored: Vec<ScoredVectorPoint> = points
                .iter()
                .map(|(id, sp)| ScoredVectorPoint {
                    id: id.clone(),
                    score: cosine_similarity(&vector, &sp.vector),
                    payload: sp.payload.clone(),
                })
                .collect();

            scored.sort_by(|a, b| b.score.total_cmp(&a.score).then_with(|| a.id.cmp(&b.id)));
            scored.truncate(usize::try_from(limit).unwrap_or(usize::MAX));
            Ok(scored)
        })
    }

    fn delete_namespace(&self, namespace: &str) -> BoxFuture<'_, Result<(), VectorStoreError>> {
        let namespace = namespace.to_owned();
        Box::pin(async move {
            let mut col = self
                .inner
                .write()
                .map_err(|e| VectorStoreError::Delete(e.to_string()))?;
            col.namespaces.remove(&namespace);
            Ok(())
        })
    }

    fn count(&self, namespace: &str) -> BoxFuture<'_, Result<u64, VectorStoreError>> {
        let namespace = namespace.to_owned();
        Box::pin(async move {
            let col = self
                .inner
                .read()
                .map_err(|e| VectorStoreError::Count(e.to_string()))?;
            Ok(col
                .namespaces
                .get(&namespace)
                .map_or(0, |points| points.len() as u64))
        })
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    fn point(id: &str, vector: Vec<f32>) -> VectorPoint {
        VectorPoint {
            id: id.into(),
            vector,
            payload: HashMap::from([("path".into(), serde_json::json!(format!("{id}.rs")))]),
        }
    }

    #[tokio::test]
    async fn ensure_collection_is_idempotent_for_same_dimension() {
        let store = InMemoryVectorStore::new();
        store.ensure_collection(3).await.unwrap();
        store.ensure_collection(3).await.unwrap();
        let err = store.ensure_collection(4).await.unwrap_err();
        assert!(matches!(
            err,
            VectorStoreError::DimensionMismatch {
                expected: 3,
                actual: 4
            }
        ));
    }

    #[tokio::test]
    async fn upsert_requires_collection() {
        let store = InMemoryVectorStore::new();
        let err = store
            .upsert("a/b@main", vec![point("x", vec![1.0])])
            .await
            .unwrap_err();
        assert!(matches!(err, VectorStoreError::Upsert(_)));
    }

    #[tokio::test]
    async fn upsert_rejects_wrong_dimension() {
        let store = InMemoryVectorStore::new();
        store.ensure_collection(3).await.unwrap();
        let err = store
            .upsert("a/b@main", vec![point("x", vec![1.0, 0.0])])
            .await
            .unwrap_err();
        assert!(matches!(err, VectorStoreError::DimensionMismatch { .. }));
        assert_eq!(store.count("a/b@main").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn search_is_scoped_to_namespace() {
        let store = InMemoryVectorStore::new();
        store.ensure_collection(3).await.unwrap();
        store
            .upsert("octo/demo@main", vec![point("a", vec![1.0, 0.0, 0.0])])
            .await
            .unwrap();
        store
            .upsert("octo/demo@dev", vec![point("b", vec![1.0, 0.0, 0.0])])
            .await
            .unwrap();

        let hits = store
            .search("octo/demo@main", vec![1.0, 0.0, 0.0], 10)
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, "a");
        assert!((hits[0].score - 1.0).abs() < f32::EPSILON);
    }

    #[tokio::test]
    async fn search_orders_by_score_and_truncates() {
        let store = InMemoryVectorStore::new();
        store.ensure_collection(3).await.unwrap();
        store
            .upsert(
                "ns",
                vec![
                    point("far", vec![0.0, 1.0, 0.0]),
                    point("near", vec![1.0, 0.1, 0.0]),
                    point("exact", vec![1.0, 0.0, 0.0]),
                ],
            )
            .await
            .unwrap();

        let hits = store.search("ns", vec![1.0, 0.0, 0.0], 2).await.unwrap();
        let ids: Vec<_> = hits.iter().map(|h| h.id.as_str()).collect();
        assert_eq!(ids, ["exact", "near"]);
    }

    #[tokio::test]
    async fn unknown_namespace_is_empty() {
        let store = InMemoryVectorStore::new();
        assert!(store.search("nope", vec![1.0], 5).await.unwrap().is_empty());
        assert_eq!(store.count("nope").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn delete_namespace_leaves_others() {
        let store = InMemoryVectorStore::new();
        store.ensure_collection(2).await.unwrap();
        store.upsert("one", vec![point("a", vec![1.0, 0.0])]).await.unwrap();
        store.upsert("two", vec![point("b", vec![0.0, 1.0])]).await.unwrap();

        store.delete_namespace("one").await.unwrap();
        assert_eq!(store.count("one").await.unwrap(), 0);
        assert_eq!(store.count("two").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn upsert_same_id_replaces() {
        let store = InMemoryVectorStore::new();
        store.ensure_collection(2).await.unwrap();
        store.upsert("ns", vec![point("a", vec![1.0, 0.0])]).await.unwrap();
        store.upsert("ns", vec![point("a", vec![0.0, 1.0])]).await.unwrap();
        assert_eq!(store.count("ns").await.unwrap(), 1);
    }

    #[test]
    fn cosine_similarity_handles_zero_vector() {
        assert!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]).abs() < f32::EPSILON);
        assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).abs() < f32::EPSILON);
    }

    fn vector3() -> impl Strategy<Value = Vec<f32>> {
        prop::collection::vec(-10.0f32..10.0, 3)
    }

    proptest! {
        #[test]
        fn cosine_similarity_is_bounded_and_symmetric(a in vector3(), b in vector3()) {
            let ab = cosine_similarity(&a, &b);
            prop_assert!((-1.0 - 1e-5..=1.0 + 1e-5).contains(&ab));
            prop_assert!((ab - cosine_similarity(&b, &a)).abs() < 1e-6);
        }

        #[test]
        fn search_is_best_first_and_limited(
            vectors in prop::collection::vec(vector3(), 1..20),
            query in vector3(),
            limit in 1u64..10,
        ) {
            let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
            let hits = rt.block_on(async {
                let store = InMemoryVectorStore::new();
                store.ensure_collection(3).await.unwrap();
                let points = vectors
                    .iter()
                    .enumerate()
                    .map(|(i, v)| point(&format!("p{i:02}"), v.clone()))
                    .collect();
                store.upsert("ns", points).await.unwrap();
                store.search("ns", query.clone(), limit).await.unwrap()
            });

            prop_assert_eq!(hits.len(), vectors.len().min(usize::try_from(limit).unwrap()));
            for pair in hits.windows(2) {
                let order = pair[0].score.total_cmp(&pair[1].score);
                prop_assert!(order.is_gt() || (order.is_eq() && pair[0].id < pair[1].id));
            }
        }
    }
}

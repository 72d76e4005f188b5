//! Chunk ⇄ vector-point mapping over a [`VectorStore`].

use std::collections::HashMap;
use std::sync::Arc;

use repolens_memory::{ScoredVectorPoint, VectorPoint, VectorStore};
use serde_json::{Value, json};

use crate::chunker::Chunk;
use crate::error::Result;
use crate::namespace::Namespace;

/// Fixed namespace for UUIDv5 point ids.
const POINT_ID_NAMESPACE: uuid::Uuid = uuid::Uuid::from_u128(0x6f1c_3b8a_52d4_4e0b_9a7e_2c51_d0a3_7f19);

/// A chunk returned by a similarity query.
#[derive(Debug, Clone)]
pub struct SearchHit {
    pub chunk: Chunk,
    pub score: f32,
}

impl SearchHit {
    /// Rebuild a hit from stored payload. `None` when required fields are absent.
    fn from_scored_point(point: &ScoredVectorPoint) -> Option<Self> {
        let get_str = |key: &str| -> Option<String> {
            point.payload.get(key).and_then(Value::as_str).map(String::from)
        };
        let get_line = |key: &str| -> Option<usize> {
            point
                .payload
                .get(key)
                .and_then(Value::as_u64)
                .and_then(|v| usize::try_from(v).ok())
        };

        Some(Self {
            chunk: Chunk {
                id: get_str("chunk_id")?,
                path: get_str("path")?,
                start_line: get_line("line_start")?,
                end_line: get_line("line_end")?,
                text: get_str("code")?,
                language: get_str("language").unwrap_or_else(|| "text".into()),
                content_hash: get_str("content_hash").unwrap_or_default(),
            },
            score: point.score,
        })
    }
}

/// Deterministic point id for a chunk within a namespace.
#[must_use]
pub fn point_id(namespace: &Namespace, chunk_id: &str) -> String {
    let key = format!("{namespace}\n{chunk_id}");
    uuid::Uuid::new_v5(&POINT_ID_NAMESPACE, key.as_bytes()).to_string()
}

/// Namespace-scoped storage for embedded chunks.
#[derive(Clone)]
pub struct CodeStore {
    vectors: Arc<dyn VectorStore>,
    upsert_batch_size: usize,
}

impl CodeStore {
    #[must_use]
    pub fn new(vectors: Arc<dyn VectorStore>, upsert_batch_size: usize) -> Self {
        Self {
            vectors,
            upsert_batch_size: upsert_batch_size.max(1),
        }
    }

    /// # Errors
    ///
    /// Returns an error if the collection exists with a different dimension
    /// or the store is unreachable.
    pub async fn ensure_collection(&self, dimension: usize) -> Result<()> {
        self.vectors
            .ensure_collection(u64::try_from(dimension)?)
            .await?;
        Ok(())
    }

    /// Upsert embedded chunks in batches. Returns the number of points written.
    ///
    /// # Errors
    ///
    /// Returns an error on the first failing batch.
    pub async fn upsert_chunks(
        &self,
        namespace: &Namespace,
        chunks: Vec<(Chunk, Vec<f32>)>,
    ) -> Result<usize> {
        let total = chunks.len();
        let mut points: Vec<VectorPoint> = chunks
            .into_iter()
            .map(|(chunk, vector)| to_point(namespace, chunk, vector))
            .collect();

        while !points.is_empty() {
            let rest = points.split_off(points.len().min(self.upsert_batch_size));
            let batch = std::mem::replace(&mut points, rest);
            tracing::debug!(%namespace, batch = batch.len(), "upserting chunk batch");
            self.vectors.upsert(namespace.as_str(), batch).await?;
        }
        Ok(total)
    }

    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn search(
        &self,
        namespace: &Namespace,
        vector: Vec<f32>,
        limit: usize,
    ) -> Result<Vec<SearchHit>> {
        let points = self
            .vectors
            .search(namespace.as_str(), vector, u64::try_from(limit)?)
            .await?;
        Ok(points
            .iter()
            .filter_map(|p| {
                let hit = SearchHit::from_scored_point(p);
                if hit.is_none() {
                    tracing::warn!(point = %p.id, "skipping point with incomplete payload");
                }
                hit
            })
            .collect())
    }

    /// # Errors
    ///
    /// Returns an error if the count query fails.
    pub async fn count(&self, namespace: &Namespace) -> Result<u64> {
        Ok(self.vectors.count(namespace.as_str()).await?)
    }

    /// # Errors
    ///
    /// Returns an error if the delete fails.
    pub async fn delete_namespace(&self, namespace: &Namespace) -> Result<()> {
        self.vectors.delete_namespace(namespace.as_str()).await?;
        Ok(())
    }
}

fn to_point(namespace: &Namespace, chunk: Chunk, vector: Vec<f32>) -> VectorPoint {
    let id = point_id(namespace, &chunk.id);
    let payload: HashMap<String, Value> = [
        ("namespace", json!(namespace.as_str())),
        ("chunk_id", json!(chunk.id)),
        ("path", json!(chunk.path)),
        ("line_start", json!(chunk.start_line)),
        ("line_end", json!(chunk.end_line)),
        ("language", json!(chunk.language)),
        ("content_hash", json!(chunk.content_hash)),
        ("code", json!(chunk.text)),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_owned(), v))
    .collect();

    VectorPoint {
        id,
        vector,
        payload,
    }
}

#[cfg(test)]
mod tests {
    use repolens_memory::InMemoryVectorStore;
    use repolens_source::RepositoryRef;

    use super::*;
    use crate::chunker::{ChunkerConfig, chunk_file};

    fn ns(branch: &str) -> Namespace {
        Namespace::new(&RepositoryRef::new("octo", "demo", None).unwrap(), branch)
    }

    #[test]
    fn point_ids_are_deterministic_and_namespaced() {
        let a = point_id(&ns("main"), "utils/math.go#0");
        assert_eq!(a, point_id(&ns("main"), "utils/math.go#0"));
        assert_ne!(a, point_id(&ns("dev"), "utils/math.go#0"));
        assert_ne!(a, point_id(&ns("main"), "utils/math.go#1"));
        assert!(uuid::Uuid::parse_str(&a).is_ok());
    }

    #[tokio::test]
    async fn upsert_and_search_round_trip_chunk_metadata() {
        let store = CodeStore::new(Arc::new(InMemoryVectorStore::new()), 2);
        store.ensure_collection(3).await.unwrap();
        let chunks = chunk_file("utils/math.go", "func Add() {}", &ChunkerConfig::default());
        let chunk = chunks[0].clone();

        let written = store
            .upsert_chunks(&ns("main"), vec![(chunk.clone(), vec![1.0, 0.0, 0.0])])
            .await
            .unwrap();
        assert_eq!(written, 1);

        let hits = store.search(&ns("main"), vec![1.0, 0.0, 0.0], 5).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].chunk, chunk);
        assert!(hits[0].score > 0.99);

        assert!(store.search(&ns("dev"), vec![1.0, 0.0, 0.0], 5).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn batches_cover_every_chunk() {
        let store = CodeStore::new(Arc::new(InMemoryVectorStore::new()), 2);
        store.ensure_collection(2).await.unwrap();
        let src = (0..40).map(|i| format!("line {i}")).collect::<Vec<_>>().join("\n");
        let chunks = chunk_file(
            "a.rs",
            &src,
            &ChunkerConfig {
                max_chars: 30,
                overlap_lines: 0,
            },
        );
        let n = chunks.len();
        let pairs = chunks.into_iter().map(|c| (c, vec![0.5, 0.5])).collect();
        assert_eq!(store.upsert_chunks(&ns("main"), pairs).await.unwrap(), n);
        assert_eq!(store.count(&ns("main")).await.unwrap(), n as u64);

        store.delete_namespace(&ns("main")).await.unwrap();
        assert_eq!(store.count(&ns("main")).await.unwrap(), 0);
    }

    #[test]
    fn incomplete_payload_is_rejected() {
        let point = ScoredVectorPoint {
            id: "x".into(),
            score: 0.5,
            payload: HashMap::from([("path".to_owned(), json!("a.rs"))]),
        };
        assert!(SearchHit::from_scored_point(&point).is_none());
    }
}

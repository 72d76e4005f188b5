use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;

#[derive(Debug, thiserror::Error)]
pub enum VectorStoreError {
    #[error("connection error: {0}")]
    Connection(String),
    #[error("collection error: {0}")]
    Collection(String),
    #[error("vector dimension mismatch: collection expects {expected}, got {actual}")]
    DimensionMismatch { expected: u64, actual: u64 },
    #[error("upsert error: {0}")]
    Upsert(String),
    #[error("search error: {0}")]
    Search(String),
    #[error("delete error: {0}")]
    Delete(String),
    #[error("count error: {0}")]
    Count(String),
}

#[derive(Debug, Clone)]
pub struct VectorPoint {
    pub id: String,
    pub vector: Vec<f32>,
    pub payload: HashMap<String, serde_json::Value>,
}

#[derive(Debug, Clone)]
pub struct ScoredVectorPoint {
    pub id: String,
    pub score: f32,
    pub payload: HashMap<String, serde_json::Value>,
}

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Vector index partitioned by namespace.
///
/// A store owns a single backing collection whose vector dimension is fixed
/// by the first `ensure_collection` call.
pub trait VectorStore: Send + Sync {
    /// Create the backing collection if missing. Idempotent for the same dimension.
    fn ensure_collection(&self, vector_size: u64) -> BoxFuture<'_, Result<(), VectorStoreError>>;

    fn upsert(
        &self,
        namespace: &str,
        points: Vec<VectorPoint>,
    ) -> BoxFuture<'_, Result<(), VectorStoreError>>;

    /// Nearest neighbours within `namespace`, best first. Unknown namespaces yield nothing.
    fn search(
        &self,
        namespace: &str,
        vector: Vec<f32>,
        limit: u64,
    ) -> BoxFuture<'_, Result<Vec<ScoredVectorPoint>, VectorStoreError>>;

    fn delete_namespace(&self, namespace: &str) -> BoxFuture<'_, Result<(), VectorStoreError>>;

    /// Number of points stored under `namespace`; zero when the collection does not exist yet.
    fn count(&self, namespace: &str) -> BoxFuture<'_, Result<u64, VectorStoreError>>;
}

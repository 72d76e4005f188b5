//! Qdrant-backed vector store.
//!
//! One collection holds every namespace; each point carries a `namespace`
//! keyword payload and every read, count, and delete filters on it.

use std::collections::HashMap;

use qdrant_client::Qdrant;
use qdrant_client::qdrant::{
    Condition, CountPointsBuilder, CreateCollectionBuilder, CreateFieldIndexCollectionBuilder,
    DeletePointsBuilder, Distance, FieldType, Filter, PointStruct, ScoredPoint,
    SearchPointsBuilder, UpsertPointsBuilder, VectorParamsBuilder, value::Kind,
    vectors_config::Config as VectorsConfigKind,
};

use crate::vector_store::{BoxFuture, ScoredVectorPoint, VectorPoint, VectorStore, VectorStoreError};

pub const NAMESPACE_FIELD: &str = "namespace";

type QdrantResult<T> = Result<T, Box<qdrant_client::QdrantError>>;

/// Thin wrapper over [`Qdrant`] bound to a single collection.
#[derive(Clone)]
pub struct QdrantOps {
    client: Qdrant,
    collection: String,
}

impl std::fmt::Debug for QdrantOps {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QdrantOps")
            .field("collection", &self.collection)
            .finish_non_exhaustive()
    }
}

impl QdrantOps {
    /// Create a new `QdrantOps` connected to the given URL.
    ///
    /// # Errors
    ///
    /// Returns an error if the Qdrant client cannot be created.
    pub fn new(url: &str, collection: impl Into<String>) -> QdrantResult<Self> {
        let client = Qdrant::from_url(url).build().map_err(Box::new)?;
        Ok(Self {
            client,
            collection: collection.into(),
        })
    }

    #[must_use]
    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// Dimension of the existing collection, or `None` if it does not exist.
    async fn existing_dimension(&self) -> QdrantResult<Option<u64>> {
        if !self
            .client
            .collection_exists(&self.collection)
            .await
            .map_err(Box::new)?
        {
            return Ok(None);
        }
        let info = self
            .client
            .collection_info(&self.collection)
            .await
            .map_err(Box::new)?;
        let size = info
            .result
            .and_then(|r| r.config)
            .and_then(|c| c.params)
            .and_then(|p| p.vectors_config)
            .and_then(|v| v.config)
            .and_then(|c| match c {
                VectorsConfigKind::Params(params) => Some(params.size),
                VectorsConfigKind::ParamsMap(_) => None,
            });
        Ok(Some(size.unwrap_or_default()))
    }

    async fn create(&self, vector_size: u64) -> QdrantResult<()> {
        self.client
            .create_collection(
                CreateCollectionBuilder::new(&self.collection)
                    .vectors_config(VectorParamsBuilder::new(vector_size, Distance::Cosine)),
            )
            .await
            .map_err(Box::new)?;
        self.client
            .create_field_index(CreateFieldIndexCollectionBuilder::new(
                &self.collection,
                NAMESPACE_FIELD,
                FieldType::Keyword,
            ))
            .await
            .map_err(Box::new)?;
        tracing::info!(collection = %self.collection, vector_size, "created Qdrant collection");
        Ok(())
    }
}

fn namespace_filter(namespace: &str) -> Filter {
    Filter::must([Condition::matches(NAMESPACE_FIELD, namespace.to_owned())])
}

fn to_qdrant_point(namespace: &str, p: VectorPoint) -> PointStruct {
    let mut map: serde_json::Map<String, serde_json::Value> = p.payload.into_iter().collect();
    map.insert(NAMESPACE_FIELD.into(), serde_json::Value::String(namespace.to_owned()));
    let payload: HashMap<String, qdrant_client::qdrant::Value> =
        serde_json::from_value(serde_json::Value::Object(map)).unwrap_or_default();
    PointStruct::new(p.id, p.vector, payload)
}

impl VectorStore for QdrantOps {
    fn ensure_collection(&self, vector_size: u64) -> BoxFuture<'_, Result<(), VectorStoreError>> {
        Box::pin(async move {
            let existing = self
                .existing_dimension()
                .await
                .map_err(|e| VectorStoreError::Connection(e.to_string()))?;
            match existing {
                Some(expected) if expected != vector_size => {
                    Err(VectorStoreError::DimensionMismatch {
                        expected,
                        actual: vector_size,
                    })
                }
                Some(_) => Ok(()),
                None => self
                    .create(vector_size)
                    .await
                    .map_err(|e| VectorStoreError::Collection(e.to_string())),
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
            if points.is_empty() {
                return Ok(());
            }
            let qdrant_points: Vec<PointStruct> = points
                .into_iter()
                .map(|p| to_qdrant_point(&namespace, p))
                .collect();
            self.client
                .upsert_points(UpsertPointsBuilder::new(&self.collection, qdrant_points).wait(true))
                .await
                .map_err(|e| VectorStoreError::Upsert(e.to_string()))?;
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
            let builder = SearchPointsBuilder::new(&self.collection, vector, limit)
                .filter(namespace_filter(&namespace))
                .with_payload(true);
            let results = self
                .client
                .search_points(builder)
                .await
                .map_err(|e| VectorStoreError::Search(e.to_string()))?;
            Ok(results.result.into_iter().map(scored_point_to_vector).collect())
        })
    }

    fn delete_namespace(&self, namespace: &str) -> BoxFuture<'_, Result<(), VectorStoreError>> {
        let namespace = namespace.to_owned();
        Box::pin(async move {
            let exists = self
                .client
                .collection_exists(&self.collection)
                .await
                .map_err(|e| VectorStoreError::Connection(e.to_string()))?;
            if !exists {
                return Ok(());
            }
            self.client
                .delete_points(
                    DeletePointsBuilder::new(&self.collection)
                        .points(namespace_filter(&namespace))
                        .wait(true),
                )
                .await
                .map_err(|e| VectorStoreError::Delete(e.to_string()))?;
            Ok(())
        })
    }

    fn count(&self, namespace: &str) -> BoxFuture<'_, Result<u64, VectorStoreError>> {
        let namespace = namespace.to_owned();
        Box::pin(async move {
            let exists = self
                .client
                .collection_exists(&self.collection)
                .await
                .map_err(|e| VectorStoreError::Connection(e.to_string()))?;
            if !exists {
                return Ok(0);
            }
            let response = self
                .client
                .count(
                    CountPointsBuilder::new(&self.collection)
                        .filter(namespace_filter(&namespace))
                        .exact(true),
                )
                .await
                .map_err(|e| VectorStoreError::Count(e.to_string()))?;
            Ok(response.result.map_or(0, |r| r.count))
        })
    }
}

fn scored_point_to_vector(point: ScoredPoint) -> ScoredVectorPoint {
    let payload: HashMap<String, serde_json::Value> = point
        .payload
        .into_iter()
        .filter_map(|(k, v)| {
            let json_val = match v.kind? {
                Kind::StringValue(s) => serde_json::Value::String(s),
                Kind::IntegerValue(i) => serde_json::Value::Number(i.into()),
                Kind::DoubleValue(d) => {
                    serde_json::Number::from_f64(d).map(serde_json::Value::Number)?
                }
                Kind::BoolValue(b) => serde_json::Value::Bool(b),
                _ => return None,
            };
            Some((k, json_val))
        })
        .collect();

    let id = match point.id.and_then(|pid| pid.point_id_options) {
        Some(qdrant_client::qdrant::point_id::PointIdOptions::Uuid(u)) => u,
        Some(qdrant_client::qdrant::point_id::PointIdOptions::Num(n)) => n.to_string(),
        None => String::new(),
    };

    ScoredVectorPoint {
        id,
        score: point.score,
        payload,
    }
}

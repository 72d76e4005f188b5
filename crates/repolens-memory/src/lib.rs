//! Namespace-scoped storage for chunk vectors and the architecture graph.
//!
//! Every operation takes a namespace; no call may observe another namespace's data.

pub mod graph_store;
pub mod in_memory_graph;
pub mod in_memory_store;
pub mod qdrant_ops;
pub mod sqlite_graph;
pub mod vector_store;

pub use graph_store::{
    EdgeKind, GraphEdge, GraphNode, GraphSnapshot, GraphStore, GraphStoreError, NodeKind,
};
pub use in_memory_graph::InMemoryGraphStore;
pub use in_memory_store::InMemoryVectorStore;
pub use qdrant_ops::QdrantOps;
pub use sqlite_graph::SqliteGraphStore;
pub use vector_store::{BoxFuture, ScoredVectorPoint, VectorPoint, VectorStore, VectorStoreError};

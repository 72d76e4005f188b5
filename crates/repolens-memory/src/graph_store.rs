use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::vector_store::BoxFuture;

#[derive(Debug, thiserror::Error)]
pub enum GraphStoreError {
    #[error("database error: {0}")]
    Sqlite(#[from] sqlx::Error),

    #[error("migration failed: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("unknown {what} kind: {value}")]
    UnknownKind { what: &'static str, value: String },

    #[error("graph store lock poisoned")]
    Poisoned,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    File,
    Directory,
    Component,
}

impl NodeKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::File => "file",
            Self::Directory => "directory",
            Self::Component => "component",
        }
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NodeKind {
    type Err = GraphStoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "file" => Ok(Self::File),
            "directory" => Ok(Self::Directory),
            "component" => Ok(Self::Component),
            other => Err(GraphStoreError::UnknownKind {
                what: "node",
                value: other.to_owned(),
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EdgeKind {
    Imports,
    Contains,
}

impl EdgeKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Imports => "imports",
            Self::Contains => "contains",
        }
    }
}

impl fmt::Display for EdgeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EdgeKind {
    type Err = GraphStoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "imports" => Ok(Self::Imports),
            "contains" => Ok(Self::Contains),
            other => Err(GraphStoreError::UnknownKind {
                what: "edge",
                value: other.to_owned(),
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphNode {
    pub id: String,
    pub label: String,
    pub kind: NodeKind,
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct GraphEdge {
    pub source: String,
    pub target: String,
    pub kind: EdgeKind,
}

/// Nodes and edges of one namespace, sorted by node id and edge tuple.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphSnapshot {
    pub nodes: Vec<GraphNode>,
    pub edges: Vec<GraphEdge>,
}

impl GraphSnapshot {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty() && self.edges.is_empty()
    }
}

/// Architecture graph partitioned by namespace.
///
/// Upserts are idempotent: a node is keyed by id, an edge by its full tuple.
pub trait GraphStore: Send + Sync {
    fn upsert(
        &self,
        namespace: &str,
        nodes: Vec<GraphNode>,
        edges: Vec<GraphEdge>,
    ) -> BoxFuture<'_, Result<(), GraphStoreError>>;

    fn query(&self, namespace: &str) -> BoxFuture<'_, Result<GraphSnapshot, GraphStoreError>>;

    fn delete_namespace(&self, namespace: &str) -> BoxFuture<'_, Result<(), GraphStoreError>>;
}

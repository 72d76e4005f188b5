use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::RwLock;

use crate::graph_store::{GraphEdge, GraphNode, GraphSnapshot, GraphStore, GraphStoreError};
use crate::vector_store::BoxFuture;

#[derive(Default)]
struct NamespaceGraph {
    nodes: BTreeMap<String, GraphNode>,
    edges: BTreeSet<GraphEdge>,
}

#[derive(Default)]
pub struct InMemoryGraphStore {
    graphs: RwLock<HashMap<String, NamespaceGraph>>,
}

impl InMemoryGraphStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl std::fmt::Debug for InMemoryGraphStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryGraphStore").finish_non_exhaustive()
    }
}

impl GraphStore for InMemoryGraphStore {
    fn upsert(
        &self,
        namespace: &str,
        nodes: Vec<GraphNode>,
        edges: Vec<GraphEdge>,
    ) -> BoxFuture<'_, Result<(), GraphStoreError>> {
        let namespace = namespace.to_owned();
        Box::pin(async move {
            let mut graphs = self.graphs.write().map_err(|_| GraphStoreError::Poisoned)?;
            let graph = graphs.entry(namespace).or_default();
            for node in nodes {
                graph.nodes.insert(node.id.clone(), node);
            }
            graph.edges.extend(edges);
            Ok(())
        })
    }

    fn query(&self, namespace: &str) -> BoxFuture<'_, Result<GraphSnapshot, GraphStoreError>> {
        let namespace = namespace.to_owned();
        Box::pin(async move {
            let graphs = self.graphs.read().map_err(|_| GraphStoreError::Poisoned)?;
            Ok(graphs
                .get(&namespace)
                .map(|g| GraphSnapshot {
                    nodes: g.nodes.values().cloned().collect(),
                    edges: g.edges.iter().cloned().collect(),
                })
                .unwrap_or_default())
        })
    }

    fn delete_namespace(&self, namespace: &str) -> BoxFuture<'_, Result<(), GraphStoreError>> {
        let namespace = namespace.to_owned();
        Box::pin(async move {
            self.graphs
                .write()
                .map_err(|_| GraphStoreError::Poisoned)?
                .remove(&namespace);
            Ok(())
        })
    }
}

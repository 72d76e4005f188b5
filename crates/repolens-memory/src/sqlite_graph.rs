use std::str::FromStr;

use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};

use crate::graph_store::{
    EdgeKind, GraphEdge, GraphNode, GraphSnapshot, GraphStore, GraphStoreError, NodeKind,
};
use crate::vector_store::BoxFuture;

/// Architecture graph persisted in `SQLite`.
#[derive(Debug, Clone)]
pub struct SqliteGraphStore {
    pool: SqlitePool,
}

impl SqliteGraphStore {
    /// Open (or create) the database at `path` and run migrations.
    ///
    /// `":memory:"` opens a private in-memory database on a single connection.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or migrations fail.
    pub async fn new(path: &str) -> Result<Self, GraphStoreError> {
        let (url, max_connections) = if path == ":memory:" {
            ("sqlite::memory:".to_string(), 1)
        } else {
            (format!("sqlite:{path}?mode=rwc"), 5)
        };

        let opts = SqliteConnectOptions::from_str(&url)?
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .synchronous(sqlx::sqlite::SqliteSynchronous::Normal);

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(opts)
            .await?;

        sqlx::migrate!("../../migrations").run(&pool).await?;

        Ok(Self { pool })
    }

    async fn upsert_inner(
        &self,
        namespace: &str,
        nodes: Vec<GraphNode>,
        edges: Vec<GraphEdge>,
    ) -> Result<(), GraphStoreError> {
        let mut tx = self.pool.begin().await?;
        for node in nodes {
            sqlx::query(
                "INSERT INTO graph_nodes (namespace, id, label, kind) VALUES (?, ?, ?, ?) \
                 ON CONFLICT(namespace, id) DO UPDATE SET label = excluded.label, kind = excluded.kind",
            )
            .bind(namespace)
            .bind(&node.id)
            .bind(&node.label)
            .bind(node.kind.as_str())
            .execute(&mut *tx)
            .await?;
        }
        for edge in edges {
            sqlx::query(
                "INSERT OR IGNORE INTO graph_edges (namespace, source, target, kind) VALUES (?, ?, ?, ?)",
            )
            .bind(namespace)
            .bind(&edge.source)
            .bind(&edge.target)
            .bind(edge.kind.as_str())
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn query_inner(&self, namespace: &str) -> Result<GraphSnapshot, GraphStoreError> {
        let node_rows: Vec<(String, String, String)> = sqlx::query_as(
            "SELECT id, label, kind FROM graph_nodes WHERE namespace = ? ORDER BY id",
        )
        .bind(namespace)
        .fetch_all(&self.pool)
        .await?;

        let edge_rows: Vec<(String, String, String)> = sqlx::query_as(
            "SELECT source, target, kind FROM graph_edges WHERE namespace = ? \
             ORDER BY source, target, kind",
        )
        .bind(namespace)
        .fetch_all(&self.pool)
        .await?;

        let nodes = node_rows
            .into_iter()
            .map(|(id, label, kind)| {
                Ok(GraphNode {
                    id,
                    label,
                    kind: kind.parse::<NodeKind>()?,
                })
            })
            .collect::<Result<Vec<_>, GraphStoreError>>()?;
        let mut edges = edge_rows
            .into_iter()
            .map(|(source, target, kind)| {
                Ok(GraphEdge {
                    source,
                    target,
                    kind: kind.parse::<EdgeKind>()?,
                })
            })
            .collect::<Result<Vec<_>, GraphStoreError>>()?;
        // SQL orders kind as text; align with the enum order used by the in-memory store.
        edges.sort();

        Ok(GraphSnapshot { nodes, edges })
    }

    async fn delete_inner(&self, namespace: &str) -> Result<(), GraphStoreError> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM graph_edges WHERE namespace = ?")
            .bind(namespace)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM graph_nodes WHERE namespace = ?")
            .bind(namespace)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(())
    }
}

impl GraphStore for SqliteGraphStore {
    fn upsert(
        &self,
        namespace: &str,
        nodes: Vec<GraphNode>,
        edges: Vec<GraphEdge>,
    ) -> BoxFuture<'_, Result<(), GraphStoreError>> {
        let namespace = namespace.to_owned();
        Box::pin(async move { self.upsert_inner(&namespace, nodes, edges).await })
    }

    fn query(&self, namespace: &str) -> BoxFuture<'_, Result<GraphSnapshot, GraphStoreError>> {
        let namespace = namespace.to_owned();
        Box::pin(async move { self.query_inner(&namespace).await })
    }

    fn delete_namespace(&self, namespace: &str) -> BoxFuture<'_, Result<(), GraphStoreError>> {
        let namespace = namespace.to_owned();
        Box::pin(async move { self.delete_inner(&namespace).await })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(id: &str, kind: NodeKind) -> GraphNode {
        GraphNode {
            id: id.into(),
            label: id.into(),
            kind,
        }
    }

    fn edge(source: &str, target: &str, kind: EdgeKind) -> GraphEdge {
        GraphEdge {
            source: source.into(),
            target: target.into(),
            kind,
        }
    }

    #[tokio::test]
    async fn upsert_twice_keeps_one_copy() {
        let store = SqliteGraphStore::new(":memory:").await.unwrap();
        let nodes = vec![
            node("cmd", NodeKind::Directory),
            node("cmd/main.go", NodeKind::File),
        ];
        let edges = vec![edge("cmd", "cmd/main.go", EdgeKind::Contains)];

        store.upsert("octo/demo@main", nodes.clone(), edges.clone()).await.unwrap();
        store.upsert("octo/demo@main", nodes.clone(), edges.clone()).await.unwrap();

        let snapshot = store.query("octo/demo@main").await.unwrap();
        assert_eq!(snapshot.nodes, nodes);
        assert_eq!(snapshot.edges, edges);
    }

    #[tokio::test]
    async fn relabel_updates_existing_node() {
        let store = SqliteGraphStore::new(":memory:").await.unwrap();
        store
            .upsert("ns", vec![node("fmt", NodeKind::Component)], vec![])
            .await
            .unwrap();
        let mut renamed = node("fmt", NodeKind::Component);
        renamed.label = "std fmt".into();
        store.upsert("ns", vec![renamed], vec![]).await.unwrap();

        let snapshot = store.query("ns").await.unwrap();
        assert_eq!(snapshot.nodes.len(), 1);
        assert_eq!(snapshot.nodes[0].label, "std fmt");
    }

    #[tokio::test]
    async fn delete_namespace_only_touches_that_namespace() {
        let store = SqliteGraphStore::new(":memory:").await.unwrap();
        store
            .upsert("a", vec![node("x", NodeKind::File)], vec![])
            .await
            .unwrap();
        store
            .upsert("b", vec![node("y", NodeKind::File)], vec![])
            .await
            .unwrap();

        store.delete_namespace("a").await.unwrap();
        assert!(store.query("a").await.unwrap().is_empty());
        assert_eq!(store.query("b").await.unwrap().nodes.len(), 1);
    }

    #[tokio::test]
    async fn persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("graph.db");
        let path = path.to_str().unwrap();

        let store = SqliteGraphStore::new(path).await.unwrap();
        store
            .upsert(
                "ns",
                vec![node("src", NodeKind::Directory)],
                vec![edge("src", "src/lib.rs", EdgeKind::Contains)],
            )
            .await
            .unwrap();
        drop(store);

        let reopened = SqliteGraphStore::new(path).await.unwrap();
        let snapshot = reopened.query("ns").await.unwrap();
        assert_eq!(snapshot.nodes.len(), 1);
        assert_eq!(snapshot.edges.len(), 1);
    }
}

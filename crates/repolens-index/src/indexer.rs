//! Repository indexing orchestrator: tree → filter → fetch → chunk → embed → store.

use std::collections::HashMap;
use std::sync::Arc;

use futures::StreamExt;
use repolens_llm::LlmProvider;
use repolens_memory::GraphStore;
use repolens_source::{RepositoryRef, SourceHost, TreeEntry};
use serde::{Deserialize, Serialize};

use crate::chunker::{Chunk, ChunkerConfig, chunk_file};
use crate::context::contextualize_for_embedding;
use crate::embedder::EmbeddingGateway;
use crate::error::Result;
use crate::graph::{FileImports, build_graph, extract_imports};
use crate::languages::{detect_language, is_indexable};
use crate::namespace::Namespace;
use crate::store::CodeStore;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexerConfig {
    pub chunker: ChunkerConfig,
    /// Embedding requests in flight at once.
    pub embed_concurrency: usize,
    /// File downloads in flight at once.
    pub fetch_concurrency: usize,
    /// Files fetched, chunked and embedded per round.
    pub file_batch_size: usize,
    pub upsert_batch_size: usize,
    pub max_files: usize,
    pub max_file_bytes: u64,
}

impl Default for IndexerConfig {
    fn default() -> Self {
        Self {
            chunker: ChunkerConfig::default(),
            embed_concurrency: 8,
            fetch_concurrency: 8,
            file_batch_size: 32,
            upsert_batch_size: 64,
            max_files: 5000,
            max_file_bytes: 512 * 1024,
        }
    }
}

/// Summary of an indexing run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexReport {
    pub namespace: String,
    pub branch: String,
    /// Eligible files considered after filtering and the `max_files` cap.
    pub files_scanned: usize,
    pub files_indexed: usize,
    pub files_skipped: usize,
    /// On a reused namespace, the number of vectors already stored.
    pub chunks_created: usize,
    /// The namespace already held vectors and `force` was not set.
    pub reused: bool,
    pub errors: Vec<String>,
    pub duration_ms: u64,
}

/// Builds a namespace's vectors (and optionally its architecture graph)
/// from a live repository snapshot.
pub struct CodeIndexer<P> {
    source: Arc<dyn SourceHost>,
    gateway: Arc<EmbeddingGateway<P>>,
    store: CodeStore,
    graph: Option<Arc<dyn GraphStore>>,
    config: IndexerConfig,
}

impl<P: LlmProvider> CodeIndexer<P> {
    #[must_use]
    pub fn new(
        source: Arc<dyn SourceHost>,
        gateway: Arc<EmbeddingGateway<P>>,
        store: CodeStore,
        config: IndexerConfig,
    ) -> Self {
        Self {
            source,
            gateway,
            store,
            graph: None,
            config,
        }
    }

    #[must_use]
    pub fn with_graph_store(mut self, graph: Arc<dyn GraphStore>) -> Self {
        self.graph = Some(graph);
        self
    }

    /// Index `repo`, returning counts for observability.
    ///
    /// Without `force`, a namespace that already holds vectors is left as is.
    /// With `force`, the namespace's vectors and graph are deleted first, so
    /// the run is an authoritative replace.
    ///
    /// Per-file fetch and embedding failures are recorded in
    /// [`IndexReport::errors`] and the file is skipped. A run that stops
    /// early (a store error, or the future being dropped on timeout or
    /// cancellation) clears what it wrote, so a later run never reuses a
    /// partial namespace.
    ///
    /// # Errors
    ///
    /// Returns an error if the branch or tree cannot be resolved, the
    /// embedding probe fails, or the vector or graph store rejects a write.
    pub async fn index_repository(&self, repo: &RepositoryRef, force: bool) -> Result<IndexReport> {
        let start = std::time::Instant::now();

        let branch = self.source.resolve_branch(repo).await?;
        let namespace = Namespace::new(repo, &branch);
        let mut report = IndexReport {
            namespace: namespace.to_string(),
            branch: branch.clone(),
            ..IndexReport::default()
        };

        let dimension = self.gateway.dimension().await?;
        self.store.ensure_collection(dimension).await?;

        if force {
            tracing::info!(%namespace, "force re-index: clearing namespace");
            self.store.delete_namespace(&namespace).await?;
            if let Some(graph) = &self.graph {
                graph.delete_namespace(namespace.as_str()).await?;
            }
        } else {
            let existing = self.store.count(&namespace).await?;
            if existing > 0 {
                tracing::info!(%namespace, existing, "namespace already indexed, reusing");
                report.reused = true;
                report.chunks_created = usize::try_from(existing)?;
                report.duration_ms = start.elapsed().as_millis().try_into().unwrap_or(u64::MAX);
                return Ok(report);
            }
        }

        let guard = PartialNamespace {
            store: self.store.clone(),
            graph: self.graph.clone(),
            namespace: namespace.clone(),
            armed: true,
        };
        match self.build_namespace(repo, &branch, &namespace, &mut report).await {
            Ok(()) => guard.complete(),
            Err(e) => {
                guard.discard().await;
                return Err(e);
            }
        }

        report.duration_ms = start.elapsed().as_millis().try_into().unwrap_or(u64::MAX);
        tracing::info!(
            %namespace,
            files_indexed = report.files_indexed,
            files_skipped = report.files_skipped,
            chunks = report.chunks_created,
            errors = report.errors.len(),
            duration_ms = report.duration_ms,
            "indexing complete"
        );
        Ok(report)
    }

    /// Writes every vector (and the graph) of a namespace known to be empty.
    async fn build_namespace(
        &self,
        repo: &RepositoryRef,
        branch: &str,
        namespace: &Namespace,
        report: &mut IndexReport,
    ) -> Result<()> {
        let tree = self.source.fetch_tree(repo, branch).await?;
        let mut eligible: Vec<TreeEntry> = tree
            .into_iter()
            .filter(|e| is_indexable(e, self.config.max_file_bytes))
            .collect();
        eligible.sort_by(|a, b| a.path.cmp(&b.path));
        if eligible.len() > self.config.max_files {
            tracing::warn!(
                %namespace,
                eligible = eligible.len(),
                max_files = self.config.max_files,
                "repository exceeds file cap, truncating"
            );
            eligible.truncate(self.config.max_files);
        }

        let total = eligible.len();
        report.files_scanned = total;
        tracing::info!(%namespace, total, "indexing started");

        let mut graph_files: Vec<FileImports> = Vec::new();
        for (round, batch) in eligible.chunks(self.config.file_batch_size.max(1)).enumerate() {
            self.index_batch(repo, branch, namespace, batch, report, &mut graph_files)
                .await?;
            tracing::info!(
                %namespace,
                progress = format_args!(
                    "{}/{total}",
                    (round * self.config.file_batch_size.max(1) + batch.len()).min(total)
                ),
                chunks = report.chunks_created,
                "indexing progress"
            );
        }

        if let Some(graph) = &self.graph
            && !graph_files.is_empty()
        {
            let (nodes, edges) = build_graph(&graph_files);
            tracing::debug!(%namespace, nodes = nodes.len(), edges = edges.len(), "upserting architecture graph");
            graph.upsert(namespace.as_str(), nodes, edges).await?;
        }

        Ok(())
    }

    async fn index_batch(
        &self,
        repo: &RepositoryRef,
        branch: &str,
        namespace: &Namespace,
        batch: &[TreeEntry],
        report: &mut IndexReport,
        graph_files: &mut Vec<FileImports>,
    ) -> Result<()> {
        let mut fetched: Vec<(String, std::result::Result<String, repolens_source::SourceError>)> =
            futures::stream::iter(batch)
                .map(|entry| async move {
                    let content = self.source.fetch_file(repo, branch, &entry.path).await;
                    (entry.path.clone(), content)
                })
                .buffer_unordered(self.config.fetch_concurrency.max(1))
                .collect()
                .await;
        fetched.sort_by(|a, b| a.0.cmp(&b.0));

        let mut files: Vec<(String, Vec<Chunk>)> = Vec::new();
        for (path, content) in fetched {
            match content {
                Ok(text) => {
                    let chunks = chunk_file(&path, &text, &self.config.chunker);
                    if chunks.is_empty() {
                        tracing::debug!(file = %path, "no content to index");
                        report.files_skipped += 1;
                        continue;
                    }
                    if self.graph.is_some() {
                        let lang = detect_language(&path);
                        let imports = lang.map(|l| extract_imports(l, &text)).unwrap_or_default();
                        graph_files.push(FileImports {
                            path: path.clone(),
                            lang,
                            imports,
                        });
                    }
                    files.push((path, chunks));
                }
                Err(e) => {
                    tracing::warn!(file = %path, "fetch failed, skipping: {e:#}");
                    report.errors.push(format!("{path}: {e:#}"));
                    report.files_skipped += 1;
                }
            }
        }

        let items: Vec<(String, String)> = files
            .iter()
            .flat_map(|(_, chunks)| chunks.iter())
            .map(|c| (c.id.clone(), contextualize_for_embedding(c)))
            .collect();
        let mut vectors: HashMap<String, Result<Vec<f32>>> =
            self.gateway.embed_all(items, self.config.embed_concurrency).await;

        let mut ready: Vec<(Chunk, Vec<f32>)> = Vec::new();
        for (path, chunks) in files {
            let mut embedded = Vec::with_capacity(chunks.len());
            let mut failure = None;
            for chunk in chunks {
                match vectors.remove(&chunk.id) {
                    Some(Ok(vector)) => embedded.push((chunk, vector)),
                    Some(Err(e)) => {
                        failure = Some(e.to_string());
                        break;
                    }
                    None => {
                        failure = Some(format!("missing embedding for {}", chunk.id));
                        break;
                    }
                }
            }
            if let Some(err) = failure {
                tracing::warn!(file = %path, "embedding failed, skipping: {err}");
                report.errors.push(format!("{path}: {err}"));
                report.files_skipped += 1;
                graph_files.retain(|f| f.path != path);
                continue;
            }
            report.files_indexed += 1;
            ready.extend(embedded);
        }

        if !ready.is_empty() {
            report.chunks_created += self.store.upsert_chunks(namespace, ready).await?;
        }
        Ok(())
    }
}

/// Vectors and graph written by a run that has not finished yet.
///
/// Dropped while still armed, the namespace is cleared on a spawned task.
struct PartialNamespace {
    store: CodeStore,
    graph: Option<Arc<dyn GraphStore>>,
    namespace: Namespace,
    armed: bool,
}

impl PartialNamespace {
    fn complete(mut self) {
        self.armed = false;
    }

    async fn discard(mut self) {
        self.armed = false;
        clear_namespace(&self.store, self.graph.as_deref(), &self.namespace).await;
    }
}

impl Drop for PartialNamespace {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            tracing::error!(namespace = %self.namespace, "no runtime to clear partial namespace");
            return;
        };
        let store = self.store.clone();
        let graph = self.graph.clone();
        let namespace = self.namespace.clone();
        handle.spawn(async move {
            clear_namespace(&store, graph.as_deref(), &namespace).await;
        });
    }
}

async fn clear_namespace(store: &CodeStore, graph: Option<&dyn GraphStore>, namespace: &Namespace) {
    tracing::warn!(%namespace, "indexing did not finish, clearing partial namespace");
    if let Err(e) = store.delete_namespace(namespace).await {
        tracing::error!(%namespace, "failed to clear partial vectors: {e:#}");
    }
    if let Some(graph) = graph
        && let Err(e) = graph.delete_namespace(namespace.as_str()).await
    {
        tracing::error!(%namespace, "failed to clear partial graph: {e:#}");
    }
}

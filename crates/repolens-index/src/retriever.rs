//! Semantic retrieval of code chunks within one namespace.

use std::sync::Arc;

use repolens_llm::LlmProvider;
use serde::{Deserialize, Serialize};

use crate::chunker::Chunk;
use crate::embedder::EmbeddingGateway;
use crate::error::{IndexError, Result};
use crate::namespace::Namespace;
use crate::store::CodeStore;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    /// Used when the caller does not pass a top-k.
    pub default_top_k: usize,
    /// Requests above this are clamped.
    pub max_top_k: usize,
    /// Hits scoring below this are dropped.
    pub score_threshold: Option<f32>,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            default_top_k: 8,
            max_top_k: 20,
            score_threshold: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievedChunk {
    pub chunk: Chunk,
    pub relevance_score: f32,
}

/// Hits sorted by descending score, ties by ascending chunk id.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RetrievalResult {
    pub hits: Vec<RetrievedChunk>,
}

impl RetrievalResult {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.hits.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.hits.len()
    }
}

pub struct SemanticRetriever<P> {
    gateway: Arc<EmbeddingGateway<P>>,
    store: CodeStore,
    config: RetrievalConfig,
}

impl<P: LlmProvider> SemanticRetriever<P> {
    #[must_use]
    pub fn new(gateway: Arc<EmbeddingGateway<P>>, store: CodeStore, config: RetrievalConfig) -> Self {
        Self {
            gateway,
            store,
            config,
        }
    }

    #[must_use]
    pub fn config(&self) -> &RetrievalConfig {
        &self.config
    }

    /// Rank chunks of `namespace` by similarity to `question`.
    ///
    /// A namespace with no vectors yields an empty result.
    ///
    /// # Errors
    ///
    /// Returns [`IndexError::InvalidInput`] for an empty question or
    /// `top_k == 0`, and upstream errors from embedding or search.
    pub async fn retrieve(
        &self,
        namespace: &Namespace,
        question: &str,
        top_k: usize,
    ) -> Result<RetrievalResult> {
        if question.trim().is_empty() {
            return Err(IndexError::InvalidInput("question must not be empty".into()));
        }
        if top_k == 0 {
            return Err(IndexError::InvalidInput("top_k must be at least 1".into()));
        }
        let top_k = top_k.min(self.config.max_top_k.max(1));

        if self.store.count(namespace).await? == 0 {
            tracing::debug!(%namespace, "namespace not indexed, no context");
            return Ok(RetrievalResult::default());
        }

        let vector = self.gateway.embed(question).await?;
        // Over-fetch so equal scores at the cut are ordered by id, not by store order.
        let mut hits = self.store.search(namespace, vector, top_k * 2).await?;

        if let Some(threshold) = self.config.score_threshold {
            hits.retain(|h| h.score >= threshold);
        }
        hits.sort_by(|a, b| {
            b.score
                .total_cmp(&a.score)
                .then_with(|| a.chunk.id.cmp(&b.chunk.id))
        });
        hits.truncate(top_k);

        tracing::debug!(%namespace, hits = hits.len(), top_k, "retrieved chunks");
        Ok(RetrievalResult {
            hits: hits
                .into_iter()
                .map(|h| RetrievedChunk {
                    chunk: h.chunk,
                    relevance_score: h.score,
                })
                .collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    use repolens_llm::mock::MockProvider;
    use repolens_memory::InMemoryVectorStore;
    use repolens_source::RepositoryRef;

    use super::*;
    use crate::chunker::{ChunkerConfig, chunk_file};

    fn ns() -> Namespace {
        Namespace::new(&RepositoryRef::new("octo", "demo", None).unwrap(), "main")
    }

    async fn setup(files: &[(&str, &str)], config: RetrievalConfig) -> SemanticRetriever<MockProvider> {
        let gateway = Arc::new(EmbeddingGateway::new(Arc::new(MockProvider::default())));
        let store = CodeStore::new(Arc::new(InMemoryVectorStore::new()), 64);
        store.ensure_collection(gateway.dimension().await.unwrap()).await.unwrap();
        let mut pairs = Vec::new();
        for (path, text) in files {
            for chunk in chunk_file(path, text, &ChunkerConfig::default()) {
                let v = gateway.embed(&chunk.text).await.unwrap();
                pairs.push((chunk, v));
            }
        }
        store.upsert_chunks(&ns(), pairs).await.unwrap();
        SemanticRetriever::new(gateway, store, config)
    }

    #[tokio::test]
    async fn empty_namespace_yields_empty_result() {
        let r = setup(&[], RetrievalConfig::default()).await;
        let result = r.retrieve(&ns(), "anything", 5).await.unwrap();
        assert!(result.is_empty());
    }

    #[tokio::test]
    async fn invalid_inputs_are_rejected() {
        let r = setup(&[], RetrievalConfig::default()).await;
        assert!(matches!(r.retrieve(&ns(), "q", 0).await, Err(IndexError::InvalidInput(_))));
        assert!(matches!(r.retrieve(&ns(), "  ", 3).await, Err(IndexError::InvalidInput(_))));
    }

    #[tokio::test]
    async fn most_similar_chunk_ranks_first() {
        let r = setup(
            &[
                ("utils/math.go", "func Add(a, b int) int { return a + b }"),
                ("web/render.go", "render the html template for users"),
            ],
            RetrievalConfig::default(),
        )
        .await;
        let result = r.retrieve(&ns(), "How is addition implemented?", 5).await.unwrap();
        assert_eq!(result.hits[0].chunk.path, "utils/math.go");
        assert!(result.hits.windows(2).all(|w| w[0].relevance_score >= w[1].relevance_score));
    }

    #[tokio::test]
    async fn top_k_is_clamped_and_ties_break_by_id() {
        let files: Vec<(String, String)> = (0..6).map(|i| (format!("f{i}.go"), "same body".to_owned())).collect();
        let refs: Vec<(&str, &str)> = files.iter().map(|(p, t)| (p.as_str(), t.as_str())).collect();
        let r = setup(
            &refs,
            RetrievalConfig {
                max_top_k: 3,
                ..RetrievalConfig::default()
            },
        )
        .await;
        let result = r.retrieve(&ns(), "same body", 50).await.unwrap();
        let ids: Vec<_> = result.hits.iter().map(|h| h.chunk.id.as_str()).collect();
        assert_eq!(ids, vec!["f0.go#0", "f1.go#0", "f2.go#0"]);

        let again = r.retrieve(&ns(), "same body", 50).await.unwrap();
        assert_eq!(result, again);
    }

    #[tokio::test]
    async fn threshold_filters_weak_hits() {
        let r = setup(
            &[("web/render.go", "render the html template for users")],
            RetrievalConfig {
                score_threshold: Some(0.5),
                ..RetrievalConfig::default()
            },
        )
        .await;
        let result = r.retrieve(&ns(), "How is addition implemented?", 5).await.unwrap();
        assert!(result.is_empty());
    }
}

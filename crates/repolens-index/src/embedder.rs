//! Embedding Gateway: fixed-dimension embeddings with bounded concurrency.

use std::collections::HashMap;
use std::sync::Arc;

use futures::StreamExt;
use repolens_llm::LlmProvider;
use tokio::sync::OnceCell;

use crate::error::{IndexError, Result};

const DIMENSION_PROBE: &str = "dimension probe";

/// Wraps an [`LlmProvider`] and enforces that every vector it returns has
/// the deployment dimension, learned once from a probe embedding.
pub struct EmbeddingGateway<P> {
    provider: Arc<P>,
    dimension: OnceCell<usize>,
}

impl<P: LlmProvider> EmbeddingGateway<P> {
    #[must_use]
    pub fn new(provider: Arc<P>) -> Self {
        Self {
            provider,
            dimension: OnceCell::new(),
        }
    }

    #[must_use]
    pub fn provider(&self) -> &Arc<P> {
        &self.provider
    }

    /// Output dimension of the provider, probed on first use and cached.
    ///
    /// # Errors
    ///
    /// Returns an error if the probe embedding fails or is empty.
    pub async fn dimension(&self) -> Result<usize> {
        self.dimension
            .get_or_try_init(|| async {
                let probe = self.provider.embed(DIMENSION_PROBE).await?;
                if probe.is_empty() {
                    return Err(IndexError::Llm(repolens_llm::LlmError::EmptyResponse {
                        provider: self.provider.name().to_owned(),
                    }));
                }
                tracing::debug!(provider = self.provider.name(), dimension = probe.len(), "embedding dimension probed");
                Ok(probe.len())
            })
            .await
            .copied()
    }

    /// Embed one text.
    ///
    /// # Errors
    ///
    /// Returns an error if the provider fails or returns a vector whose
    /// length differs from [`Self::dimension`].
    pub async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let expected = self.dimension().await?;
        let vector = self.provider.embed(text).await?;
        if vector.len() != expected {
            return Err(IndexError::DimensionMismatch {
                expected,
                actual: vector.len(),
            });
        }
        Ok(vector)
    }

    /// Embed `(id, text)` pairs with at most `concurrency` requests in flight.
    ///
    /// Results are keyed by id, so completion order never affects which
    /// vector belongs to which item.
    pub async fn embed_all(
        &self,
        items: Vec<(String, String)>,
        concurrency: usize,
    ) -> HashMap<String, Result<Vec<f32>>> {
        futures::stream::iter(items)
            .map(|(id, text)| async move {
                let result = self.embed(&text).await;
                (id, result)
            })
            .buffer_unordered(concurrency.max(1))
            .collect()
            .await
    }
}

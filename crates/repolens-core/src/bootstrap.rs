//! Construction of providers and stores from [`Config`].

use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use repolens_llm::AnyProvider;
use repolens_llm::ollama::OllamaProvider;
use repolens_llm::openai::OpenAiProvider;
use repolens_memory::{
    GraphStore, InMemoryGraphStore, InMemoryVectorStore, QdrantOps, SqliteGraphStore, VectorStore,
};
use repolens_source::{GitHubClient, SourceHost};

use crate::assistant::RepoAssistant;
use crate::config::{Config, ProviderKind, VectorBackend};

/// # Errors
///
/// Returns an error if the selected provider is missing its credentials.
pub fn create_provider(config: &Config) -> anyhow::Result<AnyProvider> {
    let llm = &config.llm;
    match llm.provider {
        ProviderKind::Ollama => Ok(AnyProvider::Ollama(OllamaProvider::new(
            &llm.base_url,
            llm.model.clone(),
            llm.embedding_model.clone(),
        ))),
        ProviderKind::OpenAi => {
            let api_key = config
                .secrets
                .openai_api_key
                .as_ref()
                .context("REPOLENS_OPENAI_API_KEY is required for the openai provider")?;
            Ok(AnyProvider::OpenAi(OpenAiProvider::new(
                api_key.expose().to_owned(),
                llm.base_url.clone(),
                llm.model.clone(),
                llm.max_tokens,
                Some(llm.embedding_model.clone()),
            )))
        }
    }
}

/// # Errors
///
/// Returns an error if the Qdrant client cannot be created.
pub fn create_vector_store(config: &Config) -> anyhow::Result<Arc<dyn VectorStore>> {
    match config.vector.backend {
        VectorBackend::Memory => {
            tracing::info!("using in-memory vector store; vectors are not persisted");
            Ok(Arc::new(InMemoryVectorStore::new()))
        }
        VectorBackend::Qdrant => {
            let ops = QdrantOps::new(&config.vector.qdrant_url, config.vector.collection.clone())
                .with_context(|| format!("failed to connect to Qdrant at {}", config.vector.qdrant_url))?;
            Ok(Arc::new(ops))
        }
    }
}

/// `None` when the graph feature is disabled. A vector store in memory
/// pairs with a graph store in memory; otherwise the graph goes to SQLite.
///
/// # Errors
///
/// Returns an error if the `SQLite` database cannot be opened or migrated.
pub async fn create_graph_store(config: &Config) -> anyhow::Result<Option<Arc<dyn GraphStore>>> {
    if !config.graph.enabled {
        return Ok(None);
    }
    if config.vector.backend == VectorBackend::Memory {
        return Ok(Some(Arc::new(InMemoryGraphStore::new())));
    }
    let path = &config.graph.sqlite_path;
    if path != ":memory:"
        && let Some(parent) = Path::new(path).parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    let store = SqliteGraphStore::new(path)
        .await
        .with_context(|| format!("failed to open graph database {path}"))?;
    Ok(Some(Arc::new(store)))
}

/// # Errors
///
/// Returns an error if the HTTP client cannot be built.
pub fn create_source_host(config: &Config) -> anyhow::Result<Arc<dyn SourceHost>> {
    let token = config
        .secrets
        .github_token
        .as_ref()
        .map(|t| t.expose().to_owned());
    if token.is_none() {
        tracing::debug!("no REPOLENS_GITHUB_TOKEN set; using unauthenticated rate limits");
    }
    let client = GitHubClient::new(token)
        .context("failed to build source host client")?
        .with_base_url(config.source.api_url.clone())
        .with_page_size(config.source.page_size)
        .with_max_file_bytes(usize::try_from(config.index.max_file_bytes).unwrap_or(usize::MAX))
        .with_detail_limit(config.source.detail_limit);
    Ok(Arc::new(client))
}

/// Wire a [`RepoAssistant`] from configuration alone.
///
/// # Errors
///
/// Returns an error if any collaborator cannot be constructed.
pub async fn build_assistant(config: &Config) -> anyhow::Result<RepoAssistant<AnyProvider>> {
    let provider = Arc::new(create_provider(config)?);
    let source = create_source_host(config)?;
    let vectors = create_vector_store(config)?;
    let mut assistant = RepoAssistant::new(provider, source, vectors, config);
    if let Some(graph) = create_graph_store(config).await? {
        assistant = assistant.with_graph_store(graph);
    }
    tracing::info!(
        provider = %config.llm.provider,
        model = %config.llm.model,
        graph = config.graph.enabled,
        "assistant ready"
    );
    Ok(assistant)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Secret;

    #[test]
    fn ollama_provider_by_default() {
        let provider = create_provider(&Config::default()).unwrap();
        assert!(matches!(provider, AnyProvider::Ollama(_)));
    }

    #[test]
    fn openai_requires_key() {
        let mut config = Config::default();
        config.llm.provider = ProviderKind::OpenAi;
        let err = create_provider(&config).unwrap_err();
        assert!(err.to_string().contains("REPOLENS_OPENAI_API_KEY"));

        config.secrets.openai_api_key = Some(Secret::new("sk-test"));
        let provider = create_provider(&config).unwrap();
        assert!(matches!(provider, AnyProvider::OpenAi(_)));
    }

    #[tokio::test]
    async fn graph_store_disabled_by_default() {
        assert!(create_graph_store(&Config::default()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn sqlite_graph_store_created_under_missing_dir() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.graph.enabled = true;
        config.vector.backend = VectorBackend::Qdrant;
        config.graph.sqlite_path = dir.path().join("nested/graph.db").display().to_string();
        let store = create_graph_store(&config).await.unwrap().unwrap();
        assert!(store.query("octo/demo@main").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn memory_backends_build_an_assistant() {
        let mut config = Config::default();
        config.graph.enabled = true;
        let assistant = build_assistant(&config).await.unwrap();
        assert_eq!(assistant.timeouts().interactive_seconds, 120);
    }
}

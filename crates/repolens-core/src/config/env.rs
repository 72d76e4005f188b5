use std::str::FromStr;

use super::{Config, Secret};

/// Parse an env var, warning about and ignoring values that do not parse.
fn env_parsed<T: FromStr>(key: &str) -> Option<T> {
    let v = std::env::var(key).ok()?;
    match v.parse() {
        Ok(parsed) => Some(parsed),
        Err(_) => {
            tracing::warn!("ignoring invalid {key} value: {v}");
            None
        }
    }
}

/// Parse a lowercase serde enum from an env var.
fn env_enum<T: serde::de::DeserializeOwned>(key: &str) -> Option<T> {
    let v = std::env::var(key).ok()?;
    if let Ok(kind) = serde_json::from_value(serde_json::Value::String(v.to_lowercase())) {
        Some(kind)
    } else {
        tracing::warn!("ignoring invalid {key} value: {v}");
        None
    }
}

impl Config {
    pub(crate) fn apply_env_overrides(&mut self) {
        self.apply_env_overrides_services();
        self.apply_env_overrides_pipeline();
        self.apply_env_secrets();
    }

    fn apply_env_overrides_services(&mut self) {
        if let Some(kind) = env_enum("REPOLENS_LLM_PROVIDER") {
            self.llm.provider = kind;
        }
        if let Ok(v) = std::env::var("REPOLENS_LLM_BASE_URL") {
            self.llm.base_url = v;
        }
        if let Ok(v) = std::env::var("REPOLENS_LLM_MODEL") {
            self.llm.model = v;
        }
        if let Ok(v) = std::env::var("REPOLENS_LLM_EMBEDDING_MODEL") {
            self.llm.embedding_model = v;
        }
        if let Ok(v) = std::env::var("REPOLENS_SOURCE_API_URL") {
            self.source.api_url = v;
        }
        if let Some(backend) = env_enum("REPOLENS_VECTOR_BACKEND") {
            self.vector.backend = backend;
        }
        if let Ok(v) = std::env::var("REPOLENS_QDRANT_URL") {
            self.vector.qdrant_url = v;
        }
        if let Ok(v) = std::env::var("REPOLENS_VECTOR_COLLECTION") {
            self.vector.collection = v;
        }
        if let Some(enabled) = env_parsed("REPOLENS_GRAPH_ENABLED") {
            self.graph.enabled = enabled;
        }
        if let Ok(v) = std::env::var("REPOLENS_SQLITE_PATH") {
            self.graph.sqlite_path = v;
        }
    }

    fn apply_env_overrides_pipeline(&mut self) {
        if let Some(n) = env_parsed("REPOLENS_INDEX_EMBED_CONCURRENCY") {
            self.index.embed_concurrency = n;
        }
        if let Some(n) = env_parsed("REPOLENS_INDEX_MAX_FILES") {
            self.index.max_files = n;
        }
        if let Some(n) = env_parsed("REPOLENS_CHUNK_MAX_CHARS") {
            self.index.chunker.max_chars = n;
        }
        if let Some(n) = env_parsed("REPOLENS_RETRIEVAL_TOP_K") {
            self.retrieval.default_top_k = n;
        }
        if let Some(threshold) = env_parsed::<f32>("REPOLENS_RETRIEVAL_SCORE_THRESHOLD") {
            self.retrieval.score_threshold = Some(threshold);
        }
        if let Some(secs) = env_parsed("REPOLENS_TIMEOUT_INTERACTIVE") {
            self.timeouts.interactive_seconds = secs;
        }
        if let Some(secs) = env_parsed("REPOLENS_TIMEOUT_INDEXING") {
            self.timeouts.indexing_seconds = secs;
        }
    }

    fn apply_env_secrets(&mut self) {
        if let Ok(v) = std::env::var("REPOLENS_OPENAI_API_KEY")
            && !v.is_empty()
        {
            self.secrets.openai_api_key = Some(Secret::new(v));
        }
        if let Ok(v) = std::env::var("REPOLENS_GITHUB_TOKEN")
            && !v.is_empty()
        {
            self.secrets.github_token = Some(Secret::new(v));
        }
    }
}

mod env;
mod types;


pub use types::*;

use std::path::Path;

use anyhow::{Context, bail};

impl Config {
    /// Load configuration from a TOML file with env var overrides.
    ///
    /// Falls back to defaults when the file does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed, or
    /// if the resulting configuration fails [`Config::validate`].
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path).context("failed to read config file")?;
            toml::from_str::<Self>(&content).context("failed to parse config file")?
        } else {
            Self::default()
        };

        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Reject values no pipeline run could work with.
    ///
    /// # Errors
    ///
    /// Returns an error naming the first offending setting.
    pub fn validate(&self) -> anyhow::Result<()> {
        let chunker = &self.index.chunker;
        if chunker.max_chars == 0 {
            bail!("index.chunker.max_chars must be greater than 0");
        }
        if chunker.overlap_lines >= chunker.max_chars {
            bail!("index.chunker.overlap_lines must be smaller than index.chunker.max_chars");
        }
        if self.index.embed_concurrency == 0 || self.index.fetch_concurrency == 0 {
            bail!("index concurrency settings must be greater than 0");
        }
        if self.index.upsert_batch_size == 0 || self.index.file_batch_size == 0 {
            bail!("index batch sizes must be greater than 0");
        }
        if self.retrieval.max_top_k == 0 {
            bail!("retrieval.max_top_k must be greater than 0");
        }
        if self.retrieval.default_top_k == 0 {
            bail!("retrieval.default_top_k must be greater than 0");
        }
        if self.timeouts.interactive_seconds == 0 || self.timeouts.indexing_seconds == 0 {
            bail!("timeouts must be greater than 0");
        }
        if self.synthesis.max_context_chars == 0 {
            bail!("synthesis.max_context_chars must be greater than 0");
        }
        if self.llm.provider == ProviderKind::OpenAi && self.secrets.openai_api_key.is_none() {
            bail!("llm.provider = \"openai\" requires REPOLENS_OPENAI_API_KEY");
        }
        Ok(())
    }
}

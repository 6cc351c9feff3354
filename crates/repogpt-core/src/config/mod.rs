mod env;
mod types;

#[cfg(test)]
mod tests;

pub use types::*;

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, bail};
use repogpt_index::filter::PathFilter;
use repogpt_index::indexer::IndexerConfig;

impl Config {
    /// Load configuration from a TOML file with env var overrides.
    ///
    /// Falls back to defaults when the file does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path).context("failed to read config file")?;
            toml::from_str::<Self>(&content).context("failed to parse config file")?
        } else {
            tracing::debug!(path = %path.display(), "config file not found, using defaults");
            Self::default()
        };

        config.apply_env_overrides();
        Ok(config)
    }

    /// Check tunables and required credentials before anything connects.
    ///
    /// # Errors
    ///
    /// Returns an error naming the first invalid or missing setting.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.ingest.batch_size == 0 {
            bail!("ingest.batch_size must be at least 1");
        }
        if !(0.0..1.0).contains(&self.retrieval.similarity_threshold) {
            bail!("retrieval.similarity_threshold must be in [0, 1)");
        }
        if self.retrieval.max_matches == 0 {
            bail!("retrieval.max_matches must be at least 1");
        }
        if self.embedding.dimension == 0 {
            bail!("embedding.dimension must be at least 1");
        }
        if self.answer.timeout_secs == 0 {
            bail!("answer.timeout_secs must be at least 1");
        }
        if self.database.url.trim().is_empty() {
            bail!("database.url is not set (or DATABASE_URL)");
        }

        if self.secrets.workers_ai_token.is_none() {
            bail!("REPOGPT_WORKERS_AI_TOKEN is required for the completion model");
        }
        if self.llm.account_id.trim().is_empty() && self.llm.base_url.is_none() {
            bail!("llm.account_id is required unless llm.base_url is set");
        }
        if self.embedding.model.trim().is_empty() {
            bail!("embedding.model must not be empty");
        }
        match self.embedding.provider {
            EmbeddingProviderKind::Gemini if self.secrets.gemini_api_key.is_none() => {
                bail!("REPOGPT_GEMINI_API_KEY is required for gemini embeddings");
            }
            _ => {}
        }
        Ok(())
    }

    #[must_use]
    pub fn indexer_config(&self) -> IndexerConfig {
        IndexerConfig {
            batch_size: self.ingest.batch_size,
            batch_delay: Duration::from_millis(self.ingest.batch_delay_ms),
            filter: PathFilter::default().extend(
                self.ingest.extra_excluded_folders.iter().cloned(),
                &self.ingest.extra_excluded_suffixes,
            ),
        }
    }

    #[must_use]
    pub fn retrieval_config(&self) -> repogpt_index::retriever::RetrievalConfig {
        repogpt_index::retriever::RetrievalConfig {
            similarity_threshold: self.retrieval.similarity_threshold,
            max_matches: self.retrieval.max_matches,
        }
    }

    #[must_use]
    pub fn answer_timeout(&self) -> Duration {
        Duration::from_secs(self.answer.timeout_secs)
    }
}

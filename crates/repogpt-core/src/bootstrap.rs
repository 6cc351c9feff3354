//! Startup wiring: config path resolution and component assembly.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use repogpt_index::answer::AnswerStreamer;
use repogpt_index::assistant::RepoAssistant;
use repogpt_index::embed::Embedder;
use repogpt_index::indexer::RepoIndexer;
use repogpt_index::pg_store::{PgEmbeddingStore, PgStoreOptions};
use repogpt_index::retriever::Retriever;
use repogpt_index::source::{GithubClient, SourceHost};
use repogpt_index::store::EmbeddingStore;
use repogpt_index::summarize::Summarizer;
use repogpt_llm::any::AnyProvider;
use repogpt_llm::gemini::GeminiProvider;
use repogpt_llm::workers_ai::WorkersAiProvider;

use crate::config::{Config, EmbeddingProviderKind};

/// `REPOGPT_CONFIG`, then `config/default.toml`. A `--config` flag is the
/// caller's to parse and takes precedence over this.
#[must_use]
pub fn resolve_config_path() -> PathBuf {
    resolve_config_path_from(std::env::var("REPOGPT_CONFIG").ok())
}

fn resolve_config_path_from(env: Option<String>) -> PathBuf {
    env.filter(|path| !path.trim().is_empty())
        .map_or_else(|| PathBuf::from("config/default.toml"), PathBuf::from)
}

/// Chat model used for summaries and answers.
///
/// # Errors
///
/// Returns an error if the Workers AI token is not configured.
pub fn create_completion_provider(config: &Config) -> anyhow::Result<AnyProvider> {
    let token = config
        .secrets
        .workers_ai_token
        .as_ref()
        .context("REPOGPT_WORKERS_AI_TOKEN not found")?;
    let mut provider = WorkersAiProvider::new(
        &config.llm.account_id,
        token.expose().to_owned(),
        config.llm.model.clone(),
        None,
    );
    if let Some(base_url) = &config.llm.base_url {
        provider = provider.with_base_url(base_url.clone());
    }
    Ok(AnyProvider::WorkersAi(provider))
}

/// Embedding model shared by ingestion and retrieval.
///
/// # Errors
///
/// Returns an error if the selected provider has no credential configured.
pub fn create_embedding_provider(config: &Config) -> anyhow::Result<AnyProvider> {
    match config.embedding.provider {
        EmbeddingProviderKind::Gemini => {
            let key = config
                .secrets
                .gemini_api_key
                .as_ref()
                .context("REPOGPT_GEMINI_API_KEY not found")?;
            let mut provider =
                GeminiProvider::new(key.expose().to_owned(), config.embedding.model.clone());
            if let Some(base_url) = &config.embedding.base_url {
                provider = provider.with_base_url(base_url.clone());
            }
            Ok(AnyProvider::Gemini(provider))
        }
        EmbeddingProviderKind::WorkersAi => {
            let token = config
                .secrets
                .workers_ai_token
                .as_ref()
                .context("REPOGPT_WORKERS_AI_TOKEN not found")?;
            let mut provider = WorkersAiProvider::new(
                &config.llm.account_id,
                token.expose().to_owned(),
                config.llm.model.clone(),
                Some(config.embedding.model.clone()),
            );
            if let Some(base_url) = config
                .embedding
                .base_url
                .as_ref()
                .or(config.llm.base_url.as_ref())
            {
                provider = provider.with_base_url(base_url.clone());
            }
            Ok(AnyProvider::WorkersAi(provider))
        }
    }
}

#[must_use]
pub fn store_options(config: &Config) -> PgStoreOptions {
    PgStoreOptions {
        max_connections: config.database.max_connections,
        acquire_timeout: Duration::from_secs(config.database.acquire_timeout_secs),
        transaction_timeout: Duration::from_secs(config.database.transaction_timeout_secs),
    }
}

/// Connect to Postgres and make sure the embeddings table exists.
///
/// # Errors
///
/// Returns an error if the pool cannot connect or the schema does not match
/// the configured dimension.
pub async fn build_store(config: &Config) -> anyhow::Result<PgEmbeddingStore> {
    let store = PgEmbeddingStore::connect(
        &config.database.url,
        config.embedding.dimension,
        &store_options(config),
    )
    .await
    .context("failed to connect to the embeddings database")?;
    store
        .ensure_schema()
        .await
        .context("failed to prepare the embeddings table")?;
    tracing::info!(dimension = config.embedding.dimension, "embedding store ready");
    Ok(store)
}

/// Wire the indexer, retriever and answer streamer around shared handles.
#[must_use]
pub fn assemble_assistant(
    config: &Config,
    source: Arc<dyn SourceHost>,
    store: Arc<dyn EmbeddingStore>,
    completion: AnyProvider,
    embedding: AnyProvider,
) -> RepoAssistant<AnyProvider> {
    let completion = Arc::new(completion);
    let embedder = Embedder::new(Arc::new(embedding));

    let indexer = RepoIndexer::new(
        source,
        Arc::clone(&store),
        Summarizer::new(Arc::clone(&completion)),
        embedder.clone(),
        config.indexer_config(),
    );
    let retriever = Retriever::new(store, embedder, config.retrieval_config());
    let answers = AnswerStreamer::new(completion).with_timeout(config.answer_timeout());

    RepoAssistant::new(indexer, retriever, answers)
}

/// Build every runtime component from a validated config.
///
/// # Errors
///
/// Returns an error if a provider lacks credentials or the store is unreachable.
pub async fn build_assistant(config: &Config) -> anyhow::Result<Arc<RepoAssistant<AnyProvider>>> {
    let completion = create_completion_provider(config)?;
    let embedding = create_embedding_provider(config)?;
    tracing::info!(
        model = %config.llm.model,
        embedding_provider = config.embedding.provider.as_str(),
        embedding_model = %config.embedding.model,
        "providers configured"
    );

    let store = build_store(config).await?;
    let source = GithubClient::new().with_api_base(config.source.api_base.clone());

    Ok(Arc::new(assemble_assistant(
        config,
        Arc::new(source),
        Arc::new(store),
        completion,
        embedding,
    )))
}

use serde::{Deserialize, Serialize};

use crate::secret::Secret;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub source: SourceConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub ingest: IngestConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub answer: AnswerConfig,
    #[serde(default)]
    pub gateway: GatewayConfig,
    /// Populated from the environment only, never from the file.
    #[serde(skip)]
    pub secrets: ResolvedSecrets,
}

#[derive(Debug, Clone, Default)]
pub struct ResolvedSecrets {
    pub workers_ai_token: Option<Secret>,
    pub gemini_api_key: Option<Secret>,
    pub github_token: Option<Secret>,
    pub gateway_token: Option<Secret>,
}

/// Completion model used for summaries and answers.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LlmConfig {
    #[serde(default)]
    pub account_id: String,
    /// Overrides the `accounts/{account_id}/ai/run` root when set.
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default = "default_llm_model")]
    pub model: String,
}

fn default_llm_model() -> String {
    "@cf/meta/llama-3-8b-instruct".into()
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            account_id: String::new(),
            base_url: None,
            model: default_llm_model(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum EmbeddingProviderKind {
    #[default]
    Gemini,
    WorkersAi,
}

impl EmbeddingProviderKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Gemini => "gemini",
            Self::WorkersAi => "workers-ai",
        }
    }

    /// Accepts the same spellings as the TOML `provider` key.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim() {
            "gemini" => Some(Self::Gemini),
            "workers-ai" => Some(Self::WorkersAi),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EmbeddingConfig {
    #[serde(default)]
    pub provider: EmbeddingProviderKind,
    #[serde(default = "default_embedding_model")]
    pub model: String,
    #[serde(default)]
    pub base_url: Option<String>,
    /// Vector width of the model; must match the `embedding` column.
    #[serde(default = "default_dimension")]
    pub dimension: usize,
}

fn default_embedding_model() -> String {
    "text-embedding-004".into()
}

fn default_dimension() -> usize {
    768
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: EmbeddingProviderKind::default(),
            model: default_embedding_model(),
            base_url: None,
            dimension: default_dimension(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SourceConfig {
    #[serde(default = "default_source_api_base")]
    pub api_base: String,
}

fn default_source_api_base() -> String {
    "https://api.github.com".into()
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            api_base: default_source_api_base(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    #[serde(default)]
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    #[serde(default = "default_acquire_timeout_secs")]
    pub acquire_timeout_secs: u64,
    #[serde(default = "default_transaction_timeout_secs")]
    pub transaction_timeout_secs: u64,
}

fn default_max_connections() -> u32 {
    10
}

fn default_acquire_timeout_secs() -> u64 {
    20
}

fn default_transaction_timeout_secs() -> u64 {
    30
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            max_connections: default_max_connections(),
            acquire_timeout_secs: default_acquire_timeout_secs(),
            transaction_timeout_secs: default_transaction_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct IngestConfig {
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_batch_delay_ms")]
    pub batch_delay_ms: u64,
    /// Added to the built-in folder deny-list.
    #[serde(default)]
    pub extra_excluded_folders: Vec<String>,
    /// Added to the built-in suffix deny-list.
    #[serde(default)]
    pub extra_excluded_suffixes: Vec<String>,
}

fn default_batch_size() -> usize {
    repogpt_index::indexer::DEFAULT_BATCH_SIZE
}

fn default_batch_delay_ms() -> u64 {
    1000
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            batch_delay_ms: default_batch_delay_ms(),
            extra_excluded_folders: Vec::new(),
            extra_excluded_suffixes: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RetrievalConfig {
    #[serde(default = "default_similarity_threshold")]
    pub similarity_threshold: f32,
    #[serde(default = "default_max_matches")]
    pub max_matches: usize,
}

fn default_similarity_threshold() -> f32 {
    repogpt_index::retriever::DEFAULT_SIMILARITY_THRESHOLD
}

fn default_max_matches() -> usize {
    repogpt_index::retriever::DEFAULT_MATCH_LIMIT
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            similarity_threshold: default_similarity_threshold(),
            max_matches: default_max_matches(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AnswerConfig {
    #[serde(default = "default_answer_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_answer_timeout_secs() -> u64 {
    30
}

impl Default for AnswerConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_answer_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GatewayConfig {
    #[serde(default = "default_gateway_bind")]
    pub bind: String,
    #[serde(default = "default_gateway_port")]
    pub port: u16,
    #[serde(default = "default_gateway_rate_limit")]
    pub rate_limit: u32,
    #[serde(default = "default_gateway_max_body")]
    pub max_body_size: usize,
}

fn default_gateway_bind() -> String {
    "127.0.0.1".into()
}

fn default_gateway_port() -> u16 {
    3000
}

fn default_gateway_rate_limit() -> u32 {
    60
}

fn default_gateway_max_body() -> usize {
    65_536
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            bind: default_gateway_bind(),
            port: default_gateway_port(),
            rate_limit: default_gateway_rate_limit(),
            max_body_size: default_gateway_max_body(),
        }
    }
}

use super::{Config, EmbeddingProviderKind};
use crate::secret::Secret;

impl Config {
    pub(crate) fn apply_env_overrides(&mut self) {
        self.apply_env_overrides_core();
        self.apply_env_overrides_tuning();
        self.apply_env_secrets();
    }

    fn apply_env_overrides_core(&mut self) {
        if let Ok(v) = std::env::var("REPOGPT_LLM_ACCOUNT_ID") {
            self.llm.account_id = v;
        }
        if let Ok(v) = std::env::var("REPOGPT_LLM_BASE_URL") {
            self.llm.base_url = Some(v);
        }
        if let Ok(v) = std::env::var("REPOGPT_LLM_MODEL") {
            self.llm.model = v;
        }
        if let Ok(v) = std::env::var("REPOGPT_EMBEDDING_PROVIDER") {
            if let Some(kind) = EmbeddingProviderKind::parse(&v) {
                self.embedding.provider = kind;
            } else {
                tracing::warn!("ignoring invalid REPOGPT_EMBEDDING_PROVIDER value: {v}");
            }
        }
        if let Ok(v) = std::env::var("REPOGPT_EMBEDDING_MODEL") {
            self.embedding.model = v;
        }
        if let Ok(v) = std::env::var("REPOGPT_EMBEDDING_BASE_URL") {
            self.embedding.base_url = Some(v);
        }
        if let Ok(v) = std::env::var("REPOGPT_VECTOR_DIM")
            && let Ok(dim) = v.parse::<usize>()
        {
            self.embedding.dimension = dim;
        }
        if let Ok(v) = std::env::var("REPOGPT_SOURCE_API_BASE") {
            self.source.api_base = v;
        }
        if let Ok(v) = std::env::var("DATABASE_URL") {
            self.database.url = v;
        }
        if let Ok(v) = std::env::var("REPOGPT_GATEWAY_BIND") {
            self.gateway.bind = v;
        }
        if let Ok(v) = std::env::var("REPOGPT_GATEWAY_PORT")
            && let Ok(port) = v.parse::<u16>()
        {
            self.gateway.port = port;
        }
        if let Ok(v) = std::env::var("REPOGPT_GATEWAY_RATE_LIMIT")
            && let Ok(limit) = v.parse::<u32>()
        {
            self.gateway.rate_limit = limit;
        }
        if let Ok(v) = std::env::var("REPOGPT_GATEWAY_MAX_BODY_SIZE")
            && let Ok(size) = v.parse::<usize>()
        {
            self.gateway.max_body_size = size;
        }
    }

    fn apply_env_overrides_tuning(&mut self) {
        if let Ok(v) = std::env::var("REPOGPT_BATCH_SIZE")
            && let Ok(n) = v.parse::<usize>()
        {
            self.ingest.batch_size = n;
        }
        if let Ok(v) = std::env::var("REPOGPT_BATCH_DELAY_MS")
            && let Ok(ms) = v.parse::<u64>()
        {
            self.ingest.batch_delay_ms = ms;
        }
        if let Ok(v) = std::env::var("REPOGPT_SIMILARITY_THRESHOLD")
            && let Ok(t) = v.parse::<f32>()
        {
            self.retrieval.similarity_threshold = t;
        }
        if let Ok(v) = std::env::var("REPOGPT_MAX_MATCHES")
            && let Ok(n) = v.parse::<usize>()
        {
            self.retrieval.max_matches = n;
        }
        if let Ok(v) = std::env::var("REPOGPT_ANSWER_TIMEOUT_SECS")
            && let Ok(secs) = v.parse::<u64>()
        {
            self.answer.timeout_secs = secs;
        }
    }

    fn apply_env_secrets(&mut self) {
        if let Ok(v) = std::env::var("REPOGPT_WORKERS_AI_TOKEN") {
            self.secrets.workers_ai_token = Secret::non_empty(v);
        }
        if let Ok(v) = std::env::var("REPOGPT_GEMINI_API_KEY") {
            self.secrets.gemini_api_key = Secret::non_empty(v);
        }
        if let Ok(v) = std::env::var("REPOGPT_GITHUB_TOKEN") {
            self.secrets.github_token = Secret::non_empty(v);
        }
        if let Ok(v) = std::env::var("REPOGPT_GATEWAY_TOKEN") {
            self.secrets.gateway_token = Secret::non_empty(v);
        }
    }
}

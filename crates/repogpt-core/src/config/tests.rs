use std::io::Write;

use serial_test::serial;

use super::*;
use crate::secret::Secret;

const ENV_KEYS: [&str; 24] = [
    "REPOGPT_LLM_ACCOUNT_ID",
    "REPOGPT_LLM_BASE_URL",
    "REPOGPT_LLM_MODEL",
    "REPOGPT_EMBEDDING_PROVIDER",
    "REPOGPT_EMBEDDING_MODEL",
    "REPOGPT_EMBEDDING_BASE_URL",
    "REPOGPT_VECTOR_DIM",
    "REPOGPT_SOURCE_API_BASE",
    "DATABASE_URL",
    "REPOGPT_GATEWAY_BIND",
    "REPOGPT_GATEWAY_PORT",
    "REPOGPT_GATEWAY_RATE_LIMIT",
    "REPOGPT_GATEWAY_MAX_BODY_SIZE",
    "REPOGPT_BATCH_SIZE",
    "REPOGPT_BATCH_DELAY_MS",
    "REPOGPT_SIMILARITY_THRESHOLD",
    "REPOGPT_MAX_MATCHES",
    "REPOGPT_ANSWER_TIMEOUT_SECS",
    "REPOGPT_WORKERS_AI_TOKEN",
    "REPOGPT_GEMINI_API_KEY",
    "REPOGPT_GITHUB_TOKEN",
    "REPOGPT_GATEWAY_TOKEN",
    "REPOGPT_CONFIG",
    "REPOGPT_LOG",
];

fn clear_env() {
    for key in ENV_KEYS {
        unsafe { std::env::remove_var(key) };
    }
}

fn valid_config() -> Config {
    let mut config = Config::default();
    config.llm.account_id = "acct".into();
    config.database.url = "postgres://localhost/repogpt".into();
    config.secrets.workers_ai_token = Secret::non_empty("cf-token");
    config.secrets.gemini_api_key = Secret::non_empty("gm-key");
    config
}


#[test]
fn defaults_when_file_missing() {
    let config = Config::default();
    assert_eq!(config.llm.model, "@cf/meta/llama-3-8b-instruct");
    assert_eq!(config.embedding.provider, EmbeddingProviderKind::Gemini);
    assert_eq!(config.embedding.model, "text-embedding-004");
    assert_eq!(config.embedding.dimension, 768);
    assert_eq!(config.source.api_base, "https://api.github.com");
    assert_eq!(config.ingest.batch_size, 5);
    assert_eq!(config.ingest.batch_delay_ms, 1000);
    assert!((config.retrieval.similarity_threshold - 0.5).abs() < f32::EPSILON);
    assert_eq!(config.retrieval.max_matches, 10);
    assert_eq!(config.answer.timeout_secs, 30);
    assert_eq!(config.gateway.port, 3000);
    assert!(config.secrets.github_token.is_none());
}

#[test]
#[serial]
fn load_missing_file_uses_defaults() {
    clear_env();
    let dir = tempfile::tempdir().unwrap();
    let config = Config::load(&dir.path().join("absent.toml")).unwrap();
    assert_eq!(config.ingest.batch_size, 5);
    assert_eq!(config.gateway.bind, "127.0.0.1");
}

#[test]
#[serial]
fn parse_valid_toml() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("test.toml");
    let mut f = std::fs::File::create(&path).unwrap();
    write!(
        f,
        r#"
[llm]
account_id = "abc123"
model = "@cf/meta/llama-3.1-8b-instruct"

[embedding]
provider = "workers-ai"
model = "@cf/baai/bge-base-en-v1.5"
dimension = 768

[database]
url = "postgres://db/repogpt"

[ingest]
batch_size = 3
batch_delay_ms = 250
extra_excluded_folders = ["fixtures"]
extra_excluded_suffixes = ["*.snap"]

[retrieval]
similarity_threshold = 0.6
max_matches = 4
"#
    )
    .unwrap();

    clear_env();

    let config = Config::load(&path).unwrap();
    assert_eq!(config.llm.account_id, "abc123");
    assert_eq!(config.embedding.provider, EmbeddingProviderKind::WorkersAi);
    assert_eq!(config.database.url, "postgres://db/repogpt");
    assert_eq!(config.ingest.batch_size, 3);
    assert_eq!(config.retrieval.max_matches, 4);
    assert_eq!(config.answer.timeout_secs, 30);

    let indexer = config.indexer_config();
    assert_eq!(indexer.batch_size, 3);
    assert_eq!(indexer.batch_delay, Duration::from_millis(250));
    assert!(!indexer.filter.is_included("fixtures/a.rs"));
    assert!(!indexer.filter.is_included("src/a.SNAP"));
    assert!(!indexer.filter.is_included("node_modules/x.js"));
    assert!(indexer.filter.is_included("src/a.rs"));
}

#[test]
#[serial]
fn invalid_toml_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bad.toml");
    std::fs::write(&path, "[ingest\nbatch_size = ").unwrap();
    clear_env();
    assert!(Config::load(&path).is_err());
}

#[test]
#[serial]
fn env_overrides() {
    clear_env();
    let mut config = Config::default();
    unsafe {
        std::env::set_var("REPOGPT_LLM_ACCOUNT_ID", "env-acct");
        std::env::set_var("REPOGPT_EMBEDDING_PROVIDER", "workers-ai");
        std::env::set_var("DATABASE_URL", "postgres://env/db");
        std::env::set_var("REPOGPT_BATCH_SIZE", "8");
        std::env::set_var("REPOGPT_SIMILARITY_THRESHOLD", "0.75");
        std::env::set_var("REPOGPT_GATEWAY_PORT", "8080");
    };
    config.apply_env_overrides();
    clear_env();

    assert_eq!(config.llm.account_id, "env-acct");
    assert_eq!(config.embedding.provider, EmbeddingProviderKind::WorkersAi);
    assert_eq!(config.database.url, "postgres://env/db");
    assert_eq!(config.ingest.batch_size, 8);
    assert!((config.retrieval.similarity_threshold - 0.75).abs() < f32::EPSILON);
    assert_eq!(config.gateway.port, 8080);
}

#[test]
#[serial]
fn env_override_invalid_values_ignored() {
    clear_env();
    let mut config = Config::default();
    unsafe {
        std::env::set_var("REPOGPT_BATCH_SIZE", "lots");
        std::env::set_var("REPOGPT_EMBEDDING_PROVIDER", "openai");
        std::env::set_var("REPOGPT_ANSWER_TIMEOUT_SECS", "-1");
    };
    config.apply_env_overrides();
    clear_env();

    assert_eq!(config.ingest.batch_size, 5);
    assert_eq!(config.embedding.provider, EmbeddingProviderKind::Gemini);
    assert_eq!(config.answer.timeout_secs, 30);
}

#[test]
#[serial]
fn secrets_come_from_env_only() {
    clear_env();
    unsafe {
        std::env::set_var("REPOGPT_WORKERS_AI_TOKEN", "cf");
        std::env::set_var("REPOGPT_GITHUB_TOKEN", "   ");
        std::env::set_var("REPOGPT_GATEWAY_TOKEN", "gw");
    };
    let mut config = Config::default();
    config.apply_env_overrides();
    clear_env();

    assert_eq!(
        config.secrets.workers_ai_token.as_ref().map(Secret::expose),
        Some("cf")
    );
    assert!(config.secrets.github_token.is_none());
    assert!(config.secrets.gemini_api_key.is_none());
    assert_eq!(
        config.secrets.gateway_token.as_ref().map(Secret::expose),
        Some("gw")
    );
}

#[test]
fn validate_accepts_complete_config() {
    valid_config().validate().unwrap();
}

#[test]
fn validate_rejects_zero_batch_size() {
    let mut config = valid_config();
    config.ingest.batch_size = 0;
    let err = config.validate().unwrap_err();
    assert!(err.to_string().contains("batch_size"));
}

#[test]
fn validate_rejects_threshold_out_of_range() {
    let mut config = valid_config();
    config.retrieval.similarity_threshold = 1.0;
    assert!(config.validate().is_err());
    config.retrieval.similarity_threshold = -0.1;
    assert!(config.validate().is_err());
}

#[test]
fn validate_requires_database_url() {
    let mut config = valid_config();
    config.database.url = "  ".into();
    let err = config.validate().unwrap_err();
    assert!(err.to_string().contains("database.url"));
}

#[test]
fn validate_requires_completion_credentials() {
    let mut config = valid_config();
    config.secrets.workers_ai_token = None;
    assert!(config.validate().is_err());

    let mut config = valid_config();
    config.llm.account_id.clear();
    assert!(config.validate().is_err());
    config.llm.base_url = Some("http://localhost:8787".into());
    config.validate().unwrap();
}

#[test]
fn validate_gemini_needs_api_key() {
    let mut config = valid_config();
    config.secrets.gemini_api_key = None;
    let err = config.validate().unwrap_err();
    assert!(err.to_string().contains("GEMINI"));

    config.embedding.provider = EmbeddingProviderKind::WorkersAi;
    config.validate().unwrap();
}

#[test]
fn derived_runtime_settings() {
    let mut config = valid_config();
    config.answer.timeout_secs = 12;
    config.retrieval.max_matches = 3;
    assert_eq!(config.answer_timeout(), Duration::from_secs(12));
    assert_eq!(config.retrieval_config().max_matches, 3);
}

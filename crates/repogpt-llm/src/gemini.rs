use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::LlmError;
use crate::provider::{ChatStream, LlmProvider, Message};

const PROVIDER: &str = "gemini";
const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Gemini `embedContent` client. Completion requests are not routed here.
#[derive(Clone)]
pub struct GeminiProvider {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    embedding_model: String,
}

impl fmt::Debug for GeminiProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GeminiProvider")
            .field("client", &"<reqwest::Client>")
            .field("api_key", &"<redacted>")
            .field("base_url", &self.base_url)
            .field("embedding_model", &self.embedding_model)
            .finish()
    }
}

impl GeminiProvider {
    #[must_use]
    pub fn new(api_key: String, embedding_model: String) -> Self {
        Self {
            client: crate::http::default_client(),
            api_key,
            base_url: DEFAULT_BASE_URL.into(),
            embedding_model,
        }
    }

    #[must_use]
    pub fn with_base_url(mut self, mut base_url: String) -> Self {
        while base_url.ends_with('/') {
            base_url.pop();
        }
        self.base_url = base_url;
        self
    }

    fn model_path(&self) -> String {
        if self.embedding_model.starts_with("models/") {
            self.embedding_model.clone()
        } else {
            format!("models/{}", self.embedding_model)
        }
    }
}

impl LlmProvider for GeminiProvider {
    async fn chat(&self, _messages: &[Message]) -> Result<String, LlmError> {
        Err(LlmError::ChatUnsupported { provider: PROVIDER })
    }

    async fn chat_stream(&self, _messages: &[Message]) -> Result<ChatStream, LlmError> {
        Err(LlmError::ChatUnsupported { provider: PROVIDER })
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, LlmError> {
        if self.api_key.trim().is_empty() {
            return Err(LlmError::MissingCredential {
                provider: PROVIDER,
                what: "api key",
            });
        }

        let model = self.model_path();
        let body = EmbedContentRequest {
            model: &model,
            content: Content {
                parts: [Part { text }],
            },
        };

        let response = self
            .client
            .post(format!("{}/{model}:embedContent", self.base_url))
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            tracing::error!("Gemini embedding API error {status}: {text}");
            return Err(LlmError::Api {
                provider: PROVIDER,
                status: status.as_u16(),
            });
        }

        let resp: EmbedContentResponse = serde_json::from_str(&text)?;
        resp.embedding
            .map(|e| e.values)
            .filter(|v| !v.is_empty())
            .ok_or(LlmError::EmptyResponse { provider: PROVIDER })
    }

    fn supports_embeddings(&self) -> bool {
        true
    }

    #[allow(clippy::unnecessary_literal_bound)]
    fn name(&self) -> &str {
        PROVIDER
    }
}

#[derive(Serialize)]
struct EmbedContentRequest<'a> {
    model: &'a str,
    content: Content<'a>,
}

#[derive(Serialize)]
struct Content<'a> {
    parts: [Part<'a>; 1],
}

#[derive(Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Deserialize)]
struct EmbedContentResponse {
    #[serde(default)]
    embedding: Option<ContentEmbedding>,
}

#[derive(Deserialize)]
struct ContentEmbedding {
    values: Vec<f32>,
}

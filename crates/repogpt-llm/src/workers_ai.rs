use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::LlmError;
use crate::provider::{ChatStream, LlmProvider, Message};
use crate::stream::decode_frames;

const PROVIDER: &str = "workers-ai";
const API_ROOT: &str = "https://api.cloudflare.com/client/v4/accounts";

/// Cloudflare Workers AI `ai/run/{model}` client.
#[derive(Clone)]
pub struct WorkersAiProvider {
    client: reqwest::Client,
    api_token: String,
    base_url: String,
    model: String,
    embedding_model: Option<String>,
}

impl fmt::Debug for WorkersAiProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkersAiProvider")
            .field("client", &"<reqwest::Client>")
            .field("api_token", &"<redacted>")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("embedding_model", &self.embedding_model)
            .finish()
    }
}

impl WorkersAiProvider {
    #[must_use]
    pub fn new(
        account_id: &str,
        api_token: String,
        model: String,
        embedding_model: Option<String>,
    ) -> Self {
        Self {
            client: crate::http::default_client(),
            api_token,
            base_url: format!("{API_ROOT}/{account_id}/ai/run"),
            model,
            embedding_model,
        }
    }

    /// Point the provider at a different `ai/run` root.
    #[must_use]
    pub fn with_base_url(mut self, mut base_url: String) -> Self {
        while base_url.ends_with('/') {
            base_url.pop();
        }
        self.base_url = base_url;
        self
    }

    #[must_use]
    pub fn with_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }

    fn require_token(&self) -> Result<(), LlmError> {
        if self.api_token.trim().is_empty() {
            return Err(LlmError::MissingCredential {
                provider: PROVIDER,
                what: "api token",
            });
        }
        Ok(())
    }

    async fn post<T: Serialize + ?Sized>(
        &self,
        model: &str,
        body: &T,
    ) -> Result<reqwest::Response, LlmError> {
        self.require_token()?;

        let response = self
            .client
            .post(format!("{}/{model}", self.base_url))
            .bearer_auth(&self.api_token)
            .json(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            tracing::error!("Workers AI error {status} for {model}: {text}");
            return Err(LlmError::Api {
                provider: PROVIDER,
                status: status.as_u16(),
            });
        }

        Ok(response)
    }
}

impl LlmProvider for WorkersAiProvider {
    async fn chat(&self, messages: &[Message]) -> Result<String, LlmError> {
        let body = ChatRequest {
            messages,
            stream: false,
        };
        let response = self.post(&self.model, &body).await?;
        let text = response.text().await?;
        if text.trim().is_empty() {
            return Err(LlmError::EmptyResponse { provider: PROVIDER });
        }

        // a 2xx body without the `result.response` envelope carries no usable text
        let envelope = match serde_json::from_str::<ChatEnvelope>(&text) {
            Ok(envelope) => envelope,
            Err(e) => {
                tracing::warn!("Workers AI returned an unexpected chat body: {e}");
                return Err(LlmError::EmptyResponse { provider: PROVIDER });
            }
        };

        envelope
            .result
            .and_then(|r| r.response)
            .filter(|s| !s.trim().is_empty())
            .ok_or(LlmError::EmptyResponse { provider: PROVIDER })
    }

    async fn chat_stream(&self, messages: &[Message]) -> Result<ChatStream, LlmError> {
        let body = ChatRequest {
            messages,
            stream: true,
        };
        let response = self.post(&self.model, &body).await?;
        Ok(decode_frames(Box::pin(response.bytes_stream())))
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, LlmError> {
        let model = self
            .embedding_model
            .as_deref()
            .ok_or(LlmError::EmbedUnsupported { provider: PROVIDER })?;

        let body = EmbeddingRequest { text: [text] };
        let response = self.post(model, &body).await?;
        let text = response.text().await?;
        let envelope: EmbeddingEnvelope = serde_json::from_str(&text)?;

        envelope
            .result
            .and_then(|r| r.data.into_iter().next())
            .filter(|v| !v.is_empty())
            .ok_or(LlmError::EmptyResponse { provider: PROVIDER })
    }

    fn supports_embeddings(&self) -> bool {
        self.embedding_model.is_some()
    }

    #[allow(clippy::unnecessary_literal_bound)]
    fn name(&self) -> &str {
        PROVIDER
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    messages: &'a [Message],
    stream: bool,
}

#[derive(Deserialize)]
struct ChatEnvelope {
    #[serde(default)]
    result: Option<ChatResult>,
}

#[derive(Deserialize)]
struct ChatResult {
    #[serde(default)]
    response: Option<String>,
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    text: [&'a str; 1],
}

#[derive(Deserialize)]
struct EmbeddingEnvelope {
    #[serde(default)]
    result: Option<EmbeddingResult>,
}

#[derive(Deserialize)]
struct EmbeddingResult {
    #[serde(default)]
    data: Vec<Vec<f32>>,
}

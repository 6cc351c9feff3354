//! Test-only mock provider.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::error::LlmError;
use crate::provider::{ChatStream, LlmProvider, Message};
use crate::stream::decode_frames;

#[derive(Debug, Clone)]
pub struct MockProvider {
    responses: Arc<Mutex<Vec<String>>>,
    embeddings: Arc<Mutex<HashMap<String, Vec<f32>>>>,
    chat_calls: Arc<AtomicUsize>,
    embed_calls: Arc<AtomicUsize>,
    pub default_response: String,
    pub default_embedding: Vec<f32>,
    pub fail_chat: bool,
    pub empty_chat: bool,
    pub missing_credential: bool,
    /// Embedding requests whose text contains this marker fail.
    pub fail_embed_containing: Option<String>,
    /// Raw upstream chunks replayed through the frame decoder by `chat_stream`.
    pub stream_chunks: Vec<Vec<u8>>,
    /// When set, `chat_stream` never produces its first frame.
    pub stall_stream: bool,
    /// Milliseconds to sleep before returning a response.
    pub delay_ms: u64,
}

impl Default for MockProvider {
    fn default() -> Self {
        Self {
            responses: Arc::new(Mutex::new(Vec::new())),
            embeddings: Arc::new(Mutex::new(HashMap::new())),
            chat_calls: Arc::new(AtomicUsize::new(0)),
            embed_calls: Arc::new(AtomicUsize::new(0)),
            default_response: "mock response".into(),
            default_embedding: vec![0.0; 8],
            fail_chat: false,
            empty_chat: false,
            missing_credential: false,
            fail_embed_containing: None,
            stream_chunks: Vec::new(),
            stall_stream: false,
            delay_ms: 0,
        }
    }
}

impl MockProvider {
    #[must_use]
    pub fn with_responses(responses: Vec<String>) -> Self {
        Self {
            responses: Arc::new(Mutex::new(responses)),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn failing() -> Self {
        Self {
            fail_chat: true,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_embedding(self, text: impl Into<String>, vector: Vec<f32>) -> Self {
        if let Ok(mut map) = self.embeddings.lock() {
            map.insert(text.into(), vector);
        }
        self
    }

    #[must_use]
    pub fn with_default_embedding(mut self, vector: Vec<f32>) -> Self {
        self.default_embedding = vector;
        self
    }

    #[must_use]
    pub fn with_stream_chunks(mut self, chunks: Vec<Vec<u8>>) -> Self {
        self.stream_chunks = chunks;
        self
    }

    /// `chat` succeeds with no usable text.
    #[must_use]
    pub fn with_empty_chat(mut self) -> Self {
        self.empty_chat = true;
        self
    }

    /// Every call fails as if no API token were configured.
    #[must_use]
    pub fn with_missing_credential(mut self) -> Self {
        self.missing_credential = true;
        self
    }

    /// `chat_stream` never yields its first frame.
    #[must_use]
    pub fn with_stall(mut self) -> Self {
        self.stall_stream = true;
        self
    }

    #[must_use]
    pub fn with_embed_failure(mut self, marker: impl Into<String>) -> Self {
        self.fail_embed_containing = Some(marker.into());
        self
    }

    #[must_use]
    pub fn with_delay(mut self, ms: u64) -> Self {
        self.delay_ms = ms;
        self
    }

    #[must_use]
    pub fn chat_calls(&self) -> usize {
        self.chat_calls.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn embed_calls(&self) -> usize {
        self.embed_calls.load(Ordering::SeqCst)
    }

    fn check_credential(&self) -> Result<(), LlmError> {
        if self.missing_credential {
            return Err(LlmError::MissingCredential {
                provider: "mock",
                what: "api token",
            });
        }
        Ok(())
    }
}

impl LlmProvider for MockProvider {
    async fn chat(&self, _messages: &[Message]) -> Result<String, LlmError> {
        self.check_credential()?;
        self.chat_calls.fetch_add(1, Ordering::SeqCst);
        if self.delay_ms > 0 {
            tokio::time::sleep(Duration::from_millis(self.delay_ms)).await;
        }
        if self.fail_chat {
            return Err(LlmError::Api {
                provider: "mock",
                status: 500,
            });
        }
        if self.empty_chat {
            return Err(LlmError::EmptyResponse { provider: "mock" });
        }
        let mut responses = self
            .responses
            .lock()
            .map_err(|_| LlmError::Other("mock responses lock poisoned".into()))?;
        if responses.is_empty() {
            Ok(self.default_response.clone())
        } else {
            Ok(responses.remove(0))
        }
    }

    async fn chat_stream(&self, _messages: &[Message]) -> Result<ChatStream, LlmError> {
        self.check_credential()?;
        self.chat_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_chat {
            return Err(LlmError::Api {
                provider: "mock",
                status: 500,
            });
        }
        if self.stall_stream {
            return Ok(Box::pin(futures::stream::pending::<Result<String, LlmError>>()));
        }
        let chunks: Vec<Result<Vec<u8>, LlmError>> =
            self.stream_chunks.iter().cloned().map(Ok).collect();
        Ok(decode_frames(futures::stream::iter(chunks)))
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, LlmError> {
        self.check_credential()?;
        self.embed_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(marker) = &self.fail_embed_containing
            && text.contains(marker.as_str())
        {
            return Err(LlmError::Api {
                provider: "mock",
                status: 500,
            });
        }
        let map = self
            .embeddings
            .lock()
            .map_err(|_| LlmError::Other("mock embeddings lock poisoned".into()))?;
        Ok(map
            .get(text)
            .cloned()
            .unwrap_or_else(|| self.default_embedding.clone()))
    }

    fn supports_embeddings(&self) -> bool {
        true
    }

    #[allow(clippy::unnecessary_literal_bound)]
    fn name(&self) -> &str {
        "mock"
    }
}

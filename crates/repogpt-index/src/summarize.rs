//! Per-file natural-language summaries.

use std::sync::Arc;

use repogpt_llm::{LlmError, LlmProvider, Message};

use crate::error::Result;

pub const SUMMARY_SYSTEM_PROMPT: &str = "You are an AI assistant that specializes in generating \
concise summaries. Analyze the provided text and create a clear, informative summary that \
captures the key points while maintaining context and relevance.";

/// Stored in place of a summary when the model returned nothing usable.
pub const SUMMARY_UNAVAILABLE: &str = "Summary unavailable: the model returned an empty response.";

pub struct Summarizer<P> {
    provider: Arc<P>,
}

impl<P: LlmProvider> Summarizer<P> {
    #[must_use]
    pub fn new(provider: Arc<P>) -> Self {
        Self { provider }
    }

    /// Summarize one file's text with a single non-streamed completion.
    ///
    /// An empty model reply degrades to [`SUMMARY_UNAVAILABLE`] instead of failing.
    ///
    /// # Errors
    ///
    /// Returns a configuration error when the provider has no credential, and an
    /// external-service error for transport or upstream failures.
    pub async fn summarize(&self, text: &str) -> Result<String> {
        let messages = [Message::system(SUMMARY_SYSTEM_PROMPT), Message::user(text)];
        match self.provider.chat(&messages).await {
            Ok(summary) => Ok(summary.trim().to_owned()),
            Err(LlmError::EmptyResponse { provider }) => {
                tracing::warn!(provider, "empty summary response, storing placeholder");
                Ok(SUMMARY_UNAVAILABLE.to_owned())
            }
            Err(e) => Err(e.into()),
        }
    }
}

impl<P> Clone for Summarizer<P> {
    fn clone(&self) -> Self {
        Self {
            provider: Arc::clone(&self.provider),
        }
    }
}

#[cfg(test)]
mod tests {
    use repogpt_llm::mock::MockProvider;

    use super::*;
    use crate::error::ErrorKind;

    #[tokio::test]
    async fn returns_trimmed_model_output() {
        let mock = MockProvider::with_responses(vec!["  Parses config files.\n".into()]);
        let s = Summarizer::new(Arc::new(mock));
        assert_eq!(s.summarize("fn parse() {}").await.unwrap(), "Parses config files.");
    }

    #[tokio::test]
    async fn empty_response_degrades_to_placeholder() {
        let mock = MockProvider::default().with_empty_chat();
        let s = Summarizer::new(Arc::new(mock));
        assert_eq!(s.summarize("x").await.unwrap(), SUMMARY_UNAVAILABLE);
    }

    #[tokio::test]
    async fn missing_credential_is_configuration_error() {
        let mock = MockProvider::default().with_missing_credential();
        let s = Summarizer::new(Arc::new(mock.clone()));
        let err = s.summarize("x").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
        assert_eq!(mock.chat_calls(), 0);
    }

    #[tokio::test]
    async fn blank_workers_ai_body_degrades_to_placeholder() {
        use repogpt_llm::workers_ai::WorkersAiProvider;
        use wiremock::matchers::method;
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let provider = WorkersAiProvider::new("acct", "cf".into(), "m".into(), None)
            .with_base_url(server.uri());
        let s = Summarizer::new(Arc::new(provider));
        assert_eq!(s.summarize("fn main() {}").await.unwrap(), SUMMARY_UNAVAILABLE);
    }

    #[tokio::test]
    async fn upstream_failure_propagates() {
        let s = Summarizer::new(Arc::new(MockProvider::failing()));
        let err = s.summarize("x").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ExternalService);
    }
}

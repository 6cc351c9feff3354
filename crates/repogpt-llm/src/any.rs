#[cfg(feature = "mock")]
use crate::mock::MockProvider;
use crate::error::LlmError;
use crate::gemini::GeminiProvider;
use crate::provider::{ChatStream, LlmProvider, Message};
use crate::workers_ai::WorkersAiProvider;

/// Forwards a call to whichever backend the enum holds.
macro_rules! delegate_provider {
    ($self:expr, |$p:ident| $expr:expr) => {
        match $self {
            AnyProvider::WorkersAi($p) => $expr,
            AnyProvider::Gemini($p) => $expr,
            #[cfg(feature = "mock")]
            AnyProvider::Mock($p) => $expr,
        }
    };
}

#[derive(Debug, Clone)]
pub enum AnyProvider {
    WorkersAi(WorkersAiProvider),
    Gemini(GeminiProvider),
    #[cfg(feature = "mock")]
    Mock(MockProvider),
}

impl LlmProvider for AnyProvider {
    async fn chat(&self, messages: &[Message]) -> Result<String, LlmError> {
        delegate_provider!(self, |p| p.chat(messages).await)
    }

    async fn chat_stream(&self, messages: &[Message]) -> Result<ChatStream, LlmError> {
        delegate_provider!(self, |p| p.chat_stream(messages).await)
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, LlmError> {
        delegate_provider!(self, |p| p.embed(text).await)
    }

    fn supports_embeddings(&self) -> bool {
        delegate_provider!(self, |p| p.supports_embeddings())
    }

    fn name(&self) -> &str {
        delegate_provider!(self, |p| p.name())
    }
}

//! Grounded answer generation streamed back as plain text.

use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use futures::{Stream, StreamExt};
use repogpt_llm::stream::with_deadline;
use repogpt_llm::{LlmProvider, Message};

use crate::error::{IndexError, Result};

pub const DEFAULT_ANSWER_TIMEOUT: Duration = Duration::from_secs(30);

/// Answer text chunks in arrival order.
pub type AnswerStream = Pin<Box<dyn Stream<Item = Result<String>> + Send>>;

/// System instructions wrapping the retrieved context block.
#[must_use]
pub fn system_prompt(context: &str) -> String {
    format!(
        "You are an expert software engineer answering questions about a code repository.\n\
         If a request is harmful, hateful, or unrelated to software engineering, reply only with \
         \"Sorry, I can't assist with that.\"\n\
         Keep answers on programming topics, clear and concise, with formatted code examples \
         where useful.\n\
         START CONTEXT BLOCK\n\
         {context}\n\
         END CONTEXT BLOCK\n\
         Base your answer on the context above. If the context does not contain the information \
         needed to answer, say so plainly instead of guessing. If the question is unclear, ask \
         for clarification."
    )
}

pub struct AnswerStreamer<P> {
    provider: Arc<P>,
    timeout: Duration,
}

impl<P: LlmProvider> AnswerStreamer<P> {
    #[must_use]
    pub fn new(provider: Arc<P>) -> Self {
        Self {
            provider,
            timeout: DEFAULT_ANSWER_TIMEOUT,
        }
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    #[must_use]
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Start a streamed completion for `question` grounded in `context`.
    ///
    /// The whole exchange, from request to last chunk, shares one deadline;
    /// exceeding it yields [`IndexError::Timeout`] and ends the stream.
    ///
    /// # Errors
    ///
    /// Fails if the request cannot be started, the upstream rejects it, or the
    /// deadline passes before the response begins.
    pub async fn stream_answer(&self, question: &str, context: &str) -> Result<AnswerStream> {
        let deadline = tokio::time::Instant::now() + self.timeout;
        let messages = [Message::system(system_prompt(context)), Message::user(question)];

        let upstream = tokio::time::timeout_at(deadline, self.provider.chat_stream(&messages))
            .await
            .map_err(|_| IndexError::Timeout(self.timeout))??;

        tracing::debug!(
            provider = self.provider.name(),
            context_bytes = context.len(),
            "answer stream started"
        );
        Ok(Box::pin(
            with_deadline(upstream, deadline, self.timeout).map(|item| item.map_err(Into::into)),
        ))
    }
}

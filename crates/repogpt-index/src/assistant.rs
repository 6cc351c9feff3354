//! Process-scoped bundle of the ingestion and answering components.

use repogpt_llm::LlmProvider;

use crate::answer::{AnswerStream, AnswerStreamer};
use crate::error::{IndexError, Result};
use crate::indexer::RepoIndexer;
use crate::retriever::Retriever;

pub const MAX_QUESTION_CHARS: usize = 2000;

pub struct RepoAssistant<P> {
    indexer: RepoIndexer<P>,
    retriever: Retriever<P>,
    answers: AnswerStreamer<P>,
}

impl<P: LlmProvider> RepoAssistant<P> {
    #[must_use]
    pub fn new(indexer: RepoIndexer<P>, retriever: Retriever<P>, answers: AnswerStreamer<P>) -> Self {
        Self {
            indexer,
            retriever,
            answers,
        }
    }

    #[must_use]
    pub fn indexer(&self) -> &RepoIndexer<P> {
        &self.indexer
    }

    #[must_use]
    pub fn retriever(&self) -> &Retriever<P> {
        &self.retriever
    }

    /// Retrieve context for `question` and stream a grounded answer.
    ///
    /// # Errors
    ///
    /// Returns a validation error for an empty or over-long question, and
    /// otherwise any retrieval or answer start-up failure.
    pub async fn ask(&self, question: &str) -> Result<AnswerStream> {
        validate_question(question)?;
        let context = self.retriever.retrieve(question).await?;
        if context.is_empty() {
            tracing::info!("no indexed content matched the question");
        }
        self.answers.stream_answer(question, &context).await
    }
}

/// # Errors
///
/// Returns [`IndexError::Validation`] unless `question` has 1 to
/// [`MAX_QUESTION_CHARS`] characters after trimming.
pub fn validate_question(question: &str) -> Result<()> {
    let chars = question.trim().chars().count();
    if chars == 0 {
        return Err(IndexError::Validation("user_prompt must not be empty".into()));
    }
    if chars > MAX_QUESTION_CHARS {
        return Err(IndexError::Validation(format!(
            "user_prompt exceeds {MAX_QUESTION_CHARS} characters"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use futures::StreamExt;
    use repogpt_llm::mock::MockProvider;

    use super::*;
    use crate::embed::Embedder;
    use crate::error::ErrorKind;
    use crate::in_memory::InMemoryEmbeddingStore;
    use crate::indexer::IndexerConfig;
    use crate::retriever::RetrievalConfig;
    use crate::source::GithubClient;
    use crate::store::NewRecord;
    use crate::summarize::Summarizer;

    fn assistant(mock: MockProvider, store: Arc<InMemoryEmbeddingStore>) -> RepoAssistant<MockProvider> {
        let provider = Arc::new(mock);
        let indexer = RepoIndexer::new(
            Arc::new(GithubClient::new()),
            store.clone(),
            Summarizer::new(Arc::clone(&provider)),
            Embedder::new(Arc::clone(&provider)),
            IndexerConfig::default(),
        );
        let retriever = Retriever::new(
            store,
            Embedder::new(Arc::clone(&provider)),
            RetrievalConfig::default(),
        );
        RepoAssistant::new(indexer, retriever, AnswerStreamer::new(provider))
    }

    #[test]
    fn question_bounds() {
        assert!(validate_question("what does main do?").is_ok());
        assert_eq!(
            validate_question("   ").unwrap_err().kind(),
            ErrorKind::Validation
        );
        assert!(validate_question(&"é".repeat(MAX_QUESTION_CHARS)).is_ok());
        assert!(validate_question(&"a".repeat(MAX_QUESTION_CHARS + 1)).is_err());
    }

    #[tokio::test]
    async fn ask_streams_answer() {
        let mock = MockProvider::default()
            .with_embedding("how?", vec![1.0, 0.0])
            .with_stream_chunks(vec![
                b"data: {\"response\":\"It \"}\n".to_vec(),
                b"data: {\"response\":\"parses.\"}\ndata: [DONE]\n".to_vec(),
            ]);
        let store = Arc::new(InMemoryEmbeddingStore::new());
        let (s, _) = NewRecord::pair("a.rs", "fn a", "parses", "u", vec![1.0, 0.0], vec![0.0, 1.0]);
        store.seed(s).unwrap();

        let a = assistant(mock.clone(), store);
        let text: String = a
            .ask("how?")
            .await
            .unwrap()
            .map(Result::unwrap)
            .collect::<Vec<_>>()
            .await
            .concat();
        assert_eq!(text, "It parses.");
        assert_eq!(mock.embed_calls(), 1);
        assert_eq!(mock.chat_calls(), 1);
    }

    #[tokio::test]
    async fn ask_rejects_empty_question_without_calls() {
        let mock = MockProvider::default();
        let a = assistant(mock.clone(), Arc::new(InMemoryEmbeddingStore::new()));
        let err = a.ask("").await.err().unwrap();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert_eq!(mock.embed_calls(), 0);
        assert_eq!(mock.chat_calls(), 0);
    }
}

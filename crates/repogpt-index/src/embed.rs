//! Dense vector embeddings for summaries, file contents, and questions.

use std::sync::Arc;

use repogpt_llm::LlmProvider;

use crate::error::{IndexError, Result};

pub struct Embedder<P> {
    provider: Arc<P>,
}

impl<P: LlmProvider> Embedder<P> {
    #[must_use]
    pub fn new(provider: Arc<P>) -> Self {
        Self { provider }
    }

    /// # Errors
    ///
    /// Returns a configuration error if the provider cannot embed or lacks a
    /// credential, and an external-service error if the model fails or
    /// returns an empty vector.
    pub async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        if !self.provider.supports_embeddings() {
            return Err(IndexError::Configuration(format!(
                "provider {} has no embedding model",
                self.provider.name()
            )));
        }

        let vector = self.provider.embed(text).await?;
        if vector.is_empty() {
            return Err(IndexError::ExternalService {
                service: "embedding model",
                status: None,
                message: "empty embedding vector".into(),
            });
        }
        Ok(vector)
    }
}

impl<P> Clone for Embedder<P> {
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
    async fn returns_provider_vector() {
        let mock = MockProvider::default().with_embedding("hello", vec![0.1, 0.2]);
        let e = Embedder::new(Arc::new(mock));
        assert_eq!(e.embed("hello").await.unwrap(), vec![0.1, 0.2]);
    }

    #[tokio::test]
    async fn empty_vector_is_external_error() {
        let mock = MockProvider::default().with_default_embedding(Vec::new());
        let e = Embedder::new(Arc::new(mock));
        let err = e.embed("x").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ExternalService);
    }

    #[tokio::test]
    async fn missing_credential_is_configuration_error() {
        let mock = MockProvider::default().with_missing_credential();
        let err = Embedder::new(Arc::new(mock)).embed("x").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
    }
}

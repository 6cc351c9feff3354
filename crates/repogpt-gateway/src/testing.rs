//! Shared fixtures for gateway tests.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use repogpt_index::answer::AnswerStreamer;
use repogpt_index::embed::Embedder;
use repogpt_index::in_memory::InMemoryEmbeddingStore;
use repogpt_index::indexer::{IndexerConfig, RepoIndexer};
use repogpt_index::retriever::{RetrievalConfig, Retriever};
use repogpt_index::source::{BlobDescriptor, RepoRef, SourceHost};
use repogpt_index::summarize::Summarizer;
use repogpt_index::{IndexError, Result};
use repogpt_llm::any::AnyProvider;
use repogpt_llm::mock::MockProvider;

use crate::server::Assistant;

type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Serves `src/ok{n}.rs` files; any path containing `broken` fails to fetch.
pub(crate) struct StaticSource {
    pub paths: Vec<String>,
}

impl SourceHost for StaticSource {
    fn list_files<'a>(
        &'a self,
        repo: &'a RepoRef,
        token: Option<&'a str>,
    ) -> BoxFuture<'a, Result<Vec<BlobDescriptor>>> {
        Box::pin(async move {
            if token.is_none() {
                return Err(IndexError::Authentication("missing token".into()));
            }
            if repo.repo == "missing" {
                return Err(IndexError::ExternalService {
                    service: "source host",
                    status: Some(404),
                    message: "Not Found".into(),
                });
            }
            Ok(self
                .paths
                .iter()
                .map(|p| BlobDescriptor {
                    path: p.clone(),
                    url: format!("https://host/{p}"),
                })
                .collect())
        })
    }

    fn fetch_content<'a>(
        &'a self,
        blob: &'a BlobDescriptor,
        token: Option<&'a str>,
    ) -> BoxFuture<'a, Result<String>> {
        Box::pin(async move {
            if token.is_none() {
                return Err(IndexError::Authentication("missing token".into()));
            }
            if blob.path.contains("broken") {
                return Err(IndexError::ExternalService {
                    service: "source host",
                    status: Some(500),
                    message: "boom".into(),
                });
            }
            Ok(format!("// {}", blob.path))
        })
    }
}

pub(crate) fn assistant_with(
    mock: MockProvider,
    store: Arc<InMemoryEmbeddingStore>,
    answer_timeout: Duration,
) -> Arc<Assistant> {
    let provider = Arc::new(AnyProvider::Mock(mock));
    let source = StaticSource {
        paths: vec![
            "src/ok1.rs".into(),
            "src/broken.rs".into(),
            "src/ok2.rs".into(),
            "node_modules/dep/index.js".into(),
        ],
    };
    let indexer = RepoIndexer::new(
        Arc::new(source),
        store.clone(),
        Summarizer::new(Arc::clone(&provider)),
        Embedder::new(Arc::clone(&provider)),
        IndexerConfig {
            batch_delay: Duration::ZERO,
            ..IndexerConfig::default()
        },
    );
    let retriever = Retriever::new(
        store,
        Embedder::new(Arc::clone(&provider)),
        RetrievalConfig::default(),
    );
    let answers = AnswerStreamer::new(provider).with_timeout(answer_timeout);
    Arc::new(Assistant::new(indexer, retriever, answers))
}

pub(crate) fn assistant() -> Arc<Assistant> {
    assistant_with(
        MockProvider::default(),
        Arc::new(InMemoryEmbeddingStore::new()),
        Duration::from_secs(30),
    )
}

//! Question embedding, SUMMARY similarity search, and context assembly.

use std::fmt::Write;
use std::sync::Arc;

use repogpt_llm::LlmProvider;

use crate::embed::Embedder;
use crate::error::Result;
use crate::store::{EmbeddingStore, RetrievalMatch};

pub const DEFAULT_SIMILARITY_THRESHOLD: f32 = 0.5;
pub const DEFAULT_MATCH_LIMIT: usize = 10;

const ENTRY_SEPARATOR: &str = "\n-----\n";

/// Retrieval configuration.
#[derive(Debug, Clone, Copy)]
pub struct RetrievalConfig {
    /// Matches must score strictly above this cosine similarity.
    pub similarity_threshold: f32,
    pub max_matches: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            similarity_threshold: DEFAULT_SIMILARITY_THRESHOLD,
            max_matches: DEFAULT_MATCH_LIMIT,
        }
    }
}

pub struct Retriever<P> {
    store: Arc<dyn EmbeddingStore>,
    embedder: Embedder<P>,
    config: RetrievalConfig,
}

impl<P: LlmProvider> Retriever<P> {
    #[must_use]
    pub fn new(
        store: Arc<dyn EmbeddingStore>,
        embedder: Embedder<P>,
        config: RetrievalConfig,
    ) -> Self {
        Self {
            store,
            embedder,
            config,
        }
    }

    /// Ranked SUMMARY matches for `question`, most similar first.
    ///
    /// # Errors
    ///
    /// Returns an error if embedding the question or querying the store fails.
    pub async fn search(&self, question: &str) -> Result<Vec<RetrievalMatch>> {
        let query = self.embedder.embed(question).await?;
        let mut matches = self
            .store
            .search_summaries(
                query,
                self.config.similarity_threshold,
                self.config.max_matches,
            )
            .await?;

        matches.retain(|m| m.similarity > self.config.similarity_threshold);
        matches.sort_by(|a, b| b.similarity.total_cmp(&a.similarity));
        matches.truncate(self.config.max_matches);

        tracing::debug!(
            matches = matches.len(),
            top = matches.first().map(|m| m.similarity),
            "retrieval finished"
        );
        Ok(matches)
    }

    /// Context block for `question`; empty when nothing relevant was found.
    ///
    /// # Errors
    ///
    /// Returns an error if embedding the question or querying the store fails.
    pub async fn retrieve(&self, question: &str) -> Result<String> {
        Ok(format_as_context(&self.search(question).await?))
    }
}

/// Join matches into one block, preserving their order.
#[must_use]
pub fn format_as_context(matches: &[RetrievalMatch]) -> String {
    let mut out = String::new();
    for (i, m) in matches.iter().enumerate() {
        if i > 0 {
            out.push_str(ENTRY_SEPARATOR);
        }
        let _ = writeln!(out, "File: {}", m.file_name);
        let _ = writeln!(out, "Summary: {}", m.summary);
        let _ = writeln!(out, "Content:\n{}", m.raw_content);
    }
    out
}

#[cfg(test)]
mod tests {
    use repogpt_llm::mock::MockProvider;

    use super::*;
    use crate::in_memory::InMemoryEmbeddingStore;
    use crate::store::NewRecord;

    fn unit_at(similarity: f32) -> Vec<f32> {
        vec![similarity, (1.0 - similarity * similarity).sqrt()]
    }

    fn seeded(similarities: &[f32]) -> Arc<InMemoryEmbeddingStore> {
        let store = InMemoryEmbeddingStore::new();
        for (i, s) in similarities.iter().enumerate() {
            let (summary, full) = NewRecord::pair(
                &format!("f{i}.rs"),
                &format!("content {i}"),
                &format!("summary {i}"),
                "https://x",
                unit_at(*s),
                vec![1.0, 0.0],
            );
            store.seed(summary).unwrap();
            store.seed(full).unwrap();
        }
        Arc::new(store)
    }

    fn retriever_with(
        store: Arc<InMemoryEmbeddingStore>,
        config: RetrievalConfig,
    ) -> Retriever<MockProvider> {
        let provider = MockProvider::default().with_embedding("question", vec![1.0, 0.0]);
        Retriever::new(store, Embedder::new(Arc::new(provider)), config)
    }

    fn retriever(store: Arc<InMemoryEmbeddingStore>) -> Retriever<MockProvider> {
        retriever_with(store, RetrievalConfig::default())
    }

    fn rounded(m: &RetrievalMatch) -> f32 {
        (m.similarity * 100.0).round() / 100.0
    }

    #[tokio::test]
    async fn keeps_above_threshold_in_descending_order() {
        let r = retriever(seeded(&[0.9, 0.6, 0.4, 0.7]));
        let matches = r.search("question").await.unwrap();
        let scores: Vec<f32> = matches.iter().map(rounded).collect();
        assert_eq!(scores, vec![0.9, 0.7, 0.6]);
        let names: Vec<_> = matches.iter().map(|m| m.file_name.as_str()).collect();
        assert_eq!(names, vec!["f0.rs", "f3.rs", "f1.rs"]);
    }

    #[tokio::test]
    async fn threshold_is_strict() {
        let config = RetrievalConfig {
            similarity_threshold: 1.0,
            ..RetrievalConfig::default()
        };
        let r = retriever_with(seeded(&[1.0]), config);
        assert!(r.search("question").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn caps_at_limit() {
        let sims: Vec<f32> = (0u8..15).map(|i| 0.6 + 0.02 * f32::from(i)).collect();
        let r = retriever(seeded(&sims));
        let matches = r.search("question").await.unwrap();
        assert_eq!(matches.len(), DEFAULT_MATCH_LIMIT);
        assert_eq!(matches[0].file_name, "f14.rs");
    }

    #[tokio::test]
    async fn full_records_never_match() {
        let store = seeded(&[0.1]);
        let r = retriever(store);
        // FULL vectors equal the query exactly but are excluded
        assert!(r.retrieve("question").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn retrieve_formats_most_relevant_first() {
        let r = retriever(seeded(&[0.6, 0.95]));
        let context = r.retrieve("question").await.unwrap();
        let first = context.find("File: f1.rs").unwrap();
        let second = context.find("File: f0.rs").unwrap();
        assert!(first < second);
        assert!(context.contains("Summary: summary 1"));
        assert!(context.contains("Content:\ncontent 1"));
    }

    #[test]
    fn format_as_context_empty() {
        assert_eq!(format_as_context(&[]), "");
    }

    #[test]
    fn format_as_context_separates_entries() {
        let m = |name: &str| RetrievalMatch {
            file_name: name.into(),
            raw_content: "body".into(),
            summary: "sum".into(),
            similarity: 0.8,
        };
        let out = format_as_context(&[m("a.rs"), m("b.rs")]);
        assert_eq!(out.matches(ENTRY_SEPARATOR).count(), 1);
        assert!(out.starts_with("File: a.rs\n"));
    }
}

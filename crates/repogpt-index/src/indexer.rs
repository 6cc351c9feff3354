//! Repository ingestion: list → filter → fetch → summarize → embed ×2 → store, in batches.

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use repogpt_llm::LlmProvider;

use crate::embed::Embedder;
use crate::error::{IndexError, Result};
use crate::filter::PathFilter;
use crate::source::{BlobDescriptor, RepoRef, SourceHost};
use crate::store::{EmbeddingStore, NewRecord, StoredPair};
use crate::summarize::Summarizer;

pub const DEFAULT_BATCH_SIZE: usize = 5;
pub const DEFAULT_BATCH_DELAY: Duration = Duration::from_secs(1);

/// Indexer configuration.
#[derive(Debug, Clone)]
pub struct IndexerConfig {
    /// Files processed concurrently; batches themselves run one after another.
    pub batch_size: usize,
    /// Pause between consecutive batches.
    pub batch_delay: Duration,
    pub filter: PathFilter,
}

impl Default for IndexerConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            batch_delay: DEFAULT_BATCH_DELAY,
            filter: PathFilter::default(),
        }
    }
}

/// A fetched file on its way to the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestedFile {
    pub file_name: String,
    pub raw_content: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileFailure {
    pub file_name: String,
    pub error: String,
}

/// Outcome of one repository ingestion.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IngestReport {
    /// Files whose SUMMARY and FULL records were both committed.
    pub processed: usize,
    /// Files that passed the path filter.
    pub total: usize,
    pub failures: Vec<FileFailure>,
}

/// Drives ingestion for one source host into one store.
pub struct RepoIndexer<P> {
    source: Arc<dyn SourceHost>,
    store: Arc<dyn EmbeddingStore>,
    summarizer: Summarizer<P>,
    embedder: Embedder<P>,
    config: IndexerConfig,
}

impl<P: LlmProvider> RepoIndexer<P> {
    #[must_use]
    pub fn new(
        source: Arc<dyn SourceHost>,
        store: Arc<dyn EmbeddingStore>,
        summarizer: Summarizer<P>,
        embedder: Embedder<P>,
        config: IndexerConfig,
    ) -> Self {
        Self {
            source,
            store,
            summarizer,
            embedder,
            config,
        }
    }

    #[must_use]
    pub fn config(&self) -> &IndexerConfig {
        &self.config
    }

    /// Ingest every includable file of `repo`.
    ///
    /// Per-file failures are logged and counted, never returned.
    ///
    /// # Errors
    ///
    /// Returns an error only if the tree listing fails.
    pub async fn ingest_repository(
        &self,
        repo: &RepoRef,
        token: Option<&str>,
    ) -> Result<IngestReport> {
        let listed = self.source.list_files(repo, token).await?;
        let listed_count = listed.len();
        let files: Vec<BlobDescriptor> = listed
            .into_iter()
            .filter(|b| self.config.filter.is_included(&b.path))
            .collect();

        let mut report = IngestReport {
            total: files.len(),
            ..IngestReport::default()
        };
        let batch_size = self.config.batch_size.max(1);
        let batches = files.len().div_ceil(batch_size);
        tracing::info!(
            %repo,
            listed = listed_count,
            total = report.total,
            batches,
            "ingestion started"
        );

        for (i, batch) in files.chunks(batch_size).enumerate() {
            if i > 0 && !self.config.batch_delay.is_zero() {
                tokio::time::sleep(self.config.batch_delay).await;
            }

            let outcomes = join_all(
                batch
                    .iter()
                    .map(|blob| async move { (blob, self.ingest_blob(blob, token).await) }),
            )
            .await;

            for (blob, outcome) in outcomes {
                match outcome {
                    Ok(_) => report.processed += 1,
                    Err(e) => {
                        tracing::warn!(file = %blob.path, "ingestion failed: {e}");
                        report.failures.push(FileFailure {
                            file_name: blob.path.clone(),
                            error: e.to_string(),
                        });
                    }
                }
            }

            tracing::info!(
                batch = i + 1,
                batches,
                progress = format_args!("{}/{}", report.processed, report.total),
                "batch settled"
            );
        }

        tracing::info!(
            %repo,
            processed = report.processed,
            total = report.total,
            "ingestion finished"
        );
        Ok(report)
    }

    /// Run the per-file pipeline for one explicitly named blob.
    ///
    /// # Errors
    ///
    /// Returns a validation error for a blank name, a non-absolute URL, or a
    /// URL the source host refuses to fetch, and otherwise whatever the
    /// pipeline step that failed returned.
    pub async fn ingest_file(
        &self,
        file_name: &str,
        url: &str,
        token: Option<&str>,
    ) -> Result<StoredPair> {
        if file_name.trim().is_empty() {
            return Err(IndexError::Validation("fileName must not be empty".into()));
        }
        url::Url::parse(url).map_err(|e| IndexError::Validation(format!("invalid url: {e}")))?;

        let blob = BlobDescriptor {
            path: file_name.to_owned(),
            url: url.to_owned(),
        };
        self.ingest_blob(&blob, token).await
    }

    async fn ingest_blob(&self, blob: &BlobDescriptor, token: Option<&str>) -> Result<StoredPair> {
        let file = IngestedFile {
            file_name: blob.path.clone(),
            raw_content: self.source.fetch_content(blob, token).await?,
        };

        let summary = self.summarizer.summarize(&file.raw_content).await?;
        let summary_vector = self.embedder.embed(&summary).await?;
        let content_vector = self.embedder.embed(&file.raw_content).await?;

        let (summary_record, code_record) = NewRecord::pair(
            &file.file_name,
            &file.raw_content,
            &summary,
            &blob.url,
            summary_vector,
            content_vector,
        );
        let ids = self.store.store_pair(summary_record, code_record).await?;
        tracing::debug!(file = %file.file_name, ?ids, "file ingested");
        Ok(ids)
    }
}

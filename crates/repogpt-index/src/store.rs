//! Embedding record types and the storage seam shared by all backends.

use std::fmt;
use std::future::Future;
use std::pin::Pin;

use crate::error::{IndexError, Result};

pub(crate) type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Which text a stored vector was computed over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordKind {
    Summary,
    Full,
}

impl RecordKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Summary => "SUMMARY",
            Self::Full => "FULL",
        }
    }
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A record about to be written; `id` is assigned by the store.
#[derive(Debug, Clone, PartialEq)]
pub struct NewRecord {
    pub file_name: String,
    pub raw_content: String,
    pub summary: String,
    pub kind: RecordKind,
    pub url: String,
    pub vector: Vec<f32>,
}

impl NewRecord {
    /// Build the SUMMARY and FULL records for one file.
    #[must_use]
    pub fn pair(
        file_name: &str,
        raw_content: &str,
        summary: &str,
        url: &str,
        summary_vector: Vec<f32>,
        content_vector: Vec<f32>,
    ) -> (Self, Self) {
        let make = |kind, vector| Self {
            file_name: file_name.to_owned(),
            raw_content: raw_content.to_owned(),
            summary: summary.to_owned(),
            kind,
            url: url.to_owned(),
            vector,
        };
        (
            make(RecordKind::Summary, summary_vector),
            make(RecordKind::Full, content_vector),
        )
    }
}

/// A persisted record.
#[derive(Debug, Clone, PartialEq)]
pub struct EmbeddingRecord {
    pub id: i64,
    pub file_name: String,
    pub raw_content: String,
    pub summary: String,
    pub kind: RecordKind,
    pub url: String,
    pub vector: Vec<f32>,
}

/// Ids of the two rows written for one file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoredPair {
    pub summary_id: i64,
    pub code_id: i64,
}

/// A SUMMARY record scored against a query vector.
#[derive(Debug, Clone, PartialEq)]
pub struct RetrievalMatch {
    pub file_name: String,
    pub raw_content: String,
    pub summary: String,
    pub similarity: f32,
}

/// Durable vector storage.
///
/// `store_pair` is the only write path. Implementations must make both
/// records visible together or not at all.
pub trait EmbeddingStore: Send + Sync {
    /// Persist the SUMMARY and FULL records of one file atomically.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the transaction fails, or a configuration
    /// error if a vector does not match the store's dimension.
    fn store_pair(&self, summary: NewRecord, code: NewRecord)
    -> BoxFuture<'_, Result<StoredPair>>;

    /// SUMMARY records with cosine similarity strictly above `threshold`,
    /// most similar first, at most `limit` of them.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the query fails.
    fn search_summaries(
        &self,
        query: Vec<f32>,
        threshold: f32,
        limit: usize,
    ) -> BoxFuture<'_, Result<Vec<RetrievalMatch>>>;
}

/// Shape checks every backend runs before opening a transaction.
pub(crate) fn check_pair(
    summary: &NewRecord,
    code: &NewRecord,
    dimension: Option<usize>,
) -> Result<()> {
    if summary.kind != RecordKind::Summary || code.kind != RecordKind::Full {
        return Err(IndexError::Storage(format!(
            "expected SUMMARY and FULL records, got {} and {}",
            summary.kind, code.kind
        )));
    }
    if summary.file_name != code.file_name
        || summary.raw_content != code.raw_content
        || summary.summary != code.summary
    {
        return Err(IndexError::Storage(format!(
            "records for {} and {} do not describe the same file",
            summary.file_name, code.file_name
        )));
    }
    if let Some(dim) = dimension {
        for record in [summary, code] {
            if record.vector.len() != dim {
                return Err(IndexError::Configuration(format!(
                    "{} vector for {} has {} dimensions, store expects {dim}",
                    record.kind,
                    record.file_name,
                    record.vector.len()
                )));
            }
        }
    }
    Ok(())
}

//! Process-local [`EmbeddingStore`] with staged commits and fault injection.

use std::sync::RwLock;
use std::sync::atomic::{AtomicI64, Ordering};

use crate::error::{IndexError, Result};
use crate::store::{
    BoxFuture, EmbeddingRecord, EmbeddingStore, NewRecord, RecordKind, RetrievalMatch,
    StoredPair, check_pair,
};

/// Where an injected write failure fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultPoint {
    /// After the SUMMARY row is staged, before the FULL row.
    BetweenInserts,
    /// After both rows are staged, before they become visible.
    BeforeCommit,
}

#[derive(Debug, Clone)]
struct Fault {
    file_name: String,
    point: FaultPoint,
}

pub struct InMemoryEmbeddingStore {
    rows: RwLock<Vec<EmbeddingRecord>>,
    next_id: AtomicI64,
    dimension: Option<usize>,
    faults: RwLock<Vec<Fault>>,
}

impl InMemoryEmbeddingStore {
    #[must_use]
    pub fn new() -> Self {
        Self {
            rows: RwLock::new(Vec::new()),
            next_id: AtomicI64::new(1),
            dimension: None,
            faults: RwLock::new(Vec::new()),
        }
    }

    /// Reject vectors whose length differs from `dimension`.
    #[must_use]
    pub fn with_dimension(mut self, dimension: usize) -> Self {
        self.dimension = Some(dimension);
        self
    }

    /// Make every write for `file_name` fail at `point`.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the fault list lock is poisoned.
    pub fn inject_fault(&self, file_name: impl Into<String>, point: FaultPoint) -> Result<()> {
        self.faults
            .write()
            .map_err(|e| IndexError::Storage(e.to_string()))?
            .push(Fault {
                file_name: file_name.into(),
                point,
            });
        Ok(())
    }

    /// Committed records, in insertion order.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the row lock is poisoned.
    pub fn records(&self) -> Result<Vec<EmbeddingRecord>> {
        Ok(self.read_rows()?.clone())
    }

    /// Committed records for one file name.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the row lock is poisoned.
    pub fn records_for(&self, file_name: &str) -> Result<Vec<EmbeddingRecord>> {
        Ok(self
            .read_rows()?
            .iter()
            .filter(|r| r.file_name == file_name)
            .cloned()
            .collect())
    }

    /// Insert a committed record directly, bypassing the pair write path.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the row lock is poisoned.
    pub fn seed(&self, record: NewRecord) -> Result<i64> {
        let id = self.allocate_id();
        self.rows
            .write()
            .map_err(|e| IndexError::Storage(e.to_string()))?
            .push(committed(id, record));
        Ok(id)
    }

    fn read_rows(&self) -> Result<std::sync::RwLockReadGuard<'_, Vec<EmbeddingRecord>>> {
        self.rows
            .read()
            .map_err(|e| IndexError::Storage(e.to_string()))
    }

    fn allocate_id(&self) -> i64 {
        self.next_id.fetch_add(1, Ordering::SeqCst)
    }

    fn check_fault(&self, file_name: &str, point: FaultPoint) -> Result<()> {
        let faults = self
            .faults
            .read()
            .map_err(|e| IndexError::Storage(e.to_string()))?;
        if faults
            .iter()
            .any(|f| f.point == point && f.file_name == file_name)
        {
            return Err(IndexError::Storage(format!(
                "injected failure for {file_name} at {point:?}"
            )));
        }
        Ok(())
    }

    fn write_pair(&self, summary: NewRecord, code: NewRecord) -> Result<StoredPair> {
        check_pair(&summary, &code, self.dimension)?;
        let file_name = summary.file_name.clone();

        let mut staged = Vec::with_capacity(2);
        let summary_id = self.allocate_id();
        staged.push(committed(summary_id, summary));

        self.check_fault(&file_name, FaultPoint::BetweenInserts)?;

        let code_id = self.allocate_id();
        staged.push(committed(code_id, code));

        self.check_fault(&file_name, FaultPoint::BeforeCommit)?;

        self.rows
            .write()
            .map_err(|e| IndexError::Storage(e.to_string()))?
            .extend(staged);

        Ok(StoredPair {
            summary_id,
            code_id,
        })
    }
}

impl Default for InMemoryEmbeddingStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for InMemoryEmbeddingStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryEmbeddingStore")
            .field("dimension", &self.dimension)
            .finish_non_exhaustive()
    }
}

fn committed(id: i64, r: NewRecord) -> EmbeddingRecord {
    EmbeddingRecord {
        id,
        file_name: r.file_name,
        raw_content: r.raw_content,
        summary: r.summary,
        kind: r.kind,
        url: r.url,
        vector: r.vector,
    }
}

pub(crate) fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

impl EmbeddingStore for InMemoryEmbeddingStore {
    fn store_pair(
        &self,
        summary: NewRecord,
        code: NewRecord,
    ) -> BoxFuture<'_, Result<StoredPair>> {
        Box::pin(async move { self.write_pair(summary, code) })
    }

    fn search_summaries(
        &self,
        query: Vec<f32>,
        threshold: f32,
        limit: usize,
    ) -> BoxFuture<'_, Result<Vec<RetrievalMatch>>> {
        Box::pin(async move {
            let rows = self.read_rows()?;
            let mut matches: Vec<RetrievalMatch> = rows
                .iter()
                .filter(|r| r.kind == RecordKind::Summary)
                .map(|r| RetrievalMatch {
                    file_name: r.file_name.clone(),
                    raw_content: r.raw_content.clone(),
                    summary: r.summary.clone(),
                    similarity: cosine_similarity(&query, &r.vector),
                })
                .filter(|m| m.similarity > threshold)
                .collect();
            drop(rows);

            matches.sort_by(|a, b| b.similarity.total_cmp(&a.similarity));
            matches.truncate(limit);
            Ok(matches)
        })
    }
}

//! Postgres + pgvector backend.

use std::time::Duration;

use pgvector::Vector;
use sqlx::PgConnection;
use sqlx::postgres::{PgPool, PgPoolOptions};

use crate::error::{IndexError, Result};
use crate::store::{
    BoxFuture, EmbeddingStore, NewRecord, RetrievalMatch, StoredPair, check_pair,
};

const TABLE: &str = "embedding";
const DEFAULT_ACQUIRE_TIMEOUT: Duration = Duration::from_secs(20);
const DEFAULT_TRANSACTION_TIMEOUT: Duration = Duration::from_secs(30);

/// Pool and timeout settings for [`PgEmbeddingStore::connect`].
#[derive(Debug, Clone)]
pub struct PgStoreOptions {
    pub max_connections: u32,
    /// How long a writer waits for a pooled connection.
    pub acquire_timeout: Duration,
    /// Upper bound for one pair transaction, statement execution included.
    pub transaction_timeout: Duration,
}

impl Default for PgStoreOptions {
    fn default() -> Self {
        Self {
            max_connections: 10,
            acquire_timeout: DEFAULT_ACQUIRE_TIMEOUT,
            transaction_timeout: DEFAULT_TRANSACTION_TIMEOUT,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PgEmbeddingStore {
    pool: PgPool,
    dimension: usize,
    transaction_timeout: Duration,
}

impl PgEmbeddingStore {
    /// Connect to Postgres.
    ///
    /// # Errors
    ///
    /// Returns an error if the pool cannot be established.
    pub async fn connect(url: &str, dimension: usize, options: &PgStoreOptions) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(options.max_connections)
            .acquire_timeout(options.acquire_timeout)
            .connect(url)
            .await?;
        Ok(Self {
            pool,
            dimension,
            transaction_timeout: options.transaction_timeout,
        })
    }

    #[must_use]
    pub fn from_pool(pool: PgPool, dimension: usize) -> Self {
        Self {
            pool,
            dimension,
            transaction_timeout: DEFAULT_TRANSACTION_TIMEOUT,
        }
    }

    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Create the extension, table and index when missing, then verify the
    /// existing vector column width.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the table already exists with a
    /// different vector dimension, or a database error if DDL fails.
    pub async fn ensure_schema(&self) -> Result<()> {
        for statement in schema_statements(self.dimension) {
            sqlx::query(&statement).execute(&self.pool).await?;
        }

        let existing: Option<(i32,)> = sqlx::query_as(
            "SELECT atttypmod FROM pg_attribute \
             WHERE attrelid = 'embedding'::regclass AND attname = 'embedding'",
        )
        .fetch_optional(&self.pool)
        .await?;

        if let Some((width,)) = existing
            && usize::try_from(width).ok() != Some(self.dimension)
        {
            return Err(IndexError::Configuration(format!(
                "{TABLE}.embedding is vector({width}) but the embedding model produces {} dimensions",
                self.dimension
            )));
        }

        tracing::info!(dimension = self.dimension, "embedding schema ready");
        Ok(())
    }

    async fn write_pair(&self, summary: &NewRecord, code: &NewRecord) -> Result<StoredPair> {
        let mut tx = self.pool.begin().await?;
        let timeout_ms = self.transaction_timeout.as_millis();
        sqlx::query(&format!("SET LOCAL statement_timeout = {timeout_ms}"))
            .execute(&mut *tx)
            .await?;

        let summary_id = insert_record(&mut *tx, summary).await?;
        let code_id = insert_record(&mut *tx, code).await?;
        tx.commit().await?;

        Ok(StoredPair {
            summary_id,
            code_id,
        })
    }
}

fn schema_statements(dimension: usize) -> [String; 3] {
    [
        "CREATE EXTENSION IF NOT EXISTS vector".to_owned(),
        format!(
            r#"CREATE TABLE IF NOT EXISTS {TABLE} (
                id BIGSERIAL PRIMARY KEY,
                "fileName" TEXT NOT NULL,
                "rawContent" TEXT NOT NULL,
                summary TEXT NOT NULL,
                "type" TEXT NOT NULL CHECK ("type" IN ('SUMMARY', 'FULL')),
                url TEXT NOT NULL,
                embedding VECTOR({dimension}) NOT NULL,
                created_at TIMESTAMPTZ NOT NULL DEFAULT now()
            )"#
        ),
        format!(r#"CREATE INDEX IF NOT EXISTS {TABLE}_type_idx ON {TABLE} ("type")"#),
    ]
}

async fn insert_record(conn: &mut PgConnection, record: &NewRecord) -> Result<i64> {
    let row: (i64,) = sqlx::query_as(
        r#"INSERT INTO embedding ("fileName", "rawContent", summary, "type", url, embedding)
           VALUES ($1, $2, $3, $4, $5, $6) RETURNING id"#,
    )
    .bind(&record.file_name)
    .bind(&record.raw_content)
    .bind(&record.summary)
    .bind(record.kind.as_str())
    .bind(&record.url)
    .bind(Vector::from(record.vector.clone()))
    .fetch_one(conn)
    .await?;
    Ok(row.0)
}

impl EmbeddingStore for PgEmbeddingStore {
    fn store_pair(
        &self,
        summary: NewRecord,
        code: NewRecord,
    ) -> BoxFuture<'_, Result<StoredPair>> {
        Box::pin(async move {
            check_pair(&summary, &code, Some(self.dimension))?;

            let limit = self.transaction_timeout;
            let ids = tokio::time::timeout(limit, self.write_pair(&summary, &code))
                .await
                .map_err(|_| {
                    IndexError::Storage(format!(
                        "transaction for {} exceeded {limit:?}",
                        summary.file_name
                    ))
                })??;

            tracing::debug!(
                file = %summary.file_name,
                summary_id = ids.summary_id,
                code_id = ids.code_id,
                "stored embedding pair"
            );
            Ok(ids)
        })
    }

    fn search_summaries(
        &self,
        query: Vec<f32>,
        threshold: f32,
        limit: usize,
    ) -> BoxFuture<'_, Result<Vec<RetrievalMatch>>> {
        Box::pin(async move {
            let limit = i64::try_from(limit).unwrap_or(i64::MAX);
            let rows: Vec<(String, String, String, f64)> = sqlx::query_as(
                r#"SELECT "fileName", "rawContent", summary, 1 - (embedding <=> $1) AS similarity
                   FROM embedding
                   WHERE "type" = 'SUMMARY' AND 1 - (embedding <=> $1) > $2
                   ORDER BY similarity DESC
                   LIMIT $3"#,
            )
            .bind(Vector::from(query))
            .bind(f64::from(threshold))
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;

            #[allow(clippy::cast_possible_truncation)]
            let matches = rows
                .into_iter()
                .map(|(file_name, raw_content, summary, similarity)| RetrievalMatch {
                    file_name,
                    raw_content,
                    summary,
                    similarity: similarity as f32,
                })
                .collect();
            Ok(matches)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_uses_configured_dimension() {
        let [ext, table, index] = schema_statements(768);
        assert!(ext.contains("vector"));
        assert!(table.contains("VECTOR(768)"));
        assert!(table.contains(r#""fileName" TEXT NOT NULL"#));
        assert!(table.contains(r#""rawContent" TEXT NOT NULL"#));
        assert!(table.contains(r#"CHECK ("type" IN ('SUMMARY', 'FULL'))"#));
        assert!(index.contains(r#"("type")"#));
    }

    #[test]
    fn default_store_options() {
        let o = PgStoreOptions::default();
        assert_eq!(o.acquire_timeout, Duration::from_secs(20));
        assert_eq!(o.transaction_timeout, Duration::from_secs(30));
    }

    #[tokio::test]
    async fn unreachable_database_fails_fast() {
        let options = PgStoreOptions {
            max_connections: 1,
            acquire_timeout: Duration::from_millis(200),
            ..PgStoreOptions::default()
        };
        let err = PgEmbeddingStore::connect("postgres://u:p@127.0.0.1:1/db", 3, &options)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Storage);
    }
}

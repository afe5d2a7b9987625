//! Summary storage and retrieval operations
use std::sync::Arc;

use chrono::{DateTime, SubsecRound, Utc};
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{params, Connection, OptionalExtension, Row};
use tracing::{debug, info};

use crate::embedding::{embed_checked, EmbeddingProvider};
use crate::error::{MemoryError, Result};
use crate::memory_db::embedding_codec::{decode_embedding, encode_embedding};
use crate::memory_db::checkout;
use crate::memory_db::schema::*;
use crate::metrics;

pub struct SummaryStore {
    pool: Arc<Pool<SqliteConnectionManager>>,
    embedder: Arc<dyn EmbeddingProvider>,
}

impl SummaryStore {
    pub fn new(pool: Arc<Pool<SqliteConnectionManager>>, embedder: Arc<dyn EmbeddingProvider>) -> Self {
        Self { pool, embedder }
    }

    fn get_conn(&self) -> Result<r2d2::PooledConnection<SqliteConnectionManager>> {
        Ok(self.pool.get()?)
    }

    /// Embeds `summary_text` and persists it with its covered time range.
    pub async fn add_summary(
        &self,
        summary_text: &str,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
    ) -> Result<SummaryRecord> {
        check_range(&start_time, &end_time)?;
        let embedding = embed_checked(self.embedder.as_ref(), summary_text).await?;
        let conn = checkout(&self.pool).await?;
        insert_summary(&conn, summary_text, embedding, start_time, end_time)
    }

    /// Text of the summary with the greatest `end_time`, if any.
    pub fn latest_summary(&self) -> Result<Option<String>> {
        let conn = self.get_conn()?;
        Ok(latest_summary_record(&conn, self.embedder.dimension())?
            .map(|s| s.summary_text))
    }

    pub fn latest_summary_record(&self) -> Result<Option<SummaryRecord>> {
        let conn = self.get_conn()?;
        latest_summary_record(&conn, self.embedder.dimension())
    }

    pub fn all_summaries_with_embeddings(&self) -> Result<Vec<EmbeddedText>> {
        let conn = self.get_conn()?;
        all_summaries_with_embeddings(&conn, self.embedder.dimension())
    }

    pub fn count(&self) -> Result<usize> {
        let conn = self.get_conn()?;
        count_summaries(&conn)
    }
}

pub(crate) fn check_range(start_time: &DateTime<Utc>, end_time: &DateTime<Utc>) -> Result<()> {
    if start_time > end_time {
        return Err(MemoryError::InvalidInput(format!(
            "summary start_time {} is after end_time {}",
            start_time, end_time
        )));
    }
    Ok(())
}

pub(crate) fn insert_summary(
    conn: &Connection,
    summary_text: &str,
    embedding: Vec<f32>,
    start_time: DateTime<Utc>,
    end_time: DateTime<Utc>,
) -> Result<SummaryRecord> {
    let start_time = start_time.trunc_subsecs(6);
    let end_time = end_time.trunc_subsecs(6);

    conn.execute(
        "INSERT INTO summaries (summary_text, embedding, start_time, end_time, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            summary_text,
            encode_embedding(&embedding),
            format_timestamp(&start_time),
            format_timestamp(&end_time),
            format_timestamp(&Utc::now()),
        ],
    )?;
    let id = conn.last_insert_rowid();
    metrics::inc_summaries_stored();
    info!("Stored summary {} covering {} .. {}", id, start_time, end_time);

    Ok(SummaryRecord {
        id,
        summary_text: summary_text.to_string(),
        embedding,
        start_time,
        end_time,
    })
}

pub(crate) fn latest_summary_record(conn: &Connection, dimension: usize) -> Result<Option<SummaryRecord>> {
    let mut stmt = conn.prepare(
        "SELECT id, summary_text, embedding, start_time, end_time
         FROM summaries ORDER BY end_time DESC, id DESC LIMIT 1",
    )?;
    let row = stmt
        .query_row([], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, Vec<u8>>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, String>(4)?,
            ))
        })
        .optional()?;

    match row {
        Some((id, summary_text, blob, start, end)) => Ok(Some(SummaryRecord {
            id,
            summary_text,
            embedding: decode_embedding(&blob, dimension)?,
            start_time: parse_timestamp(&start)?,
            end_time: parse_timestamp(&end)?,
        })),
        None => Ok(None),
    }
}

pub(crate) fn all_summaries_with_embeddings(conn: &Connection, dimension: usize) -> Result<Vec<EmbeddedText>> {
    let mut stmt = conn.prepare("SELECT id, summary_text, embedding FROM summaries ORDER BY id")?;
    let mut rows = stmt.query([])?;
    let mut corpus = Vec::new();
    while let Some(row) = rows.next()? {
        corpus.push(row_to_embedded(row, dimension)?);
    }
    debug!("Loaded {} summaries for search", corpus.len());
    Ok(corpus)
}

pub(crate) fn count_summaries(conn: &Connection) -> Result<usize> {
    let count: i64 = conn.query_row("SELECT COUNT(*) FROM summaries", [], |row| row.get(0))?;
    Ok(count as usize)
}

fn row_to_embedded(row: &Row, dimension: usize) -> Result<EmbeddedText> {
    let blob: Vec<u8> = row.get(2)?;
    Ok(EmbeddedText {
        id: row.get(0)?,
        text: row.get(1)?,
        embedding: decode_embedding(&blob, dimension)?,
    })
}

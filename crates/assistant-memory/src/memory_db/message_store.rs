//! Append-only message log with one embedding per message
use std::sync::Arc;

use chrono::{DateTime, SubsecRound, Utc};
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{params, Connection, Row};
use tracing::debug;

use crate::embedding::{embed_checked, EmbeddingProvider};
use crate::error::Result;
use crate::memory_db::embedding_codec::{decode_embedding, encode_embedding};
use crate::memory_db::checkout;
use crate::memory_db::schema::*;
use crate::metrics;

/// Upper bound on the corpus handed to similarity search.
pub const DEFAULT_SEARCH_CAP: usize = 1000;

pub struct MessageStore {
    pool: Arc<Pool<SqliteConnectionManager>>,
    embedder: Arc<dyn EmbeddingProvider>,
}

impl MessageStore {
    pub fn new(pool: Arc<Pool<SqliteConnectionManager>>, embedder: Arc<dyn EmbeddingProvider>) -> Self {
        Self { pool, embedder }
    }

    fn get_conn(&self) -> Result<r2d2::PooledConnection<SqliteConnectionManager>> {
        Ok(self.pool.get()?)
    }

    /// Embeds `text` and appends it with the current time.
    pub async fn add_message(&self, text: &str) -> Result<StoredMessage> {
        self.add_message_at(text, Utc::now()).await
    }

    pub async fn add_message_at(&self, text: &str, timestamp: DateTime<Utc>) -> Result<StoredMessage> {
        let embedding = embed_checked(self.embedder.as_ref(), text).await?;
        let conn = checkout(&self.pool).await?;
        insert_message(&conn, text, embedding, timestamp)
    }

    /// Newest first, at most `limit` rows.
    pub fn recent_messages(&self, limit: usize) -> Result<Vec<RecentMessage>> {
        let conn = self.get_conn()?;
        recent_messages(&conn, limit)
    }

    /// Most recent `limit` messages with decoded embeddings, newest first.
    pub fn all_messages_with_embeddings(&self, limit: usize) -> Result<Vec<EmbeddedText>> {
        let conn = self.get_conn()?;
        all_messages_with_embeddings(&conn, limit, self.embedder.dimension())
    }

    pub fn get_message(&self, id: i64) -> Result<Option<StoredMessage>> {
        let conn = self.get_conn()?;
        get_message(&conn, id, self.embedder.dimension())
    }

    pub fn count(&self) -> Result<usize> {
        let conn = self.get_conn()?;
        count_messages(&conn)
    }
}

pub(crate) fn insert_message(
    conn: &Connection,
    text: &str,
    embedding: Vec<f32>,
    timestamp: DateTime<Utc>,
) -> Result<StoredMessage> {
    // stored text keeps microseconds; keep the returned value identical
    let timestamp = timestamp.trunc_subsecs(6);
    conn.execute(
        "INSERT INTO messages (text, embedding, timestamp) VALUES (?1, ?2, ?3)",
        params![text, encode_embedding(&embedding), format_timestamp(&timestamp)],
    )?;
    let id = conn.last_insert_rowid();
    metrics::inc_messages_stored();
    debug!("Stored message {} ({} chars)", id, text.len());

    Ok(StoredMessage {
        id,
        text: text.to_string(),
        embedding,
        timestamp,
    })
}

pub(crate) fn recent_messages(conn: &Connection, limit: usize) -> Result<Vec<RecentMessage>> {
    let mut stmt = conn.prepare(
        "SELECT text, timestamp FROM messages ORDER BY timestamp DESC, id DESC LIMIT ?1",
    )?;
    let mut rows = stmt.query([limit as i64])?;
    let mut messages = Vec::new();
    while let Some(row) = rows.next()? {
        let timestamp: String = row.get(1)?;
        messages.push(RecentMessage {
            text: row.get(0)?,
            timestamp: parse_timestamp(&timestamp)?,
        });
    }
    Ok(messages)
}

pub(crate) fn all_messages_with_embeddings(
    conn: &Connection,
    limit: usize,
    dimension: usize,
) -> Result<Vec<EmbeddedText>> {
    let mut stmt = conn.prepare(
        "SELECT id, text, embedding FROM messages ORDER BY timestamp DESC, id DESC LIMIT ?1",
    )?;
    let mut rows = stmt.query([limit as i64])?;
    let mut corpus = Vec::new();
    while let Some(row) = rows.next()? {
        let blob: Vec<u8> = row.get(2)?;
        corpus.push(EmbeddedText {
            id: row.get(0)?,
            text: row.get(1)?,
            embedding: decode_embedding(&blob, dimension)?,
        });
    }
    Ok(corpus)
}

pub(crate) fn get_message(conn: &Connection, id: i64, dimension: usize) -> Result<Option<StoredMessage>> {
    let mut stmt = conn.prepare("SELECT id, text, embedding, timestamp FROM messages WHERE id = ?1")?;
    let mut rows = stmt.query([id])?;
    match rows.next()? {
        Some(row) => Ok(Some(row_to_stored_message(row, dimension)?)),
        None => Ok(None),
    }
}

pub(crate) fn count_messages(conn: &Connection) -> Result<usize> {
    let count: i64 = conn.query_row("SELECT COUNT(*) FROM messages", [], |row| row.get(0))?;
    Ok(count as usize)
}

fn row_to_stored_message(row: &Row, dimension: usize) -> Result<StoredMessage> {
    let blob: Vec<u8> = row.get(2)?;
    let timestamp: String = row.get(3)?;
    Ok(StoredMessage {
        id: row.get(0)?,
        text: row.get(1)?,
        embedding: decode_embedding(&blob, dimension)?,
        timestamp: parse_timestamp(&timestamp)?,
    })
}

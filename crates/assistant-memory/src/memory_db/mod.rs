//! Memory database module - SQLite-backed message log, summaries and embeddings
//!
//! Every concurrent unit of work (a chat turn, a summarization pass) checks a
//! connection out of the pool with [`MemoryDatabase::scoped`] and gives it back
//! when the [`ScopedStore`] drops. Connections are never shared between units
//! of work; SQLite's file locking serializes their writes.
pub mod embedding_codec;
pub mod message_store;
pub mod migration;
pub mod schema;
pub mod summary_store;

pub use message_store::{MessageStore, DEFAULT_SEARCH_CAP};
pub use migration::MigrationManager;
pub use schema::*;
pub use summary_store::SummaryStore;

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::Connection;
use tracing::{info, warn};

use crate::embedding::{embed_checked, EmbeddingProvider};
use crate::error::{MemoryError, Result};

const CONNECTION_PRAGMAS: &str = "PRAGMA foreign_keys = ON;
     PRAGMA busy_timeout = 5000;
     PRAGMA synchronous = NORMAL;";

pub struct MemoryDatabase {
    pub messages: MessageStore,
    pub summaries: SummaryStore,
    embedder: Arc<dyn EmbeddingProvider>,
    pool: Arc<Pool<SqliteConnectionManager>>,
}

impl MemoryDatabase {
    /// Opens (creating if needed) the database file and applies migrations.
    pub fn new(db_path: &Path, embedder: Arc<dyn EmbeddingProvider>, pool_size: u32) -> Result<Self> {
        info!("Opening memory database at: {}", db_path.display());
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let manager = SqliteConnectionManager::file(db_path)
            .with_flags(
                rusqlite::OpenFlags::SQLITE_OPEN_READ_WRITE
                    | rusqlite::OpenFlags::SQLITE_OPEN_CREATE
                    | rusqlite::OpenFlags::SQLITE_OPEN_FULL_MUTEX,
            )
            .with_init(|conn| conn.execute_batch(CONNECTION_PRAGMAS));
        let pool = Pool::builder()
            .max_size(pool_size.max(1))
            .connection_timeout(Duration::from_secs(30))
            .build(manager)?;

        {
            let mut conn = pool.get()?;
            conn.execute_batch("PRAGMA journal_mode = WAL;")?;
            MigrationManager::new(&mut conn).initialize_database()?;
            ensure_embedding_meta(&conn, embedder.as_ref())?;
        }

        info!("Memory database initialized successfully");
        Ok(Self::from_pool(Arc::new(pool), embedder))
    }

    /// Private in-memory database. SQLite gives each in-memory connection its
    /// own database, so the pool holds exactly one connection.
    pub fn new_in_memory(embedder: Arc<dyn EmbeddingProvider>) -> Result<Self> {
        let manager = SqliteConnectionManager::memory()
            .with_init(|conn| conn.execute_batch(CONNECTION_PRAGMAS));
        let pool = Pool::builder().max_size(1).build(manager)?;
        {
            let mut conn = pool.get()?;
            MigrationManager::new(&mut conn).initialize_database()?;
            ensure_embedding_meta(&conn, embedder.as_ref())?;
        }
        Ok(Self::from_pool(Arc::new(pool), embedder))
    }

    fn from_pool(pool: Arc<Pool<SqliteConnectionManager>>, embedder: Arc<dyn EmbeddingProvider>) -> Self {
        Self {
            messages: MessageStore::new(Arc::clone(&pool), Arc::clone(&embedder)),
            summaries: SummaryStore::new(Arc::clone(&pool), Arc::clone(&embedder)),
            embedder,
            pool,
        }
    }

    pub fn embedder(&self) -> &Arc<dyn EmbeddingProvider> {
        &self.embedder
    }

    /// Checks out one connection for one phase of a unit of work. Drop the
    /// store before awaiting anything slow so other units can proceed.
    pub async fn scoped(&self) -> Result<ScopedStore> {
        Ok(ScopedStore {
            conn: checkout(&self.pool).await?,
            embedder: Arc::clone(&self.embedder),
        })
    }

    pub fn get_stats(&self) -> Result<DatabaseStats> {
        let conn = self.pool.get()?;
        migration::get_database_stats(&conn)
    }

    pub fn run_maintenance(&self) -> Result<()> {
        let mut conn = self.pool.get()?;
        Ok(migration::run_maintenance(&mut conn)?)
    }
}

impl Drop for MemoryDatabase {
    fn drop(&mut self) {
        // skip the checkpoint rather than wait on a connection still checked out
        if let Some(conn) = self.pool.try_get() {
            let _ = conn.execute_batch("PRAGMA wal_checkpoint(TRUNCATE);");
        }
    }
}

/// Waits for a pooled connection on the blocking pool, so an exhausted pool
/// parks a blocking thread rather than a runtime worker.
pub(crate) async fn checkout(
    pool: &Arc<Pool<SqliteConnectionManager>>,
) -> Result<PooledConnection<SqliteConnectionManager>> {
    if let Some(conn) = pool.try_get() {
        return Ok(conn);
    }
    let pool = Arc::clone(pool);
    let conn = tokio::task::spawn_blocking(move || pool.get()).await??;
    Ok(conn)
}

/// Records the embedding dimension on first open and refuses to reinterpret
/// existing blobs with a different one.
fn ensure_embedding_meta(conn: &Connection, embedder: &dyn EmbeddingProvider) -> Result<()> {
    let dimension = embedder.dimension();
    match migration::read_meta(conn, migration::META_DIMENSION)? {
        Some(stored) => {
            let stored: usize = stored.parse().map_err(|_| {
                MemoryError::InvalidInput(format!("corrupt embedding dimension '{}'", stored))
            })?;
            if stored != dimension {
                return Err(MemoryError::InvalidEmbedding {
                    expected: stored,
                    actual: dimension,
                });
            }
        }
        None => migration::write_meta(conn, migration::META_DIMENSION, &dimension.to_string())?,
    }

    match migration::read_meta(conn, migration::META_MODEL)? {
        Some(model) if model != embedder.model_name() => {
            warn!(
                "Database embeddings were produced by '{}' but provider is '{}'; similarity scores will be unreliable",
                model,
                embedder.model_name()
            );
        }
        Some(_) => {}
        None => migration::write_meta(conn, migration::META_MODEL, embedder.model_name())?,
    }
    Ok(())
}

/// A connection owned by one unit of work plus the embedder it writes with.
///
/// Async methods take `&mut self` so the handle can live across `.await`
/// inside a spawned task.
pub struct ScopedStore {
    conn: PooledConnection<SqliteConnectionManager>,
    embedder: Arc<dyn EmbeddingProvider>,
}

impl ScopedStore {
    pub fn embedder(&self) -> &Arc<dyn EmbeddingProvider> {
        &self.embedder
    }

    pub async fn add_message(&mut self, text: &str) -> Result<StoredMessage> {
        self.add_message_at(text, Utc::now()).await
    }

    pub async fn add_message_at(&mut self, text: &str, timestamp: DateTime<Utc>) -> Result<StoredMessage> {
        let embedding = embed_checked(self.embedder.as_ref(), text).await?;
        message_store::insert_message(&self.conn, text, embedding, timestamp)
    }

    pub fn recent_messages(&self, limit: usize) -> Result<Vec<RecentMessage>> {
        message_store::recent_messages(&self.conn, limit)
    }

    pub fn all_messages_with_embeddings(&self, limit: usize) -> Result<Vec<EmbeddedText>> {
        message_store::all_messages_with_embeddings(&self.conn, limit, self.embedder.dimension())
    }

    pub async fn add_summary(
        &mut self,
        summary_text: &str,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
    ) -> Result<SummaryRecord> {
        summary_store::check_range(&start_time, &end_time)?;
        let embedding = embed_checked(self.embedder.as_ref(), summary_text).await?;
        summary_store::insert_summary(&self.conn, summary_text, embedding, start_time, end_time)
    }

    pub fn latest_summary(&self) -> Result<Option<String>> {
        Ok(summary_store::latest_summary_record(&self.conn, self.embedder.dimension())?
            .map(|s| s.summary_text))
    }

    pub fn all_summaries_with_embeddings(&self) -> Result<Vec<EmbeddedText>> {
        summary_store::all_summaries_with_embeddings(&self.conn, self.embedder.dimension())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::HashingEmbeddingProvider;

    #[tokio::test]
    async fn test_file_database_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("memory.db");
        let provider: Arc<dyn EmbeddingProvider> = Arc::new(HashingEmbeddingProvider::new(16));

        {
            let db = MemoryDatabase::new(&path, provider.clone(), 4).unwrap();
            db.messages.add_message("remember the milk").await.unwrap();
        }
        let db = MemoryDatabase::new(&path, provider, 4).unwrap();
        let recent = db.messages.recent_messages(5).unwrap();
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].text, "remember the milk");

        let stats = db.get_stats().unwrap();
        assert_eq!(stats.total_messages, 1);
        assert_eq!(stats.embedding_dimension, Some(16));
        assert_eq!(stats.embedding_model.as_deref(), Some("hashing-fnv1a"));
    }

    #[test]
    fn test_dimension_change_is_refused() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("memory.db");
        drop(MemoryDatabase::new(&path, Arc::new(HashingEmbeddingProvider::new(16)), 2).unwrap());

        let reopened = MemoryDatabase::new(&path, Arc::new(HashingEmbeddingProvider::new(32)), 2);
        assert!(matches!(
            reopened,
            Err(MemoryError::InvalidEmbedding { expected: 16, actual: 32 })
        ));
    }

    #[tokio::test]
    async fn test_scoped_store_sees_pool_writes() {
        let dir = tempfile::tempdir().unwrap();
        let db = MemoryDatabase::new(
            &dir.path().join("memory.db"),
            Arc::new(HashingEmbeddingProvider::new(16)),
            4,
        )
        .unwrap();

        let mut scoped = db.scoped().await.unwrap();
        scoped.add_message("from the scoped handle").await.unwrap();
        db.messages.add_message("from the pool").await.unwrap();

        let recent = scoped.recent_messages(10).unwrap();
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].text, "from the pool");
        assert!(scoped.latest_summary().unwrap().is_none());
    }

    #[tokio::test]
    async fn test_concurrent_units_of_work_do_not_lose_writes() {
        let dir = tempfile::tempdir().unwrap();
        let db = Arc::new(
            MemoryDatabase::new(
                &dir.path().join("memory.db"),
                Arc::new(HashingEmbeddingProvider::new(16)),
                4,
            )
            .unwrap(),
        );

        let mut handles = Vec::new();
        for worker in 0..4 {
            let db = Arc::clone(&db);
            handles.push(tokio::spawn(async move {
                let mut store = db.scoped().await?;
                for i in 0..10 {
                    store.add_message(&format!("worker {} message {}", worker, i)).await?;
                }
                Ok::<_, MemoryError>(())
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }
        assert_eq!(db.messages.count().unwrap(), 40);
    }
}

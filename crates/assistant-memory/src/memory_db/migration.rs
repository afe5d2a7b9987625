//! Database migration system

use rusqlite::{Connection, OptionalExtension, Result};
use tracing::{error, info, warn};

use crate::memory_db::schema::{self, DatabaseStats};

/// Manages database schema migrations
pub struct MigrationManager<'a> {
    conn: &'a mut Connection,
}

impl<'a> MigrationManager<'a> {
    pub fn new(conn: &'a mut Connection) -> Self {
        Self { conn }
    }

    /// Bring the schema up to the latest version
    pub fn initialize_database(&mut self) -> Result<()> {
        info!("Initializing memory database schema...");

        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS schema_version (
                version INTEGER PRIMARY KEY,
                applied_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
            )",
            [],
        )?;

        let current_version = self.get_current_version()?;
        info!("Current database schema version: {}", current_version);

        self.apply_migrations(current_version)
    }

    fn apply_migrations(&mut self, current_version: i32) -> Result<()> {
        for (version, migration_sql) in get_migrations() {
            if version <= current_version {
                continue;
            }
            info!("Applying migration {}...", version);

            let tx = self.conn.transaction()?;
            if let Err(e) = tx.execute_batch(migration_sql) {
                error!("Failed to apply migration {}: {}", version, e);
                return Err(e);
            }
            tx.execute("INSERT INTO schema_version (version) VALUES (?1)", [version])?;
            tx.commit()?;

            info!("Migration {} applied successfully", version);
        }
        Ok(())
    }

    pub fn get_current_version(&self) -> Result<i32> {
        self.conn.query_row(
            "SELECT COALESCE(MAX(version), 0) FROM schema_version",
            [],
            |row| row.get(0),
        )
    }

    pub fn has_migration_applied(&self, version: i32) -> Result<bool> {
        self.conn
            .query_row(
                "SELECT 1 FROM schema_version WHERE version = ?1",
                [version],
                |_| Ok(1),
            )
            .optional()
            .map(|result| result.is_some())
    }
}

fn get_migrations() -> Vec<(i32, &'static str)> {
    vec![
        (1, include_str!("migrations/001_initial.sql")),
        (2, include_str!("migrations/002_embedding_meta.sql")),
    ]
}

pub fn latest_version() -> i32 {
    get_migrations().last().map(|(v, _)| *v).unwrap_or(0)
}

/// Read-only statistics; safe to run on any pooled connection.
pub fn get_database_stats(conn: &Connection) -> crate::error::Result<DatabaseStats> {
    fn get_table_count(conn: &Connection, table_name: &str) -> i64 {
        conn.query_row(&format!("SELECT COUNT(*) FROM {}", table_name), [], |row| row.get(0))
            .unwrap_or_else(|e| {
                warn!("Failed to get count from table {}: {}", table_name, e);
                0
            })
    }

    let total_messages = get_table_count(conn, "messages");
    let total_summaries = get_table_count(conn, "summaries");

    let (oldest, newest): (Option<String>, Option<String>) = conn.query_row(
        "SELECT MIN(timestamp), MAX(timestamp) FROM messages",
        [],
        |row| Ok((row.get(0)?, row.get(1)?)),
    )?;
    let latest_end: Option<String> =
        conn.query_row("SELECT MAX(end_time) FROM summaries", [], |row| row.get(0))?;

    let embedding_dimension = read_meta(conn, META_DIMENSION)?.and_then(|v| v.parse().ok());
    let embedding_model = read_meta(conn, META_MODEL)?;

    let database_size_bytes: i64 = conn
        .query_row(
            "SELECT page_count * page_size FROM pragma_page_count(), pragma_page_size()",
            [],
            |row| row.get(0),
        )
        .unwrap_or(0);

    Ok(DatabaseStats {
        total_messages,
        total_summaries,
        embedding_dimension,
        embedding_model,
        oldest_message: oldest.as_deref().map(schema::parse_timestamp).transpose()?,
        newest_message: newest.as_deref().map(schema::parse_timestamp).transpose()?,
        latest_summary_end: latest_end.as_deref().map(schema::parse_timestamp).transpose()?,
        database_size_bytes,
    })
}

pub const META_DIMENSION: &str = "embedding_dimension";
pub const META_MODEL: &str = "embedding_model";

pub fn read_meta(conn: &Connection, key: &str) -> Result<Option<String>> {
    conn.query_row("SELECT value FROM embedding_meta WHERE key = ?1", [key], |row| row.get(0))
        .optional()
}

pub fn write_meta(conn: &Connection, key: &str, value: &str) -> Result<()> {
    conn.execute(
        "INSERT INTO embedding_meta (key, value) VALUES (?1, ?2)
         ON CONFLICT(key) DO UPDATE SET value = excluded.value",
        [key, value],
    )?;
    Ok(())
}

/// Run database maintenance tasks
pub fn run_maintenance(conn: &mut Connection) -> Result<()> {
    info!("Running database maintenance...");
    conn.execute_batch("ANALYZE")?;
    let integrity: String = conn.query_row("PRAGMA integrity_check", [], |row| row.get(0))?;
    if integrity != "ok" {
        warn!("Integrity check reported: {}", integrity);
    }
    info!("Database maintenance completed");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fresh_database_reaches_latest_version() {
        let mut conn = Connection::open_in_memory().unwrap();
        let mut migrator = MigrationManager::new(&mut conn);
        migrator.initialize_database().unwrap();
        assert_eq!(migrator.get_current_version().unwrap(), latest_version());
        assert!(migrator.has_migration_applied(1).unwrap());
        assert!(migrator.has_migration_applied(2).unwrap());
        assert!(!migrator.has_migration_applied(99).unwrap());
    }

    #[test]
    fn test_initialize_twice_is_noop() {
        let mut conn = Connection::open_in_memory().unwrap();
        MigrationManager::new(&mut conn).initialize_database().unwrap();
        MigrationManager::new(&mut conn).initialize_database().unwrap();
        let rows: i64 = conn
            .query_row("SELECT COUNT(*) FROM schema_version", [], |row| row.get(0))
            .unwrap();
        assert_eq!(rows, latest_version() as i64);
    }

    #[test]
    fn test_summary_time_range_check() {
        let mut conn = Connection::open_in_memory().unwrap();
        MigrationManager::new(&mut conn).initialize_database().unwrap();
        let result = conn.execute(
            "INSERT INTO summaries (summary_text, embedding, start_time, end_time)
             VALUES ('s', x'00000000', '2024-01-02T00:00:00.000000Z', '2024-01-01T00:00:00.000000Z')",
            [],
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_meta_upsert_and_stats() {
        let mut conn = Connection::open_in_memory().unwrap();
        MigrationManager::new(&mut conn).initialize_database().unwrap();
        write_meta(&conn, META_DIMENSION, "8").unwrap();
        write_meta(&conn, META_DIMENSION, "16").unwrap();
        assert_eq!(read_meta(&conn, META_DIMENSION).unwrap().as_deref(), Some("16"));

        let stats = get_database_stats(&conn).unwrap();
        assert_eq!(stats.total_messages, 0);
        assert_eq!(stats.total_summaries, 0);
        assert_eq!(stats.embedding_dimension, Some(16));
        assert!(stats.newest_message.is_none());
        run_maintenance(&mut conn).unwrap();
    }
}

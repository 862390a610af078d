//! SQLite-based progress store.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use fsd_core::{FsdError, PartitionRecord, ProgressStore, Result};
use rusqlite::{Connection, OptionalExtension, params};
use std::path::Path;
use std::sync::Mutex;
use tracing::{debug, instrument};

fn store_err(e: impl ToString) -> FsdError {
    FsdError::Store(e.to_string())
}

/// Progress persisted in a SQLite database, surviving process restarts.
#[derive(Debug)]
pub struct SqliteProgress {
    conn: Mutex<Connection>,
}

impl SqliteProgress {
    /// Open or create a store at the given path.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened or schema creation fails.
    pub fn new(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(path).map_err(store_err)?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.initialize_schema()?;
        Ok(store)
    }

    /// Create an in-memory store; progress is lost when it is dropped.
    ///
    /// # Errors
    /// Returns an error if schema creation fails.
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(store_err)?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.initialize_schema()?;
        Ok(store)
    }

    fn initialize_schema(&self) -> Result<()> {
        let conn = self.conn.lock().map_err(store_err)?;
        conn.execute(
            "CREATE TABLE IF NOT EXISTS partitions (
                partition TEXT PRIMARY KEY NOT NULL,
                rows INTEGER NOT NULL,
                completed_at TEXT NOT NULL
            )",
            [],
        )
        .map_err(store_err)?;
        debug!("SQLite progress schema initialized");
        Ok(())
    }
}

#[async_trait]
impl ProgressStore for SqliteProgress {
    async fn is_completed(&self, partition: &str) -> Result<bool> {
        let conn = self.conn.lock().map_err(store_err)?;
        let found: Option<i64> = conn
            .query_row(
                "SELECT 1 FROM partitions WHERE partition = ?1",
                params![partition],
                |row| row.get(0),
            )
            .optional()
            .map_err(store_err)?;
        Ok(found.is_some())
    }

    #[instrument(skip(self))]
    async fn mark_completed(&self, partition: &str, rows: usize) -> Result<()> {
        let record = PartitionRecord::new(partition, rows);
        let rows = i64::try_from(record.rows).map_err(store_err)?;
        let conn = self.conn.lock().map_err(store_err)?;
        conn.execute(
            "INSERT OR REPLACE INTO partitions (partition, rows, completed_at)
             VALUES (?1, ?2, ?3)",
            params![record.partition, rows, record.completed_at.to_rfc3339()],
        )
        .map_err(store_err)?;
        debug!("Marked partition completed");
        Ok(())
    }

    async fn completed(&self) -> Result<Vec<PartitionRecord>> {
        let conn = self.conn.lock().map_err(store_err)?;
        let mut stmt = conn
            .prepare("SELECT partition, rows, completed_at FROM partitions ORDER BY partition ASC")
            .map_err(store_err)?;
        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, i64>(1)?,
                    row.get::<_, String>(2)?,
                ))
            })
            .map_err(store_err)?;

        let mut records = Vec::new();
        for row in rows {
            let (partition, rows, completed_at) = row.map_err(store_err)?;
            records.push(PartitionRecord {
                partition,
                rows: usize::try_from(rows).map_err(store_err)?,
                completed_at: DateTime::parse_from_rfc3339(&completed_at)
                    .map_err(store_err)?
                    .with_timezone(&Utc),
            });
        }
        Ok(records)
    }

    #[instrument(skip(self))]
    async fn clear(&self) -> Result<()> {
        let conn = self.conn.lock().map_err(store_err)?;
        let removed = conn.execute("DELETE FROM partitions", []).map_err(store_err)?;
        debug!("Cleared {} partition records", removed);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mark_and_query() {
        let store = SqliteProgress::in_memory().unwrap();
        assert!(!store.is_completed("2024q1").await.unwrap());

        store.mark_completed("2024q2", 7).await.unwrap();
        store.mark_completed("2024q1", 5).await.unwrap();
        store.mark_completed("2024q1", 6).await.unwrap();

        assert!(store.is_completed("2024q1").await.unwrap());
        let done = store.completed().await.unwrap();
        assert_eq!(done.len(), 2);
        assert_eq!(done[0].partition, "2024q1");
        assert_eq!(done[0].rows, 6);
    }

    #[tokio::test]
    async fn test_progress_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("progress.db");

        {
            let store = SqliteProgress::new(&path).unwrap();
            store.mark_completed("2023q4", 11).await.unwrap();
        }

        let store = SqliteProgress::new(&path).unwrap();
        assert!(store.is_completed("2023q4").await.unwrap());
        store.clear().await.unwrap();
        assert!(store.completed().await.unwrap().is_empty());
    }
}

use std::path::Path;
use std::sync::Mutex;

use futures::future::BoxFuture;
use rusqlite::{params, Connection, OptionalExtension};
use tracing::debug;

use marketmate_core::error::{MarketError, Result};
use marketmate_core::traits::SnapshotStore;
use marketmate_core::types::Snapshot;

const SCHEMA: &str = "CREATE TABLE IF NOT EXISTS snapshots (
    key TEXT PRIMARY KEY,
    taken_at TEXT NOT NULL,
    body TEXT NOT NULL
);";

/// SQLite-backed snapshot store, one row per key.
pub struct SqliteSnapshotStore {
    conn: Mutex<Connection>,
}

fn db_err(e: rusqlite::Error) -> MarketError {
    MarketError::Storage(e.to_string())
}

impl SqliteSnapshotStore {
    /// Open or create a SQLite database at the given path.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                MarketError::Storage(format!("Failed to create db directory: {}", e))
            })?;
        }

        let conn = Connection::open(path).map_err(db_err)?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")
            .map_err(db_err)?;
        conn.execute_batch(SCHEMA).map_err(db_err)?;

        debug!(path = %path.display(), "Snapshot database opened");
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Open an in-memory database (for testing).
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(db_err)?;
        conn.execute_batch(SCHEMA).map_err(db_err)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }
}

impl SnapshotStore for SqliteSnapshotStore {
    fn get(&self, key: &str) -> BoxFuture<'_, Result<Option<Snapshot>>> {
        let key = key.to_string();

        Box::pin(async move {
            let conn = self
                .conn
                .lock()
                .map_err(|e| MarketError::Storage(e.to_string()))?;

            let body: Option<String> = conn
                .query_row(
                    "SELECT body FROM snapshots WHERE key = ?1",
                    params![key],
                    |row| row.get(0),
                )
                .optional()
                .map_err(db_err)?;

            match body {
                Some(body) => serde_json::from_str(&body)
                    .map(Some)
                    .map_err(|e| MarketError::Storage(format!("corrupt snapshot {}: {}", key, e))),
                None => Ok(None),
            }
        })
    }

    fn put(&self, key: &str, snapshot: Snapshot) -> BoxFuture<'_, Result<()>> {
        let key = key.to_string();

        Box::pin(async move {
            let body = serde_json::to_string(&snapshot)?;
            let conn = self
                .conn
                .lock()
                .map_err(|e| MarketError::Storage(e.to_string()))?;

            conn.execute(
                "INSERT OR REPLACE INTO snapshots (key, taken_at, body) VALUES (?1, ?2, ?3)",
                params![key, snapshot.taken_at.to_rfc3339(), body],
            )
            .map_err(db_err)?;
            Ok(())
        })
    }
}

//! Persistence adapter: a transactional key/row store with BLOB columns.
//!
//! Owns the single `rusqlite::Connection` for one engine instance. Mirrors
//! the reference workspace's `Memory::open` (WAL journal, `CREATE TABLE IF
//! NOT EXISTS` schema bootstrap) but with the `nodes` / `file_versions`
//! schema from spec §4.C instead of a flat `memories` table.

use std::path::Path;
use std::time::Duration;

use rusqlite::Connection;

use crate::error::StorageResult;

pub struct Database {
    pub(crate) conn: Connection,
}

impl Database {
    /// Open (creating if missing) the database file and ensure the schema.
    pub fn open(path: &Path) -> StorageResult<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path)?;
        conn.busy_timeout(Duration::from_secs(5))?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self { conn })
    }

    /// In-memory database, used by tests.
    pub fn open_in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self { conn })
    }

    /// Run `f` inside one strict-serializable transaction. On any error
    /// returned from `f`, the transaction is rolled back and the error is
    /// surfaced to the caller; nothing committed by `f` becomes visible.
    pub fn write_transaction<T, F>(&mut self, f: F) -> StorageResult<T>
    where
        F: FnOnce(&rusqlite::Transaction) -> StorageResult<T>,
    {
        let tx = self.conn.transaction()?;
        let result = f(&tx)?;
        tx.commit()?;
        Ok(result)
    }
}

const SCHEMA: &str = r#"
PRAGMA journal_mode = WAL;

CREATE TABLE IF NOT EXISTS nodes (
    id            TEXT PRIMARY KEY,
    session       TEXT NOT NULL,
    path          TEXT NOT NULL,
    name          TEXT NOT NULL,
    parent_path   TEXT,
    type          TEXT NOT NULL CHECK (type IN ('file', 'directory')),
    created_at    TEXT NOT NULL,
    updated_at    TEXT NOT NULL,
    latest_version INTEGER
);

CREATE UNIQUE INDEX IF NOT EXISTS idx_nodes_session_path ON nodes(session, path);
CREATE INDEX IF NOT EXISTS idx_nodes_session_parent ON nodes(session, parent_path);

CREATE TABLE IF NOT EXISTS file_versions (
    id          TEXT PRIMARY KEY,
    node_id     TEXT NOT NULL REFERENCES nodes(id),
    version     INTEGER NOT NULL,
    content     BLOB NOT NULL,
    created_at  TEXT NOT NULL
);

CREATE UNIQUE INDEX IF NOT EXISTS idx_file_versions_node_version ON file_versions(node_id, version);
"#;

// SPDX-FileCopyrightText: 2026 Amora Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Database lifecycle: open the SQLite file, apply pragmas, create schema.

use std::path::Path;

use amora_core::AmoraError;
use tokio_rusqlite::Connection;
use tracing::info;

/// Schema applied on every open. All statements are idempotent.
const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS kv_entries (
        key TEXT PRIMARY KEY NOT NULL,
        value TEXT NOT NULL,
        expires_at_ms INTEGER
    );

    CREATE TABLE IF NOT EXISTS memory_records (
        id TEXT PRIMARY KEY NOT NULL,
        conversation_id TEXT NOT NULL,
        memory_type TEXT NOT NULL,
        content TEXT NOT NULL,
        importance REAL NOT NULL DEFAULT 0.5,
        origin TEXT NOT NULL,
        is_deleted INTEGER NOT NULL DEFAULT 0,
        created_at_ms INTEGER NOT NULL,
        updated_at_ms INTEGER NOT NULL
    );

    CREATE INDEX IF NOT EXISTS idx_memory_records_conv
        ON memory_records(conversation_id, created_at_ms);

    CREATE TABLE IF NOT EXISTS memory_documents (
        id TEXT PRIMARY KEY NOT NULL,
        content TEXT NOT NULL,
        embedding BLOB NOT NULL,
        conversation_id TEXT NOT NULL,
        message_role TEXT NOT NULL,
        memory_type TEXT NOT NULL,
        timestamp_ms INTEGER NOT NULL
    );

    CREATE INDEX IF NOT EXISTS idx_memory_documents_conv
        ON memory_documents(conversation_id);
";

/// Async handle to the Amora SQLite database.
///
/// Cloning is cheap; all clones share one underlying connection task.
#[derive(Clone)]
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Opens (creating if needed) the database at `path` and applies
    /// the schema.
    pub async fn open(path: impl AsRef<Path>, wal_mode: bool) -> Result<Self, AmoraError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(AmoraError::storage)?;
            }
        }

        let conn = Connection::open(path).await.map_err(AmoraError::storage)?;
        apply_schema(&conn, wal_mode).await?;
        info!(path = %path.display(), wal_mode, "database opened");
        Ok(Self { conn })
    }

    /// Opens an in-memory database with the schema applied.
    pub async fn open_in_memory() -> Result<Self, AmoraError> {
        let conn = Connection::open_in_memory()
            .await
            .map_err(AmoraError::storage)?;
        apply_schema(&conn, false).await?;
        Ok(Self { conn })
    }

    /// The shared connection handle.
    pub fn connection(&self) -> Connection {
        self.conn.clone()
    }
}

async fn apply_schema(conn: &Connection, wal_mode: bool) -> Result<(), AmoraError> {
    conn.call(move |conn| -> rusqlite::Result<()> {
        if wal_mode {
            conn.pragma_update(None, "journal_mode", "WAL")?;
        }
        conn.pragma_update(None, "foreign_keys", "ON")?;
        conn.execute_batch(SCHEMA)?;
        Ok(())
    })
    .await
    .map_err(AmoraError::storage)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn open_creates_parent_dirs_and_schema() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/amora.db");
        let db = Database::open(&path, true).await.unwrap();

        let count: i64 = db
            .connection()
            .call(|conn| -> rusqlite::Result<i64> {
                Ok(conn.query_row(
                    "SELECT count(*) FROM sqlite_master WHERE type = 'table' AND name IN ('kv_entries', 'memory_records', 'memory_documents')",
                    [],
                    |row| row.get(0),
                )?)
            })
            .await
            .unwrap();
        assert_eq!(count, 3);
    }

    #[tokio::test]
    async fn schema_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("amora.db");
        Database::open(&path, false).await.unwrap();
        Database::open(&path, false).await.unwrap();
    }
}

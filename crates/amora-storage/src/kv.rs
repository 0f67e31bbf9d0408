// SPDX-FileCopyrightText: 2026 Amora Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite implementation of the key-value adapter with lazy TTL expiry.

use std::time::Duration;

use amora_core::{AmoraError, KvAdapter};
use async_trait::async_trait;
use chrono::Utc;

use crate::database::Database;

/// Durable key-value store over the `kv_entries` table.
///
/// Expiry is lazy: a `get` that finds an expired row deletes it and
/// reports the key as absent.
pub struct SqliteKvStore {
    db: Database,
}

impl SqliteKvStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }
}

#[async_trait]
impl KvAdapter for SqliteKvStore {
    async fn get(&self, key: &str) -> Result<Option<String>, AmoraError> {
        let key = key.to_string();
        let now_ms = Utc::now().timestamp_millis();
        self.db
            .connection()
            .call(move |conn| -> rusqlite::Result<Option<String>> {
                let row: Option<(String, Option<i64>)> = conn
                    .query_row(
                        "SELECT value, expires_at_ms FROM kv_entries WHERE key = ?1",
                        rusqlite::params![key],
                        |row| Ok((row.get(0)?, row.get(1)?)),
                    )
                    .map(Some)
                    .or_else(|e| match e {
                        rusqlite::Error::QueryReturnedNoRows => Ok(None),
                        other => Err(other),
                    })?;

                match row {
                    Some((_, Some(expires_at_ms))) if expires_at_ms <= now_ms => {
                        conn.execute(
                            "DELETE FROM kv_entries WHERE key = ?1",
                            rusqlite::params![key],
                        )?;
                        Ok(None)
                    }
                    Some((value, _)) => Ok(Some(value)),
                    None => Ok(None),
                }
            })
            .await
            .map_err(AmoraError::storage)
    }

    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<(), AmoraError> {
        let key = key.to_string();
        let value = value.to_string();
        let expires_at_ms = ttl.map(|ttl| Utc::now().timestamp_millis() + ttl.as_millis() as i64);
        self.db
            .connection()
            .call(move |conn| -> rusqlite::Result<()> {
                conn.execute(
                    "INSERT INTO kv_entries (key, value, expires_at_ms) VALUES (?1, ?2, ?3)
                     ON CONFLICT(key) DO UPDATE SET value = ?2, expires_at_ms = ?3",
                    rusqlite::params![key, value, expires_at_ms],
                )?;
                Ok(())
            })
            .await
            .map_err(AmoraError::storage)
    }

    async fn delete(&self, key: &str) -> Result<(), AmoraError> {
        let key = key.to_string();
        self.db
            .connection()
            .call(move |conn| -> rusqlite::Result<()> {
                conn.execute(
                    "DELETE FROM kv_entries WHERE key = ?1",
                    rusqlite::params![key],
                )?;
                Ok(())
            })
            .await
            .map_err(AmoraError::storage)
    }
}

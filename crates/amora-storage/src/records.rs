// SPDX-FileCopyrightText: 2026 Amora Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Persistent store for structured memory records.

use amora_core::{AmoraError, MemoryType, RecordOrigin, StructuredMemoryRecord};
use chrono::Utc;
use tokio_rusqlite::Connection;
use uuid::Uuid;

use crate::database::Database;

/// Store for typed facts in the `memory_records` table.
///
/// Rows are soft-deleted via `is_deleted`; reads only ever see live
/// rows, newest first.
pub struct RecordStore {
    conn: Connection,
}

impl RecordStore {
    pub fn new(db: Database) -> Self {
        Self {
            conn: db.connection(),
        }
    }

    /// Inserts a batch of records in one transaction.
    pub async fn insert_batch(&self, records: &[StructuredMemoryRecord]) -> Result<(), AmoraError> {
        if records.is_empty() {
            return Ok(());
        }
        let records = records.to_vec();
        let now_ms = Utc::now().timestamp_millis();
        self.conn
            .call(move |conn| -> rusqlite::Result<()> {
                let tx = conn.transaction()?;
                for record in &records {
                    let origin = serde_json::to_string(&record.origin).map_err(|e| {
                        rusqlite::Error::ToSqlConversionFailure(Box::new(e))
                    })?;
                    tx.execute(
                        "INSERT INTO memory_records
                             (id, conversation_id, memory_type, content, importance, origin, is_deleted, created_at_ms, updated_at_ms)
                         VALUES (?1, ?2, ?3, ?4, ?5, ?6, 0, ?7, ?8)",
                        rusqlite::params![
                            Uuid::new_v4().to_string(),
                            record.conversation_id,
                            record.memory_type.as_str(),
                            record.content,
                            record.importance,
                            origin,
                            record.timestamp_ms,
                            now_ms,
                        ],
                    )?;
                }
                tx.commit()?;
                Ok(())
            })
            .await
            .map_err(AmoraError::storage)
    }

    /// Returns up to `limit` live records for a conversation, most
    /// recent first.
    pub async fn fetch_recent(
        &self,
        conversation_id: &str,
        limit: usize,
    ) -> Result<Vec<StructuredMemoryRecord>, AmoraError> {
        let conversation_id = conversation_id.to_string();
        self.conn
            .call(move |conn| -> rusqlite::Result<Vec<StructuredMemoryRecord>> {
                let mut stmt = conn.prepare(
                    "SELECT conversation_id, memory_type, content, importance, origin, created_at_ms
                     FROM memory_records
                     WHERE conversation_id = ?1 AND is_deleted = 0
                     ORDER BY created_at_ms DESC
                     LIMIT ?2",
                )?;
                let records = stmt
                    .query_map(rusqlite::params![conversation_id, limit as i64], |row| {
                        Ok(row_to_record(row))
                    })?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(records)
            })
            .await
            .map_err(AmoraError::storage)
    }
}

fn row_to_record(row: &rusqlite::Row) -> StructuredMemoryRecord {
    let memory_type: String = row.get(1).unwrap_or_default();
    let origin: String = row.get(4).unwrap_or_default();

    StructuredMemoryRecord {
        conversation_id: row.get(0).unwrap_or_default(),
        memory_type: MemoryType::from_str_value(&memory_type),
        content: row.get(2).unwrap_or_default(),
        importance: row.get(3).unwrap_or(0.5),
        // Rows written before an origin variant existed parse as Fallback.
        origin: serde_json::from_str(&origin).unwrap_or(RecordOrigin::Fallback),
        timestamp_ms: row.get(5).unwrap_or_default(),
    }
}

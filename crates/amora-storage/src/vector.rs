// SPDX-FileCopyrightText: 2026 Amora Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite-backed vector store with brute-force cosine search.
//!
//! Embeddings are stored as little-endian f32 BLOBs. Search loads every
//! row, applies the metadata filter in process, and ranks by cosine
//! similarity. Collections here are per-user conversation memories, so
//! a linear scan stays well within budget.

use std::sync::Arc;

use amora_core::{
    filter, AmoraError, Document, DocumentMetadata, EmbeddingAdapter, MemoryType, RelevanceSignal,
    Role, VectorStoreAdapter,
};
use async_trait::async_trait;
use tokio_rusqlite::Connection;
use tracing::debug;

use crate::database::Database;

/// Convert f32 vector to bytes for SQLite BLOB storage.
pub fn vec_to_blob(vec: &[f32]) -> Vec<u8> {
    let mut blob = Vec::with_capacity(vec.len() * 4);
    for v in vec {
        blob.extend_from_slice(&v.to_le_bytes());
    }
    blob
}

/// Convert a SQLite BLOB back to an f32 vector.
pub fn blob_to_vec(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect()
}

/// Cosine similarity between two vectors.
///
/// Returns 0.0 for mismatched dimensions or zero-norm inputs.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;
    for (x, y) in a.iter().zip(b.iter()) {
        dot += f64::from(*x) * f64::from(*y);
        norm_a += f64::from(*x) * f64::from(*x);
        norm_b += f64::from(*y) * f64::from(*y);
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a.sqrt() * norm_b.sqrt())
}

/// Vector store over the `memory_documents` table.
pub struct SqliteVectorStore {
    conn: Connection,
    embedder: Arc<dyn EmbeddingAdapter>,
}

impl SqliteVectorStore {
    pub fn new(db: Database, embedder: Arc<dyn EmbeddingAdapter>) -> Self {
        Self {
            conn: db.connection(),
            embedder,
        }
    }

    async fn load_all(&self) -> Result<Vec<(Document, Vec<f32>)>, AmoraError> {
        self.conn
            .call(|conn| -> rusqlite::Result<Vec<(Document, Vec<f32>)>> {
                let mut stmt = conn.prepare(
                    "SELECT id, content, embedding, conversation_id, message_role, memory_type, timestamp_ms
                     FROM memory_documents",
                )?;
                let rows = stmt
                    .query_map([], |row| {
                        let embedding_blob: Vec<u8> = row.get(2)?;
                        let message_role: String = row.get(4)?;
                        let memory_type: String = row.get(5)?;
                        let document = Document {
                            id: row.get(0)?,
                            text: row.get(1)?,
                            metadata: DocumentMetadata {
                                conversation_id: row.get(3)?,
                                message_role: Role::from_str_value(&message_role),
                                memory_type: MemoryType::from_str_value(&memory_type),
                                timestamp_ms: row.get(6)?,
                            },
                            relevance: None,
                        };
                        Ok((document, blob_to_vec(&embedding_blob)))
                    })?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(rows)
            })
            .await
            .map_err(AmoraError::storage)
    }
}

#[async_trait]
impl VectorStoreAdapter for SqliteVectorStore {
    async fn add_documents(&self, documents: &[Document]) -> Result<(), AmoraError> {
        if documents.is_empty() {
            return Ok(());
        }

        let texts: Vec<String> = documents.iter().map(|d| d.text.clone()).collect();
        let embeddings = self.embedder.embed(&texts).await?;
        if embeddings.len() != documents.len() {
            return Err(AmoraError::Internal(format!(
                "embedder returned {} vectors for {} documents",
                embeddings.len(),
                documents.len()
            )));
        }

        let rows: Vec<(Document, Vec<u8>)> = documents
            .iter()
            .zip(embeddings.iter())
            .map(|(doc, embedding)| (doc.clone(), vec_to_blob(embedding)))
            .collect();

        self.conn
            .call(move |conn| -> rusqlite::Result<()> {
                let tx = conn.transaction()?;
                for (doc, blob) in &rows {
                    tx.execute(
                        "INSERT OR REPLACE INTO memory_documents
                             (id, content, embedding, conversation_id, message_role, memory_type, timestamp_ms)
                         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                        rusqlite::params![
                            doc.id,
                            doc.text,
                            blob,
                            doc.metadata.conversation_id,
                            doc.metadata.message_role.as_str(),
                            doc.metadata.memory_type.as_str(),
                            doc.metadata.timestamp_ms,
                        ],
                    )?;
                }
                tx.commit()?;
                Ok(())
            })
            .await
            .map_err(AmoraError::storage)
    }

    async fn similarity_search(
        &self,
        query: &str,
        top_k: usize,
        threshold: f64,
        filter: &str,
    ) -> Result<Vec<Document>, AmoraError> {
        let clauses = filter::parse(filter)?;

        let query_embedding = self
            .embedder
            .embed(std::slice::from_ref(&query.to_string()))
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| AmoraError::Internal("embedder returned no query vector".into()))?;

        let mut scored: Vec<(Document, f64)> = self
            .load_all()
            .await?
            .into_iter()
            .filter(|(doc, _)| {
                clauses
                    .iter()
                    .all(|c| doc.metadata.field(&c.field).as_deref() == Some(c.value.as_str()))
            })
            .map(|(doc, embedding)| {
                let sim = cosine_similarity(&query_embedding, &embedding);
                (doc, sim)
            })
            .filter(|(_, sim)| *sim >= threshold)
            .collect();

        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(top_k);
        debug!(hits = scored.len(), top_k, threshold, "similarity search");

        Ok(scored
            .into_iter()
            .map(|(mut doc, sim)| {
                doc.relevance = Some(RelevanceSignal::Similarity(sim));
                doc
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// One-hot embedder keyed on byte length: identical texts embed
    /// identically (similarity 1.0), texts of different lengths are
    /// orthogonal (similarity 0.0).
    struct LengthEmbedder;

    #[async_trait]
    impl EmbeddingAdapter for LengthEmbedder {
        async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, AmoraError> {
            Ok(texts
                .iter()
                .map(|t| {
                    let mut v = vec![0.0f32; 32];
                    v[t.len() % 32] = 1.0;
                    v
                })
                .collect())
        }
    }

    fn doc(id: &str, text: &str, conversation_id: &str) -> Document {
        Document {
            id: id.to_string(),
            text: text.to_string(),
            metadata: DocumentMetadata {
                conversation_id: conversation_id.to_string(),
                message_role: Role::User,
                memory_type: MemoryType::Conversation,
                timestamp_ms: 1_700_000_000_000,
            },
            relevance: None,
        }
    }

    async fn store() -> SqliteVectorStore {
        SqliteVectorStore::new(
            Database::open_in_memory().await.unwrap(),
            Arc::new(LengthEmbedder),
        )
    }

    #[test]
    fn blob_round_trip() {
        let original: Vec<f32> = (0..384).map(|i| i as f32 / 384.0).collect();
        let blob = vec_to_blob(&original);
        assert_eq!(blob.len(), 384 * 4);
        let restored = blob_to_vec(&blob);
        assert_eq!(original, restored);
    }

    #[test]
    fn cosine_edge_cases() {
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[1.0, 0.0]), 1.0);
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]), 0.0);
        assert_eq!(cosine_similarity(&[1.0], &[1.0, 0.0]), 0.0);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
        assert_eq!(cosine_similarity(&[], &[]), 0.0);
    }

    #[tokio::test]
    async fn search_respects_filter_and_threshold() {
        let vs = store().await;
        vs.add_documents(&[
            doc("d1", "coffee", "conv-1"),
            doc("d2", "coffee", "conv-2"),
            doc("d3", "something else", "conv-1"),
        ])
        .await
        .unwrap();

        let hits = vs
            .similarity_search("coffee", 10, 0.65, "conversation_id == 'conv-1'")
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, "d1");
        match hits[0].relevance {
            Some(RelevanceSignal::Similarity(sim)) => assert!((sim - 1.0).abs() < 1e-9),
            other => panic!("expected similarity relevance, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn empty_filter_matches_all_conversations() {
        let vs = store().await;
        vs.add_documents(&[doc("d1", "coffee", "conv-1"), doc("d2", "coffee", "conv-2")])
            .await
            .unwrap();

        let hits = vs.similarity_search("coffee", 10, 0.5, "").await.unwrap();
        assert_eq!(hits.len(), 2);
    }

    #[tokio::test]
    async fn top_k_bounds_results() {
        let vs = store().await;
        let docs: Vec<Document> = (0..5)
            .map(|i| doc(&format!("d{i}"), "coffee", "conv-1"))
            .collect();
        vs.add_documents(&docs).await.unwrap();

        let hits = vs.similarity_search("coffee", 2, 0.5, "").await.unwrap();
        assert_eq!(hits.len(), 2);
    }

    #[tokio::test]
    async fn malformed_filter_is_an_error() {
        let vs = store().await;
        let result = vs
            .similarity_search("coffee", 10, 0.5, "conversation_id = broken")
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn unknown_filter_field_matches_nothing() {
        let vs = store().await;
        vs.add_documents(&[doc("d1", "coffee", "conv-1")])
            .await
            .unwrap();

        let hits = vs
            .similarity_search("coffee", 10, 0.5, "nonexistent == 'x'")
            .await
            .unwrap();
        assert!(hits.is_empty());
    }
}

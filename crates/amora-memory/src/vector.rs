// SPDX-FileCopyrightText: 2026 Amora Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Long-term vector memory over an embedding-indexed store.
//!
//! Every turn's USER/ASSISTANT text is written as a document scoped to
//! its conversation; recall is a similarity search behind an equality
//! filter on conversation id and memory type. Both directions are
//! best-effort: failures are logged and read as "no memory".

use std::sync::Arc;

use amora_config::model::VectorConfig;
use amora_core::{
    filter, ChatMessage, Document, DocumentMetadata, MemoryType, RelevanceSignal, Role,
    VectorStoreAdapter,
};
use chrono::Utc;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::types::{CandidateOrigin, MemoryCandidate};

pub struct VectorMemoryService {
    store: Arc<dyn VectorStoreAdapter>,
    config: VectorConfig,
}

impl VectorMemoryService {
    pub fn new(store: Arc<dyn VectorStoreAdapter>, config: VectorConfig) -> Self {
        Self { store, config }
    }

    /// Embeds and stores the turn's USER/ASSISTANT messages. Best-effort;
    /// a store failure is logged and swallowed by the caller's boundary.
    pub async fn save_messages(
        &self,
        conversation_id: &str,
        messages: &[ChatMessage],
    ) -> Result<(), amora_core::AmoraError> {
        if !self.config.enabled || conversation_id.trim().is_empty() || messages.is_empty() {
            return Ok(());
        }

        let now_ms = Utc::now().timestamp_millis();
        let documents: Vec<Document> = messages
            .iter()
            .filter(|m| m.role != Role::System && m.has_text())
            .map(|m| Document {
                id: Uuid::new_v4().to_string(),
                text: format!("{}: {}", m.role.label(), m.text),
                metadata: DocumentMetadata {
                    conversation_id: conversation_id.to_string(),
                    message_role: m.role,
                    memory_type: MemoryType::Conversation,
                    timestamp_ms: now_ms,
                },
                relevance: None,
            })
            .collect();

        if documents.is_empty() {
            return Ok(());
        }
        self.store.add_documents(&documents).await?;
        debug!(conversation_id = %conversation_id, count = documents.len(), "conversation memories embedded");
        Ok(())
    }

    /// Similarity search scoped to one conversation. Empty query, empty
    /// conversation id, or zero `top_k` short-circuits without touching
    /// the backend; backend failures yield an empty list.
    pub async fn search_candidates(
        &self,
        conversation_id: &str,
        query: &str,
        top_k: usize,
    ) -> Vec<MemoryCandidate> {
        if !self.config.enabled
            || conversation_id.trim().is_empty()
            || query.trim().is_empty()
            || top_k == 0
        {
            return Vec::new();
        }

        let filter_expr = format!(
            "conversation_id == '{}' && memory_type == 'conversation'",
            filter::escape_value(conversation_id)
        );
        let documents = match self
            .store
            .similarity_search(query, top_k, self.config.similarity_threshold, &filter_expr)
            .await
        {
            Ok(documents) => documents,
            Err(e) => {
                warn!(conversation_id = %conversation_id, error = %e, "vector search failed");
                return Vec::new();
            }
        };

        documents
            .into_iter()
            .filter(|d| !d.text.trim().is_empty())
            .map(|d| MemoryCandidate {
                memory_type: d.metadata.memory_type,
                content: d.text,
                similarity: Some(normalize_relevance(d.relevance)),
                importance: None,
                timestamp_ms: d.metadata.timestamp_ms,
                final_score: 0.0,
                origin: CandidateOrigin::Vector {
                    message_role: d.metadata.message_role,
                },
                rerank: None,
            })
            .collect()
    }

    /// Newline-joined candidate contents, for direct prompt injection.
    pub async fn retrieve_relevant_memories(
        &self,
        conversation_id: &str,
        query: &str,
        top_k: usize,
    ) -> String {
        let candidates = self.search_candidates(conversation_id, query, top_k).await;
        candidates
            .iter()
            .map(|c| c.content.as_str())
            .filter(|c| !c.trim().is_empty())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Collapse whatever relevance figure the backend reported into one
/// `[0,1]` similarity. Absent relevance reads as a neutral 0.5.
fn normalize_relevance(relevance: Option<RelevanceSignal>) -> f64 {
    match relevance {
        Some(RelevanceSignal::Score(s)) => s.clamp(0.0, 1.0),
        Some(RelevanceSignal::Similarity(s)) => s.clamp(0.0, 1.0),
        Some(RelevanceSignal::Distance(d)) => (1.0 - d).clamp(0.0, 1.0),
        None => 0.5,
    }
}

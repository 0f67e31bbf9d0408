// SPDX-FileCopyrightText: 2026 Amora Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Hybrid recall: structured facts and vector memories merged, then
//! reranked into one list.
//!
//! Retrieval is two-stage by design: each source fetches cheaply with
//! its own native scoring, and rerank puts everything on one scale.

use std::sync::Arc;
use std::time::Instant;

use amora_config::model::RecallConfig;
use tracing::info;

use crate::extractor::StructuredMemoryService;
use crate::rerank::RerankService;
use crate::types::MemoryCandidate;
use crate::vector::VectorMemoryService;

const DEFAULT_TOP_K: usize = 5;

pub struct HybridRecallService {
    structured: Arc<StructuredMemoryService>,
    vector: Arc<VectorMemoryService>,
    rerank: RerankService,
    config: RecallConfig,
}

impl HybridRecallService {
    pub fn new(
        structured: Arc<StructuredMemoryService>,
        vector: Arc<VectorMemoryService>,
        rerank: RerankService,
        config: RecallConfig,
    ) -> Self {
        Self {
            structured,
            vector,
            rerank,
            config,
        }
    }

    /// Top-k memories relevant to `query`, across both long-term sources.
    pub async fn recall(
        &self,
        conversation_id: &str,
        query: &str,
        top_k: usize,
    ) -> Vec<MemoryCandidate> {
        if conversation_id.trim().is_empty() || query.trim().is_empty() {
            return Vec::new();
        }
        let safe_top_k = if top_k == 0 { DEFAULT_TOP_K } else { top_k };
        let candidate_limit = safe_top_k.max(self.config.candidate_limit);
        let start = Instant::now();

        let mut merged = self
            .structured
            .search(conversation_id, query, candidate_limit)
            .await;
        let structured_count = merged.len();

        let vector_candidates = self
            .vector
            .search_candidates(conversation_id, query, candidate_limit)
            .await;
        let vector_count = vector_candidates.len();
        merged.extend(vector_candidates);

        if merged.is_empty() {
            return Vec::new();
        }
        let ranked = self.rerank.rerank(query, merged, safe_top_k);

        info!(
            conversation_id = %conversation_id,
            query_chars = query.chars().count(),
            structured = structured_count,
            vector = vector_count,
            ranked = ranked.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "hybrid recall"
        );
        ranked
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use amora_config::model::{RerankConfig, StructuredConfig, VectorConfig};
    use amora_core::{AmoraError, ChatMessage, Document, VectorStoreAdapter};
    use amora_storage::{Database, RecordStore};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct EmptyVectorStore {
        searches: AtomicUsize,
    }

    #[async_trait]
    impl VectorStoreAdapter for EmptyVectorStore {
        async fn add_documents(&self, _documents: &[Document]) -> Result<(), AmoraError> {
            Ok(())
        }

        async fn similarity_search(
            &self,
            _query: &str,
            _top_k: usize,
            _threshold: f64,
            _filter: &str,
        ) -> Result<Vec<Document>, AmoraError> {
            self.searches.fetch_add(1, Ordering::SeqCst);
            Ok(Vec::new())
        }
    }

    async fn recall_service(store: Arc<EmptyVectorStore>) -> HybridRecallService {
        let db = Database::open_in_memory().await.unwrap();
        let structured = Arc::new(StructuredMemoryService::new(
            RecordStore::new(db),
            StructuredConfig::default(),
        ));
        structured
            .save_from_evicted("c1", &[ChatMessage::user("预算300，喜欢安静的咖啡馆")])
            .await;

        HybridRecallService::new(
            structured,
            Arc::new(VectorMemoryService::new(store, VectorConfig::default())),
            RerankService::new(RerankConfig::default()),
            RecallConfig::default(),
        )
    }

    #[tokio::test]
    async fn blank_query_or_id_short_circuits() {
        let store = Arc::new(EmptyVectorStore::default());
        let service = recall_service(store.clone()).await;

        assert!(service.recall("c1", "  ", 5).await.is_empty());
        assert!(service.recall("", "预算", 5).await.is_empty());
        assert_eq!(store.searches.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn structured_hits_are_ranked_with_breakdown() {
        let service = recall_service(Arc::new(EmptyVectorStore::default())).await;

        let ranked = service.recall("c1", "预算300", 5).await;
        assert!(!ranked.is_empty());
        assert!(ranked[0].content.contains("预算"));
        assert!(ranked[0].final_score > 0.0);
        assert!(ranked[0].rerank.is_some());
    }

    #[tokio::test]
    async fn no_candidates_yields_empty() {
        let service = recall_service(Arc::new(EmptyVectorStore::default())).await;
        assert!(service.recall("c1", "毫无关联的查询词", 5).await.is_empty());
    }
}

// SPDX-FileCopyrightText: 2026 Amora Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-turn orchestration of the three memory tiers.
//!
//! Before generation, the advisor assembles the augmented prompt:
//! base system text, relevant long-term memories, the running summary,
//! the window, and the current user message. After generation it
//! appends the turn to the window, diffs out evictions, extracts
//! structured facts synchronously (regex-cheap), and defers summary
//! and vector work to the background worker. Nothing in the
//! after-phase can fail the turn; the response already exists.

use std::sync::Arc;
use std::time::Instant;

use amora_config::AmoraConfig;
use amora_core::{
    AmoraError, ChatMessage, EmbeddingAdapter, GenerationAdapter, KvAdapter, Role,
};
use amora_storage::{Database, RecordStore, SqliteKvStore, SqliteVectorStore};
use dashmap::DashMap;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::eviction::find_evicted;
use crate::extractor::StructuredMemoryService;
use crate::summary::SummaryService;
use crate::tiered::TieredWindowRepository;
use crate::vector::VectorMemoryService;
use crate::window::{FileWindowStore, InProcessWindowStore, KvWindowStore, WindowBackend};
use crate::worker::{MemoryJob, MemoryWorker};

const LONG_TERM_HEADER: &str = "【长期记忆 - 与当前问题相关的历史信息】";
const SUMMARY_HEADER: &str = "【对话摘要 - 之前对话的关键信息】";
const TRAILING_INSTRUCTION: &str = "请基于以上记忆信息和当前对话，为用户提供个性化、连贯的回答。";

/// One inbound turn before augmentation.
#[derive(Debug, Clone, Default)]
pub struct TurnRequest {
    /// Falls back to the configured default when absent or blank.
    pub conversation_id: Option<String>,
    /// Base system prompt, if the caller supplies one.
    pub system_text: Option<String>,
    /// The turn's messages; the last USER message is the current input.
    pub messages: Vec<ChatMessage>,
}

/// The memory-augmented prompt handed to generation.
#[derive(Debug, Clone)]
pub struct AugmentedPrompt {
    pub conversation_id: String,
    /// Resolved current user input, empty when the turn carried none.
    pub user_text: String,
    /// `[augmented system, window..., current user]`.
    pub messages: Vec<ChatMessage>,
}

pub struct TieredMemoryAdvisor {
    window: Arc<TieredWindowRepository>,
    summary: Arc<SummaryService>,
    vector: Arc<VectorMemoryService>,
    extractor: Arc<StructuredMemoryService>,
    worker: MemoryWorker,
    turn_locks: DashMap<String, Arc<Mutex<()>>>,
    default_conversation_id: String,
    vector_top_k: usize,
    /// Base system prompt used when a turn does not carry one.
    default_system_text: Option<String>,
}

impl TieredMemoryAdvisor {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        window: Arc<TieredWindowRepository>,
        summary: Arc<SummaryService>,
        vector: Arc<VectorMemoryService>,
        extractor: Arc<StructuredMemoryService>,
        worker: MemoryWorker,
        default_conversation_id: impl Into<String>,
        vector_top_k: usize,
        default_system_text: Option<String>,
    ) -> Self {
        Self {
            window,
            summary,
            vector,
            extractor,
            worker,
            turn_locks: DashMap::new(),
            default_conversation_id: default_conversation_id.into(),
            vector_top_k,
            default_system_text,
        }
    }

    /// Wires the full memory stack from configuration: one SQLite
    /// database behind the KV, record, and vector stores, window tiers
    /// per the storage section, and the background worker pool.
    ///
    /// Generation is optional (summary compression only); embedding is
    /// required for the vector tier.
    pub async fn from_config(
        config: &AmoraConfig,
        generation: Option<Arc<dyn GenerationAdapter>>,
        embedder: Arc<dyn EmbeddingAdapter>,
    ) -> Result<Self, AmoraError> {
        let db = Database::open(&config.storage.database_path, config.storage.wal_mode).await?;
        let kv: Arc<dyn KvAdapter> = Arc::new(SqliteKvStore::new(db.clone()));

        let kv_tier: Arc<dyn WindowBackend> =
            Arc::new(KvWindowStore::new(Arc::clone(&kv), None));
        let file_tier: Option<Arc<dyn WindowBackend>> = config
            .storage
            .window_dir
            .as_deref()
            .map(|dir| Arc::new(FileWindowStore::new(dir)) as Arc<dyn WindowBackend>);
        let window = Arc::new(TieredWindowRepository::new(
            Arc::new(InProcessWindowStore::new()),
            Some(kv_tier),
            file_tier,
            config.memory.window.max_messages,
        ));

        let summary = Arc::new(SummaryService::new(
            Arc::clone(&kv),
            generation,
            config.memory.summary.clone(),
        ));
        let vector = Arc::new(VectorMemoryService::new(
            Arc::new(SqliteVectorStore::new(db.clone(), embedder)),
            config.memory.vector.clone(),
        ));
        let extractor = Arc::new(StructuredMemoryService::new(
            RecordStore::new(db),
            config.memory.structured.clone(),
        ));
        let worker = MemoryWorker::spawn(
            &config.memory.worker,
            Arc::clone(&summary),
            Arc::clone(&vector),
        );

        Ok(Self::new(
            window,
            summary,
            vector,
            extractor,
            worker,
            config.agent.default_conversation_id.clone(),
            config.memory.vector.top_k,
            config.agent.system_prompt.clone(),
        ))
    }

    /// Assembles the augmented prompt for one turn. The long-term and
    /// summary reads gate prompt construction, so they run inline; both
    /// degrade to empty on any failure.
    pub async fn before_generation(&self, request: &TurnRequest) -> AugmentedPrompt {
        let start = Instant::now();
        let conversation_id = self.resolve_conversation_id(request.conversation_id.as_deref());

        let current_user = request
            .messages
            .iter()
            .rev()
            .find(|m| m.role == Role::User)
            .cloned();
        let user_text = current_user
            .as_ref()
            .map(|m| m.text.clone())
            .unwrap_or_default();

        let long_term = if user_text.trim().is_empty() {
            String::new()
        } else {
            self.vector
                .retrieve_relevant_memories(&conversation_id, &user_text, self.vector_top_k)
                .await
        };
        let summary = self.summary.get_summary(&conversation_id).await;

        let window: Vec<ChatMessage> = self
            .window
            .get(&conversation_id)
            .await
            .into_iter()
            .filter(|m| m.role != Role::System)
            .collect();

        let base_system = request
            .system_text
            .as_deref()
            .or(self.default_system_text.as_deref())
            .unwrap_or_default();
        let system_text = build_augmented_system(base_system, &long_term, &summary);

        let mut messages = Vec::with_capacity(window.len() + 2);
        messages.push(ChatMessage::system(system_text));
        messages.extend(window.iter().cloned());
        if let Some(user) = current_user {
            messages.push(user);
        }

        info!(
            conversation_id = %conversation_id,
            window_size = window.len(),
            long_term_chars = long_term.chars().count(),
            summary_chars = summary.chars().count(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "prompt augmented"
        );

        AugmentedPrompt {
            conversation_id,
            user_text,
            messages,
        }
    }

    /// Records a completed turn: window append, eviction accounting,
    /// synchronous fact extraction, deferred summary and vector writes.
    /// Serialized per conversation so overlapping turns cannot
    /// double-count an eviction.
    pub async fn after_generation(
        &self,
        conversation_id: &str,
        user_text: &str,
        assistant_text: &str,
    ) {
        let conversation_id = self.resolve_conversation_id(Some(conversation_id));
        let lock = self
            .turn_locks
            .entry(conversation_id.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        let _guard = lock.lock().await;

        let mut added = Vec::with_capacity(2);
        if !user_text.trim().is_empty() {
            added.push(ChatMessage::user(user_text));
        }
        added.push(ChatMessage::assistant(assistant_text));

        let before = self.window.get(&conversation_id).await;
        self.window.add(&conversation_id, &added).await;
        let after = self.window.get(&conversation_id).await;

        let evicted = find_evicted(&before, &after);
        if !evicted.is_empty() {
            // Regex extraction is cheap enough to stay on the turn path.
            self.extractor
                .save_from_evicted(&conversation_id, &evicted)
                .await;
            self.worker.submit(MemoryJob::UpdateSummary {
                conversation_id: conversation_id.clone(),
                evicted: evicted.clone(),
            });
        }
        self.worker.submit(MemoryJob::SaveVector {
            conversation_id: conversation_id.clone(),
            messages: added.clone(),
        });

        debug!(
            conversation_id = %conversation_id,
            added = added.len(),
            evicted = evicted.len(),
            "turn recorded"
        );
    }

    /// Drops all memory for a conversation: window, summary, turn lock.
    pub async fn clear_conversation(&self, conversation_id: &str) {
        let conversation_id = self.resolve_conversation_id(Some(conversation_id));
        self.window.clear(&conversation_id).await;
        self.summary.clear_summary(&conversation_id).await;
        self.turn_locks.remove(&conversation_id);
    }

    /// Stops the background worker, draining queued jobs first.
    pub async fn shutdown(self) {
        self.worker.shutdown().await;
    }

    fn resolve_conversation_id(&self, id: Option<&str>) -> String {
        match id {
            Some(id) if !id.trim().is_empty() => id.to_string(),
            _ => self.default_conversation_id.clone(),
        }
    }
}

fn build_augmented_system(base: &str, long_term: &str, summary: &str) -> String {
    let mut out = String::new();
    if !base.trim().is_empty() {
        out.push_str(base);
    }
    if !long_term.trim().is_empty() {
        out.push_str("\n\n");
        out.push_str(LONG_TERM_HEADER);
        out.push('\n');
        out.push_str(long_term);
    }
    if !summary.trim().is_empty() {
        out.push_str("\n\n");
        out.push_str(SUMMARY_HEADER);
        out.push('\n');
        out.push_str(summary);
    }
    out.push_str("\n\n");
    out.push_str(TRAILING_INSTRUCTION);
    out.push('\n');
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::window::test_support::StubKv;
    use amora_config::model::{StructuredConfig, SummaryConfig, VectorConfig, WorkerConfig};

    struct HashEmbedder;

    #[async_trait::async_trait]
    impl EmbeddingAdapter for HashEmbedder {
        async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, AmoraError> {
            Ok(texts
                .iter()
                .map(|t| {
                    let mut v = vec![0.0f32; 64];
                    for (i, b) in t.bytes().enumerate() {
                        v[(b as usize + i) % 64] += 1.0;
                    }
                    let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
                    if norm > 0.0 {
                        for x in &mut v {
                            *x /= norm;
                        }
                    }
                    v
                })
                .collect())
        }
    }

    async fn advisor(max_messages: usize) -> TieredMemoryAdvisor {
        let db = Database::open_in_memory().await.unwrap();
        let kv: Arc<dyn amora_core::KvAdapter> = Arc::new(StubKv::default());

        let window = Arc::new(TieredWindowRepository::new(
            Arc::new(InProcessWindowStore::new()),
            Some(Arc::new(KvWindowStore::new(Arc::clone(&kv), None))),
            None,
            max_messages,
        ));
        let summary = Arc::new(SummaryService::new(
            Arc::clone(&kv),
            None,
            SummaryConfig::default(),
        ));
        let vector = Arc::new(VectorMemoryService::new(
            Arc::new(SqliteVectorStore::new(db.clone(), Arc::new(HashEmbedder))),
            VectorConfig::default(),
        ));
        let extractor = Arc::new(StructuredMemoryService::new(
            RecordStore::new(db),
            StructuredConfig::default(),
        ));
        let worker = MemoryWorker::spawn(
            &WorkerConfig::default(),
            Arc::clone(&summary),
            Arc::clone(&vector),
        );

        TieredMemoryAdvisor::new(window, summary, vector, extractor, worker, "default", 5, None)
    }

    #[tokio::test]
    async fn before_phase_builds_system_window_and_user() {
        let advisor = advisor(10).await;
        advisor.after_generation("c1", "我们昨天聊到哪了", "聊到周末的计划").await;

        let prompt = advisor
            .before_generation(&TurnRequest {
                conversation_id: Some("c1".to_string()),
                system_text: Some("你是恋爱顾问。".to_string()),
                messages: vec![ChatMessage::user("帮我安排约会")],
            })
            .await;

        assert_eq!(prompt.conversation_id, "c1");
        assert_eq!(prompt.user_text, "帮我安排约会");

        // System first, then the two window messages, then current user.
        assert_eq!(prompt.messages.len(), 4);
        assert_eq!(prompt.messages[0].role, Role::System);
        assert!(prompt.messages[0].text.starts_with("你是恋爱顾问。"));
        assert!(prompt.messages[0].text.contains(TRAILING_INSTRUCTION));
        assert_eq!(prompt.messages[1].text, "我们昨天聊到哪了");
        assert_eq!(prompt.messages[3].text, "帮我安排约会");

        advisor.shutdown().await;
    }

    #[tokio::test]
    async fn summary_block_appears_in_augmented_prompt() {
        let advisor = advisor(10).await;
        advisor
            .summary
            .update_summary("c1", &[ChatMessage::user("预算300，喜欢安静的咖啡馆")])
            .await
            .unwrap();

        let prompt = advisor
            .before_generation(&TurnRequest {
                conversation_id: Some("c1".to_string()),
                system_text: None,
                messages: vec![ChatMessage::user("推荐个地方")],
            })
            .await;

        assert!(prompt.messages[0].text.contains(SUMMARY_HEADER));
        assert!(prompt.messages[0].text.contains("预算300"));
        advisor.shutdown().await;
    }

    #[tokio::test]
    async fn eviction_flows_into_summary_and_facts() {
        let advisor = advisor(2).await;
        advisor.after_generation("c1", "预算300，喜欢安静的咖啡馆", "记住了").await;
        // Second turn evicts the first.
        advisor.after_generation("c1", "周末去看电影吧", "好主意").await;

        let window = advisor.window.get("c1").await;
        assert_eq!(window.len(), 2);
        assert_eq!(window[0].text, "周末去看电影吧");

        // Synchronous extraction already ran on the evicted batch.
        let facts = advisor.extractor.search("c1", "预算300", 10).await;
        assert!(!facts.is_empty());

        let summary_service = Arc::clone(&advisor.summary);
        advisor.shutdown().await;

        let summary = summary_service.get_summary("c1").await;
        assert!(summary.contains("预算300"));
    }

    #[tokio::test]
    async fn blank_conversation_id_uses_default() {
        let advisor = advisor(10).await;
        advisor.after_generation("  ", "你好", "你好呀").await;

        assert_eq!(advisor.window.get("default").await.len(), 2);
        let prompt = advisor
            .before_generation(&TurnRequest::default())
            .await;
        assert_eq!(prompt.conversation_id, "default");
        advisor.shutdown().await;
    }

    #[tokio::test]
    async fn after_phase_without_user_text_stores_assistant_only() {
        let advisor = advisor(10).await;
        advisor.after_generation("c1", "  ", "主动问候").await;

        let window = advisor.window.get("c1").await;
        assert_eq!(window.len(), 1);
        assert_eq!(window[0].role, Role::Assistant);
        advisor.shutdown().await;
    }

    #[tokio::test]
    async fn clear_conversation_drops_window_and_summary() {
        let advisor = advisor(10).await;
        advisor.after_generation("c1", "预算300", "好的").await;
        advisor
            .summary
            .update_summary("c1", &[ChatMessage::user("预算300")])
            .await
            .unwrap();
        advisor.clear_conversation("c1").await;

        assert!(advisor.window.get("c1").await.is_empty());
        assert_eq!(advisor.summary.get_summary("c1").await, "");
        advisor.shutdown().await;
    }

    #[tokio::test]
    async fn from_config_wires_a_working_stack() {
        let dir = tempfile::tempdir().unwrap();
        let toml = format!(
            r#"
            [agent]
            system_prompt = "你是恋爱顾问。"

            [storage]
            database_path = "{}"
            wal_mode = false
            window_dir = "{}"

            [memory.window]
            max_messages = 2
            "#,
            dir.path().join("amora.db").display(),
            dir.path().join("windows").display(),
        );
        let config = amora_config::load_config_from_str(&toml).unwrap();

        let advisor = TieredMemoryAdvisor::from_config(&config, None, Arc::new(HashEmbedder))
            .await
            .unwrap();

        advisor.after_generation("c1", "预算300，喜欢安静的咖啡馆", "记住了").await;
        advisor.after_generation("c1", "周末去看电影吧", "好主意").await;

        // The configured bound evicted the first turn into the fact store.
        assert_eq!(advisor.window.get("c1").await.len(), 2);
        assert!(!advisor.extractor.search("c1", "预算300", 10).await.is_empty());

        // The configured system prompt backs turns that carry none.
        let prompt = advisor
            .before_generation(&TurnRequest {
                conversation_id: Some("c1".to_string()),
                system_text: None,
                messages: vec![ChatMessage::user("推荐个地方")],
            })
            .await;
        assert!(prompt.messages[0].text.starts_with("你是恋爱顾问。"));

        // The file window tier landed under the configured directory.
        let files = std::fs::read_dir(dir.path().join("windows")).unwrap().count();
        assert_eq!(files, 1);

        advisor.shutdown().await;
    }

    #[test]
    fn augmented_system_includes_blocks_only_when_non_blank() {
        let with_all = build_augmented_system("基础提示", "记忆内容", "摘要内容");
        assert!(with_all.contains(LONG_TERM_HEADER));
        assert!(with_all.contains(SUMMARY_HEADER));
        assert!(with_all.ends_with(&format!("{TRAILING_INSTRUCTION}\n")));

        let bare = build_augmented_system("基础提示", "", "  ");
        assert!(!bare.contains(LONG_TERM_HEADER));
        assert!(!bare.contains(SUMMARY_HEADER));
        assert!(bare.contains(TRAILING_INSTRUCTION));
    }
}

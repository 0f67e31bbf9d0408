// SPDX-FileCopyrightText: 2026 Amora Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Running per-conversation summary fed by window evictions.
//!
//! The summary is a single string, monotonically replaced. It lives in
//! the durable KV tier with a TTL; when KV is unavailable the write
//! lands in an in-process map instead, so a summary is never lost to a
//! storage hiccup. Compression is either a deterministic merge (offline
//! and test environments) or a generation-backend call.

use std::sync::Arc;
use std::time::{Duration, Instant};

use amora_config::model::SummaryConfig;
use amora_core::{AmoraError, ChatMessage, GenerationAdapter, KvAdapter};
use dashmap::DashMap;
use tracing::{debug, info, warn};

const SUMMARY_KEY_PREFIX: &str = "amora:summary:";

/// Placeholder fed to the merge when no summary exists yet.
const EMPTY_SUMMARY_PLACEHOLDER: &str = "暂无历史摘要";

pub struct SummaryService {
    kv: Arc<dyn KvAdapter>,
    generation: Option<Arc<dyn GenerationAdapter>>,
    local: DashMap<String, String>,
    config: SummaryConfig,
}

impl SummaryService {
    pub fn new(
        kv: Arc<dyn KvAdapter>,
        generation: Option<Arc<dyn GenerationAdapter>>,
        config: SummaryConfig,
    ) -> Self {
        Self {
            kv,
            generation,
            local: DashMap::new(),
            config,
        }
    }

    fn key(conversation_id: &str) -> String {
        format!("{SUMMARY_KEY_PREFIX}{conversation_id}")
    }

    /// Returns the stored summary, empty string if none exists.
    pub async fn get_summary(&self, conversation_id: &str) -> String {
        if conversation_id.trim().is_empty() {
            return String::new();
        }
        match self.kv.get(&Self::key(conversation_id)).await {
            Ok(Some(summary)) => return summary,
            Ok(None) => {}
            Err(e) => {
                debug!(conversation_id = %conversation_id, error = %e, "kv summary read failed, using local cache");
            }
        }
        self.local
            .get(conversation_id)
            .map(|s| s.clone())
            .unwrap_or_default()
    }

    /// Merges newly evicted messages into the summary and persists it.
    ///
    /// An empty evicted batch is a no-op returning the existing summary.
    /// A non-empty existing summary is never replaced by an empty one.
    /// Only a generation-backend failure surfaces as an error; KV
    /// failures fall back to the in-process cache.
    pub async fn update_summary(
        &self,
        conversation_id: &str,
        evicted: &[ChatMessage],
    ) -> Result<String, AmoraError> {
        let start = Instant::now();
        if conversation_id.trim().is_empty() || evicted.is_empty() {
            return Ok(self.get_summary(conversation_id).await);
        }

        let existing = self.get_summary(conversation_id).await;

        let mut lines = String::new();
        for message in evicted {
            if !message.has_text() {
                continue;
            }
            lines.push_str(message.role.label());
            lines.push_str(": ");
            lines.push_str(&message.text);
            lines.push('\n');
        }
        if lines.trim().is_empty() {
            return Ok(existing);
        }

        let base = if existing.trim().is_empty() {
            EMPTY_SUMMARY_PLACEHOLDER
        } else {
            existing.as_str()
        };

        let new_summary = match (&self.generation, self.config.llm_enabled) {
            (Some(generation), true) => {
                let prompt = compression_prompt(base, &lines);
                generation.generate(&prompt).await?
            }
            _ => merge_truncate(base, &lines, self.config.max_chars),
        };

        if new_summary.trim().is_empty() {
            return Ok(existing);
        }

        let ttl = Duration::from_secs(self.config.ttl_days * 24 * 60 * 60);
        match self
            .kv
            .set(&Self::key(conversation_id), &new_summary, Some(ttl))
            .await
        {
            Ok(()) => {}
            Err(e) => {
                warn!(conversation_id = %conversation_id, error = %e, "kv summary write failed, caching locally");
                self.local
                    .insert(conversation_id.to_string(), new_summary.clone());
            }
        }

        info!(
            conversation_id = %conversation_id,
            evicted = evicted.len(),
            summary_chars = new_summary.chars().count(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "summary updated"
        );
        Ok(new_summary)
    }

    /// Removes the summary from both stores.
    pub async fn clear_summary(&self, conversation_id: &str) {
        if conversation_id.trim().is_empty() {
            return;
        }
        self.local.remove(conversation_id);
        if let Err(e) = self.kv.delete(&Self::key(conversation_id)).await {
            debug!(conversation_id = %conversation_id, error = %e, "kv summary delete failed");
        }
    }
}

/// Deterministic merge: concatenate and keep the newest `max_chars`
/// characters. Pure function of its inputs.
fn merge_truncate(existing: &str, lines: &str, max_chars: usize) -> String {
    let merged = format!("{existing}\n{lines}").trim().to_string();
    let count = merged.chars().count();
    if count <= max_chars {
        return merged;
    }
    merged.chars().skip(count - max_chars).collect()
}

fn compression_prompt(existing: &str, lines: &str) -> String {
    format!(
        "你是一个对话摘要专家。请将以下对话历史压缩为简洁的摘要。\n\
         要求：\n\
         1. 保留所有关键事实信息（人名、日期、地点、偏好、重要事件）\n\
         2. 保留用户的情感状态和关系阶段描述\n\
         3. 删除寒暄、重复内容、无关闲聊\n\
         4. 摘要用第三人称描述，语言简洁\n\
         5. 控制在 500 字以内\n\
         6. 如果已有摘要和新对话中有冲突信息，以新对话为准\n\
         \n\
         已有摘要：\n\
         {existing}\n\
         \n\
         新增需要合并的对话：\n\
         {lines}\n\
         \n\
         请输出更新后的完整摘要："
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::window::test_support::{FailingKv, StubKv};
    use async_trait::async_trait;

    struct FixedGeneration(String);

    #[async_trait]
    impl GenerationAdapter for FixedGeneration {
        async fn generate(&self, _prompt: &str) -> Result<String, AmoraError> {
            Ok(self.0.clone())
        }
    }

    struct FailingGeneration;

    #[async_trait]
    impl GenerationAdapter for FailingGeneration {
        async fn generate(&self, _prompt: &str) -> Result<String, AmoraError> {
            Err(AmoraError::Provider {
                message: "model unavailable".into(),
                source: None,
            })
        }
    }

    fn offline_service(kv: Arc<dyn KvAdapter>) -> SummaryService {
        SummaryService::new(kv, None, SummaryConfig::default())
    }

    #[tokio::test]
    async fn empty_evicted_is_idempotent() {
        let kv = Arc::new(StubKv::default());
        let service = offline_service(kv.clone());

        service
            .update_summary("c1", &[ChatMessage::user("你好")])
            .await
            .unwrap();
        let existing = service.get_summary("c1").await;
        let kv_entries_before = kv.entries.len();

        let unchanged = service.update_summary("c1", &[]).await.unwrap();
        assert_eq!(unchanged, existing);
        assert_eq!(kv.entries.len(), kv_entries_before);
    }

    #[tokio::test]
    async fn fallback_merge_keeps_both_turns() {
        let service = offline_service(Arc::new(StubKv::default()));
        let summary = service
            .update_summary(
                "c1",
                &[ChatMessage::user("你好"), ChatMessage::assistant("你好呀")],
            )
            .await
            .unwrap();

        assert!(summary.contains("用户: 你好"));
        assert!(summary.contains("AI助手: 你好呀"));
        assert!(summary.starts_with(EMPTY_SUMMARY_PLACEHOLDER));
        assert_eq!(service.get_summary("c1").await, summary);
    }

    #[tokio::test]
    async fn fallback_merge_truncates_from_the_tail() {
        let mut config = SummaryConfig::default();
        config.max_chars = 12;
        let service = SummaryService::new(Arc::new(StubKv::default()), None, config);

        let summary = service
            .update_summary("c1", &[ChatMessage::user("这是一段相当长的历史对话内容")])
            .await
            .unwrap();
        assert_eq!(summary.chars().count(), 12);
        // Newest content survives truncation.
        assert!(summary.ends_with("历史对话内容"));
    }

    #[test]
    fn merge_truncate_is_pure() {
        let a = merge_truncate("旧摘要", "用户: 新内容\n", 500);
        let b = merge_truncate("旧摘要", "用户: 新内容\n", 500);
        assert_eq!(a, b);
        assert_eq!(a, "旧摘要\n用户: 新内容");
    }

    #[tokio::test]
    async fn blank_evicted_text_leaves_summary_unchanged() {
        let service = offline_service(Arc::new(StubKv::default()));
        let summary = service
            .update_summary("c1", &[ChatMessage::user("   ")])
            .await
            .unwrap();
        assert_eq!(summary, "");
        assert_eq!(service.get_summary("c1").await, "");
    }

    #[tokio::test]
    async fn llm_compression_result_is_stored() {
        let mut config = SummaryConfig::default();
        config.llm_enabled = true;
        let service = SummaryService::new(
            Arc::new(StubKv::default()),
            Some(Arc::new(FixedGeneration("两人互相问好。".into()))),
            config,
        );

        let summary = service
            .update_summary("c1", &[ChatMessage::user("你好")])
            .await
            .unwrap();
        assert_eq!(summary, "两人互相问好。");
        assert_eq!(service.get_summary("c1").await, "两人互相问好。");
    }

    #[tokio::test]
    async fn empty_llm_output_never_replaces_existing() {
        let kv = Arc::new(StubKv::default());
        let offline = offline_service(kv.clone());
        offline
            .update_summary("c1", &[ChatMessage::user("重要事实")])
            .await
            .unwrap();
        let existing = offline.get_summary("c1").await;

        let mut config = SummaryConfig::default();
        config.llm_enabled = true;
        let service = SummaryService::new(kv, Some(Arc::new(FixedGeneration(String::new()))), config);
        let result = service
            .update_summary("c1", &[ChatMessage::user("新内容")])
            .await
            .unwrap();
        assert_eq!(result, existing);
        assert_eq!(service.get_summary("c1").await, existing);
    }

    #[tokio::test]
    async fn generation_failure_surfaces_and_keeps_summary() {
        let kv = Arc::new(StubKv::default());
        let mut config = SummaryConfig::default();
        config.llm_enabled = true;
        let service = SummaryService::new(kv, Some(Arc::new(FailingGeneration)), config);

        let result = service
            .update_summary("c1", &[ChatMessage::user("你好")])
            .await;
        assert!(result.is_err());
        assert_eq!(service.get_summary("c1").await, "");
    }

    #[tokio::test]
    async fn kv_failure_falls_back_to_local_cache() {
        let service = offline_service(Arc::new(FailingKv));
        let summary = service
            .update_summary("c1", &[ChatMessage::user("你好")])
            .await
            .unwrap();
        assert!(summary.contains("你好"));
        // Read path degrades to the local cache too.
        assert_eq!(service.get_summary("c1").await, summary);
    }

    #[tokio::test]
    async fn clear_removes_summary() {
        let service = offline_service(Arc::new(StubKv::default()));
        service
            .update_summary("c1", &[ChatMessage::user("你好")])
            .await
            .unwrap();
        service.clear_summary("c1").await;
        assert_eq!(service.get_summary("c1").await, "");
    }
}

// SPDX-FileCopyrightText: 2026 Amora Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Structured fact extraction from evicted conversation text.
//!
//! Extraction is deliberately pattern-based rather than model-based:
//! every stored fact is an auditable regex hit, cheap enough to run
//! synchronously on every eviction. Records go to the relational store;
//! after the first storage failure a sticky circuit breaker routes all
//! further reads and writes to an in-process per-conversation list for
//! the rest of the process lifetime.

use std::sync::LazyLock;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use amora_config::model::StructuredConfig;
use amora_core::{ChatMessage, MemoryType, RecordOrigin, StructuredMemoryRecord};
use amora_storage::RecordStore;
use chrono::Utc;
use dashmap::DashMap;
use regex::Regex;
use tracing::{info, warn};

use crate::tokens::{keyword_overlap_score, split_tokens};
use crate::types::{CandidateOrigin, MemoryCandidate};

static BUDGET_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"预算\s*[0-9]{2,6}").expect("budget pattern"));
static DATE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\d{4}-\d{1,2}-\d{1,2}|\d{1,2}[月/-]\d{1,2}[日号]?").expect("date pattern")
});
static PREFERENCE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(喜欢|偏好|不喜欢|讨厌)[^，。,.!?！？]{1,32}").expect("preference pattern")
});
static EVENT_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"冷战|吵架|分手|复合|纪念日|见家长|求婚|结婚").expect("event pattern")
});

/// Characters kept of a message when no pattern fires.
const FALLBACK_CONTENT_CHARS: usize = 72;

const DEFAULT_TOP_K: usize = 5;

struct PatternRule {
    name: &'static str,
    memory_type: MemoryType,
    regex: &'static LazyLock<Regex>,
    importance: f64,
    max_matches: usize,
}

static RULES: [PatternRule; 4] = [
    PatternRule {
        name: "budget",
        memory_type: MemoryType::Constraint,
        regex: &BUDGET_PATTERN,
        importance: 0.86,
        max_matches: 4,
    },
    PatternRule {
        name: "date",
        memory_type: MemoryType::EventDate,
        regex: &DATE_PATTERN,
        importance: 0.82,
        max_matches: 3,
    },
    PatternRule {
        name: "preference",
        memory_type: MemoryType::Preference,
        regex: &PREFERENCE_PATTERN,
        importance: 0.88,
        max_matches: 2,
    },
    PatternRule {
        name: "event",
        memory_type: MemoryType::Event,
        regex: &EVENT_PATTERN,
        importance: 0.75,
        max_matches: 2,
    },
];

pub struct StructuredMemoryService {
    records: RecordStore,
    config: StructuredConfig,
    db_broken: AtomicBool,
    local: DashMap<String, Vec<StructuredMemoryRecord>>,
}

impl StructuredMemoryService {
    pub fn new(records: RecordStore, config: StructuredConfig) -> Self {
        Self {
            records,
            config,
            db_broken: AtomicBool::new(false),
            local: DashMap::new(),
        }
    }

    /// Extracts facts from an evicted batch and persists them.
    /// Storage failures degrade to the in-process list, never propagate.
    pub async fn save_from_evicted(&self, conversation_id: &str, messages: &[ChatMessage]) {
        if !self.config.enabled || conversation_id.trim().is_empty() || messages.is_empty() {
            return;
        }
        let start = Instant::now();
        let records = self.extract(conversation_id, messages, Utc::now().timestamp_millis());
        if records.is_empty() {
            return;
        }

        let mut storage = "local";
        if !self.db_broken.load(Ordering::Relaxed) {
            match self.records.insert_batch(&records).await {
                Ok(()) => storage = "db",
                Err(e) => {
                    self.db_broken.store(true, Ordering::Relaxed);
                    warn!(conversation_id = %conversation_id, error = %e, "record store failed, breaker open");
                }
            }
        }
        if storage == "local" {
            self.write_local(conversation_id, records.clone());
        }

        info!(
            conversation_id = %conversation_id,
            source_size = messages.len(),
            extracted = records.len(),
            storage,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "structured facts saved"
        );
    }

    /// Keyword search over stored facts for one conversation.
    ///
    /// A query with no tokens returns the most recent records unscored.
    pub async fn search(
        &self,
        conversation_id: &str,
        query: &str,
        top_k: usize,
    ) -> Vec<MemoryCandidate> {
        if !self.config.enabled || conversation_id.trim().is_empty() {
            return Vec::new();
        }
        let safe_top_k = if top_k == 0 { DEFAULT_TOP_K } else { top_k };
        let scan_limit = safe_top_k.max(self.config.search_scan_limit);

        let mut records = Vec::new();
        if !self.db_broken.load(Ordering::Relaxed) {
            match self.records.fetch_recent(conversation_id, scan_limit).await {
                Ok(found) => records = found,
                Err(e) => {
                    self.db_broken.store(true, Ordering::Relaxed);
                    warn!(conversation_id = %conversation_id, error = %e, "record store read failed, breaker open");
                }
            }
        }
        if records.is_empty() {
            records = self
                .local
                .get(conversation_id)
                .map(|r| r.clone())
                .unwrap_or_default();
        }
        if records.is_empty() {
            return Vec::new();
        }

        let tokens = split_tokens(query);
        let mut candidates: Vec<MemoryCandidate> = records
            .into_iter()
            .filter(|r| !r.content.trim().is_empty())
            .filter_map(|record| {
                let score = keyword_overlap_score(&tokens, &record.content);
                if !tokens.is_empty() && score <= 0.0 {
                    return None;
                }
                Some(MemoryCandidate {
                    memory_type: record.memory_type,
                    content: record.content,
                    similarity: Some(score),
                    importance: Some(record.importance),
                    timestamp_ms: record.timestamp_ms,
                    final_score: 0.0,
                    origin: CandidateOrigin::Structured {
                        record: record.origin,
                    },
                    rerank: None,
                })
            })
            .collect();

        candidates.sort_by(|a, b| {
            b.similarity
                .partial_cmp(&a.similarity)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(b.timestamp_ms.cmp(&a.timestamp_ms))
        });
        candidates.truncate(safe_top_k);
        candidates
    }

    fn extract(
        &self,
        conversation_id: &str,
        messages: &[ChatMessage],
        timestamp_ms: i64,
    ) -> Vec<StructuredMemoryRecord> {
        let cap = self.config.max_records_per_batch;
        let mut seen: Vec<(MemoryType, String)> = Vec::new();
        let mut records: Vec<StructuredMemoryRecord> = Vec::new();

        for message in messages {
            if records.len() >= cap {
                break;
            }
            if !message.has_text() {
                continue;
            }
            let text = normalize(&message.text);

            let before = records.len();
            for rule in &RULES {
                let mut count = 0;
                for m in rule.regex.find_iter(&text) {
                    if records.len() >= cap || count >= rule.max_matches {
                        break;
                    }
                    let content = m.as_str().trim().to_string();
                    if content.is_empty() {
                        continue;
                    }
                    let key = (rule.memory_type, content.clone());
                    if seen.contains(&key) {
                        continue;
                    }
                    seen.push(key);
                    records.push(StructuredMemoryRecord {
                        conversation_id: conversation_id.to_string(),
                        memory_type: rule.memory_type,
                        content,
                        importance: self.config.default_importance.max(rule.importance),
                        timestamp_ms,
                        origin: RecordOrigin::RegexExtract {
                            pattern: rule.name.to_string(),
                        },
                    });
                    count += 1;
                }
                if records.len() >= cap {
                    break;
                }
            }

            // Whole-message fallback, only when no pattern fired.
            if records.len() == before && records.len() < cap {
                let content: String = text.chars().take(FALLBACK_CONTENT_CHARS).collect();
                let key = (MemoryType::Conversation, content.clone());
                if !seen.contains(&key) {
                    seen.push(key);
                    records.push(StructuredMemoryRecord {
                        conversation_id: conversation_id.to_string(),
                        memory_type: MemoryType::Conversation,
                        content,
                        importance: self.config.default_importance,
                        timestamp_ms,
                        origin: RecordOrigin::Fallback,
                    });
                }
            }
        }
        records
    }

    fn write_local(&self, conversation_id: &str, records: Vec<StructuredMemoryRecord>) {
        let mut entry = self
            .local
            .entry(conversation_id.to_string())
            .or_default();
        entry.extend(records);
        entry.sort_by(|a, b| b.timestamp_ms.cmp(&a.timestamp_ms));
        entry.truncate(self.config.local_cap);
    }
}

fn normalize(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

// SPDX-FileCopyrightText: 2026 Amora Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for the Amora memory subsystem.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup. Defaults are the reference configuration, not
//! a hard contract.

use serde::{Deserialize, Serialize};

/// Top-level Amora configuration.
///
/// Loaded from TOML files following XDG hierarchy, with environment
/// variable overrides. All sections are optional and default to sensible
/// values.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct AmoraConfig {
    /// Agent identity and behavior settings.
    #[serde(default)]
    pub agent: AgentConfig,

    /// Storage backend settings.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Tiered memory settings.
    #[serde(default)]
    pub memory: MemoryConfig,
}

/// Agent identity and behavior configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct AgentConfig {
    /// Display name of the agent.
    #[serde(default = "default_agent_name")]
    pub name: String,

    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Conversation id used when a turn carries none.
    #[serde(default = "default_conversation_id")]
    pub default_conversation_id: String,

    /// Base system prompt prepended to every augmented prompt.
    #[serde(default)]
    pub system_prompt: Option<String>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            name: default_agent_name(),
            log_level: default_log_level(),
            default_conversation_id: default_conversation_id(),
            system_prompt: None,
        }
    }
}

fn default_agent_name() -> String {
    "amora".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_conversation_id() -> String {
    "default".to_string()
}

/// Storage backend configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_database_path")]
    pub database_path: String,

    /// Enable WAL (Write-Ahead Logging) mode for SQLite.
    #[serde(default = "default_wal_mode")]
    pub wal_mode: bool,

    /// Directory for the file window tier. `None` disables the file tier.
    #[serde(default)]
    pub window_dir: Option<String>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            wal_mode: default_wal_mode(),
            window_dir: None,
        }
    }
}

fn default_database_path() -> String {
    dirs::data_dir()
        .map(|p| p.join("amora").join("amora.db"))
        .and_then(|p| p.to_str().map(String::from))
        .unwrap_or_else(|| "amora.db".to_string())
}

fn default_wal_mode() -> bool {
    true
}

/// Tiered memory configuration, one sub-section per memory service.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct MemoryConfig {
    /// Sliding window settings.
    #[serde(default)]
    pub window: WindowConfig,

    /// Conversation summary settings.
    #[serde(default)]
    pub summary: SummaryConfig,

    /// Structured fact extraction settings.
    #[serde(default)]
    pub structured: StructuredConfig,

    /// Vector long-term memory settings.
    #[serde(default)]
    pub vector: VectorConfig,

    /// Recall rerank weights.
    #[serde(default)]
    pub rerank: RerankConfig,

    /// Hybrid recall settings.
    #[serde(default)]
    pub recall: RecallConfig,

    /// Background worker pool settings.
    #[serde(default)]
    pub worker: WorkerConfig,
}

/// Sliding window configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct WindowConfig {
    /// Maximum number of messages retained per conversation window.
    #[serde(default = "default_max_messages")]
    pub max_messages: usize,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            max_messages: default_max_messages(),
        }
    }
}

fn default_max_messages() -> usize {
    10
}

/// Conversation summary configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SummaryConfig {
    /// Days to retain a durably stored summary.
    #[serde(default = "default_summary_ttl_days")]
    pub ttl_days: u64,

    /// Use the generation backend to compress summaries.
    ///
    /// When false (offline/test environments), summaries fall back to a
    /// deterministic concatenate-and-truncate merge.
    #[serde(default)]
    pub llm_enabled: bool,

    /// Character budget for the deterministic merge fallback.
    #[serde(default = "default_summary_max_chars")]
    pub max_chars: usize,
}

impl Default for SummaryConfig {
    fn default() -> Self {
        Self {
            ttl_days: default_summary_ttl_days(),
            llm_enabled: false,
            max_chars: default_summary_max_chars(),
        }
    }
}

fn default_summary_ttl_days() -> u64 {
    7
}

fn default_summary_max_chars() -> usize {
    500
}

/// Structured fact extraction configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StructuredConfig {
    /// Enable structured extraction and search.
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Cap on records extracted per save call.
    #[serde(default = "default_max_records_per_batch")]
    pub max_records_per_batch: usize,

    /// Row scan bound for search reads.
    #[serde(default = "default_search_scan_limit")]
    pub search_scan_limit: usize,

    /// Importance assigned to fallback conversation records.
    #[serde(default = "default_importance")]
    pub default_importance: f64,

    /// Per-conversation retention cap for the in-process fallback store.
    #[serde(default = "default_local_cap")]
    pub local_cap: usize,
}

impl Default for StructuredConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            max_records_per_batch: default_max_records_per_batch(),
            search_scan_limit: default_search_scan_limit(),
            default_importance: default_importance(),
            local_cap: default_local_cap(),
        }
    }
}

fn default_enabled() -> bool {
    true
}

fn default_max_records_per_batch() -> usize {
    8
}

fn default_search_scan_limit() -> usize {
    60
}

fn default_importance() -> f64 {
    0.70
}

fn default_local_cap() -> usize {
    300
}

/// Vector long-term memory configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct VectorConfig {
    /// Enable vector memory writes and recall.
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Minimum similarity for a search hit (0.0-1.0).
    #[serde(default = "default_similarity_threshold")]
    pub similarity_threshold: f64,

    /// Number of memories retrieved for prompt injection.
    #[serde(default = "default_vector_top_k")]
    pub top_k: usize,
}

impl Default for VectorConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            similarity_threshold: default_similarity_threshold(),
            top_k: default_vector_top_k(),
        }
    }
}

fn default_similarity_threshold() -> f64 {
    0.65
}

fn default_vector_top_k() -> usize {
    5
}

/// Rerank weight configuration.
///
/// The reference weights sum to 1.0 but this is not enforced.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RerankConfig {
    #[serde(default = "default_weight_similarity")]
    pub weight_similarity: f64,

    #[serde(default = "default_weight_recency")]
    pub weight_recency: f64,

    #[serde(default = "default_weight_importance")]
    pub weight_importance: f64,

    #[serde(default = "default_weight_keyword")]
    pub weight_keyword: f64,
}

impl Default for RerankConfig {
    fn default() -> Self {
        Self {
            weight_similarity: default_weight_similarity(),
            weight_recency: default_weight_recency(),
            weight_importance: default_weight_importance(),
            weight_keyword: default_weight_keyword(),
        }
    }
}

fn default_weight_similarity() -> f64 {
    0.45
}

fn default_weight_recency() -> f64 {
    0.20
}

fn default_weight_importance() -> f64 {
    0.20
}

fn default_weight_keyword() -> f64 {
    0.15
}

/// Hybrid recall configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RecallConfig {
    /// Lower bound on candidates fetched from each source before rerank.
    #[serde(default = "default_candidate_limit")]
    pub candidate_limit: usize,
}

impl Default for RecallConfig {
    fn default() -> Self {
        Self {
            candidate_limit: default_candidate_limit(),
        }
    }
}

fn default_candidate_limit() -> usize {
    20
}

/// Background worker pool configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct WorkerConfig {
    /// Number of worker tasks draining the queue.
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Bounded queue capacity; jobs beyond this are dropped and counted.
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            queue_capacity: default_queue_capacity(),
        }
    }
}

fn default_workers() -> usize {
    2
}

fn default_queue_capacity() -> usize {
    64
}

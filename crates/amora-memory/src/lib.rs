// SPDX-FileCopyrightText: 2026 Amora Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Tiered conversation memory for the Amora companion agent.
//!
//! Three tiers cooperate to keep prompts small without forgetting:
//! a bounded sliding window of recent messages ([`tiered`]), a running
//! per-conversation summary fed by window evictions ([`summary`]), and
//! long-term stores for typed facts ([`extractor`]) and embedded
//! message text ([`vector`]). [`recall`] merges the long-term sources
//! into one ranked candidate list; [`advisor`] drives all of it once
//! per conversational turn, offloading slow work to [`worker`].

pub mod advisor;
pub mod eviction;
pub mod extractor;
pub mod recall;
pub mod rerank;
pub mod summary;
pub mod tiered;
pub mod tokens;
pub mod types;
pub mod vector;
pub mod window;
pub mod worker;

pub use advisor::{AugmentedPrompt, TieredMemoryAdvisor, TurnRequest};
pub use eviction::find_evicted;
pub use extractor::StructuredMemoryService;
pub use recall::HybridRecallService;
pub use rerank::RerankService;
pub use summary::SummaryService;
pub use tiered::TieredWindowRepository;
pub use types::{CandidateOrigin, CandidateSource, MemoryCandidate, RerankBreakdown};
pub use vector::VectorMemoryService;
pub use window::{FileWindowStore, InProcessWindowStore, KvWindowStore, WindowBackend};
pub use worker::{MemoryJob, MemoryWorker, WorkerStats};

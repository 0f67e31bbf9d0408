// SPDX-FileCopyrightText: 2026 Amora Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Recall-time candidate types.
//!
//! A [`MemoryCandidate`] unifies a structured fact and a vector hit
//! behind one shape so rerank can score both on the same scale. It is
//! ephemeral, constructed per query and never persisted.

use amora_core::{MemoryType, RecordOrigin, Role};

/// Which long-term source produced a candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CandidateSource {
    Structured,
    Vector,
}

impl CandidateSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            CandidateSource::Structured => "structured",
            CandidateSource::Vector => "vector",
        }
    }
}

/// Typed provenance carried on each candidate.
#[derive(Debug, Clone, PartialEq)]
pub enum CandidateOrigin {
    /// From the structured fact store, with the record's own origin.
    Structured { record: RecordOrigin },
    /// From the vector store; the role of the message that was embedded.
    Vector { message_role: Role },
}

impl CandidateOrigin {
    pub fn source(&self) -> CandidateSource {
        match self {
            CandidateOrigin::Structured { .. } => CandidateSource::Structured,
            CandidateOrigin::Vector { .. } => CandidateSource::Vector,
        }
    }
}

/// Component scores attached by rerank, for explainability.
///
/// All values are rounded to three decimals, as is `final_score`.
#[derive(Debug, Clone, PartialEq)]
pub struct RerankBreakdown {
    pub similarity: f64,
    pub recency: f64,
    pub importance: f64,
    pub keyword: f64,
    pub formula: &'static str,
}

/// One recall candidate awaiting (or carrying) a rerank score.
#[derive(Debug, Clone)]
pub struct MemoryCandidate {
    pub memory_type: MemoryType,
    pub content: String,
    /// Source-native relevance in `[0,1]`; `None` when the source has no
    /// meaningful scale (rerank substitutes 0.5).
    pub similarity: Option<f64>,
    /// Record-level salience; `None` for vector hits.
    pub importance: Option<f64>,
    pub timestamp_ms: i64,
    /// Always recomputed by rerank, never trusted from upstream.
    pub final_score: f64,
    pub origin: CandidateOrigin,
    /// Populated by rerank.
    pub rerank: Option<RerankBreakdown>,
}

impl MemoryCandidate {
    pub fn source(&self) -> CandidateSource {
        self.origin.source()
    }
}

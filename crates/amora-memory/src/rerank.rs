// SPDX-FileCopyrightText: 2026 Amora Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Unified scoring over merged recall candidates.
//!
//! Structured and vector sources report incompatible native relevance
//! scales; rerank replaces them with one weighted score combining
//! similarity, recency, importance, and keyword overlap. Scores are
//! rounded to three decimals; ties break by timestamp, newest first.

use std::time::{SystemTime, UNIX_EPOCH};

use amora_config::model::RerankConfig;
use tracing::debug;

use crate::tokens::{keyword_overlap_score, split_tokens};
use crate::types::{MemoryCandidate, RerankBreakdown};

const DEFAULT_TOP_K: usize = 5;

/// Substituted when a candidate carries no similarity or importance.
const NEUTRAL_COMPONENT: f64 = 0.5;

const FORMULA: &str = "sim*ws + rec*wr + imp*wi + key*wk";

const MILLIS_PER_DAY: f64 = 1000.0 * 60.0 * 60.0 * 24.0;

pub struct RerankService {
    weights: RerankConfig,
}

impl RerankService {
    pub fn new(weights: RerankConfig) -> Self {
        Self { weights }
    }

    /// Scores, sorts, and truncates the candidate list.
    pub fn rerank(
        &self,
        query: &str,
        candidates: Vec<MemoryCandidate>,
        top_k: usize,
    ) -> Vec<MemoryCandidate> {
        let now_ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as i64)
            .unwrap_or(0);
        self.rerank_at(query, candidates, top_k, now_ms)
    }

    /// Like [`rerank`](Self::rerank) with an explicit clock, so scoring
    /// is a pure function of its inputs.
    pub fn rerank_at(
        &self,
        query: &str,
        candidates: Vec<MemoryCandidate>,
        top_k: usize,
        now_ms: i64,
    ) -> Vec<MemoryCandidate> {
        if candidates.is_empty() {
            return Vec::new();
        }
        let safe_top_k = if top_k == 0 { DEFAULT_TOP_K } else { top_k };
        let tokens = split_tokens(query);
        let input_count = candidates.len();

        let mut scored: Vec<MemoryCandidate> = candidates
            .into_iter()
            .map(|mut candidate| {
                let similarity = clamp01(candidate.similarity.unwrap_or(NEUTRAL_COMPONENT));
                let importance = clamp01(candidate.importance.unwrap_or(NEUTRAL_COMPONENT));
                let recency = recency_score(candidate.timestamp_ms, now_ms);
                let keyword = keyword_overlap_score(&tokens, &candidate.content);

                let final_score = similarity * self.weights.weight_similarity
                    + recency * self.weights.weight_recency
                    + importance * self.weights.weight_importance
                    + keyword * self.weights.weight_keyword;

                candidate.final_score = round3(final_score);
                candidate.rerank = Some(RerankBreakdown {
                    similarity: round3(similarity),
                    recency: round3(recency),
                    importance: round3(importance),
                    keyword: round3(keyword),
                    formula: FORMULA,
                });
                candidate
            })
            .collect();

        scored.sort_by(|a, b| {
            b.final_score
                .partial_cmp(&a.final_score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(b.timestamp_ms.cmp(&a.timestamp_ms))
        });
        scored.truncate(safe_top_k);

        debug!(
            query_chars = query.chars().count(),
            candidates = input_count,
            ranked = scored.len(),
            "candidates reranked"
        );
        scored
    }
}

/// Smooth seven-day decay: same-day ≈ 1.0, a week old ≈ 0.5, never zero.
fn recency_score(timestamp_ms: i64, now_ms: i64) -> f64 {
    let elapsed = (now_ms - timestamp_ms).max(0) as f64;
    let days = elapsed / MILLIS_PER_DAY;
    clamp01(1.0 / (1.0 + days / 7.0))
}

fn clamp01(value: f64) -> f64 {
    value.clamp(0.0, 1.0)
}

fn round3(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}

// SPDX-FileCopyrightText: 2026 Amora Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Query tokenization shared by structured search and rerank.
//!
//! Queries are lowercased and split on whitespace plus the CJK and
//! ASCII punctuation that separates phrases in the companion-agent
//! domain. Scoring is plain substring overlap, not segmentation:
//! cheap, deterministic, and auditable.

use std::sync::LazyLock;

use regex::Regex;

static TOKEN_SPLIT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[\s,，。；;!?！？和与及]+").expect("token split pattern"));

/// Splits a query into lowercase tokens, deduplicated in first-seen order.
pub fn split_tokens(query: &str) -> Vec<String> {
    let lowered = query.to_lowercase();
    let mut tokens: Vec<String> = Vec::new();
    for part in TOKEN_SPLIT.split(&lowered) {
        if !part.is_empty() && !tokens.iter().any(|t| t == part) {
            tokens.push(part.to_string());
        }
    }
    tokens
}

/// Fraction of `tokens` appearing as substrings of `content`
/// (case-insensitive). Zero when either side is empty.
pub fn keyword_overlap_score(tokens: &[String], content: &str) -> f64 {
    if tokens.is_empty() || content.trim().is_empty() {
        return 0.0;
    }
    let lowered = content.to_lowercase();
    let hits = tokens.iter().filter(|t| lowered.contains(t.as_str())).count();
    hits as f64 / tokens.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_on_cjk_and_ascii_separators() {
        let tokens = split_tokens("预算300 咖啡馆，纪念日和电影");
        assert_eq!(tokens, vec!["预算300", "咖啡馆", "纪念日", "电影"]);
    }

    #[test]
    fn lowercases_and_dedupes() {
        let tokens = split_tokens("Coffee coffee COFFEE tea");
        assert_eq!(tokens, vec!["coffee", "tea"]);
    }

    #[test]
    fn empty_query_yields_no_tokens() {
        assert!(split_tokens("").is_empty());
        assert!(split_tokens(" ，。 ").is_empty());
    }

    #[test]
    fn overlap_is_fraction_of_matched_tokens() {
        let tokens = split_tokens("预算300 咖啡馆");
        assert_eq!(keyword_overlap_score(&tokens, "喜欢安静的咖啡馆"), 0.5);
        assert_eq!(keyword_overlap_score(&tokens, "预算300的咖啡馆"), 1.0);
        assert_eq!(keyword_overlap_score(&tokens, "看电影"), 0.0);
        assert_eq!(keyword_overlap_score(&[], "咖啡馆"), 0.0);
        assert_eq!(keyword_overlap_score(&tokens, "  "), 0.0);
    }
}

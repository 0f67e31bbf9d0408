// SPDX-FileCopyrightText: 2026 Amora Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The equality filter mini-language used by vector store searches.
//!
//! A filter is zero or more `field == 'value'` clauses joined with `&&`.
//! Values are single-quoted; embedded quotes and backslashes are
//! backslash-escaped. Both sides of the language live here so the
//! escaping done by services and the parsing done by backends cannot
//! drift apart.

use crate::error::AmoraError;

/// One parsed `field == 'value'` clause.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EqualityClause {
    pub field: String,
    pub value: String,
}

/// Escape a value for interpolation into a filter expression.
pub fn escape_value(value: &str) -> String {
    value.replace('\\', "\\\\").replace('\'', "\\'")
}

/// Parse a filter expression into its equality clauses.
///
/// An empty or whitespace-only filter parses to no clauses (match all).
pub fn parse(filter: &str) -> Result<Vec<EqualityClause>, AmoraError> {
    let filter = filter.trim();
    if filter.is_empty() {
        return Ok(Vec::new());
    }

    filter
        .split("&&")
        .map(|clause| parse_clause(clause.trim()))
        .collect()
}

fn parse_clause(clause: &str) -> Result<EqualityClause, AmoraError> {
    let (field, raw_value) = clause.split_once("==").ok_or_else(|| {
        AmoraError::Internal(format!("filter clause missing '==': {clause}"))
    })?;

    let field = field.trim();
    if field.is_empty() {
        return Err(AmoraError::Internal(format!(
            "filter clause missing field name: {clause}"
        )));
    }

    let raw_value = raw_value.trim();
    let inner = raw_value
        .strip_prefix('\'')
        .and_then(|v| v.strip_suffix('\''))
        .ok_or_else(|| {
            AmoraError::Internal(format!("filter value must be single-quoted: {clause}"))
        })?;

    Ok(EqualityClause {
        field: field.to_string(),
        value: unescape(inner),
    })
}

fn unescape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.next() {
                Some(next) => out.push(next),
                None => out.push('\\'),
            }
        } else {
            out.push(c);
        }
    }
    out
}

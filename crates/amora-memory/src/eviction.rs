// SPDX-FileCopyrightText: 2026 Amora Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Eviction detection over before/after window snapshots.
//!
//! The window stores have no explicit evict event, so eviction is
//! recovered by diffing message signatures: anything present before the
//! turn's append but absent after it fell off the bounded window.
//! SYSTEM messages never count as evicted.

use std::collections::HashSet;

use amora_core::{ChatMessage, Role};

/// Messages present in `before` but missing from `after`, by signature.
pub fn find_evicted(before: &[ChatMessage], after: &[ChatMessage]) -> Vec<ChatMessage> {
    if before.is_empty() {
        return Vec::new();
    }
    let after_signatures: HashSet<String> = after
        .iter()
        .filter(|m| m.role != Role::System)
        .map(ChatMessage::signature)
        .collect();

    before
        .iter()
        .filter(|m| m.role != Role::System)
        .filter(|m| !after_signatures.contains(&m.signature()))
        .cloned()
        .collect()
}

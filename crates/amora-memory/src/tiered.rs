// SPDX-FileCopyrightText: 2026 Amora Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Tiered window repository: in-process, then durable KV, then file.
//!
//! Reads fall through the tiers and backfill every faster tier on a
//! hit. Writes bound the window first, then replicate to all tiers.
//! A backend failure is logged at that tier's boundary and treated as
//! tier-empty; no call on this type can fail, because prompt assembly
//! must degrade rather than error.

use std::sync::Arc;

use amora_core::{ChatMessage, Role};
use tracing::{debug, warn};

use crate::window::WindowBackend;

pub struct TieredWindowRepository {
    local: Arc<dyn WindowBackend>,
    kv: Option<Arc<dyn WindowBackend>>,
    file: Option<Arc<dyn WindowBackend>>,
    max_messages: usize,
}

impl TieredWindowRepository {
    pub fn new(
        local: Arc<dyn WindowBackend>,
        kv: Option<Arc<dyn WindowBackend>>,
        file: Option<Arc<dyn WindowBackend>>,
        max_messages: usize,
    ) -> Self {
        Self {
            local,
            kv,
            file,
            max_messages,
        }
    }

    /// Returns the window for a conversation, empty when every tier
    /// misses or fails.
    pub async fn get(&self, conversation_id: &str) -> Vec<ChatMessage> {
        match self.local.load(conversation_id).await {
            Ok(messages) if !messages.is_empty() => return messages,
            Ok(_) => {}
            Err(e) => warn!(conversation_id = %conversation_id, error = %e, "local window tier read failed"),
        }

        if let Some(kv) = &self.kv {
            match kv.load(conversation_id).await {
                Ok(messages) if !messages.is_empty() => {
                    self.backfill(conversation_id, &messages, &[&self.local]).await;
                    return messages;
                }
                Ok(_) => {}
                Err(e) => warn!(conversation_id = %conversation_id, error = %e, "kv window tier read failed"),
            }
        }

        if let Some(file) = &self.file {
            match file.load(conversation_id).await {
                Ok(messages) if !messages.is_empty() => {
                    let mut faster: Vec<&Arc<dyn WindowBackend>> = vec![&self.local];
                    if let Some(kv) = &self.kv {
                        faster.push(kv);
                    }
                    self.backfill(conversation_id, &messages, &faster).await;
                    return messages;
                }
                Ok(_) => {}
                Err(e) => warn!(conversation_id = %conversation_id, error = %e, "file window tier read failed"),
            }
        }

        Vec::new()
    }

    /// Appends messages, bounds the window to `max_messages` (oldest
    /// non-SYSTEM messages dropped first), and replicates the bounded
    /// window to every tier.
    pub async fn add(&self, conversation_id: &str, messages: &[ChatMessage]) {
        if messages.is_empty() {
            return;
        }
        let mut window = self.get(conversation_id).await;
        window.extend_from_slice(messages);
        bound_window(&mut window, self.max_messages);

        self.store_all(conversation_id, &window).await;
        debug!(
            conversation_id = %conversation_id,
            added = messages.len(),
            window_size = window.len(),
            "window updated"
        );
    }

    /// Clears the conversation from every tier.
    pub async fn clear(&self, conversation_id: &str) {
        for (name, tier) in self.tiers() {
            if let Err(e) = tier.clear(conversation_id).await {
                warn!(conversation_id = %conversation_id, tier = name, error = %e, "window tier clear failed");
            }
        }
    }

    async fn store_all(&self, conversation_id: &str, window: &[ChatMessage]) {
        for (name, tier) in self.tiers() {
            if let Err(e) = tier.store(conversation_id, window).await {
                warn!(conversation_id = %conversation_id, tier = name, error = %e, "window tier write failed");
            }
        }
    }

    async fn backfill(
        &self,
        conversation_id: &str,
        messages: &[ChatMessage],
        faster_tiers: &[&Arc<dyn WindowBackend>],
    ) {
        for tier in faster_tiers {
            if let Err(e) = tier.store(conversation_id, messages).await {
                warn!(conversation_id = %conversation_id, error = %e, "window tier backfill failed");
            }
        }
    }

    fn tiers(&self) -> Vec<(&'static str, &Arc<dyn WindowBackend>)> {
        let mut tiers: Vec<(&'static str, &Arc<dyn WindowBackend>)> =
            vec![("local", &self.local)];
        if let Some(kv) = &self.kv {
            tiers.push(("kv", kv));
        }
        if let Some(file) = &self.file {
            tiers.push(("file", file));
        }
        tiers
    }
}

/// Drops oldest non-SYSTEM messages until the window fits the bound.
fn bound_window(window: &mut Vec<ChatMessage>, max_messages: usize) {
    while window.len() > max_messages {
        let Some(idx) = window.iter().position(|m| m.role != Role::System) else {
            break;
        };
        window.remove(idx);
    }
}

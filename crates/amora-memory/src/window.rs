// SPDX-FileCopyrightText: 2026 Amora Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Window storage backends.
//!
//! Each backend stores the full message list for a conversation; the
//! tiered repository owns bounding and composes backends into one
//! read-through hierarchy. `store` is a full replace, which keeps the
//! window bound invariant enforceable in exactly one place.

use std::path::PathBuf;
use std::time::Duration;

use amora_core::{AmoraError, ChatMessage, KvAdapter};
use async_trait::async_trait;
use dashmap::DashMap;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use tracing::warn;

/// One storage tier for conversation windows.
#[async_trait]
pub trait WindowBackend: Send + Sync {
    /// Returns the stored window, empty if absent.
    async fn load(&self, conversation_id: &str) -> Result<Vec<ChatMessage>, AmoraError>;

    /// Replaces the stored window with `messages`.
    async fn store(&self, conversation_id: &str, messages: &[ChatMessage])
        -> Result<(), AmoraError>;

    /// Removes the stored window.
    async fn clear(&self, conversation_id: &str) -> Result<(), AmoraError>;
}

/// In-process window tier.
#[derive(Default)]
pub struct InProcessWindowStore {
    windows: DashMap<String, Vec<ChatMessage>>,
}

impl InProcessWindowStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl WindowBackend for InProcessWindowStore {
    async fn load(&self, conversation_id: &str) -> Result<Vec<ChatMessage>, AmoraError> {
        Ok(self
            .windows
            .get(conversation_id)
            .map(|w| w.clone())
            .unwrap_or_default())
    }

    async fn store(
        &self,
        conversation_id: &str,
        messages: &[ChatMessage],
    ) -> Result<(), AmoraError> {
        self.windows
            .insert(conversation_id.to_string(), messages.to_vec());
        Ok(())
    }

    async fn clear(&self, conversation_id: &str) -> Result<(), AmoraError> {
        self.windows.remove(conversation_id);
        Ok(())
    }
}

/// Durable key-value window tier; the message list is stored as JSON.
pub struct KvWindowStore {
    kv: Arc<dyn KvAdapter>,
    ttl: Option<Duration>,
}

const WINDOW_KEY_PREFIX: &str = "amora:window:";

impl KvWindowStore {
    pub fn new(kv: Arc<dyn KvAdapter>, ttl: Option<Duration>) -> Self {
        Self { kv, ttl }
    }

    fn key(conversation_id: &str) -> String {
        format!("{WINDOW_KEY_PREFIX}{conversation_id}")
    }
}

#[async_trait]
impl WindowBackend for KvWindowStore {
    async fn load(&self, conversation_id: &str) -> Result<Vec<ChatMessage>, AmoraError> {
        let Some(raw) = self.kv.get(&Self::key(conversation_id)).await? else {
            return Ok(Vec::new());
        };
        match serde_json::from_str(&raw) {
            Ok(messages) => Ok(messages),
            Err(e) => {
                // Malformed payload reads as empty rather than poisoning the tier.
                warn!(conversation_id = %conversation_id, error = %e, "discarding malformed window payload");
                Ok(Vec::new())
            }
        }
    }

    async fn store(
        &self,
        conversation_id: &str,
        messages: &[ChatMessage],
    ) -> Result<(), AmoraError> {
        let raw = serde_json::to_string(messages)
            .map_err(|e| AmoraError::Internal(format!("window serialization: {e}")))?;
        self.kv.set(&Self::key(conversation_id), &raw, self.ttl).await
    }

    async fn clear(&self, conversation_id: &str) -> Result<(), AmoraError> {
        self.kv.delete(&Self::key(conversation_id)).await
    }
}

/// File window tier: one JSON file per conversation.
///
/// Files are named by the SHA-256 hex of the conversation id so
/// arbitrary ids never produce unsafe filenames. Writes go to a temp
/// file first and rename into place, so a crash never leaves a
/// half-written window.
pub struct FileWindowStore {
    dir: PathBuf,
}

impl FileWindowStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path_for(&self, conversation_id: &str) -> PathBuf {
        let digest = Sha256::digest(conversation_id.as_bytes());
        self.dir.join(format!("{}.json", hex::encode(digest)))
    }
}

#[async_trait]
impl WindowBackend for FileWindowStore {
    async fn load(&self, conversation_id: &str) -> Result<Vec<ChatMessage>, AmoraError> {
        let path = self.path_for(conversation_id);
        let raw = match tokio::fs::read_to_string(&path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(AmoraError::storage(e)),
        };
        match serde_json::from_str(&raw) {
            Ok(messages) => Ok(messages),
            Err(e) => {
                warn!(conversation_id = %conversation_id, path = %path.display(), error = %e, "discarding corrupt window file");
                Ok(Vec::new())
            }
        }
    }

    async fn store(
        &self,
        conversation_id: &str,
        messages: &[ChatMessage],
    ) -> Result<(), AmoraError> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(AmoraError::storage)?;
        let path = self.path_for(conversation_id);
        let tmp = path.with_extension("json.tmp");
        let raw = serde_json::to_string(messages)
            .map_err(|e| AmoraError::Internal(format!("window serialization: {e}")))?;
        tokio::fs::write(&tmp, raw)
            .await
            .map_err(AmoraError::storage)?;
        tokio::fs::rename(&tmp, &path)
            .await
            .map_err(AmoraError::storage)
    }

    async fn clear(&self, conversation_id: &str) -> Result<(), AmoraError> {
        match tokio::fs::remove_file(self.path_for(conversation_id)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(AmoraError::storage(e)),
        }
    }
}

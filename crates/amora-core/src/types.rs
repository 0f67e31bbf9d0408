// SPDX-FileCopyrightText: 2026 Amora Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Domain types for conversation messages and memory entries.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Role of a conversation message.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
pub enum Role {
    User,
    Assistant,
    System,
}

impl Role {
    /// Convert to the canonical string used in signatures and storage.
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "USER",
            Role::Assistant => "ASSISTANT",
            Role::System => "SYSTEM",
        }
    }

    /// Parse from a stored string, defaulting unknown values to Assistant.
    pub fn from_str_value(s: &str) -> Self {
        match s {
            "USER" => Role::User,
            "SYSTEM" => Role::System,
            _ => Role::Assistant,
        }
    }

    /// Human-readable label used when rendering message lines for
    /// summaries and vector documents.
    pub fn label(&self) -> &'static str {
        match self {
            Role::User => "用户",
            Role::Assistant => "AI助手",
            Role::System => "系统",
        }
    }
}

/// A single conversation message. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub text: String,
}

impl ChatMessage {
    pub fn new(role: Role, text: impl Into<String>) -> Self {
        Self {
            role,
            text: text.into(),
        }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self::new(Role::User, text)
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self::new(Role::Assistant, text)
    }

    pub fn system(text: impl Into<String>) -> Self {
        Self::new(Role::System, text)
    }

    /// Identity-free signature used for window diffing: `role + ":" + text`.
    ///
    /// Two messages with the same role and text are the same message as
    /// far as eviction accounting is concerned.
    pub fn signature(&self) -> String {
        format!("{}:{}", self.role.as_str(), self.text)
    }

    /// Whether the message carries any non-whitespace text.
    pub fn has_text(&self) -> bool {
        !self.text.trim().is_empty()
    }
}

/// Category of a stored memory entry.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum MemoryType {
    /// Like/dislike phrase extracted from message text.
    Preference,
    /// Numeric budget mention.
    Constraint,
    /// ISO or locale date mention.
    EventDate,
    /// Relationship-event keyword.
    Event,
    /// Generic conversation snippet (extractor fallback and vector entries).
    Conversation,
}

impl MemoryType {
    /// Convert to string for storage.
    pub fn as_str(&self) -> &'static str {
        match self {
            MemoryType::Preference => "preference",
            MemoryType::Constraint => "constraint",
            MemoryType::EventDate => "event_date",
            MemoryType::Event => "event",
            MemoryType::Conversation => "conversation",
        }
    }

    /// Parse from a stored string, defaulting unknown values to Conversation.
    pub fn from_str_value(s: &str) -> Self {
        match s {
            "preference" => MemoryType::Preference,
            "constraint" => MemoryType::Constraint,
            "event_date" => MemoryType::EventDate,
            "event" => MemoryType::Event,
            _ => MemoryType::Conversation,
        }
    }
}

/// How a structured memory record came to exist.
///
/// Persisted in the record's metadata column; the tag survives round
/// trips through storage so recall can report provenance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum RecordOrigin {
    /// Matched one of the extraction patterns.
    RegexExtract { pattern: String },
    /// Whole-message fallback record written when no pattern matched.
    Fallback,
}

/// A typed fact distilled from conversation text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StructuredMemoryRecord {
    pub conversation_id: String,
    pub memory_type: MemoryType,
    pub content: String,
    /// Salience in `[0,1]`; pattern-specific for extracted facts.
    pub importance: f64,
    /// Creation time, epoch milliseconds.
    pub timestamp_ms: i64,
    pub origin: RecordOrigin,
}

/// Closed metadata attached to every vector document.
///
/// This replaces an open key/value bag with a fixed set of recognized
/// fields so the recall path stays type-safe. The filter mini-language
/// (see [`crate::traits::VectorStoreAdapter`]) matches against these
/// fields by name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentMetadata {
    pub conversation_id: String,
    pub message_role: Role,
    pub memory_type: MemoryType,
    pub timestamp_ms: i64,
}

impl DocumentMetadata {
    /// Look up a filter field by name. Unknown fields resolve to `None`,
    /// which makes any equality clause against them fail.
    pub fn field(&self, name: &str) -> Option<String> {
        match name {
            "conversation_id" => Some(self.conversation_id.clone()),
            "message_role" => Some(self.message_role.as_str().to_string()),
            "memory_type" => Some(self.memory_type.as_str().to_string()),
            "timestamp_ms" => Some(self.timestamp_ms.to_string()),
            _ => None,
        }
    }
}

/// The relevance figure a vector backend reported for a search hit.
///
/// Different backends expose different fields (an explicit score, a raw
/// similarity, or a distance). Carrying the signal as a closed enum lets
/// the memory service normalize it into a single `[0,1]` similarity in
/// one place.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum RelevanceSignal {
    Score(f64),
    Similarity(f64),
    Distance(f64),
}

/// An embedded document stored in, or returned by, a vector backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    /// Unique identifier assigned at insert time.
    pub id: String,
    /// The document text (`"<role-label>: <message text>"` for memories).
    pub text: String,
    /// Closed, typed metadata.
    pub metadata: DocumentMetadata,
    /// Relevance reported by the backend on search results; `None` on insert.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub relevance: Option<RelevanceSignal>,
}

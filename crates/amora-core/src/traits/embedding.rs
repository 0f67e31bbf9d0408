// SPDX-FileCopyrightText: 2026 Amora Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Embedding adapter trait for vector embedding generation.

use async_trait::async_trait;

use crate::error::AmoraError;

/// Adapter for generating vector embeddings from text.
///
/// Embedding adapters power semantic search over past conversation
/// turns. The model is opaque: the subsystem only requires that equal
/// inputs produce equal vectors of a consistent dimension.
#[async_trait]
pub trait EmbeddingAdapter: Send + Sync {
    /// Generates one embedding per input text, preserving order.
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, AmoraError>;
}

// SPDX-FileCopyrightText: 2026 Amora Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Vector store adapter trait for similarity search over documents.

use async_trait::async_trait;

use crate::error::AmoraError;
use crate::types::Document;

/// Adapter for an embedding-indexed document store.
///
/// The `filter` argument of [`similarity_search`] is an equality
/// mini-language over [`crate::types::DocumentMetadata`] fields:
///
/// ```text
/// conversation_id == 'abc' && memory_type == 'conversation'
/// ```
///
/// Clauses are joined with `&&`; values are single-quoted with
/// backslash-escaped embedded quotes. An empty filter matches all
/// documents.
///
/// [`similarity_search`]: VectorStoreAdapter::similarity_search
#[async_trait]
pub trait VectorStoreAdapter: Send + Sync {
    /// Embeds and stores the given documents. Document `relevance` is ignored.
    async fn add_documents(&self, documents: &[Document]) -> Result<(), AmoraError>;

    /// Returns up to `top_k` documents matching `filter`, most similar
    /// first, each carrying a populated `relevance` signal. Documents
    /// below `threshold` similarity are excluded.
    async fn similarity_search(
        &self,
        query: &str,
        top_k: usize,
        threshold: f64,
        filter: &str,
    ) -> Result<Vec<Document>, AmoraError>;
}

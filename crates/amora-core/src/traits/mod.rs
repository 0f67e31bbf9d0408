// SPDX-FileCopyrightText: 2026 Amora Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Adapter trait definitions at the memory subsystem's external seams.
//!
//! All adapters use `#[async_trait]` for dynamic dispatch compatibility.
//! Every backend behind these traits is allowed to fail; the memory
//! services decide per call site whether a failure degrades (tier reads)
//! or propagates (direct storage operations).

pub mod embedding;
pub mod generation;
pub mod kv;
pub mod vector;

// Re-export all traits at the traits module level for convenience.
pub use embedding::EmbeddingAdapter;
pub use generation::GenerationAdapter;
pub use kv::KvAdapter;
pub use vector::VectorStoreAdapter;

// SPDX-FileCopyrightText: 2026 Amora Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core types, errors, and adapter traits shared across the Amora
//! memory subsystem.
//!
//! Amora is a relationship-companion conversational agent; this crate
//! defines the vocabulary the tiered memory crates speak: chat messages,
//! memory types, vector documents, and the adapter traits at the seams
//! to external backends (generation, embedding, vector store, key-value
//! store).

pub mod error;
pub mod filter;
pub mod traits;
pub mod types;

pub use error::AmoraError;
pub use traits::{EmbeddingAdapter, GenerationAdapter, KvAdapter, VectorStoreAdapter};
pub use types::*;

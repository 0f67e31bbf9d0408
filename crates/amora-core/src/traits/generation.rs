// SPDX-FileCopyrightText: 2026 Amora Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Generation adapter trait for text-generation backends.

use async_trait::async_trait;

use crate::error::AmoraError;

/// Adapter for an opaque text-generation backend.
///
/// The memory subsystem only uses generation for summary compression,
/// and only when the operator enables it; correctness never depends on
/// this adapter. Calls may be slow and may fail.
#[async_trait]
pub trait GenerationAdapter: Send + Sync {
    /// Generates text for the given prompt.
    async fn generate(&self, prompt: &str) -> Result<String, AmoraError>;
}

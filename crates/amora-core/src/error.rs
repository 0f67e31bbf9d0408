// SPDX-FileCopyrightText: 2026 Amora Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the Amora memory subsystem.

use thiserror::Error;

/// The primary error type used across all Amora adapter traits and core operations.
///
/// There is no fatal error class in the memory subsystem: callers at
/// subsystem boundaries (tier reads, background jobs) catch these,
/// log them, and degrade to "no memory available" rather than failing
/// the conversation.
#[derive(Debug, Error)]
pub enum AmoraError {
    /// Configuration errors (invalid TOML, missing required fields, type mismatches).
    #[error("configuration error: {0}")]
    Config(String),

    /// Storage backend errors (database connection, query failure, serialization).
    #[error("storage error: {source}")]
    Storage {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Generation or embedding provider errors (API failure, model not found).
    #[error("provider error: {message}")]
    Provider {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Operation timed out.
    #[error("operation timed out after {duration:?}")]
    Timeout { duration: std::time::Duration },

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl AmoraError {
    /// Wrap any error as a storage error.
    pub fn storage<E>(source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        AmoraError::Storage {
            source: Box::new(source),
        }
    }
}

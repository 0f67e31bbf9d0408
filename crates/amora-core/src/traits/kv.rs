// SPDX-FileCopyrightText: 2026 Amora Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Key-value adapter trait for durable string storage with TTL.

use std::time::Duration;

use async_trait::async_trait;

use crate::error::AmoraError;

/// Adapter for a durable key-value backend.
///
/// Used for the durable window tier and the summary store. Backends
/// must enforce their own connect/read timeouts and surface failures
/// as errors; callers treat a failed call as "tier unavailable".
#[async_trait]
pub trait KvAdapter: Send + Sync {
    /// Returns the value for `key`, or `None` if absent or expired.
    async fn get(&self, key: &str) -> Result<Option<String>, AmoraError>;

    /// Stores `value` under `key`, replacing any previous value.
    ///
    /// A `ttl` of `None` stores the value without expiry.
    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<(), AmoraError>;

    /// Removes `key`. Removing an absent key is not an error.
    async fn delete(&self, key: &str) -> Result<(), AmoraError>;
}

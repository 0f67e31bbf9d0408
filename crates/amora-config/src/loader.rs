// SPDX-FileCopyrightText: 2026 Amora Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration loader using Figment for layered config merging.
//!
//! Supports XDG hierarchy: `./amora.toml` > `~/.config/amora/amora.toml` > `/etc/amora/amora.toml`
//! with environment variable overrides via `AMORA_` prefix.

#![allow(clippy::result_large_err)] // figment::Error is external and cannot be boxed without wrapper

use std::path::Path;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};

use crate::model::AmoraConfig;

/// Load configuration from the standard XDG hierarchy with env var overrides.
///
/// Merge order (later overrides earlier):
/// 1. Compiled defaults
/// 2. `/etc/amora/amora.toml` (system-wide)
/// 3. `~/.config/amora/amora.toml` (user XDG config)
/// 4. `./amora.toml` (local directory)
/// 5. `AMORA_*` environment variables
pub fn load_config() -> Result<AmoraConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(AmoraConfig::default()))
        .merge(Toml::file("/etc/amora/amora.toml"))
        .merge(Toml::file(
            dirs::config_dir()
                .map(|d| d.join("amora/amora.toml"))
                .unwrap_or_default(),
        ))
        .merge(Toml::file("amora.toml"))
        .merge(env_provider())
        .extract()
}

/// Load configuration from a TOML string only (no XDG lookup).
///
/// Used for testing and explicit config specification.
pub fn load_config_from_str(toml_content: &str) -> Result<AmoraConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(AmoraConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from a specific file path with env var overrides.
pub fn load_config_from_path(path: &Path) -> Result<AmoraConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(AmoraConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// Create the environment variable provider using explicit `map()` for section-to-dot mapping.
///
/// Uses `Env::map()` NOT `Env::split("_")` to avoid ambiguity with
/// underscore-containing key names: `AMORA_AGENT_LOG_LEVEL` must map to
/// `agent.log_level`, not `agent.log.level`. Nested memory sections map
/// the first two segments.
fn env_provider() -> Env {
    Env::prefixed("AMORA_").map(|key| {
        // `key` is the lowercased env var name with prefix stripped.
        // Example: AMORA_MEMORY_WINDOW_MAX_MESSAGES -> "memory_window_max_messages"
        let key_str = key.as_str();
        let mapped = key_str
            .replacen("agent_", "agent.", 1)
            .replacen("storage_", "storage.", 1)
            .replacen("memory_window_", "memory.window.", 1)
            .replacen("memory_summary_", "memory.summary.", 1)
            .replacen("memory_structured_", "memory.structured.", 1)
            .replacen("memory_vector_", "memory.vector.", 1)
            .replacen("memory_rerank_", "memory.rerank.", 1)
            .replacen("memory_recall_", "memory.recall.", 1)
            .replacen("memory_worker_", "memory.worker.", 1)
            .replacen("memory_", "memory.", 1);
        mapped.into()
    })
}

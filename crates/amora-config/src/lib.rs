// SPDX-FileCopyrightText: 2026 Amora Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration for the Amora memory subsystem.
//!
//! Models are plain serde structs with per-field defaults; loading is
//! layered TOML + environment via figment.

pub mod loader;
pub mod model;

pub use loader::{load_config, load_config_from_path, load_config_from_str};
pub use model::AmoraConfig;

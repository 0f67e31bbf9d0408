// SPDX-FileCopyrightText: 2026 Amora Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite-backed storage for the Amora memory subsystem.
//!
//! One database file holds three tables: `kv_entries` (durable
//! key-value tier with TTL), `memory_records` (structured facts), and
//! `memory_documents` (embedded vector memories). All access goes
//! through [`Database`], an async handle over a single connection.

pub mod database;
pub mod kv;
pub mod records;
pub mod vector;

pub use database::Database;
pub use kv::SqliteKvStore;
pub use records::RecordStore;
pub use vector::SqliteVectorStore;

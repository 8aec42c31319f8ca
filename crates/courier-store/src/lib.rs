// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite persistence layer for the Courier message bridge.
//!
//! The store holds three tables: `messages` (the append-only log, keyed by
//! a monotonic `seq`), `conversations` (a projection maintained in the same
//! transaction as each insert), and `bridge_state` (the poll watermark).
//! Schema management is handled by embedded refinery migrations.

pub mod database;
pub mod migrations;
pub mod queries;

pub use database::Database;

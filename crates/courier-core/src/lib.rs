// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core types and traits for the Courier message bridge.
//!
//! This crate has no I/O of its own. It defines the data model shared by
//! every other workspace crate (`Message`, `Conversation`, the error
//! taxonomy) and the [`NativeStore`] trait that platform adapters implement.

pub mod error;
pub mod traits;
pub mod types;

pub use error::CourierError;
pub use traits::NativeStore;
pub use types::{Conversation, Direction, HealthStatus, Message, NewMessage, RawNativeMessage};

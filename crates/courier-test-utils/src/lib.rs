// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Shared fixtures for courier integration tests: a scripted mock adapter
//! and a harness that assembles the full bridge stack around it.

pub mod harness;
pub mod mock_native;

pub use harness::{TestHarness, TestHarnessBuilder};
pub use mock_native::{raw_message, MockNativeStore, MockSendMode, SentRecord};

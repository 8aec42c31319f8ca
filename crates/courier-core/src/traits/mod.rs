// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Trait definitions for pluggable subsystems.

pub mod native;

pub use native::NativeStore;

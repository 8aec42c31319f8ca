// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP and WebSocket gateway.
//!
//! Exposes the bridge over five routes: health, conversation listing,
//! message history, outbound send, and a live event stream. Handlers read
//! the store directly; every write goes through the ingest engine's
//! command channel.

pub mod handlers;
pub mod server;
pub mod ws;

pub use server::{build_router, start_server, GatewayState, ServerConfig};

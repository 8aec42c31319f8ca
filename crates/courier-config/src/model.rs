// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for the Courier message bridge.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup, providing actionable error messages.

use serde::{Deserialize, Serialize};

/// Top-level Courier configuration.
///
/// Loaded from TOML files following XDG hierarchy, with environment variable overrides.
/// All sections are optional and default to sensible values.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct CourierConfig {
    /// Poll loop, dedup, and fan-out settings.
    #[serde(default)]
    pub bridge: BridgeConfig,

    /// HTTP/WebSocket server settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// Bridge store settings.
    #[serde(default)]
    pub storage: StorageConfig,

    /// iMessage adapter settings.
    #[serde(default)]
    pub imessage: IMessageConfig,

    /// Optional downstream integration settings.
    #[serde(default)]
    pub integrations: IntegrationsConfig,
}

/// Poll loop, dedup, and fan-out configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct BridgeConfig {
    /// Seconds between poll cycles against the native store.
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: f64,

    /// Deadline in seconds for a single `fetch_since` call.
    #[serde(default = "default_fetch_timeout_secs")]
    pub fetch_timeout_secs: f64,

    /// Deadline in seconds for an outbound send.
    #[serde(default = "default_send_timeout_secs")]
    pub send_timeout_secs: f64,

    /// Seconds to wait after a failed poll cycle before polling again.
    #[serde(default = "default_error_backoff_secs")]
    pub error_backoff_secs: f64,

    /// Width in seconds of the in-memory dedup recency window.
    #[serde(default = "default_dedup_window_secs")]
    pub dedup_window_secs: f64,

    /// Number of recent messages replayed to a new WebSocket subscriber.
    #[serde(default = "default_replay_backlog")]
    pub replay_backlog: usize,

    /// Per-subscriber event queue capacity. Subscribers that fall this far
    /// behind are disconnected.
    #[serde(default = "default_subscriber_queue_size")]
    pub subscriber_queue_size: usize,

    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval_secs(),
            fetch_timeout_secs: default_fetch_timeout_secs(),
            send_timeout_secs: default_send_timeout_secs(),
            error_backoff_secs: default_error_backoff_secs(),
            dedup_window_secs: default_dedup_window_secs(),
            replay_backlog: default_replay_backlog(),
            subscriber_queue_size: default_subscriber_queue_size(),
            log_level: default_log_level(),
        }
    }
}

fn default_poll_interval_secs() -> f64 {
    0.5
}

fn default_fetch_timeout_secs() -> f64 {
    10.0
}

fn default_send_timeout_secs() -> f64 {
    30.0
}

fn default_error_backoff_secs() -> f64 {
    5.0
}

fn default_dedup_window_secs() -> f64 {
    300.0
}

fn default_replay_backlog() -> usize {
    20
}

fn default_subscriber_queue_size() -> usize {
    64
}

fn default_log_level() -> String {
    "info".to_string()
}

/// HTTP/WebSocket server configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    /// Address to bind the server to.
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to bind the server to.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Default number of messages returned by the history endpoint.
    #[serde(default = "default_history_page_limit")]
    pub history_page_limit: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            history_page_limit: default_history_page_limit(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8765
}

fn default_history_page_limit() -> usize {
    20
}

/// Bridge store configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_database_path")]
    pub database_path: String,

    /// Enable WAL (Write-Ahead Logging) mode for SQLite.
    #[serde(default = "default_wal_mode")]
    pub wal_mode: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            wal_mode: default_wal_mode(),
        }
    }
}

fn default_database_path() -> String {
    dirs::data_dir()
        .map(|p| p.join("courier").join("courier.db"))
        .unwrap_or_else(|| std::path::PathBuf::from("courier.db"))
        .to_string_lossy()
        .into_owned()
}

fn default_wal_mode() -> bool {
    true
}

/// iMessage adapter configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct IMessageConfig {
    /// Path to the Messages.app database.
    #[serde(default = "default_chat_db_path")]
    pub chat_db_path: String,

    /// Number of osascript attempts before a send is reported as rejected.
    #[serde(default = "default_send_retry_count")]
    pub send_retry_count: u32,

    /// Base delay in seconds between send retries. Doubles per attempt.
    #[serde(default = "default_send_retry_delay_secs")]
    pub send_retry_delay_secs: f64,
}

impl Default for IMessageConfig {
    fn default() -> Self {
        Self {
            chat_db_path: default_chat_db_path(),
            send_retry_count: default_send_retry_count(),
            send_retry_delay_secs: default_send_retry_delay_secs(),
        }
    }
}

fn default_chat_db_path() -> String {
    dirs::home_dir()
        .map(|p| p.join("Library").join("Messages").join("chat.db"))
        .unwrap_or_else(|| std::path::PathBuf::from("chat.db"))
        .to_string_lossy()
        .into_owned()
}

fn default_send_retry_count() -> u32 {
    3
}

fn default_send_retry_delay_secs() -> f64 {
    1.0
}

/// Optional downstream integration configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct IntegrationsConfig {
    /// API key handed to downstream consumers. `None` disables the
    /// integrations that need one.
    #[serde(default)]
    pub api_key: Option<String>,
}

// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! macOS Messages adapter.
//!
//! Incoming traffic is read straight out of `chat.db` (read-only, so
//! Messages.app stays the sole writer); outgoing traffic goes through
//! AppleScript because Apple offers no supported write path. The adapter
//! never touches the bridge's own store.

mod reader;
mod sender;

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, warn};

use courier_core::{CourierError, HealthStatus, NativeStore, RawNativeMessage};

/// Settings the adapter needs, mirrored from the service configuration so
/// this crate does not depend on the config loader.
#[derive(Debug, Clone)]
pub struct IMessageStoreConfig {
    pub chat_db_path: String,
    pub send_retry_count: u32,
    pub send_retry_delay_secs: f64,
}

/// The `chat.db` + AppleScript adapter.
pub struct IMessageStore {
    config: IMessageStoreConfig,
}

impl IMessageStore {
    pub fn new(config: IMessageStoreConfig) -> Self {
        Self { config }
    }

    /// Run a read-only query against chat.db on the blocking pool.
    async fn with_chat_db<T, F>(&self, f: F) -> Result<T, CourierError>
    where
        T: Send + 'static,
        F: FnOnce(&rusqlite::Connection) -> Result<T, rusqlite::Error> + Send + 'static,
    {
        let path = self.config.chat_db_path.clone();
        tokio::task::spawn_blocking(move || {
            let conn = reader::open_read_only(&path).map_err(|e| {
                CourierError::AdapterUnavailable {
                    message: format!("cannot open chat.db at {path}: {e}"),
                }
            })?;
            f(&conn).map_err(|e| CourierError::AdapterUnavailable {
                message: format!("chat.db query failed: {e}"),
            })
        })
        .await
        .map_err(|e| CourierError::Internal(format!("chat.db task panicked: {e}")))?
    }
}

#[async_trait]
impl NativeStore for IMessageStore {
    fn name(&self) -> &str {
        "imessage"
    }

    fn version(&self) -> semver::Version {
        semver::Version::parse(env!("CARGO_PKG_VERSION"))
            .unwrap_or_else(|_| semver::Version::new(0, 0, 0))
    }

    /// Unhealthy covers both a missing database and one we cannot read;
    /// on macOS the latter usually means the process lacks Full Disk
    /// Access.
    async fn health_check(&self) -> Result<HealthStatus, CourierError> {
        if !Path::new(&self.config.chat_db_path).exists() {
            return Ok(HealthStatus::Unhealthy(format!(
                "chat.db not found at {}",
                self.config.chat_db_path
            )));
        }

        let status = match self.with_chat_db(reader::probe).await {
            Ok(true) => HealthStatus::Healthy,
            Ok(false) => {
                HealthStatus::Unhealthy("chat.db has no message table".to_string())
            }
            Err(e) => HealthStatus::Unhealthy(format!(
                "chat.db is not readable (is Full Disk Access granted?): {e}"
            )),
        };
        Ok(status)
    }

    async fn fetch_since(&self, watermark: f64) -> Result<Vec<RawNativeMessage>, CourierError> {
        self.with_chat_db(move |conn| reader::read_since(conn, watermark))
            .await
    }

    /// Deliver through Messages.app, then try to learn the native guid of
    /// the row it wrote. `Ok(None)` means delivery succeeded but the guid
    /// was not yet visible.
    async fn send(
        &self,
        recipient: &str,
        body: &str,
        attachments: &[String],
    ) -> Result<Option<String>, CourierError> {
        let script = sender::build_send_script(recipient, body, attachments);
        sender::run_osascript(
            &script,
            self.config.send_retry_count,
            Duration::from_secs_f64(self.config.send_retry_delay_secs),
        )
        .await?;

        // Messages.app commits the sent row asynchronously.
        tokio::time::sleep(Duration::from_millis(200)).await;

        let recipient = recipient.to_string();
        let body = body.to_string();
        match self
            .with_chat_db(move |conn| reader::find_sent_guid(conn, &recipient, &body))
            .await
        {
            Ok(guid) => Ok(guid),
            Err(e) => {
                warn!(error = %e, "sent message guid lookup failed");
                Ok(None)
            }
        }
    }

    async fn shutdown(&self) -> Result<(), CourierError> {
        debug!("imessage adapter shut down");
        Ok(())
    }
}

// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test harness for end-to-end integration testing.
//!
//! `TestHarness` assembles a complete bridge stack: mock adapter, temp
//! SQLite store, running ingest engine, optional poller, and a gateway
//! state ready to serve. Tests drive it through the bridge handle, the
//! mock's injection methods, or a real HTTP listener via `serve_http()`.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use courier_bridge::{BridgeEngine, BridgeHandle, BridgeHealth, EventHub, Poller, PollerConfig};
use courier_config::model::CourierConfig;
use courier_core::{CourierError, NativeStore};
use courier_gateway::{build_router, GatewayState};
use courier_store::queries::messages;
use courier_store::Database;

use crate::mock_native::{MockNativeStore, MockSendMode};

/// Builder for creating test environments with configurable options.
pub struct TestHarnessBuilder {
    config: CourierConfig,
    with_poller: bool,
    send_mode: Option<MockSendMode>,
}

impl TestHarnessBuilder {
    fn new() -> Self {
        let mut config = CourierConfig::default();
        // Tight timings keep poller-driven tests fast.
        config.bridge.poll_interval_secs = 0.02;
        config.bridge.error_backoff_secs = 0.05;
        Self {
            config,
            with_poller: false,
            send_mode: None,
        }
    }

    /// Run a live poller against the mock adapter.
    pub fn with_poller(mut self) -> Self {
        self.with_poller = true;
        self
    }

    /// Set the mock adapter's send behavior.
    pub fn with_send_mode(mut self, mode: MockSendMode) -> Self {
        self.send_mode = Some(mode);
        self
    }

    /// Cap each subscriber queue at `size` frames.
    pub fn with_subscriber_queue_size(mut self, size: usize) -> Self {
        self.config.bridge.subscriber_queue_size = size;
        self
    }

    /// Replay `n` stored messages to fresh WebSocket subscribers.
    pub fn with_replay_backlog(mut self, n: usize) -> Self {
        self.config.bridge.replay_backlog = n;
        self
    }

    /// Override the dedup window.
    pub fn with_dedup_window_secs(mut self, secs: f64) -> Self {
        self.config.bridge.dedup_window_secs = secs;
        self
    }

    /// Override the adapter send timeout.
    pub fn with_send_timeout_secs(mut self, secs: f64) -> Self {
        self.config.bridge.send_timeout_secs = secs;
        self
    }

    /// Build the test harness, creating all required subsystems.
    pub async fn build(self) -> Result<TestHarness, CourierError> {
        let temp_dir = tempfile::TempDir::new()
            .map_err(|e| CourierError::Internal(format!("temp dir: {e}")))?;
        let db_path = temp_dir.path().join("courier.db");
        let db = Database::open(&db_path.to_string_lossy(), true).await?;

        let hub = Arc::new(EventHub::new(self.config.bridge.subscriber_queue_size));
        let health = Arc::new(BridgeHealth::new());

        let adapter = Arc::new(MockNativeStore::new());
        if let Some(mode) = self.send_mode {
            adapter.set_send_mode(mode).await;
        }

        let engine = BridgeEngine::new(
            db.clone(),
            hub.clone(),
            health.clone(),
            adapter.name(),
            self.config.bridge.dedup_window_secs,
        )
        .await?;
        let bridge = engine.handle();
        let watermark = engine.watermark();

        let cancel = CancellationToken::new();
        tokio::spawn(engine.run(cancel.clone()));

        if self.with_poller {
            let poller = Poller::new(
                adapter.clone() as Arc<dyn NativeStore>,
                bridge.clone(),
                PollerConfig {
                    poll_interval_secs: self.config.bridge.poll_interval_secs,
                    fetch_timeout_secs: self.config.bridge.fetch_timeout_secs,
                    error_backoff_secs: self.config.bridge.error_backoff_secs,
                },
                watermark,
            );
            tokio::spawn(poller.run(cancel.clone()));
        }

        let state = GatewayState {
            db: db.clone(),
            hub: hub.clone(),
            bridge: bridge.clone(),
            adapter: adapter.clone() as Arc<dyn NativeStore>,
            health: health.clone(),
            cancel: cancel.clone(),
            start_time: std::time::Instant::now(),
            history_page_limit: self.config.server.history_page_limit,
            replay_backlog: self.config.bridge.replay_backlog,
            send_timeout_secs: self.config.bridge.send_timeout_secs,
        };

        Ok(TestHarness {
            adapter,
            db,
            hub,
            health,
            bridge,
            state,
            cancel,
            _temp_dir: temp_dir,
        })
    }
}

/// A complete test environment with a mock adapter and temp storage.
pub struct TestHarness {
    /// The mock messaging adapter.
    pub adapter: Arc<MockNativeStore>,
    /// Message store backed by a temp file, cleaned up on drop.
    pub db: Database,
    /// Fan-out hub.
    pub hub: Arc<EventHub>,
    /// Shared health flag.
    pub health: Arc<BridgeHealth>,
    /// Command channel into the running ingest engine.
    pub bridge: BridgeHandle,
    /// Gateway state, ready for handlers or a router.
    pub state: GatewayState,
    /// Cancels the engine, poller, and any HTTP listener.
    pub cancel: CancellationToken,
    /// Temp directory kept alive for cleanup on drop.
    _temp_dir: tempfile::TempDir,
}

impl TestHarness {
    /// Create a new builder for configuring the test harness.
    pub fn builder() -> TestHarnessBuilder {
        TestHarnessBuilder::new()
    }

    /// Serve the gateway on an OS-assigned port and return its address.
    ///
    /// The listener stops when the harness token is cancelled.
    pub async fn serve_http(&self) -> Result<std::net::SocketAddr, CourierError> {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .map_err(|e| CourierError::Internal(format!("failed to bind test listener: {e}")))?;
        let addr = listener
            .local_addr()
            .map_err(|e| CourierError::Internal(format!("listener address: {e}")))?;

        let app = build_router(self.state.clone());
        let cancel = self.cancel.clone();
        tokio::spawn(async move {
            let _ = axum::serve(listener, app)
                .with_graceful_shutdown(async move { cancel.cancelled().await })
                .await;
        });

        Ok(addr)
    }

    /// Block until the store holds at least `count` messages.
    ///
    /// Polls every 10ms and fails after two seconds; use with a running
    /// poller to wait for injected batches to land.
    pub async fn wait_for_message_count(&self, count: i64) -> Result<(), CourierError> {
        let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
        loop {
            if messages::message_count(&self.db).await? >= count {
                return Ok(());
            }
            if tokio::time::Instant::now() >= deadline {
                return Err(CourierError::Internal(format!(
                    "store never reached {count} messages"
                )));
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock_native::raw_message;

    #[tokio::test]
    async fn builder_creates_working_environment() {
        let harness = TestHarness::builder().build().await.unwrap();

        let outcome = harness
            .bridge
            .submit_batch(vec![raw_message("g1", "+1555", "hello", 100.0)])
            .await
            .unwrap();
        assert_eq!(outcome.stored, 1);
        assert_eq!(messages::message_count(&harness.db).await.unwrap(), 1);

        harness.cancel.cancel();
    }

    #[tokio::test]
    async fn poller_ingests_injected_batches() {
        let harness = TestHarness::builder().with_poller().build().await.unwrap();

        harness
            .adapter
            .inject_batch(vec![
                raw_message("g1", "+1555", "one", 100.0),
                raw_message("g2", "+1555", "two", 150.0),
            ])
            .await;
        harness
            .adapter
            .inject_batch(vec![raw_message("g3", "+1555", "three", 175.0)])
            .await;

        harness.wait_for_message_count(3).await.unwrap();

        let args = harness.adapter.fetch_args().await;
        assert_eq!(args[0], 0.0);

        harness.cancel.cancel();
    }

    #[tokio::test]
    async fn serve_http_answers_health() {
        let harness = TestHarness::builder().build().await.unwrap();
        let addr = harness.serve_http().await.unwrap();

        let response = reqwest::get(format!("http://{addr}/health"))
            .await
            .unwrap();
        assert_eq!(response.status(), 200);
        let json: serde_json::Value = response.json().await.unwrap();
        assert_eq!(json["status"], "ok");

        harness.cancel.cancel();
    }

    #[tokio::test]
    async fn harness_stores_are_independent() {
        let h1 = TestHarness::builder().build().await.unwrap();
        let h2 = TestHarness::builder().build().await.unwrap();

        h1.bridge
            .submit_batch(vec![raw_message("g1", "+1555", "only in h1", 100.0)])
            .await
            .unwrap();

        assert_eq!(messages::message_count(&h1.db).await.unwrap(), 1);
        assert_eq!(messages::message_count(&h2.db).await.unwrap(), 0);

        h1.cancel.cancel();
        h2.cancel.cancel();
    }
}

// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Periodic adapter polling, ack-gated against the ingest engine.
//!
//! The poller advances its fetch watermark only from [`PollOutcome`]s the
//! engine returns, so a watermark never moves past messages that are not
//! yet durable. Fetches use `>=` semantics at the frontier; the replayed
//! boundary messages come back as duplicates.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use courier_core::{CourierError, NativeStore};

use crate::engine::BridgeHandle;

/// Timing knobs for the poll loop.
#[derive(Debug, Clone, Copy)]
pub struct PollerConfig {
    pub poll_interval_secs: f64,
    pub fetch_timeout_secs: f64,
    pub error_backoff_secs: f64,
}

/// Poll loop: fetch from the adapter, hand off to the engine, repeat.
pub struct Poller {
    adapter: Arc<dyn NativeStore>,
    bridge: BridgeHandle,
    config: PollerConfig,
    watermark: f64,
}

impl Poller {
    /// `watermark` seeds the first fetch; pass the engine's loaded value.
    pub fn new(
        adapter: Arc<dyn NativeStore>,
        bridge: BridgeHandle,
        config: PollerConfig,
        watermark: f64,
    ) -> Self {
        Self {
            adapter,
            bridge,
            config,
            watermark,
        }
    }

    /// Poll until cancellation. Failed cycles back off before the next
    /// tick instead of tightening the loop against a broken adapter.
    pub async fn run(mut self, cancel: CancellationToken) {
        let mut ticker =
            tokio::time::interval(Duration::from_secs_f64(self.config.poll_interval_secs));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        info!(
            interval_secs = self.config.poll_interval_secs,
            watermark = self.watermark,
            adapter = self.adapter.name(),
            "poller started"
        );

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(e) = self.poll_once().await {
                        warn!(
                            error = %e,
                            backoff_secs = self.config.error_backoff_secs,
                            "poll cycle failed, backing off"
                        );
                        tokio::select! {
                            _ = tokio::time::sleep(
                                Duration::from_secs_f64(self.config.error_backoff_secs),
                            ) => {}
                            _ = cancel.cancelled() => break,
                        }
                    }
                }
                _ = cancel.cancelled() => {
                    info!("shutdown signal received, stopping poller");
                    break;
                }
            }
        }
    }

    /// One fetch-and-submit cycle.
    async fn poll_once(&mut self) -> Result<(), CourierError> {
        let timeout = Duration::from_secs_f64(self.config.fetch_timeout_secs);
        let raw = match tokio::time::timeout(timeout, self.adapter.fetch_since(self.watermark))
            .await
        {
            Ok(result) => result?,
            Err(_) => return Err(CourierError::AdapterTimeout { duration: timeout }),
        };

        if raw.is_empty() {
            return Ok(());
        }

        let fetched = raw.len();
        let outcome = self.bridge.submit_batch(raw).await?;
        if outcome.stored > 0 {
            debug!(
                fetched,
                stored = outcome.stored,
                duplicates = outcome.duplicates,
                watermark = outcome.watermark,
                "poll batch processed"
            );
        }
        self.watermark = outcome.watermark;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::BridgeEngine;
    use crate::hub::EventHub;
    use crate::BridgeHealth;
    use async_trait::async_trait;
    use courier_core::{HealthStatus, RawNativeMessage};
    use courier_store::queries::messages;
    use courier_store::Database;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use tempfile::tempdir;

    enum Fetch {
        Batch(Vec<RawNativeMessage>),
        Fail(CourierError),
        Hang,
    }

    struct ScriptedStore {
        script: Mutex<VecDeque<Fetch>>,
        fetch_args: Mutex<Vec<f64>>,
    }

    impl ScriptedStore {
        fn new(script: Vec<Fetch>) -> Arc<Self> {
            Arc::new(Self {
                script: Mutex::new(script.into()),
                fetch_args: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl NativeStore for ScriptedStore {
        fn name(&self) -> &str {
            "scripted"
        }

        fn version(&self) -> semver::Version {
            semver::Version::new(0, 0, 0)
        }

        async fn health_check(&self) -> Result<HealthStatus, CourierError> {
            Ok(HealthStatus::Healthy)
        }

        async fn fetch_since(&self, watermark: f64) -> Result<Vec<RawNativeMessage>, CourierError> {
            self.fetch_args.lock().unwrap().push(watermark);
            let step = self.script.lock().unwrap().pop_front();
            match step {
                Some(Fetch::Batch(batch)) => Ok(batch),
                Some(Fetch::Fail(e)) => Err(e),
                Some(Fetch::Hang) | None => std::future::pending().await,
            }
        }

        async fn send(
            &self,
            _recipient: &str,
            _body: &str,
            _attachments: &[String],
        ) -> Result<Option<String>, CourierError> {
            Ok(None)
        }

        async fn shutdown(&self) -> Result<(), CourierError> {
            Ok(())
        }
    }

    fn config() -> PollerConfig {
        PollerConfig {
            poll_interval_secs: 0.5,
            fetch_timeout_secs: 10.0,
            error_backoff_secs: 5.0,
        }
    }

    fn raw(native_id: &str, sent_at: f64) -> RawNativeMessage {
        RawNativeMessage {
            native_id: native_id.to_string(),
            sender: "+1555000".to_string(),
            body: format!("body {native_id}"),
            attachments: Vec::new(),
            sent_at,
            is_from_me: false,
            is_delivered: true,
            is_read: false,
        }
    }

    async fn spawn_engine() -> (BridgeHandle, Database, CancellationToken, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("test.db");
        let db = Database::open(db_path.to_str().unwrap(), true).await.unwrap();
        let hub = Arc::new(EventHub::new(16));
        let health = Arc::new(BridgeHealth::new());
        let engine = BridgeEngine::new(db.clone(), hub, health, "scripted", 300.0)
            .await
            .unwrap();
        let handle = engine.handle();
        let cancel = CancellationToken::new();
        tokio::spawn(engine.run(cancel.clone()));
        (handle, db, cancel, dir)
    }

    #[tokio::test]
    async fn poll_cycle_stores_batch_and_advances() {
        let (handle, db, cancel, _dir) = spawn_engine().await;
        let adapter = ScriptedStore::new(vec![
            Fetch::Batch(vec![raw("g1", 100.0), raw("g2", 150.0)]),
            Fetch::Batch(vec![raw("g2", 150.0), raw("g3", 175.0)]),
        ]);
        let mut poller = Poller::new(adapter.clone(), handle, config(), 0.0);

        poller.poll_once().await.unwrap();
        assert_eq!(poller.watermark, 150.0);
        poller.poll_once().await.unwrap();
        assert_eq!(poller.watermark, 175.0);

        assert_eq!(messages::message_count(&db).await.unwrap(), 3);
        assert_eq!(*adapter.fetch_args.lock().unwrap(), vec![0.0, 150.0]);

        cancel.cancel();
    }

    #[tokio::test]
    async fn empty_fetch_keeps_watermark() {
        let (handle, db, cancel, _dir) = spawn_engine().await;
        let adapter = ScriptedStore::new(vec![Fetch::Batch(Vec::new())]);
        let mut poller = Poller::new(adapter, handle, config(), 42.0);

        poller.poll_once().await.unwrap();
        assert_eq!(poller.watermark, 42.0);
        assert_eq!(messages::message_count(&db).await.unwrap(), 0);

        cancel.cancel();
    }

    #[tokio::test]
    async fn fetch_error_propagates_without_advancing() {
        let (handle, _db, cancel, _dir) = spawn_engine().await;
        let adapter = ScriptedStore::new(vec![Fetch::Fail(CourierError::AdapterUnavailable {
            message: "chat.db is locked".to_string(),
        })]);
        let mut poller = Poller::new(adapter, handle, config(), 42.0);

        let err = poller.poll_once().await.unwrap_err();
        assert!(err.is_transient());
        assert_eq!(poller.watermark, 42.0);

        cancel.cancel();
    }

    #[tokio::test(start_paused = true)]
    async fn hung_fetch_times_out() {
        let (handle, _db, cancel, _dir) = spawn_engine().await;
        let adapter = ScriptedStore::new(vec![Fetch::Hang]);
        let mut poller = Poller::new(adapter, handle, config(), 0.0);

        let err = poller.poll_once().await.unwrap_err();
        assert!(matches!(err, CourierError::AdapterTimeout { .. }));
        assert_eq!(poller.watermark, 0.0);

        cancel.cancel();
    }
}

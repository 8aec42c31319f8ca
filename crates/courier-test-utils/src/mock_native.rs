// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock native store for deterministic testing.
//!
//! `MockNativeStore` implements `NativeStore` with injectable fetch batches
//! and captured outbound sends for assertion in tests.

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use courier_core::{CourierError, HealthStatus, NativeStore, RawNativeMessage};

/// How the mock reacts to `send()` calls.
#[derive(Debug, Clone)]
pub enum MockSendMode {
    /// Accept; the adapter did not learn a native id.
    Accept,
    /// Accept and report this native id for every send.
    AcceptWithGuid(String),
    /// Fail with `SendRejected`.
    Reject(String),
    /// Fail with `AdapterUnavailable`.
    Unavailable(String),
}

/// One captured outbound send.
#[derive(Debug, Clone)]
pub struct SentRecord {
    pub recipient: String,
    pub body: String,
    pub attachments: Vec<String>,
}

/// A scripted messaging adapter for tests.
///
/// Provides two queues:
/// - **fetch**: Batches injected via `inject_batch()` are returned one per
///   `fetch_since()` call; an empty queue yields empty fetches.
/// - **sent**: Calls to `send()` are captured and retrievable via
///   `sent_messages()`.
pub struct MockNativeStore {
    fetch_queue: Arc<Mutex<VecDeque<Vec<RawNativeMessage>>>>,
    fetch_args: Arc<Mutex<Vec<f64>>>,
    fetch_failures: Arc<Mutex<u32>>,
    send_mode: Arc<Mutex<MockSendMode>>,
    sent: Arc<Mutex<Vec<SentRecord>>>,
    health: Arc<Mutex<HealthStatus>>,
}

impl MockNativeStore {
    /// Create a healthy mock with empty queues that accepts every send.
    pub fn new() -> Self {
        Self {
            fetch_queue: Arc::new(Mutex::new(VecDeque::new())),
            fetch_args: Arc::new(Mutex::new(Vec::new())),
            fetch_failures: Arc::new(Mutex::new(0)),
            send_mode: Arc::new(Mutex::new(MockSendMode::Accept)),
            sent: Arc::new(Mutex::new(Vec::new())),
            health: Arc::new(Mutex::new(HealthStatus::Healthy)),
        }
    }

    /// Queue a batch; the next `fetch_since()` call returns it.
    pub async fn inject_batch(&self, batch: Vec<RawNativeMessage>) {
        self.fetch_queue.lock().await.push_back(batch);
    }

    /// Make the next `n` fetches fail with `AdapterUnavailable`.
    pub async fn fail_next_fetches(&self, n: u32) {
        *self.fetch_failures.lock().await = n;
    }

    /// Change how `send()` behaves.
    pub async fn set_send_mode(&self, mode: MockSendMode) {
        *self.send_mode.lock().await = mode;
    }

    /// Change what `health_check()` reports.
    pub async fn set_health(&self, status: HealthStatus) {
        *self.health.lock().await = status;
    }

    /// Every send captured so far.
    pub async fn sent_messages(&self) -> Vec<SentRecord> {
        self.sent.lock().await.clone()
    }

    /// Count of captured sends.
    pub async fn sent_count(&self) -> usize {
        self.sent.lock().await.len()
    }

    /// Watermark arguments of every fetch so far.
    pub async fn fetch_args(&self) -> Vec<f64> {
        self.fetch_args.lock().await.clone()
    }
}

impl Default for MockNativeStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl NativeStore for MockNativeStore {
    fn name(&self) -> &str {
        "mock"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    async fn health_check(&self) -> Result<HealthStatus, CourierError> {
        Ok(self.health.lock().await.clone())
    }

    async fn fetch_since(&self, watermark: f64) -> Result<Vec<RawNativeMessage>, CourierError> {
        self.fetch_args.lock().await.push(watermark);

        let mut failures = self.fetch_failures.lock().await;
        if *failures > 0 {
            *failures -= 1;
            return Err(CourierError::AdapterUnavailable {
                message: "mock fetch failure".to_string(),
            });
        }
        drop(failures);

        Ok(self.fetch_queue.lock().await.pop_front().unwrap_or_default())
    }

    async fn send(
        &self,
        recipient: &str,
        body: &str,
        attachments: &[String],
    ) -> Result<Option<String>, CourierError> {
        let mode = self.send_mode.lock().await.clone();
        match mode {
            MockSendMode::Reject(message) => Err(CourierError::SendRejected { message }),
            MockSendMode::Unavailable(message) => {
                Err(CourierError::AdapterUnavailable { message })
            }
            MockSendMode::Accept | MockSendMode::AcceptWithGuid(_) => {
                self.sent.lock().await.push(SentRecord {
                    recipient: recipient.to_string(),
                    body: body.to_string(),
                    attachments: attachments.to_vec(),
                });
                match mode {
                    MockSendMode::AcceptWithGuid(guid) => Ok(Some(guid)),
                    _ => Ok(None),
                }
            }
        }
    }

    async fn shutdown(&self) -> Result<(), CourierError> {
        Ok(())
    }
}

/// Build a `RawNativeMessage` with sensible defaults for tests.
pub fn raw_message(native_id: &str, sender: &str, body: &str, sent_at: f64) -> RawNativeMessage {
    RawNativeMessage {
        native_id: native_id.to_string(),
        sender: sender.to_string(),
        body: body.to_string(),
        attachments: Vec::new(),
        sent_at,
        is_from_me: false,
        is_delivered: true,
        is_read: false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn fetch_returns_injected_batches_in_order() {
        let mock = MockNativeStore::new();
        mock.inject_batch(vec![raw_message("g1", "+1555", "first", 100.0)])
            .await;
        mock.inject_batch(vec![raw_message("g2", "+1555", "second", 200.0)])
            .await;

        let b1 = mock.fetch_since(0.0).await.unwrap();
        let b2 = mock.fetch_since(100.0).await.unwrap();
        let b3 = mock.fetch_since(200.0).await.unwrap();

        assert_eq!(b1[0].native_id, "g1");
        assert_eq!(b2[0].native_id, "g2");
        assert!(b3.is_empty());
        assert_eq!(mock.fetch_args().await, vec![0.0, 100.0, 200.0]);
    }

    #[tokio::test]
    async fn injected_failures_are_consumed() {
        let mock = MockNativeStore::new();
        mock.inject_batch(vec![raw_message("g1", "+1555", "after", 100.0)])
            .await;
        mock.fail_next_fetches(2).await;

        assert!(mock.fetch_since(0.0).await.is_err());
        assert!(mock.fetch_since(0.0).await.is_err());
        let batch = mock.fetch_since(0.0).await.unwrap();
        assert_eq!(batch[0].native_id, "g1");
    }

    #[tokio::test]
    async fn send_captures_and_reports_guid() {
        let mock = MockNativeStore::new();
        mock.set_send_mode(MockSendMode::AcceptWithGuid("GUID-9".to_string()))
            .await;

        let guid = mock
            .send("+1555", "hello", &["a.png".to_string()])
            .await
            .unwrap();
        assert_eq!(guid.as_deref(), Some("GUID-9"));

        let sent = mock.sent_messages().await;
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].recipient, "+1555");
        assert_eq!(sent[0].body, "hello");
        assert_eq!(sent[0].attachments, vec!["a.png"]);
    }

    #[tokio::test]
    async fn rejected_send_is_not_captured() {
        let mock = MockNativeStore::new();
        mock.set_send_mode(MockSendMode::Reject("nope".to_string()))
            .await;

        let err = mock.send("+1555", "hello", &[]).await.unwrap_err();
        assert!(matches!(err, CourierError::SendRejected { .. }));
        assert_eq!(mock.sent_count().await, 0);
    }

    #[tokio::test]
    async fn health_is_configurable() {
        let mock = MockNativeStore::new();
        assert_eq!(mock.health_check().await.unwrap(), HealthStatus::Healthy);

        mock.set_health(HealthStatus::Unhealthy("gone".to_string()))
            .await;
        assert!(matches!(
            mock.health_check().await.unwrap(),
            HealthStatus::Unhealthy(_)
        ));
    }
}

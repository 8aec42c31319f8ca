// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The native store trait: the seam between the bridge and a platform's
//! message database.

use async_trait::async_trait;

use crate::error::CourierError;
use crate::types::{HealthStatus, RawNativeMessage};

/// A read/send adapter over a platform-native message store.
///
/// The poller and the HTTP send path only ever see this trait, so the bridge
/// core can be exercised against a scripted store in tests. Implementations
/// must be usable behind `Arc<dyn NativeStore>`.
#[async_trait]
pub trait NativeStore: Send + Sync {
    /// Short adapter name, used as the prefix of stored message ids.
    fn name(&self) -> &str;

    /// Adapter version.
    fn version(&self) -> semver::Version;

    /// Probe whether the native store is currently reachable.
    ///
    /// Returns `Ok(HealthStatus::Unhealthy(..))` rather than `Err` for
    /// expected failure modes, so callers can report without unwrapping.
    async fn health_check(&self) -> Result<HealthStatus, CourierError>;

    /// Fetch every message with `sent_at >= watermark`, ascending by
    /// `sent_at`.
    ///
    /// The comparison is inclusive: messages sharing the watermark timestamp
    /// are returned again on the next poll, and the dedup layer drops them.
    async fn fetch_since(&self, watermark: f64) -> Result<Vec<RawNativeMessage>, CourierError>;

    /// Send a message through the native store.
    ///
    /// Returns the native identifier of the sent message when the adapter
    /// can learn it, `None` otherwise. `None` is not a failure.
    async fn send(
        &self,
        recipient: &str,
        body: &str,
        attachments: &[String],
    ) -> Result<Option<String>, CourierError>;

    /// Release any resources held by the adapter.
    async fn shutdown(&self) -> Result<(), CourierError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    struct NullStore;

    #[async_trait]
    impl NativeStore for NullStore {
        fn name(&self) -> &str {
            "null"
        }

        fn version(&self) -> semver::Version {
            semver::Version::new(0, 1, 0)
        }

        async fn health_check(&self) -> Result<HealthStatus, CourierError> {
            Ok(HealthStatus::Healthy)
        }

        async fn fetch_since(
            &self,
            _watermark: f64,
        ) -> Result<Vec<RawNativeMessage>, CourierError> {
            Ok(Vec::new())
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

    #[tokio::test]
    async fn trait_is_object_safe() {
        let store: Arc<dyn NativeStore> = Arc::new(NullStore);
        assert_eq!(store.name(), "null");
        assert_eq!(store.version(), semver::Version::new(0, 1, 0));
        assert_eq!(store.health_check().await.unwrap(), HealthStatus::Healthy);
        assert!(store.fetch_since(0.0).await.unwrap().is_empty());
        assert_eq!(store.send("x", "y", &[]).await.unwrap(), None);
        store.shutdown().await.unwrap();
    }
}

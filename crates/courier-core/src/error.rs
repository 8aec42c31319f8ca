// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error taxonomy for the Courier bridge.
//!
//! Every fallible operation in the workspace returns [`CourierError`]. The
//! variants are grouped by which subsystem can produce them so that callers
//! (the HTTP layer in particular) can map failures to responses without
//! string matching.

use thiserror::Error;

/// Top-level error type for all Courier operations.
#[derive(Debug, Error)]
pub enum CourierError {
    /// Configuration loading or validation failed.
    #[error("configuration error: {0}")]
    Config(String),

    /// A storage operation against the bridge database failed.
    #[error("storage error: {source}")]
    Storage {
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// The bridge database failed an integrity check.
    #[error("store corruption detected: {message}")]
    StoreCorruption { message: String },

    /// The native message store could not be reached or read.
    ///
    /// This is a transient condition: the poller backs off and retries,
    /// it never tears the bridge down.
    #[error("native store unavailable: {message}")]
    AdapterUnavailable { message: String },

    /// A native store operation exceeded its deadline.
    #[error("native store timed out after {duration:?}")]
    AdapterTimeout { duration: std::time::Duration },

    /// The native store actively refused an outbound send.
    #[error("send rejected: {message}")]
    SendRejected { message: String },

    /// An invariant was violated inside the bridge itself.
    #[error("internal error: {0}")]
    Internal(String),
}

impl CourierError {
    /// Wrap an arbitrary error as a storage failure.
    pub fn storage<E>(source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        CourierError::Storage {
            source: Box::new(source),
        }
    }

    /// Whether retrying the same operation later could succeed.
    ///
    /// Transient errors cause the poller to back off; everything else is
    /// reported and, for storage failures, reflected in `/health`.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            CourierError::AdapterUnavailable { .. } | CourierError::AdapterTimeout { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn error_display_includes_context() {
        let err = CourierError::Config("port must be non-zero".to_string());
        assert_eq!(err.to_string(), "configuration error: port must be non-zero");

        let err = CourierError::AdapterTimeout {
            duration: Duration::from_secs(10),
        };
        assert!(err.to_string().contains("10s"));

        let err = CourierError::SendRejected {
            message: "osascript exited with status 1".to_string(),
        };
        assert!(err.to_string().contains("osascript"));
    }

    #[test]
    fn storage_wraps_source() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err = CourierError::storage(io);
        assert!(err.to_string().starts_with("storage error:"));
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn transient_classification() {
        assert!(
            CourierError::AdapterUnavailable {
                message: "chat.db missing".to_string()
            }
            .is_transient()
        );
        assert!(
            CourierError::AdapterTimeout {
                duration: Duration::from_secs(1)
            }
            .is_transient()
        );
        assert!(!CourierError::Internal("oops".to_string()).is_transient());
        assert!(
            !CourierError::SendRejected {
                message: "refused".to_string()
            }
            .is_transient()
        );
    }
}

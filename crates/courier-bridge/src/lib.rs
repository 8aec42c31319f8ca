// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Bridge runtime: the poll loop, the single-writer ingest engine, the
//! subscriber fan-out hub, and shutdown plumbing.
//!
//! Ordering guarantee: every stored message is broadcast by the task that
//! stored it, in store order, before the next write happens. Subscribers
//! therefore see monotonically increasing sequence numbers.

pub mod dedup;
pub mod engine;
pub mod hub;
pub mod poller;
pub mod shutdown;

use std::sync::atomic::{AtomicBool, Ordering};

pub use dedup::DedupTracker;
pub use engine::{BridgeCommand, BridgeEngine, BridgeHandle, PollOutcome};
pub use hub::{EventFrame, EventHub};
pub use poller::{Poller, PollerConfig};
pub use shutdown::install_signal_handler;

/// Shared process-health state, flipped sticky on persistent store failure.
#[derive(Debug, Default)]
pub struct BridgeHealth {
    store_failed: AtomicBool,
}

impl BridgeHealth {
    pub fn new() -> Self {
        Self {
            store_failed: AtomicBool::new(false),
        }
    }

    /// Mark the message store as failed. The flag is sticky; the process
    /// reports unhealthy until restarted.
    pub fn mark_store_failure(&self) {
        self.store_failed.store(true, Ordering::SeqCst);
    }

    pub fn store_failed(&self) -> bool {
        self.store_failed.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn health_starts_clean_and_failure_sticks() {
        let health = BridgeHealth::new();
        assert!(!health.store_failed());
        health.mark_store_failure();
        assert!(health.store_failed());
        health.mark_store_failure();
        assert!(health.store_failed());
    }
}

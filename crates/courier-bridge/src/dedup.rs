// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-memory dedup window over recently seen message ids.
//!
//! The tracker is a fast path: the durable dedup check is the UNIQUE
//! constraint on `messages.id`. Because `fetch_since` is inclusive at the
//! watermark, every poll re-delivers the messages sharing the frontier
//! timestamp; this window absorbs those repeats without touching SQLite.

use std::collections::HashMap;

/// Recently seen message ids with their `sent_at` timestamps.
pub struct DedupTracker {
    window_secs: f64,
    seen: HashMap<String, f64>,
}

impl DedupTracker {
    /// Create an empty tracker keeping ids for `window_secs` behind the
    /// watermark frontier.
    pub fn new(window_secs: f64) -> Self {
        Self {
            window_secs,
            seen: HashMap::new(),
        }
    }

    /// Whether an id is inside the window.
    pub fn contains(&self, id: &str) -> bool {
        self.seen.contains_key(id)
    }

    /// Record an id. Re-registering overwrites the timestamp.
    pub fn register(&mut self, id: String, sent_at: f64) {
        self.seen.insert(id, sent_at);
    }

    /// Drop every id older than `frontier - window`.
    ///
    /// Called when the watermark advances. Ids strictly below the frontier
    /// can only re-surface through native store clock anomalies, which the
    /// trailing window tolerates.
    pub fn trim_to(&mut self, frontier: f64) {
        let cutoff = frontier - self.window_secs;
        self.seen.retain(|_, sent_at| *sent_at >= cutoff);
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}

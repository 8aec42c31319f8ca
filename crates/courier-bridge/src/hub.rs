// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Bounded fan-out of stored messages to WebSocket subscribers.
//!
//! Broadcasting never awaits: each subscriber has a bounded queue fed with
//! `try_send`, and a subscriber whose queue is full is dropped on the spot.
//! One stalled client therefore cannot delay the ingest loop or any other
//! subscriber. A dropped subscriber observes its receiver closing and is
//! responsible for telling the client why.

use std::sync::atomic::{AtomicU64, Ordering};

use courier_core::Message;
use dashmap::DashMap;
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// What flows through a subscriber queue.
#[derive(Debug, Clone)]
pub enum EventFrame {
    /// A stored message, in sequence order.
    Message(Message),
    /// The hub is shutting down; no more frames will follow.
    Shutdown { reason: String },
}

/// Fan-out hub for live message events.
pub struct EventHub {
    subscribers: DashMap<u64, mpsc::Sender<EventFrame>>,
    next_id: AtomicU64,
    queue_size: usize,
}

impl EventHub {
    /// Create a hub whose subscribers each buffer up to `queue_size` frames.
    pub fn new(queue_size: usize) -> Self {
        Self {
            subscribers: DashMap::new(),
            next_id: AtomicU64::new(1),
            queue_size,
        }
    }

    /// Register a new subscriber.
    ///
    /// Returns the subscriber id (needed for [`unsubscribe`](Self::unsubscribe))
    /// and the receiving end of its frame queue. The receiver yielding `None`
    /// without a preceding [`EventFrame::Shutdown`] means the hub dropped
    /// this subscriber as too slow.
    pub fn subscribe(&self) -> (u64, mpsc::Receiver<EventFrame>) {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::channel(self.queue_size);
        self.subscribers.insert(id, tx);
        debug!(subscriber = id, total = self.subscribers.len(), "subscriber added");
        (id, rx)
    }

    /// Remove a subscriber. Safe to call for ids the hub already dropped.
    pub fn unsubscribe(&self, id: u64) {
        if self.subscribers.remove(&id).is_some() {
            debug!(subscriber = id, total = self.subscribers.len(), "subscriber removed");
        }
    }

    /// Deliver a message to every subscriber without blocking.
    ///
    /// Subscribers with a full queue are removed; their receiver closes and
    /// the owning task sees `None`. Removal is deferred until after the
    /// iteration so the subscriber map is never mutated mid-walk.
    pub fn broadcast(&self, message: &Message) {
        let mut dropped: Vec<u64> = Vec::new();

        for entry in self.subscribers.iter() {
            match entry.value().try_send(EventFrame::Message(message.clone())) {
                Ok(()) => {}
                Err(mpsc::error::TrySendError::Full(_)) => {
                    warn!(subscriber = *entry.key(), "subscriber queue full, disconnecting");
                    dropped.push(*entry.key());
                }
                Err(mpsc::error::TrySendError::Closed(_)) => {
                    dropped.push(*entry.key());
                }
            }
        }

        for id in dropped {
            self.subscribers.remove(&id);
        }
    }

    /// Number of live subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    /// Queue a shutdown frame to every subscriber, then drop them all.
    ///
    /// Delivery is best effort (`try_send`); a subscriber with a full queue
    /// still observes the close because its sender is removed.
    pub fn close_all(&self, reason: &str) {
        for entry in self.subscribers.iter() {
            let _ = entry.value().try_send(EventFrame::Shutdown {
                reason: reason.to_string(),
            });
        }
        self.subscribers.clear();
        debug!(reason, "all subscribers closed");
    }
}

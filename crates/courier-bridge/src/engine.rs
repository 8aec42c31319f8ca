// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The ingest engine: single owner of store writes and event broadcast.
//!
//! All message persistence flows through one task processing
//! [`BridgeCommand`]s in arrival order. Poll batches and outbound sends are
//! therefore serialized, which is what makes broadcast order equal to store
//! sequence order and lets send reconciliation work without locking: a sent
//! message and its poll echo race through the same queue, and whichever
//! lands second hits the dedup check.

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use courier_core::{CourierError, Direction, Message, NewMessage, RawNativeMessage};
use courier_store::queries::{messages, watermark};
use courier_store::Database;

use crate::dedup::DedupTracker;
use crate::hub::EventHub;
use crate::BridgeHealth;

/// Commands processed by the ingest engine.
pub enum BridgeCommand {
    /// A batch of raw messages from one poll cycle.
    ///
    /// The reply is sent only after every message is durably handled and
    /// the watermark is persisted; the poller uses it as its ack.
    PollBatch {
        raw: Vec<RawNativeMessage>,
        reply: oneshot::Sender<Result<PollOutcome, CourierError>>,
    },
    /// An outbound message the adapter has already accepted for delivery.
    RecordOutbound {
        recipient: String,
        body: String,
        attachments: Vec<String>,
        /// Native id learned from the adapter, when available.
        native_id: Option<String>,
        reply: oneshot::Sender<Result<Message, CourierError>>,
    },
}

/// Result of processing one poll batch.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PollOutcome {
    /// Messages stored and broadcast.
    pub stored: usize,
    /// Messages skipped as already known.
    pub duplicates: usize,
    /// Watermark after the batch, persisted.
    pub watermark: f64,
}

/// Cloneable submission handle to the ingest engine.
#[derive(Clone)]
pub struct BridgeHandle {
    tx: mpsc::Sender<BridgeCommand>,
}

impl BridgeHandle {
    /// Submit a poll batch and wait for it to be fully processed.
    pub async fn submit_batch(
        &self,
        raw: Vec<RawNativeMessage>,
    ) -> Result<PollOutcome, CourierError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(BridgeCommand::PollBatch { raw, reply })
            .await
            .map_err(|_| CourierError::Internal("bridge engine is not running".to_string()))?;
        rx.await
            .map_err(|_| CourierError::Internal("bridge engine dropped the reply".to_string()))?
    }

    /// Record an outbound message that the adapter accepted.
    pub async fn record_outbound(
        &self,
        recipient: &str,
        body: &str,
        attachments: Vec<String>,
        native_id: Option<String>,
    ) -> Result<Message, CourierError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(BridgeCommand::RecordOutbound {
                recipient: recipient.to_string(),
                body: body.to_string(),
                attachments,
                native_id,
                reply,
            })
            .await
            .map_err(|_| CourierError::Internal("bridge engine is not running".to_string()))?;
        rx.await
            .map_err(|_| CourierError::Internal("bridge engine dropped the reply".to_string()))?
    }
}

/// Single-task ingest engine.
pub struct BridgeEngine {
    db: Database,
    hub: Arc<EventHub>,
    health: Arc<BridgeHealth>,
    dedup: DedupTracker,
    /// Adapter name, used as the prefix of native-derived message ids.
    source: String,
    watermark: f64,
    tx: mpsc::Sender<BridgeCommand>,
    rx: mpsc::Receiver<BridgeCommand>,
}

impl BridgeEngine {
    /// Build the engine: load the persisted watermark and rebuild the
    /// in-memory dedup window from stored messages near the frontier.
    pub async fn new(
        db: Database,
        hub: Arc<EventHub>,
        health: Arc<BridgeHealth>,
        source: &str,
        dedup_window_secs: f64,
    ) -> Result<Self, CourierError> {
        let persisted = watermark::load_watermark(&db).await?;

        let mut dedup = DedupTracker::new(dedup_window_secs);
        let cutoff = persisted - dedup_window_secs;
        for (id, sent_at) in messages::message_ids_since(&db, cutoff).await? {
            dedup.register(id, sent_at);
        }

        info!(
            watermark = persisted,
            dedup_entries = dedup.len(),
            source,
            "bridge engine initialized"
        );

        let (tx, rx) = mpsc::channel(64);
        Ok(Self {
            db,
            hub,
            health,
            dedup,
            source: source.to_string(),
            watermark: persisted,
            tx,
            rx,
        })
    }

    /// Submission handle for the poller and the HTTP layer.
    pub fn handle(&self) -> BridgeHandle {
        BridgeHandle {
            tx: self.tx.clone(),
        }
    }

    /// Watermark as of engine construction; the poller seeds from it.
    pub fn watermark(&self) -> f64 {
        self.watermark
    }

    /// Process commands until cancellation.
    pub async fn run(mut self, cancel: CancellationToken) {
        loop {
            tokio::select! {
                cmd = self.rx.recv() => {
                    match cmd {
                        Some(BridgeCommand::PollBatch { raw, reply }) => {
                            let result = self.process_batch(raw).await;
                            let _ = reply.send(result);
                        }
                        Some(BridgeCommand::RecordOutbound {
                            recipient,
                            body,
                            attachments,
                            native_id,
                            reply,
                        }) => {
                            let result = self
                                .record_outbound(recipient, body, attachments, native_id)
                                .await;
                            let _ = reply.send(result);
                        }
                        None => break,
                    }
                }
                _ = cancel.cancelled() => {
                    info!("shutdown signal received, stopping bridge engine");
                    break;
                }
            }
        }
    }

    /// Store new messages from a poll batch, broadcast them, then persist
    /// the advanced watermark.
    ///
    /// Per-message handling is independent, so splitting a batch across
    /// polls yields the same stored rows. The watermark write comes last:
    /// a crash anywhere earlier replays the batch and the dedup checks
    /// absorb it.
    async fn process_batch(
        &mut self,
        raw: Vec<RawNativeMessage>,
    ) -> Result<PollOutcome, CourierError> {
        let mut stored = 0usize;
        let mut duplicates = 0usize;
        let mut frontier = self.watermark;

        for raw_msg in raw {
            if raw_msg.sent_at > frontier {
                frontier = raw_msg.sent_at;
            }

            let id = format!("{}:{}", self.source, raw_msg.native_id);
            if self.dedup.contains(&id) {
                duplicates += 1;
                continue;
            }

            let direction = if raw_msg.is_from_me {
                Direction::Outgoing
            } else {
                Direction::Incoming
            };
            let new_msg = NewMessage {
                id: id.clone(),
                conversation_id: raw_msg.sender,
                direction,
                body: raw_msg.body,
                attachments: raw_msg.attachments,
                sent_at: raw_msg.sent_at,
                is_delivered: raw_msg.is_delivered,
                is_read: raw_msg.is_read,
            };

            match messages::record_message(&self.db, &new_msg).await {
                Ok(Some(message)) => {
                    self.dedup.register(id, message.sent_at);
                    self.hub.broadcast(&message);
                    stored += 1;
                }
                Ok(None) => {
                    self.dedup.register(id, raw_msg.sent_at);
                    duplicates += 1;
                }
                Err(e) => {
                    self.health.mark_store_failure();
                    error!(error = %e, "message insert failed, aborting batch");
                    return Err(e);
                }
            }
        }

        if frontier > self.watermark {
            if let Err(e) = watermark::store_watermark(&self.db, frontier).await {
                self.health.mark_store_failure();
                error!(error = %e, "watermark persist failed");
                return Err(e);
            }
            self.watermark = frontier;
            self.dedup.trim_to(frontier);
        }

        Ok(PollOutcome {
            stored,
            duplicates,
            watermark: self.watermark,
        })
    }

    /// Store an outbound message under its learned native id, or a local id
    /// when the adapter could not learn one.
    ///
    /// Registering the learned id here is what prevents the next poll from
    /// storing the message a second time; if the poll echo arrived first,
    /// the insert comes back as a duplicate and the stored row is returned.
    async fn record_outbound(
        &mut self,
        recipient: String,
        body: String,
        attachments: Vec<String>,
        native_id: Option<String>,
    ) -> Result<Message, CourierError> {
        let id = match &native_id {
            Some(nid) => format!("{}:{}", self.source, nid),
            None => format!("local:{}", uuid::Uuid::new_v4()),
        };
        let sent_at = chrono::Utc::now().timestamp_micros() as f64 / 1_000_000.0;

        let new_msg = NewMessage {
            id: id.clone(),
            conversation_id: recipient,
            direction: Direction::Outgoing,
            body,
            attachments,
            sent_at,
            is_delivered: true,
            is_read: true,
        };

        match messages::record_message(&self.db, &new_msg).await {
            Ok(Some(message)) => {
                self.dedup.register(id, sent_at);
                self.hub.broadcast(&message);
                info!(
                    id = %message.id,
                    conversation = %message.conversation_id,
                    seq = message.seq,
                    "outbound message recorded"
                );
                Ok(message)
            }
            Ok(None) => {
                self.dedup.register(id.clone(), sent_at);
                match messages::get_message(&self.db, &id).await? {
                    Some(message) => Ok(message),
                    None => Err(CourierError::Internal(format!(
                        "message {id} missing after duplicate insert"
                    ))),
                }
            }
            Err(e) => {
                self.health.mark_store_failure();
                Err(e)
            }
        }
    }
}

// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! WebSocket handler for live message streaming.
//!
//! Server -> Client (JSON):
//! ```json
//! {"type": "backlog", "message": {...}}
//! {"type": "live"}
//! {"type": "message", "message": {...}}
//! ```
//!
//! A fresh connection first receives the stored backlog, then the `live`
//! marker, then hub frames. Client text frames are ignored; the close frame
//! reason tells the client why a connection ended (`"slow consumer"` when
//! its queue overflowed, `"server shutting down"` on shutdown).

use axum::{
    extract::{
        ws::{close_code, CloseFrame, Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use futures::stream::SplitSink;
use futures::{SinkExt, StreamExt};
use tracing::{debug, warn};

use courier_bridge::EventFrame;
use courier_store::queries::messages;

use crate::server::GatewayState;

type WsSink = SplitSink<WebSocket, Message>;

/// WebSocket upgrade handler.
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<GatewayState>) -> Response {
    ws.on_upgrade(|socket| handle_socket(socket, state))
}

/// Sequence number separating replayed backlog from live delivery.
///
/// Hub frames at or below the boundary were already sent as backlog and
/// are filtered out of the live stream.
fn replay_boundary(backlog: &[courier_core::Message]) -> i64 {
    backlog.last().map(|m| m.seq).unwrap_or(0)
}

async fn send_event(
    sender: &mut WsSink,
    kind: &str,
    message: &courier_core::Message,
) -> Result<(), axum::Error> {
    let frame = serde_json::json!({"type": kind, "message": message}).to_string();
    sender.send(Message::Text(frame.into())).await
}

async fn send_close(sender: &mut WsSink, code: u16, reason: &str) {
    let _ = sender
        .send(Message::Close(Some(CloseFrame {
            code,
            reason: reason.into(),
        })))
        .await;
}

/// Handle an individual WebSocket connection.
///
/// Subscribes to the hub before reading the backlog, so a message stored
/// between the two steps is queued rather than lost; the boundary filter
/// keeps it from being delivered twice.
async fn handle_socket(socket: WebSocket, state: GatewayState) {
    let (subscriber_id, mut rx) = state.hub.subscribe();

    let backlog = if state.replay_backlog > 0 {
        match messages::recent_messages(&state.db, state.replay_backlog).await {
            Ok(list) => list,
            Err(e) => {
                warn!(error = %e, "backlog query failed, closing socket");
                state.hub.unsubscribe(subscriber_id);
                return;
            }
        }
    } else {
        Vec::new()
    };
    let boundary = replay_boundary(&backlog);

    let (mut ws_sender, mut ws_receiver) = socket.split();

    for message in &backlog {
        if send_event(&mut ws_sender, message_types::BACKLOG, message)
            .await
            .is_err()
        {
            state.hub.unsubscribe(subscriber_id);
            return;
        }
    }
    let live_marker = serde_json::json!({"type": message_types::LIVE}).to_string();
    if ws_sender.send(Message::Text(live_marker.into())).await.is_err() {
        state.hub.unsubscribe(subscriber_id);
        return;
    }

    debug!(
        subscriber = subscriber_id,
        backlog = backlog.len(),
        boundary,
        "websocket subscriber live"
    );

    loop {
        tokio::select! {
            frame = rx.recv() => match frame {
                Some(EventFrame::Message(message)) => {
                    if message.seq <= boundary {
                        continue;
                    }
                    if send_event(&mut ws_sender, message_types::MESSAGE, &message)
                        .await
                        .is_err()
                    {
                        break;
                    }
                }
                Some(EventFrame::Shutdown { reason }) => {
                    send_close(&mut ws_sender, close_code::AWAY, &reason).await;
                    break;
                }
                None => {
                    send_close(&mut ws_sender, close_code::POLICY, "slow consumer").await;
                    break;
                }
            },
            incoming = ws_receiver.next() => match incoming {
                Some(Ok(Message::Text(text))) => {
                    debug!(subscriber = subscriber_id, len = text.len(), "ignoring client text frame");
                }
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    debug!(subscriber = subscriber_id, error = %e, "websocket receive error");
                    break;
                }
            },
            _ = state.cancel.cancelled() => {
                send_close(&mut ws_sender, close_code::AWAY, "server shutting down").await;
                break;
            }
        }
    }

    state.hub.unsubscribe(subscriber_id);
    debug!(subscriber = subscriber_id, "websocket closed");
}

/// WebSocket frame type constants for server -> client messages.
pub mod message_types {
    /// Replayed stored message.
    pub const BACKLOG: &str = "backlog";
    /// Marker: backlog finished, live delivery begins.
    pub const LIVE: &str = "live";
    /// Live stored message.
    pub const MESSAGE: &str = "message";
}

#[cfg(test)]
mod tests {
    use super::*;
    use courier_core::Direction;

    fn make_msg(seq: i64) -> courier_core::Message {
        courier_core::Message {
            id: format!("imessage:g{seq}"),
            conversation_id: "+15550001111".to_string(),
            direction: Direction::Incoming,
            body: "hello".to_string(),
            attachments: Vec::new(),
            sent_at: 100.0 + seq as f64,
            is_delivered: true,
            is_read: false,
            seq,
            created_at: "2026-01-01T00:00:00.000Z".to_string(),
        }
    }

    #[test]
    fn message_type_constants() {
        assert_eq!(message_types::BACKLOG, "backlog");
        assert_eq!(message_types::LIVE, "live");
        assert_eq!(message_types::MESSAGE, "message");
    }

    #[test]
    fn event_frame_embeds_message() {
        let msg = make_msg(7);
        let frame = serde_json::json!({"type": message_types::MESSAGE, "message": &msg});
        assert_eq!(frame["type"], "message");
        assert_eq!(frame["message"]["seq"], 7);
        assert_eq!(frame["message"]["direction"], "incoming");
        assert_eq!(frame["message"]["id"], "imessage:g7");
    }

    #[test]
    fn boundary_is_zero_without_backlog() {
        assert_eq!(replay_boundary(&[]), 0);
    }

    #[test]
    fn boundary_tracks_last_replayed_seq() {
        let backlog = vec![make_msg(3), make_msg(4), make_msg(5)];
        assert_eq!(replay_boundary(&backlog), 5);
    }
}

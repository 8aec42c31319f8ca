// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Common types shared across the Courier workspace.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Direction of a message relative to the machine owner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum Direction {
    Incoming,
    Outgoing,
}

/// A message persisted in the bridge store.
///
/// `id` is the stable identity used for deduplication: `imessage:{guid}` for
/// messages observed in the native store, `local:{uuid}` for outbound sends
/// whose native identifier could not be learned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Stable message identity.
    pub id: String,
    /// The remote party's handle, regardless of direction.
    pub conversation_id: String,
    pub direction: Direction,
    pub body: String,
    /// Attachment file names, possibly empty.
    pub attachments: Vec<String>,
    /// When the message was sent, as Unix epoch seconds.
    pub sent_at: f64,
    pub is_delivered: bool,
    pub is_read: bool,
    /// Monotonic store sequence assigned on insert. Broadcast order follows
    /// this field exactly.
    pub seq: i64,
    /// ISO 8601 timestamp of the store insert.
    pub created_at: String,
}

/// A message to be persisted, before a sequence number is assigned.
#[derive(Debug, Clone, PartialEq)]
pub struct NewMessage {
    pub id: String,
    pub conversation_id: String,
    pub direction: Direction,
    pub body: String,
    pub attachments: Vec<String>,
    pub sent_at: f64,
    pub is_delivered: bool,
    pub is_read: bool,
}

/// One row of the conversation projection.
///
/// Maintained transactionally alongside message inserts, so it can never
/// reference a message the store does not hold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conversation {
    pub conversation_id: String,
    /// Contact display name, when the native store knows one.
    pub display_name: Option<String>,
    pub last_message: String,
    /// `sent_at` of the newest message in this conversation.
    pub last_timestamp: f64,
    pub unread_count: i64,
}

/// A message as observed in the native store, before normalization.
///
/// Adapters fill `sender` with the remote party's handle for both
/// directions; `is_from_me` carries the direction.
#[derive(Debug, Clone, PartialEq)]
pub struct RawNativeMessage {
    /// Native store identifier (the chat.db GUID for iMessage).
    pub native_id: String,
    pub sender: String,
    pub body: String,
    pub attachments: Vec<String>,
    /// Unix epoch seconds.
    pub sent_at: f64,
    pub is_from_me: bool,
    pub is_delivered: bool,
    pub is_read: bool,
}

/// Health status reported by an adapter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthStatus {
    /// Fully operational.
    Healthy,
    /// Operational with reduced functionality.
    Degraded(String),
    /// Not operational.
    Unhealthy(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn direction_serde_lowercase() {
        assert_eq!(
            serde_json::to_string(&Direction::Incoming).unwrap(),
            "\"incoming\""
        );
        assert_eq!(
            serde_json::from_str::<Direction>("\"outgoing\"").unwrap(),
            Direction::Outgoing
        );
    }

    #[test]
    fn direction_strum_round_trip() {
        assert_eq!(Direction::Incoming.to_string(), "incoming");
        assert_eq!(Direction::from_str("outgoing").unwrap(), Direction::Outgoing);
        assert_eq!(Direction::from_str("INCOMING").unwrap(), Direction::Incoming);
        assert!(Direction::from_str("sideways").is_err());
    }

    #[test]
    fn message_serializes_all_fields() {
        let msg = Message {
            id: "imessage:ABC-123".to_string(),
            conversation_id: "+15550001111".to_string(),
            direction: Direction::Incoming,
            body: "hello".to_string(),
            attachments: vec!["photo.heic".to_string()],
            sent_at: 1_700_000_000.5,
            is_delivered: true,
            is_read: false,
            seq: 42,
            created_at: "2026-01-01T00:00:00.000Z".to_string(),
        };
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["id"], "imessage:ABC-123");
        assert_eq!(json["direction"], "incoming");
        assert_eq!(json["seq"], 42);
        assert_eq!(json["attachments"][0], "photo.heic");
        assert_eq!(json["sent_at"], 1_700_000_000.5);
    }

    #[test]
    fn conversation_optional_display_name() {
        let conv = Conversation {
            conversation_id: "+15550001111".to_string(),
            display_name: None,
            last_message: "see you".to_string(),
            last_timestamp: 1_700_000_000.0,
            unread_count: 2,
        };
        let json = serde_json::to_value(&conv).unwrap();
        assert!(json["display_name"].is_null());
        assert_eq!(json["unread_count"], 2);
    }

    #[test]
    fn health_status_carries_reason() {
        let status = HealthStatus::Unhealthy("chat.db not found".to_string());
        match status {
            HealthStatus::Unhealthy(reason) => assert!(reason.contains("chat.db")),
            _ => panic!("expected Unhealthy"),
        }
    }
}

// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Message persistence and history queries.
//!
//! [`record_message`] is the only write path for messages. It inserts the
//! row and updates the conversation projection in one transaction, so a
//! crash can never leave the projection referencing a message the store
//! does not hold.

use std::str::FromStr;

use courier_core::{CourierError, Direction, Message, NewMessage};
use rusqlite::{params, OptionalExtension};
use tracing::debug;

use crate::database::Database;

const MESSAGE_COLUMNS: &str = "seq, id, conversation_id, direction, body, attachments, \
                               sent_at, is_delivered, is_read, created_at";

/// Build a [`Message`] from a row selected with [`MESSAGE_COLUMNS`].
pub(crate) fn message_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Message> {
    let direction_raw: String = row.get(3)?;
    let direction = Direction::from_str(&direction_raw).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(3, rusqlite::types::Type::Text, Box::new(e))
    })?;
    let attachments_raw: String = row.get(5)?;
    let attachments: Vec<String> = serde_json::from_str(&attachments_raw).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(5, rusqlite::types::Type::Text, Box::new(e))
    })?;
    Ok(Message {
        seq: row.get(0)?,
        id: row.get(1)?,
        conversation_id: row.get(2)?,
        direction,
        body: row.get(4)?,
        attachments,
        sent_at: row.get(6)?,
        is_delivered: row.get(7)?,
        is_read: row.get(8)?,
        created_at: row.get(9)?,
    })
}

/// Insert a message and update the conversation projection transactionally.
///
/// Returns the stored message with its assigned sequence number, or `None`
/// if a message with the same id already exists (the durable dedup check).
pub async fn record_message(
    db: &Database,
    msg: &NewMessage,
) -> Result<Option<Message>, CourierError> {
    let msg = msg.clone();
    let attachments_json = serde_json::to_string(&msg.attachments)
        .map_err(|e| CourierError::Internal(format!("attachment list not serializable: {e}")))?;
    let created_at = chrono::Utc::now()
        .format("%Y-%m-%dT%H:%M:%S%.3fZ")
        .to_string();

    let stored = db
        .connection()
        .call(move |conn| {
            let tx = conn.transaction()?;

            let inserted = tx.execute(
                "INSERT OR IGNORE INTO messages \
                 (id, conversation_id, direction, body, attachments, sent_at, \
                  is_delivered, is_read, created_at) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    msg.id,
                    msg.conversation_id,
                    msg.direction.to_string(),
                    msg.body,
                    attachments_json,
                    msg.sent_at,
                    msg.is_delivered,
                    msg.is_read,
                    created_at,
                ],
            )?;

            if inserted == 0 {
                tx.commit()?;
                return Ok(None);
            }

            let seq = tx.last_insert_rowid();
            let unread_bump = i64::from(msg.direction == Direction::Incoming && !msg.is_read);

            // The CASE guards against an older message arriving after a newer
            // one: the projection only ever moves forward in time.
            tx.execute(
                "INSERT INTO conversations \
                 (conversation_id, display_name, last_message, last_timestamp, unread_count) \
                 VALUES (?1, NULL, ?2, ?3, ?4) \
                 ON CONFLICT(conversation_id) DO UPDATE SET \
                     last_message = CASE \
                         WHEN excluded.last_timestamp >= conversations.last_timestamp \
                         THEN excluded.last_message \
                         ELSE conversations.last_message END, \
                     last_timestamp = MAX(conversations.last_timestamp, excluded.last_timestamp), \
                     unread_count = conversations.unread_count + excluded.unread_count",
                params![msg.conversation_id, msg.body, msg.sent_at, unread_bump],
            )?;

            tx.commit()?;

            Ok(Some(Message {
                id: msg.id,
                conversation_id: msg.conversation_id,
                direction: msg.direction,
                body: msg.body,
                attachments: msg.attachments,
                sent_at: msg.sent_at,
                is_delivered: msg.is_delivered,
                is_read: msg.is_read,
                seq,
                created_at,
            }))
        })
        .await
        .map_err(crate::database::map_tr_err)?;

    if let Some(stored) = &stored {
        debug!(
            id = %stored.id,
            seq = stored.seq,
            conversation = %stored.conversation_id,
            direction = %stored.direction,
            "message recorded"
        );
    }

    Ok(stored)
}

/// Fetch a single message by its stable id.
pub async fn get_message(db: &Database, id: &str) -> Result<Option<Message>, CourierError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| {
            let msg = conn
                .query_row(
                    &format!("SELECT {MESSAGE_COLUMNS} FROM messages WHERE id = ?1"),
                    params![id],
                    message_from_row,
                )
                .optional()?;
            Ok(msg)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// The most recent `limit` messages across all conversations, ascending by
/// sequence. Used to build the WebSocket replay backlog.
pub async fn recent_messages(db: &Database, limit: usize) -> Result<Vec<Message>, CourierError> {
    let limit = limit as i64;
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {MESSAGE_COLUMNS} FROM \
                 (SELECT {MESSAGE_COLUMNS} FROM messages ORDER BY seq DESC LIMIT ?1) \
                 ORDER BY seq ASC"
            ))?;
            let rows = stmt.query_map(params![limit], message_from_row)?;
            let mut messages = Vec::new();
            for row in rows {
                messages.push(row?);
            }
            Ok(messages)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// The most recent `limit` messages of one conversation, ascending by
/// sequence.
pub async fn messages_for_conversation(
    db: &Database,
    conversation_id: &str,
    limit: usize,
) -> Result<Vec<Message>, CourierError> {
    let conversation_id = conversation_id.to_string();
    let limit = limit as i64;
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {MESSAGE_COLUMNS} FROM \
                 (SELECT {MESSAGE_COLUMNS} FROM messages \
                  WHERE conversation_id = ?1 ORDER BY seq DESC LIMIT ?2) \
                 ORDER BY seq ASC"
            ))?;
            let rows = stmt.query_map(params![conversation_id, limit], message_from_row)?;
            let mut messages = Vec::new();
            for row in rows {
                messages.push(row?);
            }
            Ok(messages)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Total number of stored messages.
pub async fn message_count(db: &Database) -> Result<i64, CourierError> {
    db.connection()
        .call(|conn| {
            let count: i64 =
                conn.query_row("SELECT COUNT(*) FROM messages", [], |row| row.get(0))?;
            Ok(count)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Ids and timestamps of messages with `sent_at >= cutoff`.
///
/// Used to rebuild the in-memory dedup window after a restart.
pub async fn message_ids_since(
    db: &Database,
    cutoff: f64,
) -> Result<Vec<(String, f64)>, CourierError> {
    db.connection()
        .call(move |conn| {
            let mut stmt =
                conn.prepare("SELECT id, sent_at FROM messages WHERE sent_at >= ?1")?;
            let rows = stmt.query_map(params![cutoff], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, f64>(1)?))
            })?;
            let mut ids = Vec::new();
            for row in rows {
                ids.push(row?);
            }
            Ok(ids)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Conversation projection queries.
//!
//! The projection is written by `record_message`; this module only reads it.

use courier_core::{Conversation, CourierError};
use rusqlite::{params, OptionalExtension};

use crate::database::Database;

fn conversation_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Conversation> {
    Ok(Conversation {
        conversation_id: row.get(0)?,
        display_name: row.get(1)?,
        last_message: row.get(2)?,
        last_timestamp: row.get(3)?,
        unread_count: row.get(4)?,
    })
}

/// All conversations, newest activity first.
pub async fn list_conversations(db: &Database) -> Result<Vec<Conversation>, CourierError> {
    db.connection()
        .call(|conn| {
            let mut stmt = conn.prepare(
                "SELECT conversation_id, display_name, last_message, last_timestamp, unread_count \
                 FROM conversations ORDER BY last_timestamp DESC",
            )?;
            let rows = stmt.query_map([], conversation_from_row)?;
            let mut conversations = Vec::new();
            for row in rows {
                conversations.push(row?);
            }
            Ok(conversations)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Fetch one conversation row, if the handle is known.
pub async fn get_conversation(
    db: &Database,
    conversation_id: &str,
) -> Result<Option<Conversation>, CourierError> {
    let conversation_id = conversation_id.to_string();
    db.connection()
        .call(move |conn| {
            let conv = conn
                .query_row(
                    "SELECT conversation_id, display_name, last_message, last_timestamp, unread_count \
                     FROM conversations WHERE conversation_id = ?1",
                    params![conversation_id],
                    conversation_from_row,
                )
                .optional()?;
            Ok(conv)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Total number of conversation rows.
pub async fn conversation_count(db: &Database) -> Result<i64, CourierError> {
    db.connection()
        .call(|conn| {
            let count: i64 =
                conn.query_row("SELECT COUNT(*) FROM conversations", [], |row| row.get(0))?;
            Ok(count)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

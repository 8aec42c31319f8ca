// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Read-only queries against the macOS Messages database (`chat.db`).
//!
//! `chat.db` stores timestamps as nanoseconds since 2001-01-01; every query
//! converts to Unix-epoch seconds at the SQL layer so the rest of the
//! service never sees Apple time. Tapbacks and system items carry no text
//! and are filtered out at the source.

use rusqlite::{Connection, OpenFlags, OptionalExtension};

use courier_core::RawNativeMessage;

/// Seconds between the Unix epoch and the Apple epoch (2001-01-01 UTC).
pub(crate) const APPLE_EPOCH_OFFSET: f64 = 978_307_200.0;

/// Open `chat.db` without taking any locks Messages.app would notice.
pub(crate) fn open_read_only(path: &str) -> Result<Connection, rusqlite::Error> {
    Connection::open_with_flags(
        path,
        OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
    )
}

/// Fetch messages with `sent_at >= watermark`, oldest first.
///
/// The comparison is inclusive so a crash between storing a message and
/// persisting the watermark cannot skip its timestamp ties; the bridge
/// deduplicates the replayed rows. The conversation key is the chat
/// identifier when the message belongs to a chat (covers group chats) and
/// the raw handle otherwise.
pub(crate) fn read_since(
    conn: &Connection,
    watermark: f64,
) -> Result<Vec<RawNativeMessage>, rusqlite::Error> {
    let mut stmt = conn.prepare(
        "SELECT
            m.ROWID,
            m.guid,
            COALESCE(c.chat_identifier, h.id, '') AS sender,
            COALESCE(m.text, '') AS body,
            m.date / 1000000000.0 + 978307200.0 AS sent_at,
            m.is_from_me,
            m.is_delivered,
            m.is_read,
            m.cache_has_attachments
         FROM message m
         LEFT JOIN handle h ON h.ROWID = m.handle_id
         LEFT JOIN chat c ON c.ROWID = (
             SELECT cmj.chat_id FROM chat_message_join cmj
             WHERE cmj.message_id = m.ROWID LIMIT 1
         )
         WHERE m.date / 1000000000.0 + 978307200.0 >= ?1
           AND m.item_type = 0
           AND m.associated_message_type = 0
           AND (m.text IS NOT NULL AND m.text != '' OR m.cache_has_attachments = 1)
           AND COALESCE(c.chat_identifier, h.id, '') != ''
         ORDER BY m.date ASC",
    )?;

    let rows = stmt.query_map([watermark], |row| {
        Ok((
            row.get::<_, i64>(0)?,
            RawNativeMessage {
                native_id: row.get(1)?,
                sender: row.get(2)?,
                body: row.get(3)?,
                attachments: Vec::new(),
                sent_at: row.get(4)?,
                is_from_me: row.get::<_, i64>(5)? != 0,
                is_delivered: row.get::<_, i64>(6)? != 0,
                is_read: row.get::<_, i64>(7)? != 0,
            },
            row.get::<_, i64>(8)? != 0,
        ))
    })?;

    let mut messages = Vec::new();
    for row in rows {
        let (rowid, mut message, has_attachments) = row?;
        if has_attachments {
            message.attachments = attachment_names(conn, rowid)?;
        }
        messages.push(message);
    }
    Ok(messages)
}

fn attachment_names(conn: &Connection, message_rowid: i64) -> Result<Vec<String>, rusqlite::Error> {
    let mut stmt = conn.prepare(
        "SELECT COALESCE(a.transfer_name, a.filename, '')
         FROM message_attachment_join maj
         JOIN attachment a ON a.ROWID = maj.attachment_id
         WHERE maj.message_id = ?1",
    )?;
    let names = stmt
        .query_map([message_rowid], |row| row.get::<_, String>(0))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(names.into_iter().filter(|n| !n.is_empty()).collect())
}

/// Find the guid of the newest outgoing message matching body and
/// conversation. Messages.app writes the row shortly after AppleScript
/// returns, so a miss here is normal; the poll loop picks the message up
/// as an ordinary outgoing echo.
pub(crate) fn find_sent_guid(
    conn: &Connection,
    recipient: &str,
    body: &str,
) -> Result<Option<String>, rusqlite::Error> {
    conn.query_row(
        "SELECT m.guid
         FROM message m
         LEFT JOIN handle h ON h.ROWID = m.handle_id
         LEFT JOIN chat c ON c.ROWID = (
             SELECT cmj.chat_id FROM chat_message_join cmj
             WHERE cmj.message_id = m.ROWID LIMIT 1
         )
         WHERE m.is_from_me = 1
           AND m.text = ?1
           AND COALESCE(c.chat_identifier, h.id, '') = ?2
         ORDER BY m.date DESC
         LIMIT 1",
        rusqlite::params![body, recipient],
        |row| row.get(0),
    )
    .optional()
}

/// Cheap liveness probe: the `message` table must exist and be readable.
pub(crate) fn probe(conn: &Connection) -> Result<bool, rusqlite::Error> {
    let found: Option<String> = conn
        .query_row(
            "SELECT name FROM sqlite_master WHERE type = 'table' AND name = 'message'",
            [],
            |row| row.get(0),
        )
        .optional()?;
    Ok(found.is_some())
}

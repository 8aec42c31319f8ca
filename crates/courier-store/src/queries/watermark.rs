// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Poll watermark persistence.
//!
//! The watermark is the `sent_at` frontier of fully processed poll batches.
//! It is written only after every message of a batch has been durably
//! stored, so a crash between fetch and persist replays the batch and the
//! dedup layer absorbs the repeats.

use courier_core::CourierError;
use rusqlite::params;

use crate::database::Database;

/// Read the persisted watermark. The migration seeds the row, so a fresh
/// store reports 0.
pub async fn load_watermark(db: &Database) -> Result<f64, CourierError> {
    db.connection()
        .call(|conn| {
            let watermark: f64 = conn.query_row(
                "SELECT watermark FROM bridge_state WHERE id = 1",
                [],
                |row| row.get(0),
            )?;
            Ok(watermark)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Persist a new watermark value.
pub async fn store_watermark(db: &Database, watermark: f64) -> Result<(), CourierError> {
    db.connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE bridge_state SET watermark = ?1 WHERE id = 1",
                params![watermark],
            )?;
            Ok(())
        })
        .await
        .map_err(crate::database::map_tr_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn fresh_store_has_zero_watermark() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("test.db");
        let db = Database::open(db_path.to_str().unwrap(), true).await.unwrap();

        assert_eq!(load_watermark(&db).await.unwrap(), 0.0);

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn watermark_survives_reopen() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("test.db");
        let path = db_path.to_str().unwrap();

        let db = Database::open(path, true).await.unwrap();
        store_watermark(&db, 1_700_000_123.5).await.unwrap();
        db.close().await.unwrap();

        let db = Database::open(path, true).await.unwrap();
        assert_eq!(load_watermark(&db).await.unwrap(), 1_700_000_123.5);
        db.close().await.unwrap();
    }
}

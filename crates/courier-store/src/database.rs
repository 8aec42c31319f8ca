// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Database handle for the bridge store.
//!
//! Wraps a single tokio-rusqlite connection. All query modules go through
//! [`Database::connection`], so every statement executes on the one
//! background thread the connection owns.

use courier_core::CourierError;
use tracing::info;

use crate::migrations;

/// Convert a tokio-rusqlite error into CourierError::Storage.
pub(crate) fn map_tr_err(e: tokio_rusqlite::Error<rusqlite::Error>) -> CourierError {
    CourierError::Storage {
        source: Box::new(e),
    }
}

/// Handle to the bridge store.
///
/// Cheap to clone; clones share the underlying connection.
#[derive(Clone)]
pub struct Database {
    conn: tokio_rusqlite::Connection,
}

impl Database {
    /// Open (or create) the store at `path` and bring the schema up to date.
    ///
    /// Parent directories are created if missing. Migrations run on a
    /// blocking connection before the async handle is opened.
    pub async fn open(path: &str, wal_mode: bool) -> Result<Self, CourierError> {
        if let Some(parent) = std::path::Path::new(path).parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(CourierError::storage)?;
            }
        }

        let migrate_path = path.to_string();
        tokio::task::spawn_blocking(move || -> Result<(), CourierError> {
            let mut conn =
                rusqlite::Connection::open(&migrate_path).map_err(CourierError::storage)?;
            if wal_mode {
                conn.pragma_update(None, "journal_mode", "WAL")
                    .map_err(CourierError::storage)?;
            }
            migrations::run_migrations(&mut conn)?;
            Ok(())
        })
        .await
        .map_err(|e| CourierError::Internal(format!("migration task panicked: {e}")))??;

        let conn = tokio_rusqlite::Connection::open(path)
            .await
            .map_err(|e| map_tr_err(e.into()))?;

        info!(path = %path, wal_mode, "bridge store opened");
        Ok(Self { conn })
    }

    /// Access the underlying tokio-rusqlite connection.
    pub fn connection(&self) -> &tokio_rusqlite::Connection {
        &self.conn
    }

    /// Run `PRAGMA integrity_check` and return the reported lines.
    ///
    /// A healthy database reports a single `"ok"` line.
    pub async fn integrity_check(&self) -> Result<Vec<String>, CourierError> {
        self.conn
            .call(|conn| {
                let mut stmt = conn.prepare("PRAGMA integrity_check")?;
                let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
                let mut lines = Vec::new();
                for row in rows {
                    lines.push(row?);
                }
                Ok(lines)
            })
            .await
            .map_err(map_tr_err)
    }

    /// Close the connection, flushing any pending work.
    pub async fn close(self) -> Result<(), CourierError> {
        self.conn.close().await.map_err(map_tr_err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn open_creates_parent_dirs_and_schema() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("nested").join("store").join("test.db");
        let db = Database::open(db_path.to_str().unwrap(), true).await.unwrap();

        // Migration seeds the watermark row.
        let watermark: f64 = db
            .connection()
            .call(|conn| {
                let w = conn.query_row(
                    "SELECT watermark FROM bridge_state WHERE id = 1",
                    [],
                    |row| row.get(0),
                )?;
                Ok(w)
            })
            .await
            .unwrap();
        assert_eq!(watermark, 0.0);

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn open_is_idempotent() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("test.db");
        let path = db_path.to_str().unwrap();

        let db = Database::open(path, false).await.unwrap();
        db.close().await.unwrap();

        // Reopening must not re-run applied migrations.
        let db = Database::open(path, false).await.unwrap();
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn integrity_check_reports_ok() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("test.db");
        let db = Database::open(db_path.to_str().unwrap(), true).await.unwrap();

        let lines = db.integrity_check().await.unwrap();
        assert_eq!(lines, vec!["ok".to_string()]);

        db.close().await.unwrap();
    }
}

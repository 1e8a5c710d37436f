// SPDX-FileCopyrightText: 2026 Costwise Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Database connection with PRAGMA setup and migrations.
//!
//! All statements are serialized through tokio-rusqlite's single background
//! thread. Clones share that thread; do not open a second connection to the
//! same file for writes.

use costwise_config::model::StorageConfig;
use costwise_core::CostwiseError;
use tracing::debug;

use crate::migrations::run_migrations;

/// Convert a tokio-rusqlite error into `CostwiseError::Storage`.
pub(crate) fn map_tr_err(e: tokio_rusqlite::Error<rusqlite::Error>) -> CostwiseError {
    CostwiseError::Storage {
        source: Box::new(e),
    }
}

fn map_open_err(e: rusqlite::Error) -> CostwiseError {
    CostwiseError::Storage {
        source: Box::new(e),
    }
}

/// Handle to the counter database.
#[derive(Clone)]
pub struct Database {
    conn: tokio_rusqlite::Connection,
}

impl Database {
    /// Open (or create) the database file at `path` in WAL mode.
    pub async fn open(path: &str) -> Result<Self, CostwiseError> {
        Self::open_with(path, true).await
    }

    /// Open the database described by the storage section of the config.
    pub async fn from_config(config: &StorageConfig) -> Result<Self, CostwiseError> {
        Self::open_with(&config.database_path, config.wal_mode).await
    }

    /// A private in-memory database, gone when the last clone drops.
    pub async fn open_in_memory() -> Result<Self, CostwiseError> {
        let conn = tokio_rusqlite::Connection::open_in_memory()
            .await
            .map_err(map_open_err)?;
        Self::initialize(conn, false).await
    }

    async fn open_with(path: &str, wal_mode: bool) -> Result<Self, CostwiseError> {
        let conn = tokio_rusqlite::Connection::open(path)
            .await
            .map_err(map_open_err)?;
        debug!(path, wal_mode, "counter database opened");
        Self::initialize(conn, wal_mode).await
    }

    async fn initialize(
        conn: tokio_rusqlite::Connection,
        wal_mode: bool,
    ) -> Result<Self, CostwiseError> {
        conn.call(move |conn| -> Result<(), CostwiseError> {
            let journal = if wal_mode { "WAL" } else { "DELETE" };
            conn.execute_batch(&format!(
                "PRAGMA journal_mode = {journal};
                 PRAGMA synchronous = NORMAL;
                 PRAGMA busy_timeout = 5000;"
            ))
            .map_err(|e| CostwiseError::Storage {
                source: Box::new(e),
            })?;
            run_migrations(conn)
        })
        .await
        .map_err(|e| match e {
            tokio_rusqlite::Error::Error(inner) => inner,
            other => CostwiseError::Storage {
                source: other.to_string().into(),
            },
        })?;

        Ok(Self { conn })
    }

    pub fn connection(&self) -> &tokio_rusqlite::Connection {
        &self.conn
    }

    /// Checkpoint the WAL and close the connection.
    pub async fn close(self) -> Result<(), CostwiseError> {
        self.conn
            .call(|conn| -> Result<(), rusqlite::Error> {
                conn.execute_batch("PRAGMA wal_checkpoint(TRUNCATE);")
            })
            .await
            .map_err(map_tr_err)?;
        self.conn.close().await.map_err(map_tr_err)
    }
}

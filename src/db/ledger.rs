// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Identity ledger: which Garmin activities already exist as FitTrackee workouts.
//!
//! A single SQLite table of `(fittrackee_id, garmin_id)` pairs, each column
//! unique. Entries are only written after a confirmed upload and are only
//! removed by an explicit reset.

use crate::error::{Result, SyncError};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;

/// Database file name inside the ledger directory.
pub const LEDGER_FILE: &str = "db.sqlite3";

const SCHEMA: &str = "CREATE TABLE IF NOT EXISTS activities_ids (
    fittrackee_id VARCHAR(255) UNIQUE,
    garmin_id INTEGER(100) UNIQUE
)";

/// Durable Garmin ↔ FitTrackee identity store.
pub struct Ledger {
    conn: Connection,
}

impl Ledger {
    /// Open (creating if needed) the ledger stored in `dir`.
    pub fn open(dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(dir)?;
        let conn = Connection::open(dir.join(LEDGER_FILE))?;
        Self::initialize(conn)
    }

    /// Open an in-memory ledger (for testing).
    pub fn open_in_memory() -> Result<Self> {
        Self::initialize(Connection::open_in_memory()?)
    }

    fn initialize(conn: Connection) -> Result<Self> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self { conn })
    }

    /// Whether a Garmin activity has already been recorded.
    pub fn exists(&self, garmin_id: u64) -> Result<bool> {
        let found: Option<i64> = self
            .conn
            .query_row(
                "SELECT 1 FROM activities_ids WHERE garmin_id = ?1",
                params![to_sql_id(garmin_id)?],
                |row| row.get(0),
            )
            .optional()?;
        Ok(found.is_some())
    }

    /// Record a successful upload.
    ///
    /// Fails with `ConstraintViolation` if either id is already present.
    pub fn record(&self, fittrackee_id: &str, garmin_id: u64) -> Result<()> {
        self.conn.execute(
            "INSERT INTO activities_ids (fittrackee_id, garmin_id) VALUES (?1, ?2)",
            params![fittrackee_id, to_sql_id(garmin_id)?],
        )?;
        tracing::debug!(fittrackee_id, garmin_id, "Recorded ledger entry");
        Ok(())
    }

    /// FitTrackee workout recorded for a Garmin activity.
    pub fn fittrackee_id_for(&self, garmin_id: u64) -> Result<Option<String>> {
        Ok(self
            .conn
            .query_row(
                "SELECT fittrackee_id FROM activities_ids WHERE garmin_id = ?1",
                params![to_sql_id(garmin_id)?],
                |row| row.get(0),
            )
            .optional()?)
    }

    /// Number of recorded pairs.
    pub fn count(&self) -> Result<usize> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM activities_ids", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    /// Delete every entry. Returns how many were removed.
    pub fn reset(&self) -> Result<usize> {
        let removed = self.conn.execute("DELETE FROM activities_ids", [])?;
        tracing::warn!(removed, "Ledger reset");
        Ok(removed)
    }
}

fn to_sql_id(garmin_id: u64) -> Result<i64> {
    i64::try_from(garmin_id)
        .map_err(|_| SyncError::InvalidInput(format!("Garmin id {} out of range", garmin_id)))
}

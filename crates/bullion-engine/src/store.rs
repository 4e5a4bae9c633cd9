// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Event store: append-only SQLite log of every classified reading, plus the
// per-bar freshness table backing the replay check.
//
// Schema:
//   vault_events(
//     seq              INTEGER PRIMARY KEY AUTOINCREMENT,
//     event_id         TEXT    NOT NULL UNIQUE,  -- UUID v4
//     created_at       TEXT    NOT NULL,         -- RFC 3339, server clock
//     vault_id, bar_id, timestamp  TEXT NOT NULL -- routing metadata
//     rfid_uid, tamper_status, vault_door_status  TEXT  -- NULL if unreadable
//     purity, gps_lat, gps_lon                    REAL
//     status           TEXT    NOT NULL,         -- rendered vocabulary label
//     severity         TEXT    NOT NULL,         -- JSON-encoded Severity
//     reasons          TEXT    NOT NULL,         -- JSON array
//     hash_ok … freshness_ok  INTEGER            -- NULL = not evaluated
//   )
//   unit_freshness(bar_id TEXT PRIMARY KEY, last_timestamp TEXT,
//                  last_secs INTEGER, last_nanos INTEGER)  -- full chrono precision

use std::path::Path;
use std::sync::{Mutex, PoisonError};

use bullion_core::error::{BullionError, Result};
use bullion_core::types::{CheckFlags, EventId, Reading, SecurePacket, Severity, StatusVocabulary, Verdict};
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{Connection, OptionalExtension, Row, params};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};
use uuid::Uuid;

use crate::ledger::FreshnessLedger;

/// SQLite schema for both tables.
const CREATE_TABLES_SQL: &str = r#"
    CREATE TABLE IF NOT EXISTS vault_events (
        seq               INTEGER PRIMARY KEY AUTOINCREMENT,
        event_id          TEXT    NOT NULL UNIQUE,
        created_at        TEXT    NOT NULL,
        vault_id          TEXT    NOT NULL,
        bar_id            TEXT    NOT NULL,
        timestamp         TEXT    NOT NULL,
        rfid_uid          TEXT,
        purity            REAL,
        gps_lat           REAL,
        gps_lon           REAL,
        tamper_status     TEXT,
        vault_door_status TEXT,
        status            TEXT    NOT NULL,
        severity          TEXT    NOT NULL,
        reasons           TEXT    NOT NULL,
        hash_ok           INTEGER,
        signature_ok      INTEGER,
        timestamp_ok      INTEGER,
        tamper_ok         INTEGER,
        identity_ok       INTEGER,
        purity_ok         INTEGER,
        door_ok           INTEGER,
        location_ok       INTEGER,
        freshness_ok      INTEGER
    );
    CREATE INDEX IF NOT EXISTS idx_vault_events_bar ON vault_events (bar_id);
    CREATE TABLE IF NOT EXISTS unit_freshness (
        bar_id         TEXT    PRIMARY KEY,
        last_timestamp TEXT    NOT NULL,
        last_secs      INTEGER NOT NULL,
        last_nanos     INTEGER NOT NULL
    );
"#;

const SELECT_COLUMNS: &str = "event_id, created_at, vault_id, bar_id, timestamp, rfid_uid, purity,
    gps_lat, gps_lon, tamper_status, vault_door_status, status, severity, reasons,
    hash_ok, signature_ok, timestamp_ok, tamper_ok, identity_ok, purity_ok, door_ok,
    location_ok, freshness_ok";

/// Convert a `rusqlite::Error` into a `BullionError::Database`.
fn db_err(e: rusqlite::Error) -> BullionError {
    BullionError::Database(e.to_string())
}

/// One stored classification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    pub id: EventId,
    pub created_at: DateTime<Utc>,
    pub vault_id: String,
    pub bar_id: String,
    pub timestamp: String,
    pub rfid_uid: Option<String>,
    pub purity: Option<f64>,
    pub gps_lat: Option<f64>,
    pub gps_lon: Option<f64>,
    pub tamper_status: Option<String>,
    pub vault_door_status: Option<String>,
    pub status: String,
    pub severity: Severity,
    pub reasons: Vec<String>,
    pub checks: CheckFlags,
}

impl EventRecord {
    /// Build a record from a packet and its verdict.
    ///
    /// When the payload could be recovered its authenticated fields are
    /// used; otherwise only the packet's clear-text routing metadata is kept.
    pub fn new(
        packet: &SecurePacket,
        reading: Option<&Reading>,
        verdict: &Verdict,
        vocabulary: StatusVocabulary,
    ) -> Self {
        let (vault_id, bar_id, timestamp) = match reading {
            Some(r) => (r.vault_id.clone(), r.bar_id.clone(), r.timestamp.clone()),
            None => (
                packet.vault_id.clone(),
                packet.bar_id.clone(),
                packet.timestamp.clone(),
            ),
        };
        Self {
            id: EventId::new(),
            created_at: Utc::now(),
            vault_id,
            bar_id,
            timestamp,
            rfid_uid: reading.map(|r| r.rfid_uid.clone()),
            purity: reading.map(|r| r.purity),
            gps_lat: reading.and_then(|r| r.location).map(|l| l.gps_lat),
            gps_lon: reading.and_then(|r| r.location).map(|l| l.gps_lon),
            tamper_status: reading.map(|r| r.tamper_status.as_str().to_owned()),
            vault_door_status: reading.map(|r| r.vault_door_status.as_str().to_owned()),
            status: verdict.status(vocabulary).to_owned(),
            severity: verdict.severity,
            reasons: verdict.reasons.clone(),
            checks: verdict.checks,
        }
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        let id: String = row.get(0)?;
        let created_at: String = row.get(1)?;
        let severity: String = row.get(12)?;
        let reasons: String = row.get(13)?;
        Ok(Self {
            id: EventId(Uuid::parse_str(&id).map_err(|e| conversion_err(0, e))?),
            created_at: DateTime::parse_from_rfc3339(&created_at)
                .map_err(|e| conversion_err(1, e))?
                .with_timezone(&Utc),
            vault_id: row.get(2)?,
            bar_id: row.get(3)?,
            timestamp: row.get(4)?,
            rfid_uid: row.get(5)?,
            purity: row.get(6)?,
            gps_lat: row.get(7)?,
            gps_lon: row.get(8)?,
            tamper_status: row.get(9)?,
            vault_door_status: row.get(10)?,
            status: row.get(11)?,
            severity: serde_json::from_str(&severity).map_err(|e| conversion_err(12, e))?,
            reasons: serde_json::from_str(&reasons).map_err(|e| conversion_err(13, e))?,
            checks: CheckFlags {
                hash_ok: row.get(14)?,
                signature_ok: row.get(15)?,
                timestamp_ok: row.get(16)?,
                tamper_ok: row.get(17)?,
                identity_ok: row.get(18)?,
                purity_ok: row.get(19)?,
                door_ok: row.get(20)?,
                location_ok: row.get(21)?,
                freshness_ok: row.get(22)?,
            },
        })
    }
}

fn conversion_err(
    column: usize,
    e: impl std::error::Error + Send + Sync + 'static,
) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(column, rusqlite::types::Type::Text, Box::new(e))
}

/// Append-only event log backed by a SQLite database.
///
/// `rusqlite::Connection` is `Send` but not `Sync`, so it sits behind a
/// mutex; every statement is a short single-row operation.
pub struct EventStore {
    conn: Mutex<Connection>,
}

impl EventStore {
    /// Open (or create) the event database at `path`.
    ///
    /// WAL mode is enabled so dashboards can read while the service writes.
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(path.as_ref()).map_err(db_err)?;

        conn.pragma_update(None, "journal_mode", "WAL")
            .map_err(db_err)?;
        conn.execute_batch(CREATE_TABLES_SQL).map_err(db_err)?;

        info!("event store opened");
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Open an in-memory event database (useful for tests).
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(db_err)?;
        conn.execute_batch(CREATE_TABLES_SQL).map_err(db_err)?;

        debug!("in-memory event store opened");
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> std::sync::MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Append one classified event.
    #[instrument(skip_all, fields(event_id = %record.id, bar_id = %record.bar_id, status = %record.status))]
    pub fn append(&self, record: &EventRecord) -> Result<()> {
        let severity = serde_json::to_string(&record.severity)?;
        let reasons = serde_json::to_string(&record.reasons)?;
        let c = &record.checks;

        self.conn()
            .execute(
                "INSERT INTO vault_events (event_id, created_at, vault_id, bar_id, timestamp,
                 rfid_uid, purity, gps_lat, gps_lon, tamper_status, vault_door_status,
                 status, severity, reasons, hash_ok, signature_ok, timestamp_ok, tamper_ok,
                 identity_ok, purity_ok, door_ok, location_ok, freshness_ok)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15,
                 ?16, ?17, ?18, ?19, ?20, ?21, ?22, ?23)",
                params![
                    record.id.to_string(),
                    record.created_at.to_rfc3339(),
                    record.vault_id,
                    record.bar_id,
                    record.timestamp,
                    record.rfid_uid,
                    record.purity,
                    record.gps_lat,
                    record.gps_lon,
                    record.tamper_status,
                    record.vault_door_status,
                    record.status,
                    severity,
                    reasons,
                    c.hash_ok,
                    c.signature_ok,
                    c.timestamp_ok,
                    c.tamper_ok,
                    c.identity_ok,
                    c.purity_ok,
                    c.door_ok,
                    c.location_ok,
                    c.freshness_ok,
                ],
            )
            .map_err(db_err)?;

        debug!("event appended");
        Ok(())
    }

    /// All events for one bar, oldest first.
    pub fn events_for_bar(&self, bar_id: &str) -> Result<Vec<EventRecord>> {
        let conn = self.conn();
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {SELECT_COLUMNS} FROM vault_events WHERE bar_id = ?1 ORDER BY seq ASC"
            ))
            .map_err(db_err)?;
        let rows = stmt
            .query_map(params![bar_id], EventRecord::from_row)
            .map_err(db_err)?;
        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(db_err)
    }

    /// The most recent `limit` events, newest first.
    pub fn recent(&self, limit: u32) -> Result<Vec<EventRecord>> {
        let conn = self.conn();
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {SELECT_COLUMNS} FROM vault_events ORDER BY seq DESC LIMIT ?1"
            ))
            .map_err(db_err)?;
        let rows = stmt
            .query_map(params![limit], EventRecord::from_row)
            .map_err(db_err)?;
        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(db_err)
    }

    /// Total number of stored events.
    pub fn count(&self) -> Result<u64> {
        self.conn()
            .query_row("SELECT COUNT(*) FROM vault_events", [], |row| row.get(0))
            .map_err(db_err)
    }
}

impl FreshnessLedger for EventStore {
    fn last_timestamp(&self, unit_id: &str) -> Result<Option<DateTime<Utc>>> {
        let stored: Option<(i64, u32)> = self
            .conn()
            .query_row(
                "SELECT last_secs, last_nanos FROM unit_freshness WHERE bar_id = ?1",
                params![unit_id],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()
            .map_err(db_err)?;

        match stored {
            None => Ok(None),
            Some((secs, nanos)) => DateTime::from_timestamp(secs, nanos).map(Some).ok_or_else(|| {
                BullionError::Database(format!("stored timestamp {secs}.{nanos:09} out of range"))
            }),
        }
    }

    fn record_timestamp(&self, unit_id: &str, timestamp: DateTime<Utc>) -> Result<()> {
        // Monotonic upsert at nanosecond precision: a stale or equal write
        // leaves the row untouched.
        self.conn()
            .execute(
                "INSERT INTO unit_freshness (bar_id, last_timestamp, last_secs, last_nanos)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT (bar_id) DO UPDATE SET
                     last_timestamp = excluded.last_timestamp,
                     last_secs = excluded.last_secs,
                     last_nanos = excluded.last_nanos
                 WHERE (excluded.last_secs, excluded.last_nanos)
                     > (unit_freshness.last_secs, unit_freshness.last_nanos)",
                params![
                    unit_id,
                    timestamp.to_rfc3339_opts(SecondsFormat::Nanos, true),
                    timestamp.timestamp(),
                    timestamp.timestamp_subsec_nanos(),
                ],
            )
            .map_err(db_err)?;
        Ok(())
    }
}

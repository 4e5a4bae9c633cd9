// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Core domain types for the Bullion vault monitor.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lowest and highest purity a sensor can legitimately report (percent).
pub const PURITY_RANGE: (f64, f64) = (0.0, 100.0);

/// Unique identifier for a stored vault event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EventId(pub Uuid);

impl EventId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for EventId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for EventId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// State of the conductive tamper mesh wrapped around a bar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TamperState {
    Intact,
    Cut,
}

impl TamperState {
    /// Wire keyword for this state.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Intact => "INTACT",
            Self::Cut => "CUT",
        }
    }
}

impl std::fmt::Display for TamperState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// State of the vault enclosure door.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DoorState {
    Closed,
    Open,
    /// Opened without a valid unlock (hinge or latch sensor tripped).
    ForcedOpen,
}

impl DoorState {
    /// Wire keyword for this state.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Closed => "CLOSED",
            Self::Open => "OPEN",
            Self::ForcedOpen => "FORCED_OPEN",
        }
    }
}

impl std::fmt::Display for DoorState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// GPS fix reported by deployments whose schema carries location.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub gps_lat: f64,
    pub gps_lon: f64,
}

/// One sensor reading from a monitored bar.
///
/// Field names are the wire names used in the canonical payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    /// UTC ISO-8601 timestamp as produced by the edge device.
    pub timestamp: String,
    pub vault_id: String,
    pub bar_id: String,
    /// UID read from the bar's RFID identity tag.
    pub rfid_uid: String,
    /// Assay purity, percent.
    pub purity: f64,
    pub tamper_status: TamperState,
    pub vault_door_status: DoorState,
    #[serde(flatten, default, skip_serializing_if = "Option::is_none")]
    pub location: Option<Location>,
}

impl Reading {
    /// Check the value-level invariants that hold regardless of schema.
    pub fn validate(&self) -> std::result::Result<(), String> {
        let (min, max) = PURITY_RANGE;
        if !self.purity.is_finite() || self.purity < min || self.purity > max {
            return Err(format!("purity {} outside [{min}, {max}]", self.purity));
        }
        if let Some(loc) = self.location {
            if !(-90.0..=90.0).contains(&loc.gps_lat) || !(-180.0..=180.0).contains(&loc.gps_lon) {
                return Err(format!(
                    "location ({}, {}) is not a valid coordinate",
                    loc.gps_lat, loc.gps_lon
                ));
            }
        }
        Ok(())
    }

    /// Parse the timestamp, or `None` when it is not valid ISO-8601.
    pub fn parsed_timestamp(&self) -> Option<DateTime<Utc>> {
        parse_timestamp(&self.timestamp)
    }
}

/// Parse an ISO-8601 timestamp.
///
/// Offset-qualified values are converted to UTC; naive values are taken to
/// already be UTC.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .map(|naive| naive.and_utc())
}

/// The transmittable secure packet.
///
/// Routing metadata travels in the clear; the four opaque fields are base64.
/// Absent opaque fields deserialize as empty strings and are rejected by the
/// verifier rather than by the JSON layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecurePacket {
    pub vault_id: String,
    pub bar_id: String,
    pub timestamp: String,
    #[serde(default)]
    pub payload_ciphertext: String,
    #[serde(default)]
    pub iv: String,
    #[serde(default)]
    pub hash_sha3_256: String,
    #[serde(default)]
    pub signature: String,
}

/// Outcome of the two cryptographic authenticity checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntegrityChecks {
    pub hash_ok: bool,
    pub signature_ok: bool,
}

impl IntegrityChecks {
    pub fn passed(&self) -> bool {
        self.hash_ok && self.signature_ok
    }
}

/// Per-check results attached to a verdict. `None` means "not evaluated".
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckFlags {
    pub hash_ok: Option<bool>,
    pub signature_ok: Option<bool>,
    pub timestamp_ok: Option<bool>,
    pub tamper_ok: Option<bool>,
    pub identity_ok: Option<bool>,
    pub purity_ok: Option<bool>,
    pub door_ok: Option<bool>,
    pub location_ok: Option<bool>,
    pub freshness_ok: Option<bool>,
}

impl CheckFlags {
    /// Flags seeded from the verifier's results.
    pub fn from_integrity(checks: IntegrityChecks) -> Self {
        Self {
            hash_ok: Some(checks.hash_ok),
            signature_ok: Some(checks.signature_ok),
            ..Self::default()
        }
    }
}

/// Internal severity ladder, rendered through a [`StatusVocabulary`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Nominal,
    Warning,
    Critical,
}

/// Status strings a deployment reports to its collaborators.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusVocabulary {
    /// Two-tier: `SECURE` / `BREACH`. Warnings collapse into `BREACH`.
    #[default]
    SecureBreach,
    /// Three-tier: `OK` / `WARN` / `ALERT`.
    OkWarnAlert,
}

impl StatusVocabulary {
    pub fn label(&self, severity: Severity) -> &'static str {
        match (self, severity) {
            (Self::SecureBreach, Severity::Nominal) => "SECURE",
            (Self::SecureBreach, _) => "BREACH",
            (Self::OkWarnAlert, Severity::Nominal) => "OK",
            (Self::OkWarnAlert, Severity::Warning) => "WARN",
            (Self::OkWarnAlert, Severity::Critical) => "ALERT",
        }
    }
}

/// Classification outcome for one packet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Verdict {
    pub severity: Severity,
    /// Ordered, human-readable reasons. Empty exactly when nominal.
    pub reasons: Vec<String>,
    pub checks: CheckFlags,
}

impl Verdict {
    /// A verdict that stops at the integrity stage.
    pub fn integrity_failure(reason: impl Into<String>, checks: CheckFlags) -> Self {
        Self {
            severity: Severity::Critical,
            reasons: vec![reason.into()],
            checks,
        }
    }

    /// Whether the reading counts as accepted for ledger and enrollment
    /// purposes.
    pub fn is_accepted(&self) -> bool {
        self.severity < Severity::Critical
    }

    pub fn status(&self, vocabulary: StatusVocabulary) -> &'static str {
        vocabulary.label(self.severity)
    }

    /// Render the collaborator-facing `{status, reasons}` shape.
    pub fn response(&self, vocabulary: StatusVocabulary) -> VerdictResponse {
        VerdictResponse {
            status: self.status(vocabulary).to_owned(),
            reasons: self.reasons.clone(),
        }
    }
}

/// Collaborator-facing verdict body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerdictResponse {
    pub status: String,
    pub reasons: Vec<String>,
}

// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Monitor configuration.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{BullionError, Result};
use crate::types::StatusVocabulary;

/// Canonical payload field set agreed out-of-band between gateway and
/// verifier. Both ends must be configured identically.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PayloadSchema {
    /// Seven sensor fields, no GPS.
    #[default]
    Core,
    /// The core fields plus `gps_lat` / `gps_lon`.
    WithLocation,
}

/// How many policy violations a verdict reports.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportingMode {
    /// Stop at the first violated rule.
    #[default]
    ShortCircuit,
    /// Evaluate every rule and list every violation.
    Accumulate,
}

/// Where a unit's expected RFID UID comes from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnrollmentPolicy {
    /// Only deliberately enrolled identities are trusted.
    #[default]
    Explicit,
    /// The first accepted reading for an unknown unit sets its baseline.
    TrustOnFirstUse,
}

/// Treatment of a plain (non-forced) door opening with a valid bar context.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OpenDoorPolicy {
    #[default]
    Accept,
    Warn,
    Breach,
}

/// Circular region a located bar must stay inside.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Geofence {
    pub latitude: f64,
    pub longitude: f64,
    pub radius_m: f64,
}

/// Rule parameters for the classification engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicyConfig {
    /// Minimum acceptable purity, percent (inclusive).
    pub purity_min: f64,
    pub reporting: ReportingMode,
    pub vocabulary: StatusVocabulary,
    pub enrollment: EnrollmentPolicy,
    pub open_door: OpenDoorPolicy,
    pub geofence: Option<Geofence>,
    /// Bar id → expected RFID UID.
    pub enrolled_identities: BTreeMap<String, String>,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            purity_min: 99.0,
            reporting: ReportingMode::default(),
            vocabulary: StatusVocabulary::default(),
            enrollment: EnrollmentPolicy::default(),
            open_door: OpenDoorPolicy::default(),
            geofence: None,
            enrolled_identities: BTreeMap::new(),
        }
    }
}

/// Where the shared AES-256 key is read from. The key itself is never part
/// of the configuration file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SharedKeySource {
    /// Environment variable holding the base64 or hex key.
    Env(String),
    /// File holding the base64 or hex key.
    File(PathBuf),
}

impl Default for SharedKeySource {
    fn default() -> Self {
        Self::Env("BULLION_SHARED_KEY".into())
    }
}

/// Top-level settings for a gateway or verification service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    pub schema: PayloadSchema,
    pub policy: PolicyConfig,
    /// Directory holding `private_key.pem` and `public_key.pem`.
    pub key_dir: PathBuf,
    pub shared_key: SharedKeySource,
    /// SQLite event store.
    pub database_path: PathBuf,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            schema: PayloadSchema::default(),
            policy: PolicyConfig::default(),
            key_dir: PathBuf::from("keys"),
            shared_key: SharedKeySource::default(),
            database_path: PathBuf::from("vault_events.db"),
        }
    }
}

impl MonitorConfig {
    /// Load settings from a JSON file. A missing file yields the defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let data = match std::fs::read_to_string(path) {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(e) => return Err(e.into()),
        };
        let config: Self = serde_json::from_str(&data)
            .map_err(|e| BullionError::Config(format!("{}: {e}", path.display())))?;
        config.validate()?;
        Ok(config)
    }

    /// Write settings as pretty JSON.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        let min = self.policy.purity_min;
        if !min.is_finite() || !(0.0..=100.0).contains(&min) {
            return Err(BullionError::Config(format!(
                "purity_min {min} outside [0, 100]"
            )));
        }
        if let Some(fence) = self.policy.geofence {
            if !fence.radius_m.is_finite() || fence.radius_m <= 0.0 {
                return Err(BullionError::Config(format!(
                    "geofence radius {} must be positive",
                    fence.radius_m
                )));
            }
        }
        Ok(())
    }
}

// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Simulated edge sensors for one monitored bar.

use chrono::{DateTime, Duration, SecondsFormat, Utc};
use clap::ValueEnum;
use rand::Rng;

use bullion_core::types::{DoorState, Location, Reading, TamperState};

/// Purity range of a healthy bar, percent.
const NORMAL_PURITY: (f64, f64) = (98.7, 99.8);
/// Purity range of a substituted or plated bar, percent.
const LOW_PURITY: (f64, f64) = (94.0, 95.0);

/// Condition the simulated sensors report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Scenario {
    Normal,
    Tamper,
    #[value(name = "rfid_mismatch")]
    RfidMismatch,
    #[value(name = "low_purity")]
    LowPurity,
    #[value(name = "vault_open")]
    VaultOpen,
    #[value(name = "forced_open")]
    ForcedOpen,
    /// Normal readings; the caller resends the first packet.
    Replay,
}

/// Static identity of the simulated bar.
#[derive(Debug, Clone, PartialEq)]
pub struct UnitProfile {
    pub vault_id: String,
    pub bar_id: String,
    pub rfid_uid: String,
    /// Reported only when the deployment schema carries location.
    pub location: Option<Location>,
}

impl Default for UnitProfile {
    fn default() -> Self {
        Self {
            vault_id: "VLT-001".into(),
            bar_id: "BAR-001".into(),
            rfid_uid: "TAG12345".into(),
            location: None,
        }
    }
}

/// Produces readings for one bar with strictly increasing timestamps.
pub struct SensorSimulator<R> {
    unit: UnitProfile,
    rng: R,
    last: Option<DateTime<Utc>>,
}

impl<R: Rng> SensorSimulator<R> {
    pub fn new(unit: UnitProfile, rng: R) -> Self {
        Self {
            unit,
            rng,
            last: None,
        }
    }

    pub fn unit(&self) -> &UnitProfile {
        &self.unit
    }

    /// One reading taken at `now` (nudged forward if the clock has not
    /// advanced since the previous reading).
    pub fn reading(&mut self, scenario: Scenario, now: DateTime<Utc>) -> Reading {
        let timestamp = match self.last {
            Some(last) if now <= last => last + Duration::microseconds(1),
            _ => now,
        };
        self.last = Some(timestamp);

        let purity_range = match scenario {
            Scenario::LowPurity => LOW_PURITY,
            _ => NORMAL_PURITY,
        };
        let purity = self.rng.gen_range(purity_range.0..=purity_range.1);

        Reading {
            timestamp: timestamp.to_rfc3339_opts(SecondsFormat::Micros, false),
            vault_id: self.unit.vault_id.clone(),
            bar_id: self.unit.bar_id.clone(),
            rfid_uid: match scenario {
                Scenario::RfidMismatch => "TAG99999".into(),
                _ => self.unit.rfid_uid.clone(),
            },
            purity: (purity * 100.0).round() / 100.0,
            tamper_status: match scenario {
                Scenario::Tamper => TamperState::Cut,
                _ => TamperState::Intact,
            },
            vault_door_status: match scenario {
                Scenario::VaultOpen => DoorState::Open,
                Scenario::ForcedOpen => DoorState::ForcedOpen,
                _ => DoorState::Closed,
            },
            location: self.unit.location,
        }
    }
}

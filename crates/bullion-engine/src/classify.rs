// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Classification engine: turns one authenticated reading into a verdict.
//
// Rule order:
//   integrity ─► timestamp ─► tamper ─► identity ─► purity ─► door ─► location ─► freshness
//
// Integrity always stops evaluation. Under `ReportingMode::ShortCircuit` the
// first critical violation stops evaluation; under `Accumulate` every rule
// runs and every violation is listed. Warnings never stop evaluation.

use std::sync::{Arc, PoisonError};

use bullion_core::config::{EnrollmentPolicy, Geofence, OpenDoorPolicy, PolicyConfig, ReportingMode};
use bullion_core::error::Result;
use bullion_core::human_errors::describe_integrity;
use bullion_core::types::{
    CheckFlags, DoorState, IntegrityChecks, Location, Reading, Severity, TamperState, Verdict,
};
use chrono::{DateTime, Utc};
use tracing::{debug, info, instrument, warn};

use crate::identity::IdentityRegistry;
use crate::ledger::{FreshnessLedger, UnitLocks};

/// Mean Earth radius used for geofence distances, metres.
const EARTH_RADIUS_M: f64 = 6_371_000.0;

const TIMESTAMP_REASON: &str = "Invalid or missing timestamp";
const IDENTITY_MISMATCH_REASON: &str = "RFID UID mismatch for this bar";
const REPLAY_REASON: &str = "Timestamp older than or equal to last event (possible replay)";

/// Policy rules evaluated between the timestamp and freshness checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Rule {
    Tamper,
    Identity,
    Purity,
    Door,
    Location,
}

const RULES: [Rule; 5] = [
    Rule::Tamper,
    Rule::Identity,
    Rule::Purity,
    Rule::Door,
    Rule::Location,
];

/// Running state of one classification.
struct Evaluation {
    mode: ReportingMode,
    severity: Severity,
    reasons: Vec<String>,
    checks: CheckFlags,
    /// UID to enroll if the reading ends up accepted (trust-on-first-use).
    pending_enrollment: Option<String>,
}

impl Evaluation {
    fn new(mode: ReportingMode, checks: CheckFlags) -> Self {
        Self {
            mode,
            severity: Severity::Nominal,
            reasons: Vec::new(),
            checks,
            pending_enrollment: None,
        }
    }

    fn violate(&mut self, severity: Severity, reason: impl Into<String>) {
        self.severity = self.severity.max(severity);
        self.reasons.push(reason.into());
    }

    fn stopped(&self) -> bool {
        self.mode == ReportingMode::ShortCircuit && self.severity == Severity::Critical
    }

    fn into_verdict(self) -> Verdict {
        Verdict {
            severity: self.severity,
            reasons: self.reasons,
            checks: self.checks,
        }
    }
}

/// Sequential policy evaluator.
///
/// Holds the injected identity registry and freshness ledger. Readings for
/// different bars classify in parallel; readings for the same bar serialize
/// on a per-bar lock covering the ledger read and the ledger advance.
pub struct ClassificationEngine {
    policy: PolicyConfig,
    identities: Arc<dyn IdentityRegistry>,
    ledger: Arc<dyn FreshnessLedger>,
    locks: UnitLocks,
}

impl ClassificationEngine {
    pub fn new(
        policy: PolicyConfig,
        identities: Arc<dyn IdentityRegistry>,
        ledger: Arc<dyn FreshnessLedger>,
    ) -> Self {
        Self {
            policy,
            identities,
            ledger,
            locks: UnitLocks::new(),
        }
    }

    pub fn policy(&self) -> &PolicyConfig {
        &self.policy
    }

    /// Classify one reading given the verifier's authenticity results.
    ///
    /// Errors are infrastructure failures of the registry or ledger, never
    /// policy outcomes.
    #[instrument(skip_all, fields(bar_id = %reading.bar_id, vault_id = %reading.vault_id))]
    pub fn classify(&self, reading: &Reading, integrity: IntegrityChecks) -> Result<Verdict> {
        let checks = CheckFlags::from_integrity(integrity);
        if let Some(reason) = describe_integrity(integrity) {
            warn!(%reason, "integrity failure");
            return Ok(Verdict::integrity_failure(reason, checks));
        }

        let lock = self.locks.lock_for(&reading.bar_id);
        let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);

        let mut eval = Evaluation::new(self.policy.reporting, checks);
        let timestamp = self.evaluate(reading, &mut eval)?;
        let pending = eval.pending_enrollment.take();
        let verdict = eval.into_verdict();

        if verdict.is_accepted() {
            if let Some(uid) = pending {
                self.identities.enroll(&reading.bar_id, &uid)?;
            }
            if let Some(ts) = timestamp {
                self.ledger.record_timestamp(&reading.bar_id, ts)?;
            }
        }

        if verdict.severity == Severity::Nominal {
            debug!("reading nominal");
        } else {
            info!(severity = ?verdict.severity, reasons = ?verdict.reasons, "policy violation");
        }
        Ok(verdict)
    }

    /// Run every rule after integrity. Returns the parsed timestamp so the
    /// caller can advance the ledger.
    fn evaluate(&self, reading: &Reading, eval: &mut Evaluation) -> Result<Option<DateTime<Utc>>> {
        let timestamp = reading.parsed_timestamp();
        eval.checks.timestamp_ok = Some(timestamp.is_some());
        if timestamp.is_none() {
            eval.violate(Severity::Critical, TIMESTAMP_REASON);
            if eval.stopped() {
                return Ok(None);
            }
        }

        for rule in RULES {
            self.apply(rule, reading, eval)?;
            if eval.stopped() {
                return Ok(timestamp);
            }
        }

        if let Some(ts) = timestamp {
            let fresh = match self.ledger.last_timestamp(&reading.bar_id)? {
                Some(last) => ts > last,
                None => true,
            };
            eval.checks.freshness_ok = Some(fresh);
            if !fresh {
                eval.violate(Severity::Critical, REPLAY_REASON);
            }
        }
        Ok(timestamp)
    }

    fn apply(&self, rule: Rule, reading: &Reading, eval: &mut Evaluation) -> Result<()> {
        match rule {
            Rule::Tamper => {
                let ok = reading.tamper_status == TamperState::Intact;
                eval.checks.tamper_ok = Some(ok);
                if !ok {
                    eval.violate(
                        Severity::Critical,
                        format!("Tamper mesh status = {}", reading.tamper_status),
                    );
                }
            }
            Rule::Identity => self.check_identity(reading, eval)?,
            Rule::Purity => {
                let min = self.policy.purity_min;
                let ok = reading.purity >= min;
                eval.checks.purity_ok = Some(ok);
                if !ok {
                    eval.violate(
                        Severity::Critical,
                        format!("Purity below threshold ({:.2}% < {min:.2}%)", reading.purity),
                    );
                }
            }
            Rule::Door => self.check_door(reading, eval),
            Rule::Location => {
                if let (Some(fence), Some(location)) = (self.policy.geofence, reading.location) {
                    let distance = distance_from(&fence, location);
                    let ok = distance <= fence.radius_m;
                    eval.checks.location_ok = Some(ok);
                    if !ok {
                        eval.violate(
                            Severity::Critical,
                            format!(
                                "Bar outside geofence ({distance:.0} m from centre, limit {:.0} m)",
                                fence.radius_m
                            ),
                        );
                    }
                }
            }
        }
        Ok(())
    }

    fn check_identity(&self, reading: &Reading, eval: &mut Evaluation) -> Result<()> {
        let observed = reading.rfid_uid.as_str();
        match self.identities.expected_uid(&reading.bar_id)? {
            Some(expected) => {
                let ok = !observed.is_empty() && expected == observed;
                eval.checks.identity_ok = Some(ok);
                if !ok {
                    eval.violate(Severity::Critical, IDENTITY_MISMATCH_REASON);
                }
            }
            None => match self.policy.enrollment {
                EnrollmentPolicy::TrustOnFirstUse if !observed.is_empty() => {
                    eval.checks.identity_ok = Some(true);
                    eval.pending_enrollment = Some(observed.to_owned());
                }
                EnrollmentPolicy::TrustOnFirstUse => {
                    eval.checks.identity_ok = Some(false);
                    eval.violate(Severity::Critical, IDENTITY_MISMATCH_REASON);
                }
                EnrollmentPolicy::Explicit => {
                    eval.checks.identity_ok = Some(false);
                    eval.violate(
                        Severity::Critical,
                        format!("No enrolled RFID identity for bar {}", reading.bar_id),
                    );
                }
            },
        }
        Ok(())
    }

    fn check_door(&self, reading: &Reading, eval: &mut Evaluation) {
        match reading.vault_door_status {
            DoorState::Closed => eval.checks.door_ok = Some(true),
            DoorState::ForcedOpen => {
                eval.checks.door_ok = Some(false);
                eval.violate(Severity::Critical, "Vault door FORCED_OPEN");
            }
            DoorState::Open => {
                let has_context = !reading.bar_id.is_empty()
                    && !reading.rfid_uid.is_empty()
                    && eval.checks.identity_ok == Some(true);
                if !has_context {
                    eval.checks.door_ok = Some(false);
                    eval.violate(
                        Severity::Critical,
                        "Vault door opened without associated bar_id/RFID",
                    );
                    return;
                }
                match self.policy.open_door {
                    OpenDoorPolicy::Accept => eval.checks.door_ok = Some(true),
                    OpenDoorPolicy::Warn => {
                        eval.checks.door_ok = Some(false);
                        eval.violate(Severity::Warning, "Vault door OPEN");
                    }
                    OpenDoorPolicy::Breach => {
                        eval.checks.door_ok = Some(false);
                        eval.violate(Severity::Critical, "Vault door OPEN");
                    }
                }
            }
        }
    }
}

/// Great-circle (haversine) distance from the fence centre, metres.
fn distance_from(fence: &Geofence, location: Location) -> f64 {
    let (lat1, lat2) = (fence.latitude.to_radians(), location.gps_lat.to_radians());
    let d_lat = lat2 - lat1;
    let d_lon = (location.gps_lon - fence.longitude).to_radians();
    let a = (d_lat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (d_lon / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_M * a.sqrt().min(1.0).asin()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::MemoryIdentityRegistry;
    use crate::ledger::MemoryLedger;
    use crate::store::EventStore;
    use bullion_core::types::StatusVocabulary;

    const OK: IntegrityChecks = IntegrityChecks {
        hash_ok: true,
        signature_ok: true,
    };

    fn reading() -> Reading {
        Reading {
            timestamp: "2025-11-02T10:15:30.123456+00:00".into(),
            vault_id: "VLT-001".into(),
            bar_id: "BAR-001".into(),
            rfid_uid: "TAG12345".into(),
            purity: 99.5,
            tamper_status: TamperState::Intact,
            vault_door_status: DoorState::Closed,
            location: None,
        }
    }

    fn at(reading: &Reading, ts: &str) -> Reading {
        Reading {
            timestamp: ts.into(),
            ..reading.clone()
        }
    }

    fn engine_with(policy: PolicyConfig) -> ClassificationEngine {
        let registry = MemoryIdentityRegistry::with_enrollments(policy.enrolled_identities.clone());
        ClassificationEngine::new(policy, Arc::new(registry), Arc::new(MemoryLedger::new()))
    }

    fn enrolled_policy() -> PolicyConfig {
        let mut policy = PolicyConfig::default();
        policy
            .enrolled_identities
            .insert("BAR-001".into(), "TAG12345".into());
        policy
    }

    fn engine() -> ClassificationEngine {
        engine_with(enrolled_policy())
    }

    /// Both ledger implementations, so freshness behaviour is checked against
    /// the SQLite-backed one the service deploys.
    fn ledgers() -> Vec<(&'static str, Arc<dyn FreshnessLedger>)> {
        let memory: Arc<dyn FreshnessLedger> = Arc::new(MemoryLedger::new());
        let sqlite: Arc<dyn FreshnessLedger> = Arc::new(EventStore::open_in_memory().unwrap());
        vec![("memory", memory), ("sqlite", sqlite)]
    }

    fn engine_on(ledger: Arc<dyn FreshnessLedger>) -> ClassificationEngine {
        let policy = enrolled_policy();
        let registry = MemoryIdentityRegistry::with_enrollments(policy.enrolled_identities.clone());
        ClassificationEngine::new(policy, Arc::new(registry), ledger)
    }

    #[test]
    fn nominal_reading_is_secure() {
        let verdict = engine().classify(&reading(), OK).unwrap();
        assert_eq!(verdict.status(StatusVocabulary::SecureBreach), "SECURE");
        assert!(verdict.reasons.is_empty());
        assert_eq!(verdict.checks.freshness_ok, Some(true));
        assert_eq!(verdict.checks.location_ok, None);
    }

    #[test]
    fn cut_mesh_is_breach() {
        let mut r = reading();
        r.tamper_status = TamperState::Cut;
        let verdict = engine().classify(&r, OK).unwrap();
        assert_eq!(verdict.status(StatusVocabulary::SecureBreach), "BREACH");
        assert_eq!(verdict.reasons, vec!["Tamper mesh status = CUT".to_string()]);
        assert_eq!(verdict.checks.identity_ok, None);
    }

    #[test]
    fn low_purity_reason_embeds_both_values() {
        let mut r = reading();
        r.purity = 97.0;
        let verdict = engine().classify(&r, OK).unwrap();
        assert_eq!(verdict.severity, Severity::Critical);
        assert_eq!(
            verdict.reasons,
            vec!["Purity below threshold (97.00% < 99.00%)".to_string()]
        );
    }

    #[test]
    fn purity_threshold_is_inclusive() {
        let engine = engine();
        let mut r = at(&reading(), "2025-11-02T10:00:00Z");
        r.purity = 99.0;
        assert_eq!(engine.classify(&r, OK).unwrap().severity, Severity::Nominal);

        let mut r = at(&reading(), "2025-11-02T10:00:01Z");
        r.purity = 98.99;
        let verdict = engine.classify(&r, OK).unwrap();
        assert_eq!(verdict.checks.purity_ok, Some(false));
    }

    #[test]
    fn integrity_failure_stops_everything() {
        let mut r = reading();
        r.tamper_status = TamperState::Cut;
        let verdict = engine()
            .classify(&r, IntegrityChecks { hash_ok: false, signature_ok: true })
            .unwrap();
        assert_eq!(verdict.reasons.len(), 1);
        assert!(verdict.reasons[0].contains("hash"));
        assert_eq!(verdict.checks.tamper_ok, None);
        assert_eq!(verdict.checks.signature_ok, Some(true));
    }

    #[test]
    fn rejected_integrity_does_not_advance_ledger() {
        let engine = engine();
        let bad = IntegrityChecks { hash_ok: true, signature_ok: false };
        engine.classify(&reading(), bad).unwrap();
        assert!(engine.classify(&reading(), OK).unwrap().is_accepted());
    }

    #[test]
    fn replay_is_flagged() {
        for (name, ledger) in ledgers() {
            let engine = engine_on(ledger);
            let first = at(&reading(), "2025-11-02T10:00:05Z");
            assert_eq!(engine.classify(&first, OK).unwrap().severity, Severity::Nominal, "{name}");

            for ts in ["2025-11-02T10:00:05Z", "2025-11-02T10:00:04Z"] {
                let verdict = engine.classify(&at(&reading(), ts), OK).unwrap();
                assert_eq!(verdict.reasons, vec![REPLAY_REASON.to_string()], "{name} {ts}");
                assert_eq!(verdict.checks.freshness_ok, Some(false), "{name} {ts}");
            }

            let later = at(&reading(), "2025-11-02T10:00:06Z");
            assert!(engine.classify(&later, OK).unwrap().reasons.is_empty(), "{name}");
        }
    }

    #[test]
    fn replay_detected_below_one_microsecond() {
        for (name, ledger) in ledgers() {
            let engine = engine_on(ledger);
            let fine = at(&reading(), "2025-11-02T10:15:30.123456789Z");
            assert!(engine.classify(&fine, OK).unwrap().is_accepted(), "{name}");

            // Same instant written with an offset, then the same reading again.
            for ts in ["2025-11-02T12:15:30.123456789+02:00", "2025-11-02T10:15:30.123456789Z"] {
                let verdict = engine.classify(&at(&reading(), ts), OK).unwrap();
                assert_eq!(verdict.checks.freshness_ok, Some(false), "{name} {ts}");
                assert_eq!(verdict.reasons, vec![REPLAY_REASON.to_string()], "{name} {ts}");
            }

            let truncated = at(&reading(), "2025-11-02T10:15:30.123456Z");
            assert!(!engine.classify(&truncated, OK).unwrap().is_accepted(), "{name}");

            let next_nano = at(&reading(), "2025-11-02T10:15:30.123456790Z");
            assert!(engine.classify(&next_nano, OK).unwrap().is_accepted(), "{name}");
        }
    }

    #[test]
    fn breach_does_not_advance_ledger() {
        let engine = engine();
        let mut cut = at(&reading(), "2025-11-02T10:00:05Z");
        cut.tamper_status = TamperState::Cut;
        engine.classify(&cut, OK).unwrap();

        let earlier = at(&reading(), "2025-11-02T10:00:01Z");
        assert_eq!(engine.classify(&earlier, OK).unwrap().severity, Severity::Nominal);
    }

    #[test]
    fn invalid_timestamp_is_breach() {
        let verdict = engine().classify(&at(&reading(), "not-a-time"), OK).unwrap();
        assert_eq!(verdict.reasons, vec![TIMESTAMP_REASON.to_string()]);
        assert_eq!(verdict.checks.timestamp_ok, Some(false));
        assert_eq!(verdict.checks.tamper_ok, None);
    }

    #[test]
    fn explicit_enrollment_rejects_unknown_bar() {
        let mut r = reading();
        r.bar_id = "BAR-777".into();
        let verdict = engine().classify(&r, OK).unwrap();
        assert_eq!(verdict.checks.identity_ok, Some(false));
        assert!(verdict.reasons[0].contains("BAR-777"));
    }

    #[test]
    fn trust_on_first_use_learns_baseline() {
        let policy = PolicyConfig {
            enrollment: EnrollmentPolicy::TrustOnFirstUse,
            ..PolicyConfig::default()
        };
        let registry = Arc::new(MemoryIdentityRegistry::new());
        let engine = ClassificationEngine::new(policy, registry.clone(), Arc::new(MemoryLedger::new()));

        let first = at(&reading(), "2025-11-02T10:00:00Z");
        assert!(engine.classify(&first, OK).unwrap().reasons.is_empty());
        assert_eq!(registry.expected_uid("BAR-001").unwrap().as_deref(), Some("TAG12345"));

        let mut swapped = at(&reading(), "2025-11-02T10:00:01Z");
        swapped.rfid_uid = "TAG99999".into();
        let verdict = engine.classify(&swapped, OK).unwrap();
        assert_eq!(verdict.reasons, vec![IDENTITY_MISMATCH_REASON.to_string()]);

        let same = at(&reading(), "2025-11-02T10:00:02Z");
        assert!(engine.classify(&same, OK).unwrap().reasons.is_empty());
    }

    #[test]
    fn trust_on_first_use_skips_breached_baseline() {
        let policy = PolicyConfig {
            enrollment: EnrollmentPolicy::TrustOnFirstUse,
            ..PolicyConfig::default()
        };
        let registry = Arc::new(MemoryIdentityRegistry::new());
        let engine = ClassificationEngine::new(policy, registry.clone(), Arc::new(MemoryLedger::new()));

        let mut r = reading();
        r.purity = 90.0;
        assert!(!engine.classify(&r, OK).unwrap().is_accepted());
        assert!(registry.is_empty());
    }

    #[test]
    fn accumulate_lists_every_violation() {
        let policy = PolicyConfig {
            reporting: ReportingMode::Accumulate,
            ..enrolled_policy()
        };
        let mut r = reading();
        r.tamper_status = TamperState::Cut;
        r.rfid_uid = "TAG00000".into();
        r.purity = 95.5;
        r.vault_door_status = DoorState::ForcedOpen;

        let verdict = engine_with(policy).classify(&r, OK).unwrap();
        assert_eq!(
            verdict.reasons,
            vec![
                "Tamper mesh status = CUT".to_string(),
                IDENTITY_MISMATCH_REASON.to_string(),
                "Purity below threshold (95.50% < 99.00%)".to_string(),
                "Vault door FORCED_OPEN".to_string(),
            ]
        );
        assert_eq!(verdict.checks.freshness_ok, Some(true));
    }

    #[test]
    fn accumulate_with_bad_timestamp_skips_freshness() {
        let policy = PolicyConfig {
            reporting: ReportingMode::Accumulate,
            ..enrolled_policy()
        };
        let mut r = at(&reading(), "");
        r.purity = 50.0;
        let verdict = engine_with(policy).classify(&r, OK).unwrap();
        assert_eq!(verdict.reasons.len(), 2);
        assert_eq!(verdict.reasons[0], TIMESTAMP_REASON);
        assert_eq!(verdict.checks.freshness_ok, None);
    }

    #[test]
    fn open_door_policies() {
        let mut r = reading();
        r.vault_door_status = DoorState::Open;

        let accept = engine().classify(&r, OK).unwrap();
        assert_eq!(accept.severity, Severity::Nominal);

        let warn = engine_with(PolicyConfig {
            open_door: OpenDoorPolicy::Warn,
            ..enrolled_policy()
        })
        .classify(&r, OK)
        .unwrap();
        assert_eq!(warn.severity, Severity::Warning);
        assert_eq!(warn.status(StatusVocabulary::OkWarnAlert), "WARN");
        assert_eq!(warn.status(StatusVocabulary::SecureBreach), "BREACH");
        assert!(warn.is_accepted());

        let breach = engine_with(PolicyConfig {
            open_door: OpenDoorPolicy::Breach,
            ..enrolled_policy()
        })
        .classify(&r, OK)
        .unwrap();
        assert_eq!(breach.severity, Severity::Critical);
        assert_eq!(breach.reasons, vec!["Vault door OPEN".to_string()]);
    }

    #[test]
    fn warning_still_checks_freshness() {
        let engine = engine_with(PolicyConfig {
            open_door: OpenDoorPolicy::Warn,
            ..enrolled_policy()
        });
        let mut r = reading();
        r.vault_door_status = DoorState::Open;
        assert_eq!(engine.classify(&r, OK).unwrap().severity, Severity::Warning);

        let verdict = engine.classify(&r, OK).unwrap();
        assert_eq!(verdict.severity, Severity::Critical);
        assert_eq!(verdict.reasons.last().map(String::as_str), Some(REPLAY_REASON));
    }

    #[test]
    fn open_door_without_rfid_is_breach() {
        let policy = PolicyConfig {
            reporting: ReportingMode::Accumulate,
            ..enrolled_policy()
        };
        let mut r = reading();
        r.vault_door_status = DoorState::Open;
        r.rfid_uid = String::new();
        let verdict = engine_with(policy).classify(&r, OK).unwrap();
        assert_eq!(
            verdict.reasons,
            vec![
                IDENTITY_MISMATCH_REASON.to_string(),
                "Vault door opened without associated bar_id/RFID".to_string(),
            ]
        );
    }

    #[test]
    fn geofence_check() {
        let policy = PolicyConfig {
            geofence: Some(Geofence {
                latitude: 51.5074,
                longitude: -0.1278,
                radius_m: 500.0,
            }),
            ..enrolled_policy()
        };
        let engine = engine_with(policy);

        let mut inside = at(&reading(), "2025-11-02T10:00:00Z");
        inside.location = Some(Location { gps_lat: 51.5080, gps_lon: -0.1270 });
        let verdict = engine.classify(&inside, OK).unwrap();
        assert_eq!(verdict.checks.location_ok, Some(true));

        let mut outside = at(&reading(), "2025-11-02T10:00:01Z");
        outside.location = Some(Location { gps_lat: 48.8566, gps_lon: 2.3522 });
        let verdict = engine.classify(&outside, OK).unwrap();
        assert_eq!(verdict.checks.location_ok, Some(false));
        assert!(verdict.reasons[0].starts_with("Bar outside geofence"));
    }

    #[test]
    fn haversine_distance() {
        let fence = Geofence { latitude: 51.5074, longitude: -0.1278, radius_m: 1.0 };
        let paris = Location { gps_lat: 48.8566, gps_lon: 2.3522 };
        let d = distance_from(&fence, paris);
        assert!((d - 343_500.0).abs() < 1_500.0, "distance {d}");
        let here = Location { gps_lat: 51.5074, gps_lon: -0.1278 };
        assert!(distance_from(&fence, here) < 1e-6);
    }

    #[test]
    fn concurrent_duplicates_accept_once() {
        for (name, ledger) in ledgers() {
            let engine = Arc::new(engine_on(ledger));
            let handles: Vec<_> = (0..16)
                .map(|i| {
                    let engine = Arc::clone(&engine);
                    // Same instant, alternately in UTC and with an offset.
                    let ts = if i % 2 == 0 {
                        "2025-11-02T10:15:30.123456789Z"
                    } else {
                        "2025-11-02T11:15:30.123456789+01:00"
                    };
                    std::thread::spawn(move || {
                        engine.classify(&at(&reading(), ts), OK).unwrap().is_accepted()
                    })
                })
                .collect();
            let accepted = handles
                .into_iter()
                .map(|h| h.join().unwrap())
                .filter(|accepted| *accepted)
                .count();
            assert_eq!(accepted, 1, "{name}");
        }
    }
}

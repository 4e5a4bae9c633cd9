// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Reason strings for verdicts that stop at the integrity stage.
//
// Operators read these on the dashboard, so each one names the check that
// failed in plain words. Detail from the underlying error is appended in
// parentheses where it helps triage (corruption vs. forgery).

use crate::error::BullionError;
use crate::types::IntegrityChecks;

/// Reason for a packet whose hash and/or signature did not verify.
///
/// Returns `None` when both checks passed.
pub fn describe_integrity(checks: IntegrityChecks) -> Option<String> {
    match (checks.hash_ok, checks.signature_ok) {
        (true, true) => None,
        (false, true) => Some("Payload hash mismatch (integrity failure)".into()),
        (true, false) => Some("Payload signature invalid (integrity failure)".into()),
        (false, false) => Some("Payload hash/signature invalid (integrity failure)".into()),
    }
}

/// Reason for a packet that could not be opened at all.
pub fn describe_packet_error(err: &BullionError) -> String {
    match err {
        BullionError::Decode(detail) => {
            format!("Packet fields could not be decoded (integrity failure: {detail})")
        }
        BullionError::Crypto(e) => {
            format!("Payload could not be decrypted (integrity failure: {e})")
        }
        BullionError::Parse(detail) => {
            format!("Payload is not a valid reading (integrity failure: {detail})")
        }
        other => format!("Packet rejected ({other})"),
    }
}

// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Verification service: verifier, engine, and event store wired together.
// One call per received packet; every packet that reaches the service ends
// up as exactly one stored event.

use std::sync::Arc;

use bullion_core::error::Result;
use bullion_core::human_errors::describe_packet_error;
use bullion_core::types::{
    CheckFlags, EventId, Reading, SecurePacket, StatusVocabulary, Verdict, VerdictResponse,
};
use bullion_protocol::PacketVerifier;
use tracing::{info, instrument, warn};

use crate::classify::ClassificationEngine;
use crate::store::{EventRecord, EventStore};

/// Result of ingesting one packet.
#[derive(Debug, Clone, PartialEq)]
pub struct IngestOutcome {
    pub event_id: EventId,
    pub verdict: Verdict,
    pub response: VerdictResponse,
    /// The recovered reading, absent when the packet could not be opened.
    pub reading: Option<Reading>,
}

pub struct VerificationService {
    verifier: PacketVerifier,
    engine: ClassificationEngine,
    events: Arc<EventStore>,
    vocabulary: StatusVocabulary,
}

impl VerificationService {
    pub fn new(verifier: PacketVerifier, engine: ClassificationEngine, events: Arc<EventStore>) -> Self {
        let vocabulary = engine.policy().vocabulary;
        Self {
            verifier,
            engine,
            events,
            vocabulary,
        }
    }

    pub fn events(&self) -> &EventStore {
        &self.events
    }

    /// Verify, classify, and record one packet.
    ///
    /// Per-packet failures (bad base64, bad padding, unparsable payload)
    /// become integrity-failure verdicts. Only infrastructure failures are
    /// returned as errors.
    #[instrument(skip_all, fields(vault_id = %packet.vault_id, bar_id = %packet.bar_id))]
    pub fn ingest(&self, packet: &SecurePacket) -> Result<IngestOutcome> {
        let (reading, verdict) = match self.verifier.verify(packet) {
            Ok(verified) => {
                let verdict = self.engine.classify(&verified.reading, verified.checks)?;
                (Some(verified.reading), verdict)
            }
            Err(e) if e.is_packet_error() => {
                warn!(error = %e, "packet rejected before classification");
                let checks = CheckFlags {
                    hash_ok: Some(false),
                    signature_ok: Some(false),
                    ..CheckFlags::default()
                };
                (None, Verdict::integrity_failure(describe_packet_error(&e), checks))
            }
            Err(e) => return Err(e),
        };

        let record = EventRecord::new(packet, reading.as_ref(), &verdict, self.vocabulary);
        self.events.append(&record)?;

        let response = verdict.response(self.vocabulary);
        info!(event_id = %record.id, status = %response.status, "packet ingested");
        Ok(IngestOutcome {
            event_id: record.id,
            verdict,
            response,
            reading,
        })
    }
}

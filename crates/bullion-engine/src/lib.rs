// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Bullion: breach classification and event recording.
//
// The engine depends on two injected capabilities: an `IdentityRegistry`
// (bar → expected RFID UID) and a `FreshnessLedger` (bar → last accepted
// timestamp). `EventStore` implements the ledger on SQLite.

pub mod classify;
pub mod identity;
pub mod ledger;
pub mod service;
pub mod store;

pub use classify::ClassificationEngine;
pub use identity::{IdentityRegistry, MemoryIdentityRegistry};
pub use ledger::{FreshnessLedger, MemoryLedger, UnitLocks};
pub use service::{IngestOutcome, VerificationService};
pub use store::{EventRecord, EventStore};

#[cfg(test)]
pub(crate) mod fixtures {
    use std::sync::Arc;

    use bullion_core::config::{PayloadSchema, PolicyConfig};
    use bullion_core::types::{DoorState, Reading, TamperState};
    use bullion_protocol::{PacketBuilder, PacketVerifier};
    use bullion_security::{DigestVerifier, InlinePemKeys, KeyRing, SymmetricKey};

    use crate::{ClassificationEngine, EventStore, MemoryIdentityRegistry, VerificationService};

    const PRIMARY_PRIVATE: &str = include_str!("../../bullion-security/testdata/primary_private.pem");
    const PRIMARY_PUBLIC: &str = include_str!("../../bullion-security/testdata/primary_public.pem");
    const ROGUE_PRIVATE: &str = include_str!("../../bullion-security/testdata/rogue_private.pem");
    const ROGUE_PUBLIC: &str = include_str!("../../bullion-security/testdata/rogue_public.pem");

    pub fn shared_key() -> SymmetricKey {
        SymmetricKey::from_bytes(&[0x42u8; 32]).unwrap()
    }

    pub fn reading() -> Reading {
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

    pub fn enrolled_policy() -> PolicyConfig {
        let mut policy = PolicyConfig::default();
        policy
            .enrolled_identities
            .insert("BAR-001".into(), "TAG12345".into());
        policy
    }

    fn builder_for(private: &str, public: &str) -> PacketBuilder {
        let keys = InlinePemKeys::new(Some(private.into()), public);
        PacketBuilder::new(
            PayloadSchema::Core,
            shared_key(),
            Arc::new(KeyRing::new(Arc::new(keys))),
        )
    }

    pub fn builder() -> PacketBuilder {
        builder_for(PRIMARY_PRIVATE, PRIMARY_PUBLIC)
    }

    /// Builder signing with a key the service does not trust.
    pub fn rogue_builder() -> PacketBuilder {
        builder_for(ROGUE_PRIVATE, ROGUE_PUBLIC)
    }

    pub fn service(policy: PolicyConfig) -> VerificationService {
        let events = Arc::new(EventStore::open_in_memory().unwrap());
        let identities = Arc::new(MemoryIdentityRegistry::with_enrollments(
            policy.enrolled_identities.clone(),
        ));
        let engine = ClassificationEngine::new(policy, identities, events.clone());
        let public_key = Arc::new(DigestVerifier::from_pem(PRIMARY_PUBLIC).unwrap());
        let verifier = PacketVerifier::new(PayloadSchema::Core, shared_key(), public_key);
        VerificationService::new(verifier, engine, events)
    }
}

// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Central service layer: loads key material, opens the event store, and
// wires verifier, engine, and gateway together for the CLI commands.
//
// Missing key material is fatal here, once, at startup. Per-packet problems
// never surface as errors from this layer.

use std::sync::Arc;

use bullion_core::MonitorConfig;
use bullion_core::error::Result;
use bullion_core::types::SecurePacket;
use bullion_engine::{
    ClassificationEngine, EventStore, IngestOutcome, MemoryIdentityRegistry, VerificationService,
};
use bullion_protocol::{PacketBuilder, PacketVerifier};
use bullion_security::{KeyRing, PemKeyDirectory, SymmetricKey, load_shared_key};
use tracing::info;

/// Everything a command needs, built from one [`MonitorConfig`].
pub struct AppServices {
    config: MonitorConfig,
    keys: Arc<KeyRing>,
    shared_key: SymmetricKey,
    service: VerificationService,
}

impl AppServices {
    /// Initialise the verification side: public key, shared key, event store.
    pub fn init(config: MonitorConfig) -> Result<Self> {
        info!(
            key_dir = %config.key_dir.display(),
            database = %config.database_path.display(),
            "initialising services"
        );

        let keys = Arc::new(KeyRing::new(Arc::new(PemKeyDirectory::new(&config.key_dir))));
        let public_key = keys.verifier()?;
        info!(fingerprint = %public_key.fingerprint(), "public key loaded");

        let shared_key = load_shared_key(&config.shared_key)?;

        let events = Arc::new(EventStore::open(&config.database_path)?);
        let identities = Arc::new(MemoryIdentityRegistry::with_enrollments(
            config.policy.enrolled_identities.clone(),
        ));
        let engine = ClassificationEngine::new(config.policy.clone(), identities, events.clone());
        let verifier = PacketVerifier::new(config.schema, shared_key.clone(), public_key);

        Ok(Self {
            service: VerificationService::new(verifier, engine, events),
            config,
            keys,
            shared_key,
        })
    }

    pub fn events(&self) -> &EventStore {
        self.service.events()
    }

    /// Packet builder for the simulated gateway. Requires the private key.
    pub fn gateway(&self) -> Result<PacketBuilder> {
        self.keys.signer()?;
        Ok(PacketBuilder::new(
            self.config.schema,
            self.shared_key.clone(),
            Arc::clone(&self.keys),
        ))
    }

    pub fn ingest(&self, packet: &SecurePacket) -> Result<IngestOutcome> {
        self.service.ingest(packet)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bullion_core::BullionError;
    use bullion_core::config::SharedKeySource;
    use bullion_core::types::{DoorState, Reading, TamperState};
    use bullion_security::keys::{PRIVATE_KEY_FILE, PUBLIC_KEY_FILE};

    const PRIMARY_PRIVATE: &str = include_str!("../../../bullion-security/testdata/primary_private.pem");
    const PRIMARY_PUBLIC: &str = include_str!("../../../bullion-security/testdata/primary_public.pem");

    fn config(dir: &tempfile::TempDir, with_private: bool) -> MonitorConfig {
        let keys = dir.path().join("keys");
        std::fs::create_dir_all(&keys).unwrap();
        std::fs::write(keys.join(PUBLIC_KEY_FILE), PRIMARY_PUBLIC).unwrap();
        if with_private {
            std::fs::write(keys.join(PRIVATE_KEY_FILE), PRIMARY_PRIVATE).unwrap();
        }
        let secret = dir.path().join("shared.key");
        std::fs::write(&secret, SymmetricKey::generate().unwrap().to_base64()).unwrap();

        let mut config = MonitorConfig {
            key_dir: keys,
            shared_key: SharedKeySource::File(secret),
            database_path: dir.path().join("events.db"),
            ..MonitorConfig::default()
        };
        config
            .policy
            .enrolled_identities
            .insert("BAR-001".into(), "TAG12345".into());
        config
    }

    fn reading() -> Reading {
        Reading {
            timestamp: "2025-11-02T10:15:30+00:00".into(),
            vault_id: "VLT-001".into(),
            bar_id: "BAR-001".into(),
            rfid_uid: "TAG12345".into(),
            purity: 99.2,
            tamper_status: TamperState::Intact,
            vault_door_status: DoorState::Closed,
            location: None,
        }
    }

    #[test]
    fn gateway_to_service_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let services = AppServices::init(config(&dir, true)).unwrap();
        let packet = services.gateway().unwrap().build(&reading()).unwrap();

        let outcome = services.ingest(&packet).unwrap();
        assert_eq!(outcome.response.status, "SECURE");
        assert_eq!(services.events().count().unwrap(), 1);
    }

    #[test]
    fn verifier_only_deployment_has_no_gateway() {
        let dir = tempfile::tempdir().unwrap();
        let services = AppServices::init(config(&dir, false)).unwrap();
        assert!(matches!(
            services.gateway(),
            Err(BullionError::KeyMaterialMissing { .. })
        ));
    }

    #[test]
    fn missing_public_key_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = config(&dir, true);
        config.key_dir = dir.path().join("nowhere");
        assert!(matches!(
            AppServices::init(config),
            Err(BullionError::KeyMaterialMissing { .. })
        ));
    }

    #[test]
    fn missing_shared_key_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = config(&dir, true);
        config.shared_key = SharedKeySource::Env("BULLION_TEST_UNSET_SHARED_KEY".into());
        assert!(matches!(
            AppServices::init(config),
            Err(BullionError::KeyMaterialMissing { .. })
        ));
    }
}

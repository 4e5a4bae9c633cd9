// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Edge-side packet assembly: canonicalize, digest, sign, encrypt, envelope.

use std::sync::Arc;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use bullion_core::config::PayloadSchema;
use bullion_core::error::Result;
use bullion_core::types::{Reading, SecurePacket};
use bullion_security::{KeyRing, SymmetricKey, cipher, integrity};
use tracing::{debug, instrument};

use crate::canonical;

/// Builds [`SecurePacket`]s on the gateway.
pub struct PacketBuilder {
    schema: PayloadSchema,
    shared_key: SymmetricKey,
    keys: Arc<KeyRing>,
}

impl PacketBuilder {
    pub fn new(schema: PayloadSchema, shared_key: SymmetricKey, keys: Arc<KeyRing>) -> Self {
        Self {
            schema,
            shared_key,
            keys,
        }
    }

    pub fn schema(&self) -> PayloadSchema {
        self.schema
    }

    /// Turn one reading into a transmittable packet.
    ///
    /// The digest and signature cover the canonical plaintext, so a packet
    /// from this builder always verifies once decrypted with the shared key.
    #[instrument(skip_all, fields(vault_id = %reading.vault_id, bar_id = %reading.bar_id))]
    pub fn build(&self, reading: &Reading) -> Result<SecurePacket> {
        let payload = canonical::encode(reading, self.schema)?;
        let digest = integrity::sha3_256(&payload);

        let signer = self.keys.signer()?;
        let signature = signer.sign_digest(&digest)?;

        let (ciphertext, iv) = cipher::encrypt(&self.shared_key, &payload)?;

        debug!(
            payload_len = payload.len(),
            ciphertext_len = ciphertext.len(),
            "secure packet built"
        );

        Ok(SecurePacket {
            vault_id: reading.vault_id.clone(),
            bar_id: reading.bar_id.clone(),
            timestamp: reading.timestamp.clone(),
            payload_ciphertext: STANDARD.encode(ciphertext),
            iv: STANDARD.encode(iv),
            hash_sha3_256: STANDARD.encode(digest),
            signature: STANDARD.encode(signature),
        })
    }
}

// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Service-side packet verification.
//
// Input is untrusted. Every failure is a value: decode, decrypt, and parse
// problems come back as `BullionError::{Decode, Crypto, Parse}`, and hash or
// signature mismatches come back as `false` flags. Nothing here panics on
// adversarial bytes.

use std::sync::Arc;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use bullion_core::config::PayloadSchema;
use bullion_core::error::{BullionError, Result};
use bullion_core::types::{IntegrityChecks, Reading, SecurePacket};
use bullion_security::cipher::IV_LEN;
use bullion_security::integrity::DIGEST_LEN;
use bullion_security::{DigestVerifier, SymmetricKey, cipher, integrity};
use tracing::{debug, instrument, warn};

use crate::canonical;

/// A decrypted reading together with its authenticity results.
#[derive(Debug, Clone, PartialEq)]
pub struct VerifiedPacket {
    pub reading: Reading,
    pub checks: IntegrityChecks,
}

/// Recovers and authenticates readings from [`SecurePacket`]s.
///
/// Holds only the public key.
pub struct PacketVerifier {
    schema: PayloadSchema,
    shared_key: SymmetricKey,
    public_key: Arc<DigestVerifier>,
}

/// The four opaque fields after base64 decoding.
struct DecodedFields {
    ciphertext: Vec<u8>,
    iv: Vec<u8>,
    digest: Vec<u8>,
    signature: Vec<u8>,
}

impl PacketVerifier {
    pub fn new(schema: PayloadSchema, shared_key: SymmetricKey, public_key: Arc<DigestVerifier>) -> Self {
        Self {
            schema,
            shared_key,
            public_key,
        }
    }

    pub fn schema(&self) -> PayloadSchema {
        self.schema
    }

    /// Decode, decrypt, authenticate, and parse one packet.
    #[instrument(skip_all, fields(vault_id = %packet.vault_id, bar_id = %packet.bar_id))]
    pub fn verify(&self, packet: &SecurePacket) -> Result<VerifiedPacket> {
        let fields = decode_fields(packet)?;

        let plaintext = cipher::decrypt(&self.shared_key, &fields.iv, &fields.ciphertext)?;

        let recomputed = integrity::sha3_256(&plaintext);
        let hash_ok = integrity::digests_match(&fields.digest, &recomputed);

        let signature_ok = self.public_key.verify_digest(&fields.digest, &fields.signature);

        let checks = IntegrityChecks { hash_ok, signature_ok };
        if !checks.passed() {
            warn!(hash_ok, signature_ok, "packet failed authenticity checks");
        }

        let reading = canonical::decode(&plaintext, self.schema)?;
        debug!(hash_ok, signature_ok, "packet verified");
        Ok(VerifiedPacket { reading, checks })
    }
}

fn decode_fields(packet: &SecurePacket) -> Result<DecodedFields> {
    Ok(DecodedFields {
        ciphertext: decode_field("payload_ciphertext", &packet.payload_ciphertext, None)?,
        iv: decode_field("iv", &packet.iv, Some(IV_LEN))?,
        digest: decode_field("hash_sha3_256", &packet.hash_sha3_256, Some(DIGEST_LEN))?,
        signature: decode_field("signature", &packet.signature, None)?,
    })
}

fn decode_field(name: &str, value: &str, expected_len: Option<usize>) -> Result<Vec<u8>> {
    if value.is_empty() {
        return Err(BullionError::Decode(format!("{name} is missing")));
    }
    let bytes = STANDARD
        .decode(value)
        .map_err(|e| BullionError::Decode(format!("{name}: {e}")))?;
    match expected_len {
        Some(len) if bytes.len() != len => Err(BullionError::Decode(format!(
            "{name} decodes to {} bytes, expected {len}",
            bytes.len()
        ))),
        _ => Ok(bytes),
    }
}

// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Packet authenticity: RSA PKCS#1 v1.5 signatures with SHA3-256.
//
// The signed message is the 32-byte SHA3-256 digest of the canonical
// payload, not the payload itself. PKCS#1 v1.5 padding is deterministic, so
// the same key and digest always yield the same signature.
//
// Verification only ever needs the public key. A verifier that held the
// private key and compared re-generated signatures would defeat the point of
// asymmetric signing, so no such path exists here.

use bullion_core::error::{BullionError, Result};
use rsa::pkcs1::{DecodeRsaPrivateKey, DecodeRsaPublicKey};
use rsa::pkcs1v15::{Signature, SigningKey, VerifyingKey};
use rsa::pkcs8::{DecodePrivateKey, DecodePublicKey, EncodePrivateKey, EncodePublicKey, LineEnding};
use rsa::signature::{SignatureEncoding, Signer, Verifier};
use rsa::traits::PublicKeyParts;
use rsa::{RsaPrivateKey, RsaPublicKey};
use sha3::Sha3_256;
use tracing::{debug, instrument};

use crate::integrity::fingerprint;

/// Modulus size used for deployment keys.
pub const DEFAULT_KEY_BITS: usize = 3072;

/// Holder of the gateway's private key.
pub struct DigestSigner {
    signing_key: SigningKey<Sha3_256>,
    verifier: DigestVerifier,
}

impl DigestSigner {
    /// Generate a fresh keypair using the OS CSPRNG.
    ///
    /// 3072-bit generation takes seconds; callers should do it once, offline.
    #[instrument]
    pub fn generate(bits: usize) -> Result<Self> {
        let mut rng = rand::rngs::OsRng;
        let private_key = RsaPrivateKey::new(&mut rng, bits)
            .map_err(|e| BullionError::KeyMaterial(format!("key generation failed: {e}")))?;
        let signer = Self::from_private_key(private_key);
        debug!(fingerprint = %signer.verifier.fingerprint(), "RSA keypair generated");
        Ok(signer)
    }

    pub fn from_private_key(private_key: RsaPrivateKey) -> Self {
        let verifier = DigestVerifier::from_public_key(private_key.to_public_key());
        Self {
            signing_key: SigningKey::<Sha3_256>::new(private_key),
            verifier,
        }
    }

    /// Parse a PEM private key, PKCS#8 (`BEGIN PRIVATE KEY`) or PKCS#1
    /// (`BEGIN RSA PRIVATE KEY`).
    pub fn from_pem(pem: &str) -> Result<Self> {
        let private_key = RsaPrivateKey::from_pkcs8_pem(pem)
            .or_else(|_| RsaPrivateKey::from_pkcs1_pem(pem))
            .map_err(|e| BullionError::KeyMaterial(format!("private key PEM: {e}")))?;
        Ok(Self::from_private_key(private_key))
    }

    /// PKCS#8 PEM encoding of the private key.
    pub fn to_pem(&self) -> Result<String> {
        let private_key: &RsaPrivateKey = self.signing_key.as_ref();
        let pem = private_key
            .to_pkcs8_pem(LineEnding::LF)
            .map_err(|e| BullionError::KeyMaterial(format!("private key PEM: {e}")))?;
        Ok(pem.to_string())
    }

    /// The public half, for distribution to verifiers.
    pub fn verifier(&self) -> &DigestVerifier {
        &self.verifier
    }

    /// Sign a payload digest. The signature length equals the modulus size
    /// (384 bytes for a 3072-bit key).
    #[instrument(skip_all, fields(digest_len = digest.len()))]
    pub fn sign_digest(&self, digest: &[u8]) -> Result<Vec<u8>> {
        let signature = self
            .signing_key
            .try_sign(digest)
            .map_err(|e| BullionError::Signing(e.to_string()))?;
        Ok(signature.to_vec())
    }
}

/// Public key used to check packet signatures.
#[derive(Clone)]
pub struct DigestVerifier {
    public_key: RsaPublicKey,
    verifying_key: VerifyingKey<Sha3_256>,
}

impl DigestVerifier {
    pub fn from_public_key(public_key: RsaPublicKey) -> Self {
        Self {
            verifying_key: VerifyingKey::<Sha3_256>::new(public_key.clone()),
            public_key,
        }
    }

    /// Parse a PEM public key, SPKI (`BEGIN PUBLIC KEY`) or PKCS#1
    /// (`BEGIN RSA PUBLIC KEY`).
    pub fn from_pem(pem: &str) -> Result<Self> {
        let public_key = RsaPublicKey::from_public_key_pem(pem)
            .or_else(|_| RsaPublicKey::from_pkcs1_pem(pem))
            .map_err(|e| BullionError::KeyMaterial(format!("public key PEM: {e}")))?;
        Ok(Self::from_public_key(public_key))
    }

    /// SPKI PEM encoding.
    pub fn to_pem(&self) -> Result<String> {
        self.public_key
            .to_public_key_pem(LineEnding::LF)
            .map_err(|e| BullionError::KeyMaterial(format!("public key PEM: {e}")))
    }

    /// Modulus size in bytes, which is also the signature length.
    pub fn signature_len(&self) -> usize {
        self.public_key.size()
    }

    /// SHA-256 fingerprint of the SPKI DER encoding.
    pub fn fingerprint(&self) -> String {
        match self.public_key.to_public_key_der() {
            Ok(der) => fingerprint(der.as_bytes()),
            Err(_) => String::from("unavailable"),
        }
    }

    /// Check `signature` over `digest`.
    ///
    /// Never fails: a malformed, truncated, or foreign signature is simply
    /// `false`.
    pub fn verify_digest(&self, digest: &[u8], signature: &[u8]) -> bool {
        let Ok(signature) = Signature::try_from(signature) else {
            return false;
        };
        self.verifying_key.verify(digest, &signature).is_ok()
    }
}

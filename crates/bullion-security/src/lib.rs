// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>

//! bullion-security: cryptographic primitives for the secure packet protocol.
//!
//! SHA3-256 digests over the canonical payload, AES-256-CBC for payload
//! confidentiality, RSA-3072 PKCS#1 v1.5 signatures over the digest, and the
//! key-material plumbing that feeds them.

pub mod cipher;
pub mod integrity;
pub mod keys;
pub mod signing;

// PUBLIC API: Re-export core security primitives
pub use cipher::{SymmetricKey, decrypt, encrypt};
pub use integrity::{digests_match, fingerprint, sha3_256};
pub use keys::{InlinePemKeys, KeyMaterial, KeyRing, PemKeyDirectory, load_shared_key};
pub use signing::{DigestSigner, DigestVerifier};

// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Payload integrity: SHA3-256 digests for tamper detection, plus SHA-256
// fingerprints for identifying key material in logs.

use sha2::Sha256;
use sha3::{Digest, Sha3_256};
use subtle::ConstantTimeEq;

/// Length of a SHA3-256 digest in bytes.
pub const DIGEST_LEN: usize = 32;

/// Compute the SHA3-256 digest of `data`.
///
/// This is the digest carried in `hash_sha3_256` and the message that gets
/// signed. It is always taken over the exact canonical plaintext bytes.
pub fn sha3_256(data: &[u8]) -> [u8; DIGEST_LEN] {
    let mut hasher = Sha3_256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// SHA3-256 of `data` as a lowercase hex string.
pub fn sha3_256_hex(data: &[u8]) -> String {
    hex::encode(sha3_256(data))
}

/// Byte-for-byte digest comparison that does not leak the position of the
/// first difference. Slices of different length never match.
pub fn digests_match(expected: &[u8], actual: &[u8]) -> bool {
    expected.len() == actual.len() && bool::from(expected.ct_eq(actual))
}

/// SHA-256 hex fingerprint of `data`, used to name keys in logs.
pub fn fingerprint(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    /// SHA3-256 of the empty byte slice (FIPS 202 test vector).
    const EMPTY_SHA3_256: &str =
        "a7ffc6f8bf1ed76651c14756a061d662f580ff4de43b49fa82d80a4b80f8434a";

    #[test]
    fn hash_empty_input() {
        assert_eq!(sha3_256_hex(b""), EMPTY_SHA3_256);
    }

    #[test]
    fn hash_known_value() {
        // SHA3-256("abc"): FIPS 202 example.
        let expected = "3a985da74fe225b2045c172d6bd390bd855f086e3e9d525b46bfe24511431532";
        assert_eq!(sha3_256_hex(b"abc"), expected);
    }

    #[test]
    fn single_byte_change_changes_digest() {
        let a = sha3_256(br#"{"purity":99.5}"#);
        let b = sha3_256(br#"{"purity":99.6}"#);
        assert!(!digests_match(&a, &b));
        assert!(digests_match(&a, &a));
    }

    #[test]
    fn truncated_digest_never_matches() {
        let d = sha3_256(b"bar");
        assert!(!digests_match(&d, &d[..31]));
    }

    #[test]
    fn fingerprint_is_sha256() {
        assert_eq!(
            fingerprint(b""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }
}

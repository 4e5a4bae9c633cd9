// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Payload confidentiality: AES-256-CBC with PKCS#7-style padding and a fresh
// random IV per message.
//
// The cipher provides confidentiality only. Authenticity comes from the
// digest and signature, which are computed over the plaintext; a ciphertext
// that decrypts cleanly has not thereby been shown to be genuine.

use aes::Aes256;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use bullion_core::error::CryptoError;
use cbc::cipher::block_padding::{NoPadding, Pkcs7};
use cbc::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use ring::rand::{SecureRandom, SystemRandom};
use tracing::{debug, instrument};

/// AES block size in bytes.
pub const BLOCK_SIZE: usize = 16;
/// AES-256 key length in bytes.
pub const KEY_LEN: usize = 32;
/// CBC initialization vector length in bytes.
pub const IV_LEN: usize = BLOCK_SIZE;

type Aes256CbcEnc = cbc::Encryptor<Aes256>;
type Aes256CbcDec = cbc::Decryptor<Aes256>;

/// The AES-256 key shared by gateway and verifier.
///
/// Loaded from a secret source at startup (see `keys::load_shared_key`);
/// never compiled in.
#[derive(Clone, PartialEq, Eq)]
pub struct SymmetricKey([u8; KEY_LEN]);

impl SymmetricKey {
    /// Wrap raw key bytes. The slice must be exactly 32 bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CryptoError> {
        let key: [u8; KEY_LEN] = bytes.try_into().map_err(|_| CryptoError::InvalidKeyLength {
            expected: KEY_LEN,
            actual: bytes.len(),
        })?;
        Ok(Self(key))
    }

    /// Parse a key written as 64 hex characters or as base64.
    pub fn from_encoded(encoded: &str) -> Result<Self, CryptoError> {
        let encoded = encoded.trim();
        let bytes = if encoded.len() == KEY_LEN * 2 && encoded.bytes().all(|b| b.is_ascii_hexdigit())
        {
            hex::decode(encoded).map_err(|e| CryptoError::InvalidKeyEncoding(format!("hex: {e}")))?
        } else {
            STANDARD
                .decode(encoded)
                .map_err(|e| CryptoError::InvalidKeyEncoding(format!("base64: {e}")))?
        };
        Self::from_bytes(&bytes)
    }

    /// Draw a fresh random key from the OS CSPRNG.
    pub fn generate() -> Result<Self, CryptoError> {
        let mut key = [0u8; KEY_LEN];
        SystemRandom::new()
            .fill(&mut key)
            .map_err(|_| CryptoError::Encrypt("system RNG unavailable".into()))?;
        Ok(Self(key))
    }

    /// Base64 form, as stored in secret files and environment variables.
    pub fn to_base64(&self) -> String {
        STANDARD.encode(self.0)
    }

    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.0
    }
}

impl std::fmt::Debug for SymmetricKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SymmetricKey(<redacted>)")
    }
}

/// Encrypt `plaintext` under `key` with a freshly drawn IV.
///
/// Returns `(ciphertext, iv)`. The ciphertext is always a non-empty whole
/// number of blocks.
#[instrument(skip_all, fields(plaintext_len = plaintext.len()))]
pub fn encrypt(key: &SymmetricKey, plaintext: &[u8]) -> Result<(Vec<u8>, [u8; IV_LEN]), CryptoError> {
    let mut iv = [0u8; IV_LEN];
    SystemRandom::new()
        .fill(&mut iv)
        .map_err(|_| CryptoError::Encrypt("system RNG unavailable".into()))?;

    let ciphertext = encrypt_with_iv(key, &iv, plaintext)?;
    debug!(ciphertext_len = ciphertext.len(), "encryption complete");
    Ok((ciphertext, iv))
}

fn encrypt_with_iv(key: &SymmetricKey, iv: &[u8; IV_LEN], plaintext: &[u8]) -> Result<Vec<u8>, CryptoError> {
    let enc = Aes256CbcEnc::new_from_slices(&key.0, iv)
        .map_err(|e| CryptoError::Encrypt(e.to_string()))?;
    Ok(enc.encrypt_padded_vec_mut::<Pkcs7>(plaintext))
}

/// Decrypt `ciphertext` with `key` and the packet's `iv`, then strip padding.
///
/// Fails with [`CryptoError::Padding`] when the ciphertext is empty or not a
/// whole number of blocks, or when the trailing pad-length byte is 0 or
/// larger than the block size.
#[instrument(skip_all, fields(ciphertext_len = ciphertext.len()))]
pub fn decrypt(key: &SymmetricKey, iv: &[u8], ciphertext: &[u8]) -> Result<Vec<u8>, CryptoError> {
    if iv.len() != IV_LEN {
        return Err(CryptoError::InvalidIv {
            expected: IV_LEN,
            actual: iv.len(),
        });
    }
    if ciphertext.is_empty() || ciphertext.len() % BLOCK_SIZE != 0 {
        return Err(CryptoError::Padding(format!(
            "ciphertext length {} is not a positive multiple of {BLOCK_SIZE}",
            ciphertext.len()
        )));
    }

    let dec = Aes256CbcDec::new_from_slices(&key.0, iv)
        .map_err(|e| CryptoError::Decrypt(e.to_string()))?;
    let mut padded = dec
        .decrypt_padded_vec_mut::<NoPadding>(ciphertext)
        .map_err(|e| CryptoError::Decrypt(e.to_string()))?;

    let pad_len = padded.last().copied().map(usize::from).unwrap_or(0);
    if pad_len == 0 || pad_len > BLOCK_SIZE {
        return Err(CryptoError::Padding(format!("pad length {pad_len}")));
    }
    padded.truncate(padded.len() - pad_len);

    debug!(plaintext_len = padded.len(), "decryption complete");
    Ok(padded)
}

// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Unified error types for Bullion.

use thiserror::Error;

/// Failures of the symmetric cipher layer.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CryptoError {
    /// Trailing pad byte is zero, larger than the block size, or the
    /// ciphertext is not a whole number of blocks.
    #[error("invalid padding: {0}")]
    Padding(String),

    #[error("initialization vector must be {expected} bytes, got {actual}")]
    InvalidIv { expected: usize, actual: usize },

    #[error("symmetric key must be {expected} bytes, got {actual}")]
    InvalidKeyLength { expected: usize, actual: usize },

    /// Key text is neither 64 hex characters nor valid base64.
    #[error("symmetric key encoding invalid: {0}")]
    InvalidKeyEncoding(String),

    #[error("encryption failed: {0}")]
    Encrypt(String),

    #[error("decryption failed: {0}")]
    Decrypt(String),
}

/// Top-level error type for all Bullion operations.
#[derive(Debug, Error)]
pub enum BullionError {
    // -- Per-packet errors (always resolved to an integrity verdict) --
    #[error("decode error: {0}")]
    Decode(String),

    #[error("crypto error: {0}")]
    Crypto(#[from] CryptoError),

    #[error("parse error: {0}")]
    Parse(String),

    // -- Protocol misuse on the sending side --
    #[error("payload schema mismatch: {0}")]
    SchemaMismatch(String),

    #[error("invalid reading: {0}")]
    InvalidReading(String),

    // -- Key material --
    #[error("key material missing at {location}")]
    KeyMaterialMissing { location: String },

    #[error("key material unusable: {0}")]
    KeyMaterial(String),

    #[error("signing failed: {0}")]
    Signing(String),

    // -- Storage / configuration --
    #[error("database error: {0}")]
    Database(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("file I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl BullionError {
    /// Whether this error belongs to a single packet (decode, decrypt, or
    /// parse) rather than to the service itself.
    pub fn is_packet_error(&self) -> bool {
        matches!(self, Self::Decode(_) | Self::Crypto(_) | Self::Parse(_))
    }
}

/// Alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, BullionError>;

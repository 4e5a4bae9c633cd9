// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Bullion: the secure packet protocol.
//
//   reading ─► canonical::encode ─► SHA3-256 ─► RSA sign ─► AES-CBC ─► SecurePacket
//   SecurePacket ─► base64 decode ─► AES-CBC ─► SHA3-256 / RSA verify ─► canonical::decode

pub mod builder;
pub mod canonical;
pub mod verifier;

pub use builder::PacketBuilder;
pub use verifier::{PacketVerifier, VerifiedPacket};

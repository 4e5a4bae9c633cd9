// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Key material: loading the RSA keypair from persisted PEM files, caching it
// for the life of the process, and reading the shared AES key from a secret
// source.
//
// Absent key material is a startup failure, not a per-packet one: services
// call `KeyRing::preload_*` once before accepting traffic.

use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};

use bullion_core::config::SharedKeySource;
use bullion_core::error::{BullionError, Result};
use tracing::{debug, info, instrument};

use crate::cipher::SymmetricKey;
use crate::signing::{DigestSigner, DigestVerifier};

/// File name of the PKCS#8 private key inside a key directory.
pub const PRIVATE_KEY_FILE: &str = "private_key.pem";
/// File name of the SPKI public key inside a key directory.
pub const PUBLIC_KEY_FILE: &str = "public_key.pem";

/// Source of persisted asymmetric key material.
pub trait KeyMaterial: Send + Sync {
    /// Load the signing key. Only the gateway side should ever call this.
    fn load_private_key(&self) -> Result<DigestSigner>;

    /// Load the verification key.
    fn load_public_key(&self) -> Result<DigestVerifier>;
}

/// A directory holding `private_key.pem` and `public_key.pem`.
#[derive(Debug, Clone)]
pub struct PemKeyDirectory {
    dir: PathBuf,
}

impl PemKeyDirectory {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn private_key_path(&self) -> PathBuf {
        self.dir.join(PRIVATE_KEY_FILE)
    }

    pub fn public_key_path(&self) -> PathBuf {
        self.dir.join(PUBLIC_KEY_FILE)
    }

    /// Persist both halves of `signer`, creating the directory if needed.
    ///
    /// The private key file is made owner-readable only on Unix.
    #[instrument(skip_all, fields(dir = %self.dir.display()))]
    pub fn write_keypair(&self, signer: &DigestSigner) -> Result<()> {
        std::fs::create_dir_all(&self.dir)?;

        let private_path = self.private_key_path();
        std::fs::write(&private_path, signer.to_pem()?)?;
        restrict_permissions(&private_path)?;

        std::fs::write(self.public_key_path(), signer.verifier().to_pem()?)?;

        info!(fingerprint = %signer.verifier().fingerprint(), "keypair written");
        Ok(())
    }
}

impl KeyMaterial for PemKeyDirectory {
    fn load_private_key(&self) -> Result<DigestSigner> {
        DigestSigner::from_pem(&read_pem(&self.private_key_path())?)
    }

    fn load_public_key(&self) -> Result<DigestVerifier> {
        DigestVerifier::from_pem(&read_pem(&self.public_key_path())?)
    }
}

/// Key material handed over as PEM text, e.g. by a secret manager.
///
/// A verifier-only deployment supplies no private key at all.
#[derive(Clone)]
pub struct InlinePemKeys {
    private_pem: Option<String>,
    public_pem: String,
}

impl InlinePemKeys {
    pub fn new(private_pem: Option<String>, public_pem: impl Into<String>) -> Self {
        Self {
            private_pem,
            public_pem: public_pem.into(),
        }
    }

    pub fn public_only(public_pem: impl Into<String>) -> Self {
        Self::new(None, public_pem)
    }
}

impl KeyMaterial for InlinePemKeys {
    fn load_private_key(&self) -> Result<DigestSigner> {
        match &self.private_pem {
            Some(pem) => DigestSigner::from_pem(pem),
            None => Err(BullionError::KeyMaterialMissing {
                location: "inline private key".into(),
            }),
        }
    }

    fn load_public_key(&self) -> Result<DigestVerifier> {
        DigestVerifier::from_pem(&self.public_pem)
    }
}

fn read_pem(path: &Path) -> Result<String> {
    match std::fs::read_to_string(path) {
        Ok(pem) => Ok(pem),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(BullionError::KeyMaterialMissing {
            location: path.display().to_string(),
        }),
        Err(e) => Err(e.into()),
    }
}

#[cfg(unix)]
fn restrict_permissions(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))?;
    Ok(())
}

#[cfg(not(unix))]
fn restrict_permissions(_path: &Path) -> Result<()> {
    Ok(())
}

/// Process-lifetime cache in front of a [`KeyMaterial`] source.
///
/// Reads take a shared lock; the first load and [`KeyRing::invalidate`] take
/// the exclusive one.
pub struct KeyRing {
    source: Arc<dyn KeyMaterial>,
    signer: RwLock<Option<Arc<DigestSigner>>>,
    verifier: RwLock<Option<Arc<DigestVerifier>>>,
}

impl KeyRing {
    pub fn new(source: Arc<dyn KeyMaterial>) -> Self {
        Self {
            source,
            signer: RwLock::new(None),
            verifier: RwLock::new(None),
        }
    }

    /// The cached signing key, loading it on first use.
    pub fn signer(&self) -> Result<Arc<DigestSigner>> {
        cached(&self.signer, || self.source.load_private_key())
    }

    /// The cached verification key, loading it on first use.
    pub fn verifier(&self) -> Result<Arc<DigestVerifier>> {
        cached(&self.verifier, || self.source.load_public_key())
    }

    /// Drop cached keys so the next access reloads them (key rotation).
    pub fn invalidate(&self) {
        *self.signer.write().unwrap_or_else(PoisonError::into_inner) = None;
        *self.verifier.write().unwrap_or_else(PoisonError::into_inner) = None;
        debug!("key cache invalidated");
    }
}

fn cached<T>(slot: &RwLock<Option<Arc<T>>>, load: impl FnOnce() -> Result<T>) -> Result<Arc<T>> {
    if let Some(hit) = slot.read().unwrap_or_else(PoisonError::into_inner).as_ref() {
        return Ok(Arc::clone(hit));
    }

    let mut guard = slot.write().unwrap_or_else(PoisonError::into_inner);
    // Another thread may have loaded while we waited for the write lock.
    if let Some(hit) = guard.as_ref() {
        return Ok(Arc::clone(hit));
    }
    let loaded = Arc::new(load()?);
    *guard = Some(Arc::clone(&loaded));
    debug!("key material loaded into cache");
    Ok(loaded)
}

/// Read the shared AES-256 key from its configured secret source.
#[instrument(skip_all)]
pub fn load_shared_key(source: &SharedKeySource) -> Result<SymmetricKey> {
    let (encoded, location) = match source {
        SharedKeySource::Env(var) => match std::env::var(var) {
            Ok(value) => (value, format!("${var}")),
            Err(_) => {
                return Err(BullionError::KeyMaterialMissing {
                    location: format!("${var}"),
                });
            }
        },
        SharedKeySource::File(path) => (read_pem(path)?, path.display().to_string()),
    };

    let key = SymmetricKey::from_encoded(&encoded)
        .map_err(|e| BullionError::KeyMaterial(format!("shared key at {location}: {e}")))?;
    debug!(%location, "shared key loaded");
    Ok(key)
}

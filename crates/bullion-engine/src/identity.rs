// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Identity provisioning: which RFID UID each bar is expected to carry.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use bullion_core::error::Result;
use tracing::info;

/// Source of truth for bar → expected RFID UID.
///
/// Implementations decide where enrollments live (config, a provisioning
/// service, a database). The classification engine only reads, and writes
/// through [`IdentityRegistry::enroll`] when trust-on-first-use is enabled.
pub trait IdentityRegistry: Send + Sync {
    /// Expected UID for `unit_id`, or `None` when the unit is not enrolled.
    fn expected_uid(&self, unit_id: &str) -> Result<Option<String>>;

    /// Record `uid` as the expected UID for `unit_id`.
    fn enroll(&self, unit_id: &str, uid: &str) -> Result<()>;
}

/// Process-lifetime registry held in memory.
#[derive(Default)]
pub struct MemoryIdentityRegistry {
    entries: RwLock<HashMap<String, String>>,
}

impl MemoryIdentityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry pre-seeded with deliberate enrollments.
    pub fn with_enrollments<I, K, V>(enrollments: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let entries = enrollments
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        Self {
            entries: RwLock::new(entries),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl IdentityRegistry for MemoryIdentityRegistry {
    fn expected_uid(&self, unit_id: &str) -> Result<Option<String>> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        Ok(entries.get(unit_id).cloned())
    }

    fn enroll(&self, unit_id: &str, uid: &str) -> Result<()> {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(unit_id.to_owned(), uid.to_owned());
        info!(%unit_id, "identity enrolled");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seeded_lookup() {
        let registry = MemoryIdentityRegistry::with_enrollments([("BAR-001", "TAG12345")]);
        assert_eq!(registry.expected_uid("BAR-001").unwrap().as_deref(), Some("TAG12345"));
        assert_eq!(registry.expected_uid("BAR-002").unwrap(), None);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn enroll_overwrites() {
        let registry = MemoryIdentityRegistry::new();
        assert!(registry.is_empty());
        registry.enroll("BAR-009", "TAG-A").unwrap();
        registry.enroll("BAR-009", "TAG-B").unwrap();
        assert_eq!(registry.expected_uid("BAR-009").unwrap().as_deref(), Some("TAG-B"));
    }
}

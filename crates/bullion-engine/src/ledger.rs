// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Freshness ledger (last accepted timestamp per bar) and the per-bar locks
// that make its read-check-advance sequence atomic.
//
// Two readings for the same bar processed concurrently could otherwise both
// observe the same stale timestamp and both be accepted. The engine holds a
// bar's lock from the ledger read until the ledger write.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use bullion_core::error::Result;
use chrono::{DateTime, Utc};

/// Storage capability behind the replay check.
pub trait FreshnessLedger: Send + Sync {
    /// Last accepted timestamp for `unit_id`, if any reading was accepted.
    fn last_timestamp(&self, unit_id: &str) -> Result<Option<DateTime<Utc>>>;

    /// Advance the ledger for `unit_id`. Must never move it backwards.
    fn record_timestamp(&self, unit_id: &str, timestamp: DateTime<Utc>) -> Result<()>;
}

/// Ledger kept in memory; lost on restart.
#[derive(Default)]
pub struct MemoryLedger {
    last: Mutex<HashMap<String, DateTime<Utc>>>,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }
}

impl FreshnessLedger for MemoryLedger {
    fn last_timestamp(&self, unit_id: &str) -> Result<Option<DateTime<Utc>>> {
        let last = self.last.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(last.get(unit_id).copied())
    }

    fn record_timestamp(&self, unit_id: &str, timestamp: DateTime<Utc>) -> Result<()> {
        let mut last = self.last.lock().unwrap_or_else(PoisonError::into_inner);
        let entry = last.entry(unit_id.to_owned()).or_insert(timestamp);
        if timestamp > *entry {
            *entry = timestamp;
        }
        Ok(())
    }
}

/// One mutex per bar id, created on first use.
#[derive(Default)]
pub struct UnitLocks {
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl UnitLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// The lock guarding `unit_id`. Callers lock the returned mutex for the
    /// duration of their read-check-advance sequence.
    pub fn lock_for(&self, unit_id: &str) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(locks.entry(unit_id.to_owned()).or_default())
    }
}

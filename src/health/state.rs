//! Shared backend health record.
//!
//! # Design Decisions
//! - One map for all backends behind a single reader/writer lock; writes are
//!   one per backend per probe tick, so contention stays low
//! - Every backend starts healthy so traffic flows before the first probe
//! - The lock is only held for an in-memory lookup or a single-entry flip,
//!   never across I/O

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

/// Probe verdicts keyed by backend index.
#[derive(Debug, Default)]
pub struct HealthRecord {
    statuses: RwLock<HashMap<usize, bool>>,
}

impl HealthRecord {
    /// Create a record with backends `0..backend_count` marked healthy.
    pub fn new(backend_count: usize) -> Self {
        Self {
            statuses: RwLock::new((0..backend_count).map(|i| (i, true)).collect()),
        }
    }

    /// Pure in-memory read. Unknown indices are reported unhealthy.
    pub fn is_healthy(&self, index: usize) -> bool {
        let statuses = self.statuses.read().unwrap_or_else(PoisonError::into_inner);
        statuses.get(&index).copied().unwrap_or(false)
    }

    /// Store a verdict. Returns true when the stored value changed.
    pub fn set_healthy(&self, index: usize, healthy: bool) -> bool {
        let mut statuses = self.statuses.write().unwrap_or_else(PoisonError::into_inner);
        let previous = statuses.insert(index, healthy);
        previous != Some(healthy)
    }

    /// Copy of all verdicts, ordered by index.
    pub fn snapshot(&self) -> Vec<(usize, bool)> {
        let statuses = self.statuses.read().unwrap_or_else(PoisonError::into_inner);
        let mut entries: Vec<_> = statuses.iter().map(|(i, h)| (*i, *h)).collect();
        entries.sort_unstable_by_key(|(i, _)| *i);
        entries
    }
}

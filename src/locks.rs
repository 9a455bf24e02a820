//! Per-lot mutation locks.
//!
//! Relation edits read a lot, check a precondition ("has no parent yet") and
//! then write. Two edits racing on the same lot could both pass the check, so
//! every mutation first claims all lot ids it touches. Claims are taken
//! all-at-once, which rules out lock-ordering deadlocks between callers that
//! touch overlapping sets of lots.

use crate::error::{Result, SeedError};
use parking_lot::{Condvar, Mutex};
use std::collections::HashSet;
use std::time::{Duration, Instant};
use tracing::debug;

/// Registry of lot ids currently claimed by an in-flight mutation.
#[derive(Debug, Default)]
pub struct LotLocks {
    held: Mutex<HashSet<String>>,
    released: Condvar,
}

impl LotLocks {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim every id in `ids`, waiting up to `timeout` for conflicting claims
    /// to be released. Duplicate ids are claimed once.
    pub fn acquire<'a, I>(&'a self, ids: I, timeout: Duration) -> Result<LotGuard<'a>>
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        let mut wanted: Vec<String> = ids.into_iter().map(Into::into).collect();
        wanted.sort();
        wanted.dedup();

        let deadline = Instant::now() + timeout;
        let mut held = self.held.lock();
        loop {
            let busy = wanted.iter().find(|id| held.contains(id.as_str())).cloned();
            let Some(busy) = busy else {
                break;
            };
            debug!(lot = %busy, "Waiting for lot lock");
            if self.released.wait_until(&mut held, deadline).timed_out()
                && wanted.iter().any(|id| held.contains(id.as_str()))
            {
                return Err(SeedError::LockTimeout { lot: busy, timeout });
            }
        }

        for id in &wanted {
            held.insert(id.clone());
        }
        Ok(LotGuard {
            locks: self,
            ids: wanted,
        })
    }

    /// Whether `id` is currently claimed.
    pub fn is_locked(&self, id: &str) -> bool {
        self.held.lock().contains(id)
    }
}

/// Releases its claims when dropped.
#[derive(Debug)]
pub struct LotGuard<'a> {
    locks: &'a LotLocks,
    ids: Vec<String>,
}

impl LotGuard<'_> {
    /// Ids held by this guard, sorted.
    pub fn ids(&self) -> &[String] {
        &self.ids
    }
}

impl Drop for LotGuard<'_> {
    fn drop(&mut self) {
        let mut held = self.locks.held.lock();
        for id in &self.ids {
            held.remove(id);
        }
        drop(held);
        self.locks.released.notify_all();
    }
}

//! Storage quota monitor.
//!
//! Usage is seeded from the progress state at startup (never from a tree
//! walk) and updated incrementally as items commit. The check and the
//! commit are one atomic decision: `try_commit` either reserves the bytes
//! or reports the ceiling would be crossed.

use std::sync::Mutex;

/// Fraction of the ceiling at which a non-fatal advisory is raised.
const WARNING_FRACTION: f64 = 0.9;

/// Outcome of a commit-time reservation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuotaVerdict {
    /// Bytes reserved; caller must `release` them if the commit then fails.
    Reserved,
    /// Recording these bytes would cross the ceiling; nothing was reserved.
    WouldExceed,
}

/// Tracks cumulative committed bytes against a configured ceiling.
/// Shared across workers; all mutation happens under one lock.
#[derive(Debug)]
pub struct QuotaMonitor {
    ceiling: u64,
    used: Mutex<u64>,
}

impl QuotaMonitor {
    /// `initial_used` comes from the progress state's cumulative bytes.
    pub fn new(ceiling: u64, initial_used: u64) -> Self {
        Self {
            ceiling,
            used: Mutex::new(initial_used),
        }
    }

    pub fn ceiling(&self) -> u64 {
        self.ceiling
    }

    pub fn current_usage(&self) -> u64 {
        *self.used.lock().unwrap()
    }

    /// True once the ceiling is reached; the scheduler stops dispatching.
    pub fn reached(&self) -> bool {
        self.current_usage() >= self.ceiling
    }

    /// True if committing `additional` bytes would cross the ceiling.
    pub fn would_exceed(&self, additional: u64) -> bool {
        self.current_usage().saturating_add(additional) > self.ceiling
    }

    /// Atomically check-and-reserve `bytes`. On `Reserved` the usage counter
    /// already includes them; call `release` to roll back if the filesystem
    /// commit fails afterwards.
    pub fn try_commit(&self, bytes: u64) -> QuotaVerdict {
        let mut used = self.used.lock().unwrap();
        if used.saturating_add(bytes) > self.ceiling {
            return QuotaVerdict::WouldExceed;
        }
        *used += bytes;
        QuotaVerdict::Reserved
    }

    /// Roll back a reservation made by `try_commit`.
    pub fn release(&self, bytes: u64) {
        let mut used = self.used.lock().unwrap();
        *used = used.saturating_sub(bytes);
    }

    /// True once usage crosses the warning threshold (90% of the ceiling).
    pub fn warning_crossed(&self) -> bool {
        self.current_usage() as f64 >= self.ceiling as f64 * WARNING_FRACTION
    }

    /// Usage as a fraction of the ceiling, for status output.
    pub fn usage_fraction(&self) -> f64 {
        if self.ceiling == 0 {
            return 1.0;
        }
        self.current_usage() as f64 / self.ceiling as f64
    }
}

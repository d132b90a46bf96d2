//! Types read from and written to the state database.

use std::collections::HashSet;

/// Terminal state of an item in the ledger. An id has at most one row, so
/// it is never both committed and failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemState {
    Committed,
    Failed,
}

impl ItemState {
    pub fn as_str(self) -> &'static str {
        match self {
            ItemState::Committed => "committed",
            ItemState::Failed => "failed",
        }
    }
}

/// In-memory snapshot of the persisted progress, loaded once at startup.
/// `Default` is the zero-value state for a first run.
#[derive(Debug, Clone, Default)]
pub struct ProgressState {
    /// Last fully completed page of the descending traversal.
    pub last_page: Option<u64>,
    /// Ids with a committed bundle on disk.
    pub committed: HashSet<String>,
    /// Ids that permanently failed (not auto-retried across runs).
    pub failed: HashSet<String>,
    /// Cumulative committed bytes; seeds the quota monitor.
    pub total_bytes: u64,
    /// Unix seconds of the last mutation, 0 when never persisted.
    pub updated_at: i64,
}

impl ProgressState {
    /// True if the item should be skipped on this run.
    pub fn is_done(&self, id: &str, retry_failed: bool) -> bool {
        if self.committed.contains(id) {
            return true;
        }
        !retry_failed && self.failed.contains(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_state_skips_nothing() {
        let state = ProgressState::default();
        assert!(state.last_page.is_none());
        assert_eq!(state.total_bytes, 0);
        assert!(!state.is_done("100", false));
    }

    #[test]
    fn failed_items_skipped_unless_retry_requested() {
        let mut state = ProgressState::default();
        state.failed.insert("100".to_string());
        state.committed.insert("200".to_string());
        assert!(state.is_done("100", false));
        assert!(!state.is_done("100", true));
        assert!(state.is_done("200", true), "committed is always done");
    }
}

//! Run summary reported to the caller; never a silent drop.

/// How the run ended. Quota exhaustion is a controlled stop, not an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// All offered items reached a terminal state.
    Completed,
    /// The storage ceiling stopped dispatch; in-flight items finished.
    QuotaStopped,
}

/// One permanently failed item with its recorded reason.
#[derive(Debug, Clone)]
pub struct FailedItem {
    pub id: String,
    pub reason: String,
}

/// Counts for one run, printed by the CLI and returned to callers.
#[derive(Debug, Default)]
pub struct RunSummary {
    pub committed: u32,
    pub failed: Vec<FailedItem>,
    /// Items not started (or abandoned before commit) because of the quota.
    pub quota_stopped: u32,
    /// Items skipped because a previous run already resolved them.
    pub skipped: u32,
    pub bytes_added: u64,
    /// True once usage crossed the 90% warning threshold.
    pub quota_warning: bool,
    pub outcome: RunOutcome,
}

impl Default for RunOutcome {
    fn default() -> Self {
        RunOutcome::Completed
    }
}

impl RunSummary {
    /// Process exit code: 0 normal, 2 quota-stopped (fatal errors exit 1
    /// through the error path before a summary exists).
    pub fn exit_code(&self) -> i32 {
        match self.outcome {
            RunOutcome::Completed => 0,
            RunOutcome::QuotaStopped => 2,
        }
    }
}

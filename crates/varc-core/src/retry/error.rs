//! Per-item error type spanning the whole lifecycle of one attempt.

use crate::backend::TransportError;
use crate::validate::RejectReason;
use std::fmt;

/// Error from one processing attempt of one item. Contained to that item's
/// attempt record; never aborts the batch.
#[derive(Debug)]
pub enum ItemError {
    /// Transport failed (network, HTTP status, accelerator tool).
    Transport(TransportError),
    /// Downloaded file rejected by validation.
    Validation(RejectReason),
    /// Filesystem failure during commit (create dir, rename, metadata
    /// write). Item-fatal; repeated across items it becomes run-fatal.
    Storage(std::io::Error),
}

impl ItemError {
    /// Stable reason string recorded in the failure ledger.
    pub fn reason(&self) -> String {
        match self {
            ItemError::Transport(e) => format!("transport: {}", e),
            ItemError::Validation(r) => r.as_str().to_string(),
            ItemError::Storage(e) => format!("storage: {}", e),
        }
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, ItemError::Validation(_))
    }

    pub fn is_storage(&self) -> bool {
        matches!(self, ItemError::Storage(_))
            || matches!(self, ItemError::Transport(TransportError::Storage(_)))
    }
}

impl fmt::Display for ItemError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ItemError::Transport(e) => write!(f, "{}", e),
            ItemError::Validation(r) => write!(f, "{}", r),
            ItemError::Storage(e) => write!(f, "storage: {}", e),
        }
    }
}

impl std::error::Error for ItemError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ItemError::Transport(e) => Some(e),
            ItemError::Validation(r) => Some(r),
            ItemError::Storage(e) => Some(e),
        }
    }
}

impl From<TransportError> for ItemError {
    fn from(e: TransportError) -> Self {
        ItemError::Transport(e)
    }
}

impl From<RejectReason> for ItemError {
    fn from(r: RejectReason) -> Self {
        ItemError::Validation(r)
    }
}

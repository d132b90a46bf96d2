//! Run-level stop control.
//!
//! When a stop is requested (ctrl-c, shutdown), the scheduler stops pulling
//! new items; workers already in flight run their current item to a terminal
//! state (committed, failed, or cleaned up) so no partial bundle is left.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Shared stop flag for one run. Clone freely; all clones observe the same flag.
#[derive(Debug, Clone, Default)]
pub struct RunControl {
    stop: Arc<AtomicBool>,
}

impl RunControl {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request a graceful stop. Idempotent.
    pub fn request_stop(&self) {
        self.stop.store(true, Ordering::Relaxed);
    }

    /// True once a stop has been requested. Checked by the dispatcher before
    /// offering each new item.
    pub fn stop_requested(&self) -> bool {
        self.stop.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stop_is_shared_across_clones() {
        let ctl = RunControl::new();
        let other = ctl.clone();
        assert!(!other.stop_requested());
        ctl.request_stop();
        assert!(other.stop_requested());
    }
}

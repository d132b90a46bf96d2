//! Per-identifier mutual exclusion.
//!
//! Two workers must never process the same id concurrently (duplicate feed
//! entries, resume re-scans racing a batch still in flight). Claims are
//! released by RAII guard drop, so a panicking task cannot leak its id.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

#[derive(Debug, Default)]
pub(super) struct InFlight {
    ids: Mutex<HashSet<String>>,
}

impl InFlight {
    pub(super) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Claim `id` for exclusive processing. None if another worker holds it.
    pub(super) fn try_claim(registry: &Arc<Self>, id: &str) -> Option<InFlightGuard> {
        let mut ids = registry.ids.lock().unwrap();
        if !ids.insert(id.to_string()) {
            return None;
        }
        Some(InFlightGuard {
            registry: Arc::clone(registry),
            id: id.to_string(),
        })
    }
}

/// Releases the claim when dropped.
pub(super) struct InFlightGuard {
    registry: Arc<InFlight>,
    id: String,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.registry.ids.lock().unwrap().remove(&self.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn claim_is_exclusive_until_dropped() {
        let registry = InFlight::new();
        let guard = InFlight::try_claim(&registry, "100").expect("first claim");
        assert!(InFlight::try_claim(&registry, "100").is_none());
        assert!(InFlight::try_claim(&registry, "200").is_some());
        drop(guard);
        assert!(InFlight::try_claim(&registry, "100").is_some());
    }
}

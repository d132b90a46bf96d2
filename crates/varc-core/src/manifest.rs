//! Manifest batches: ordered groups of items derived from one pass over the
//! source feed, persisted so an interrupted batch can be replayed without
//! re-deriving it.

use crate::feed::MediaItem;

/// Per-item status inside a batch. Transitions are monotonic:
/// Pending → Committed | Failed, never reversed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemStatus {
    Pending,
    Committed,
    Failed,
}

impl ItemStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ItemStatus::Pending => "pending",
            ItemStatus::Committed => "committed",
            ItemStatus::Failed => "failed",
        }
    }

    pub fn from_str(s: &str) -> Self {
        match s {
            "committed" => ItemStatus::Committed,
            "failed" => ItemStatus::Failed,
            _ => ItemStatus::Pending,
        }
    }

    /// True for Committed/Failed; terminal states never change again.
    pub fn is_terminal(self) -> bool {
        !matches!(self, ItemStatus::Pending)
    }
}

/// One entry of a persisted batch: the item plus its current status.
#[derive(Debug, Clone)]
pub struct BatchEntry {
    pub item: MediaItem,
    pub status: ItemStatus,
}

/// A persisted, ordered batch of items. Order reflects descending page
/// traversal of the feed; the scheduler offers items in this order.
#[derive(Debug, Clone)]
pub struct ManifestBatch {
    pub id: i64,
    pub entries: Vec<BatchEntry>,
}

impl ManifestBatch {
    /// Items still pending, in manifest order.
    pub fn pending(&self) -> impl Iterator<Item = &MediaItem> {
        self.entries
            .iter()
            .filter(|e| e.status == ItemStatus::Pending)
            .map(|e| &e.item)
    }

    /// Distinct pages covered by this batch, in traversal (descending) order.
    pub fn pages(&self) -> Vec<u64> {
        let mut pages: Vec<u64> = self.entries.iter().map(|e| e.item.page).collect();
        pages.sort_unstable_by(|a, b| b.cmp(a));
        pages.dedup();
        pages
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(id: &str, page: u64) -> MediaItem {
        MediaItem {
            id: id.to_string(),
            video_url: format!("http://h/v/{id}.mp4"),
            thumb_url: format!("http://h/t/{id}.jpg"),
            metadata: serde_json::json!({}),
            page,
        }
    }

    #[test]
    fn status_string_mapping() {
        for s in [ItemStatus::Pending, ItemStatus::Committed, ItemStatus::Failed] {
            assert_eq!(ItemStatus::from_str(s.as_str()), s);
        }
        assert_eq!(ItemStatus::from_str("garbage"), ItemStatus::Pending);
        assert!(ItemStatus::Committed.is_terminal());
        assert!(ItemStatus::Failed.is_terminal());
        assert!(!ItemStatus::Pending.is_terminal());
    }

    #[test]
    fn pending_preserves_manifest_order() {
        let batch = ManifestBatch {
            id: 1,
            entries: vec![
                BatchEntry { item: item("a", 5), status: ItemStatus::Committed },
                BatchEntry { item: item("b", 5), status: ItemStatus::Pending },
                BatchEntry { item: item("c", 4), status: ItemStatus::Pending },
            ],
        };
        let ids: Vec<&str> = batch.pending().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, ["b", "c"]);
    }

    #[test]
    fn pages_descending_and_deduped() {
        let batch = ManifestBatch {
            id: 1,
            entries: vec![
                BatchEntry { item: item("a", 5), status: ItemStatus::Pending },
                BatchEntry { item: item("b", 4), status: ItemStatus::Pending },
                BatchEntry { item: item("c", 5), status: ItemStatus::Pending },
            ],
        };
        assert_eq!(batch.pages(), vec![5, 4]);
    }
}

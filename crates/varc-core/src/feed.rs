//! Source feed boundary.
//!
//! The core never fetches or parses listing pages itself; it consumes
//! `MediaItem`s per page from a `SourceFeed`. The shipped implementation
//! reads a feed file (page number → item array) produced by an external
//! scraper.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// One unit of work: a stable identifier plus the URLs and metadata needed
/// to materialize a three-file bundle. Immutable once created by the feed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaItem {
    /// Stable unique identifier; also the directory name and filename stem.
    pub id: String,
    /// URL of the video asset.
    pub video_url: String,
    /// URL of the thumbnail asset.
    pub thumb_url: String,
    /// Opaque metadata mapping, written through to `<id>.json` unmodified.
    #[serde(default)]
    pub metadata: serde_json::Value,
    /// Listing page this item originated from.
    #[serde(default)]
    pub page: u64,
}

/// A lazy, finite, restartable sequence of items per listing page.
pub trait SourceFeed {
    /// Items discovered on `page`. An empty vec means the page has no items
    /// (end of traversal). Page numbers are visited in descending order.
    fn page(&self, page: u64) -> Result<Vec<MediaItem>>;

    /// Highest page the feed knows about; the default starting point for a
    /// first run with no explicit start page.
    fn last_page(&self) -> Option<u64> {
        None
    }
}

#[derive(Debug, Deserialize)]
struct FeedFile {
    /// Page number (as string key, JSON object keys) → items on that page.
    pages: BTreeMap<String, Vec<MediaItem>>,
}

/// Feed backed by a JSON file: `{ "pages": { "412": [ {...}, ... ] } }`.
#[derive(Debug)]
pub struct JsonFeed {
    pages: BTreeMap<u64, Vec<MediaItem>>,
}

impl JsonFeed {
    pub fn load(path: &Path) -> Result<Self> {
        let data = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read feed file: {}", path.display()))?;
        let raw: FeedFile = serde_json::from_str(&data)
            .with_context(|| format!("malformed feed file: {}", path.display()))?;
        let mut pages = BTreeMap::new();
        for (key, mut items) in raw.pages {
            let page: u64 = key
                .parse()
                .with_context(|| format!("non-numeric page key in feed: {:?}", key))?;
            for item in &mut items {
                item.page = page;
            }
            pages.insert(page, items);
        }
        Ok(Self { pages })
    }
}

impl SourceFeed for JsonFeed {
    fn page(&self, page: u64) -> Result<Vec<MediaItem>> {
        Ok(self.pages.get(&page).cloned().unwrap_or_default())
    }

    fn last_page(&self) -> Option<u64> {
        self.pages.keys().next_back().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_feed(json: &str) -> tempfile::NamedTempFile {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(json.as_bytes()).unwrap();
        f
    }

    #[test]
    fn loads_pages_and_stamps_page_numbers() {
        let f = write_feed(
            r#"{
                "pages": {
                    "412": [
                        {"id": "100", "video_url": "http://h/v/100.mp4",
                         "thumb_url": "http://h/t/100.jpg",
                         "metadata": {"title": "a"}}
                    ],
                    "411": []
                }
            }"#,
        );
        let feed = JsonFeed::load(f.path()).unwrap();
        assert_eq!(feed.last_page(), Some(412));
        let items = feed.page(412).unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].id, "100");
        assert_eq!(items[0].page, 412);
        assert!(feed.page(411).unwrap().is_empty());
        assert!(feed.page(999).unwrap().is_empty());
    }

    #[test]
    fn rejects_non_numeric_page_keys() {
        let f = write_feed(r#"{"pages": {"abc": []}}"#);
        assert!(JsonFeed::load(f.path()).is_err());
    }
}

//! Disk layout and the bundle commit protocol.
//!
//! Downloads land in `<root>/.staging/` with a `.part` suffix until the
//! video validates. Commit then creates `<root>/<id>/` and moves/writes the
//! three bundle files; any failure after directory creation rolls the whole
//! directory back so no partially populated bundle is ever observable.

use anyhow::{Context, Result};
use std::io;
use std::path::{Path, PathBuf};

use crate::feed::MediaItem;
use crate::validate::{self, AssetRole, Limits};

/// Staging directory name under the storage root.
pub const STAGING_DIR: &str = ".staging";

/// Temporary file suffix used before files move into a bundle.
pub const TEMP_SUFFIX: &str = ".part";

/// Thumbnail extensions accepted in a bundle; the first is the default.
const THUMB_EXTENSIONS: [&str; 4] = ["jpg", "jpeg", "png", "webp"];

/// Final paths of one item's bundle.
#[derive(Debug, Clone)]
pub struct BundlePaths {
    pub dir: PathBuf,
    pub video: PathBuf,
    pub thumb: PathBuf,
    pub metadata: PathBuf,
}

/// Derive the thumbnail extension from its URL path; defaults to jpg.
pub fn thumb_extension(thumb_url: &str) -> &'static str {
    let ext = url::Url::parse(thumb_url)
        .ok()
        .and_then(|u| {
            Path::new(u.path())
                .extension()
                .map(|e| e.to_string_lossy().to_ascii_lowercase())
        })
        .unwrap_or_default();
    THUMB_EXTENSIONS
        .iter()
        .find(|known| **known == ext)
        .copied()
        .unwrap_or(THUMB_EXTENSIONS[0])
}

/// Bundle layout for an item: `<root>/<id>/{<id>.mp4, <id>.<ext>, <id>.json}`.
pub fn bundle_paths(root: &Path, item: &MediaItem) -> BundlePaths {
    let dir = root.join(&item.id);
    let ext = thumb_extension(&item.thumb_url);
    BundlePaths {
        video: dir.join(format!("{}.mp4", item.id)),
        thumb: dir.join(format!("{}.{}", item.id, ext)),
        metadata: dir.join(format!("{}.json", item.id)),
        dir,
    }
}

pub fn staging_dir(root: &Path) -> PathBuf {
    root.join(STAGING_DIR)
}

/// Staged temp path for one asset: `<root>/.staging/<filename>.part`.
pub fn staging_path(root: &Path, filename: &str) -> PathBuf {
    staging_dir(root).join(format!("{}{}", filename, TEMP_SUFFIX))
}

/// Create the storage root and staging directory if absent.
pub fn ensure_layout(root: &Path) -> Result<()> {
    std::fs::create_dir_all(staging_dir(root))
        .with_context(|| format!("failed to create storage root: {}", root.display()))?;
    Ok(())
}

/// Remove an item's staged temp files, ignoring absence.
pub fn clear_staging(root: &Path, item: &MediaItem) {
    let ext = thumb_extension(&item.thumb_url);
    for name in [
        format!("{}.mp4", item.id),
        format!("{}.{}", item.id, ext),
    ] {
        let _ = std::fs::remove_file(staging_path(root, &name));
    }
}

/// Serialize the metadata record exactly as it will land on disk, so its
/// size can participate in the quota decision before any file moves.
pub fn render_metadata(item: &MediaItem) -> Result<Vec<u8>> {
    let mut rendered = serde_json::to_vec_pretty(&item.metadata)
        .with_context(|| format!("metadata for {} is not serializable", item.id))?;
    rendered.push(b'\n');
    Ok(rendered)
}

/// Commit a validated bundle: create the directory, move the staged video
/// and thumbnail in, write the metadata record. On any failure the partial
/// directory is removed and the error returned; staged files that were
/// already moved are lost with it, so the caller retries the whole item.
pub fn commit_bundle(
    paths: &BundlePaths,
    staged_video: &Path,
    staged_thumb: &Path,
    metadata: &[u8],
) -> io::Result<()> {
    std::fs::create_dir_all(&paths.dir)?;
    let result = (|| -> io::Result<()> {
        std::fs::rename(staged_video, &paths.video)?;
        std::fs::rename(staged_thumb, &paths.thumb)?;
        std::fs::write(&paths.metadata, metadata)?;
        Ok(())
    })();
    if result.is_err() {
        let _ = std::fs::remove_dir_all(&paths.dir);
    }
    result
}

/// If the bundle already exists fully populated and valid, return its total
/// byte size. Covers the crash window between filesystem commit and durable
/// checkpoint: re-delivery becomes a record-only no-op.
pub fn existing_bundle_size(root: &Path, item: &MediaItem, limits: &Limits) -> Option<u64> {
    complete_bundle_size(root, &item.id, limits)
}

/// Total byte size of the bundle for `id` if it is fully populated and
/// valid, else None. Also used by the audit scan, which only has directory
/// names to go on.
pub fn complete_bundle_size(root: &Path, id: &str, limits: &Limits) -> Option<u64> {
    let dir = root.join(id);
    if !dir.is_dir() {
        return None;
    }
    let video_bytes =
        validate::validate_asset(&dir.join(format!("{id}.mp4")), AssetRole::Video, limits).ok()?;
    // The thumbnail may have landed under any accepted extension.
    let thumb_bytes = THUMB_EXTENSIONS
        .iter()
        .map(|ext| dir.join(format!("{id}.{ext}")))
        .find_map(|p| validate::validate_asset(&p, AssetRole::Thumbnail, limits).ok())?;
    let meta_bytes = std::fs::metadata(dir.join(format!("{id}.json")))
        .ok()
        .map(|m| m.len())?;
    if meta_bytes == 0 {
        return None;
    }
    Some(video_bytes + thumb_bytes + meta_bytes)
}

//! Downloaded-file validation.
//!
//! Cheap structural checks, short-circuiting on the first failure: existence,
//! minimum size per role, and for videos an ISO-BMFF signature check plus a
//! lightweight playability probe (top-level `moov` + `mdat` present). No
//! decoding is attempted.

mod boxes;


use std::path::Path;
use thiserror::Error;

/// Which bundle file a downloaded asset is destined to become.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssetRole {
    Video,
    Thumbnail,
}

/// Why a downloaded file was rejected. The scheduler uses the reason to
/// decide whether a re-download is worthwhile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum RejectReason {
    #[error("file missing")]
    Missing,
    #[error("file is empty")]
    Empty,
    #[error("file too small: {size} bytes (minimum {min})")]
    TooSmall { size: u64, min: u64 },
    #[error("leading bytes are not a valid container signature")]
    BadMagic,
    #[error("container structure incomplete (unplayable)")]
    Unplayable,
}

impl RejectReason {
    /// Stable string form recorded in the failure ledger.
    pub fn as_str(&self) -> &'static str {
        match self {
            RejectReason::Missing => "missing-file",
            RejectReason::Empty => "empty-file",
            RejectReason::TooSmall { .. } => "size-too-small",
            RejectReason::BadMagic => "bad-magic-bytes",
            RejectReason::Unplayable => "unplayable",
        }
    }
}

/// Size minimums and switches, taken from config once per run.
#[derive(Debug, Clone, Copy)]
pub struct Limits {
    pub min_video_bytes: u64,
    pub min_thumb_bytes: u64,
    /// When false, only existence/non-empty checks run.
    pub structural: bool,
}

impl Limits {
    pub fn from_config(cfg: &crate::config::VarcConfig) -> Self {
        Self {
            min_video_bytes: cfg.min_video_bytes,
            min_thumb_bytes: cfg.min_thumb_bytes,
            structural: cfg.validate_downloads,
        }
    }

    fn min_for(&self, role: AssetRole) -> u64 {
        match role {
            AssetRole::Video => self.min_video_bytes,
            AssetRole::Thumbnail => self.min_thumb_bytes,
        }
    }
}

/// Validate a downloaded file for its role. Returns the measured byte size
/// on pass, or the first failing check's reason.
pub fn validate_asset(path: &Path, role: AssetRole, limits: &Limits) -> Result<u64, RejectReason> {
    let meta = match std::fs::metadata(path) {
        Ok(m) if m.is_file() => m,
        _ => return Err(RejectReason::Missing),
    };
    let size = meta.len();
    if size == 0 {
        return Err(RejectReason::Empty);
    }
    if !limits.structural {
        return Ok(size);
    }
    let min = limits.min_for(role);
    if size < min {
        return Err(RejectReason::TooSmall { size, min });
    }
    if role == AssetRole::Video {
        boxes::check_signature(path)?;
        boxes::check_playable(path)?;
    }
    Ok(size)
}

#[cfg(test)]
mod tests {
    use super::*;
    use super::boxes_test_support::minimal_mp4;
    use std::io::Write;

    fn limits() -> Limits {
        Limits {
            min_video_bytes: 64,
            min_thumb_bytes: 10,
            structural: true,
        }
    }

    fn write_file(dir: &tempfile::TempDir, name: &str, data: &[u8]) -> std::path::PathBuf {
        let path = dir.path().join(name);
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(data).unwrap();
        path
    }

    #[test]
    fn missing_file_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nope.mp4");
        assert_eq!(
            validate_asset(&path, AssetRole::Video, &limits()),
            Err(RejectReason::Missing)
        );
    }

    #[test]
    fn empty_file_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(&dir, "v.mp4", b"");
        assert_eq!(
            validate_asset(&path, AssetRole::Video, &limits()),
            Err(RejectReason::Empty)
        );
    }

    #[test]
    fn undersized_video_rejected_with_sizes() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(&dir, "v.mp4", &[0u8; 32]);
        assert_eq!(
            validate_asset(&path, AssetRole::Video, &limits()),
            Err(RejectReason::TooSmall { size: 32, min: 64 })
        );
    }

    #[test]
    fn corrupted_header_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(&dir, "v.mp4", &[0xFFu8; 128]);
        assert_eq!(
            validate_asset(&path, AssetRole::Video, &limits()),
            Err(RejectReason::BadMagic)
        );
    }

    #[test]
    fn well_formed_video_accepted() {
        let dir = tempfile::tempdir().unwrap();
        let body = minimal_mp4(256);
        let path = write_file(&dir, "v.mp4", &body);
        let size = validate_asset(&path, AssetRole::Video, &limits()).unwrap();
        assert_eq!(size, body.len() as u64);
    }

    #[test]
    fn thumbnail_checks_size_only() {
        let dir = tempfile::tempdir().unwrap();
        // Not a real image; thumbnails get no structural check.
        let path = write_file(&dir, "t.jpg", &[1u8; 32]);
        assert!(validate_asset(&path, AssetRole::Thumbnail, &limits()).is_ok());
        let small = write_file(&dir, "s.jpg", &[1u8; 4]);
        assert_eq!(
            validate_asset(&small, AssetRole::Thumbnail, &limits()),
            Err(RejectReason::TooSmall { size: 4, min: 10 })
        );
    }

    #[test]
    fn disabled_validation_only_requires_non_empty() {
        let dir = tempfile::tempdir().unwrap();
        let mut lim = limits();
        lim.structural = false;
        let path = write_file(&dir, "v.mp4", &[0xFFu8; 8]);
        assert!(validate_asset(&path, AssetRole::Video, &lim).is_ok());
    }
}

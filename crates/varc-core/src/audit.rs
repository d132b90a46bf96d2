//! Offline audit of the storage root: validation-only scan and cleanup of
//! incomplete bundle directories.
//!
//! Both walk the committed tree only; the `.staging` directory is handled
//! separately (stale `.part` files are deleted during cleanup). Directories
//! containing temp-suffixed files are treated as in progress and skipped.

use anyhow::{Context, Result};
use std::path::Path;

use crate::storage::{self, STAGING_DIR, TEMP_SUFFIX};
use crate::validate::Limits;

/// Result of a validation-only scan.
#[derive(Debug, Default)]
pub struct ScanReport {
    pub total_dirs: usize,
    pub complete: usize,
    pub incomplete: usize,
    pub in_progress: usize,
    /// Total bytes of complete bundles.
    pub complete_bytes: u64,
    /// Ids of incomplete bundles, for operator follow-up.
    pub incomplete_ids: Vec<String>,
}

/// Result of a cleanup pass.
#[derive(Debug, Default)]
pub struct CleanupReport {
    pub dirs_checked: usize,
    pub dirs_removed: usize,
    pub staging_files_removed: usize,
    pub bytes_freed: u64,
    pub skipped_in_progress: usize,
}

fn dir_has_temp_files(dir: &Path) -> bool {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return false;
    };
    entries.flatten().any(|e| {
        e.file_name()
            .to_string_lossy()
            .ends_with(TEMP_SUFFIX)
    })
}

fn dir_size(dir: &Path) -> u64 {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return 0;
    };
    entries
        .flatten()
        .filter_map(|e| e.metadata().ok())
        .filter(|m| m.is_file())
        .map(|m| m.len())
        .sum()
}

fn bundle_dirs(root: &Path) -> Result<Vec<std::fs::DirEntry>> {
    let mut dirs: Vec<_> = std::fs::read_dir(root)
        .with_context(|| format!("cannot read storage root: {}", root.display()))?
        .flatten()
        .filter(|e| e.path().is_dir() && e.file_name().to_string_lossy() != STAGING_DIR)
        .collect();
    dirs.sort_by_key(|e| e.file_name());
    Ok(dirs)
}

/// Validate every bundle directory under `root` without touching anything.
pub fn scan(root: &Path, limits: &Limits) -> Result<ScanReport> {
    let mut report = ScanReport::default();
    for entry in bundle_dirs(root)? {
        let id = entry.file_name().to_string_lossy().to_string();
        let dir = entry.path();
        report.total_dirs += 1;
        if dir_has_temp_files(&dir) {
            report.in_progress += 1;
            continue;
        }
        match storage::complete_bundle_size(root, &id, limits) {
            Some(bytes) => {
                report.complete += 1;
                report.complete_bytes += bytes;
            }
            None => {
                report.incomplete += 1;
                report.incomplete_ids.push(id);
            }
        }
    }
    Ok(report)
}

/// Delete incomplete bundle directories and stale staging temps. Complete
/// bundles and directories with in-flight temp files are left alone.
pub fn cleanup_incomplete(root: &Path, limits: &Limits) -> Result<CleanupReport> {
    let mut report = CleanupReport::default();

    for entry in bundle_dirs(root)? {
        let id = entry.file_name().to_string_lossy().to_string();
        let dir = entry.path();
        report.dirs_checked += 1;
        if dir_has_temp_files(&dir) {
            report.skipped_in_progress += 1;
            tracing::info!(id = %id, "skipping cleanup: download in progress");
            continue;
        }
        if storage::complete_bundle_size(root, &id, limits).is_some() {
            continue;
        }
        let freed = dir_size(&dir);
        std::fs::remove_dir_all(&dir)
            .with_context(|| format!("failed to remove incomplete bundle: {}", dir.display()))?;
        report.dirs_removed += 1;
        report.bytes_freed += freed;
        tracing::info!(id = %id, freed, "removed incomplete bundle");
    }

    let staging = storage::staging_dir(root);
    if staging.is_dir() {
        for entry in std::fs::read_dir(&staging)?.flatten() {
            let path = entry.path();
            if path.is_file() {
                let freed = entry.metadata().map(|m| m.len()).unwrap_or(0);
                std::fs::remove_file(&path).with_context(|| {
                    format!("failed to remove staging file: {}", path.display())
                })?;
                report.staging_files_removed += 1;
                report.bytes_freed += freed;
            }
        }
    }

    Ok(report)
}

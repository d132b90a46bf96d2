//! `varc cleanup` – delete incomplete bundles and stale staging files.

use anyhow::Result;
use varc_core::audit;
use varc_core::config::VarcConfig;
use varc_core::validate::Limits;

pub fn run_cleanup(cfg: &VarcConfig) -> Result<()> {
    let report = audit::cleanup_incomplete(&cfg.storage_root, &Limits::from_config(cfg))?;

    println!(
        "Checked {} directories: removed {}, skipped {} in progress, cleared {} staging files ({:.1} MiB freed)",
        report.dirs_checked,
        report.dirs_removed,
        report.skipped_in_progress,
        report.staging_files_removed,
        report.bytes_freed as f64 / 1_048_576.0
    );
    Ok(())
}

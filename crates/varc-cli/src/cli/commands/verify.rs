//! `varc verify` – validation-only scan of existing bundles.

use anyhow::Result;
use varc_core::audit;
use varc_core::config::VarcConfig;
use varc_core::validate::Limits;

pub fn run_verify(cfg: &VarcConfig) -> Result<()> {
    let report = audit::scan(&cfg.storage_root, &Limits::from_config(cfg))?;

    println!("Scanned {} bundle directories:", report.total_dirs);
    println!("  complete:    {} ({:.1} MiB)", report.complete, report.complete_bytes as f64 / 1_048_576.0);
    println!("  incomplete:  {}", report.incomplete);
    println!("  in progress: {}", report.in_progress);
    for id in &report.incomplete_ids {
        println!("  incomplete bundle: {id}");
    }
    Ok(())
}

//! `varc status` – show progress, ledger counts, and quota usage.

use anyhow::Result;
use varc_core::config::VarcConfig;
use varc_core::state_db::StateDb;

pub async fn run_status(db: &StateDb, cfg: &VarcConfig) -> Result<()> {
    let progress = db.load_progress().await?;
    let ceiling = cfg.max_storage_bytes();
    let pct = if ceiling > 0 {
        progress.total_bytes as f64 / ceiling as f64 * 100.0
    } else {
        0.0
    };

    match progress.last_page {
        Some(page) => println!("Page cursor: {page} (next run continues at {})", page.saturating_sub(1)),
        None => println!("Page cursor: none (no page completed yet)"),
    }
    println!("Committed items: {}", progress.committed.len());
    println!("Failed items:    {}", progress.failed.len());
    if progress.updated_at > 0 {
        println!("Last update:     {} (unix)", progress.updated_at);
    }
    println!(
        "Storage: {:.2} / {} GiB ({:.1}%)",
        progress.total_bytes as f64 / 1_073_741_824.0,
        cfg.max_storage_gb,
        pct
    );

    let failures = db.failure_reasons().await?;
    if !failures.is_empty() {
        println!("Recorded failures:");
        for (id, reason) in failures {
            println!("  {id}: {reason}");
        }
    }
    Ok(())
}

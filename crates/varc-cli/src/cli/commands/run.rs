//! `varc run` – ingest batches of feed pages through the pipeline.

use anyhow::{Context, Result};
use std::path::Path;
use varc_core::config::VarcConfig;
use varc_core::control::RunControl;
use varc_core::feed::JsonFeed;
use varc_core::scheduler::{self, RunOutcome, RunRequest};
use varc_core::state_db::StateDb;

pub async fn run_ingest(
    db: &StateDb,
    cfg: &VarcConfig,
    feed_path: &Path,
    start_page: Option<u64>,
    batches: u32,
    pages: Option<u32>,
    retry_failed: bool,
) -> Result<i32> {
    let feed = JsonFeed::load(feed_path)
        .with_context(|| format!("cannot load feed: {}", feed_path.display()))?;

    let control = RunControl::new();
    let ctrl_c = control.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("ctrl-c received, stopping after in-flight items");
            ctrl_c.request_stop();
        }
    });

    let request = RunRequest {
        start_page,
        batches,
        pages_per_batch: pages,
        retry_failed,
    };
    let summary = scheduler::run_batches(db, cfg, &feed, &request, control).await?;

    println!(
        "Run finished: {} committed, {} failed, {} quota-stopped, {} skipped ({:.1} MiB added)",
        summary.committed,
        summary.failed.len(),
        summary.quota_stopped,
        summary.skipped,
        summary.bytes_added as f64 / 1_048_576.0
    );
    for failed in &summary.failed {
        println!("  failed {}: {}", failed.id, failed.reason);
    }
    if summary.quota_warning {
        println!("Warning: storage usage is above 90% of the ceiling.");
    }
    if summary.outcome == RunOutcome::QuotaStopped {
        println!("Stopped: storage ceiling reached; raise max_storage_gb to continue.");
    }

    Ok(summary.exit_code())
}

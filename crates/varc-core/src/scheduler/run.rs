//! Batch loop: derive batches from the feed, replay interrupted ones, and
//! drain each through the bounded worker pool.

use anyhow::{Context, Result};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;

use crate::backend::Backend;
use crate::config::{self, VarcConfig};
use crate::control::RunControl;
use crate::feed::{MediaItem, SourceFeed};
use crate::manifest::ManifestBatch;
use crate::quota::QuotaMonitor;
use crate::state_db::StateDb;
use crate::storage;

use super::item::{process_item, ItemOutcome, WorkerCtx};
use super::summary::{FailedItem, RunOutcome, RunSummary};

/// Parameters of one ingestion run.
#[derive(Debug, Clone, Default)]
pub struct RunRequest {
    /// Page to start the descending traversal at. None resumes from the
    /// cursor, falling back to the feed's highest page.
    pub start_page: Option<u64>,
    /// Number of batches to process this run.
    pub batches: u32,
    /// Pages per batch; None uses the configured default.
    pub pages_per_batch: Option<u32>,
    /// Re-offer permanently failed items (off by default).
    pub retry_failed: bool,
}

/// Run up to `request.batches` manifest batches. One batch fully drains
/// before the next is derived; an interrupted batch from a previous run is
/// replayed first. Per-item failures are contained; only systemic errors
/// (storage unavailable, checkpoint unwritable) abort with `Err`.
pub async fn run_batches(
    db: &StateDb,
    cfg: &VarcConfig,
    feed: &dyn SourceFeed,
    request: &RunRequest,
    control: RunControl,
) -> Result<RunSummary> {
    config::validate(cfg)?;
    storage::ensure_layout(&cfg.storage_root)?;

    let progress = db.load_progress().await?;
    let quota = QuotaMonitor::new(cfg.max_storage_bytes(), progress.total_bytes);
    let mut summary = RunSummary::default();

    if quota.reached() {
        tracing::warn!(
            used = quota.current_usage(),
            ceiling = quota.ceiling(),
            "storage ceiling already reached, nothing dispatched"
        );
        summary.outcome = RunOutcome::QuotaStopped;
        summary.quota_warning = true;
        return Ok(summary);
    }

    let backend = Backend::from_config(cfg)?;
    tracing::info!(
        backend = backend.name(),
        parallel = cfg.parallel_downloads,
        ceiling = quota.ceiling(),
        used = quota.current_usage(),
        "starting run"
    );
    let ctx = Arc::new(WorkerCtx::new(
        cfg,
        cfg.storage_root.clone(),
        backend,
        quota,
        db.clone(),
        control.clone(),
    ));

    // A crash mid-batch leaves pending rows; replay them before deriving
    // anything new from the feed.
    if let Some(open) = db.load_open_batch().await? {
        tracing::info!(batch = open.id, "replaying interrupted batch");
        let pages = open.pages();
        run_one_batch(&ctx, cfg.parallel_downloads, &open, &pages, &mut summary).await?;
    }

    let mut next_page = match request.start_page {
        Some(page) => Some(page),
        None => match db.load_progress().await?.last_page {
            Some(done) => done.checked_sub(1).filter(|p| *p >= 1),
            None => feed.last_page(),
        },
    };

    for _ in 0..request.batches {
        if control.stop_requested() || summary.outcome == RunOutcome::QuotaStopped {
            break;
        }
        let Some(start) = next_page else { break };

        let span = u64::from(request.pages_per_batch.unwrap_or(cfg.pages_per_batch).max(1));
        let lowest = start.saturating_sub(span - 1).max(1);
        let pages: Vec<u64> = (lowest..=start).rev().collect();

        let items = collect_batch_items(db, cfg, feed, request, &pages, &mut summary).await?;
        if items.is_empty() {
            // Nothing pending on these pages; the cursor still advances
            // through them in traversal order.
            for &page in &pages {
                db.advance_page(page).await.context("cursor write failed")?;
            }
        } else {
            let batch_id = db.create_batch(&items).await.context("manifest write failed")?;
            let batch = db.load_batch(batch_id).await?;
            run_one_batch(&ctx, cfg.parallel_downloads, &batch, &pages, &mut summary).await?;
        }

        next_page = lowest.checked_sub(1).filter(|p| *p >= 1);
        if next_page.is_none() {
            break;
        }
    }

    summary.quota_warning |= ctx.quota.warning_crossed();
    tracing::info!(
        committed = summary.committed,
        failed = summary.failed.len(),
        quota_stopped = summary.quota_stopped,
        skipped = summary.skipped,
        bytes_added = summary.bytes_added,
        outcome = ?summary.outcome,
        "run finished"
    );
    Ok(summary)
}

/// Pull the batch's pages from the feed in traversal order, skipping items
/// a previous run already resolved and duplicate ids within the batch.
async fn collect_batch_items(
    db: &StateDb,
    cfg: &VarcConfig,
    feed: &dyn SourceFeed,
    request: &RunRequest,
    pages: &[u64],
    summary: &mut RunSummary,
) -> Result<Vec<MediaItem>> {
    let progress = db.load_progress().await?;
    let mut items = Vec::new();
    let mut seen: HashSet<String> = HashSet::new();
    for (i, &page) in pages.iter().enumerate() {
        if i > 0 && cfg.request_delay_ms > 0 {
            tokio::time::sleep(Duration::from_millis(cfg.request_delay_ms)).await;
        }
        let page_items = feed
            .page(page)
            .with_context(|| format!("source feed failed on page {page}"))?;
        for item in page_items {
            if progress.is_done(&item.id, request.retry_failed) {
                summary.skipped += 1;
                continue;
            }
            if !seen.insert(item.id.clone()) {
                tracing::warn!(id = %item.id, page, "duplicate id in feed, keeping first");
                continue;
            }
            items.push(item);
        }
    }
    Ok(items)
}

/// Drain one batch: dispatch pending items in manifest order with at most
/// `max_parallel` in flight; quota or stop requests halt dispatch while
/// in-flight items run to their terminal state.
async fn run_one_batch(
    ctx: &Arc<WorkerCtx>,
    max_parallel: usize,
    batch: &ManifestBatch,
    pages: &[u64],
    summary: &mut RunSummary,
) -> Result<()> {
    let work: Vec<MediaItem> = batch.pending().cloned().collect();

    // Per-page pending counters drive the monotonic cursor advance: a page
    // is only marked done once every one of its items is terminal.
    let mut pending: HashMap<u64, usize> = pages.iter().map(|&p| (p, 0)).collect();
    for item in &work {
        *pending.entry(item.page).or_insert(0) += 1;
    }
    let mut page_idx = 0usize;
    advance_ready(ctx, pages, &pending, &mut page_idx).await?;

    let max_parallel = max_parallel.max(1);
    let mut iter = work.into_iter();
    let mut dispatched: HashSet<String> = HashSet::new();
    let mut quota_hit = false;
    let mut stopped = false;
    let mut join_set: JoinSet<Result<(String, u64, ItemOutcome)>> = JoinSet::new();

    loop {
        while join_set.len() < max_parallel && !quota_hit && !stopped {
            if ctx.control.stop_requested() {
                tracing::info!("stop requested, letting in-flight items finish");
                stopped = true;
                break;
            }
            if ctx.quota.reached() {
                quota_hit = true;
                break;
            }
            let Some(item) = iter.next() else { break };

            if !dispatched.insert(item.id.clone()) {
                // A second manifest row for the same id (feed duplication);
                // the first occurrence owns the directory.
                resolve_page(&mut pending, item.page);
                summary.skipped += 1;
                continue;
            }
            let Some(guard) = super::inflight::InFlight::try_claim(&ctx.inflight, &item.id) else {
                tracing::warn!(id = %item.id, "id already in flight elsewhere, skipping");
                resolve_page(&mut pending, item.page);
                summary.skipped += 1;
                continue;
            };

            let ctx_task = Arc::clone(ctx);
            let batch_id = batch.id;
            let id = item.id.clone();
            let page = item.page;
            join_set.spawn(async move {
                let _guard = guard;
                let outcome = process_item(ctx_task, batch_id, item).await?;
                Ok((id, page, outcome))
            });
        }

        let Some(joined) = join_set.join_next().await else {
            break;
        };
        let (id, page, outcome) = joined.map_err(|e| anyhow::anyhow!("worker task join: {e}"))??;
        match outcome {
            ItemOutcome::Committed { bytes } => {
                summary.committed += 1;
                summary.bytes_added += bytes;
                resolve_page(&mut pending, page);
            }
            ItemOutcome::Failed { reason } => {
                summary.failed.push(FailedItem { id, reason });
                resolve_page(&mut pending, page);
            }
            ItemOutcome::QuotaStopped => {
                // Not terminal: the item stays pending for a later run with
                // headroom, and its page keeps the cursor from advancing.
                summary.quota_stopped += 1;
                quota_hit = true;
            }
        }
        advance_ready(ctx, pages, &pending, &mut page_idx).await?;
    }

    if quota_hit {
        summary.quota_stopped += iter.count() as u32;
        summary.outcome = RunOutcome::QuotaStopped;
    }
    Ok(())
}

fn resolve_page(pending: &mut HashMap<u64, usize>, page: u64) {
    if let Some(count) = pending.get_mut(&page) {
        *count = count.saturating_sub(1);
    }
}

/// Advance the cursor over every leading page whose items are all terminal.
async fn advance_ready(
    ctx: &Arc<WorkerCtx>,
    pages: &[u64],
    pending: &HashMap<u64, usize>,
    page_idx: &mut usize,
) -> Result<()> {
    while *page_idx < pages.len()
        && pending.get(&pages[*page_idx]).copied().unwrap_or(0) == 0
    {
        let page = pages[*page_idx];
        ctx.db
            .advance_page(page)
            .await
            .context("cursor write failed")?;
        tracing::debug!(page, "page complete, cursor advanced");
        *page_idx += 1;
    }
    Ok(())
}

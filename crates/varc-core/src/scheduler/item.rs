//! One item's lifecycle: download → validate → commit, with retry.

use anyhow::{Context, Result};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use crate::backend::{self, Backend};
use crate::control::RunControl;
use crate::feed::MediaItem;
use crate::manifest::ItemStatus;
use crate::quota::{QuotaMonitor, QuotaVerdict};
use crate::retry::{classify, ItemError, RetryDecision, RetryPolicy};
use crate::state_db::StateDb;
use crate::storage;
use crate::validate::{self, AssetRole, Limits};

use super::inflight::InFlight;

/// Consecutive item-fatal filesystem failures before the run aborts as
/// systemic (disk full, storage root unwritable).
const FS_FAILURE_ESCALATION: u32 = 3;

/// Terminal result of one item for this run.
#[derive(Debug)]
pub(super) enum ItemOutcome {
    Committed { bytes: u64 },
    Failed { reason: String },
    /// Committing would cross the ceiling; the item stays pending.
    QuotaStopped,
}

/// Shared context handed to every worker: configuration extracts plus the
/// shared mutable services, each guarded for concurrent use.
pub(super) struct WorkerCtx {
    pub storage_root: PathBuf,
    pub backend: Backend,
    pub limits: Limits,
    pub user_agent: String,
    pub quota: QuotaMonitor,
    pub db: StateDb,
    pub control: RunControl,
    pub transport_policy: RetryPolicy,
    pub validation_policy: RetryPolicy,
    pub inflight: Arc<InFlight>,
    fs_failures: AtomicU32,
}

impl WorkerCtx {
    pub(super) fn new(
        cfg: &crate::config::VarcConfig,
        storage_root: PathBuf,
        backend: Backend,
        quota: QuotaMonitor,
        db: StateDb,
        control: RunControl,
    ) -> Self {
        Self {
            storage_root,
            backend,
            limits: Limits::from_config(cfg),
            user_agent: cfg.user_agent.clone(),
            quota,
            db,
            control,
            transport_policy: RetryPolicy::transport_from_config(cfg),
            validation_policy: RetryPolicy::validation(),
            inflight: InFlight::new(),
            fs_failures: AtomicU32::new(0),
        }
    }

    /// Record an item-fatal filesystem failure; Err when it looks systemic.
    fn note_fs_failure(&self, id: &str, err: &ItemError) -> Result<()> {
        let streak = self.fs_failures.fetch_add(1, Ordering::Relaxed) + 1;
        tracing::error!(id, streak, "filesystem failure: {}", err);
        if streak >= FS_FAILURE_ESCALATION {
            anyhow::bail!(
                "{} consecutive filesystem failures (last on {}: {}); storage looks unavailable",
                streak,
                id,
                err
            );
        }
        Ok(())
    }

    fn note_fs_success(&self) {
        self.fs_failures.store(0, Ordering::Relaxed);
    }
}

/// Drive one item to a terminal state. `Err` aborts the whole run (durable
/// checkpoint unwritable or systemic filesystem failure); per-item errors
/// are contained in the returned outcome.
pub(super) async fn process_item(
    ctx: Arc<WorkerCtx>,
    batch_id: i64,
    item: MediaItem,
) -> Result<ItemOutcome> {
    // Crash window fast path: the bundle may exist fully on disk without a
    // checkpoint. Re-validate and record instead of re-downloading.
    if let Some(bytes) = storage::existing_bundle_size(&ctx.storage_root, &item, &ctx.limits) {
        return match ctx.quota.try_commit(bytes) {
            QuotaVerdict::Reserved => {
                tracing::info!(id = %item.id, bytes, "bundle already on disk, recording");
                record_commit(&ctx, batch_id, &item, bytes).await?;
                Ok(ItemOutcome::Committed { bytes })
            }
            QuotaVerdict::WouldExceed => Ok(ItemOutcome::QuotaStopped),
        };
    }

    let mut attempt = 1u32;
    loop {
        match attempt_once(&ctx, &item).await? {
            Ok(AttemptResult::Committed { bytes }) => {
                ctx.note_fs_success();
                record_commit(&ctx, batch_id, &item, bytes).await?;
                return Ok(ItemOutcome::Committed { bytes });
            }
            Ok(AttemptResult::QuotaStopped) => {
                storage::clear_staging(&ctx.storage_root, &item);
                return Ok(ItemOutcome::QuotaStopped);
            }
            Err(err) => {
                storage::clear_staging(&ctx.storage_root, &item);

                if err.is_storage() {
                    ctx.note_fs_failure(&item.id, &err)?;
                    return fail_item(&ctx, batch_id, &item, &err).await;
                }

                let kind = classify(&err);
                let policy = if err.is_validation() {
                    &ctx.validation_policy
                } else {
                    &ctx.transport_policy
                };
                match policy.decide(attempt, kind) {
                    RetryDecision::RetryAfter(delay) => {
                        tracing::warn!(
                            id = %item.id,
                            attempt,
                            delay_ms = delay.as_millis() as u64,
                            "attempt failed, retrying: {}",
                            err
                        );
                        tokio::time::sleep(delay).await;
                        attempt += 1;
                    }
                    RetryDecision::NoRetry => {
                        return fail_item(&ctx, batch_id, &item, &err).await;
                    }
                }
            }
        }
    }
}

enum AttemptResult {
    Committed { bytes: u64 },
    QuotaStopped,
}

/// One attempt: quota gate, fetch both assets to staging, validate, then
/// the atomic quota + filesystem commit. Outer `Err` is run-fatal (task
/// join); inner `Err` is the contained per-item failure.
async fn attempt_once(
    ctx: &Arc<WorkerCtx>,
    item: &MediaItem,
) -> Result<Result<AttemptResult, ItemError>> {
    // Gate: skip the transfer entirely when the advertised size cannot fit.
    if let Some(len) = probe_blocking(ctx, &item.video_url).await? {
        if ctx.quota.would_exceed(len) {
            tracing::info!(id = %item.id, len, "advertised size would cross the ceiling");
            return Ok(Ok(AttemptResult::QuotaStopped));
        }
    }

    let video_tmp = storage::staging_path(&ctx.storage_root, &format!("{}.mp4", item.id));
    let thumb_name = format!(
        "{}.{}",
        item.id,
        storage::thumb_extension(&item.thumb_url)
    );
    let thumb_tmp = storage::staging_path(&ctx.storage_root, &thumb_name);

    if let Err(e) = fetch_blocking(ctx, &item.video_url, video_tmp.clone()).await? {
        return Ok(Err(e.into()));
    }
    let video_bytes =
        match validate::validate_asset(&video_tmp, AssetRole::Video, &ctx.limits) {
            Ok(bytes) => bytes,
            Err(reason) => return Ok(Err(reason.into())),
        };

    if let Err(e) = fetch_blocking(ctx, &item.thumb_url, thumb_tmp.clone()).await? {
        return Ok(Err(e.into()));
    }
    let thumb_bytes =
        match validate::validate_asset(&thumb_tmp, AssetRole::Thumbnail, &ctx.limits) {
            Ok(bytes) => bytes,
            Err(reason) => return Ok(Err(reason.into())),
        };

    let metadata = match storage::render_metadata(item) {
        Ok(m) => m,
        Err(e) => {
            let io = std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string());
            return Ok(Err(ItemError::Storage(io)));
        }
    };
    let total = video_bytes + thumb_bytes + metadata.len() as u64;

    // The check and the commit are one atomic decision.
    match ctx.quota.try_commit(total) {
        QuotaVerdict::WouldExceed => return Ok(Ok(AttemptResult::QuotaStopped)),
        QuotaVerdict::Reserved => {}
    }

    let paths = storage::bundle_paths(&ctx.storage_root, item);
    if let Err(e) = storage::commit_bundle(&paths, &video_tmp, &thumb_tmp, &metadata) {
        ctx.quota.release(total);
        return Ok(Err(ItemError::Storage(e)));
    }

    if ctx.quota.warning_crossed() {
        tracing::warn!(
            used = ctx.quota.current_usage(),
            ceiling = ctx.quota.ceiling(),
            "storage usage above 90% of the ceiling"
        );
    }

    Ok(Ok(AttemptResult::Committed { bytes: total }))
}

/// Run a blocking backend fetch on the blocking pool.
async fn fetch_blocking(
    ctx: &Arc<WorkerCtx>,
    url: &str,
    dest: PathBuf,
) -> Result<Result<u64, backend::TransportError>> {
    let ctx = Arc::clone(ctx);
    let url = url.to_string();
    tokio::task::spawn_blocking(move || ctx.backend.fetch(&url, &dest))
        .await
        .context("fetch task join")
}

async fn probe_blocking(ctx: &Arc<WorkerCtx>, url: &str) -> Result<Option<u64>> {
    let url = url.to_string();
    let user_agent = ctx.user_agent.clone();
    tokio::task::spawn_blocking(move || backend::probe_content_length(&url, &user_agent))
        .await
        .context("probe task join")
}

/// Durably record a commit; a checkpoint write failure is run-fatal.
async fn record_commit(
    ctx: &Arc<WorkerCtx>,
    batch_id: i64,
    item: &MediaItem,
    bytes: u64,
) -> Result<()> {
    ctx.db
        .record_commit(&item.id, item.page, bytes)
        .await
        .context("checkpoint write failed; aborting run")?;
    ctx.db
        .mark_batch_item(batch_id, &item.id, ItemStatus::Committed)
        .await
        .context("manifest status write failed; aborting run")?;
    tracing::info!(id = %item.id, bytes, "committed");
    Ok(())
}

/// Durably record a permanent failure; never a silent drop.
async fn fail_item(
    ctx: &Arc<WorkerCtx>,
    batch_id: i64,
    item: &MediaItem,
    err: &ItemError,
) -> Result<ItemOutcome> {
    let reason = err.reason();
    ctx.db
        .record_failure(&item.id, item.page, &reason)
        .await
        .context("checkpoint write failed; aborting run")?;
    ctx.db
        .mark_batch_item(batch_id, &item.id, ItemStatus::Failed)
        .await
        .context("manifest status write failed; aborting run")?;
    tracing::warn!(id = %item.id, reason = %reason, "permanently failed");
    Ok(ItemOutcome::Failed { reason })
}

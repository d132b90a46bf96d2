//! Persisted manifest batches: create, replay, per-item status updates.

use anyhow::{Context, Result};
use sqlx::Row;

use super::db::{unix_timestamp, StateDb};
use crate::feed::MediaItem;
use crate::manifest::{BatchEntry, ItemStatus, ManifestBatch};

impl StateDb {
    /// Persist a new batch with its ordered items (all pending). Returns the
    /// batch id. Called before the first download of the batch starts.
    pub async fn create_batch(&self, items: &[MediaItem]) -> Result<i64> {
        let now = unix_timestamp();
        let mut tx = self.pool.begin().await?;
        let batch_id = sqlx::query(
            r#"
            INSERT INTO batches (created_at) VALUES (?1)
            "#,
        )
        .bind(now)
        .execute(&mut *tx)
        .await?
        .last_insert_rowid();

        for (seq, item) in items.iter().enumerate() {
            let metadata_json = serde_json::to_string(&item.metadata)
                .with_context(|| format!("metadata for {} is not serializable", item.id))?;
            sqlx::query(
                r#"
                INSERT INTO batch_items (
                    batch_id, seq, item_id, page, video_url, thumb_url,
                    metadata_json, status
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 'pending')
                "#,
            )
            .bind(batch_id)
            .bind(seq as i64)
            .bind(&item.id)
            .bind(item.page as i64)
            .bind(&item.video_url)
            .bind(&item.thumb_url)
            .bind(metadata_json)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(batch_id)
    }

    /// Oldest batch that still has pending items, for replay after a crash.
    pub async fn load_open_batch(&self) -> Result<Option<ManifestBatch>> {
        let row = sqlx::query(
            r#"
            SELECT DISTINCT batch_id FROM batch_items
            WHERE status = 'pending'
            ORDER BY batch_id ASC
            LIMIT 1
            "#,
        )
        .fetch_optional(&self.pool)
        .await?;
        let Some(row) = row else {
            return Ok(None);
        };
        let batch_id: i64 = row.get("batch_id");
        Ok(Some(self.load_batch(batch_id).await?))
    }

    /// Load a batch with its ordered entries and statuses.
    pub async fn load_batch(&self, batch_id: i64) -> Result<ManifestBatch> {
        let rows = sqlx::query(
            r#"
            SELECT item_id, page, video_url, thumb_url, metadata_json, status
            FROM batch_items
            WHERE batch_id = ?1
            ORDER BY seq ASC
            "#,
        )
        .bind(batch_id)
        .fetch_all(&self.pool)
        .await?;

        let mut entries = Vec::with_capacity(rows.len());
        for row in rows {
            let metadata_json: String = row.get("metadata_json");
            let metadata = serde_json::from_str(&metadata_json)
                .context("corrupt metadata_json in batch_items")?;
            entries.push(BatchEntry {
                item: MediaItem {
                    id: row.get("item_id"),
                    video_url: row.get("video_url"),
                    thumb_url: row.get("thumb_url"),
                    metadata,
                    page: row.get::<i64, _>("page") as u64,
                },
                status: ItemStatus::from_str(row.get::<String, _>("status").as_str()),
            });
        }
        Ok(ManifestBatch { id: batch_id, entries })
    }

    /// Move an item of a batch to a terminal status. Transitions are
    /// monotonic: a row already terminal is left untouched.
    pub async fn mark_batch_item(
        &self,
        batch_id: i64,
        item_id: &str,
        status: ItemStatus,
    ) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE batch_items
            SET status = ?1
            WHERE batch_id = ?2 AND item_id = ?3 AND status = 'pending'
            "#,
        )
        .bind(status.as_str())
        .bind(batch_id)
        .bind(item_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

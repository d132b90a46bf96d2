//! Progress operations: load snapshot, record terminal states, advance cursor.

use anyhow::Result;
use sqlx::Row;

use super::db::{unix_timestamp, StateDb};
use super::types::{ItemState, ProgressState};

impl StateDb {
    /// Load the full progress snapshot; returns the zero-value state when
    /// nothing has been persisted yet.
    pub async fn load_progress(&self) -> Result<ProgressState> {
        let mut state = ProgressState::default();

        let row = sqlx::query(
            r#"
            SELECT last_page, total_bytes, updated_at FROM progress WHERE id = 1
            "#,
        )
        .fetch_optional(&self.pool)
        .await?;
        if let Some(row) = row {
            state.last_page = row.get::<Option<i64>, _>("last_page").map(|p| p as u64);
            state.total_bytes = row.get::<i64, _>("total_bytes") as u64;
            state.updated_at = row.get("updated_at");
        }

        let rows = sqlx::query(
            r#"
            SELECT item_id, state FROM items
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        for row in rows {
            let id: String = row.get("item_id");
            let item_state: String = row.get("state");
            if item_state == ItemState::Committed.as_str() {
                state.committed.insert(id);
            } else {
                state.failed.insert(id);
            }
        }

        Ok(state)
    }

    /// Record a committed item and add its bytes to the cumulative total,
    /// in one transaction. A previously failed id moves to committed (the
    /// reverse never happens).
    pub async fn record_commit(&self, id: &str, page: u64, bytes: u64) -> Result<()> {
        let now = unix_timestamp();
        let mut tx = self.pool.begin().await?;
        sqlx::query(
            r#"
            INSERT INTO items (item_id, page, state, bytes, reason, updated_at)
            VALUES (?1, ?2, 'committed', ?3, NULL, ?4)
            ON CONFLICT(item_id) DO UPDATE SET
                state = 'committed',
                bytes = excluded.bytes,
                reason = NULL,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(id)
        .bind(page as i64)
        .bind(bytes as i64)
        .bind(now)
        .execute(&mut *tx)
        .await?;
        sqlx::query(
            r#"
            INSERT INTO progress (id, last_page, total_bytes, updated_at)
            VALUES (1, NULL, ?1, ?2)
            ON CONFLICT(id) DO UPDATE SET
                total_bytes = progress.total_bytes + ?1,
                updated_at = ?2
            "#,
        )
        .bind(bytes as i64)
        .bind(now)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok(())
    }

    /// Record a permanently failed item with its reason. Never demotes a
    /// committed id.
    pub async fn record_failure(&self, id: &str, page: u64, reason: &str) -> Result<()> {
        let now = unix_timestamp();
        sqlx::query(
            r#"
            INSERT INTO items (item_id, page, state, bytes, reason, updated_at)
            VALUES (?1, ?2, 'failed', 0, ?3, ?4)
            ON CONFLICT(item_id) DO UPDATE SET
                state = 'failed',
                reason = excluded.reason,
                updated_at = excluded.updated_at
            WHERE items.state != 'committed'
            "#,
        )
        .bind(id)
        .bind(page as i64)
        .bind(reason)
        .bind(now)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Advance the page cursor to `page`. The traversal descends, so the
    /// cursor only ever moves to smaller page numbers; stale or out-of-order
    /// advances are ignored.
    pub async fn advance_page(&self, page: u64) -> Result<()> {
        let now = unix_timestamp();
        sqlx::query(
            r#"
            INSERT INTO progress (id, last_page, total_bytes, updated_at)
            VALUES (1, ?1, 0, ?2)
            ON CONFLICT(id) DO UPDATE SET
                last_page = ?1,
                updated_at = ?2
            WHERE progress.last_page IS NULL OR ?1 < progress.last_page
            "#,
        )
        .bind(page as i64)
        .bind(now)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Failure reasons for the run summary: id → recorded reason.
    pub async fn failure_reasons(&self) -> Result<Vec<(String, String)>> {
        let rows = sqlx::query(
            r#"
            SELECT item_id, reason FROM items WHERE state = 'failed' ORDER BY item_id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows
            .into_iter()
            .map(|row| {
                let id: String = row.get("item_id");
                let reason: Option<String> = row.get("reason");
                (id, reason.unwrap_or_else(|| "unknown".to_string()))
            })
            .collect())
    }
}

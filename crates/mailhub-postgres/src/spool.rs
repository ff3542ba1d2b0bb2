//! Postgres delivery spool.
//!
//! Dequeue uses `FOR UPDATE SKIP LOCKED` so multiple retry workers can
//! drain the spool without handing out the same entry twice.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use tracing::debug;
use uuid::Uuid;

use mailhub_core::error::{AppError, ErrorKind};
use mailhub_core::result::AppResult;
use mailhub_core::traits::spool::{DeliverySpool, SpoolEntry};

use crate::pool::DatabasePool;

/// Postgres-backed delivery spool.
#[derive(Debug, Clone)]
pub struct PgDeliverySpool {
    pool: PgPool,
}

impl PgDeliverySpool {
    /// Create a spool over an established pool.
    pub fn new(pool: &DatabasePool) -> Self {
        Self {
            pool: pool.pool().clone(),
        }
    }

    fn entry_from_row(row: &PgRow) -> AppResult<SpoolEntry> {
        let headers: serde_json::Value = row
            .try_get("headers")
            .map_err(|e| Self::db_err("Failed to decode spool row", e))?;
        Ok(SpoolEntry {
            id: row
                .try_get::<Uuid, _>("id")
                .map_err(|e| Self::db_err("Failed to decode spool row", e))?,
            account: row
                .try_get::<String, _>("account")
                .map_err(|e| Self::db_err("Failed to decode spool row", e))?,
            sender: row
                .try_get::<String, _>("sender")
                .map_err(|e| Self::db_err("Failed to decode spool row", e))?,
            recipient: row
                .try_get::<String, _>("recipient")
                .map_err(|e| Self::db_err("Failed to decode spool row", e))?,
            headers: serde_json::from_value(headers)?,
            raw: row
                .try_get::<Vec<u8>, _>("raw")
                .map_err(|e| Self::db_err("Failed to decode spool row", e))?,
            attempts: row
                .try_get::<i32, _>("attempts")
                .map_err(|e| Self::db_err("Failed to decode spool row", e))? as u32,
            queued_at: row
                .try_get::<DateTime<Utc>, _>("queued_at")
                .map_err(|e| Self::db_err("Failed to decode spool row", e))?,
        })
    }

    fn db_err(context: &str, err: sqlx::Error) -> AppError {
        AppError::with_source(ErrorKind::Database, format!("{context}: {err}"), err)
    }
}

#[async_trait]
impl DeliverySpool for PgDeliverySpool {
    fn backend_type(&self) -> &str {
        crate::VARIANT
    }

    async fn health_check(&self) -> AppResult<bool> {
        sqlx::query_scalar::<_, i32>("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .map(|v| v == 1)
            .map_err(|e| Self::db_err("Health check failed", e))
    }

    async fn enqueue(&self, entry: SpoolEntry) -> AppResult<()> {
        sqlx::query(
            "INSERT INTO delivery_spool
                 (id, account, sender, recipient, headers, raw, attempts, queued_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
        )
        .bind(entry.id)
        .bind(&entry.account)
        .bind(&entry.sender)
        .bind(&entry.recipient)
        .bind(serde_json::to_value(&entry.headers)?)
        .bind(&entry.raw)
        .bind(entry.attempts as i32)
        .bind(entry.queued_at)
        .execute(&self.pool)
        .await
        .map_err(|e| Self::db_err("Failed to spool delivery", e))?;

        debug!(id = %entry.id, account = %entry.account, attempts = entry.attempts, "delivery spooled");
        Ok(())
    }

    async fn dequeue(&self) -> AppResult<Option<SpoolEntry>> {
        let row = sqlx::query(
            "DELETE FROM delivery_spool
             WHERE id = (
                 SELECT id FROM delivery_spool
                 ORDER BY queued_at
                 LIMIT 1
                 FOR UPDATE SKIP LOCKED
             )
             RETURNING id, account, sender, recipient, headers, raw, attempts, queued_at",
        )
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| Self::db_err("Failed to dequeue delivery", e))?;

        row.as_ref().map(Self::entry_from_row).transpose()
    }

    async fn pending(&self) -> AppResult<u64> {
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM delivery_spool")
            .fetch_one(&self.pool)
            .await
            .map(|n| n as u64)
            .map_err(|e| Self::db_err("Failed to count spool", e))
    }
}

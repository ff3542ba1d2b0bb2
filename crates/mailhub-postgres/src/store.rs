//! Postgres message store.

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use tracing::debug;
use uuid::Uuid;

use mailhub_core::error::{AppError, ErrorKind};
use mailhub_core::result::AppResult;
use mailhub_core::traits::store::{MessageMeta, MessageStore};

use crate::pool::DatabasePool;

/// Postgres-backed message store.
#[derive(Debug, Clone)]
pub struct PgMessageStore {
    pool: PgPool,
}

impl PgMessageStore {
    /// Create a store over an established pool.
    pub fn new(pool: &DatabasePool) -> Self {
        Self {
            pool: pool.pool().clone(),
        }
    }

    fn meta_from_row(row: &PgRow) -> Result<MessageMeta, sqlx::Error> {
        Ok(MessageMeta {
            id: row.try_get::<Uuid, _>("id")?,
            mailbox: row.try_get::<String, _>("mailbox")?,
            size_bytes: row.try_get::<i64, _>("size_bytes")? as u64,
            flags: row.try_get::<Vec<String>, _>("flags")?,
            received_at: row.try_get::<DateTime<Utc>, _>("received_at")?,
        })
    }

    fn db_err(context: &str, err: sqlx::Error) -> AppError {
        AppError::with_source(ErrorKind::Database, format!("{context}: {err}"), err)
    }
}

#[async_trait]
impl MessageStore for PgMessageStore {
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

    async fn create_mailbox(&self, account: &str, mailbox: &str) -> AppResult<()> {
        sqlx::query(
            "INSERT INTO mailboxes (account, name) VALUES ($1, $2)
             ON CONFLICT (account, name) DO NOTHING",
        )
        .bind(account)
        .bind(mailbox)
        .execute(&self.pool)
        .await
        .map_err(|e| Self::db_err("Failed to create mailbox", e))?;
        Ok(())
    }

    async fn mailbox_exists(&self, account: &str, mailbox: &str) -> AppResult<bool> {
        sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (SELECT 1 FROM mailboxes WHERE account = $1 AND name = $2)",
        )
        .bind(account)
        .bind(mailbox)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| Self::db_err("Failed to check mailbox", e))
    }

    async fn mailboxes(&self, account: &str) -> AppResult<Vec<String>> {
        sqlx::query_scalar::<_, String>(
            "SELECT name FROM mailboxes WHERE account = $1 ORDER BY name",
        )
        .bind(account)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| Self::db_err("Failed to list mailboxes", e))
    }

    async fn ingest(
        &self,
        account: &str,
        mailbox: &str,
        flags: &[String],
        raw: Bytes,
    ) -> AppResult<MessageMeta> {
        if !self.mailbox_exists(account, mailbox).await? {
            return Err(AppError::not_found(format!("Mailbox not found: {mailbox}")));
        }

        let meta = MessageMeta {
            id: Uuid::new_v4(),
            mailbox: mailbox.to_string(),
            size_bytes: raw.len() as u64,
            flags: flags.to_vec(),
            received_at: Utc::now(),
        };

        sqlx::query(
            "INSERT INTO messages (id, account, mailbox, flags, size_bytes, raw, received_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(meta.id)
        .bind(account)
        .bind(mailbox)
        .bind(&meta.flags)
        .bind(meta.size_bytes as i64)
        .bind(raw.as_ref())
        .bind(meta.received_at)
        .execute(&self.pool)
        .await
        .map_err(|e| Self::db_err("Failed to store message", e))?;

        debug!(account, mailbox, id = %meta.id, bytes = meta.size_bytes, "message stored");
        Ok(meta)
    }

    async fn fetch(&self, account: &str, id: Uuid) -> AppResult<Bytes> {
        let raw = sqlx::query_scalar::<_, Vec<u8>>(
            "SELECT raw FROM messages WHERE account = $1 AND id = $2",
        )
        .bind(account)
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| Self::db_err("Failed to fetch message", e))?
        .ok_or_else(|| AppError::not_found(format!("Message not found: {id}")))?;
        Ok(Bytes::from(raw))
    }

    async fn metadata(&self, account: &str, id: Uuid) -> AppResult<MessageMeta> {
        let row = sqlx::query(
            "SELECT id, mailbox, flags, size_bytes, received_at
             FROM messages WHERE account = $1 AND id = $2",
        )
        .bind(account)
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| Self::db_err("Failed to fetch metadata", e))?
        .ok_or_else(|| AppError::not_found(format!("Message not found: {id}")))?;

        Self::meta_from_row(&row).map_err(|e| Self::db_err("Failed to decode message row", e))
    }

    async fn list(&self, account: &str, mailbox: &str) -> AppResult<Vec<MessageMeta>> {
        if !self.mailbox_exists(account, mailbox).await? {
            return Err(AppError::not_found(format!("Mailbox not found: {mailbox}")));
        }

        let rows = sqlx::query(
            "SELECT id, mailbox, flags, size_bytes, received_at
             FROM messages WHERE account = $1 AND mailbox = $2
             ORDER BY received_at",
        )
        .bind(account)
        .bind(mailbox)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| Self::db_err("Failed to list messages", e))?;

        rows.iter()
            .map(|row| {
                Self::meta_from_row(row)
                    .map_err(|e| Self::db_err("Failed to decode message row", e))
            })
            .collect()
    }

    async fn delete(&self, account: &str, id: Uuid) -> AppResult<()> {
        let result = sqlx::query("DELETE FROM messages WHERE account = $1 AND id = $2")
            .bind(account)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| Self::db_err("Failed to delete message", e))?;

        if result.rows_affected() == 0 {
            return Err(AppError::not_found(format!("Message not found: {id}")));
        }
        debug!(account, id = %id, "message deleted");
        Ok(())
    }
}

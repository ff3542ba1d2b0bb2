//! Schema bootstrap for the Postgres backends.

use sqlx::PgPool;

use mailhub_core::error::{AppError, ErrorKind};
use mailhub_core::result::AppResult;

/// Idempotent schema statements, applied at connect time.
const SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS mailboxes (
        account TEXT NOT NULL,
        name TEXT NOT NULL,
        created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
        PRIMARY KEY (account, name)
    )",
    "CREATE TABLE IF NOT EXISTS messages (
        id UUID PRIMARY KEY,
        account TEXT NOT NULL,
        mailbox TEXT NOT NULL,
        flags TEXT[] NOT NULL DEFAULT '{}',
        size_bytes BIGINT NOT NULL,
        raw BYTEA NOT NULL,
        received_at TIMESTAMPTZ NOT NULL,
        FOREIGN KEY (account, mailbox)
            REFERENCES mailboxes (account, name) ON DELETE CASCADE
    )",
    "CREATE INDEX IF NOT EXISTS idx_messages_account_mailbox
        ON messages (account, mailbox)",
    "CREATE TABLE IF NOT EXISTS delivery_spool (
        id UUID PRIMARY KEY,
        account TEXT NOT NULL,
        sender TEXT NOT NULL,
        recipient TEXT NOT NULL,
        headers JSONB NOT NULL DEFAULT '[]',
        raw BYTEA NOT NULL,
        attempts INTEGER NOT NULL DEFAULT 0,
        queued_at TIMESTAMPTZ NOT NULL
    )",
];

/// Apply the schema statements.
pub async fn ensure_schema(pool: &PgPool) -> AppResult<()> {
    for statement in SCHEMA {
        sqlx::query(statement).execute(pool).await.map_err(|e| {
            AppError::with_source(ErrorKind::Database, format!("Schema bootstrap failed: {e}"), e)
        })?;
    }
    Ok(())
}

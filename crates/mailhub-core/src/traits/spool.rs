//! Delivery spool trait for retryable message delivery.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::result::AppResult;

/// A spooled delivery awaiting retry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpoolEntry {
    /// Spool entry identifier.
    pub id: Uuid,
    /// Destination account.
    pub account: String,
    /// Envelope sender address.
    pub sender: String,
    /// Envelope recipient address.
    pub recipient: String,
    /// Parsed message headers, kept for hook re-invocation on retry.
    pub headers: Vec<(String, String)>,
    /// Raw message contents.
    pub raw: Vec<u8>,
    /// Delivery attempts made so far.
    pub attempts: u32,
    /// When the entry was first spooled.
    pub queued_at: DateTime<Utc>,
}

impl SpoolEntry {
    /// Create a new spool entry for a failed delivery.
    pub fn new(
        account: impl Into<String>,
        sender: impl Into<String>,
        recipient: impl Into<String>,
        headers: Vec<(String, String)>,
        raw: Vec<u8>,
        attempts: u32,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            account: account.into(),
            sender: sender.into(),
            recipient: recipient.into(),
            headers,
            raw,
            attempts,
            queued_at: Utc::now(),
        }
    }
}

/// Trait for delivery spool backends.
///
/// Holds messages whose delivery failed temporarily until the retry worker
/// picks them up again. Like [`MessageStore`](crate::traits::store::MessageStore),
/// exactly one implementation is bound per process.
#[async_trait]
pub trait DeliverySpool: Send + Sync + std::fmt::Debug + 'static {
    /// Return the backend variant identifier (e.g., "memory").
    fn backend_type(&self) -> &str;

    /// Check whether the backend is healthy and reachable.
    async fn health_check(&self) -> AppResult<bool>;

    /// Enqueue a delivery for retry.
    async fn enqueue(&self, entry: SpoolEntry) -> AppResult<()>;

    /// Dequeue the oldest waiting entry, if any.
    async fn dequeue(&self) -> AppResult<Option<SpoolEntry>>;

    /// Number of entries waiting.
    async fn pending(&self) -> AppResult<u64>;
}

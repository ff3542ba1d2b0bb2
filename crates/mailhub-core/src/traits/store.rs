//! Message store trait for pluggable mailbox storage backends.

use async_trait::async_trait;
use bytes::Bytes;
use uuid::Uuid;

use crate::result::AppResult;

/// Metadata about a stored message.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct MessageMeta {
    /// Message identifier, unique per account.
    pub id: Uuid,
    /// Mailbox the message is filed in.
    pub mailbox: String,
    /// Raw message size in bytes.
    pub size_bytes: u64,
    /// Flags set on the message.
    pub flags: Vec<String>,
    /// When the message was stored.
    pub received_at: chrono::DateTime<chrono::Utc>,
}

/// Trait for message store backends.
///
/// The trait is defined here in `mailhub-core` and implemented by the
/// storage crates. Exactly one implementation is bound per process through
/// the backend registry; every component that resolves the `storage`
/// capability observes the same instance.
#[async_trait]
pub trait MessageStore: Send + Sync + std::fmt::Debug + 'static {
    /// Return the backend variant identifier (e.g., "maildir").
    fn backend_type(&self) -> &str;

    /// Check whether the backend is healthy and reachable.
    async fn health_check(&self) -> AppResult<bool>;

    /// Create a mailbox if it does not already exist.
    async fn create_mailbox(&self, account: &str, mailbox: &str) -> AppResult<()>;

    /// Check whether a mailbox exists for the account.
    async fn mailbox_exists(&self, account: &str, mailbox: &str) -> AppResult<bool>;

    /// List the mailboxes of an account.
    async fn mailboxes(&self, account: &str) -> AppResult<Vec<String>>;

    /// Store a message in a mailbox, returning its metadata.
    async fn ingest(
        &self,
        account: &str,
        mailbox: &str,
        flags: &[String],
        raw: Bytes,
    ) -> AppResult<MessageMeta>;

    /// Fetch the raw contents of a message.
    async fn fetch(&self, account: &str, id: Uuid) -> AppResult<Bytes>;

    /// Get metadata for a single message.
    async fn metadata(&self, account: &str, id: Uuid) -> AppResult<MessageMeta>;

    /// List messages in a mailbox.
    async fn list(&self, account: &str, mailbox: &str) -> AppResult<Vec<MessageMeta>>;

    /// Delete a message.
    async fn delete(&self, account: &str, id: Uuid) -> AppResult<()>;
}

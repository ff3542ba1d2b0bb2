//! In-memory delivery spool.
//!
//! The default spool variant. Entries do not survive a restart; the
//! Postgres variant exists for deployments that need durability.

use std::collections::VecDeque;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::debug;

use mailhub_core::result::AppResult;
use mailhub_core::traits::spool::{DeliverySpool, SpoolEntry};

/// Variant identifier for the in-memory spool.
pub const VARIANT: &str = "memory";

/// FIFO in-memory delivery spool.
#[derive(Debug, Default)]
pub struct MemorySpool {
    entries: Mutex<VecDeque<SpoolEntry>>,
}

impl MemorySpool {
    /// Create an empty spool.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DeliverySpool for MemorySpool {
    fn backend_type(&self) -> &str {
        VARIANT
    }

    async fn health_check(&self) -> AppResult<bool> {
        Ok(true)
    }

    async fn enqueue(&self, entry: SpoolEntry) -> AppResult<()> {
        debug!(id = %entry.id, account = %entry.account, attempts = entry.attempts, "delivery spooled");
        self.entries.lock().await.push_back(entry);
        Ok(())
    }

    async fn dequeue(&self) -> AppResult<Option<SpoolEntry>> {
        Ok(self.entries.lock().await.pop_front())
    }

    async fn pending(&self) -> AppResult<u64> {
        Ok(self.entries.lock().await.len() as u64)
    }
}

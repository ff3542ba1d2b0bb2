//! Maildir-style filesystem message store.
//!
//! Layout: `<root>/<account>/<mailbox>/<id>.eml` for raw contents with a
//! `<id>.json` metadata sidecar. Accounts and mailboxes are plain
//! directories, so the store is inspectable with standard tools.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;
use tokio::fs;
use tracing::debug;
use uuid::Uuid;

use mailhub_core::error::{AppError, ErrorKind};
use mailhub_core::result::AppResult;
use mailhub_core::traits::store::{MessageMeta, MessageStore};

/// Variant identifier for the maildir store.
pub const VARIANT: &str = "maildir";

/// Maildir-style filesystem message store.
#[derive(Debug, Clone)]
pub struct MaildirStore {
    /// Root directory for all per-account mail directories.
    root: PathBuf,
}

impl MaildirStore {
    /// Open a store rooted at the given path, creating it if missing.
    pub async fn open(root_path: &str) -> AppResult<Self> {
        let root = PathBuf::from(root_path);
        fs::create_dir_all(&root).await.map_err(|e| {
            AppError::with_source(
                ErrorKind::Storage,
                format!("Failed to create mail root: {}", root.display()),
                e,
            )
        })?;
        Ok(Self { root })
    }

    /// Validate a path component (account or mailbox name).
    fn safe_component(name: &str) -> AppResult<&str> {
        if name.is_empty()
            || name.starts_with('.')
            || name.contains('/')
            || name.contains('\\')
            || name.contains('\0')
        {
            return Err(AppError::storage(format!("Invalid name: {name:?}")));
        }
        Ok(name)
    }

    fn account_dir(&self, account: &str) -> AppResult<PathBuf> {
        Ok(self.root.join(Self::safe_component(account)?))
    }

    fn mailbox_dir(&self, account: &str, mailbox: &str) -> AppResult<PathBuf> {
        Ok(self
            .account_dir(account)?
            .join(Self::safe_component(mailbox)?))
    }

    async fn read_meta(path: &Path) -> AppResult<MessageMeta> {
        let data = fs::read(path).await.map_err(|e| {
            AppError::with_source(
                ErrorKind::Storage,
                format!("Failed to read metadata: {}", path.display()),
                e,
            )
        })?;
        Ok(serde_json::from_slice(&data)?)
    }

    /// Locate the mailbox directory holding a message id.
    async fn locate(&self, account: &str, id: Uuid) -> AppResult<PathBuf> {
        for mailbox in self.mailboxes(account).await? {
            let dir = self.mailbox_dir(account, &mailbox)?;
            if fs::try_exists(dir.join(format!("{id}.json")))
                .await
                .unwrap_or(false)
            {
                return Ok(dir);
            }
        }
        Err(AppError::not_found(format!("Message not found: {id}")))
    }
}

#[async_trait]
impl MessageStore for MaildirStore {
    fn backend_type(&self) -> &str {
        VARIANT
    }

    async fn health_check(&self) -> AppResult<bool> {
        Ok(fs::try_exists(&self.root).await.unwrap_or(false))
    }

    async fn create_mailbox(&self, account: &str, mailbox: &str) -> AppResult<()> {
        let dir = self.mailbox_dir(account, mailbox)?;
        fs::create_dir_all(&dir).await.map_err(|e| {
            AppError::with_source(
                ErrorKind::Storage,
                format!("Failed to create mailbox: {}", dir.display()),
                e,
            )
        })?;
        Ok(())
    }

    async fn mailbox_exists(&self, account: &str, mailbox: &str) -> AppResult<bool> {
        let dir = self.mailbox_dir(account, mailbox)?;
        Ok(fs::try_exists(&dir).await.unwrap_or(false))
    }

    async fn mailboxes(&self, account: &str) -> AppResult<Vec<String>> {
        let dir = self.account_dir(account)?;
        if !fs::try_exists(&dir).await.unwrap_or(false) {
            return Ok(Vec::new());
        }
        let mut entries = fs::read_dir(&dir).await.map_err(|e| {
            AppError::with_source(
                ErrorKind::Storage,
                format!("Failed to list account: {}", dir.display()),
                e,
            )
        })?;
        let mut mailboxes = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            if entry.file_type().await?.is_dir() {
                if let Some(name) = entry.file_name().to_str() {
                    mailboxes.push(name.to_string());
                }
            }
        }
        mailboxes.sort();
        Ok(mailboxes)
    }

    async fn ingest(
        &self,
        account: &str,
        mailbox: &str,
        flags: &[String],
        raw: Bytes,
    ) -> AppResult<MessageMeta> {
        let dir = self.mailbox_dir(account, mailbox)?;
        if !fs::try_exists(&dir).await.unwrap_or(false) {
            return Err(AppError::not_found(format!("Mailbox not found: {mailbox}")));
        }

        let meta = MessageMeta {
            id: Uuid::new_v4(),
            mailbox: mailbox.to_string(),
            size_bytes: raw.len() as u64,
            flags: flags.to_vec(),
            received_at: chrono::Utc::now(),
        };

        fs::write(dir.join(format!("{}.eml", meta.id)), &raw)
            .await
            .map_err(|e| {
                AppError::with_source(
                    ErrorKind::Storage,
                    format!("Failed to write message {}", meta.id),
                    e,
                )
            })?;
        fs::write(
            dir.join(format!("{}.json", meta.id)),
            serde_json::to_vec(&meta)?,
        )
        .await
        .map_err(|e| {
            AppError::with_source(
                ErrorKind::Storage,
                format!("Failed to write metadata {}", meta.id),
                e,
            )
        })?;

        debug!(account, mailbox, id = %meta.id, bytes = meta.size_bytes, "message stored");
        Ok(meta)
    }

    async fn fetch(&self, account: &str, id: Uuid) -> AppResult<Bytes> {
        let dir = self.locate(account, id).await?;
        let data = fs::read(dir.join(format!("{id}.eml"))).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                AppError::not_found(format!("Message not found: {id}"))
            } else {
                AppError::with_source(
                    ErrorKind::Storage,
                    format!("Failed to read message {id}"),
                    e,
                )
            }
        })?;
        Ok(Bytes::from(data))
    }

    async fn metadata(&self, account: &str, id: Uuid) -> AppResult<MessageMeta> {
        let dir = self.locate(account, id).await?;
        Self::read_meta(&dir.join(format!("{id}.json"))).await
    }

    async fn list(&self, account: &str, mailbox: &str) -> AppResult<Vec<MessageMeta>> {
        let dir = self.mailbox_dir(account, mailbox)?;
        if !fs::try_exists(&dir).await.unwrap_or(false) {
            return Err(AppError::not_found(format!("Mailbox not found: {mailbox}")));
        }
        let mut entries = fs::read_dir(&dir).await.map_err(|e| {
            AppError::with_source(
                ErrorKind::Storage,
                format!("Failed to list mailbox: {}", dir.display()),
                e,
            )
        })?;
        let mut messages = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == "json") {
                messages.push(Self::read_meta(&path).await?);
            }
        }
        messages.sort_by_key(|m| m.received_at);
        Ok(messages)
    }

    async fn delete(&self, account: &str, id: Uuid) -> AppResult<()> {
        let dir = self.locate(account, id).await?;
        fs::remove_file(dir.join(format!("{id}.eml"))).await?;
        fs::remove_file(dir.join(format!("{id}.json"))).await?;
        debug!(account, id = %id, "message deleted");
        Ok(())
    }
}

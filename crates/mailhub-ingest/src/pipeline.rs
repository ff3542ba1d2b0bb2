//! Message ingest pipeline.
//!
//! Flow per delivery: `recipient_resolve` picks the default mailbox,
//! `message_ingest` collects filing directives, `delivery_route` may
//! divert the whole delivery, the message is stored, and
//! `after_delivery` observes the result. A `HookFailure` during the
//! delivery hooks is treated as a temporary failure and spooled.

use std::sync::Arc;

use bytes::Bytes;
use serde_json::Value;
use tracing::{debug, info, warn};
use uuid::Uuid;

use mailhub_backend::capability;
use mailhub_backend::registry::BackendRegistry;
use mailhub_core::error::{AppError, ErrorKind};
use mailhub_core::result::AppResult;
use mailhub_core::traits::spool::{DeliverySpool, SpoolEntry};
use mailhub_core::traits::store::{MessageMeta, MessageStore};
use mailhub_hooks::definitions::{HookPayload, HookPoint};
use mailhub_hooks::dispatcher::HookDispatcher;

use crate::directive::{IngestDirective, MailboxTarget};

/// The default mailbox messages are filed into.
pub const INBOX: &str = "INBOX";

/// A message handed to the pipeline for delivery.
#[derive(Debug, Clone)]
pub struct IncomingMessage {
    /// Destination account.
    pub account: String,
    /// Envelope sender address.
    pub sender: String,
    /// Envelope recipient address.
    pub recipient: String,
    /// Parsed message headers.
    pub headers: Vec<(String, String)>,
    /// Raw message contents.
    pub raw: Bytes,
}

/// Where a delivery ended up.
#[derive(Debug, Clone)]
pub enum DeliveryOutcome {
    /// Stored in the listed mailboxes.
    Delivered(Vec<MessageMeta>),
    /// Rejected by a hook directive (permanent failure).
    Rejected {
        /// Why the delivery was rejected.
        reason: String,
    },
    /// Temporarily failed and spooled for retry.
    Spooled {
        /// Spool entry holding the message.
        entry_id: Uuid,
    },
}

/// Message ingest pipeline bound to the process's backends.
#[derive(Debug)]
pub struct IngestPipeline {
    store: Arc<dyn MessageStore>,
    spool: Arc<dyn DeliverySpool>,
    dispatcher: HookDispatcher,
    max_attempts: u32,
}

impl IngestPipeline {
    /// Build the pipeline from the backend registry.
    ///
    /// Resolves the `storage` and `spool` capabilities; the pipeline never
    /// learns which variant is behind either handle.
    pub fn from_registry(
        registry: &BackendRegistry,
        dispatcher: HookDispatcher,
        max_attempts: u32,
    ) -> AppResult<Self> {
        Ok(Self {
            store: registry.resolve(capability::STORAGE)?,
            spool: registry.resolve(capability::SPOOL)?,
            dispatcher,
            max_attempts,
        })
    }

    /// Build the pipeline from explicit handles (used by tests).
    pub fn new(
        store: Arc<dyn MessageStore>,
        spool: Arc<dyn DeliverySpool>,
        dispatcher: HookDispatcher,
        max_attempts: u32,
    ) -> Self {
        Self {
            store,
            spool,
            dispatcher,
            max_attempts,
        }
    }

    /// The bound message store.
    pub fn store(&self) -> &Arc<dyn MessageStore> {
        &self.store
    }

    /// The bound delivery spool.
    pub fn spool(&self) -> &Arc<dyn DeliverySpool> {
        &self.spool
    }

    /// Deliver an incoming message.
    pub async fn deliver(&self, message: &IncomingMessage) -> AppResult<DeliveryOutcome> {
        self.deliver_attempt(message, 0).await
    }

    /// Retry a previously spooled delivery.
    pub async fn retry(&self, entry: SpoolEntry) -> AppResult<DeliveryOutcome> {
        let message = IncomingMessage {
            account: entry.account,
            sender: entry.sender,
            recipient: entry.recipient,
            headers: entry.headers,
            raw: Bytes::from(entry.raw),
        };
        self.deliver_attempt(&message, entry.attempts).await
    }

    async fn deliver_attempt(
        &self,
        message: &IncomingMessage,
        attempts: u32,
    ) -> AppResult<DeliveryOutcome> {
        match self.run_delivery(message).await {
            Ok(outcome) => Ok(outcome),
            Err(err) if err.kind == ErrorKind::HookFailure => {
                let next_attempt = attempts + 1;
                if next_attempt >= self.max_attempts {
                    warn!(
                        account = %message.account,
                        attempts = next_attempt,
                        error = %err,
                        "delivery failed permanently, retry limit reached"
                    );
                    return Err(err);
                }
                let entry = SpoolEntry::new(
                    message.account.clone(),
                    message.sender.clone(),
                    message.recipient.clone(),
                    message.headers.clone(),
                    message.raw.to_vec(),
                    next_attempt,
                );
                let entry_id = entry.id;
                warn!(
                    account = %message.account,
                    entry_id = %entry_id,
                    attempts = next_attempt,
                    error = %err,
                    "delivery failed temporarily, spooling for retry"
                );
                self.spool.enqueue(entry).await?;
                Ok(DeliveryOutcome::Spooled { entry_id })
            }
            Err(err) => Err(err),
        }
    }

    async fn run_delivery(&self, message: &IncomingMessage) -> AppResult<DeliveryOutcome> {
        let resolved = self
            .dispatcher
            .dispatch(&self.payload(HookPoint::RecipientResolve, message))
            .await?;
        let default_mailbox = resolved
            .single_value()
            .and_then(Value::as_str)
            .unwrap_or(INBOX)
            .to_string();

        let ingest = self
            .dispatcher
            .dispatch(&self.payload(HookPoint::MessageIngest, message))
            .await?;

        let mut directives = Vec::new();
        for contribution in ingest.collected() {
            let directive = IngestDirective::from_value(&contribution.value).map_err(|e| {
                AppError::hook_failure(format!(
                    "handler '{}' returned an invalid ingest directive: {e}",
                    contribution.handler
                ))
            })?;
            directives.push(directive);
        }

        if let Some(directive) = directives.iter().find(|d| d.reject) {
            let reason = directive
                .reject_reason
                .clone()
                .unwrap_or_else(|| "rejected by delivery hook".to_string());
            info!(account = %message.account, reason = %reason, "delivery rejected");
            return Ok(DeliveryOutcome::Rejected { reason });
        }

        let skip_inbox = directives.iter().any(|d| d.skip_inbox);
        let mut flags: Vec<String> = Vec::new();
        let mut targets: Vec<MailboxTarget> = Vec::new();
        if !skip_inbox {
            targets.push(MailboxTarget {
                mailbox: default_mailbox,
                create: true,
            });
        }
        for directive in &directives {
            for flag in &directive.flags {
                if !flags.contains(flag) {
                    flags.push(flag.clone());
                }
            }
            for target in &directive.file_into {
                if !targets.iter().any(|t| t.mailbox == target.mailbox) {
                    targets.push(target.clone());
                }
            }
        }

        let routed = self
            .dispatcher
            .dispatch(
                &self
                    .payload(HookPoint::DeliveryRoute, message)
                    .with_data("targets", serde_json::to_value(&targets)?),
            )
            .await?;
        if let Some(value) = routed.single_value() {
            let target: MailboxTarget = serde_json::from_value(value.clone()).map_err(|e| {
                AppError::hook_failure(format!("delivery route override is invalid: {e}"))
            })?;
            debug!(mailbox = %target.mailbox, "delivery diverted by route hook");
            targets = vec![target];
        }

        let mut stored = Vec::new();
        for target in &targets {
            if target.create {
                self.store
                    .create_mailbox(&message.account, &target.mailbox)
                    .await?;
            } else if !self
                .store
                .mailbox_exists(&message.account, &target.mailbox)
                .await?
            {
                // Never file into mailboxes that don't exist.
                warn!(
                    account = %message.account,
                    mailbox = %target.mailbox,
                    "skipping missing mailbox"
                );
                continue;
            }
            let meta = self
                .store
                .ingest(&message.account, &target.mailbox, &flags, message.raw.clone())
                .await?;
            stored.push(meta);
        }

        if stored.is_empty() {
            // All requested mailboxes were invalid; fall back to INBOX
            // rather than dropping mail.
            self.store.create_mailbox(&message.account, INBOX).await?;
            stored.push(
                self.store
                    .ingest(&message.account, INBOX, &flags, message.raw.clone())
                    .await?,
            );
        }

        let after = self
            .dispatcher
            .dispatch(
                &self
                    .payload(HookPoint::AfterDelivery, message)
                    .with_int("messages", stored.len() as i64),
            )
            .await?;
        for failure in &after.soft_failures {
            debug!(handler = %failure.handler, error = %failure.error, "after-delivery handler failed");
        }

        info!(
            account = %message.account,
            mailboxes = stored.len(),
            "message delivered"
        );
        Ok(DeliveryOutcome::Delivered(stored))
    }

    fn payload(&self, hook: HookPoint, message: &IncomingMessage) -> HookPayload {
        HookPayload::new(hook)
            .with_account(&message.account)
            .with_string("sender", &message.sender)
            .with_string("recipient", &message.recipient)
            .with_int("size", message.raw.len() as i64)
            .with_data("headers", serde_json::json!(message.headers))
            .with_string("contents", &String::from_utf8_lossy(&message.raw))
    }
}

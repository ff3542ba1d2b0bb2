//! Filing directives contributed by ingest hook handlers.
//!
//! The directive is the contract of the `message_ingest` hook point:
//! every handler value collected there must deserialize into an
//! [`IngestDirective`].

use serde::{Deserialize, Serialize};
use serde_json::Value;

use mailhub_core::result::AppResult;

/// What an ingest handler wants done with the message being delivered.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IngestDirective {
    /// Reject the delivery outright (permanent failure).
    #[serde(default)]
    pub reject: bool,
    /// Human-readable reject reason.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reject_reason: Option<String>,
    /// Skip the default mailbox filing.
    #[serde(default)]
    pub skip_inbox: bool,
    /// Additional mailboxes to file into.
    #[serde(default)]
    pub file_into: Vec<MailboxTarget>,
    /// Flags to set on the stored message.
    #[serde(default)]
    pub flags: Vec<String>,
}

/// A mailbox a directive files the message into.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MailboxTarget {
    /// Mailbox name.
    pub mailbox: String,
    /// Create the mailbox if it does not exist.
    #[serde(default)]
    pub create: bool,
}

impl IngestDirective {
    /// Directive that rejects the delivery.
    pub fn reject(reason: impl Into<String>) -> Self {
        Self {
            reject: true,
            reject_reason: Some(reason.into()),
            ..Self::default()
        }
    }

    /// Add a filing target.
    pub fn file_into(mut self, mailbox: impl Into<String>, create: bool) -> Self {
        self.file_into.push(MailboxTarget {
            mailbox: mailbox.into(),
            create,
        });
        self
    }

    /// Add a message flag.
    pub fn flag(mut self, flag: impl Into<String>) -> Self {
        self.flags.push(flag.into());
        self
    }

    /// Whether the directive asks for nothing.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Serialize for hook transport.
    pub fn to_value(&self) -> AppResult<Value> {
        Ok(serde_json::to_value(self)?)
    }

    /// Deserialize from a hook contribution.
    pub fn from_value(value: &Value) -> AppResult<Self> {
        Ok(serde_json::from_value(value.clone())?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_roundtrip() {
        let directive = IngestDirective::default()
            .file_into("Receipts", true)
            .flag("\\Seen");
        let value = directive.to_value().expect("serialize");
        assert_eq!(IngestDirective::from_value(&value).expect("parse"), directive);
    }

    #[test]
    fn test_missing_fields_default() {
        let directive =
            IngestDirective::from_value(&serde_json::json!({"skip_inbox": true})).expect("parse");
        assert!(directive.skip_inbox);
        assert!(!directive.reject);
        assert!(directive.file_into.is_empty());
    }

    #[test]
    fn test_reject_constructor() {
        let directive = IngestDirective::reject("spam");
        assert!(directive.reject);
        assert_eq!(directive.reject_reason.as_deref(), Some("spam"));
        assert!(!directive.is_empty());
    }
}

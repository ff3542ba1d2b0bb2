//! Hook point definitions with typed payloads.
//!
//! Each hook point declares its composition rule and failure mode as part
//! of its contract, so the behavior of multiple attached handlers is never
//! ambiguous.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Enumeration of all extension points exposed by the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HookPoint {
    // ── Lifecycle ──
    /// Fired once after backends are bound, before any delivery runs.
    ServerStart,
    /// Fired when the server begins shutdown.
    ServerShutdown,

    // ── Delivery ──
    /// Fired to resolve the target mailbox for a recipient.
    RecipientResolve,
    /// Fired for each message being filed. Handlers contribute ingest
    /// directives.
    MessageIngest,
    /// Fired to pick the filing route. A handler may divert the whole
    /// delivery (e.g., to quarantine).
    DeliveryRoute,
    /// Fired after a message has been stored.
    AfterDelivery,
}

impl HookPoint {
    /// Returns the string name of this hook point.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ServerStart => "server_start",
            Self::ServerShutdown => "server_shutdown",
            Self::RecipientResolve => "recipient_resolve",
            Self::MessageIngest => "message_ingest",
            Self::DeliveryRoute => "delivery_route",
            Self::AfterDelivery => "after_delivery",
        }
    }

    /// How results from multiple handlers are combined.
    pub fn composition_rule(&self) -> CompositionRule {
        match self {
            Self::RecipientResolve => CompositionRule::FirstNonEmpty,
            Self::DeliveryRoute => CompositionRule::ShortCircuit,
            Self::ServerStart | Self::ServerShutdown | Self::MessageIngest | Self::AfterDelivery => {
                CompositionRule::Collect
            }
        }
    }

    /// What the dispatcher does when a handler fails.
    pub fn failure_mode(&self) -> FailureMode {
        match self {
            Self::ServerStart
            | Self::RecipientResolve
            | Self::MessageIngest
            | Self::DeliveryRoute => FailureMode::Abort,
            Self::ServerShutdown | Self::AfterDelivery => FailureMode::Continue,
        }
    }
}

impl std::fmt::Display for HookPoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Composition rule declared by each hook point.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompositionRule {
    /// Handlers run in declared order until one returns a value; that
    /// value wins and remaining handlers are skipped.
    FirstNonEmpty,
    /// All handlers run; their values are concatenated in declared order.
    Collect,
    /// Handlers run in declared order; an [`HookOutcome::Override`] stops
    /// dispatch and replaces the default behavior. Plain values are
    /// ignored at these points.
    ShortCircuit,
}

/// Failure mode declared by each hook point.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureMode {
    /// A handler error stops dispatch and fails the surrounding operation.
    Abort,
    /// Handler errors are recorded and the remaining handlers still run.
    Continue,
}

/// Payload passed to hook handlers — a flexible key-value map.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HookPayload {
    /// The hook point being fired.
    pub hook: HookPoint,
    /// Arbitrary data keyed by string.
    pub data: HashMap<String, Value>,
    /// The account this event concerns, if any.
    pub account: Option<String>,
    /// Timestamp of the event.
    pub timestamp: DateTime<Utc>,
}

impl HookPayload {
    /// Creates a new hook payload.
    pub fn new(hook: HookPoint) -> Self {
        Self {
            hook,
            data: HashMap::new(),
            account: None,
            timestamp: Utc::now(),
        }
    }

    /// Sets the account.
    pub fn with_account(mut self, account: &str) -> Self {
        self.account = Some(account.to_string());
        self
    }

    /// Inserts a typed data value.
    pub fn with_data(mut self, key: &str, value: Value) -> Self {
        self.data.insert(key.to_string(), value);
        self
    }

    /// Inserts a string value.
    pub fn with_string(self, key: &str, value: &str) -> Self {
        self.with_data(key, serde_json::json!(value))
    }

    /// Inserts an integer value.
    pub fn with_int(self, key: &str, value: i64) -> Self {
        self.with_data(key, serde_json::json!(value))
    }

    /// Gets a data value by key.
    pub fn get_data(&self, key: &str) -> Option<&Value> {
        self.data.get(key)
    }

    /// Gets a string data value.
    pub fn get_string(&self, key: &str) -> Option<&str> {
        self.data.get(key).and_then(|v| v.as_str())
    }

    /// Gets an i64 data value.
    pub fn get_i64(&self, key: &str) -> Option<i64> {
        self.data.get(key).and_then(|v| v.as_i64())
    }
}

/// Outcome returned by a single handler invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum HookOutcome {
    /// Nothing to contribute; composition moves to the next handler.
    Empty,
    /// A value for the hook point's composition rule.
    Value(Value),
    /// Replace the default behavior. Honored only at
    /// [`CompositionRule::ShortCircuit`] points.
    Override(Value),
}

impl HookOutcome {
    /// Whether this outcome contributes nothing.
    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Empty)
    }
}

//! Delivery pipeline and webhook endpoint configuration.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Delivery pipeline configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryConfig {
    /// Seconds between spool retry sweeps.
    #[serde(default = "default_retry_interval")]
    pub retry_interval_seconds: u64,
    /// Maximum delivery attempts before a spooled message is dropped.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Webhook endpoints invoked during message ingest.
    #[serde(default)]
    pub hooks: Vec<WebhookEndpointConfig>,
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            retry_interval_seconds: default_retry_interval(),
            max_attempts: default_max_attempts(),
            hooks: Vec::new(),
        }
    }
}

/// Configuration for one webhook endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookEndpointConfig {
    /// Unique endpoint identifier, used in diagnostics.
    pub id: String,
    /// Endpoint URL; the ingest request is POSTed here as JSON.
    pub url: String,
    /// Whether the endpoint is active.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Explicit dispatch order key (lower runs first).
    #[serde(default)]
    pub order: i32,
    /// Request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,
    /// Additional request headers.
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    /// Optional HTTP Basic credentials.
    #[serde(default)]
    pub auth: Option<WebhookAuthConfig>,
    /// Treat endpoint errors and rejections as temporary failures
    /// (the message is spooled and retried) rather than permanent ones.
    #[serde(default = "default_true")]
    pub tempfail_on_error: bool,
    /// Maximum accepted response body size in bytes.
    #[serde(default = "default_max_response_size")]
    pub max_response_size_bytes: usize,
}

impl WebhookEndpointConfig {
    /// Request timeout as a [`Duration`].
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

/// HTTP Basic credentials for a webhook endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookAuthConfig {
    /// Basic auth username.
    pub username: String,
    /// Basic auth secret.
    pub secret: String,
}

fn default_retry_interval() -> u64 {
    60
}

fn default_max_attempts() -> u32 {
    5
}

fn default_timeout() -> u64 {
    30
}

fn default_true() -> bool {
    true
}

fn default_max_response_size() -> usize {
    52_428_800 // 50 MiB
}

//! Hook handlers bridging webhook endpoints into the ingest pipeline.
//!
//! Failure mapping follows the endpoint's `tempfail-on-error` switch:
//! with it set (the default), rejections and transport errors surface as
//! handler failures, which the ingest hook point's abort mode turns into
//! a spooled retry. With it unset, a rejection becomes a permanent reject
//! directive and a transport error is ignored.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};

use mailhub_core::config::delivery::DeliveryConfig;
use mailhub_core::error::AppError;
use mailhub_core::result::AppResult;
use mailhub_hooks::definitions::{HookOutcome, HookPayload};
use mailhub_hooks::registry::HookHandler;
use mailhub_ingest::directive::IngestDirective;

use crate::client::WebhookClient;
use crate::types::{Action, Address, Envelope, Message, Modification, Request, Response};

/// A `message_ingest` handler backed by one webhook endpoint.
#[derive(Debug)]
pub struct WebhookIngestHandler {
    client: WebhookClient,
}

impl WebhookIngestHandler {
    /// Build a handler from endpoint configuration.
    pub fn new(
        endpoint: mailhub_core::config::delivery::WebhookEndpointConfig,
    ) -> AppResult<Self> {
        Ok(Self {
            client: WebhookClient::new(endpoint)?,
        })
    }

    fn request_from_payload(payload: &HookPayload) -> Request {
        let contents = payload.get_string("contents").unwrap_or_default().to_string();
        let size = payload
            .get_i64("size")
            .map(|n| n as usize)
            .unwrap_or(contents.len());
        let headers: Vec<(String, String)> = payload
            .get_data("headers")
            .and_then(|v| serde_json::from_value(v.clone()).ok())
            .unwrap_or_default();

        Request::new(payload.account.clone().unwrap_or_default())
            .with_envelope(Envelope {
                from: Address {
                    address: payload.get_string("sender").unwrap_or_default().to_string(),
                },
                to: Address {
                    address: payload
                        .get_string("recipient")
                        .unwrap_or_default()
                        .to_string(),
                },
            })
            .with_message(Message {
                headers,
                server_headers: Vec::new(),
                contents,
                size,
            })
    }

    fn directive_from_response(response: Response) -> IngestDirective {
        let mut directive = IngestDirective {
            skip_inbox: response.skip_inbox,
            flags: response.flags,
            ..IngestDirective::default()
        };
        for modification in response.modifications {
            match modification {
                Modification::FileInto { folder, flags, create } => {
                    directive = directive.file_into(folder, create);
                    for flag in flags {
                        if !directive.flags.contains(&flag) {
                            directive.flags.push(flag);
                        }
                    }
                }
            }
        }
        directive
    }
}

#[async_trait]
impl HookHandler for WebhookIngestHandler {
    fn id(&self) -> &str {
        &self.client.endpoint().id
    }

    fn order_key(&self) -> i32 {
        self.client.endpoint().order
    }

    async fn invoke(&self, payload: &HookPayload) -> AppResult<HookOutcome> {
        let request = Self::request_from_payload(payload);
        let tempfail = self.client.endpoint().tempfail_on_error;

        match self.client.send(&request).await {
            Ok(response) => match response.action {
                Action::Accept => {
                    debug!(endpoint = %self.id(), "webhook accepted delivery");
                    let directive = Self::directive_from_response(response);
                    if directive.is_empty() {
                        Ok(HookOutcome::Empty)
                    } else {
                        Ok(HookOutcome::Value(directive.to_value()?))
                    }
                }
                Action::Reject if tempfail => Err(AppError::external_service(format!(
                    "Webhook '{}' rejected delivery (temporary)",
                    self.id()
                ))),
                Action::Reject => {
                    debug!(endpoint = %self.id(), "webhook rejected delivery");
                    Ok(HookOutcome::Value(
                        IngestDirective::reject(format!(
                            "rejected by delivery hook '{}'",
                            self.id()
                        ))
                        .to_value()?,
                    ))
                }
            },
            Err(err) if tempfail => Err(err),
            Err(err) => {
                warn!(endpoint = %self.id(), error = %err, "webhook failed, ignoring");
                Ok(HookOutcome::Empty)
            }
        }
    }
}

/// Build the ingest handlers for all enabled endpoints in configuration.
pub fn ingest_handlers(config: &DeliveryConfig) -> AppResult<Vec<Arc<dyn HookHandler>>> {
    config
        .hooks
        .iter()
        .filter(|endpoint| endpoint.enabled)
        .map(|endpoint| {
            WebhookIngestHandler::new(endpoint.clone())
                .map(|handler| Arc::new(handler) as Arc<dyn HookHandler>)
        })
        .collect()
}

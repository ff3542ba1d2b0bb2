//! # mailhub-webhooks
//!
//! HTTP delivery hooks: for each configured endpoint, a handler on the
//! `message_ingest` hook point POSTs the message as JSON and translates
//! the endpoint's verdict (accept/reject, filing modifications) into an
//! ingest directive.
//!
//! This crate is fork-specific: it depends on the upstream crates and is
//! compiled in only when the `webhooks` cargo feature is selected.

pub mod client;
pub mod handler;
pub mod types;

pub use client::WebhookClient;
pub use handler::{WebhookIngestHandler, ingest_handlers};

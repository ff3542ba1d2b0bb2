//! # mailhub-ingest
//!
//! The message ingest pipeline. Resolves the bound store and spool from
//! the backend registry, fires the delivery hook points, applies the
//! directives handlers contribute, and files the message. Temporary
//! failures are spooled for the retry worker.

pub mod directive;
pub mod pipeline;

pub use directive::{IngestDirective, MailboxTarget};
pub use pipeline::{DeliveryOutcome, IncomingMessage, IngestPipeline, INBOX};

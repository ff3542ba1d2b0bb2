//! # mailhub-storage
//!
//! Built-in (default) backend variants for MailHub: the maildir-style
//! filesystem message store and the in-memory delivery spool. The
//! alternative Postgres variants live in their own crate and are compiled
//! in only when selected at build time.

pub mod maildir;
pub mod spool;

pub use maildir::MaildirStore;
pub use spool::MemorySpool;

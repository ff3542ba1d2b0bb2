//! # mailhub-postgres
//!
//! Postgres-backed variants of the `storage` and `spool` capabilities.
//!
//! This crate is fork-specific: it depends on the upstream crates and is
//! compiled in only when the `postgres` cargo feature is selected. No
//! upstream crate knows it exists.

pub mod pool;
pub mod schema;
pub mod spool;
pub mod store;

pub use pool::DatabasePool;
pub use spool::PgDeliverySpool;
pub use store::PgMessageStore;

/// Variant identifier for the Postgres backends.
pub const VARIANT: &str = "postgres";

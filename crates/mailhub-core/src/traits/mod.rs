//! Behavioral contracts implemented by backend variants.
//!
//! Callers depend on these traits through the backend registry, never on a
//! specific variant's identity.

pub mod spool;
pub mod store;

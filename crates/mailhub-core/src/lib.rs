//! # mailhub-core
//!
//! Core crate for MailHub. Contains the store and spool traits,
//! configuration schemas, and the unified error system.
//!
//! This crate has **no** internal dependencies on other MailHub crates.

pub mod config;
pub mod error;
pub mod result;
pub mod traits;

pub use error::AppError;
pub use result::AppResult;

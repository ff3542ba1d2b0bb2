//! # mailhub-hooks
//!
//! Extension hook dispatch for MailHub. Provides:
//!
//! - Hook point definitions with declared composition rules and failure modes
//! - A hook registry sealed before first dispatch, ordered by explicit keys
//! - A dispatcher that applies each point's declared contract
//!
//! Fork-specific behavior attaches here; the default code paths never need
//! to know a handler exists.

pub mod definitions;
pub mod dispatcher;
pub mod registry;

pub use definitions::{
    CompositionRule, FailureMode, HookOutcome, HookPayload, HookPoint,
};
pub use dispatcher::{Contribution, DispatchResult, DispatchValue, HookDispatcher, SoftFailure};
pub use registry::{HookHandler, HookRegistry, HookRegistryBuilder};

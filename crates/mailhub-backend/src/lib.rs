//! # mailhub-backend
//!
//! The feature-gated backend extension system. Provides:
//!
//! - Capability and variant declarations ([`Catalog`])
//! - Feature set resolution with requirement/conflict validation
//! - The backend registry binding one variant handle per capability
//!
//! Capabilities and variants are declared once at startup from what this
//! build compiled in; the resolved [`FeatureSet`] and the registry built
//! from it are immutable for the lifetime of the process.

pub mod catalog;
pub mod registry;
pub mod resolver;

pub use catalog::{Catalog, CatalogBuilder, CapabilityDecl, Selection, VariantDecl};
pub use registry::{BackendRegistry, BackendRegistryBuilder};
pub use resolver::{FeatureSet, resolve};

/// Well-known capability names used across the server.
pub mod capability {
    /// Message store backend.
    pub const STORAGE: &str = "storage";
    /// Delivery spool backend.
    pub const SPOOL: &str = "spool";
}

//! Capability and variant declarations.
//!
//! A [`Catalog`] is the closed set of capabilities and variants compiled
//! into a build. It is assembled once during startup and never changes for
//! the lifetime of the process.

use std::fmt;

use serde::{Deserialize, Serialize};

use mailhub_core::error::AppError;
use mailhub_core::result::AppResult;

/// A (capability, variant) pair used for requests, requirements, and
/// conflicts.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Selection {
    /// Capability name.
    pub capability: String,
    /// Variant identifier.
    pub variant: String,
}

impl Selection {
    /// Create a new selection.
    pub fn new(capability: impl Into<String>, variant: impl Into<String>) -> Self {
        Self {
            capability: capability.into(),
            variant: variant.into(),
        }
    }
}

impl fmt::Display for Selection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.capability, self.variant)
    }
}

/// Declaration of one named axis of pluggable behavior.
#[derive(Debug, Clone)]
pub struct CapabilityDecl {
    /// Capability name (e.g., "storage").
    pub name: String,
    /// Variant bound when none is requested, if any.
    pub default_variant: Option<String>,
}

/// Declaration of one selectable implementation of a capability.
#[derive(Debug, Clone)]
pub struct VariantDecl {
    /// The capability this variant implements.
    pub capability: String,
    /// Variant identifier (e.g., "postgres").
    pub id: String,
    /// Selections that must also be active for this variant to be valid.
    pub requires: Vec<Selection>,
    /// Selections that must not be active alongside this variant.
    pub conflicts: Vec<Selection>,
}

impl VariantDecl {
    /// Declare a variant of a capability.
    pub fn new(capability: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            capability: capability.into(),
            id: id.into(),
            requires: Vec::new(),
            conflicts: Vec::new(),
        }
    }

    /// Add a required selection.
    pub fn requires(mut self, capability: impl Into<String>, variant: impl Into<String>) -> Self {
        self.requires.push(Selection::new(capability, variant));
        self
    }

    /// Add a conflicting selection.
    pub fn conflicts_with(
        mut self,
        capability: impl Into<String>,
        variant: impl Into<String>,
    ) -> Self {
        self.conflicts.push(Selection::new(capability, variant));
        self
    }
}

/// The closed set of capabilities and variants compiled into this build.
///
/// Declaration order is preserved so that resolution is deterministic.
#[derive(Debug, Clone)]
pub struct Catalog {
    capabilities: Vec<CapabilityDecl>,
    variants: Vec<VariantDecl>,
}

impl Catalog {
    /// Start building a catalog.
    pub fn builder() -> CatalogBuilder {
        CatalogBuilder::default()
    }

    /// All declared capabilities, in declaration order.
    pub fn capabilities(&self) -> &[CapabilityDecl] {
        &self.capabilities
    }

    /// Look up a capability declaration by name.
    pub fn capability(&self, name: &str) -> Option<&CapabilityDecl> {
        self.capabilities.iter().find(|c| c.name == name)
    }

    /// Look up a variant declaration.
    pub fn variant(&self, capability: &str, id: &str) -> Option<&VariantDecl> {
        self.variants
            .iter()
            .find(|v| v.capability == capability && v.id == id)
    }

    /// All variants declared for a capability, in declaration order.
    pub fn variants_of<'a>(&'a self, capability: &'a str) -> impl Iterator<Item = &'a VariantDecl> {
        self.variants
            .iter()
            .filter(move |v| v.capability == capability)
    }
}

/// Builder collecting declarations before catalog validation.
#[derive(Debug, Default)]
pub struct CatalogBuilder {
    capabilities: Vec<CapabilityDecl>,
    variants: Vec<VariantDecl>,
}

impl CatalogBuilder {
    /// Declare a capability with an optional default variant.
    pub fn capability(mut self, name: &str, default_variant: Option<&str>) -> Self {
        self.capabilities.push(CapabilityDecl {
            name: name.to_string(),
            default_variant: default_variant.map(str::to_string),
        });
        self
    }

    /// Declare a variant.
    pub fn variant(mut self, decl: VariantDecl) -> Self {
        self.variants.push(decl);
        self
    }

    /// Validate the declarations and produce the catalog.
    pub fn build(self) -> AppResult<Catalog> {
        for (i, cap) in self.capabilities.iter().enumerate() {
            if self.capabilities[..i].iter().any(|c| c.name == cap.name) {
                return Err(AppError::configuration(format!(
                    "capability '{}' is declared twice",
                    cap.name
                )));
            }
        }

        for (i, variant) in self.variants.iter().enumerate() {
            if !self.capabilities.iter().any(|c| c.name == variant.capability) {
                return Err(AppError::configuration(format!(
                    "variant '{}' references undeclared capability '{}'",
                    variant.id, variant.capability
                )));
            }
            if self.variants[..i]
                .iter()
                .any(|v| v.capability == variant.capability && v.id == variant.id)
            {
                return Err(AppError::configuration(format!(
                    "variant '{}' of capability '{}' is declared twice",
                    variant.id, variant.capability
                )));
            }
            for selection in variant.requires.iter().chain(variant.conflicts.iter()) {
                if !self
                    .variants
                    .iter()
                    .any(|v| v.capability == selection.capability && v.id == selection.variant)
                {
                    return Err(AppError::configuration(format!(
                        "variant '{}' of capability '{}' references unknown selection '{selection}'",
                        variant.id, variant.capability
                    )));
                }
            }
        }

        for cap in &self.capabilities {
            if let Some(default) = &cap.default_variant {
                if !self
                    .variants
                    .iter()
                    .any(|v| v.capability == cap.name && v.id == *default)
                {
                    return Err(AppError::configuration(format!(
                        "capability '{}' declares default variant '{default}', which is not declared",
                        cap.name
                    )));
                }
            }
        }

        Ok(Catalog {
            capabilities: self.capabilities,
            variants: self.variants,
        })
    }
}

//! Feature set resolution.
//!
//! [`resolve`] is a pure function of the catalog and the requested flags;
//! it either produces a [`FeatureSet`] covering every declared capability
//! or fails with a descriptive error. No partial configuration is ever
//! allowed to escape.

use std::collections::BTreeMap;

use mailhub_core::error::AppError;
use mailhub_core::result::AppResult;

use crate::catalog::{Catalog, Selection};

/// The fully resolved, immutable mapping of capability → variant.
///
/// Constructed only by [`resolve`]; after startup it is shared read-only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeatureSet {
    bindings: BTreeMap<String, String>,
}

impl FeatureSet {
    /// The variant bound for a capability, if the capability exists.
    pub fn variant_of(&self, capability: &str) -> Option<&str> {
        self.bindings.get(capability).map(String::as_str)
    }

    /// Whether a specific (capability, variant) selection is active.
    pub fn is_active(&self, capability: &str, variant: &str) -> bool {
        self.variant_of(capability) == Some(variant)
    }

    /// Iterate bound (capability, variant) pairs in deterministic order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.bindings
            .iter()
            .map(|(c, v)| (c.as_str(), v.as_str()))
    }

    /// Number of bound capabilities.
    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    /// Whether the feature set is empty.
    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}

/// Resolve the requested flags against the catalog.
///
/// Every requested selection must name a variant compiled into this build;
/// capabilities with no request take their declared default. On success,
/// every declared capability is bound to exactly one variant and all
/// declared requirements and conflicts hold.
pub fn resolve(catalog: &Catalog, requested: &[Selection]) -> AppResult<FeatureSet> {
    for selection in requested {
        if catalog
            .variant(&selection.capability, &selection.variant)
            .is_none()
        {
            return Err(AppError::configuration(format!(
                "unknown feature flag '{selection}': not compiled into this build"
            )));
        }
    }

    let mut explicit: BTreeMap<&str, &Selection> = BTreeMap::new();
    for selection in requested {
        if let Some(previous) = explicit.insert(selection.capability.as_str(), selection) {
            if previous.variant != selection.variant {
                return Err(AppError::configuration_conflict(format!(
                    "flags '{previous}' and '{selection}' both select a variant for capability '{}'",
                    selection.capability
                )));
            }
        }
    }

    let mut bindings: BTreeMap<String, String> = BTreeMap::new();
    for cap in catalog.capabilities() {
        if let Some(selection) = explicit.get(cap.name.as_str()) {
            bindings.insert(cap.name.clone(), selection.variant.clone());
        } else if let Some(default) = &cap.default_variant {
            bindings.insert(cap.name.clone(), default.clone());
        }
    }

    // Requirements and conflicts are checked before unbound capabilities so
    // that the error names the variant that caused the gap.
    for cap in catalog.capabilities() {
        let Some(variant_id) = bindings.get(&cap.name) else {
            continue;
        };
        let decl = catalog.variant(&cap.name, variant_id).ok_or_else(|| {
            AppError::internal(format!(
                "bound variant '{variant_id}' of capability '{}' has no declaration",
                cap.name
            ))
        })?;
        for requirement in &decl.requires {
            if bindings.get(&requirement.capability).map(String::as_str)
                != Some(requirement.variant.as_str())
            {
                return Err(AppError::configuration_conflict(format!(
                    "variant '{}' of capability '{}' requires '{requirement}', which is not active",
                    decl.id, decl.capability
                )));
            }
        }
        for conflict in &decl.conflicts {
            if bindings.get(&conflict.capability).map(String::as_str)
                == Some(conflict.variant.as_str())
            {
                return Err(AppError::configuration_conflict(format!(
                    "variant '{}' of capability '{}' conflicts with active flag '{conflict}'",
                    decl.id, decl.capability
                )));
            }
        }
    }

    for cap in catalog.capabilities() {
        if !bindings.contains_key(&cap.name) {
            return Err(AppError::configuration_conflict(format!(
                "capability '{}' has no requested variant and no declared default",
                cap.name
            )));
        }
    }

    Ok(FeatureSet { bindings })
}

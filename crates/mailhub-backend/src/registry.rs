//! Backend registry — binds one compiled-in variant handle per capability.
//!
//! Binding happens exactly once, during startup, through the builder. The
//! built registry is read-only and may be shared across any number of
//! tasks without synchronization.

use std::any::Any;
use std::collections::BTreeMap;
use std::fmt;

use tracing::info;

use mailhub_core::error::AppError;
use mailhub_core::result::AppResult;

use crate::resolver::FeatureSet;

struct BoundBackend {
    variant: String,
    handle: Box<dyn Any + Send + Sync>,
}

impl fmt::Debug for BoundBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoundBackend")
            .field("variant", &self.variant)
            .finish_non_exhaustive()
    }
}

/// Read-only registry mapping each capability to its bound variant handle.
///
/// Callers depend on a capability's behavioral contract (the handle type,
/// typically an `Arc<dyn Trait>`), never on the identity of the variant
/// behind it.
pub struct BackendRegistry {
    features: FeatureSet,
    bindings: BTreeMap<String, BoundBackend>,
}

impl fmt::Debug for BackendRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();
        for (capability, bound) in &self.bindings {
            map.entry(capability, &bound.variant);
        }
        map.finish()
    }
}

impl BackendRegistry {
    /// Start building a registry for a resolved feature set.
    ///
    /// The registry cannot exist before resolution has run; the feature set
    /// is the proof that it has.
    pub fn builder(features: FeatureSet) -> BackendRegistryBuilder {
        BackendRegistryBuilder {
            features,
            bindings: BTreeMap::new(),
        }
    }

    /// The feature set this registry was built from.
    pub fn feature_set(&self) -> &FeatureSet {
        &self.features
    }

    /// The variant bound for a capability.
    pub fn variant_of(&self, capability: &str) -> AppResult<&str> {
        self.bindings
            .get(capability)
            .map(|b| b.variant.as_str())
            .ok_or_else(|| {
                AppError::unbound_capability(format!(
                    "capability '{capability}' has no bound variant"
                ))
            })
    }

    /// Resolve the bound handle for a capability.
    ///
    /// `H` must be exactly the handle type the builder bound (typically an
    /// `Arc<dyn Trait>`). Every call returns a clone of the same underlying
    /// handle, so two components resolving the same capability within one
    /// process always observe the same variant instance.
    pub fn resolve<H>(&self, capability: &str) -> AppResult<H>
    where
        H: Clone + Send + Sync + 'static,
    {
        let bound = self.bindings.get(capability).ok_or_else(|| {
            AppError::unbound_capability(format!(
                "capability '{capability}' has no bound variant"
            ))
        })?;
        bound.handle.downcast_ref::<H>().cloned().ok_or_else(|| {
            AppError::internal(format!(
                "capability '{capability}' is bound to variant '{}' under a different handle type",
                bound.variant
            ))
        })
    }
}

/// Builder that binds handles for every capability in the feature set.
pub struct BackendRegistryBuilder {
    features: FeatureSet,
    bindings: BTreeMap<String, BoundBackend>,
}

impl BackendRegistryBuilder {
    /// Bind the handle for a capability's selected variant.
    ///
    /// Fails if the capability is not part of the feature set, if `variant`
    /// is not the variant resolution selected, or if the capability is
    /// already bound.
    pub fn bind<H>(mut self, capability: &str, variant: &str, handle: H) -> AppResult<Self>
    where
        H: Clone + Send + Sync + 'static,
    {
        let Some(selected) = self.features.variant_of(capability) else {
            return Err(AppError::unbound_capability(format!(
                "capability '{capability}' is not part of the resolved feature set"
            )));
        };
        if selected != variant {
            return Err(AppError::configuration_conflict(format!(
                "capability '{capability}' resolved to variant '{selected}', refusing to bind '{variant}'"
            )));
        }
        if self.bindings.contains_key(capability) {
            return Err(AppError::configuration_conflict(format!(
                "capability '{capability}' is already bound"
            )));
        }

        info!(capability, variant, "backend bound");

        self.bindings.insert(
            capability.to_string(),
            BoundBackend {
                variant: variant.to_string(),
                handle: Box::new(handle),
            },
        );
        Ok(self)
    }

    /// Finish binding.
    ///
    /// Fails with `UnboundCapability` if any capability in the feature set
    /// was left without a handle.
    pub fn build(self) -> AppResult<BackendRegistry> {
        for (capability, variant) in self.features.iter() {
            if !self.bindings.contains_key(capability) {
                return Err(AppError::unbound_capability(format!(
                    "capability '{capability}' resolved to variant '{variant}' but was never bound"
                )));
            }
        }
        Ok(BackendRegistry {
            features: self.features,
            bindings: self.bindings,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::catalog::{Catalog, Selection, VariantDecl};
    use crate::resolver::resolve;
    use mailhub_core::error::ErrorKind;

    trait Greeter: Send + Sync {
        fn greet(&self) -> String;
    }

    #[derive(Debug)]
    struct EnglishGreeter;

    impl Greeter for EnglishGreeter {
        fn greet(&self) -> String {
            "hello".to_string()
        }
    }

    fn features() -> crate::resolver::FeatureSet {
        let catalog = Catalog::builder()
            .capability("greeter", Some("english"))
            .variant(VariantDecl::new("greeter", "english"))
            .variant(VariantDecl::new("greeter", "french"))
            .build()
            .expect("valid catalog");
        resolve(&catalog, &[]).expect("resolution")
    }

    #[test]
    fn test_bind_and_resolve() {
        let handle: Arc<dyn Greeter> = Arc::new(EnglishGreeter);
        let registry = BackendRegistry::builder(features())
            .bind("greeter", "english", handle)
            .expect("bind")
            .build()
            .expect("build");

        let resolved: Arc<dyn Greeter> = registry.resolve("greeter").expect("resolve");
        assert_eq!(resolved.greet(), "hello");
        assert_eq!(registry.variant_of("greeter").unwrap(), "english");
    }

    #[test]
    fn test_repeated_resolve_returns_same_instance() {
        let handle: Arc<dyn Greeter> = Arc::new(EnglishGreeter);
        let registry = BackendRegistry::builder(features())
            .bind("greeter", "english", handle)
            .expect("bind")
            .build()
            .expect("build");

        let first: Arc<dyn Greeter> = registry.resolve("greeter").expect("resolve");
        let second: Arc<dyn Greeter> = registry.resolve("greeter").expect("resolve");
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn test_resolve_unknown_capability_is_unbound() {
        let handle: Arc<dyn Greeter> = Arc::new(EnglishGreeter);
        let registry = BackendRegistry::builder(features())
            .bind("greeter", "english", handle)
            .expect("bind")
            .build()
            .expect("build");

        let err = registry.resolve::<Arc<dyn Greeter>>("storage").unwrap_err();
        assert_eq!(err.kind, ErrorKind::UnboundCapability);
    }

    #[test]
    fn test_bind_wrong_variant_rejected() {
        let handle: Arc<dyn Greeter> = Arc::new(EnglishGreeter);
        let err = BackendRegistry::builder(features())
            .bind("greeter", "french", handle)
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::ConfigurationConflict);
        assert!(err.message.contains("english"));
    }

    #[test]
    fn test_build_with_missing_binding_fails() {
        let err = BackendRegistry::builder(features()).build().unwrap_err();
        assert_eq!(err.kind, ErrorKind::UnboundCapability);
        assert!(err.message.contains("greeter"));
    }

    #[test]
    fn test_resolve_with_wrong_handle_type_is_internal_error() {
        let handle: Arc<dyn Greeter> = Arc::new(EnglishGreeter);
        let registry = BackendRegistry::builder(features())
            .bind("greeter", "english", handle)
            .expect("bind")
            .build()
            .expect("build");

        let err = registry.resolve::<Arc<String>>("greeter").unwrap_err();
        assert_eq!(err.kind, ErrorKind::Internal);
    }

    #[test]
    fn test_double_bind_rejected() {
        let first: Arc<dyn Greeter> = Arc::new(EnglishGreeter);
        let second: Arc<dyn Greeter> = Arc::new(EnglishGreeter);
        let err = BackendRegistry::builder(features())
            .bind("greeter", "english", first)
            .expect("bind")
            .bind("greeter", "english", second)
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::ConfigurationConflict);
    }

    #[test]
    fn test_bind_capability_outside_feature_set_rejected() {
        let handle: Arc<dyn Greeter> = Arc::new(EnglishGreeter);
        let err = BackendRegistry::builder(features())
            .bind("storage", "maildir", handle)
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::UnboundCapability);
    }

    #[test]
    fn test_requested_variant_binds_over_default() {
        let catalog = Catalog::builder()
            .capability("greeter", Some("english"))
            .variant(VariantDecl::new("greeter", "english"))
            .variant(VariantDecl::new("greeter", "french"))
            .build()
            .expect("valid catalog");
        let features =
            resolve(&catalog, &[Selection::new("greeter", "french")]).expect("resolution");

        #[derive(Debug)]
        struct FrenchGreeter;
        impl Greeter for FrenchGreeter {
            fn greet(&self) -> String {
                "bonjour".to_string()
            }
        }

        let handle: Arc<dyn Greeter> = Arc::new(FrenchGreeter);
        let registry = BackendRegistry::builder(features)
            .bind("greeter", "french", handle)
            .expect("bind")
            .build()
            .expect("build");
        let resolved: Arc<dyn Greeter> = registry.resolve("greeter").expect("resolve");
        assert_eq!(resolved.greet(), "bonjour");
    }
}

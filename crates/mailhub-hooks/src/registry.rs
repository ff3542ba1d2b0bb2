//! Hook registry — handlers keyed by hook point, sealed before dispatch.
//!
//! Registration happens strictly during initialization; [`HookRegistryBuilder::build`]
//! seals the registry, after which no handler can be added or removed.
//! Handlers run in declared order (explicit order keys, ties broken by
//! handler id), never in registration order, so merges cannot reorder
//! dispatch.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use mailhub_core::error::AppError;
use mailhub_core::result::AppResult;

use super::definitions::{HookOutcome, HookPayload, HookPoint};

/// Trait for hook handler implementations.
#[async_trait]
pub trait HookHandler: Send + Sync + std::fmt::Debug {
    /// Stable handler identity, used in diagnostics and for ordering ties.
    fn id(&self) -> &str;

    /// Declared ordering key; lower keys run first.
    fn order_key(&self) -> i32;

    /// Handles one dispatch of a hook point.
    async fn invoke(&self, payload: &HookPayload) -> AppResult<HookOutcome>;
}

/// Builder collecting registrations before the registry is sealed.
#[derive(Debug, Default)]
pub struct HookRegistryBuilder {
    handlers: HashMap<HookPoint, Vec<Arc<dyn HookHandler>>>,
}

impl HookRegistryBuilder {
    /// Creates an empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a handler for a hook point.
    pub fn register(mut self, hook: HookPoint, handler: Arc<dyn HookHandler>) -> Self {
        debug!(
            hook = %hook,
            handler = handler.id(),
            order_key = handler.order_key(),
            "hook handler registered"
        );
        self.handlers.entry(hook).or_default().push(handler);
        self
    }

    /// Seals the registry.
    ///
    /// Handlers are sorted by (order key, id) here, once; dispatch never
    /// re-sorts. Duplicate handler ids at the same point are a wiring
    /// error.
    pub fn build(mut self) -> AppResult<HookRegistry> {
        for (hook, entries) in &mut self.handlers {
            entries.sort_by(|a, b| {
                a.order_key()
                    .cmp(&b.order_key())
                    .then_with(|| a.id().cmp(b.id()))
            });
            for (i, handler) in entries.iter().enumerate() {
                if entries[..i].iter().any(|h| h.id() == handler.id()) {
                    return Err(AppError::configuration(format!(
                        "handler '{}' is registered twice at hook point '{hook}'",
                        handler.id()
                    )));
                }
            }
        }
        Ok(HookRegistry {
            handlers: self.handlers,
        })
    }
}

/// Immutable registry of hook handlers.
///
/// Shareable across tasks without synchronization; no writer exists after
/// [`HookRegistryBuilder::build`].
#[derive(Debug)]
pub struct HookRegistry {
    handlers: HashMap<HookPoint, Vec<Arc<dyn HookHandler>>>,
}

impl HookRegistry {
    /// Starts building a registry.
    pub fn builder() -> HookRegistryBuilder {
        HookRegistryBuilder::new()
    }

    /// All handlers for a hook point, in dispatch order.
    pub fn handlers(&self, hook: HookPoint) -> &[Arc<dyn HookHandler>] {
        self.handlers.get(&hook).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Whether any handlers are registered for a hook point.
    pub fn has_handlers(&self, hook: HookPoint) -> bool {
        !self.handlers(hook).is_empty()
    }

    /// Number of handlers registered for a hook point.
    pub fn handler_count(&self, hook: HookPoint) -> usize {
        self.handlers(hook).len()
    }

    /// All hook points with at least one handler.
    pub fn registered_hooks(&self) -> Vec<HookPoint> {
        self.handlers.keys().copied().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mailhub_core::error::ErrorKind;

    #[derive(Debug)]
    struct NamedHandler {
        id: String,
        order: i32,
    }

    #[async_trait]
    impl HookHandler for NamedHandler {
        fn id(&self) -> &str {
            &self.id
        }

        fn order_key(&self) -> i32 {
            self.order
        }

        async fn invoke(&self, _payload: &HookPayload) -> AppResult<HookOutcome> {
            Ok(HookOutcome::Empty)
        }
    }

    fn handler(id: &str, order: i32) -> Arc<dyn HookHandler> {
        Arc::new(NamedHandler {
            id: id.to_string(),
            order,
        })
    }

    #[test]
    fn test_handlers_sorted_by_order_key_not_registration() {
        let registry = HookRegistry::builder()
            .register(HookPoint::MessageIngest, handler("second", 2))
            .register(HookPoint::MessageIngest, handler("first", 1))
            .build()
            .expect("build");

        let ids: Vec<&str> = registry
            .handlers(HookPoint::MessageIngest)
            .iter()
            .map(|h| h.id())
            .collect();
        assert_eq!(ids, vec!["first", "second"]);
    }

    #[test]
    fn test_order_ties_break_by_id() {
        let registry = HookRegistry::builder()
            .register(HookPoint::MessageIngest, handler("zeta", 1))
            .register(HookPoint::MessageIngest, handler("alpha", 1))
            .build()
            .expect("build");

        let ids: Vec<&str> = registry
            .handlers(HookPoint::MessageIngest)
            .iter()
            .map(|h| h.id())
            .collect();
        assert_eq!(ids, vec!["alpha", "zeta"]);
    }

    #[test]
    fn test_duplicate_id_at_same_point_rejected() {
        let err = HookRegistry::builder()
            .register(HookPoint::MessageIngest, handler("filing", 1))
            .register(HookPoint::MessageIngest, handler("filing", 2))
            .build()
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::Configuration);
        assert!(err.message.contains("filing"));
    }

    #[test]
    fn test_same_id_at_different_points_allowed() {
        let registry = HookRegistry::builder()
            .register(HookPoint::MessageIngest, handler("filing", 1))
            .register(HookPoint::AfterDelivery, handler("filing", 1))
            .build()
            .expect("build");
        assert_eq!(registry.handler_count(HookPoint::MessageIngest), 1);
        assert_eq!(registry.handler_count(HookPoint::AfterDelivery), 1);
    }

    #[test]
    fn test_empty_point_has_no_handlers() {
        let registry = HookRegistry::builder().build().expect("build");
        assert!(!registry.has_handlers(HookPoint::MessageIngest));
        assert!(registry.handlers(HookPoint::MessageIngest).is_empty());
    }
}

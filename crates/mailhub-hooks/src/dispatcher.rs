//! Hook dispatcher — applies each point's declared composition rule and
//! failure mode.
//!
//! Handlers run sequentially in declared order so every composition rule
//! is deterministic. Nothing is retried: a handler failure is a wiring
//! error, not a transient condition.

use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, error, warn};

use mailhub_core::error::AppError;
use mailhub_core::result::AppResult;

use super::definitions::{CompositionRule, FailureMode, HookOutcome, HookPayload, HookPoint};
use super::registry::HookRegistry;

/// One handler's contribution under collect composition.
#[derive(Debug, Clone, PartialEq)]
pub struct Contribution {
    /// Handler that produced the value.
    pub handler: String,
    /// The contributed value.
    pub value: Value,
}

/// Combined value of a dispatch under the point's composition rule.
#[derive(Debug, Clone, PartialEq)]
pub enum DispatchValue {
    /// No handler produced a value.
    Empty,
    /// The winning value under first-non-empty composition.
    First {
        /// Handler that won.
        handler: String,
        /// The winning value.
        value: Value,
    },
    /// Ordered contributions under collect composition.
    Collected(Vec<Contribution>),
    /// A handler short-circuited the default behavior.
    ShortCircuit {
        /// Handler that overrode the default.
        handler: String,
        /// The overriding value.
        value: Value,
    },
}

/// A handler failure tolerated by a continue-mode hook point.
#[derive(Debug, Clone)]
pub struct SoftFailure {
    /// Handler that failed.
    pub handler: String,
    /// The failure.
    pub error: AppError,
}

/// Result of dispatching one payload to all handlers of a hook point.
#[derive(Debug, Clone)]
pub struct DispatchResult {
    /// The hook point that was fired.
    pub hook: HookPoint,
    /// The composed value.
    pub value: DispatchValue,
    /// Failures recorded at continue-mode points.
    pub soft_failures: Vec<SoftFailure>,
}

impl DispatchResult {
    /// The single winning value, if any (first-non-empty or short-circuit).
    pub fn single_value(&self) -> Option<&Value> {
        match &self.value {
            DispatchValue::First { value, .. } | DispatchValue::ShortCircuit { value, .. } => {
                Some(value)
            }
            _ => None,
        }
    }

    /// The ordered contributions of a collect dispatch.
    pub fn collected(&self) -> &[Contribution] {
        match &self.value {
            DispatchValue::Collected(contributions) => contributions,
            _ => &[],
        }
    }

    /// Whether a handler short-circuited the default behavior.
    pub fn short_circuited(&self) -> bool {
        matches!(self.value, DispatchValue::ShortCircuit { .. })
    }
}

/// Dispatches hook payloads against a sealed registry.
#[derive(Debug, Clone)]
pub struct HookDispatcher {
    registry: Arc<HookRegistry>,
}

impl HookDispatcher {
    /// Creates a new dispatcher over a sealed registry.
    pub fn new(registry: Arc<HookRegistry>) -> Self {
        Self { registry }
    }

    /// Returns a reference to the underlying registry.
    pub fn registry(&self) -> &Arc<HookRegistry> {
        &self.registry
    }

    /// Dispatches a payload to all handlers of its hook point.
    ///
    /// The point's declared composition rule decides how outcomes combine;
    /// its declared failure mode decides whether a handler error aborts
    /// the dispatch (`HookFailure` naming handler and point) or is
    /// recorded as a soft failure.
    pub async fn dispatch(&self, payload: &HookPayload) -> AppResult<DispatchResult> {
        let handlers = self.registry.handlers(payload.hook);
        let rule = payload.hook.composition_rule();
        let failure_mode = payload.hook.failure_mode();

        if !handlers.is_empty() {
            debug!(
                hook = %payload.hook,
                handler_count = handlers.len(),
                "dispatching hook"
            );
        }

        let mut value = DispatchValue::Empty;
        let mut collected = Vec::new();
        let mut soft_failures = Vec::new();

        for handler in handlers {
            let outcome = match handler.invoke(payload).await {
                Ok(outcome) => outcome,
                Err(err) => match failure_mode {
                    FailureMode::Abort => {
                        error!(
                            hook = %payload.hook,
                            handler = handler.id(),
                            error = %err,
                            "hook handler failed, aborting dispatch"
                        );
                        return Err(AppError::hook_failure(format!(
                            "handler '{}' failed at hook point '{}': {err}",
                            handler.id(),
                            payload.hook
                        )));
                    }
                    FailureMode::Continue => {
                        warn!(
                            hook = %payload.hook,
                            handler = handler.id(),
                            error = %err,
                            "hook handler failed, continuing"
                        );
                        soft_failures.push(SoftFailure {
                            handler: handler.id().to_string(),
                            error: err,
                        });
                        continue;
                    }
                },
            };

            match (rule, outcome) {
                (_, HookOutcome::Empty) => {}
                (CompositionRule::FirstNonEmpty, HookOutcome::Value(v)) => {
                    value = DispatchValue::First {
                        handler: handler.id().to_string(),
                        value: v,
                    };
                    break;
                }
                (CompositionRule::Collect, HookOutcome::Value(v)) => {
                    collected.push(Contribution {
                        handler: handler.id().to_string(),
                        value: v,
                    });
                }
                (CompositionRule::ShortCircuit, HookOutcome::Override(v)) => {
                    debug!(
                        hook = %payload.hook,
                        handler = handler.id(),
                        "handler short-circuited default behavior"
                    );
                    value = DispatchValue::ShortCircuit {
                        handler: handler.id().to_string(),
                        value: v,
                    };
                    break;
                }
                (CompositionRule::ShortCircuit, HookOutcome::Value(_)) => {
                    debug!(
                        hook = %payload.hook,
                        handler = handler.id(),
                        "ignoring non-overriding value at short-circuit point"
                    );
                }
                (_, HookOutcome::Override(_)) => {
                    warn!(
                        hook = %payload.hook,
                        handler = handler.id(),
                        "ignoring override outcome at non-short-circuit point"
                    );
                }
            }
        }

        if rule == CompositionRule::Collect && !collected.is_empty() {
            value = DispatchValue::Collected(collected);
        }

        Ok(DispatchResult {
            hook: payload.hook,
            value,
            soft_failures,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use serde_json::json;

    use super::*;
    use crate::registry::HookHandler;
    use mailhub_core::error::ErrorKind;

    #[derive(Debug)]
    struct StaticHandler {
        id: String,
        order: i32,
        outcome: HookOutcome,
        calls: Arc<AtomicUsize>,
    }

    impl StaticHandler {
        fn new(id: &str, order: i32, outcome: HookOutcome) -> (Arc<dyn HookHandler>, Arc<AtomicUsize>) {
            let calls = Arc::new(AtomicUsize::new(0));
            let handler = Arc::new(Self {
                id: id.to_string(),
                order,
                outcome,
                calls: calls.clone(),
            });
            (handler, calls)
        }
    }

    #[async_trait]
    impl HookHandler for StaticHandler {
        fn id(&self) -> &str {
            &self.id
        }

        fn order_key(&self) -> i32 {
            self.order
        }

        async fn invoke(&self, _payload: &HookPayload) -> AppResult<HookOutcome> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.outcome.clone())
        }
    }

    #[derive(Debug)]
    struct FailingHandler {
        id: String,
        order: i32,
    }

    #[async_trait]
    impl HookHandler for FailingHandler {
        fn id(&self) -> &str {
            &self.id
        }

        fn order_key(&self) -> i32 {
            self.order
        }

        async fn invoke(&self, _payload: &HookPayload) -> AppResult<HookOutcome> {
            Err(AppError::external_service("endpoint unreachable"))
        }
    }

    fn dispatcher(registry: HookRegistry) -> HookDispatcher {
        HookDispatcher::new(Arc::new(registry))
    }

    #[tokio::test]
    async fn test_first_non_empty_skips_empty_handlers() {
        let (empty, _) = StaticHandler::new("empty", 1, HookOutcome::Empty);
        let (winner, _) = StaticHandler::new("winner", 2, HookOutcome::Value(json!("Archive")));
        let registry = HookRegistry::builder()
            .register(HookPoint::RecipientResolve, empty)
            .register(HookPoint::RecipientResolve, winner)
            .build()
            .expect("build");

        let result = dispatcher(registry)
            .dispatch(&HookPayload::new(HookPoint::RecipientResolve))
            .await
            .expect("dispatch");

        match result.value {
            DispatchValue::First { handler, value } => {
                assert_eq!(handler, "winner");
                assert_eq!(value, json!("Archive"));
            }
            other => panic!("expected First, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_first_non_empty_stops_after_winner() {
        let (winner, _) = StaticHandler::new("winner", 1, HookOutcome::Value(json!("a")));
        let (later, later_calls) = StaticHandler::new("later", 2, HookOutcome::Value(json!("b")));
        let registry = HookRegistry::builder()
            .register(HookPoint::RecipientResolve, winner)
            .register(HookPoint::RecipientResolve, later)
            .build()
            .expect("build");

        let result = dispatcher(registry)
            .dispatch(&HookPayload::new(HookPoint::RecipientResolve))
            .await
            .expect("dispatch");

        assert_eq!(result.single_value(), Some(&json!("a")));
        assert_eq!(later_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_collect_orders_by_key_not_registration() {
        let (a, _) = StaticHandler::new("a", 1, HookOutcome::Value(json!("a")));
        let (b, _) = StaticHandler::new("b", 2, HookOutcome::Value(json!("b")));
        // Registered in reverse order on purpose.
        let registry = HookRegistry::builder()
            .register(HookPoint::MessageIngest, b)
            .register(HookPoint::MessageIngest, a)
            .build()
            .expect("build");

        let result = dispatcher(registry)
            .dispatch(&HookPayload::new(HookPoint::MessageIngest))
            .await
            .expect("dispatch");

        let values: Vec<&Value> = result.collected().iter().map(|c| &c.value).collect();
        assert_eq!(values, vec![&json!("a"), &json!("b")]);
    }

    #[tokio::test]
    async fn test_short_circuit_stops_dispatch() {
        let (quarantine, _) =
            StaticHandler::new("quarantine", 1, HookOutcome::Override(json!({"mailbox": "Quarantine"})));
        let (later, later_calls) = StaticHandler::new("later", 2, HookOutcome::Empty);
        let registry = HookRegistry::builder()
            .register(HookPoint::DeliveryRoute, quarantine)
            .register(HookPoint::DeliveryRoute, later)
            .build()
            .expect("build");

        let result = dispatcher(registry)
            .dispatch(&HookPayload::new(HookPoint::DeliveryRoute))
            .await
            .expect("dispatch");

        assert!(result.short_circuited());
        assert_eq!(later_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_plain_value_ignored_at_short_circuit_point() {
        let (advisory, _) = StaticHandler::new("advisory", 1, HookOutcome::Value(json!("x")));
        let registry = HookRegistry::builder()
            .register(HookPoint::DeliveryRoute, advisory)
            .build()
            .expect("build");

        let result = dispatcher(registry)
            .dispatch(&HookPayload::new(HookPoint::DeliveryRoute))
            .await
            .expect("dispatch");

        assert_eq!(result.value, DispatchValue::Empty);
    }

    #[tokio::test]
    async fn test_abort_mode_names_handler_and_point() {
        let registry = HookRegistry::builder()
            .register(
                HookPoint::MessageIngest,
                Arc::new(FailingHandler {
                    id: "filing".to_string(),
                    order: 1,
                }),
            )
            .build()
            .expect("build");

        let err = dispatcher(registry)
            .dispatch(&HookPayload::new(HookPoint::MessageIngest))
            .await
            .unwrap_err();

        assert_eq!(err.kind, ErrorKind::HookFailure);
        assert!(err.message.contains("filing"));
        assert!(err.message.contains("message_ingest"));
    }

    #[tokio::test]
    async fn test_continue_mode_records_soft_failure_and_runs_rest() {
        let (observer, observer_calls) = StaticHandler::new("observer", 2, HookOutcome::Empty);
        let registry = HookRegistry::builder()
            .register(
                HookPoint::AfterDelivery,
                Arc::new(FailingHandler {
                    id: "audit".to_string(),
                    order: 1,
                }),
            )
            .register(HookPoint::AfterDelivery, observer)
            .build()
            .expect("build");

        let result = dispatcher(registry)
            .dispatch(&HookPayload::new(HookPoint::AfterDelivery))
            .await
            .expect("dispatch");

        assert_eq!(result.soft_failures.len(), 1);
        assert_eq!(result.soft_failures[0].handler, "audit");
        assert_eq!(observer_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_dispatch_with_no_handlers_is_empty() {
        let registry = HookRegistry::builder().build().expect("build");
        let result = dispatcher(registry)
            .dispatch(&HookPayload::new(HookPoint::MessageIngest))
            .await
            .expect("dispatch");
        assert_eq!(result.value, DispatchValue::Empty);
        assert!(result.soft_failures.is_empty());
    }
}

//! End-to-end delivery through the registry, hooks, and the maildir store.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;

use mailhub_backend::capability;
use mailhub_backend::catalog::{Catalog, VariantDecl};
use mailhub_backend::registry::BackendRegistry;
use mailhub_backend::resolver::resolve;
use mailhub_core::result::AppResult;
use mailhub_core::traits::spool::DeliverySpool;
use mailhub_core::traits::store::MessageStore;
use mailhub_hooks::definitions::{HookOutcome, HookPayload, HookPoint};
use mailhub_hooks::dispatcher::HookDispatcher;
use mailhub_hooks::registry::{HookHandler, HookRegistry};
use mailhub_ingest::directive::IngestDirective;
use mailhub_ingest::pipeline::{DeliveryOutcome, IncomingMessage, IngestPipeline};
use mailhub_storage::{MaildirStore, MemorySpool};

#[derive(Debug)]
struct FilingHandler;

#[async_trait]
impl HookHandler for FilingHandler {
    fn id(&self) -> &str {
        "filing"
    }

    fn order_key(&self) -> i32 {
        1
    }

    async fn invoke(&self, _payload: &HookPayload) -> AppResult<HookOutcome> {
        Ok(HookOutcome::Value(
            IngestDirective::default()
                .file_into("Receipts", true)
                .flag("$receipt")
                .to_value()?,
        ))
    }
}

async fn built_registry(root: &str) -> BackendRegistry {
    let catalog = Catalog::builder()
        .capability(capability::STORAGE, Some(mailhub_storage::maildir::VARIANT))
        .capability(capability::SPOOL, Some(mailhub_storage::spool::VARIANT))
        .variant(VariantDecl::new(
            capability::STORAGE,
            mailhub_storage::maildir::VARIANT,
        ))
        .variant(VariantDecl::new(
            capability::SPOOL,
            mailhub_storage::spool::VARIANT,
        ))
        .build()
        .expect("catalog");
    let features = resolve(&catalog, &[]).expect("resolution");

    let store: Arc<dyn MessageStore> =
        Arc::new(MaildirStore::open(root).await.expect("open store"));
    let spool: Arc<dyn DeliverySpool> = Arc::new(MemorySpool::new());

    BackendRegistry::builder(features)
        .bind(capability::STORAGE, mailhub_storage::maildir::VARIANT, store)
        .expect("bind store")
        .bind(capability::SPOOL, mailhub_storage::spool::VARIANT, spool)
        .expect("bind spool")
        .build()
        .expect("build registry")
}

#[tokio::test]
async fn test_delivery_files_through_bound_backends() {
    let dir = tempfile::tempdir().expect("tempdir");
    let registry = built_registry(dir.path().to_str().unwrap()).await;

    let hooks = HookRegistry::builder()
        .register(HookPoint::MessageIngest, Arc::new(FilingHandler))
        .build()
        .expect("hooks");
    let pipeline = IngestPipeline::from_registry(
        &registry,
        HookDispatcher::new(Arc::new(hooks)),
        3,
    )
    .expect("pipeline");

    let raw = Bytes::from_static(b"Subject: invoice\r\n\r\nattached");
    let outcome = pipeline
        .deliver(&IncomingMessage {
            account: "alice".to_string(),
            sender: "shop@example.com".to_string(),
            recipient: "alice@example.com".to_string(),
            headers: vec![("Subject".to_string(), "invoice".to_string())],
            raw: raw.clone(),
        })
        .await
        .expect("deliver");

    let stored = match outcome {
        DeliveryOutcome::Delivered(stored) => stored,
        other => panic!("expected Delivered, got {other:?}"),
    };
    let mailboxes: Vec<&str> = stored.iter().map(|m| m.mailbox.as_str()).collect();
    assert_eq!(mailboxes, vec!["INBOX", "Receipts"]);

    // The message is readable back through the same registry handle.
    let store: Arc<dyn MessageStore> = registry.resolve(capability::STORAGE).expect("resolve");
    for meta in &stored {
        assert_eq!(store.fetch("alice", meta.id).await.expect("fetch"), raw);
        assert!(meta.flags.contains(&"$receipt".to_string()));
    }
}

#[tokio::test]
async fn test_pipeline_and_store_observe_same_variant() {
    let dir = tempfile::tempdir().expect("tempdir");
    let registry = built_registry(dir.path().to_str().unwrap()).await;

    let hooks = HookRegistry::builder().build().expect("hooks");
    let pipeline = IngestPipeline::from_registry(
        &registry,
        HookDispatcher::new(Arc::new(hooks)),
        3,
    )
    .expect("pipeline");

    let direct: Arc<dyn MessageStore> = registry.resolve(capability::STORAGE).expect("resolve");
    assert!(Arc::ptr_eq(pipeline.store(), &direct));
}

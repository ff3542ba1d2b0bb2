//! Integration tests for feature resolution and backend binding.

use std::sync::Arc;

use mailhub_backend::catalog::{Catalog, Selection, VariantDecl};
use mailhub_backend::registry::BackendRegistry;
use mailhub_backend::resolver::resolve;
use mailhub_core::error::ErrorKind;

/// Catalog mirroring a build with both storage variants compiled in.
fn full_catalog() -> Catalog {
    Catalog::builder()
        .capability("storage", Some("maildir"))
        .capability("spool", Some("memory"))
        .capability("async-runtime", None)
        .variant(VariantDecl::new("storage", "maildir"))
        .variant(VariantDecl::new("storage", "postgres").requires("async-runtime", "enabled"))
        .variant(VariantDecl::new("spool", "memory"))
        .variant(VariantDecl::new("spool", "postgres").requires("storage", "postgres"))
        .variant(VariantDecl::new("async-runtime", "enabled"))
        .build()
        .expect("valid catalog")
}

#[test]
fn test_same_flags_always_bind_same_variants() {
    let catalog = full_catalog();
    let requested = vec![
        Selection::new("storage", "postgres"),
        Selection::new("async-runtime", "enabled"),
    ];
    let runs: Vec<_> = (0..5)
        .map(|_| resolve(&catalog, &requested).expect("resolution"))
        .collect();
    for features in &runs[1..] {
        assert_eq!(features, &runs[0]);
    }
}

#[test]
fn test_postgres_without_async_runtime_names_both_flags() {
    let catalog = full_catalog();
    let err = resolve(&catalog, &[Selection::new("storage", "postgres")]).unwrap_err();
    assert_eq!(err.kind, ErrorKind::ConfigurationConflict);
    assert!(err.message.contains("postgres"), "message: {}", err.message);
    assert!(
        err.message.contains("async-runtime"),
        "message: {}",
        err.message
    );
}

#[test]
fn test_conflicting_pair_never_silently_resolved() {
    let catalog = Catalog::builder()
        .capability("storage", Some("maildir"))
        .capability("compression", Some("zstd"))
        .variant(VariantDecl::new("storage", "maildir"))
        .variant(VariantDecl::new("storage", "postgres"))
        .variant(VariantDecl::new("compression", "zstd"))
        .variant(VariantDecl::new("compression", "none").conflicts_with("storage", "postgres"))
        .build()
        .expect("valid catalog");

    let err = resolve(
        &catalog,
        &[
            Selection::new("compression", "none"),
            Selection::new("storage", "postgres"),
        ],
    )
    .unwrap_err();
    assert_eq!(err.kind, ErrorKind::ConfigurationConflict);
}

#[test]
fn test_registry_binding_is_idempotent_across_components() {
    // Two separate components resolving the same capability must observe
    // the same variant instance.
    let catalog = Catalog::builder()
        .capability("storage", Some("maildir"))
        .variant(VariantDecl::new("storage", "maildir"))
        .build()
        .expect("valid catalog");
    let features = resolve(&catalog, &[]).expect("resolution");

    let handle: Arc<String> = Arc::new("maildir-store".to_string());
    let registry = BackendRegistry::builder(features)
        .bind("storage", "maildir", handle)
        .expect("bind")
        .build()
        .expect("build");

    let component_a: Arc<String> = registry.resolve("storage").expect("resolve");
    let component_b: Arc<String> = registry.resolve("storage").expect("resolve");
    assert!(Arc::ptr_eq(&component_a, &component_b));
}

#[test]
fn test_no_flags_binds_declared_defaults() {
    let catalog = Catalog::builder()
        .capability("storage", Some("maildir"))
        .capability("spool", Some("memory"))
        .variant(VariantDecl::new("storage", "maildir"))
        .variant(VariantDecl::new("storage", "postgres"))
        .variant(VariantDecl::new("spool", "memory"))
        .build()
        .expect("valid catalog");

    let features = resolve(&catalog, &[]).expect("resolution");
    assert!(features.is_active("storage", "maildir"));
    assert!(features.is_active("spool", "memory"));
}

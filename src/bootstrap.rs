//! Startup wiring: catalog assembly, feature resolution, backend binding,
//! and hook registration.
//!
//! This module is the fork-side composition point. It is the only place
//! that names concrete variants; everything downstream goes through the
//! backend registry and the hook dispatcher.

use std::sync::Arc;

use tracing::info;

use mailhub_backend::capability;
use mailhub_backend::catalog::{Catalog, Selection, VariantDecl};
use mailhub_backend::registry::BackendRegistry;
use mailhub_backend::resolver::{FeatureSet, resolve};
use mailhub_core::config::AppConfig;
use mailhub_core::error::AppError;
use mailhub_core::result::AppResult;
use mailhub_core::traits::spool::DeliverySpool;
use mailhub_core::traits::store::MessageStore;
use mailhub_hooks::registry::HookRegistry;

#[cfg(feature = "webhooks")]
use mailhub_hooks::definitions::HookPoint;

/// Declare the capabilities and variants compiled into this build.
///
/// The cargo feature surface decides what appears here; a variant that is
/// not declared cannot be selected at runtime.
pub fn build_catalog() -> AppResult<Catalog> {
    #[allow(unused_mut)]
    let mut builder = Catalog::builder()
        .capability(capability::STORAGE, Some(mailhub_storage::maildir::VARIANT))
        .capability(capability::SPOOL, Some(mailhub_storage::spool::VARIANT))
        .variant(VariantDecl::new(
            capability::STORAGE,
            mailhub_storage::maildir::VARIANT,
        ))
        .variant(VariantDecl::new(
            capability::SPOOL,
            mailhub_storage::spool::VARIANT,
        ));

    #[cfg(feature = "postgres")]
    {
        builder = builder
            .variant(VariantDecl::new(
                capability::STORAGE,
                mailhub_postgres::VARIANT,
            ))
            .variant(
                // The Postgres spool shares the store's pool.
                VariantDecl::new(capability::SPOOL, mailhub_postgres::VARIANT)
                    .requires(capability::STORAGE, mailhub_postgres::VARIANT),
            );
    }

    builder.build()
}

/// Resolve the runtime-requested flags against the compiled-in catalog.
pub fn resolve_features(catalog: &Catalog, config: &AppConfig) -> AppResult<FeatureSet> {
    let requested: Vec<Selection> = config
        .features
        .iter()
        .map(|(capability, variant)| Selection::new(capability, variant))
        .collect();
    resolve(catalog, &requested)
}

/// Construct and bind the backends the feature set selected.
pub async fn bind_backends(
    config: &AppConfig,
    features: FeatureSet,
) -> AppResult<BackendRegistry> {
    let storage_variant = bound_variant(&features, capability::STORAGE)?;
    let spool_variant = bound_variant(&features, capability::SPOOL)?;

    #[cfg(feature = "postgres")]
    let pg_pool = {
        let needs_postgres = features.is_active(capability::STORAGE, mailhub_postgres::VARIANT)
            || features.is_active(capability::SPOOL, mailhub_postgres::VARIANT);
        if needs_postgres {
            Some(mailhub_postgres::DatabasePool::connect(&config.database).await?)
        } else {
            None
        }
    };

    let builder = BackendRegistry::builder(features);

    let builder = match storage_variant.as_str() {
        mailhub_storage::maildir::VARIANT => {
            let store: Arc<dyn MessageStore> = Arc::new(
                mailhub_storage::MaildirStore::open(&config.storage.maildir.root_path).await?,
            );
            builder.bind(capability::STORAGE, mailhub_storage::maildir::VARIANT, store)?
        }
        #[cfg(feature = "postgres")]
        mailhub_postgres::VARIANT => {
            let pool = postgres_pool(&pg_pool)?;
            let store: Arc<dyn MessageStore> = Arc::new(mailhub_postgres::PgMessageStore::new(pool));
            builder.bind(capability::STORAGE, mailhub_postgres::VARIANT, store)?
        }
        other => {
            return Err(AppError::configuration_conflict(format!(
                "storage variant '{other}' is not compiled into this build"
            )));
        }
    };

    let builder = match spool_variant.as_str() {
        mailhub_storage::spool::VARIANT => {
            let spool: Arc<dyn DeliverySpool> = Arc::new(mailhub_storage::MemorySpool::new());
            builder.bind(capability::SPOOL, mailhub_storage::spool::VARIANT, spool)?
        }
        #[cfg(feature = "postgres")]
        mailhub_postgres::VARIANT => {
            let pool = postgres_pool(&pg_pool)?;
            let spool: Arc<dyn DeliverySpool> =
                Arc::new(mailhub_postgres::PgDeliverySpool::new(pool));
            builder.bind(capability::SPOOL, mailhub_postgres::VARIANT, spool)?
        }
        other => {
            return Err(AppError::configuration_conflict(format!(
                "spool variant '{other}' is not compiled into this build"
            )));
        }
    };

    builder.build()
}

/// Register fork-provided hook handlers and seal the registry.
pub fn build_hook_registry(config: &AppConfig) -> AppResult<Arc<HookRegistry>> {
    #[cfg(feature = "webhooks")]
    let (builder, registered) = {
        let mut builder = HookRegistry::builder();
        let mut registered = 0usize;
        for handler in mailhub_webhooks::ingest_handlers(&config.delivery)? {
            builder = builder.register(HookPoint::MessageIngest, handler);
            registered += 1;
        }
        (builder, registered)
    };
    #[cfg(not(feature = "webhooks"))]
    let (builder, registered) = (HookRegistry::builder(), 0usize);

    if !config.delivery.hooks.is_empty() && registered == 0 {
        return Err(AppError::configuration(
            "delivery hooks are configured but this build does not include webhook support",
        ));
    }

    info!(handlers = registered, "hook registry sealed");
    Ok(Arc::new(builder.build()?))
}

fn bound_variant(features: &FeatureSet, capability: &str) -> AppResult<String> {
    features
        .variant_of(capability)
        .map(str::to_string)
        .ok_or_else(|| {
            AppError::unbound_capability(format!(
                "capability '{capability}' missing from the resolved feature set"
            ))
        })
}

#[cfg(feature = "postgres")]
fn postgres_pool(pool: &Option<mailhub_postgres::DatabasePool>) -> AppResult<&mailhub_postgres::DatabasePool> {
    pool.as_ref()
        .ok_or_else(|| AppError::internal("postgres pool was not initialized"))
}

//! MailHub Server — mail platform with feature-gated backends.
//!
//! Main entry point: loads configuration, resolves the feature set, binds
//! backends, wires hooks, and runs the spool retry worker until shutdown.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt};

use mailhub_core::config::AppConfig;
use mailhub_core::error::AppError;
use mailhub_hooks::definitions::{HookPayload, HookPoint};
use mailhub_hooks::dispatcher::HookDispatcher;
use mailhub_ingest::pipeline::{DeliveryOutcome, IngestPipeline};

mod bootstrap;

#[tokio::main]
async fn main() {
    let config = match load_configuration() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    init_logging(&config);

    if let Err(e) = run(config).await {
        tracing::error!("Server error: {}", e);
        std::process::exit(1);
    }
}

/// Load configuration from file and environment
fn load_configuration() -> Result<AppConfig, AppError> {
    let config_path =
        std::env::var("MAILHUB_CONFIG").unwrap_or_else(|_| "config/default".to_string());
    AppConfig::load(&config_path)
}

/// Initialize tracing/logging
fn init_logging(config: &AppConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    match config.logging.format.as_str() {
        "json" => {
            fmt()
                .json()
                .with_env_filter(filter)
                .with_target(true)
                .init();
        }
        _ => {
            fmt().pretty().with_env_filter(filter).with_target(true).init();
        }
    }
}

/// Main server run function
async fn run(config: AppConfig) -> Result<(), AppError> {
    info!("Starting MailHub v{}", env!("CARGO_PKG_VERSION"));

    // Resolution and wiring happen once, sequentially, before any
    // delivery concurrency begins. Failures here terminate startup.
    let catalog = bootstrap::build_catalog()?;
    let features = bootstrap::resolve_features(&catalog, &config)?;
    for (capability, variant) in features.iter() {
        info!(capability, variant, "feature resolved");
    }

    let registry = bootstrap::bind_backends(&config, features).await?;
    let hooks = bootstrap::build_hook_registry(&config)?;
    let dispatcher = HookDispatcher::new(hooks);

    dispatcher
        .dispatch(&HookPayload::new(HookPoint::ServerStart))
        .await?;

    let pipeline = Arc::new(IngestPipeline::from_registry(
        &registry,
        dispatcher.clone(),
        config.delivery.max_attempts,
    )?);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let worker = tokio::spawn(retry_worker(
        pipeline.clone(),
        config.delivery.retry_interval_seconds,
        shutdown_rx,
    ));

    info!("MailHub is ready");

    tokio::signal::ctrl_c()
        .await
        .map_err(|e| AppError::internal(format!("Failed to listen for shutdown signal: {e}")))?;
    info!("Shutdown signal received");

    let _ = shutdown_tx.send(true);
    let _ = worker.await;

    let shutdown_result = dispatcher
        .dispatch(&HookPayload::new(HookPoint::ServerShutdown))
        .await?;
    for failure in &shutdown_result.soft_failures {
        warn!(handler = %failure.handler, error = %failure.error, "shutdown handler failed");
    }

    info!("Shutdown complete");
    Ok(())
}

/// Periodically drain the delivery spool and retry spooled messages.
async fn retry_worker(
    pipeline: Arc<IngestPipeline>,
    interval_seconds: u64,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut ticker = tokio::time::interval(Duration::from_secs(interval_seconds.max(1)));
    loop {
        tokio::select! {
            _ = ticker.tick() => drain_spool(&pipeline).await,
            _ = shutdown.changed() => {
                if *shutdown.borrow() {
                    break;
                }
            }
        }
    }
}

async fn drain_spool(pipeline: &IngestPipeline) {
    loop {
        let entry = match pipeline.spool().dequeue().await {
            Ok(Some(entry)) => entry,
            Ok(None) => break,
            Err(err) => {
                warn!(error = %err, "spool dequeue failed");
                break;
            }
        };

        let entry_id = entry.id;
        match pipeline.retry(entry).await {
            Ok(DeliveryOutcome::Delivered(stored)) => {
                info!(entry_id = %entry_id, mailboxes = stored.len(), "spooled delivery completed");
            }
            Ok(DeliveryOutcome::Rejected { reason }) => {
                warn!(entry_id = %entry_id, reason = %reason, "spooled delivery rejected");
            }
            Ok(DeliveryOutcome::Spooled { .. }) => {
                // Still failing; leave the rest of the spool for the next
                // sweep instead of spinning on it.
                break;
            }
            Err(err) => {
                warn!(entry_id = %entry_id, error = %err, "spooled delivery dropped");
            }
        }
    }
}

//! JobHost server: schedules configured triggers and runs each firing's
//! plugin in its own isolated context.

use std::sync::Arc;

use tokio::sync::{broadcast, watch};
use tracing;
use tracing_subscriber::{EnvFilter, fmt};

use jobhost_core::config::{AppConfig, LogFormat};
use jobhost_core::error::AppError;
use jobhost_core::events::{AuditTrail, AuditedEventBus, BroadcastEventBus, CompletionEvent, EventBus};
use jobhost_plugin::{PluginRunner, ProcessContextManager};
use jobhost_worker::{CronScheduler, JobExecutor, PluginJobHandler};

const AUDIT_CAPACITY: usize = 1024;

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

/// Load and validate configuration from file and environment
fn load_configuration() -> Result<AppConfig, AppError> {
    let config_path =
        std::env::var("JOBHOST_CONFIG").unwrap_or_else(|_| "config/default.toml".to_string());

    let config = AppConfig::load(&config_path)?;
    config.validate()?;
    Ok(config)
}

/// Initialize tracing/logging
fn init_logging(config: &AppConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    match config.logging.format {
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(filter)
                .with_target(true)
                .with_thread_ids(true)
                .init();
        }
        LogFormat::Pretty => {
            fmt()
                .pretty()
                .with_env_filter(filter)
                .with_target(true)
                .init();
        }
    }
}

async fn run(config: AppConfig) -> Result<(), AppError> {
    tracing::info!(
        "Starting JobHost v{} (instance '{}', id '{}')",
        env!("CARGO_PKG_VERSION"),
        config.scheduler.instance_name,
        config.scheduler.instance_id
    );

    // ── Event bus ────────────────────────────────────────────────
    let broadcast_bus = Arc::new(BroadcastEventBus::default());
    let events = broadcast_bus.subscribe();
    let audit = config
        .scheduler
        .enable_audit_history
        .then(|| Arc::new(AuditTrail::new(AUDIT_CAPACITY)));
    let bus: Arc<dyn EventBus> = match &audit {
        Some(trail) => Arc::new(AuditedEventBus::new(broadcast_bus, Arc::clone(trail))),
        None => broadcast_bus,
    };

    // ── Plugin host ──────────────────────────────────────────────
    let contexts = ProcessContextManager::from_config(&config.plugins)?;
    tracing::info!(
        "Sandbox executable: {}",
        contexts.sandbox_executable().display()
    );
    let runner = Arc::new(PluginRunner::new(Arc::new(contexts), bus));

    // ── Scheduler ────────────────────────────────────────────────
    let mut executor = JobExecutor::new();
    executor.register(Arc::new(PluginJobHandler::new(runner)));
    let scheduler = CronScheduler::new(Arc::new(executor)).await?;

    for trigger in &config.triggers {
        scheduler.schedule(trigger).await?;
    }
    if config.triggers.is_empty() {
        tracing::warn!("No triggers configured; the scheduler will stay idle");
    }

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let event_log = tokio::spawn(log_events(events, shutdown_rx));

    scheduler.start().await?;
    tracing::info!("JobHost running with {} trigger(s)", config.triggers.len());

    shutdown_signal().await;
    tracing::info!("Shutdown signal received, stopping scheduler...");

    scheduler.shutdown().await?;
    let _ = shutdown_tx.send(true);
    if let Err(e) = event_log.await {
        tracing::warn!("Event log task ended abnormally: {}", e);
    }

    if let Some(trail) = audit {
        tracing::info!(
            "Audit history: {} event(s) retained, {} failure(s)",
            trail.entries().len(),
            trail.failure_count()
        );
    }

    tracing::info!("JobHost stopped");
    Ok(())
}

/// Log every completion event until shutdown
async fn log_events(mut events: broadcast::Receiver<CompletionEvent>, mut shutdown: watch::Receiver<bool>) {
    loop {
        tokio::select! {
            received = events.recv() => match received {
                Ok(event) if event.success => {
                    tracing::info!(id = %event.id, job_type = %event.job_type, "Job succeeded");
                }
                Ok(event) => {
                    tracing::warn!(id = %event.id, job_type = %event.job_type, "Job failed");
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!("Event log lagged, {} event(s) skipped", skipped);
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
            _ = shutdown.changed() => break,
        }
    }
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

//! webhook-gate
//!
//! Admission service for inbound third-party webhooks.
//!
//! # Architecture Overview
//!
//! ```text
//!   Webhook sender
//!        │
//!        ▼
//!   ┌─────────────┐   429   ┌──────────────┐  401/403  ┌──────────────────┐
//!   │ rate limit  │───────▶ │   verifier   │─────────▶ │ delivery queue   │──▶ consumer
//!   │ (sliding    │         │ IP allow-list│   202     │ (AcceptedWebhook)│
//!   │  window)    │         │ secret check │           └──────────────────┘
//!   └─────────────┘         └──────────────┘
//!
//!   Cross-cutting: config (+ hot reload), sanitized logging, metrics,
//!   admin API (strict limiter + bearer auth), graceful shutdown.
//! ```

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc};

use webhook_gate::config::loader::{load_config, load_from_env};
use webhook_gate::config::watcher::ConfigWatcher;
use webhook_gate::http::server::serve;
use webhook_gate::http::AcceptedWebhook;
use webhook_gate::lifecycle::signals::shutdown_on_signal;
use webhook_gate::observability::sanitize::Sanitized;
use webhook_gate::observability::{logging, metrics};
use webhook_gate::security::rate_limit::run_sweeper;
use webhook_gate::{GateServer, Shutdown};

#[derive(Parser)]
#[command(name = "webhook-gate")]
#[command(about = "Admission gate for inbound webhooks", long_about = None)]
struct Args {
    /// Path to a TOML config file. Without it, defaults plus environment are used.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Reload the webhook policy when the config file changes.
    #[arg(long, requires = "config")]
    watch: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => load_config(path)?,
        None => load_from_env()?,
    };

    logging::init_logging(&config.observability);

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        bind_address = %config.listener.bind_address,
        mode = ?config.webhook.mode,
        rate_limiting = config.rate_limit.enabled,
        "webhook-gate starting"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let shutdown = Shutdown::new();
    tokio::spawn(shutdown_on_signal(shutdown.clone()));

    let (server, deliveries) = GateServer::new(config.clone())?;
    let consumer = tokio::spawn(consume_deliveries(deliveries, shutdown.subscribe()));

    if config.rate_limit.sweep_interval_secs > 0 {
        let state = server.state();
        tokio::spawn(run_sweeper(
            vec![state.webhook_limiter.clone(), state.strict_limiter.clone()],
            Duration::from_secs(config.rate_limit.sweep_interval_secs),
            shutdown.subscribe(),
        ));
    }

    if config.admin.enabled {
        let admin_listener = TcpListener::bind(&config.admin.bind_address).await?;
        tracing::info!(address = %admin_listener.local_addr()?, "Admin API listening");
        let router = server.admin_router();
        let rx = shutdown.subscribe();
        tokio::spawn(async move {
            if let Err(e) = serve(admin_listener, router, rx).await {
                tracing::error!(error = %e, "Admin server failed");
            }
        });
    }

    // The watcher handle must outlive the server.
    let (_watcher, config_updates, _updates_tx) = match (&args.config, args.watch) {
        (Some(path), true) => {
            let (watcher, rx) = ConfigWatcher::new(path);
            (Some(watcher.run()?), rx, None)
        }
        _ => {
            let (tx, rx) = mpsc::unbounded_channel();
            (None, rx, Some(tx))
        }
    };

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    server.run(listener, config_updates, shutdown.subscribe()).await?;

    shutdown.trigger();
    if let Err(e) = consumer.await {
        tracing::error!(error = %e, "Delivery consumer task failed");
    }

    tracing::info!("Shutdown complete");
    Ok(())
}

/// Hand accepted deliveries to business logic. Field mapping and record
/// creation live outside this service; here they are logged and dropped.
async fn consume_deliveries(
    mut deliveries: mpsc::Receiver<AcceptedWebhook>,
    mut shutdown: broadcast::Receiver<()>,
) {
    loop {
        tokio::select! {
            delivery = deliveries.recv() => {
                let Some(delivery) = delivery else { break };
                tracing::info!(
                    delivery_id = %delivery.delivery_id,
                    endpoint = %Sanitized(&delivery.endpoint),
                    bytes = delivery.payload.len(),
                    "Delivery handed off"
                );
            }
            _ = shutdown.recv() => {
                tracing::info!("Delivery consumer received shutdown signal, exiting loop");
                break;
            }
        }
    }
}

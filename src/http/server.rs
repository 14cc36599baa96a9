//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Build the limiters and verifier from configuration
//! - Create the public (webhook) and admin Axum routers
//! - Wire up middleware (tracing, request ID, timeout, body limit, rate limit)
//! - Apply validated config reloads by swapping the verifier
//! - Serve until the shutdown signal fires

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, post},
    Router,
};
use secrecy::{ExposeSecret, SecretString};
use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc};
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

use crate::admin::setup_admin_router;
use crate::config::schema::GateConfig;
use crate::config::validation::config_warnings;
use crate::http::middleware::{rate_limit_middleware, KeyScope, RateLimitState};
use crate::http::request::{make_span, propagate_request_id_layer, set_request_id_layer};
use crate::http::webhook::{receive_webhook, AcceptedWebhook};
use crate::lifecycle::shutdown;
use crate::security::rate_limit::{InMemoryStore, RateLimiter};
use crate::security::verifier::{PolicyError, WebhookVerifier};

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    /// Swapped atomically on config reload.
    pub verifier: Arc<ArcSwap<WebhookVerifier>>,
    pub webhook_limiter: RateLimiter,
    pub strict_limiter: RateLimiter,
    pub rate_limit_enabled: bool,
    pub deliveries: mpsc::Sender<AcceptedWebhook>,
    pub admin_key: Option<SecretString>,
}

/// HTTP server for the webhook gate.
pub struct GateServer {
    config: GateConfig,
    state: AppState,
}

impl GateServer {
    /// Build the server and the receiving end of the accepted-delivery queue.
    pub fn new(config: GateConfig) -> Result<(Self, mpsc::Receiver<AcceptedWebhook>), PolicyError> {
        let verifier = WebhookVerifier::from_config(&config.webhook)?;
        log_config_warnings(&config);

        let limits = &config.rate_limit;
        // Each preset owns its store so quotas never bleed between them.
        let webhook_limiter = RateLimiter::webhook(Arc::new(InMemoryStore::new()))
            .with_config(limits.webhook)
            .with_sweep_probability(limits.sweep_probability);
        let strict_limiter = RateLimiter::strict(Arc::new(InMemoryStore::new()))
            .with_config(limits.strict)
            .with_sweep_probability(limits.sweep_probability);

        let (tx, rx) = mpsc::channel(config.listener.queue_capacity.max(1));

        let state = AppState {
            verifier: Arc::new(ArcSwap::from_pointee(verifier)),
            webhook_limiter,
            strict_limiter,
            rate_limit_enabled: limits.enabled,
            deliveries: tx,
            admin_key: config
                .admin
                .api_key
                .clone()
                .filter(|k| !k.expose_secret().is_empty()),
        };

        Ok((Self { config, state }, rx))
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &GateConfig {
        &self.config
    }

    /// The public router: webhook endpoints and health.
    #[allow(deprecated)]
    pub fn router(&self) -> Router {
        let prefix = self.config.webhook.path_prefix.trim_end_matches('/');
        let mut webhooks = Router::new()
            .route(&format!("{}/{{endpoint}}", prefix), post(receive_webhook))
            .with_state(self.state.clone());

        if self.state.rate_limit_enabled {
            let limit_state = RateLimitState::new(self.state.webhook_limiter.clone(), KeyScope::EndpointAndIp);
            webhooks = webhooks.layer(middleware::from_fn_with_state(limit_state, rate_limit_middleware));
        }

        Router::new()
            .route("/health", get(|| async { "ok" }))
            .merge(webhooks)
            .layer(DefaultBodyLimit::max(self.config.listener.max_body_size))
            .layer(TimeoutLayer::new(Duration::from_secs(self.config.timeouts.request_secs)))
            .layer(propagate_request_id_layer())
            .layer(TraceLayer::new_for_http().make_span_with(make_span))
            .layer(set_request_id_layer())
    }

    /// The admin router, guarded by the strict limiter and bearer auth.
    pub fn admin_router(&self) -> Router {
        setup_admin_router(self.state.clone())
            .layer(propagate_request_id_layer())
            .layer(TraceLayer::new_for_http().make_span_with(make_span))
            .layer(set_request_id_layer())
    }

    /// Rebuild the verifier from a validated config and swap it in.
    ///
    /// Rate limiter state is kept.
    pub fn apply_config(state: &AppState, config: &GateConfig) -> Result<(), PolicyError> {
        let verifier = WebhookVerifier::from_config(&config.webhook)?;
        log_config_warnings(config);
        state.verifier.store(Arc::new(verifier));
        tracing::info!("Webhook policy reloaded");
        Ok(())
    }

    /// Serve the public router until shutdown, applying config updates.
    pub async fn run(
        self,
        listener: TcpListener,
        mut config_updates: mpsc::UnboundedReceiver<GateConfig>,
        shutdown_rx: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        let state = self.state.clone();
        tokio::spawn(async move {
            while let Some(new_config) = config_updates.recv().await {
                if let Err(e) = Self::apply_config(&state, &new_config) {
                    tracing::error!(error = %e, "Rejected config update. Keeping current policy.");
                }
            }
        });

        serve(listener, self.router(), shutdown_rx).await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

/// Serve a router with connect info and graceful shutdown.
pub async fn serve(
    listener: TcpListener,
    router: Router,
    shutdown_rx: broadcast::Receiver<()>,
) -> Result<(), std::io::Error> {
    let app = router.into_make_service_with_connect_info::<SocketAddr>();
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown::wait(shutdown_rx))
        .await
}

fn log_config_warnings(config: &GateConfig) {
    for warning in config_warnings(config) {
        tracing::warn!(warning = %warning, "Configuration risk");
    }
}

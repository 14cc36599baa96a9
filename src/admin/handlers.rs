use axum::{
    extract::{Path, State},
    Json,
};
use serde::Serialize;

use crate::http::server::AppState;
use crate::observability::sanitize::Sanitized;
use crate::security::ip_filter::RuntimeMode;

#[derive(Debug, Serialize)]
pub struct SystemStatus {
    pub version: &'static str,
    pub status: &'static str,
    pub mode: RuntimeMode,
    pub secret_configured: bool,
    pub allow_all: bool,
    pub rate_limiting: bool,
    pub limiters: Vec<LimiterStatus>,
}

#[derive(Debug, Serialize)]
pub struct LimiterStatus {
    pub name: String,
    pub max_requests: u32,
    pub window_ms: u64,
    pub tracked_identifiers: usize,
}

#[derive(Debug, Serialize)]
pub struct ResetSummary {
    pub identifier: Option<String>,
    /// Identifiers tracked before the reset, across limiters.
    pub tracked_before: usize,
}

pub async fn get_status(State(state): State<AppState>) -> Json<SystemStatus> {
    let verifier = state.verifier.load();
    let policy = verifier.policy();

    let limiters = [&state.webhook_limiter, &state.strict_limiter]
        .into_iter()
        .map(|l| LimiterStatus {
            name: l.name().to_string(),
            max_requests: l.config().max_requests,
            window_ms: l.config().window_ms,
            tracked_identifiers: l.tracked_identifiers(),
        })
        .collect();

    Json(SystemStatus {
        version: env!("CARGO_PKG_VERSION"),
        status: "operational",
        mode: policy.mode,
        secret_configured: verifier.secret_configured(),
        allow_all: policy.allow_list.allows_all(),
        rate_limiting: state.rate_limit_enabled,
        limiters,
    })
}

/// Forget one identifier in every limiter.
pub async fn reset_rate_limit(
    State(state): State<AppState>,
    Path(identifier): Path<String>,
) -> Json<ResetSummary> {
    let tracked_before = tracked(&state);
    state.webhook_limiter.reset(&identifier);
    state.strict_limiter.reset(&identifier);
    tracing::info!(identifier = %Sanitized(&identifier), "Rate limit reset");

    Json(ResetSummary {
        identifier: Some(identifier),
        tracked_before,
    })
}

/// Forget every identifier in every limiter.
pub async fn clear_rate_limits(State(state): State<AppState>) -> Json<ResetSummary> {
    let tracked_before = tracked(&state);
    state.webhook_limiter.clear_all();
    state.strict_limiter.clear_all();
    tracing::info!(tracked_before, "All rate limits cleared");

    Json(ResetSummary {
        identifier: None,
        tracked_before,
    })
}

fn tracked(state: &AppState) -> usize {
    state.webhook_limiter.tracked_identifiers() + state.strict_limiter.tracked_identifiers()
}

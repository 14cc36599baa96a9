//! Admin API: rate-limit inspection and resets.

pub mod auth;
pub mod handlers;

use axum::{
    middleware,
    routing::{delete, get},
    Router,
};

use self::auth::admin_auth_middleware;
use self::handlers::*;
use crate::http::middleware::{rate_limit_middleware, KeyScope, RateLimitState};
use crate::http::server::AppState;

/// Admin routes behind bearer auth. The strict limiter runs before auth so
/// key guessing is throttled, keyed on the socket peer so forwarded headers
/// cannot rotate the bucket.
pub fn setup_admin_router(state: AppState) -> Router {
    let limit_state = RateLimitState::new(state.strict_limiter.clone(), KeyScope::Peer);

    Router::new()
        .route("/admin/status", get(get_status))
        .route("/admin/rate-limits", delete(clear_rate_limits))
        .route("/admin/rate-limits/{identifier}", delete(reset_rate_limit))
        .layer(middleware::from_fn_with_state(state.clone(), admin_auth_middleware))
        .layer(middleware::from_fn_with_state(limit_state, rate_limit_middleware))
        .with_state(state)
}

use axum::{
    body::Body,
    extract::State,
    http::{header, Request, StatusCode},
    middleware::Next,
    response::Response,
};
use secrecy::ExposeSecret;

use crate::http::request::caller_ip;
use crate::http::server::AppState;
use crate::observability::sanitize::Sanitized;
use crate::security::secret::constant_time_eq;

/// Bearer-token check for admin routes. No configured key means no access.
pub async fn admin_auth_middleware(
    State(state): State<AppState>,
    request: Request<Body>,
    next: Next,
) -> Result<Response, StatusCode> {
    let Some(expected) = state.admin_key.as_ref() else {
        tracing::warn!("Admin request refused: no admin API key configured");
        return Err(StatusCode::UNAUTHORIZED);
    };

    let token = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "));

    if let Some(token) = token {
        if constant_time_eq(token.as_bytes(), expected.expose_secret().as_bytes()) {
            return Ok(next.run(request).await);
        }
    }

    tracing::warn!(client_ip = %Sanitized(caller_ip(&request)), "Admin authentication failed");
    Err(StatusCode::UNAUTHORIZED)
}

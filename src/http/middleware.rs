//! Rate limiting middleware.
//!
//! Runs before any verification so abusive callers are turned away without
//! touching the secret comparison. Every response, admitted or not, carries
//! the `X-RateLimit-*` headers.

use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderMap, HeaderName, HeaderValue, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};

use crate::http::request::{caller_ip, peer_ip, request_id};
use crate::observability::metrics;
use crate::observability::sanitize::Sanitized;
use crate::security::rate_limit::{now_millis, rate_limit_headers, RateLimitResult, RateLimiter};

/// How the limiter identifier is derived from a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyScope {
    /// `"{path}:{ip}"`: each endpoint has its own quota per caller.
    EndpointAndIp,
    /// `"{peer}"`: the socket address only. Proxy headers are ignored, so
    /// callers cannot pick their own bucket.
    Peer,
}

/// State for [`rate_limit_middleware`].
#[derive(Debug, Clone)]
pub struct RateLimitState {
    pub limiter: RateLimiter,
    pub scope: KeyScope,
}

impl RateLimitState {
    pub fn new(limiter: RateLimiter, scope: KeyScope) -> Self {
        Self { limiter, scope }
    }

    /// Limiter identifier for a request.
    pub fn identifier<B>(&self, request: &Request<B>) -> String {
        match self.scope {
            KeyScope::EndpointAndIp => format!("{}:{}", request.uri().path(), caller_ip(request)),
            KeyScope::Peer => peer_ip(request),
        }
    }
}

/// Middleware function for sliding-window rate limiting.
pub async fn rate_limit_middleware(
    State(state): State<RateLimitState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let identifier = state.identifier(&request);
    let now = now_millis();
    let result = state.limiter.check_at(&identifier, now);

    if !result.allowed {
        tracing::warn!(
            request_id = %Sanitized(request_id(request.headers())),
            identifier = %Sanitized(&identifier),
            limiter = state.limiter.name(),
            count = result.count,
            "Rate limit exceeded"
        );
        metrics::record_webhook("rate_limited");

        let mut response = (
            StatusCode::TOO_MANY_REQUESTS,
            Json(serde_json::json!({ "error": "Too many requests" })),
        )
            .into_response();
        apply_rate_limit_headers(response.headers_mut(), &result);
        if let Ok(value) = HeaderValue::from_str(&result.retry_after_secs(now).to_string()) {
            response.headers_mut().insert(header::RETRY_AFTER, value);
        }
        return response;
    }

    let mut response = next.run(request).await;
    apply_rate_limit_headers(response.headers_mut(), &result);
    response
}

/// Copy the derived rate-limit headers onto a response.
pub fn apply_rate_limit_headers(headers: &mut HeaderMap, result: &RateLimitResult) {
    for (name, value) in rate_limit_headers(result) {
        if let (Ok(name), Ok(value)) = (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(&value),
        ) {
            headers.insert(name, value);
        }
    }
}

//! Request identification.
//!
//! # Responsibilities
//! - Attach a request ID (UUID v4) as early as possible
//! - Resolve the caller address used for rate limiting
//! - Build the per-request tracing span
//!
//! # Design Decisions
//! - Client-supplied `x-request-id` values are kept but sanitized in logs
//! - Proxy headers win over the socket peer address, matching the verifier

use std::net::SocketAddr;

use axum::body::Body;
use axum::extract::ConnectInfo;
use axum::http::{HeaderMap, Request};
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tracing::Span;

use crate::observability::sanitize::Sanitized;
use crate::security::ip_filter::client_ip;

/// Header carrying the request ID.
pub const X_REQUEST_ID: &str = "x-request-id";

/// Placeholder when a value cannot be determined.
pub const UNKNOWN: &str = "unknown";

/// Layer that assigns a UUID request ID when the client sent none.
pub fn set_request_id_layer() -> SetRequestIdLayer<MakeRequestUuid> {
    SetRequestIdLayer::x_request_id(MakeRequestUuid)
}

/// Layer that copies the request ID onto the response.
pub fn propagate_request_id_layer() -> PropagateRequestIdLayer {
    PropagateRequestIdLayer::x_request_id()
}

/// The request ID, or `unknown`.
pub fn request_id(headers: &HeaderMap) -> &str {
    headers
        .get(X_REQUEST_ID)
        .and_then(|v| v.to_str().ok())
        .unwrap_or(UNKNOWN)
}

/// Caller address for rate limiting: proxy headers first, then the socket peer.
pub fn caller_ip<B>(request: &Request<B>) -> String {
    client_ip(request.headers())
        .or_else(|| socket_peer(request))
        .unwrap_or_else(|| UNKNOWN.to_string())
}

/// The socket peer address, ignoring any client-supplied headers.
pub fn peer_ip<B>(request: &Request<B>) -> String {
    socket_peer(request).unwrap_or_else(|| UNKNOWN.to_string())
}

fn socket_peer<B>(request: &Request<B>) -> Option<String> {
    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
}

/// Span for `TraceLayer`, tagged with the request ID.
pub fn make_span(request: &Request<Body>) -> Span {
    tracing::info_span!(
        "request",
        method = %request.method(),
        path = %Sanitized(request.uri().path()),
        request_id = %Sanitized(request_id(request.headers())),
    )
}

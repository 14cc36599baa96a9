//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::net::SocketAddr;

use axum::body::Body;
use axum::extract::ConnectInfo;
use axum::http::{Request, Response};
use secrecy::SecretString;
use serde_json::Value;
use webhook_gate::config::GateConfig;

pub const SECRET: &str = "s3cr3t";
pub const ADMIN_KEY: &str = "admin-key";
pub const CLIENT_CHAIN: &str = "203.0.113.5, 10.0.0.1";

/// Config trusting 203.0.113.0/24 with a known secret and admin key.
pub fn test_config() -> GateConfig {
    let mut config = GateConfig::default();
    config.webhook.secret = Some(SecretString::new(SECRET.to_string()));
    config.webhook.allowed_ips = vec!["203.0.113.0/24".to_string()];
    config.admin.enabled = true;
    config.admin.api_key = Some(SecretString::new(ADMIN_KEY.to_string()));
    config.rate_limit.sweep_probability = 0.0;
    config
}

/// POST a webhook with the given headers.
pub fn webhook_request(path: &str, headers: &[(&str, &str)], body: &str) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(path)
        .header("content-type", "application/json");
    for (name, value) in headers {
        builder = builder.header(*name, *value);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

/// An admin request from a socket peer, with an optional bearer key.
pub fn admin_request(method: &str, path: &str, key: Option<&str>, peer: &str) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(path);
    if let Some(key) = key {
        builder = builder.header("authorization", format!("Bearer {}", key));
    }
    let mut request = builder.body(Body::empty()).unwrap();
    request
        .extensions_mut()
        .insert(ConnectInfo(peer.parse::<SocketAddr>().unwrap()));
    request
}

/// Read a response body as JSON.
pub async fn body_json(response: Response<Body>) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

//! End-to-end tests for the webhook gate, driven through the Axum routers.

use axum::http::StatusCode;
use secrecy::SecretString;
use tower::ServiceExt;
use webhook_gate::config::GateConfig;
use webhook_gate::http::GateServer;

mod common;
use common::*;

fn valid_headers() -> Vec<(&'static str, &'static str)> {
    vec![("x-forwarded-for", CLIENT_CHAIN), ("x-webhook-secret", SECRET)]
}

#[tokio::test]
async fn test_valid_webhook_is_accepted_and_queued() {
    let (server, mut deliveries) = GateServer::new(test_config()).unwrap();

    let res = server
        .router()
        .oneshot(webhook_request("/webhooks/forms", &valid_headers(), r#"{"name":"Ada"}"#))
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::ACCEPTED);
    assert_eq!(res.headers()["x-ratelimit-limit"], "100");
    assert_eq!(res.headers()["x-ratelimit-remaining"], "99");
    assert!(res.headers().contains_key("x-request-id"));

    let body = body_json(res).await;
    assert_eq!(body["accepted"], true);

    let delivery = deliveries.try_recv().expect("delivery queued");
    assert_eq!(delivery.endpoint, "forms");
    assert_eq!(delivery.client_ip.as_deref(), Some("203.0.113.5"));
    assert_eq!(&delivery.payload[..], br#"{"name":"Ada"}"#);
    assert_eq!(body["delivery_id"], delivery.delivery_id.to_string());
}

#[tokio::test]
async fn test_wrong_secret_is_unauthorized() {
    let (server, mut deliveries) = GateServer::new(test_config()).unwrap();

    let res = server
        .router()
        .oneshot(webhook_request(
            "/webhooks/forms",
            &[("x-forwarded-for", CLIENT_CHAIN), ("x-webhook-secret", "wrong")],
            "{}",
        ))
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    // The detailed reason stays in the logs.
    let body = body_json(res).await;
    assert_eq!(body["error"], "Unauthorized");
    assert!(deliveries.try_recv().is_err());
}

#[tokio::test]
async fn test_missing_secret_config_fails_closed() {
    let mut config = test_config();
    config.webhook.secret = None;
    let (server, _deliveries) = GateServer::new(config).unwrap();

    for headers in [
        valid_headers(),
        vec![("x-forwarded-for", CLIENT_CHAIN), ("authorization", "Bearer s3cr3t")],
        vec![("x-forwarded-for", CLIENT_CHAIN)],
    ] {
        let res = server
            .router()
            .oneshot(webhook_request("/webhooks/forms", &headers, "{}"))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    }
}

#[tokio::test]
async fn test_untrusted_ip_is_forbidden() {
    let (server, _deliveries) = GateServer::new(test_config()).unwrap();

    let res = server
        .router()
        .oneshot(webhook_request(
            "/webhooks/forms",
            &[("x-forwarded-for", "198.51.100.9"), ("x-webhook-secret", SECRET)],
            "{}",
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::FORBIDDEN);

    // No proxy header and no socket info: no IP, so no trust.
    let res = server
        .router()
        .oneshot(webhook_request("/webhooks/forms", &[("x-webhook-secret", SECRET)], "{}"))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_bearer_token_is_accepted() {
    let (server, _deliveries) = GateServer::new(test_config()).unwrap();

    let res = server
        .router()
        .oneshot(webhook_request(
            "/webhooks/forms",
            &[("x-forwarded-for", CLIENT_CHAIN), ("authorization", "Bearer s3cr3t")],
            "{}",
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::ACCEPTED);
}

#[tokio::test]
async fn test_rate_limit_rejects_after_max() {
    let mut config = test_config();
    config.rate_limit.webhook.max_requests = 3;
    let (server, _deliveries) = GateServer::new(config).unwrap();
    let router = server.router();

    for _ in 0..3 {
        let res = router
            .clone()
            .oneshot(webhook_request("/webhooks/forms", &valid_headers(), "{}"))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::ACCEPTED);
    }

    let res = router
        .clone()
        .oneshot(webhook_request("/webhooks/forms", &valid_headers(), "{}"))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(res.headers()["x-ratelimit-remaining"], "0");
    assert_eq!(res.headers()["x-ratelimit-limit"], "3");
    assert!(res.headers().contains_key("retry-after"));

    // Quota is per endpoint and caller.
    let res = router
        .clone()
        .oneshot(webhook_request("/webhooks/other", &valid_headers(), "{}"))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::ACCEPTED);
}

#[tokio::test]
async fn test_rate_limit_counts_rejected_verifications() {
    let mut config = test_config();
    config.rate_limit.webhook.max_requests = 1;
    let (server, _deliveries) = GateServer::new(config).unwrap();
    let router = server.router();

    let res = router
        .clone()
        .oneshot(webhook_request(
            "/webhooks/forms",
            &[("x-forwarded-for", CLIENT_CHAIN), ("x-webhook-secret", "guess")],
            "{}",
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(res.headers()["x-ratelimit-remaining"], "0");

    let res = router
        .oneshot(webhook_request("/webhooks/forms", &valid_headers(), "{}"))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::TOO_MANY_REQUESTS);
}

#[tokio::test]
async fn test_rate_limit_disabled() {
    let mut config = test_config();
    config.rate_limit.enabled = false;
    config.rate_limit.webhook.max_requests = 0;
    let (server, _deliveries) = GateServer::new(config).unwrap();

    let res = server
        .router()
        .oneshot(webhook_request("/webhooks/forms", &valid_headers(), "{}"))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::ACCEPTED);
    assert!(!res.headers().contains_key("x-ratelimit-limit"));
}

#[tokio::test]
async fn test_full_queue_is_service_unavailable() {
    let mut config = test_config();
    config.listener.queue_capacity = 1;
    let (server, _deliveries) = GateServer::new(config).unwrap();
    let router = server.router();

    let first = router
        .clone()
        .oneshot(webhook_request("/webhooks/forms", &valid_headers(), "{}"))
        .await
        .unwrap();
    assert_eq!(first.status(), StatusCode::ACCEPTED);

    let second = router
        .oneshot(webhook_request("/webhooks/forms", &valid_headers(), "{}"))
        .await
        .unwrap();
    assert_eq!(second.status(), StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn test_config_reload_swaps_policy() {
    let (server, _deliveries) = GateServer::new(test_config()).unwrap();
    let router = server.router();

    let mut rotated = test_config();
    rotated.webhook.secret = Some(SecretString::new("rotated".to_string()));
    GateServer::apply_config(server.state(), &rotated).unwrap();

    let res = router
        .clone()
        .oneshot(webhook_request("/webhooks/forms", &valid_headers(), "{}"))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    let res = router
        .oneshot(webhook_request(
            "/webhooks/forms",
            &[("x-forwarded-for", CLIENT_CHAIN), ("x-webhook-secret", "rotated")],
            "{}",
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::ACCEPTED);

    let mut broken = test_config();
    broken.webhook.allowed_ips = vec!["not-an-ip".to_string()];
    assert!(GateServer::apply_config(server.state(), &broken).is_err());
}

#[tokio::test]
async fn test_invalid_allow_list_fails_startup() {
    let mut config = GateConfig::default();
    config.webhook.allowed_ips = vec!["10.0.0.0/64".to_string()];
    assert!(GateServer::new(config).is_err());
}

#[tokio::test]
async fn test_health() {
    let (server, _deliveries) = GateServer::new(test_config()).unwrap();
    let res = server
        .router()
        .oneshot(
            axum::http::Request::builder()
                .uri("/health")
                .body(axum::body::Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_admin_requires_key() {
    let (server, _deliveries) = GateServer::new(test_config()).unwrap();
    let admin = server.admin_router();

    let res = admin
        .clone()
        .oneshot(admin_request("GET", "/admin/status", None, "192.0.2.1:40000"))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    let res = admin
        .clone()
        .oneshot(admin_request("GET", "/admin/status", Some("wrong-key"), "192.0.2.1:40000"))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    let res = admin
        .oneshot(admin_request("GET", "/admin/status", Some(ADMIN_KEY), "192.0.2.1:40000"))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body = body_json(res).await;
    assert_eq!(body["secret_configured"], true);
    assert_eq!(body["allow_all"], false);
    assert_eq!(body["mode"], "production");
}

#[tokio::test]
async fn test_admin_is_strictly_rate_limited() {
    let (server, _deliveries) = GateServer::new(test_config()).unwrap();
    let admin = server.admin_router();

    for _ in 0..10 {
        let res = admin
            .clone()
            .oneshot(admin_request("GET", "/admin/status", Some("guess"), "192.0.2.1:40000"))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    }

    let res = admin
        .clone()
        .oneshot(admin_request("GET", "/admin/status", Some(ADMIN_KEY), "192.0.2.1:40000"))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::TOO_MANY_REQUESTS);

    // A different socket peer has its own quota.
    let res = admin
        .oneshot(admin_request("GET", "/admin/status", Some(ADMIN_KEY), "192.0.2.2:40000"))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_admin_limit_ignores_forwarded_headers() {
    let (server, _deliveries) = GateServer::new(test_config()).unwrap();
    let admin = server.admin_router();

    for i in 0..11 {
        let mut req = admin_request("GET", "/admin/status", Some("guess"), "192.0.2.1:40000");
        let spoofed = format!("198.51.100.{}", i).parse().unwrap();
        req.headers_mut().insert("x-forwarded-for", spoofed);
        let res = admin.clone().oneshot(req).await.unwrap();
        let expected = if i < 10 { StatusCode::UNAUTHORIZED } else { StatusCode::TOO_MANY_REQUESTS };
        assert_eq!(res.status(), expected, "attempt {}", i + 1);
    }
}

#[tokio::test]
async fn test_admin_reset_restores_quota() {
    let mut config = test_config();
    config.rate_limit.webhook.max_requests = 1;
    let (server, _deliveries) = GateServer::new(config).unwrap();
    let router = server.router();
    let admin = server.admin_router();

    let send = || webhook_request("/webhooks/forms", &valid_headers(), "{}");
    assert_eq!(router.clone().oneshot(send()).await.unwrap().status(), StatusCode::ACCEPTED);
    assert_eq!(
        router.clone().oneshot(send()).await.unwrap().status(),
        StatusCode::TOO_MANY_REQUESTS
    );

    let res = admin
        .clone()
        .oneshot(admin_request(
            "DELETE",
            "/admin/rate-limits/%2Fwebhooks%2Fforms:203.0.113.5",
            Some(ADMIN_KEY),
            "192.0.2.1:40000",
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body = body_json(res).await;
    assert_eq!(body["identifier"], "/webhooks/forms:203.0.113.5");

    assert_eq!(router.clone().oneshot(send()).await.unwrap().status(), StatusCode::ACCEPTED);

    let res = admin
        .oneshot(admin_request("DELETE", "/admin/rate-limits", Some(ADMIN_KEY), "192.0.2.1:40000"))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(server.state().webhook_limiter.tracked_identifiers(), 0);
}

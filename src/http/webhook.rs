//! Webhook ingestion handler.
//!
//! Only requests that pass the verifier are turned into an
//! [`AcceptedWebhook`] and queued for the consumer. Rejections answer with
//! a generic message; the detailed reason is logged (sanitized).

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use tokio::sync::mpsc::error::TrySendError;
use uuid::Uuid;

use crate::http::request::request_id;
use crate::http::server::AppState;
use crate::observability::metrics;
use crate::observability::sanitize::{log_safe, Sanitized};
use crate::security::rate_limit::now_millis;

/// A webhook that passed every gate, ready for business logic.
#[derive(Debug, Clone)]
pub struct AcceptedWebhook {
    pub delivery_id: Uuid,
    /// Endpoint segment of the path (e.g. the form provider name).
    pub endpoint: String,
    pub client_ip: Option<String>,
    pub received_at_ms: u64,
    pub headers: HeaderMap,
    pub payload: Bytes,
}

#[derive(Debug, Serialize)]
struct AcceptedBody {
    accepted: bool,
    delivery_id: Uuid,
}

fn error_body(status: StatusCode) -> Response {
    let message = status.canonical_reason().unwrap_or("Rejected");
    (status, Json(serde_json::json!({ "error": message }))).into_response()
}

/// `POST {path_prefix}/{endpoint}`
pub async fn receive_webhook(
    State(state): State<AppState>,
    Path(endpoint): Path<String>,
    headers: HeaderMap,
    payload: Bytes,
) -> Response {
    let request_id = log_safe(request_id(&headers));
    let verifier = state.verifier.load();
    let result = verifier.verify(&payload, &headers);

    if let Some(rejection) = &result.error {
        tracing::warn!(
            request_id = %request_id,
            endpoint = %Sanitized(&endpoint),
            client_ip = %Sanitized(result.ip.as_deref().unwrap_or("unknown")),
            reason = %Sanitized(rejection),
            "Webhook rejected"
        );
        metrics::record_webhook(rejection.kind());
        return error_body(rejection.status());
    }

    let delivery = AcceptedWebhook {
        delivery_id: Uuid::new_v4(),
        endpoint,
        client_ip: result.ip,
        received_at_ms: now_millis(),
        headers,
        payload,
    };
    let delivery_id = delivery.delivery_id;

    tracing::info!(
        request_id = %request_id,
        delivery_id = %delivery_id,
        endpoint = %Sanitized(&delivery.endpoint),
        client_ip = %Sanitized(delivery.client_ip.as_deref().unwrap_or("unknown")),
        bytes = delivery.payload.len(),
        "Webhook accepted"
    );

    match state.deliveries.try_send(delivery) {
        Ok(()) => {
            metrics::record_webhook("accepted");
            (
                StatusCode::ACCEPTED,
                Json(AcceptedBody {
                    accepted: true,
                    delivery_id,
                }),
            )
                .into_response()
        }
        Err(TrySendError::Full(_)) => {
            tracing::error!(delivery_id = %delivery_id, "Delivery queue full, dropping webhook");
            metrics::record_webhook("queue_full");
            error_body(StatusCode::SERVICE_UNAVAILABLE)
        }
        Err(TrySendError::Closed(_)) => {
            tracing::error!(delivery_id = %delivery_id, "Delivery consumer gone, dropping webhook");
            metrics::record_webhook("queue_closed");
            error_body(StatusCode::SERVICE_UNAVAILABLE)
        }
    }
}

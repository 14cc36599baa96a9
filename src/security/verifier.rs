//! Webhook admission decision.
//!
//! # Data Flow
//! ```text
//! headers
//!     → client_ip (x-forwarded-for / x-real-ip / cf-connecting-ip)
//!     → allow-list (403 on miss)
//!     → secret configured? (fail closed)
//!     → credential (dedicated header, else Authorization: Bearer)
//!     → constant-time compare
//!     → VerificationResult
//! ```
//!
//! Rejections are values, never errors: every path returns the resolved IP
//! so the caller can log it.

use axum::http::{header, HeaderMap, HeaderName, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use thiserror::Error;

use crate::config::schema::WebhookConfig;
use crate::observability::sanitize::Sanitized;
use crate::security::ip_filter::{self, AllowListError, IpAllowList, RuntimeMode};
use crate::security::secret::verify_webhook_secret;

/// Header carrying the shared secret when no bearer token is used.
pub const DEFAULT_SECRET_HEADER: &str = "x-webhook-secret";

const BEARER_PREFIX: &str = "Bearer ";

/// Why a webhook was refused. `Display` yields the stable reason string.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Rejection {
    #[error("IP not whitelisted: {}", .ip.as_deref().unwrap_or("unknown"))]
    IpNotAllowed { ip: Option<String> },

    #[error("WEBHOOK_SECRET not configured")]
    SecretNotConfigured,

    #[error("Missing {header} header or Authorization Bearer token")]
    MissingCredential { header: String },

    #[error("Invalid webhook secret")]
    InvalidSecret,
}

impl Rejection {
    /// Status code the HTTP layer answers with.
    pub fn status(&self) -> StatusCode {
        match self {
            Rejection::IpNotAllowed { .. } => StatusCode::FORBIDDEN,
            Rejection::SecretNotConfigured
            | Rejection::MissingCredential { .. }
            | Rejection::InvalidSecret => StatusCode::UNAUTHORIZED,
        }
    }

    /// Short label for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            Rejection::IpNotAllowed { .. } => "ip_not_allowed",
            Rejection::SecretNotConfigured => "secret_not_configured",
            Rejection::MissingCredential { .. } => "missing_credential",
            Rejection::InvalidSecret => "invalid_secret",
        }
    }
}

/// Outcome of [`WebhookVerifier::verify`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VerificationResult {
    pub valid: bool,
    /// Present iff `valid` is false.
    pub error: Option<Rejection>,
    pub ip: Option<String>,
}

impl VerificationResult {
    fn accepted(ip: Option<String>) -> Self {
        Self {
            valid: true,
            error: None,
            ip,
        }
    }

    fn rejected(error: Rejection, ip: Option<String>) -> Self {
        Self {
            valid: false,
            error: Some(error),
            ip,
        }
    }

    /// The human-readable rejection reason, if any.
    pub fn reason(&self) -> Option<String> {
        self.error.as_ref().map(ToString::to_string)
    }
}

/// Trust settings for inbound webhooks.
#[derive(Debug, Clone)]
pub struct WebhookPolicy {
    /// Shared secret. `None` rejects every request.
    pub secret: Option<SecretString>,
    pub secret_header: HeaderName,
    pub allow_list: IpAllowList,
    pub mode: RuntimeMode,
}

impl Default for WebhookPolicy {
    fn default() -> Self {
        Self {
            secret: None,
            secret_header: HeaderName::from_static(DEFAULT_SECRET_HEADER),
            allow_list: IpAllowList::allow_all(),
            mode: RuntimeMode::Production,
        }
    }
}

/// Errors building a verifier from configuration.
#[derive(Debug, Error)]
pub enum PolicyError {
    #[error("invalid secret header name '{0}'")]
    InvalidHeader(String),

    #[error("invalid allow-list: {}", join_errors(.0))]
    AllowList(Vec<AllowListError>),
}

fn join_errors(errors: &[AllowListError]) -> String {
    errors.iter().map(ToString::to_string).collect::<Vec<_>>().join(", ")
}

/// Decides whether an inbound webhook is trusted.
#[derive(Debug, Clone, Default)]
pub struct WebhookVerifier {
    policy: WebhookPolicy,
}

impl WebhookVerifier {
    pub fn new(policy: WebhookPolicy) -> Self {
        Self { policy }
    }

    /// Build a verifier from the `[webhook]` config section.
    pub fn from_config(config: &WebhookConfig) -> Result<Self, PolicyError> {
        let secret_header = HeaderName::from_bytes(config.secret_header.trim().as_bytes())
            .map_err(|_| PolicyError::InvalidHeader(config.secret_header.clone()))?;
        let allow_list = IpAllowList::parse(&config.allowed_ips).map_err(PolicyError::AllowList)?;
        let secret = config
            .secret
            .clone()
            .filter(|s| !s.expose_secret().is_empty());

        Ok(Self::new(WebhookPolicy {
            secret,
            secret_header,
            allow_list,
            mode: config.mode,
        }))
    }

    pub fn policy(&self) -> &WebhookPolicy {
        &self.policy
    }

    pub fn secret_configured(&self) -> bool {
        self.policy.secret.as_ref().is_some_and(|s| !s.expose_secret().is_empty())
    }

    /// Allow-list decision for the resolved client IP.
    pub fn verify_ip(&self, ip: Option<&str>) -> bool {
        ip_filter::verify_ip(ip, &self.policy.allow_list, self.policy.mode)
    }

    /// Run every admission check in order, stopping at the first failure.
    ///
    /// The payload is accepted for future body-signature checks and is not
    /// inspected today.
    pub fn verify(&self, _payload: &[u8], headers: &HeaderMap) -> VerificationResult {
        let ip = ip_filter::client_ip(headers);

        if !self.verify_ip(ip.as_deref()) {
            return VerificationResult::rejected(Rejection::IpNotAllowed { ip: ip.clone() }, ip);
        }

        let secret = match self.policy.secret.as_ref().filter(|s| !s.expose_secret().is_empty()) {
            Some(secret) => secret,
            None => {
                tracing::warn!(
                    client_ip = %Sanitized(ip.as_deref().unwrap_or("unknown")),
                    "WEBHOOK_SECRET not configured; rejecting webhook"
                );
                return VerificationResult::rejected(Rejection::SecretNotConfigured, ip);
            }
        };

        let Some(provided) = self.provided_secret(headers) else {
            return VerificationResult::rejected(
                Rejection::MissingCredential {
                    header: self.policy.secret_header.as_str().to_string(),
                },
                ip,
            );
        };

        if !verify_webhook_secret(provided, secret.expose_secret()) {
            return VerificationResult::rejected(Rejection::InvalidSecret, ip);
        }

        VerificationResult::accepted(ip)
    }

    /// The dedicated header wins over a bearer token.
    fn provided_secret<'a>(&self, headers: &'a HeaderMap) -> Option<&'a str> {
        let from_header = headers
            .get(&self.policy.secret_header)
            .and_then(|v| v.to_str().ok())
            .filter(|v| !v.is_empty());

        from_header.or_else(|| {
            headers
                .get(header::AUTHORIZATION)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.strip_prefix(BEARER_PREFIX))
                .filter(|token| !token.is_empty())
        })
    }
}

//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (windows > 0, addresses parse, probability in [0, 1])
//! - Parse the allow-list once so bad entries fail at startup
//! - Surface risky-but-legal settings as warnings
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: GateConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::fmt;
use std::net::SocketAddr;

use axum::http::HeaderName;
use secrecy::ExposeSecret;
use thiserror::Error;

use crate::config::schema::GateConfig;
use crate::security::ip_filter::{AllowListError, IpAllowList, RuntimeMode};

/// A semantic configuration error.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("webhook.allowed_ips: {0}")]
    AllowList(AllowListError),

    #[error("webhook.secret_header: '{0}' is not a valid header name")]
    SecretHeader(String),

    #[error("webhook.path_prefix: '{0}' must start with '/'")]
    PathPrefix(String),

    #[error("{field}: '{value}' is not a valid socket address")]
    BindAddress { field: &'static str, value: String },

    #[error("rate_limit.{limiter}.window_ms must be greater than zero")]
    ZeroWindow { limiter: &'static str },

    #[error("rate_limit.sweep_probability must be within [0, 1], got {0}")]
    SweepProbability(f64),

    #[error("timeouts.request_secs must be greater than zero")]
    ZeroTimeout,

    #[error("admin.api_key is required when the admin API is enabled")]
    AdminKeyMissing,
}

/// Legal settings that weaken the trust boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigWarning {
    SecretMissing,
    AllowAllInProduction,
    DevelopmentMode,
}

impl fmt::Display for ConfigWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigWarning::SecretMissing => {
                write!(f, "WEBHOOK_SECRET not configured; every webhook will be rejected")
            }
            ConfigWarning::AllowAllInProduction => {
                write!(f, "allow-list contains 0.0.0.0/0; every source IP is trusted")
            }
            ConfigWarning::DevelopmentMode => {
                write!(f, "development mode: IP allow-list checks are bypassed")
            }
        }
    }
}

/// Validate a configuration, collecting every error.
pub fn validate_config(config: &GateConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if let Err(list_errors) = IpAllowList::parse(&config.webhook.allowed_ips) {
        errors.extend(list_errors.into_iter().map(ValidationError::AllowList));
    }

    if HeaderName::from_bytes(config.webhook.secret_header.trim().as_bytes()).is_err() {
        errors.push(ValidationError::SecretHeader(config.webhook.secret_header.clone()));
    }

    if !config.webhook.path_prefix.starts_with('/') {
        errors.push(ValidationError::PathPrefix(config.webhook.path_prefix.clone()));
    }

    check_addr(&mut errors, "listener.bind_address", &config.listener.bind_address);
    if config.admin.enabled {
        check_addr(&mut errors, "admin.bind_address", &config.admin.bind_address);
        if config.admin.api_key.as_ref().map_or(true, |k| k.expose_secret().trim().is_empty()) {
            errors.push(ValidationError::AdminKeyMissing);
        }
    }
    if config.observability.metrics_enabled {
        check_addr(
            &mut errors,
            "observability.metrics_address",
            &config.observability.metrics_address,
        );
    }

    let limits = &config.rate_limit;
    if limits.webhook.window_ms == 0 {
        errors.push(ValidationError::ZeroWindow { limiter: "webhook" });
    }
    if limits.strict.window_ms == 0 {
        errors.push(ValidationError::ZeroWindow { limiter: "strict" });
    }
    if !(0.0..=1.0).contains(&limits.sweep_probability) {
        errors.push(ValidationError::SweepProbability(limits.sweep_probability));
    }

    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::ZeroTimeout);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_addr(errors: &mut Vec<ValidationError>, field: &'static str, value: &str) {
    if value.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::BindAddress {
            field,
            value: value.to_string(),
        });
    }
}

/// Risky settings that do not prevent startup.
pub fn config_warnings(config: &GateConfig) -> Vec<ConfigWarning> {
    let mut warnings = Vec::new();
    let webhook = &config.webhook;

    if webhook.secret.as_ref().map_or(true, |s| s.expose_secret().is_empty()) {
        warnings.push(ConfigWarning::SecretMissing);
    }
    match webhook.mode {
        RuntimeMode::Development => warnings.push(ConfigWarning::DevelopmentMode),
        RuntimeMode::Production => {
            if IpAllowList::parse(&webhook.allowed_ips).is_ok_and(|list| list.allows_all()) {
                warnings.push(ConfigWarning::AllowAllInProduction);
            }
        }
    }
    warnings
}

//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the gate.
//! All types derive Serde traits for deserialization from config files.

use secrecy::SecretString;
use serde::{Deserialize, Deserializer, Serialize};

use crate::security::ip_filter::{RuntimeMode, ALLOW_ALL_CIDR};
use crate::security::rate_limit::{RateLimitConfig, DEFAULT_SWEEP_PROBABILITY};
use crate::security::verifier::DEFAULT_SECRET_HEADER;

/// Root configuration for the webhook gate.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct GateConfig {
    /// Listener configuration (bind address, body limit).
    pub listener: ListenerConfig,

    /// Webhook trust settings.
    pub webhook: WebhookConfig,

    /// Rate limiting configuration.
    pub rate_limit: RateLimitSettings,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    #[serde(default)]
    pub admin: AdminConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Maximum webhook body size in bytes.
    pub max_body_size: usize,

    /// Capacity of the accepted-delivery queue.
    pub queue_capacity: usize,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            max_body_size: 1024 * 1024, // 1MB
            queue_capacity: 1024,
        }
    }
}

/// Webhook trust configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct WebhookConfig {
    /// Route prefix; endpoints live at `{path_prefix}/{endpoint}`.
    pub path_prefix: String,

    /// Shared secret. Unset means every webhook is rejected.
    #[serde(skip_serializing)]
    pub secret: Option<SecretString>,

    /// Dedicated header carrying the secret.
    pub secret_header: String,

    /// Trusted source ranges (CIDR or exact IPv4).
    pub allowed_ips: Vec<String>,

    /// `development` bypasses the allow-list.
    pub mode: RuntimeMode,
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            path_prefix: "/webhooks".to_string(),
            secret: None,
            secret_header: DEFAULT_SECRET_HEADER.to_string(),
            // WARNING: allows every source. Override in production.
            allowed_ips: vec![ALLOW_ALL_CIDR.to_string()],
            mode: RuntimeMode::Production,
        }
    }
}

/// Rate limiting configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RateLimitSettings {
    /// Enable rate limiting.
    pub enabled: bool,

    /// Limits for webhook endpoints. Missing fields keep the webhook preset.
    #[serde(deserialize_with = "webhook_limits")]
    pub webhook: RateLimitConfig,

    /// Limits for sensitive (admin) operations. Missing fields keep the
    /// strict preset.
    #[serde(deserialize_with = "strict_limits")]
    pub strict: RateLimitConfig,

    /// Probability that a check sweeps idle entries.
    pub sweep_probability: f64,

    /// Interval of the background sweep in seconds (0 disables it).
    pub sweep_interval_secs: u64,
}

impl Default for RateLimitSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            webhook: RateLimitConfig::WEBHOOK,
            strict: RateLimitConfig::STRICT,
            sweep_probability: DEFAULT_SWEEP_PROBABILITY,
            sweep_interval_secs: 0,
        }
    }
}

/// A limits table where either field may be omitted.
#[derive(Deserialize)]
struct PartialLimits {
    max_requests: Option<u32>,
    window_ms: Option<u64>,
}

impl PartialLimits {
    fn over(self, preset: RateLimitConfig) -> RateLimitConfig {
        RateLimitConfig::new(
            self.max_requests.unwrap_or(preset.max_requests),
            self.window_ms.unwrap_or(preset.window_ms),
        )
    }
}

fn webhook_limits<'de, D: Deserializer<'de>>(deserializer: D) -> Result<RateLimitConfig, D::Error> {
    PartialLimits::deserialize(deserializer).map(|p| p.over(RateLimitConfig::WEBHOOK))
}

fn strict_limits<'de, D: Deserializer<'de>>(deserializer: D) -> Result<RateLimitConfig, D::Error> {
    PartialLimits::deserialize(deserializer).map(|p| p.over(RateLimitConfig::STRICT))
}

/// Timeout configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Request timeout in seconds.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self { request_secs: 30 }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Log output format.
    pub log_format: LogFormat,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// Admin API configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AdminConfig {
    /// Enable the admin API.
    pub enabled: bool,

    /// API key for authentication (Bearer token).
    #[serde(skip_serializing)]
    pub api_key: Option<SecretString>,

    /// Admin API bind address.
    pub bind_address: String,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            api_key: None,
            bind_address: "127.0.0.1:8081".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;

    #[test]
    fn test_defaults() {
        let config = GateConfig::default();
        assert_eq!(config.webhook.secret_header, "x-webhook-secret");
        assert_eq!(config.webhook.allowed_ips, vec!["0.0.0.0/0".to_string()]);
        assert_eq!(config.webhook.mode, RuntimeMode::Production);
        assert_eq!(config.rate_limit.webhook, RateLimitConfig::new(100, 60_000));
        assert_eq!(config.rate_limit.strict, RateLimitConfig::new(10, 60_000));
        assert!(!config.admin.enabled);
    }

    #[test]
    fn test_minimal_toml() {
        let config: GateConfig = toml::from_str(
            r#"
            [webhook]
            secret = "s3cr3t"
            allowed_ips = ["203.0.113.0/24"]
            mode = "development"

            [rate_limit.webhook]
            max_requests = 5
            "#,
        )
        .unwrap();

        assert_eq!(
            config.webhook.secret.as_ref().map(|s| s.expose_secret().as_str()),
            Some("s3cr3t")
        );
        assert_eq!(config.webhook.mode, RuntimeMode::Development);
        assert_eq!(config.webhook.path_prefix, "/webhooks");
        assert_eq!(config.rate_limit.webhook.max_requests, 5);
        assert_eq!(config.rate_limit.webhook.window_ms, 60_000);
        assert_eq!(config.listener.bind_address, "0.0.0.0:8080");
    }

    #[test]
    fn test_partial_limit_tables_keep_their_own_preset() {
        let config: GateConfig = toml::from_str(
            r#"
            [rate_limit.strict]
            window_ms = 30000

            [rate_limit.webhook]
            window_ms = 10000
            "#,
        )
        .unwrap();

        assert_eq!(config.rate_limit.strict, RateLimitConfig::new(10, 30_000));
        assert_eq!(config.rate_limit.webhook, RateLimitConfig::new(100, 10_000));
    }

    #[test]
    fn test_secrets_are_not_serialized() {
        let mut config = GateConfig::default();
        config.webhook.secret = Some(SecretString::new("s3cr3t".to_string()));
        config.admin.api_key = Some(SecretString::new("k3y".to_string()));
        let rendered = toml::to_string(&config).unwrap();
        assert!(!rendered.contains("s3cr3t"));
        assert!(!rendered.contains("k3y"));
    }

    #[test]
    fn test_secrets_are_not_debug_printed() {
        let config: GateConfig = toml::from_str(
            r#"
            [webhook]
            secret = "s3cr3t"

            [admin]
            api_key = "k3y"
            "#,
        )
        .unwrap();

        let printed = format!("{:?}", config);
        assert!(!printed.contains("s3cr3t"));
        assert!(!printed.contains("k3y"));
        assert!(config.admin.api_key.is_some());
    }
}

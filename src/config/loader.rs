//! Configuration loading from disk and environment.

use std::fs;
use std::path::Path;

use secrecy::SecretString;
use thiserror::Error;

use crate::config::schema::GateConfig;
use crate::config::validation::{validate_config, ValidationError};
use crate::security::ip_filter::RuntimeMode;

/// Shared secret for inbound webhooks.
pub const ENV_WEBHOOK_SECRET: &str = "WEBHOOK_SECRET";
/// Comma-separated allow-list.
pub const ENV_ALLOWED_IPS: &str = "WEBHOOK_ALLOWED_IPS";
/// Runtime mode; `development` enables the IP bypass.
pub const ENV_APP_ENV: &str = "APP_ENV";
/// Bearer key for the admin API.
pub const ENV_ADMIN_API_KEY: &str = "ADMIN_API_KEY";

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation failed: {}", join(.0))]
    Validation(Vec<ValidationError>),
}

fn join(errors: &[ValidationError]) -> String {
    errors.iter().map(ToString::to_string).collect::<Vec<_>>().join(", ")
}

/// Load, apply environment overrides and validate a TOML file.
pub fn load_config(path: &Path) -> Result<GateConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    let mut config: GateConfig = toml::from_str(&content)?;

    apply_env_overrides(&mut config);
    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

/// Defaults plus environment overrides, validated.
pub fn load_from_env() -> Result<GateConfig, ConfigError> {
    let mut config = GateConfig::default();
    apply_env_overrides(&mut config);
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

/// Apply overrides from the process environment.
pub fn apply_env_overrides(config: &mut GateConfig) {
    apply_overrides_from(config, |key| std::env::var(key).ok());
}

/// Apply overrides from an arbitrary lookup.
///
/// Empty values are ignored so an exported-but-blank variable cannot wipe
/// a file-configured secret.
pub fn apply_overrides_from<F>(config: &mut GateConfig, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

    if let Some(secret) = get(ENV_WEBHOOK_SECRET) {
        config.webhook.secret = Some(SecretString::new(secret));
    }
    if let Some(csv) = get(ENV_ALLOWED_IPS) {
        config.webhook.allowed_ips = csv
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect();
    }
    if let Some(mode) = get(ENV_APP_ENV) {
        config.webhook.mode = RuntimeMode::from_env_value(&mode);
    }
    if let Some(key) = get(ENV_ADMIN_API_KEY) {
        config.admin.api_key = Some(SecretString::new(key));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;
    use std::collections::HashMap;

    fn exposed(secret: &Option<SecretString>) -> Option<&str> {
        secret.as_ref().map(|s| s.expose_secret().as_str())
    }

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_env_overrides() {
        let mut config = GateConfig::default();
        apply_overrides_from(
            &mut config,
            lookup(&[
                ("WEBHOOK_SECRET", "s3cr3t"),
                ("WEBHOOK_ALLOWED_IPS", "203.0.113.0/24, 198.51.100.7,"),
                ("APP_ENV", "development"),
                ("ADMIN_API_KEY", "admin-key"),
            ]),
        );

        assert_eq!(exposed(&config.webhook.secret), Some("s3cr3t"));
        assert_eq!(config.webhook.allowed_ips, vec!["203.0.113.0/24", "198.51.100.7"]);
        assert_eq!(config.webhook.mode, RuntimeMode::Development);
        assert_eq!(exposed(&config.admin.api_key), Some("admin-key"));
    }

    #[test]
    fn test_blank_env_keeps_file_values() {
        let mut config = GateConfig::default();
        config.webhook.secret = Some(SecretString::new("from-file".to_string()));
        apply_overrides_from(&mut config, lookup(&[("WEBHOOK_SECRET", "  "), ("APP_ENV", "")]));
        assert_eq!(exposed(&config.webhook.secret), Some("from-file"));
        assert_eq!(config.webhook.mode, RuntimeMode::Production);
    }

    #[test]
    fn test_non_development_env_is_production() {
        let mut config = GateConfig::default();
        config.webhook.mode = RuntimeMode::Development;
        apply_overrides_from(&mut config, lookup(&[("APP_ENV", "test")]));
        assert_eq!(config.webhook.mode, RuntimeMode::Production);
    }

    #[test]
    fn test_load_config_reports_validation_errors() {
        let path = std::env::temp_dir().join(format!("webhook-gate-{}.toml", uuid::Uuid::new_v4()));
        std::fs::write(&path, "[webhook]\nallowed_ips = [\"10.0.0.0/99\"]\n").unwrap();

        let err = load_config(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Validation(_)));
        assert!(err.to_string().contains("10.0.0.0/99"));

        std::fs::remove_file(&path).unwrap_or_default();
    }

    #[test]
    fn test_load_config_missing_file() {
        let err = load_config(Path::new("/nonexistent/webhook-gate.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }
}

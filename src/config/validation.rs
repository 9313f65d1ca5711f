//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, addresses parse)
//! - Check that default host and mirrors are usable base URLs
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: GatewayConfig → Result<(), Vec<ValidationError>>
//! - Regex compilation is left to `RuleSet` construction, which owns the compiled form

use std::net::SocketAddr;
use url::Url;

use crate::config::schema::GatewayConfig;

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// A single semantic problem found in the configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Validate a deserialized configuration.
pub fn validate_config(config: &GatewayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "listener.bind_address",
            format!("'{}' is not a socket address", config.listener.bind_address),
        ));
    }

    if config.timeouts.upstream_secs == 0 {
        errors.push(ValidationError::new(
            "timeouts.upstream_secs",
            "must be greater than zero",
        ));
    }

    if config.failover.max_replay_body_bytes == 0 {
        errors.push(ValidationError::new(
            "failover.max_replay_body_bytes",
            "must be greater than zero",
        ));
    }

    // An empty default host means "none".
    if let Some(host) = config.routing.default_host.as_deref().filter(|h| !h.is_empty()) {
        if let Err(message) = check_base_url(host) {
            errors.push(ValidationError::new("routing.default_host", message));
        }
    }

    for (i, mirror) in config.routing.mirrors.iter().enumerate() {
        if let Err(message) = check_base_url(mirror) {
            errors.push(ValidationError::new(format!("routing.mirrors[{}]", i), message));
        }
    }

    let level = config.observability.log_level.to_lowercase();
    if !LOG_LEVELS.contains(&level.as_str()) {
        errors.push(ValidationError::new(
            "observability.log_level",
            format!("unknown level '{}'", config.observability.log_level),
        ));
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            format!(
                "'{}' is not a socket address",
                config.observability.metrics_address
            ),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// A base URL must be absolute, http(s), and carry a host.
pub(crate) fn check_base_url(raw: &str) -> Result<Url, String> {
    let url = Url::parse(raw).map_err(|e| format!("'{}' is not a valid URL: {}", raw, e))?;
    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(format!("'{}' must use http or https", raw));
    }
    if url.host_str().is_none() {
        return Err(format!("'{}' has no host", raw));
    }
    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::PathMappingConfig;

    #[test]
    fn default_config_is_valid() {
        assert!(validate_config(&GatewayConfig::default()).is_ok());
    }

    #[test]
    fn collects_every_error() {
        let mut config = GatewayConfig::default();
        config.listener.bind_address = "not-an-address".into();
        config.timeouts.upstream_secs = 0;
        config.routing.default_host = Some("ftp://files.example.com".into());
        config.routing.mirrors = vec!["https://ok.example.com".into(), "nope".into()];
        config.observability.log_level = "loud".into();

        let errors = validate_config(&config).unwrap_err();
        let fields: Vec<_> = errors.iter().map(|e| e.field.as_str()).collect();
        assert_eq!(
            fields,
            vec![
                "listener.bind_address",
                "timeouts.upstream_secs",
                "routing.default_host",
                "routing.mirrors[1]",
                "observability.log_level",
            ]
        );
    }

    #[test]
    fn metrics_address_only_checked_when_enabled() {
        let mut config = GatewayConfig::default();
        config.observability.metrics_address = "garbage".into();
        assert!(validate_config(&config).is_ok());

        config.observability.metrics_enabled = true;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn mappings_are_not_checked_here() {
        let mut config = GatewayConfig::default();
        config
            .routing
            .path_mappings
            .push(PathMappingConfig::new("[unclosed", "https://x.example.com"));
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn base_url_requires_host() {
        assert!(check_base_url("https://mirror.example.com").is_ok());
        assert!(check_base_url("http://127.0.0.1:9000").is_ok());
        assert!(check_base_url("mailto:someone@example.com").is_err());
        assert!(check_base_url("/relative").is_err());
    }
}

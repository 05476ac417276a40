//! Configuration validation.
//!
//! Serde handles the syntactic checks; this module checks value ranges and
//! cross-field constraints. All errors are collected, not just the first.

use std::net::SocketAddr;

use axum::http::HeaderValue;
use thiserror::Error;
use url::Url;

use crate::config::schema::ProxyConfig;

/// A single semantic problem found in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("invalid socket address for {field}: {value}")]
    InvalidAddress { field: &'static str, value: String },

    #[error("{field} must be greater than zero")]
    Zero { field: &'static str },

    #[error("rewrite.user_agents must contain at least one entry")]
    NoUserAgents,

    #[error("rewrite.user_agents entry is not a valid header value: {0}")]
    InvalidUserAgent(String),

    #[error("{field} must not contain empty entries")]
    EmptyEntry { field: &'static str },

    #[error("{field} must be an absolute http(s) URL: {value}")]
    InvalidBaseUrl { field: &'static str, value: String },
}

/// Validate a parsed configuration.
pub fn validate_config(config: &ProxyConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidAddress {
            field: "listener.bind_address",
            value: config.listener.bind_address.clone(),
        });
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::InvalidAddress {
            field: "observability.metrics_address",
            value: config.observability.metrics_address.clone(),
        });
    }

    if config.timeouts.connect_secs == 0 {
        errors.push(ValidationError::Zero { field: "timeouts.connect_secs" });
    }
    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::Zero { field: "timeouts.request_secs" });
    }
    if config.registry.max_hops == 0 {
        errors.push(ValidationError::Zero { field: "registry.max_hops" });
    }

    if config.rewrite.user_agents.is_empty() {
        errors.push(ValidationError::NoUserAgents);
    }
    for agent in &config.rewrite.user_agents {
        if HeaderValue::from_str(agent).is_err() {
            errors.push(ValidationError::InvalidUserAgent(agent.clone()));
        }
    }

    // An empty substring would match every host.
    if config.rewrite.direct_hosts.iter().any(|h| h.is_empty()) {
        errors.push(ValidationError::EmptyEntry { field: "rewrite.direct_hosts" });
    }
    if config.registry.storage_signatures.iter().any(|s| s.is_empty()) {
        errors.push(ValidationError::EmptyEntry { field: "registry.storage_signatures" });
    }

    for (field, value) in [
        ("registry.upstream_url", &config.registry.upstream_url),
        ("registry.auth_url", &config.registry.auth_url),
    ] {
        let valid = Url::parse(value)
            .map(|u| matches!(u.scheme(), "http" | "https") && u.host_str().is_some())
            .unwrap_or(false);
        if !valid {
            errors.push(ValidationError::InvalidBaseUrl {
                field,
                value: value.clone(),
            });
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert_eq!(validate_config(&ProxyConfig::default()), Ok(()));
    }

    #[test]
    fn test_collects_all_errors() {
        let mut config = ProxyConfig::default();
        config.listener.bind_address = "nowhere".into();
        config.registry.max_hops = 0;
        config.rewrite.user_agents.clear();
        config.rewrite.direct_hosts.push(String::new());
        config.registry.auth_url = "ftp://auth.example".into();

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 5);
        assert!(errors.contains(&ValidationError::NoUserAgents));
        assert!(errors.contains(&ValidationError::Zero { field: "registry.max_hops" }));
    }
}

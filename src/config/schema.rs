//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the proxy.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration for the rewriting proxy.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ProxyConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Content rewriting and generic forwarding settings.
    pub rewrite: RewriteConfig,

    /// Container registry forwarding settings.
    pub registry: RegistryConfig,

    /// Hit counter settings.
    pub stats: StatsConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
        }
    }
}

/// Timeout configuration for various operations.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Upstream connection establishment timeout in seconds.
    pub connect_secs: u64,

    /// Time allowed until response headers are produced, in seconds.
    /// Streaming bodies are not bounded by this.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            connect_secs: 10,
            request_secs: 60,
        }
    }
}

/// Settings for the generic (rewriting) proxy path.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RewriteConfig {
    /// Host substrings served directly to clients instead of through the proxy.
    pub direct_hosts: Vec<String>,

    /// User-Agent strings presented to origins, one picked per request.
    pub user_agents: Vec<String>,

    /// Redirects followed transparently on the generic path.
    pub generic_max_redirects: usize,
}

impl Default for RewriteConfig {
    fn default() -> Self {
        Self {
            direct_hosts: [
                "images.weserv.nl",
                "wsrv.nl",
                "imgur.com",
                "twimg.com",
                "sinaimg.cn",
                "baidu.com",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
            user_agents: vec![
                "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36".to_string(),
                "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/119.0.0.0 Safari/537.36".to_string(),
            ],
            generic_max_redirects: 10,
        }
    }
}

/// Settings for the container registry path.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// Base URL of the registry that `/v2/` requests are sent to.
    pub upstream_url: String,

    /// Base URL of the token service that `/token` requests are sent to.
    pub auth_url: String,

    /// Maximum number of requests issued while following one redirect chain.
    pub max_hops: usize,

    /// Hostname fragments identifying object storage backends.
    pub storage_signatures: Vec<String>,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            upstream_url: "https://registry-1.docker.io".to_string(),
            auth_url: "https://auth.docker.io".to_string(),
            max_hops: 10,
            storage_signatures: vec![
                "amazonaws.com".to_string(),
                "r2.cloudflarestorage.com".to_string(),
            ],
        }
    }
}

/// Hit counter configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct StatsConfig {
    /// Keep in-memory hit counters. When disabled every increment is a no-op.
    pub enabled: bool,

    /// Hit count shown as 100% progress in the stats snapshot.
    pub progress_goal: u64,
}

impl Default for StatsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            progress_goal: 500,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
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

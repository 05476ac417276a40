//! Backend classification for registry hops.

use url::Url;

use crate::config::RegistryConfig;

/// What kind of server a registry hop talks to.
///
/// Computed once per hop; the header policy for the hop is derived from it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    /// The configured registry.
    Registry,
    /// Object storage serving blobs (S3, R2, ...).
    StorageBackend,
    /// The configured token service.
    AuthHost,
    /// Any other host a redirect leads to.
    Generic,
}

impl BackendKind {
    pub fn classify(url: &Url, config: &RegistryConfig) -> Self {
        let host = url.host_str().unwrap_or_default();

        if config
            .storage_signatures
            .iter()
            .any(|sig| host.contains(sig.as_str()))
        {
            return BackendKind::StorageBackend;
        }
        if same_host(host, &config.auth_url) {
            return BackendKind::AuthHost;
        }
        if same_host(host, &config.upstream_url) {
            return BackendKind::Registry;
        }
        BackendKind::Generic
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            BackendKind::Registry => "registry",
            BackendKind::StorageBackend => "storage",
            BackendKind::AuthHost => "auth",
            BackendKind::Generic => "generic",
        }
    }
}

fn same_host(host: &str, base_url: &str) -> bool {
    Url::parse(base_url)
        .ok()
        .and_then(|u| u.host_str().map(|h| h.eq_ignore_ascii_case(host)))
        .unwrap_or(false)
}

//! Request routing.
//!
//! # Responsibilities
//! - Decide the upstream target and proxy mode for an inbound request
//! - Recognize housekeeping paths (robots, favicon, dashboard, stats)
//! - Recover targets for requests that escaped rewriting, via Referer
//!
//! # Design Decisions
//! - Immutable after construction (thread-safe without locks)
//! - Deterministic: same request always yields the same route
//! - Anything that is not an absolute http(s) URL at the end is a client error

use std::sync::LazyLock;

use axum::http::{header::REFERER, HeaderMap, Uri};
use regex::Regex;
use url::Url;

use crate::config::RegistryConfig;
use crate::error::ProxyError;

/// Path serving the hit counter snapshot as JSON.
pub const STATS_PATH: &str = "/_stats";

static BARE_DOMAIN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([a-zA-Z0-9-]+\.)+[a-zA-Z]{2,}").expect("bare domain pattern is valid")
});

/// How a proxied request is handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProxyMode {
    /// Rewriting forward proxy.
    Generic,
    /// Container registry with manual redirect following.
    Registry,
}

impl ProxyMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProxyMode::Generic => "generic",
            ProxyMode::Registry => "registry",
        }
    }
}

/// Routing decision for one inbound request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    Robots,
    Favicon,
    Dashboard,
    Stats,
    /// Root `?url=`/`?q=` lookup; proxied in generic mode but never counted.
    Lookup { target: Url },
    Proxy { target: Url, mode: ProxyMode },
}

/// Maps inbound requests to routes.
#[derive(Debug, Clone)]
pub struct RequestRouter {
    registry_base: Url,
}

impl RequestRouter {
    pub fn new(config: &RegistryConfig) -> Result<Self, ProxyError> {
        let registry_base = Url::parse(&config.upstream_url)
            .map_err(|e| ProxyError::InvalidTarget(format!("{}: {e}", config.upstream_url)))?;
        Ok(Self { registry_base })
    }

    /// Route a request that reached the proxy at `proxy_origin`.
    pub fn route(&self, uri: &Uri, headers: &HeaderMap, proxy_origin: &str) -> Result<Route, ProxyError> {
        let path = uri.path();
        let query = uri.query();

        if path == "/" || path.is_empty() {
            if let Some(target) = query.and_then(query_target) {
                let target = if is_absolute_http(&target) {
                    target
                } else {
                    format!("https://{target}")
                };
                return Ok(Route::Lookup {
                    target: parse_target(&target)?,
                });
            }
        }

        match path {
            "/robots.txt" => return Ok(Route::Robots),
            "/favicon.ico" => return Ok(Route::Favicon),
            "/" | "" => return Ok(Route::Dashboard),
            STATS_PATH => return Ok(Route::Stats),
            _ => {}
        }

        if path.starts_with("/v2/") || path.contains("/token") {
            // Path and query only; the registry host is never taken from the request.
            let mut target = self.registry_base.clone();
            target.set_path(path);
            target.set_query(query);
            return Ok(Route::Proxy {
                target,
                mode: ProxyMode::Registry,
            });
        }

        let path_and_query = uri.path_and_query().map(|pq| pq.as_str()).unwrap_or(path);
        let mut target = restore_scheme_slashes(path_and_query.strip_prefix('/').unwrap_or(path_and_query));
        if !is_absolute_http(&target) {
            if BARE_DOMAIN.is_match(&target) {
                target = format!("https://{target}");
            } else if let Some(resolved) = resolve_from_referer(headers, proxy_origin, &target) {
                tracing::debug!(target = %resolved, "Recovered target from Referer");
                target = resolved;
            }
        }
        generic(&target)
    }
}

fn generic(target: &str) -> Result<Route, ProxyError> {
    Ok(Route::Proxy {
        target: parse_target(target)?,
        mode: ProxyMode::Generic,
    })
}

/// Parse an absolute http(s) target URL.
pub fn parse_target(target: &str) -> Result<Url, ProxyError> {
    if !is_absolute_http(target) {
        return Err(ProxyError::InvalidTarget(target.to_string()));
    }
    let url = Url::parse(target).map_err(|e| ProxyError::InvalidTarget(format!("{target}: {e}")))?;
    if url.host_str().map_or(true, str::is_empty) {
        return Err(ProxyError::InvalidTarget(target.to_string()));
    }
    Ok(url)
}

fn is_absolute_http(value: &str) -> bool {
    value.starts_with("http://") || value.starts_with("https://")
}

/// `url` wins over `q`; empty values are ignored.
fn query_target(query: &str) -> Option<String> {
    let mut q = None;
    for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
        if value.is_empty() {
            continue;
        }
        match key.as_ref() {
            "url" => return Some(value.into_owned()),
            "q" if q.is_none() => q = Some(value.into_owned()),
            _ => {}
        }
    }
    q
}

/// Undo slash merging by intermediaries (`https:/host` → `https://host`).
fn restore_scheme_slashes(target: &str) -> String {
    for scheme in ["https:/", "http:/"] {
        if let Some(rest) = target.strip_prefix(scheme) {
            if !rest.starts_with('/') {
                return format!("{scheme}/{rest}");
            }
        }
    }
    target.to_string()
}

/// Resolve a root-relative request against the page it was issued from.
///
/// Only applies when the Referer is a proxied page, i.e.
/// `{proxy_origin}/{absolute page URL}`.
fn resolve_from_referer(headers: &HeaderMap, proxy_origin: &str, target: &str) -> Option<String> {
    let referer = headers.get(REFERER)?.to_str().ok()?;
    if !referer.contains(proxy_origin) {
        return None;
    }
    let referer = Url::parse(referer).ok()?;
    let embedded = restore_scheme_slashes(referer.path().strip_prefix('/')?);
    if !is_absolute_http(&embedded) {
        return None;
    }
    let page = Url::parse(&embedded).ok()?;
    page.join(&format!("/{target}")).ok().map(String::from)
}

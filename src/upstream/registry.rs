//! Container registry forwarding.
//!
//! # Responsibilities
//! - Send `/token` exchanges once to the token service
//! - Follow registry redirect chains hop by hop (registry → blob storage)
//! - Apply per-backend header policy on every hop
//!
//! # Hop State Machine
//! ```text
//!            ┌──────────── 301/302/307/308 + Location ───────────┐
//!            ▼                                                    │
//!     ┌────────────┐  any other status / no usable Location  ┌────┴───────┐
//!     │ Forwarding │ ───────────────────────────────────────▶│  Terminal  │
//!     └────────────┘                                         └────────────┘
//!            │ hop count > max_hops, or URL already visited
//!            ▼
//!     TooManyRedirects / RedirectLoop
//! ```
//!
//! # Design Decisions
//! - Transport-level redirects are disabled so each hop can be re-headered
//! - Headers are rebuilt from the inbound request on every hop, so dropping
//!   `Authorization` for storage never leaks into later registry hops

use std::collections::HashSet;
use std::time::Duration;

use axum::body::Body;
use axum::http::{
    header::{AUTHORIZATION, HOST, LOCATION, REFERER},
    HeaderMap, HeaderValue, Method, StatusCode,
};
use reqwest::redirect;
use url::Url;

use crate::config::{RegistryConfig, TimeoutConfig};
use crate::error::ProxyError;
use crate::observability::metrics;
use crate::security::headers::forwardable_request_headers;
use crate::upstream::backend::BackendKind;

/// SHA-256 of an empty payload, sent to storage backends for anonymous reads.
pub const EMPTY_PAYLOAD_SHA256: &str =
    "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855";

pub const X_AMZ_CONTENT_SHA256: &str = "x-amz-content-sha256";
pub const X_AMZ_DATE: &str = "x-amz-date";

/// Compact ISO-8601 basic format, e.g. `20240131T235959Z`.
const AMZ_DATE_FORMAT: &str = "%Y%m%dT%H%M%SZ";

/// One request/response exchange of a redirect chain.
#[derive(Debug)]
struct RedirectHop {
    url: Url,
    kind: BackendKind,
    headers: HeaderMap,
}

impl RedirectHop {
    fn new(url: Url, incoming: &HeaderMap, config: &RegistryConfig) -> Self {
        let kind = BackendKind::classify(&url, config);
        let mut headers = forwardable_request_headers(incoming);
        apply_hop_policy(&mut headers, &url, kind);
        Self { url, kind, headers }
    }
}

/// Set the headers a hop needs for its backend kind.
pub fn apply_hop_policy(headers: &mut HeaderMap, url: &Url, kind: BackendKind) {
    if let Some(host) = url.host_str().and_then(|h| HeaderValue::from_str(h).ok()) {
        headers.insert(HOST, host);
    }

    match kind {
        BackendKind::StorageBackend => {
            headers.remove(AUTHORIZATION);
            headers.insert(
                X_AMZ_CONTENT_SHA256,
                HeaderValue::from_static(EMPTY_PAYLOAD_SHA256),
            );
            let stamp = chrono::Utc::now().format(AMZ_DATE_FORMAT).to_string();
            if let Ok(value) = HeaderValue::from_str(&stamp) {
                headers.insert(X_AMZ_DATE, value);
            }
        }
        BackendKind::Registry | BackendKind::AuthHost | BackendKind::Generic => {
            if let Ok(referer) = HeaderValue::from_str(&url.origin().ascii_serialization()) {
                headers.insert(REFERER, referer);
            }
        }
    }
}

/// Forwarder for registry and blob traffic.
#[derive(Debug, Clone)]
pub struct RegistryResolver {
    client: reqwest::Client,
    config: RegistryConfig,
}

impl RegistryResolver {
    pub fn new(config: &RegistryConfig, timeouts: &TimeoutConfig) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .redirect(redirect::Policy::none())
            .connect_timeout(Duration::from_secs(timeouts.connect_secs))
            .build()?;

        Ok(Self {
            client,
            config: config.clone(),
        })
    }

    /// Token exchanges bypass redirect following.
    pub fn is_token_request(url: &Url) -> bool {
        url.path().contains("/token")
    }

    /// Handle a registry-mode request aimed at `target`.
    pub async fn handle(
        &self,
        method: Method,
        incoming: &HeaderMap,
        body: Body,
        target: Url,
    ) -> Result<reqwest::Response, ProxyError> {
        if Self::is_token_request(&target) {
            return self.exchange_token(method, incoming, body, &target).await;
        }
        self.follow(method, incoming, target).await
    }

    /// Forward a token request once to the token service.
    pub async fn exchange_token(
        &self,
        method: Method,
        incoming: &HeaderMap,
        body: Body,
        target: &Url,
    ) -> Result<reqwest::Response, ProxyError> {
        let url = rebase(&self.config.auth_url, target)?;
        let mut headers = forwardable_request_headers(incoming);
        if let Some(host) = url.host_str().and_then(|h| HeaderValue::from_str(h).ok()) {
            headers.insert(HOST, host);
        }

        tracing::debug!(url = %url, "Forwarding token exchange");

        let mut request = self.client.request(method.clone(), url.clone()).headers(headers);
        if method != Method::GET && method != Method::HEAD {
            request = request.body(reqwest::Body::wrap_stream(body.into_data_stream()));
        }
        request
            .send()
            .await
            .map_err(|e| ProxyError::upstream(&url, e))
    }

    /// Follow a redirect chain starting at `start` until a terminal response.
    pub async fn follow(
        &self,
        method: Method,
        incoming: &HeaderMap,
        start: Url,
    ) -> Result<reqwest::Response, ProxyError> {
        let mut visited: HashSet<(String, String)> = HashSet::new();
        let mut hop = RedirectHop::new(start, incoming, &self.config);

        for count in 1..=self.config.max_hops {
            let host = hop.url.host_str().unwrap_or_default().to_string();
            if !visited.insert((host.clone(), hop.url.to_string())) {
                tracing::warn!(url = %hop.url, hop = count, "Registry redirect loop");
                return Err(ProxyError::RedirectLoop(hop.url.to_string()));
            }

            tracing::debug!(
                hop = count,
                host = %host,
                backend = hop.kind.as_str(),
                "Registry hop"
            );

            let response = self
                .client
                .request(method.clone(), hop.url.clone())
                .headers(hop.headers.clone())
                .send()
                .await
                .map_err(|e| ProxyError::upstream(&hop.url, e))?;

            match next_hop(&response, &hop.url) {
                Some(next) => {
                    tracing::debug!(
                        hop = count,
                        status = %response.status(),
                        location = %next,
                        "Following registry redirect"
                    );
                    hop = RedirectHop::new(next, incoming, &self.config);
                }
                None => {
                    metrics::record_registry_hops(count);
                    return Ok(response);
                }
            }
        }

        tracing::warn!(max_hops = self.config.max_hops, "Registry redirect chain too long");
        Err(ProxyError::TooManyRedirects {
            max_hops: self.config.max_hops,
        })
    }
}

fn is_redirect(status: StatusCode) -> bool {
    matches!(
        status,
        StatusCode::MOVED_PERMANENTLY
            | StatusCode::FOUND
            | StatusCode::TEMPORARY_REDIRECT
            | StatusCode::PERMANENT_REDIRECT
    )
}

/// Where a redirect response leads, if it is a followable redirect.
fn next_hop(response: &reqwest::Response, current: &Url) -> Option<Url> {
    if !is_redirect(response.status()) {
        return None;
    }
    let location = response.headers().get(LOCATION)?.to_str().ok()?;
    let next = current.join(location).ok()?;
    matches!(next.scheme(), "http" | "https").then_some(next)
}

/// Move the path and query of `target` onto another base URL.
fn rebase(base: &str, target: &Url) -> Result<Url, ProxyError> {
    let mut url = Url::parse(base).map_err(|e| ProxyError::InvalidTarget(format!("{base}: {e}")))?;
    url.set_path(target.path());
    url.set_query(target.query());
    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;
    use sha2::{Digest, Sha256};

    fn incoming() -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(HOST, HeaderValue::from_static("proxy.test"));
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer secret"));
        headers.insert("accept", HeaderValue::from_static("application/vnd.oci.image.index.v1+json"));
        headers
    }

    #[test]
    fn test_empty_payload_hash() {
        assert_eq!(format!("{:x}", Sha256::digest(b"")), EMPTY_PAYLOAD_SHA256);
    }

    #[test]
    fn test_storage_hop_is_anonymous() {
        let url = Url::parse("https://bucket.s3.us-east-1.amazonaws.com/blob?X-Amz-Signature=1").unwrap();
        let hop = RedirectHop::new(url, &incoming(), &RegistryConfig::default());

        assert_eq!(hop.kind, BackendKind::StorageBackend);
        assert!(hop.headers.get(AUTHORIZATION).is_none());
        assert!(hop.headers.get(REFERER).is_none());
        assert_eq!(hop.headers[HOST], "bucket.s3.us-east-1.amazonaws.com");
        assert_eq!(hop.headers[X_AMZ_CONTENT_SHA256], EMPTY_PAYLOAD_SHA256);

        let date = hop.headers[X_AMZ_DATE].to_str().unwrap();
        assert_eq!(date.len(), 16);
        assert_eq!(&date[8..9], "T");
        assert!(date.ends_with('Z'));
        assert!(chrono::NaiveDateTime::parse_from_str(date, AMZ_DATE_FORMAT).is_ok());
    }

    #[test]
    fn test_registry_hop_keeps_credentials_and_sets_referer() {
        let url = Url::parse("https://registry-1.docker.io/v2/library/nginx/manifests/latest").unwrap();
        let hop = RedirectHop::new(url, &incoming(), &RegistryConfig::default());

        assert_eq!(hop.kind, BackendKind::Registry);
        assert_eq!(hop.headers[AUTHORIZATION], "Bearer secret");
        assert_eq!(hop.headers[REFERER], "https://registry-1.docker.io");
        assert_eq!(hop.headers[HOST], "registry-1.docker.io");
        assert!(hop.headers.get(X_AMZ_DATE).is_none());
    }

    #[test]
    fn test_generic_hop_referer_is_origin() {
        let url = Url::parse("https://production.cloudflare.docker.com:8443/registry-v2/blob").unwrap();
        let hop = RedirectHop::new(url, &incoming(), &RegistryConfig::default());
        assert_eq!(hop.kind, BackendKind::Generic);
        assert_eq!(hop.headers[REFERER], "https://production.cloudflare.docker.com:8443");
    }

    #[test]
    fn test_token_detection_and_rebase() {
        let target = Url::parse("https://registry-1.docker.io/token?service=registry.docker.io&scope=x").unwrap();
        assert!(RegistryResolver::is_token_request(&target));
        let url = rebase("https://auth.docker.io", &target).unwrap();
        assert_eq!(url.as_str(), "https://auth.docker.io/token?service=registry.docker.io&scope=x");

        let blob = Url::parse("https://registry-1.docker.io/v2/library/nginx/blobs/sha256:abc").unwrap();
        assert!(!RegistryResolver::is_token_request(&blob));
    }

    #[test]
    fn test_redirect_statuses() {
        for code in [301, 302, 307, 308] {
            assert!(is_redirect(StatusCode::from_u16(code).unwrap()));
        }
        for code in [200, 303, 304, 404] {
            assert!(!is_redirect(StatusCode::from_u16(code).unwrap()));
        }
    }
}

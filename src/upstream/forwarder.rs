//! Origin forwarder for the generic proxy path.
//!
//! # Responsibilities
//! - Rebuild inbound headers for the target origin (Host, Origin, Referer,
//!   spoofed User-Agent, no Accept-Encoding)
//! - Stream non-GET/HEAD request bodies without buffering
//! - Follow upstream redirects, re-headering every hop for its own host
//!
//! # Design Decisions
//! - No retries: a failed fetch surfaces to the caller as `ProxyError::Upstream`
//! - Upstream error statuses are returned as-is, they are not failures
//! - Accept-Encoding is dropped so the rewriter always sees identity bodies
//! - 301/302/303 turn a body-carrying request into a bodiless GET; a 307/308
//!   after a streamed body cannot be replayed and is returned to the client

use std::collections::HashSet;
use std::time::Duration;

use axum::body::Body;
use axum::http::{
    header::{
        ACCEPT_ENCODING, CONTENT_LENGTH, CONTENT_TYPE, HOST, LOCATION, ORIGIN, REFERER,
        TRANSFER_ENCODING, USER_AGENT,
    },
    HeaderMap, HeaderValue, Method, StatusCode,
};
use reqwest::redirect;
use url::Url;

use crate::config::ProxyConfig;
use crate::error::ProxyError;
use crate::security::headers::forwardable_request_headers;
use crate::upstream::agent::UserAgentPool;

/// Issues outbound requests to arbitrary origins.
#[derive(Debug, Clone)]
pub struct OriginForwarder {
    client: reqwest::Client,
    agents: UserAgentPool,
    max_redirects: usize,
}

impl OriginForwarder {
    pub fn new(config: &ProxyConfig) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .redirect(redirect::Policy::none())
            .connect_timeout(Duration::from_secs(config.timeouts.connect_secs))
            .build()?;

        Ok(Self {
            client,
            agents: UserAgentPool::new(&config.rewrite.user_agents),
            max_redirects: config.rewrite.generic_max_redirects,
        })
    }

    /// Headers sent to the origin for a request aimed at `target`.
    pub fn outbound_headers(&self, incoming: &HeaderMap, target: &Url) -> HeaderMap {
        let mut headers = forwardable_request_headers(incoming);
        headers.remove(ACCEPT_ENCODING);

        if let Ok(host) = HeaderValue::from_str(&host_header(target)) {
            headers.insert(HOST, host);
        }
        if let Ok(origin) = HeaderValue::from_str(&target.origin().ascii_serialization()) {
            headers.insert(ORIGIN, origin);
        }
        if let Ok(referer) = HeaderValue::from_str(target.as_str()) {
            headers.insert(REFERER, referer);
        }
        if let Some(agent) = self.agents.pick() {
            headers.insert(USER_AGENT, agent.clone());
        }
        headers
    }

    /// Forward a request to `target` and return the upstream response.
    ///
    /// Redirects are followed hop by hop; the returned response's URL is the
    /// last hop. The response body is not read; callers stream it.
    pub async fn forward(
        &self,
        mut method: Method,
        incoming: &HeaderMap,
        body: Body,
        target: &Url,
    ) -> Result<reqwest::Response, ProxyError> {
        let mut body = has_body(&method).then_some(body);
        let mut sent_body = false;
        let mut url = target.clone();
        let mut visited: HashSet<Url> = HashSet::new();

        for hop in 0..=self.max_redirects {
            if !visited.insert(url.clone()) {
                tracing::warn!(url = %url, hop, "Origin redirect loop");
                return Err(ProxyError::RedirectLoop(url.to_string()));
            }

            let mut headers = self.outbound_headers(incoming, &url);
            let mut request = self.client.request(method.clone(), url.clone());
            match body.take() {
                Some(body) => {
                    sent_body = true;
                    request = request.body(reqwest::Body::wrap_stream(body.into_data_stream()));
                }
                None if sent_body || !has_body(&method) => strip_body_headers(&mut headers),
                None => {}
            }

            tracing::debug!(method = %method, target = %url, hop, "Forwarding to origin");

            let response = request
                .headers(headers)
                .send()
                .await
                .map_err(|e| ProxyError::upstream(&url, e))?;

            let Some(next) = redirect_target(&response, &url) else {
                return Ok(response);
            };

            match response.status() {
                StatusCode::MOVED_PERMANENTLY | StatusCode::FOUND | StatusCode::SEE_OTHER => {
                    if has_body(&method) {
                        method = Method::GET;
                    }
                }
                // The streamed body is gone; let the client repeat the request.
                _ if sent_body => return Ok(response),
                _ => {}
            }

            tracing::debug!(status = %response.status(), location = %next, "Following origin redirect");
            url = next;
        }

        tracing::warn!(max_redirects = self.max_redirects, target = %target, "Origin redirect chain too long");
        Err(ProxyError::TooManyRedirects {
            max_hops: self.max_redirects,
        })
    }
}

fn has_body(method: &Method) -> bool {
    method != Method::GET && method != Method::HEAD
}

fn strip_body_headers(headers: &mut HeaderMap) {
    headers.remove(CONTENT_LENGTH);
    headers.remove(CONTENT_TYPE);
    headers.remove(TRANSFER_ENCODING);
}

/// Where a redirect response leads, if it is a followable redirect.
fn redirect_target(response: &reqwest::Response, current: &Url) -> Option<Url> {
    if !matches!(
        response.status(),
        StatusCode::MOVED_PERMANENTLY
            | StatusCode::FOUND
            | StatusCode::SEE_OTHER
            | StatusCode::TEMPORARY_REDIRECT
            | StatusCode::PERMANENT_REDIRECT
    ) {
        return None;
    }
    let location = response.headers().get(LOCATION)?.to_str().ok()?;
    let next = current.join(location).ok()?;
    matches!(next.scheme(), "http" | "https").then_some(next)
}

/// `Host` value for a URL: hostname plus port when it is not the default.
pub(crate) fn host_header(url: &Url) -> String {
    let host = url.host_str().unwrap_or_default();
    match url.port() {
        Some(port) => format!("{host}:{port}"),
        None => host.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn forwarder() -> OriginForwarder {
        let mut config = ProxyConfig::default();
        config.rewrite.user_agents = vec!["test-agent/1.0".into()];
        OriginForwarder::new(&config).unwrap()
    }

    #[test]
    fn test_outbound_headers_spoof_origin() {
        let mut incoming = HeaderMap::new();
        incoming.insert(HOST, HeaderValue::from_static("proxy.test"));
        incoming.insert(ACCEPT_ENCODING, HeaderValue::from_static("gzip, br"));
        incoming.insert(USER_AGENT, HeaderValue::from_static("curl/8"));
        incoming.insert("cookie", HeaderValue::from_static("session=1"));

        let target = Url::parse("https://site.example:8443/a/b?c=d").unwrap();
        let headers = forwarder().outbound_headers(&incoming, &target);

        assert_eq!(headers[HOST], "site.example:8443");
        assert_eq!(headers[ORIGIN], "https://site.example:8443");
        assert_eq!(headers[REFERER], "https://site.example:8443/a/b?c=d");
        assert_eq!(headers[USER_AGENT], "test-agent/1.0");
        assert_eq!(headers["cookie"], "session=1");
        assert!(headers.get(ACCEPT_ENCODING).is_none());
    }

    #[test]
    fn test_host_header_omits_default_port() {
        assert_eq!(host_header(&Url::parse("https://site.example:443/").unwrap()), "site.example");
        assert_eq!(host_header(&Url::parse("http://127.0.0.1:8080/").unwrap()), "127.0.0.1:8080");
    }

    fn redirect(status: u16, location: &str) -> reqwest::Response {
        let response = axum::http::Response::builder()
            .status(status)
            .header(LOCATION, location)
            .body("")
            .unwrap();
        reqwest::Response::from(response)
    }

    #[test]
    fn test_redirect_target_resolves_location() {
        let current = Url::parse("http://a.example/dir/page").unwrap();
        for code in [301, 302, 303, 307, 308] {
            let next = redirect_target(&redirect(code, "other"), &current).unwrap();
            assert_eq!(next.as_str(), "http://a.example/dir/other");
        }
        let next = redirect_target(&redirect(302, "https://b.example/x"), &current).unwrap();
        assert_eq!(next.host_str(), Some("b.example"));
    }

    #[test]
    fn test_redirect_target_ignores_non_redirects() {
        let current = Url::parse("http://a.example/").unwrap();
        assert!(redirect_target(&redirect(200, "/x"), &current).is_none());
        assert!(redirect_target(&redirect(304, "/x"), &current).is_none());
        assert!(redirect_target(&redirect(302, "ftp://a.example/x"), &current).is_none());
    }

    #[test]
    fn test_hop_headers_follow_the_hop_host() {
        let forwarder = forwarder();
        let first = forwarder.outbound_headers(&HeaderMap::new(), &Url::parse("https://github.com/o/r").unwrap());
        let second = forwarder.outbound_headers(
            &HeaderMap::new(),
            &Url::parse("https://objects.githubusercontent.com/blob").unwrap(),
        );
        assert_eq!(first[HOST], "github.com");
        assert_eq!(second[HOST], "objects.githubusercontent.com");
        assert_eq!(second[ORIGIN], "https://objects.githubusercontent.com");
        assert_eq!(second[REFERER], "https://objects.githubusercontent.com/blob");
    }
}

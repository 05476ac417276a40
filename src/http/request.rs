//! Request handling.
//!
//! # Responsibilities
//! - Generate a unique request ID (UUID v4) for every inbound request
//! - Derive the origin the client used to reach the proxy
//!
//! # Design Decisions
//! - Request ID added as early as possible for tracing
//! - A client-supplied `x-request-id` is kept as-is

use axum::http::{header::HOST, HeaderMap, HeaderName, HeaderValue, Request, Uri};
use tower_http::request_id::{MakeRequestId, RequestId};
use uuid::Uuid;

pub const X_REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");

const X_FORWARDED_PROTO: &str = "x-forwarded-proto";
const X_FORWARDED_HOST: &str = "x-forwarded-host";

/// Request ID generator for `SetRequestIdLayer`.
#[derive(Debug, Clone, Copy, Default)]
pub struct UuidRequestId;

impl MakeRequestId for UuidRequestId {
    fn make_request_id<B>(&mut self, _request: &Request<B>) -> Option<RequestId> {
        HeaderValue::from_str(&Uuid::new_v4().to_string())
            .ok()
            .map(RequestId::new)
    }
}

/// Request ID of an inbound request, or `"unknown"` if none was set.
pub fn request_id(headers: &HeaderMap) -> &str {
    headers
        .get(X_REQUEST_ID)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown")
}

/// Scheme and authority the client used to reach the proxy, e.g.
/// `https://proxy.example`.
///
/// Honors `X-Forwarded-Proto`/`X-Forwarded-Host` from a fronting TLS
/// terminator; defaults to `http`.
pub fn proxy_origin(headers: &HeaderMap, uri: &Uri) -> String {
    let scheme = first_value(headers, X_FORWARDED_PROTO)
        .or(uri.scheme_str())
        .unwrap_or("http");
    let host = first_value(headers, X_FORWARDED_HOST)
        .or_else(|| first_value(headers, HOST.as_str()))
        .or(uri.authority().map(|a| a.as_str()))
        .unwrap_or("localhost");

    format!("{scheme}://{host}")
}

/// First entry of a possibly comma-separated header.
fn first_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_ids_are_unique_uuids() {
        let request = Request::new(());
        let mut make = UuidRequestId;
        let a = make.make_request_id(&request).unwrap();
        let b = make.make_request_id(&request).unwrap();
        let a = a.header_value().to_str().unwrap();
        assert!(Uuid::parse_str(a).is_ok());
        assert_ne!(a, b.header_value().to_str().unwrap());
    }

    #[test]
    fn test_proxy_origin_from_host() {
        let mut headers = HeaderMap::new();
        headers.insert(HOST, HeaderValue::from_static("127.0.0.1:8080"));
        let uri: Uri = "/https://site.example/".parse().unwrap();
        assert_eq!(proxy_origin(&headers, &uri), "http://127.0.0.1:8080");
    }

    #[test]
    fn test_proxy_origin_behind_terminator() {
        let mut headers = HeaderMap::new();
        headers.insert(HOST, HeaderValue::from_static("internal:8080"));
        headers.insert(X_FORWARDED_PROTO, HeaderValue::from_static("https, http"));
        headers.insert(X_FORWARDED_HOST, HeaderValue::from_static("mirror.example"));
        let uri: Uri = "/".parse().unwrap();
        assert_eq!(proxy_origin(&headers, &uri), "https://mirror.example");
    }

    #[test]
    fn test_request_id_fallback() {
        assert_eq!(request_id(&HeaderMap::new()), "unknown");
    }
}

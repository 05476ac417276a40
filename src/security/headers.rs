//! Header manipulation.
//!
//! # Responsibilities
//! - Strip hop-by-hop headers in both directions
//! - Strip framing/sniffing security headers from proxied responses
//! - Add the CORS headers every proxied response carries

use axum::http::{
    header::{
        ACCESS_CONTROL_ALLOW_CREDENTIALS, ACCESS_CONTROL_ALLOW_ORIGIN, CONNECTION,
        CONTENT_LENGTH, CONTENT_SECURITY_POLICY, HOST, TE, TRAILER, TRANSFER_ENCODING, UPGRADE,
        X_CONTENT_TYPE_OPTIONS, X_FRAME_OPTIONS,
    },
    HeaderMap, HeaderName, HeaderValue,
};

/// Connection-scoped headers that must not be forwarded.
pub fn is_hop_by_hop(name: &HeaderName) -> bool {
    name == CONNECTION
        || name == TE
        || name == TRAILER
        || name == TRANSFER_ENCODING
        || name == UPGRADE
        || name.as_str() == "keep-alive"
        || name.as_str() == "proxy-connection"
}

/// Copy inbound request headers for an upstream request.
///
/// Drops hop-by-hop headers, `Host` and `Content-Length`; the transport sets
/// the latter two for the outbound connection.
pub fn forwardable_request_headers(incoming: &HeaderMap) -> HeaderMap {
    let mut headers = HeaderMap::with_capacity(incoming.len());
    for (name, value) in incoming {
        if is_hop_by_hop(name) || name == HOST || name == CONTENT_LENGTH {
            continue;
        }
        headers.append(name.clone(), value.clone());
    }
    headers
}

/// Copy upstream response headers for the client, minus hop-by-hop headers.
pub fn forwardable_response_headers(upstream: &HeaderMap) -> HeaderMap {
    let mut headers = HeaderMap::with_capacity(upstream.len() + 2);
    for (name, value) in upstream {
        if !is_hop_by_hop(name) {
            headers.append(name.clone(), value.clone());
        }
    }
    headers
}

/// Remove headers that would stop a proxied page from rendering or framing.
pub fn strip_frame_security(headers: &mut HeaderMap) {
    headers.remove(CONTENT_SECURITY_POLICY);
    headers.remove(X_FRAME_OPTIONS);
    headers.remove("frame-options");
    headers.remove(X_CONTENT_TYPE_OPTIONS);
}

pub fn allow_any_origin(headers: &mut HeaderMap) {
    headers.insert(ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*"));
}

pub fn allow_credentials(headers: &mut HeaderMap) {
    headers.insert(ACCESS_CONTROL_ALLOW_CREDENTIALS, HeaderValue::from_static("true"));
}

//! Response handling and transformation.
//!
//! # Responsibilities
//! - Turn upstream responses into client responses
//! - Dispatch generic-path bodies to the HTML/CSS rewriters
//! - Serve the housekeeping responses (robots, favicon)
//!
//! # Design Decisions
//! - HTML and passthrough bodies stream; only CSS is buffered
//! - Rewritten bodies drop `Content-Length`, passthrough keeps it
//! - Hop-by-hop headers stripped automatically

use std::sync::Arc;

use axum::{
    body::Body,
    http::{header::CONTENT_LENGTH, header::CONTENT_TYPE, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};

use crate::error::ProxyError;
use crate::rewrite::css::rewrite_css;
use crate::rewrite::html::rewrite_stream;
use crate::rewrite::{ContentKind, DirectHostPolicy, RewriteContext, VisitorRegistry};
use crate::security::headers::{
    allow_any_origin, allow_credentials, forwardable_response_headers, strip_frame_security,
};

pub const ROBOTS_TXT: &str = "User-agent: *\nDisallow: /";

/// Client response for a generic-path upstream response.
///
/// Relative references resolve against the upstream's final URL, i.e. after
/// any redirects the forwarder followed.
pub async fn generic_response(
    upstream: reqwest::Response,
    proxy_origin: String,
    policy: Arc<DirectHostPolicy>,
    visitors: Arc<VisitorRegistry>,
) -> Result<Response, ProxyError> {
    let status = upstream.status();
    let final_url = upstream.url().clone();

    let mut headers = forwardable_response_headers(upstream.headers());
    strip_frame_security(&mut headers);
    allow_any_origin(&mut headers);
    allow_credentials(&mut headers);

    let kind = ContentKind::from_headers(&headers);
    let body = match kind {
        ContentKind::Html => {
            headers.remove(CONTENT_LENGTH);
            let ctx = RewriteContext::new(proxy_origin, final_url, policy);
            Body::from_stream(rewrite_stream(upstream.bytes_stream(), visitors, ctx))
        }
        ContentKind::Css => {
            headers.remove(CONTENT_LENGTH);
            let text = upstream
                .text()
                .await
                .map_err(|e| ProxyError::upstream(&final_url, e))?;
            let ctx = RewriteContext::new(proxy_origin, final_url, policy);
            Body::from(rewrite_css(&text, &ctx))
        }
        ContentKind::Other => Body::from_stream(upstream.bytes_stream()),
    };

    tracing::debug!(status = %status, kind = ?kind, "Relaying origin response");

    let mut response = Response::new(body);
    *response.status_mut() = status;
    *response.headers_mut() = headers;
    Ok(response)
}

/// Client response for a registry-mode upstream response. Body untouched.
pub fn registry_response(upstream: reqwest::Response) -> Response {
    let status = upstream.status();
    let mut headers = forwardable_response_headers(upstream.headers());
    allow_any_origin(&mut headers);

    let mut response = Response::new(Body::from_stream(upstream.bytes_stream()));
    *response.status_mut() = status;
    *response.headers_mut() = headers;
    response
}

pub fn robots() -> Response {
    (
        [(CONTENT_TYPE, HeaderValue::from_static("text/plain"))],
        ROBOTS_TXT,
    )
        .into_response()
}

pub fn favicon() -> Response {
    StatusCode::NO_CONTENT.into_response()
}

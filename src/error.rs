//! Proxy error type and its HTTP representation.
//!
//! Every failure on the request path ends up as a `ProxyError`, which renders
//! as a JSON payload of the form `{"error": "...", "detail": "..."}`. Upstream
//! responses with error statuses are NOT errors here; they are passed through
//! verbatim.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Errors that can occur while proxying a request.
#[derive(Debug, Error)]
pub enum ProxyError {
    /// The requested target is not an absolute http(s) URL.
    #[error("invalid target URL: {0}")]
    InvalidTarget(String),

    /// The origin could not be reached (DNS, connect, TLS, reset...).
    #[error("could not reach origin {target}: {source}")]
    Upstream {
        target: String,
        #[source]
        source: reqwest::Error,
    },

    /// A redirect chain was longer than the configured bound.
    #[error("redirect chain exceeded {max_hops} hops")]
    TooManyRedirects { max_hops: usize },

    /// A redirect pointed back at a URL already visited.
    #[error("redirect loop detected at {0}")]
    RedirectLoop(String),
}

impl ProxyError {
    /// HTTP status reported to the client for this error.
    pub fn status(&self) -> StatusCode {
        match self {
            ProxyError::InvalidTarget(_) => StatusCode::BAD_REQUEST,
            ProxyError::Upstream { .. } => StatusCode::BAD_GATEWAY,
            ProxyError::TooManyRedirects { .. } | ProxyError::RedirectLoop(_) => {
                StatusCode::LOOP_DETECTED
            }
        }
    }

    fn label(&self) -> &'static str {
        match self {
            ProxyError::InvalidTarget(_) => "Proxy Error",
            ProxyError::Upstream { .. } => "Upstream Unreachable",
            ProxyError::TooManyRedirects { .. } | ProxyError::RedirectLoop(_) => "Redirect Error",
        }
    }

    pub(crate) fn upstream(target: impl ToString, source: reqwest::Error) -> Self {
        ProxyError::Upstream {
            target: target.to_string(),
            source,
        }
    }
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        let body = json!({
            "error": self.label(),
            "detail": self.to_string(),
        });
        let mut response = (self.status(), Json(body)).into_response();
        crate::security::headers::allow_any_origin(response.headers_mut());
        response
    }
}

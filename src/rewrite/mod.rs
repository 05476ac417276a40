//! Content rewriting subsystem.
//!
//! # Data Flow
//! ```text
//! Upstream response (generic path)
//!     → ContentKind::from_headers
//!     → text/html: html.rs (streaming, element visitors)
//!     → text/css:  css.rs (buffered, single-pass url() scan)
//!     → other:     passthrough
//!
//! Every reference:
//!     → resolver.rs (join against page URL, Skip / Direct / Proxied)
//!     → policy.rs (direct-host allowlist)
//! ```
//!
//! # Design Decisions
//! - HTML is never buffered as a whole; CSS is, since stylesheets are small
//! - One bad reference is left untouched instead of failing the document
//! - The rewrite context is built per response and owned by that response

pub mod css;
pub mod html;
pub mod policy;
pub mod resolver;
pub mod script;

use axum::http::{header::CONTENT_TYPE, HeaderMap};

pub use html::{ElementVisitor, VisitorRegistry};
pub use policy::DirectHostPolicy;
pub use resolver::{Action, RewriteContext};

/// How a response body is treated on the generic path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentKind {
    Html,
    Css,
    Other,
}

impl ContentKind {
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let content_type = headers
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_ascii_lowercase();

        if content_type.contains("text/html") {
            ContentKind::Html
        } else if content_type.contains("text/css") {
            ContentKind::Css
        } else {
            ContentKind::Other
        }
    }
}

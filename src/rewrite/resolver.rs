//! Reference resolution.
//!
//! Every embedded reference goes through [`RewriteContext::resolve`], which
//! joins it against the page URL and decides whether it is left alone, served
//! directly from its host, or routed back through the proxy.

use std::sync::Arc;

use url::Url;

use crate::observability::metrics;
use crate::rewrite::policy::DirectHostPolicy;

/// Decision for a single embedded reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Leave the original value untouched.
    Skip,
    /// Serve from the original host over https.
    Direct(Url),
    /// Route through the proxy; holds the absolute upstream URL.
    Proxied(String),
}

/// Everything needed to rewrite references of one response.
#[derive(Debug, Clone)]
pub struct RewriteContext {
    proxy_origin: String,
    target: Url,
    policy: Arc<DirectHostPolicy>,
}

impl RewriteContext {
    pub fn new(proxy_origin: impl Into<String>, target: Url, policy: Arc<DirectHostPolicy>) -> Self {
        let mut proxy_origin = proxy_origin.into();
        while proxy_origin.ends_with('/') {
            proxy_origin.pop();
        }
        Self {
            proxy_origin,
            target,
            policy,
        }
    }

    pub fn proxy_origin(&self) -> &str {
        &self.proxy_origin
    }

    /// The URL relative references resolve against.
    pub fn target(&self) -> &Url {
        &self.target
    }

    pub fn policy(&self) -> &DirectHostPolicy {
        &self.policy
    }

    /// Classify a raw reference found in a document.
    pub fn resolve(&self, raw: &str) -> Action {
        let trimmed = raw.trim();
        if trimmed.is_empty()
            || trimmed.starts_with('#')
            || starts_with_ignore_case(trimmed, "data:")
            || starts_with_ignore_case(trimmed, "javascript:")
        {
            return Action::Skip;
        }

        let mut resolved = match self.target.join(trimmed) {
            Ok(url) => url,
            Err(_) if trimmed.starts_with("http") => return Action::Proxied(trimmed.to_string()),
            Err(_) => return Action::Skip,
        };

        // mailto:, tel: and friends cannot be fetched through the proxy.
        if !matches!(resolved.scheme(), "http" | "https") {
            return Action::Skip;
        }

        if self.policy.is_direct(&resolved) {
            // http -> https is always a permitted scheme change.
            let _ = resolved.set_scheme("https");
            return Action::Direct(resolved);
        }

        Action::Proxied(resolved.into())
    }

    /// Prefix an absolute URL with the proxy origin.
    pub fn proxied(&self, absolute: &str) -> String {
        format!("{}/{}", self.proxy_origin, absolute)
    }

    /// The replacement value for a raw reference, or `None` to keep it.
    pub fn rewrite(&self, raw: &str) -> Option<String> {
        match self.resolve(raw) {
            Action::Skip => None,
            Action::Direct(url) => {
                metrics::record_rewrite("direct");
                Some(url.into())
            }
            Action::Proxied(absolute) => {
                metrics::record_rewrite("proxied");
                Some(self.proxied(&absolute))
            }
        }
    }
}

fn starts_with_ignore_case(value: &str, prefix: &str) -> bool {
    value
        .get(..prefix.len())
        .map(|head| head.eq_ignore_ascii_case(prefix))
        .unwrap_or(false)
}

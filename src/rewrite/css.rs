//! Stylesheet rewriting.
//!
//! A single scan over every `url(...)` token. Each reference is classified
//! exactly once, so an absolute reference that has just been prefixed can
//! never be picked up again as a root-relative path.
//!
//! | reference            | output                                          |
//! |----------------------|-------------------------------------------------|
//! | `http(s)://` direct  | `url("{url}")`                                  |
//! | `http(s)://` other   | `url("{proxy}/{url}")`                          |
//! | `//host/path`        | as above, with the page scheme                  |
//! | `/path`              | `url("{proxy}/{page origin}/path")`             |
//! | anything else        | unchanged                                       |

use std::sync::LazyLock;

use regex::{Captures, Regex};
use url::Url;

use crate::observability::metrics;
use crate::rewrite::resolver::RewriteContext;

static CSS_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)url\(\s*['"]?([^'")]*)['"]?\s*\)"#).expect("css url pattern is valid")
});

/// Rewrite every eligible `url(...)` reference in a stylesheet.
pub fn rewrite_css(css: &str, ctx: &RewriteContext) -> String {
    CSS_URL
        .replace_all(css, |caps: &Captures<'_>| match classify(caps[1].trim(), ctx) {
            Some(rewritten) => format!("url(\"{rewritten}\")"),
            None => caps[0].to_string(),
        })
        .into_owned()
}

fn classify(reference: &str, ctx: &RewriteContext) -> Option<String> {
    if reference.starts_with("http://") || reference.starts_with("https://") {
        return absolute(reference, ctx);
    }
    if reference.starts_with("//") {
        let absolute_ref = format!("{}:{}", ctx.target().scheme(), reference);
        return absolute(&absolute_ref, ctx);
    }
    if reference.starts_with('/') {
        let origin = ctx.target().origin().ascii_serialization();
        metrics::record_rewrite("proxied");
        return Some(ctx.proxied(&format!("{origin}{reference}")));
    }
    None
}

fn absolute(reference: &str, ctx: &RewriteContext) -> Option<String> {
    if reference.starts_with(&format!("{}/", ctx.proxy_origin())) {
        return None;
    }
    let direct = Url::parse(reference)
        .map(|url| ctx.policy().is_direct(&url))
        .unwrap_or(false);
    if direct {
        metrics::record_rewrite("direct");
        Some(reference.to_string())
    } else {
        metrics::record_rewrite("proxied");
        Some(ctx.proxied(reference))
    }
}

//! Client link generation.
//!
//! Produces the commands and URLs users paste to go through the proxy:
//! `docker pull` lines, GitHub links and generic web links.

use std::sync::LazyLock;

use regex::Regex;
use url::Url;

use crate::upstream::forwarder::host_header;

static GITHUB_PREFIX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(https?://)?github\.com/").expect("github prefix pattern is valid")
});

static SCHEME_PREFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^https?://").expect("scheme prefix pattern is valid"));

/// `docker pull` through the proxy. Single-segment images get `library/`.
pub fn docker_pull_command(proxy: &Url, image: &str) -> Option<String> {
    let image = image.trim();
    if image.is_empty() {
        return None;
    }
    let image = if image.contains('/') {
        image.to_string()
    } else {
        format!("library/{image}")
    };
    Some(format!("docker pull {}/{image}", host_header(proxy)))
}

/// Proxied GitHub URL for a repository path or full github.com URL.
pub fn github_link(proxy: &Url, input: &str) -> Option<String> {
    let input = input.trim();
    if input.is_empty() {
        return None;
    }
    let path = GITHUB_PREFIX.replace(input, "");
    Some(format!("{}/https://github.com/{path}", base(proxy)))
}

/// Proxied URL for any site; the target is always fetched over https.
pub fn web_link(proxy: &Url, input: &str) -> Option<String> {
    let input = input.trim();
    if input.is_empty() {
        return None;
    }
    let rest = SCHEME_PREFIX.replace(input, "");
    Some(format!("{}/https://{rest}", base(proxy)))
}

fn base(proxy: &Url) -> String {
    proxy.origin().ascii_serialization()
}

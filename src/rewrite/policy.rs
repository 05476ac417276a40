//! Direct-host policy.
//!
//! Hosts matching the policy are handed to clients as plain `https` URLs
//! instead of being routed back through the proxy.
//!
//! Matching is a case-sensitive substring test on the URL host, so
//! `imgur.com` also matches `notimgur.com.example`. This is a known
//! limitation kept for compatibility with existing allowlists.

use url::Url;

/// Immutable set of host fragments exempt from rewriting.
#[derive(Debug, Clone, Default)]
pub struct DirectHostPolicy {
    hosts: Vec<String>,
}

impl DirectHostPolicy {
    pub fn new<I, S>(hosts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            hosts: hosts.into_iter().map(Into::into).collect(),
        }
    }

    /// Returns true if the URL host contains any configured fragment.
    pub fn is_direct(&self, url: &Url) -> bool {
        match url.host_str() {
            Some(host) => self.hosts.iter().any(|h| host.contains(h.as_str())),
            None => false,
        }
    }

    pub fn hosts(&self) -> &[String] {
        &self.hosts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> DirectHostPolicy {
        DirectHostPolicy::new(["imgur.com", "twimg.com"])
    }

    #[test]
    fn test_substring_match_on_host() {
        let p = policy();
        assert!(p.is_direct(&Url::parse("https://i.imgur.com/a.png").unwrap()));
        assert!(p.is_direct(&Url::parse("http://pbs.twimg.com/media/x.jpg").unwrap()));
        assert!(!p.is_direct(&Url::parse("https://example.com/imgur.com.png").unwrap()));
    }

    #[test]
    fn test_match_is_case_sensitive_substring() {
        let p = DirectHostPolicy::new(["Imgur"]);
        // Url lowercases hosts, so an uppercase fragment never matches.
        assert!(!p.is_direct(&Url::parse("https://IMGUR.com/").unwrap()));
        assert!(policy().is_direct(&Url::parse("https://notimgur.com.example/").unwrap()));
    }

    #[test]
    fn test_empty_policy_matches_nothing() {
        let p = DirectHostPolicy::default();
        assert!(!p.is_direct(&Url::parse("https://imgur.com/").unwrap()));
    }
}

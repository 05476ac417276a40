//! Spoofed User-Agent selection.

use axum::http::HeaderValue;

/// Fixed pool of browser User-Agent strings.
#[derive(Debug, Clone, Default)]
pub struct UserAgentPool {
    agents: Vec<HeaderValue>,
}

impl UserAgentPool {
    /// Build a pool, dropping entries that are not valid header values.
    pub fn new<I, S>(agents: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let agents = agents
            .into_iter()
            .filter_map(|a| match HeaderValue::from_str(a.as_ref()) {
                Ok(v) => Some(v),
                Err(_) => {
                    tracing::warn!(user_agent = a.as_ref(), "Ignoring invalid User-Agent");
                    None
                }
            })
            .collect();
        Self { agents }
    }

    /// Pick an agent uniformly at random, if the pool is not empty.
    pub fn pick(&self) -> Option<&HeaderValue> {
        if self.agents.is_empty() {
            return None;
        }
        self.agents.get(fastrand::usize(..self.agents.len()))
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }
}

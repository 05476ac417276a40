//! Counter storage.

use dashmap::DashMap;
use thiserror::Error;

use super::Counter;

#[derive(Debug, Error)]
pub enum StatsError {
    #[error("stats backend unavailable: {0}")]
    Unavailable(String),
}

/// Persistent side of the counters.
pub trait StatsStore: Send + Sync {
    fn increment(&self, counter: Counter) -> Result<(), StatsError>;
    fn get(&self, counter: Counter) -> Result<u64, StatsError>;
}

/// Process-local counters; reset on restart.
#[derive(Debug, Default)]
pub struct MemoryStatsStore {
    counts: DashMap<Counter, u64>,
}

impl MemoryStatsStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StatsStore for MemoryStatsStore {
    fn increment(&self, counter: Counter) -> Result<(), StatsError> {
        let mut count = self.counts.entry(counter).or_insert(0);
        *count = count.saturating_add(1);
        Ok(())
    }

    fn get(&self, counter: Counter) -> Result<u64, StatsError> {
        Ok(self.counts.get(&counter).map(|c| *c).unwrap_or(0))
    }
}

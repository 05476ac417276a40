//! Hit counters.
//!
//! # Data Flow
//! ```text
//! request handler
//!     → Stats::increment (never blocks, never fails)
//!     → collector.rs (unbounded channel → background task)
//!     → store.rs (StatsStore: in-memory DashMap)
//!
//! /_stats, dashboard
//!     → Stats::snapshot → snapshot.rs (progress percentages)
//! ```
//!
//! # Design Decisions
//! - Best effort: lost increments are acceptable, failures are logged at debug
//! - The response path never awaits the store

pub mod collector;
pub mod snapshot;
pub mod store;

use std::sync::Arc;

use crate::config::StatsConfig;

pub use collector::StatsDispatcher;
pub use snapshot::StatsSnapshot;
pub use store::{MemoryStatsStore, StatsError, StatsStore};

/// Counters tracked by the proxy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Counter {
    /// Every proxied or dashboard request.
    Total,
    /// Registry-mode requests.
    Docker,
    /// Requests whose target host mentions github.
    Github,
}

impl Counter {
    pub fn key(&self) -> &'static str {
        match self {
            Counter::Total => "hits_total",
            Counter::Docker => "hits_docker",
            Counter::Github => "hits_github",
        }
    }
}

/// Receives counter increments.
pub trait StatsSink: Send + Sync {
    fn increment(&self, counter: Counter);
}

/// Sink used when stats are disabled.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopStats;

impl StatsSink for NoopStats {
    fn increment(&self, _counter: Counter) {}
}

/// Handle shared by request handlers: a sink for writes and a store for reads.
#[derive(Clone)]
pub struct Stats {
    sink: Arc<dyn StatsSink>,
    store: Option<Arc<dyn StatsStore>>,
    progress_goal: u64,
}

impl Stats {
    /// Build from config. Spawns the collector task, so it needs a Tokio runtime.
    pub fn from_config(config: &StatsConfig) -> Self {
        if !config.enabled {
            tracing::info!("Stats disabled");
            return Self::disabled();
        }

        let store: Arc<dyn StatsStore> = Arc::new(MemoryStatsStore::new());
        let (dispatcher, _task) = StatsDispatcher::spawn(store.clone());
        Self {
            sink: Arc::new(dispatcher),
            store: Some(store),
            progress_goal: config.progress_goal,
        }
    }

    pub fn disabled() -> Self {
        Self {
            sink: Arc::new(NoopStats),
            store: None,
            progress_goal: 0,
        }
    }

    pub fn increment(&self, counter: Counter) {
        self.sink.increment(counter);
    }

    /// Current counters. A missing or failing store yields the empty snapshot.
    pub fn snapshot(&self) -> StatsSnapshot {
        let Some(store) = &self.store else {
            return StatsSnapshot::default();
        };

        let read = || -> Result<StatsSnapshot, StatsError> {
            Ok(StatsSnapshot::from_counts(
                store.get(Counter::Docker)?,
                store.get(Counter::Github)?,
                store.get(Counter::Total)?,
                self.progress_goal,
            ))
        };

        read().unwrap_or_else(|e| {
            tracing::debug!(error = %e, "Stats read failed");
            StatsSnapshot::default()
        })
    }
}

impl std::fmt::Debug for Stats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Stats")
            .field("enabled", &self.store.is_some())
            .field("progress_goal", &self.progress_goal)
            .finish()
    }
}

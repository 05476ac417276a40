//! Fire-and-forget counter dispatch.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::{Counter, StatsSink, StatsStore};

/// Channel front end of the stats store.
///
/// Increments are queued and applied by a background task, which exits once
/// every dispatcher clone has been dropped.
#[derive(Debug, Clone)]
pub struct StatsDispatcher {
    tx: mpsc::UnboundedSender<Counter>,
}

impl StatsDispatcher {
    pub fn spawn(store: Arc<dyn StatsStore>) -> (Self, JoinHandle<()>) {
        let (tx, mut rx) = mpsc::unbounded_channel::<Counter>();

        let task = tokio::spawn(async move {
            while let Some(counter) = rx.recv().await {
                if let Err(e) = store.increment(counter) {
                    tracing::debug!(counter = counter.key(), error = %e, "Stats increment failed");
                }
            }
            tracing::debug!("Stats collector stopped");
        });

        (Self { tx }, task)
    }
}

impl StatsSink for StatsDispatcher {
    fn increment(&self, counter: Counter) {
        if self.tx.send(counter).is_err() {
            tracing::debug!(counter = counter.key(), "Stats collector gone, increment dropped");
        }
    }
}

//! Stats snapshot served at `/_stats` and on the dashboard.

use serde::{Deserialize, Serialize};

/// Counter values plus progress toward the configured goal.
///
/// `docker` and `github` are percentages (0..=100); the `_raw` fields carry
/// the counts. `real` is false when no store backs the numbers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsSnapshot {
    pub docker: u64,
    pub docker_raw: u64,
    pub github: u64,
    pub github_raw: u64,
    pub total: u64,
    pub real: bool,
}

impl StatsSnapshot {
    pub fn from_counts(docker_raw: u64, github_raw: u64, total: u64, goal: u64) -> Self {
        Self {
            docker: progress(docker_raw, goal),
            docker_raw,
            github: progress(github_raw, goal),
            github_raw,
            total,
            real: true,
        }
    }
}

/// Rounded percentage of `goal`, capped at 100. A zero goal reports 0.
pub fn progress(value: u64, goal: u64) -> u64 {
    if goal == 0 {
        return 0;
    }
    ((value as f64 / goal as f64) * 100.0).round().min(100.0) as u64
}

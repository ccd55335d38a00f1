//! Aggregate statistics over buffered outcome events

use perfplan_core::OutcomeEvent;
use serde::{Deserialize, Serialize};

/// Pass/fail counts and latency figures for one run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AggregateStats {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,

    /// Mean elapsed time over every event, composites included
    pub avg_ms: f64,
    pub min_ms: u64,
    pub max_ms: u64,

    pub p50_ms: u64,
    pub p90_ms: u64,
    pub p95_ms: u64,
    pub p99_ms: u64,
}

impl AggregateStats {
    /// Computes statistics over top-level events; sub-events are not counted.
    pub fn from_events(events: &[OutcomeEvent]) -> Self {
        if events.is_empty() {
            return Self::default();
        }

        let passed = events.iter().filter(|e| e.success).count();
        let mut latencies: Vec<u64> = events.iter().map(|e| e.elapsed_ms).collect();
        latencies.sort_unstable();

        let sum: u128 = latencies.iter().map(|&ms| u128::from(ms)).sum();

        Self {
            total: events.len(),
            passed,
            failed: events.len() - passed,
            avg_ms: sum as f64 / latencies.len() as f64,
            min_ms: latencies[0],
            max_ms: latencies[latencies.len() - 1],
            p50_ms: percentile(&latencies, 50),
            p90_ms: percentile(&latencies, 90),
            p95_ms: percentile(&latencies, 95),
            p99_ms: percentile(&latencies, 99),
        }
    }

    /// Calculate error rate (0.0-1.0)
    pub fn error_rate(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        self.failed as f64 / self.total as f64
    }

    /// Calculate pass rate (0.0-1.0)
    pub fn pass_rate(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        self.passed as f64 / self.total as f64
    }
}

/// Nearest-rank percentile over an ascending slice: the smallest value with
/// at least `pct` percent of the samples at or below it.
fn percentile(sorted: &[u64], pct: usize) -> u64 {
    if sorted.is_empty() {
        return 0;
    }

    let rank = (sorted.len() * pct).div_ceil(100).max(1);
    sorted[rank.min(sorted.len()) - 1]
}

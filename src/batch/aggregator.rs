// src/batch/aggregator.rs
// =============================================================================
// Collects check results as batches finish and derives the summary numbers.
//
// The aggregator is append-only during a run. Only the scheduler writes to
// it, one batch at a time, so it needs no locking of its own; the RunContext
// wraps it in a mutex to share it with readers.
// =============================================================================

use serde::{Deserialize, Serialize};

use crate::checker::CheckResult;

/// Summary numbers over everything checked so far.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SummaryStats {
    pub total: usize,
    pub up: usize,
    pub down: usize,
    /// Rounded mean over results that have a latency above zero.
    /// None when no result has one.
    pub avg_latency_ms: Option<u64>,
}

impl SummaryStats {
    pub fn from_results(results: &[CheckResult]) -> Self {
        let up = results.iter().filter(|r| r.is_up()).count();

        // Results without a latency (DOWN) or with 0ms are left out of both
        // the sum and the count.
        let latencies: Vec<u64> = results
            .iter()
            .filter_map(|r| r.latency_ms)
            .filter(|&ms| ms > 0)
            .collect();

        let avg_latency_ms = if latencies.is_empty() {
            None
        } else {
            let sum: u64 = latencies.iter().sum();
            Some((sum as f64 / latencies.len() as f64).round() as u64)
        };

        Self {
            total: results.len(),
            up,
            down: results.len() - up,
            avg_latency_ms,
        }
    }
}

#[derive(Debug, Default)]
pub struct Aggregator {
    results: Vec<CheckResult>,
    summary: SummaryStats,
}

impl Aggregator {
    // Adds one finished batch and returns the updated summary
    pub fn append(&mut self, batch: Vec<CheckResult>) -> SummaryStats {
        self.results.extend(batch);
        self.summary = SummaryStats::from_results(&self.results);
        self.summary
    }

    pub fn summary(&self) -> SummaryStats {
        self.summary
    }

    pub fn results(&self) -> &[CheckResult] {
        &self.results
    }

    pub fn reset(&mut self) {
        self.results.clear();
        self.summary = SummaryStats::default();
    }
}

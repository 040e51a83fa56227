// src/batch/mod.rs
// =============================================================================
// This module runs a whole check: many sites, a few at a time.
//
// Submodules:
// - scheduler: Splits targets into batches and runs them one after another
// - aggregator: Collects results and computes the summary numbers
// =============================================================================

mod aggregator;
mod scheduler;

pub use aggregator::SummaryStats;
pub use scheduler::{RunContext, RunEvent, Scheduler, DEFAULT_CONCURRENCY};

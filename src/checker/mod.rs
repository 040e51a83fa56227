// src/checker/mod.rs
// =============================================================================
// This module contains the per-site checking logic.
//
// Submodules:
// - targets: Reads the list of sites to check from a text file
// - probe: Makes the HTTP request for one site and classifies the result
//
// This file (mod.rs) is the module root - it re-exports the public API so the
// rest of the application can write `checker::HttpProber` instead of
// `checker::probe::HttpProber`.
// =============================================================================

mod probe;
mod targets;

pub use probe::{CheckResult, FallbackPolicy, HttpProber, Probe, Status, DEFAULT_PROBE_TIMEOUT};
pub use targets::{load_target_file, Target};

// Only tests build results by hand
#[cfg(test)]
pub use probe::Evidence;

// src/batch/scheduler.rs
// =============================================================================
// Runs probes over the whole target list, one batch at a time.
//
// How it works:
// 1. Split the targets into consecutive groups of `concurrency` sites
//    (the last group may be smaller)
// 2. Probe every site in a group at the same time
// 3. Wait for the WHOLE group to finish
// 4. Hand the group's results to the aggregator and emit a BatchCompleted event
// 5. Only then start the next group
//
// Step 3 is the point: at most `concurrency` requests are ever in flight.
// That is polite to the sites being checked and keeps our own connection
// pool small. buffer_unordered(n) would start a new request as soon as any
// one finishes, which is NOT what we want here.
//
// Run state lives in a RunContext that the caller owns. Only one run can hold
// it at a time; a second call while a run is active is rejected.
// =============================================================================

use futures::future::join_all;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::mpsc::UnboundedSender;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::aggregator::{Aggregator, SummaryStats};
use crate::checker::{CheckResult, Probe, Target};
use crate::notify::Notification;

/// Default number of sites probed at the same time.
pub const DEFAULT_CONCURRENCY: usize = 5;

/// Reasons a run is refused before it starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum RunError {
    #[error("a run is already in progress")]
    AlreadyRunning,
    #[error("there are no sites to check")]
    NoTargets,
}

impl RunError {
    pub fn notification(&self) -> Notification {
        match self {
            RunError::AlreadyRunning => Notification::warning("A check is already running"),
            RunError::NoTargets => Notification::warning("No sites to check"),
        }
    }
}

/// Progress and result events, in the order they happen.
#[derive(Debug, Clone)]
pub enum RunEvent {
    Started {
        batches: usize,
    },
    BatchCompleted {
        index: usize,
        results: Vec<CheckResult>,
        summary: SummaryStats,
        completed: usize,
        total: usize,
    },
    Notice(Notification),
    Finished {
        cancelled: bool,
    },
}

/// What a finished (or cancelled) run produced.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub results: Vec<CheckResult>,
    pub summary: SummaryStats,
    pub cancelled: bool,
    pub elapsed: Duration,
}

// Long-lived state shared by every run
//
// Holds the "a run is active" flag and the aggregated results of the most
// recent run, which stay readable after the run ends (e.g. for sending a
// report).
#[derive(Debug, Default)]
pub struct RunContext {
    running: AtomicBool,
    aggregator: Mutex<Aggregator>,
}

impl RunContext {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    // Marks a run as active
    //
    // The flag is cleared when the returned guard is dropped, whichever way
    // the run ends.
    pub fn begin(&self) -> Result<RunGuard<'_>, RunError> {
        self.running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| RunError::AlreadyRunning)?;
        Ok(RunGuard { context: self })
    }

    pub fn summary(&self) -> SummaryStats {
        self.aggregator().summary()
    }

    /// A copy of every result gathered so far, in batch order.
    pub fn results(&self) -> Vec<CheckResult> {
        self.aggregator().results().to_vec()
    }

    // A panic while holding the lock cannot leave the Vec half-written in a
    // way that matters to readers, so a poisoned lock is still usable.
    fn aggregator(&self) -> MutexGuard<'_, Aggregator> {
        self.aggregator.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

pub struct RunGuard<'a> {
    context: &'a RunContext,
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.context.running.store(false, Ordering::Release);
    }
}

pub struct Scheduler<P> {
    prober: P,
    concurrency: usize,
    cancel: CancellationToken,
}

impl<P: Probe> Scheduler<P> {
    // A concurrency of 0 would never make progress, so it is raised to 1
    pub fn new(prober: P, concurrency: usize) -> Self {
        Self {
            prober,
            concurrency: concurrency.max(1),
            cancel: CancellationToken::new(),
        }
    }

    /// Token that stops the current run when cancelled.
    ///
    /// Cancellation is permanent for this scheduler: later runs end
    /// immediately with `cancelled = true`.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    // ceil(total / concurrency)
    pub fn batch_count(&self, total: usize) -> usize {
        total.div_ceil(self.concurrency)
    }

    pub async fn run(
        &self,
        context: &RunContext,
        targets: &[Target],
        events: &UnboundedSender<RunEvent>,
    ) -> Result<RunReport, RunError> {
        let _guard = match context.begin() {
            Ok(guard) => guard,
            Err(e) => return Err(reject(e, events)),
        };
        if targets.is_empty() {
            return Err(reject(RunError::NoTargets, events));
        }

        let started = Instant::now();
        let total = targets.len();
        let batches = self.batch_count(total);

        context.aggregator().reset();
        info!(total, batches, concurrency = self.concurrency, "run started");
        emit(
            events,
            RunEvent::Notice(Notification::info(format!("Checking {} sites...", total))),
        );
        emit(events, RunEvent::Started { batches });

        let mut cancelled = false;

        for (index, group) in targets.chunks(self.concurrency).enumerate() {
            if self.cancel.is_cancelled() {
                cancelled = true;
                break;
            }

            debug!(batch = index + 1, size = group.len(), "dispatching batch");
            let probes = join_all(group.iter().map(|target| self.prober.probe(target)));

            // In-flight probes of an abandoned group are dropped here
            let results = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => {
                    cancelled = true;
                    break;
                }
                results = probes => results,
            };

            let summary = context.aggregator().append(results.clone());
            let completed = summary.total;

            info!(
                batch = index + 1,
                batches,
                completed,
                total,
                up = summary.up,
                down = summary.down,
                "batch completed"
            );
            emit(
                events,
                RunEvent::BatchCompleted {
                    index,
                    results,
                    summary,
                    completed,
                    total,
                },
            );
        }

        let summary = context.summary();
        let notice = if cancelled {
            info!(completed = summary.total, total, "run cancelled");
            Notification::warning(format!("Check cancelled after {} of {} sites", summary.total, total))
        } else {
            info!(up = summary.up, down = summary.down, "run finished");
            Notification::success("Check completed")
        };
        emit(events, RunEvent::Finished { cancelled });
        emit(events, RunEvent::Notice(notice));

        Ok(RunReport {
            results: context.results(),
            summary,
            cancelled,
            elapsed: started.elapsed(),
        })
    }
}

// Nobody listening is fine: the run itself does not depend on its audience
fn emit(events: &UnboundedSender<RunEvent>, event: RunEvent) {
    let _ = events.send(event);
}

fn reject(error: RunError, events: &UnboundedSender<RunEvent>) -> RunError {
    info!(%error, "run rejected");
    emit(events, RunEvent::Notice(error.notification()));
    error
}

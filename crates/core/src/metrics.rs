//! Prometheus metrics for core components.
//!
//! This module provides metrics for:
//! - Submissions by job kind
//! - Terminal outcomes by job kind
//! - Status fetches issued by the poll loop

use once_cell::sync::Lazy;
use prometheus::{HistogramOpts, HistogramVec, IntCounterVec, Opts};

// =============================================================================
// Orchestrator Metrics
// =============================================================================

/// Submissions total by kind and result.
pub static JOBS_SUBMITTED: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("vidgrab_jobs_submitted_total", "Total job submissions"),
        &["kind", "result"], // "accepted", "rejected", "invalid"
    )
    .unwrap()
});

/// Terminal transitions by kind and outcome.
pub static JOBS_FINISHED: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("vidgrab_jobs_finished_total", "Total jobs reaching a terminal state"),
        &["kind", "outcome"], // "completed", "failed", "timed_out"
    )
    .unwrap()
});

// =============================================================================
// Poll Loop Metrics
// =============================================================================

/// Status fetches by kind and result.
pub static STATUS_FETCHES: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("vidgrab_status_fetches_total", "Total status fetches"),
        &["kind", "result"], // "ok", "error"
    )
    .unwrap()
});

/// Duration of a poll run, from entering Polling to its terminal state.
pub static POLL_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new("vidgrab_poll_duration_seconds", "Duration of poll runs").buckets(
            vec![1.0, 5.0, 15.0, 30.0, 60.0, 120.0, 300.0, 600.0, 1800.0, 3600.0],
        ),
        &["kind"],
    )
    .unwrap()
});

/// All core metrics, for registration by the server's registry.
pub fn all_metrics() -> Vec<Box<dyn prometheus::core::Collector>> {
    vec![
        Box::new(JOBS_SUBMITTED.clone()),
        Box::new(JOBS_FINISHED.clone()),
        Box::new(STATUS_FETCHES.clone()),
        Box::new(POLL_DURATION.clone()),
    ]
}

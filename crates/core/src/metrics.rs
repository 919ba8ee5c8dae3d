//! Prometheus metrics for core components.
//!
//! This module provides metrics for:
//! - Job submission and resolution
//! - Status polling
//! - Item outcomes and remote cancellations

use once_cell::sync::Lazy;
use prometheus::{HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts};

// =============================================================================
// Jobs
// =============================================================================

/// Jobs accepted by the remote service.
pub static JOBS_SUBMITTED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new("voxbatch_jobs_submitted_total", "Total jobs submitted").unwrap()
});

/// Submit calls that failed.
pub static JOB_SUBMIT_FAILURES: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "voxbatch_job_submit_failures_total",
        "Total job submissions that failed",
    )
    .unwrap()
});

/// Jobs resolved by outcome.
pub static JOBS_RESOLVED: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("voxbatch_jobs_resolved_total", "Total jobs resolved"),
        &["outcome"], // "completed", "failed", "cancelled", "timed_out"
    )
    .unwrap()
});

/// Time from submission to resolution, in seconds.
pub static JOB_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "voxbatch_job_duration_seconds",
            "Duration of remote jobs from submission to resolution",
        )
        .buckets(vec![1.0, 5.0, 10.0, 30.0, 60.0, 120.0, 300.0, 600.0]),
        &["outcome"],
    )
    .unwrap()
});

// =============================================================================
// Polling
// =============================================================================

/// Status calls that failed at the transport level.
pub static STATUS_CHECK_FAILURES: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "voxbatch_status_check_failures_total",
        "Total failed status checks",
    )
    .unwrap()
});

/// Remote cancel requests by result.
pub static REMOTE_CANCELS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "voxbatch_remote_cancels_total",
            "Total remote cancel requests",
        ),
        &["result"], // "success", "failed"
    )
    .unwrap()
});

// =============================================================================
// Items
// =============================================================================

/// Items that reached a terminal status.
pub static ITEMS_FINALIZED: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "voxbatch_items_finalized_total",
            "Total items finalized by status",
        ),
        &["status"],
    )
    .unwrap()
});

// =============================================================================
// Helper functions
// =============================================================================

/// Get all core metrics for registration in a registry.
pub fn all_metrics() -> Vec<Box<dyn prometheus::core::Collector>> {
    vec![
        // Jobs
        Box::new(JOBS_SUBMITTED.clone()),
        Box::new(JOB_SUBMIT_FAILURES.clone()),
        Box::new(JOBS_RESOLVED.clone()),
        Box::new(JOB_DURATION.clone()),
        // Polling
        Box::new(STATUS_CHECK_FAILURES.clone()),
        Box::new(REMOTE_CANCELS.clone()),
        // Items
        Box::new(ITEMS_FINALIZED.clone()),
    ]
}

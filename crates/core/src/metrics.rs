//! Metrics definitions for the tipping engine.
//!
//! Metrics are collected using the `metrics` crate; the host process decides
//! which recorder/exporter (if any) is installed.

use metrics::{counter, describe_counter, describe_histogram, histogram};
use std::time::Instant;

use crate::models::{CallStatus, ExecutionStatus, ExecutionStrategy};

/// Initialize all metric descriptions.
/// Call this once at startup before any metrics are recorded.
pub fn init_metrics() {
    describe_counter!(
        "tips_submitted_total",
        "Total number of call plans handed to a wallet"
    );
    describe_counter!(
        "tip_outcomes_total",
        "Terminal submission outcomes by overall status"
    );
    describe_counter!("tip_calls_total", "Per-call outcomes by status");
    describe_counter!(
        "tip_rejections_total",
        "Tip requests rejected before submission"
    );
    describe_counter!(
        "tip_persistence_failures_total",
        "Tip records that could not be saved after a payment"
    );
    describe_histogram!(
        "tip_submission_duration_seconds",
        "Time from submission start to terminal state in seconds"
    );
}

/// Record a call plan entering SUBMITTING.
pub fn record_tip_submitted(strategy: ExecutionStrategy) {
    counter!("tips_submitted_total", "strategy" => strategy.as_str()).increment(1);
}

/// Record a terminal submission outcome and its per-call breakdown.
pub fn record_tip_outcome(status: ExecutionStatus, calls: &[CallStatus]) {
    counter!("tip_outcomes_total", "status" => status.as_str()).increment(1);
    for call in calls {
        counter!("tip_calls_total", "status" => call.as_str()).increment(1);
    }
}

/// Record a request rejected before any call was built.
///
/// # Arguments
/// * `reason` - Short machine-readable reason ("no_recipients", ...)
pub fn record_tip_rejected(reason: &'static str) {
    counter!("tip_rejections_total", "reason" => reason).increment(1);
}

/// Record a failed tip record write.
pub fn record_persistence_failure() {
    counter!("tip_persistence_failures_total").increment(1);
}

/// A timer that records submission duration when dropped.
pub struct SubmissionTimer {
    start: Instant,
}

impl SubmissionTimer {
    /// Start a new submission timer.
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }
}

impl Default for SubmissionTimer {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for SubmissionTimer {
    fn drop(&mut self) {
        histogram!("tip_submission_duration_seconds").record(self.start.elapsed().as_secs_f64());
    }
}

//! Engine metrics.
//!
//! Counters for frames, skips and ledger churn. No exporter is installed
//! here; the host application may install one.

use metrics::{counter, histogram};
use spotter_models::SkipReason;

use crate::ledger::LedgerEvent;

/// Metric name constants for consistency.
pub mod names {
    /// Sampled frames that went through a pipeline.
    pub const FRAMES_PROCESSED_TOTAL: &str = "spotter_frames_processed_total";

    /// Frames skipped by reason.
    pub const FRAMES_SKIPPED_TOTAL: &str = "spotter_frames_skipped_total";

    /// Ledger events by kind.
    pub const LEDGER_EVENTS_TOTAL: &str = "spotter_ledger_events_total";

    /// Live events dropped because the subscriber fell behind.
    pub const LEDGER_EVENTS_DROPPED_TOTAL: &str = "spotter_ledger_events_dropped_total";

    /// Pipeline run duration in seconds by pipeline.
    pub const RUN_DURATION_SECONDS: &str = "spotter_run_duration_seconds";
}

pub fn record_frame_processed(mode: &'static str) {
    counter!(names::FRAMES_PROCESSED_TOTAL, "mode" => mode).increment(1);
}

pub fn record_skip(reason: SkipReason) {
    counter!(names::FRAMES_SKIPPED_TOTAL, "reason" => reason.as_str()).increment(1);
}

pub fn record_ledger_events(events: &[LedgerEvent]) {
    for event in events {
        counter!(names::LEDGER_EVENTS_TOTAL, "kind" => event.kind()).increment(1);
    }
}

pub fn record_event_dropped(kind: &'static str) {
    counter!(names::LEDGER_EVENTS_DROPPED_TOTAL, "kind" => kind).increment(1);
}

pub fn record_run(pipeline: &str, duration_ms: u64) {
    histogram!(names::RUN_DURATION_SECONDS, "pipeline" => pipeline.to_string())
        .record(duration_ms as f64 / 1000.0);
}

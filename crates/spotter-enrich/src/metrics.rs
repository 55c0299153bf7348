//! Remote call metrics.

use metrics::{counter, histogram};

/// Metric name constants for consistency.
pub mod names {
    /// Remote identification calls by provider and outcome.
    pub const REMOTE_CALLS_TOTAL: &str = "spotter_remote_calls_total";

    /// Remote call latency in seconds by provider.
    pub const REMOTE_LATENCY_SECONDS: &str = "spotter_remote_latency_seconds";

    /// Items returned per successful call.
    pub const REMOTE_ITEMS: &str = "spotter_remote_items";
}

/// Record a finished remote call. `outcome` is `ok` or an error kind.
pub fn record_call(provider: &str, outcome: &str, latency_ms: f64, items: usize) {
    counter!(
        names::REMOTE_CALLS_TOTAL,
        "provider" => provider.to_string(),
        "outcome" => outcome.to_string()
    )
    .increment(1);

    histogram!(
        names::REMOTE_LATENCY_SECONDS,
        "provider" => provider.to_string()
    )
    .record(latency_ms / 1000.0);

    if outcome == "ok" {
        histogram!(names::REMOTE_ITEMS, "provider" => provider.to_string()).record(items as f64);
    }
}

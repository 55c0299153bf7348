//! Engine configuration.

use std::time::Duration;

use spotter_models::DEFAULT_FUZZY_THRESHOLD;
use spotter_vision::LocalDetectorConfig;

use crate::ledger::LedgerConfig;

/// Engine configuration.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Ledger limits and thresholds
    pub ledger: LedgerConfig,
    /// Local adapter throttle and post-processing
    pub local: LocalDetectorConfig,
    /// Fuzzy threshold used when scoring against ground truth
    pub fuzzy_threshold: f64,
    /// Buffered ledger events per live session
    pub live_event_buffer: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            ledger: LedgerConfig::default(),
            local: LocalDetectorConfig::default(),
            fuzzy_threshold: DEFAULT_FUZZY_THRESHOLD,
            live_event_buffer: 256,
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|s| s.parse().ok())
}

impl EngineConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            ledger: LedgerConfig {
                capacity: env_parse("LEDGER_CAPACITY").unwrap_or(defaults.ledger.capacity),
                refresh_window_ms: env_parse::<u64>("LEDGER_REFRESH_WINDOW_SECS")
                    .map(|secs| secs * 1000)
                    .unwrap_or(defaults.ledger.refresh_window_ms),
                handoff_iou: env_parse("LEDGER_HANDOFF_IOU").unwrap_or(defaults.ledger.handoff_iou),
            },
            local: LocalDetectorConfig {
                interval: env_parse("LOCAL_INTERVAL_MS")
                    .map(Duration::from_millis)
                    .unwrap_or(defaults.local.interval),
                confidence_threshold: env_parse("LOCAL_CONFIDENCE")
                    .unwrap_or(defaults.local.confidence_threshold),
                max_candidates: env_parse("LOCAL_MAX_CANDIDATES")
                    .unwrap_or(defaults.local.max_candidates),
                ..defaults.local
            },
            fuzzy_threshold: env_parse("EVAL_FUZZY_THRESHOLD").unwrap_or(defaults.fuzzy_threshold),
            live_event_buffer: env_parse("LIVE_EVENT_BUFFER").unwrap_or(defaults.live_event_buffer),
        }
    }
}

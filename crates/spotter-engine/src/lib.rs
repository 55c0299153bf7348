//! Detection engine for Spotter.
//!
//! Combines a fast on-device detector with a remote vision-language enricher
//! and keeps a deduplicated ledger of what has been found.
//!
//! - [`engine`]: the [`DetectionEngine`] facade (live sessions, evaluation runs)
//! - [`ledger`]: per-item state machine, dedup and eviction
//! - [`runner`]: replays recorded frames under one pipeline configuration
//! - [`scoring`]: recall, precision and name quality against ground truth

pub mod config;
pub mod engine;
pub mod error;
pub mod ledger;
pub mod live;
pub mod logging;
pub mod metrics;
pub mod progress;
pub mod runner;
pub mod scoring;

pub use spotter_enrich::CancelToken;
pub use config::EngineConfig;
pub use engine::{crop_thumbnail, DetectionEngine};
pub use error::{EngineError, EngineResult};
pub use ledger::{spawn_ledger, DetectionLedger, LedgerConfig, LedgerEvent, LedgerHandle};
pub use live::{LiveEvents, LiveSession};
pub use logging::RunLogger;
pub use progress::{ProgressSender, RunProgress};
pub use runner::{subsample_evenly, PipelineRunner};
pub use scoring::score_run;

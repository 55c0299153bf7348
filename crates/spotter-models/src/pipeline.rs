//! Pipeline configuration definitions.
//!
//! A pipeline configuration is the combination of active adapters, sampling
//! cadence and remote submission policy used for one run. Named presets cover
//! the strategies compared during evaluation:
//!
//! | Preset | Local | Remote | Policy |
//! |--------|-------|--------|--------|
//! | `local_only` | yes | - | - |
//! | `remote_sequential` | - | yes | sequential with context |
//! | `remote_concurrent` | - | yes | bounded concurrent |
//! | `remote_batch` | - | yes | single batch |
//! | `hybrid_sequential` | yes | yes | sequential with context |
//! | `hybrid_concurrent` | yes | yes | bounded concurrent |
//! | `hybrid_batch` | yes | yes | single batch |

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Default number of concurrent remote calls for bounded-concurrent runs.
pub const DEFAULT_MAX_IN_FLIGHT: usize = 2;

/// Default number of images packed into a single-batch request.
pub const DEFAULT_BATCH_IMAGES: usize = 16;

/// Default spacing between sampled frames.
pub const DEFAULT_SAMPLE_INTERVAL_MS: u64 = 1_000;

/// Which adapters take part in a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum AdapterSet {
    LocalOnly,
    RemoteOnly,
    Hybrid,
}

impl AdapterSet {
    pub fn uses_local(&self) -> bool {
        matches!(self, AdapterSet::LocalOnly | AdapterSet::Hybrid)
    }

    pub fn uses_remote(&self) -> bool {
        matches!(self, AdapterSet::RemoteOnly | AdapterSet::Hybrid)
    }
}

/// How remote calls are submitted during a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SubmissionPolicy {
    /// One call at a time; each call carries the items found so far.
    SequentialWithContext,
    /// Up to `max_in_flight` calls at once, no cross-call context.
    BoundedConcurrent { max_in_flight: usize },
    /// All sampled frames in one request (up to `max_images`).
    SingleBatch { max_images: usize },
}

impl SubmissionPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubmissionPolicy::SequentialWithContext => "sequential_with_context",
            SubmissionPolicy::BoundedConcurrent { .. } => "bounded_concurrent",
            SubmissionPolicy::SingleBatch { .. } => "single_batch",
        }
    }
}

impl Default for SubmissionPolicy {
    fn default() -> Self {
        SubmissionPolicy::SequentialWithContext
    }
}

/// Full pipeline configuration for one run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct PipelineConfig {
    /// Active adapters
    pub adapters: AdapterSet,
    /// Minimum spacing between sampled frames (ms of frame time)
    pub sample_interval_ms: u64,
    /// Remote submission policy (ignored for local-only runs)
    pub policy: SubmissionPolicy,
}

impl PipelineConfig {
    pub fn new(adapters: AdapterSet, policy: SubmissionPolicy) -> Self {
        Self {
            adapters,
            sample_interval_ms: DEFAULT_SAMPLE_INTERVAL_MS,
            policy,
        }
    }

    pub fn with_sample_interval_ms(mut self, sample_interval_ms: u64) -> Self {
        self.sample_interval_ms = sample_interval_ms;
        self
    }

    /// Short label for logs and reports, e.g. `hybrid/bounded_concurrent`.
    pub fn label(&self) -> String {
        let adapters = match self.adapters {
            AdapterSet::LocalOnly => return "local_only".to_string(),
            AdapterSet::RemoteOnly => "remote",
            AdapterSet::Hybrid => "hybrid",
        };
        format!("{}/{}", adapters, self.policy.as_str())
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        PipelinePreset::default().config()
    }
}

/// Named pipeline strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum PipelinePreset {
    LocalOnly,
    RemoteSequential,
    RemoteConcurrent,
    RemoteBatch,
    #[default]
    HybridSequential,
    HybridConcurrent,
    HybridBatch,
}

impl PipelinePreset {
    /// All available presets.
    pub const ALL: &'static [PipelinePreset] = &[
        PipelinePreset::LocalOnly,
        PipelinePreset::RemoteSequential,
        PipelinePreset::RemoteConcurrent,
        PipelinePreset::RemoteBatch,
        PipelinePreset::HybridSequential,
        PipelinePreset::HybridConcurrent,
        PipelinePreset::HybridBatch,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PipelinePreset::LocalOnly => "local_only",
            PipelinePreset::RemoteSequential => "remote_sequential",
            PipelinePreset::RemoteConcurrent => "remote_concurrent",
            PipelinePreset::RemoteBatch => "remote_batch",
            PipelinePreset::HybridSequential => "hybrid_sequential",
            PipelinePreset::HybridConcurrent => "hybrid_concurrent",
            PipelinePreset::HybridBatch => "hybrid_batch",
        }
    }

    /// Human-readable description.
    pub fn description(&self) -> &'static str {
        match self {
            PipelinePreset::LocalOnly => "On-device detector only (fastest, generic names)",
            PipelinePreset::RemoteSequential => "Remote calls one at a time with found-items context",
            PipelinePreset::RemoteConcurrent => "Parallel remote calls, post-hoc dedup only",
            PipelinePreset::RemoteBatch => "All sampled frames in one remote request",
            PipelinePreset::HybridSequential => "Local bootstrap + sequential remote enrichment",
            PipelinePreset::HybridConcurrent => "Local bootstrap + parallel remote enrichment",
            PipelinePreset::HybridBatch => "Local bootstrap + one batched remote request",
        }
    }

    /// Expand into a concrete configuration.
    pub fn config(&self) -> PipelineConfig {
        let concurrent = SubmissionPolicy::BoundedConcurrent {
            max_in_flight: DEFAULT_MAX_IN_FLIGHT,
        };
        let batch = SubmissionPolicy::SingleBatch {
            max_images: DEFAULT_BATCH_IMAGES,
        };

        match self {
            PipelinePreset::LocalOnly => {
                PipelineConfig::new(AdapterSet::LocalOnly, SubmissionPolicy::SequentialWithContext)
            }
            PipelinePreset::RemoteSequential => {
                PipelineConfig::new(AdapterSet::RemoteOnly, SubmissionPolicy::SequentialWithContext)
            }
            PipelinePreset::RemoteConcurrent => PipelineConfig::new(AdapterSet::RemoteOnly, concurrent),
            PipelinePreset::RemoteBatch => PipelineConfig::new(AdapterSet::RemoteOnly, batch),
            PipelinePreset::HybridSequential => {
                PipelineConfig::new(AdapterSet::Hybrid, SubmissionPolicy::SequentialWithContext)
            }
            PipelinePreset::HybridConcurrent => PipelineConfig::new(AdapterSet::Hybrid, concurrent),
            PipelinePreset::HybridBatch => PipelineConfig::new(AdapterSet::Hybrid, batch),
        }
    }
}

impl fmt::Display for PipelinePreset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for PipelinePreset {
    type Err = PipelinePresetParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "local_only" | "local" => Ok(PipelinePreset::LocalOnly),
            "remote_sequential" | "remote" => Ok(PipelinePreset::RemoteSequential),
            "remote_concurrent" => Ok(PipelinePreset::RemoteConcurrent),
            "remote_batch" => Ok(PipelinePreset::RemoteBatch),
            "hybrid_sequential" | "hybrid" => Ok(PipelinePreset::HybridSequential),
            "hybrid_concurrent" => Ok(PipelinePreset::HybridConcurrent),
            "hybrid_batch" => Ok(PipelinePreset::HybridBatch),
            _ => Err(PipelinePresetParseError(s.to_string())),
        }
    }
}

#[derive(Debug, Error)]
#[error("Unknown pipeline preset: {0}")]
pub struct PipelinePresetParseError(String);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_preset_parse() {
        assert_eq!("local".parse::<PipelinePreset>().unwrap(), PipelinePreset::LocalOnly);
        assert_eq!(
            "hybrid-concurrent".parse::<PipelinePreset>().unwrap(),
            PipelinePreset::HybridConcurrent
        );
        assert_eq!(
            "REMOTE_BATCH".parse::<PipelinePreset>().unwrap(),
            PipelinePreset::RemoteBatch
        );
        assert!("teleport".parse::<PipelinePreset>().is_err());
    }

    #[test]
    fn test_preset_round_trip_names() {
        for preset in PipelinePreset::ALL {
            assert_eq!(preset.as_str().parse::<PipelinePreset>().unwrap(), *preset);
        }
    }

    #[test]
    fn test_preset_adapters() {
        assert!(!PipelinePreset::LocalOnly.config().adapters.uses_remote());
        assert!(!PipelinePreset::RemoteBatch.config().adapters.uses_local());
        let hybrid = PipelinePreset::HybridConcurrent.config();
        assert!(hybrid.adapters.uses_local() && hybrid.adapters.uses_remote());
        assert_eq!(
            hybrid.policy,
            SubmissionPolicy::BoundedConcurrent {
                max_in_flight: DEFAULT_MAX_IN_FLIGHT
            }
        );
    }

    #[test]
    fn test_config_label() {
        assert_eq!(PipelinePreset::LocalOnly.config().label(), "local_only");
        assert_eq!(
            PipelinePreset::HybridBatch.config().label(),
            "hybrid/single_batch"
        );
    }

    #[test]
    fn test_policy_serde_tagged() {
        let json = serde_json::to_value(SubmissionPolicy::BoundedConcurrent { max_in_flight: 3 }).unwrap();
        assert_eq!(json["kind"], "bounded_concurrent");
        assert_eq!(json["max_in_flight"], 3);
    }
}

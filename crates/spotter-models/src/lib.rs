//! Shared data models for Spotter.
//!
//! This crate provides Serde-serializable types for:
//! - Normalized bounding-box geometry
//! - Name normalization and tiered matching
//! - Detected objects, local candidates and remote enrichments
//! - Pipeline configurations and presets
//! - Run results, scores and evaluation sessions

pub mod detection;
pub mod geometry;
pub mod ids;
pub mod matching;
pub mod pipeline;
pub mod run;

// Re-export common types
pub use detection::{CandidateObject, DetectedObject, EnrichedObject, Provenance, TrackState};
pub use geometry::{intersection_over_union, BoundingBox};
pub use ids::{ItemId, RunId, SessionId};
pub use matching::{
    match_names, match_normalized, name_quality, normalize_name, MatchMode, MatchType, NameMatch,
    DEFAULT_FUZZY_THRESHOLD,
};
pub use pipeline::{AdapterSet, PipelineConfig, PipelinePreset, SubmissionPolicy};
pub use run::{
    EvaluationSession, GroundTruthItem, MatchDetail, PipelineRunResult, RunStats, ScoreSummary,
    SkipCounts, SkipReason,
};

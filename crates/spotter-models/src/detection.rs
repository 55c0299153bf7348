//! Detection result models shared by the live ledger and the evaluation runner.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::geometry::BoundingBox;
use crate::ids::ItemId;

/// Which adapter(s) produced the current state of an item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Provenance {
    /// Local on-device detector only.
    Local,
    /// Remote vision-language service only.
    Remote,
    /// Bootstrapped locally, then enriched remotely.
    Merged,
}

impl Provenance {
    pub fn as_str(&self) -> &'static str {
        match self {
            Provenance::Local => "local",
            Provenance::Remote => "remote",
            Provenance::Merged => "merged",
        }
    }
}

impl fmt::Display for Provenance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Lifecycle state of a tracked item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum TrackState {
    /// Local-only, generic class name.
    #[default]
    Bootstrapped,
    /// Remote name/box applied.
    Enriched,
    /// Handed off to inventory; read-only.
    Saved,
}

impl TrackState {
    pub fn as_str(&self) -> &'static str {
        match self {
            TrackState::Bootstrapped => "bootstrapped",
            TrackState::Enriched => "enriched",
            TrackState::Saved => "saved",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, TrackState::Saved)
    }

    /// Eviction priority when the ledger is full (lower goes first).
    pub fn eviction_rank(&self) -> u8 {
        match self {
            TrackState::Bootstrapped => 0,
            TrackState::Enriched => 1,
            TrackState::Saved => 2,
        }
    }
}

/// A detected, tracked object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct DetectedObject {
    /// Stable identity assigned at first detection
    pub id: ItemId,

    /// Display name (free text)
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub brand: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,

    /// Confidence in [0, 1]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bbox: Option<BoundingBox>,

    /// Index of the frame that last updated this item
    pub frame_index: u64,

    /// Timestamp (ms) of the frame that last updated this item
    pub timestamp_ms: u64,

    /// OCR text tokens read off the object
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ocr_text: Vec<String>,

    pub provenance: Provenance,

    #[serde(default)]
    pub state: TrackState,
}

impl DetectedObject {
    /// Confidence used for ordering; missing confidence sorts last.
    pub fn ranking_confidence(&self) -> f64 {
        self.confidence.unwrap_or(0.0)
    }
}

/// Coarse candidate produced by the local detector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct CandidateObject {
    /// Class index in the detector's closed vocabulary
    pub class_id: usize,
    /// Class label
    pub label: String,
    /// Detection confidence [0, 1]
    pub confidence: f64,
    pub bbox: BoundingBox,
}

/// Specific item reported by the remote enricher.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, JsonSchema)]
pub struct EnrichedObject {
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bbox: Option<BoundingBox>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub brand: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ocr_text: Vec<String>,
}

impl EnrichedObject {
    /// Bare name with no box or fields (plain-text fallback output).
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_bbox(mut self, bbox: BoundingBox) -> Self {
        self.bbox = Some(bbox);
        self
    }
}

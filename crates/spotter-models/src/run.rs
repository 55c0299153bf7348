//! Evaluation session, run result and score models.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::detection::DetectedObject;
use crate::ids::{ItemId, RunId, SessionId};
use crate::matching::MatchType;
use crate::pipeline::PipelineConfig;

/// Human-entered reference item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct GroundTruthItem {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
}

impl GroundTruthItem {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            category: None,
        }
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }
}

/// Why a frame produced no detections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    AdapterTimeout,
    AdapterHttpError,
    AdapterParseFailure,
    AdapterTransport,
    LocalFailure,
}

impl SkipReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            SkipReason::AdapterTimeout => "adapter_timeout",
            SkipReason::AdapterHttpError => "adapter_http_error",
            SkipReason::AdapterParseFailure => "adapter_parse_failure",
            SkipReason::AdapterTransport => "adapter_transport",
            SkipReason::LocalFailure => "local_failure",
        }
    }
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Per-reason skipped-frame counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
pub struct SkipCounts {
    pub timeout: u32,
    pub http_error: u32,
    pub parse_failure: u32,
    pub transport: u32,
    pub local_failure: u32,
}

impl SkipCounts {
    pub fn record(&mut self, reason: SkipReason) {
        match reason {
            SkipReason::AdapterTimeout => self.timeout += 1,
            SkipReason::AdapterHttpError => self.http_error += 1,
            SkipReason::AdapterParseFailure => self.parse_failure += 1,
            SkipReason::AdapterTransport => self.transport += 1,
            SkipReason::LocalFailure => self.local_failure += 1,
        }
    }

    pub fn total(&self) -> u32 {
        self.timeout + self.http_error + self.parse_failure + self.transport + self.local_failure
    }
}

/// Frame and call counters for a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
pub struct RunStats {
    /// Frames in the input sequence
    pub frames_total: u32,
    /// Frames selected by the sampling interval
    pub frames_sampled: u32,
    /// Sampled frames that went through the pipeline before the run ended
    pub frames_processed: u32,
    pub local_calls: u32,
    pub remote_calls: u32,
    pub skipped: SkipCounts,
    /// Run ended early on cancellation
    #[serde(default)]
    pub cancelled: bool,
}

/// Match detail for one ground-truth item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct MatchDetail {
    pub ground_truth: String,
    pub match_type: MatchType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub matched_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub matched_id: Option<ItemId>,
    pub similarity: f64,
    /// Name quality on the 0-5 scale
    pub name_quality: f64,
}

/// Scores of a run against ground truth. Derived and recomputable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ScoreSummary {
    pub recall: f64,
    pub precision: f64,
    pub matched_count: usize,
    pub ground_truth_count: usize,
    pub detected_count: usize,
    /// Average name quality (0-5) over ground-truth items
    pub avg_name_quality: f64,
    pub details: Vec<MatchDetail>,
}

/// Result of running one pipeline configuration over a session's frames.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct PipelineRunResult {
    pub id: RunId,
    pub config: PipelineConfig,
    /// Detected objects in ledger creation order
    pub objects: Vec<DetectedObject>,
    pub stats: RunStats,
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<ScoreSummary>,
}

impl PipelineRunResult {
    /// Attach a score, consuming the result (results are frozen once built).
    pub fn with_score(mut self, score: ScoreSummary) -> Self {
        self.score = Some(score);
        self
    }

    pub fn skipped_frames(&self) -> u32 {
        self.stats.skipped.total()
    }
}

/// An evaluation session: one ground-truth list and the runs scored against it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct EvaluationSession {
    pub id: SessionId,
    pub label: String,
    pub created_at: DateTime<Utc>,
    pub ground_truth: Vec<GroundTruthItem>,
    #[serde(default)]
    pub runs: Vec<PipelineRunResult>,
}

impl EvaluationSession {
    pub fn new(label: impl Into<String>, ground_truth: Vec<GroundTruthItem>) -> Self {
        Self {
            id: SessionId::new(),
            label: label.into(),
            created_at: Utc::now(),
            ground_truth,
            runs: Vec::new(),
        }
    }

    pub fn add_run(&mut self, run: PipelineRunResult) {
        self.runs.push(run);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_skip_counts() {
        let mut counts = SkipCounts::default();
        counts.record(SkipReason::AdapterTimeout);
        counts.record(SkipReason::AdapterParseFailure);
        counts.record(SkipReason::AdapterParseFailure);
        assert_eq!(counts.timeout, 1);
        assert_eq!(counts.parse_failure, 2);
        assert_eq!(counts.total(), 3);
    }

    #[test]
    fn test_ground_truth_parse_minimal() {
        let items: Vec<GroundTruthItem> =
            serde_json::from_str(r#"[{"name": "Lamp"}, {"name": "Sofa", "category": "Furniture"}]"#)
                .unwrap();
        assert_eq!(items[0], GroundTruthItem::new("Lamp"));
        assert_eq!(items[1].category.as_deref(), Some("Furniture"));
    }

    #[test]
    fn test_session_collects_runs() {
        let mut session = EvaluationSession::new("kitchen", vec![GroundTruthItem::new("kettle")]);
        assert!(session.runs.is_empty());
        session.add_run(PipelineRunResult {
            id: RunId::new(),
            config: PipelineConfig::default(),
            objects: Vec::new(),
            stats: RunStats::default(),
            started_at: Utc::now(),
            duration_ms: 0,
            score: None,
        });
        assert_eq!(session.runs.len(), 1);
    }
}

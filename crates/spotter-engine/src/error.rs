//! Engine error types.

use spotter_enrich::EnrichError;
use spotter_models::PipelineRunResult;
use spotter_vision::VisionError;
use thiserror::Error;

pub type EngineResult<T> = Result<T, EngineError>;

/// Errors surfaced to engine callers. Adapter failures during a run are
/// counted as skipped frames and never show up here.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The run was cancelled; `partial` holds everything applied before it
    /// stopped, including calls that were already in flight.
    #[error(
        "Run cancelled after {} of {} sampled frames",
        .partial.stats.frames_processed,
        .partial.stats.frames_sampled
    )]
    RunCancelled { partial: Box<PipelineRunResult> },

    #[error("Input not found: {0}")]
    InputNotFound(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Ledger channel closed: {0}")]
    ChannelClosed(String),

    #[error("Vision error: {0}")]
    Vision(VisionError),

    #[error("Enrichment error: {0}")]
    Enrich(#[from] EnrichError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl EngineError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn input_not_found(msg: impl Into<String>) -> Self {
        Self::InputNotFound(msg.into())
    }

    pub fn channel_closed(msg: impl Into<String>) -> Self {
        Self::ChannelClosed(msg.into())
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, EngineError::RunCancelled { .. })
    }

    /// Partial result of a cancelled run.
    pub fn into_partial(self) -> Option<PipelineRunResult> {
        match self {
            EngineError::RunCancelled { partial } => Some(*partial),
            _ => None,
        }
    }
}

impl From<VisionError> for EngineError {
    fn from(err: VisionError) -> Self {
        match err {
            VisionError::InputNotFound(path) | VisionError::EmptyInput(path) => {
                EngineError::InputNotFound(path.display().to_string())
            }
            other => EngineError::Vision(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_missing_input_maps_to_input_not_found() {
        let err: EngineError = VisionError::InputNotFound(PathBuf::from("/tmp/none")).into();
        assert!(matches!(err, EngineError::InputNotFound(_)));

        let err: EngineError = VisionError::EmptyInput(PathBuf::from("/tmp/empty")).into();
        assert!(matches!(err, EngineError::InputNotFound(_)));

        let err: EngineError = VisionError::detection_failed("boom").into();
        assert!(matches!(err, EngineError::Vision(_)));
    }
}

//! Structured run logging.
//!
//! Keeps run lifecycle events consistent: every line carries the run id and
//! pipeline label, and [`RunLogger::create_span`] scopes adapter logs to the run.

use spotter_models::{PipelineRunResult, RunId, SkipReason};
use tracing::{debug, info, warn, Span};

/// Run logger for structured lifecycle logging.
#[derive(Debug, Clone)]
pub struct RunLogger {
    run_id: String,
    pipeline: String,
}

impl RunLogger {
    pub fn new(run_id: &RunId, pipeline: &str) -> Self {
        Self {
            run_id: run_id.to_string(),
            pipeline: pipeline.to_string(),
        }
    }

    pub fn log_start(&self, frames_total: usize, frames_sampled: usize) {
        info!(
            run_id = %self.run_id,
            pipeline = %self.pipeline,
            frames_total,
            frames_sampled,
            "Run started"
        );
    }

    pub fn log_progress(&self, processed: u32, sampled: u32) {
        debug!(
            run_id = %self.run_id,
            pipeline = %self.pipeline,
            processed,
            sampled,
            "Run progress"
        );
    }

    /// A frame produced nothing because an adapter failed.
    pub fn log_skip(&self, frame_index: u64, reason: SkipReason, message: &str) {
        warn!(
            run_id = %self.run_id,
            pipeline = %self.pipeline,
            frame_index,
            reason = reason.as_str(),
            "Frame skipped: {}", message
        );
    }

    pub fn log_cancelled(&self, processed: u32, sampled: u32) {
        warn!(
            run_id = %self.run_id,
            pipeline = %self.pipeline,
            processed,
            sampled,
            "Run cancelled"
        );
    }

    pub fn log_completion(&self, result: &PipelineRunResult) {
        info!(
            run_id = %self.run_id,
            pipeline = %self.pipeline,
            objects = result.objects.len(),
            local_calls = result.stats.local_calls,
            remote_calls = result.stats.remote_calls,
            skipped = result.skipped_frames(),
            duration_ms = result.duration_ms,
            "Run completed"
        );
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn pipeline(&self) -> &str {
        &self.pipeline
    }

    /// Tracing span for this run.
    pub fn create_span(&self) -> Span {
        tracing::info_span!(
            "run",
            run_id = %self.run_id,
            pipeline = %self.pipeline
        )
    }
}

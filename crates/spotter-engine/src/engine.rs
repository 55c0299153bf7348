//! Detection engine facade.
//!
//! Owns the configured adapters and hands out live sessions and evaluation
//! runs. Each session or run gets its own ledger.

use std::sync::Arc;

use futures::Stream;
use image::DynamicImage;
use spotter_enrich::{CancelToken, GeminiEnricher, RemoteEnricher};
use spotter_models::{BoundingBox, GroundTruthItem, PipelineConfig, PipelineRunResult};
use spotter_vision::{Frame, FrameSequence, LocalDetector, LocalDetectorAdapter};
use tracing::{info, warn};

use crate::config::EngineConfig;
use crate::error::{EngineError, EngineResult};
use crate::live::LiveSession;
use crate::progress::ProgressSender;
use crate::runner::PipelineRunner;
use crate::scoring::score_run;

/// Entry point for live detection and offline evaluation.
#[derive(Clone)]
pub struct DetectionEngine {
    config: EngineConfig,
    local: Option<LocalDetectorAdapter>,
    remote: Option<Arc<dyn RemoteEnricher>>,
}

impl DetectionEngine {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            local: None,
            remote: None,
        }
    }

    /// Build from environment variables. Adapters whose configuration is
    /// missing are left out with a warning.
    pub fn from_env() -> Self {
        let mut engine = Self::new(EngineConfig::from_env());

        match GeminiEnricher::from_env() {
            Ok(enricher) => engine = engine.with_remote(Arc::new(enricher)),
            Err(e) => warn!("Remote enricher disabled: {}", e),
        }

        #[cfg(feature = "onnx")]
        {
            let yolo = spotter_vision::YoloConfig::from_env();
            engine = engine.with_yolo(yolo);
        }

        engine
    }

    /// Load a YOLO backend; left out with a warning when it cannot load.
    #[cfg(feature = "onnx")]
    pub fn with_yolo(self, yolo: spotter_vision::YoloConfig) -> Self {
        match spotter_vision::YoloDetector::new(yolo) {
            Ok(detector) => self.with_local_detector(Arc::new(detector)),
            Err(e) => {
                warn!("Local detector disabled: {}", e);
                self
            }
        }
    }

    pub fn with_local_detector(mut self, detector: Arc<dyn LocalDetector>) -> Self {
        info!(backend = detector.name(), "Local detector configured");
        self.local = Some(LocalDetectorAdapter::new(detector, self.config.local.clone()));
        self
    }

    pub fn with_remote(mut self, remote: Arc<dyn RemoteEnricher>) -> Self {
        info!(provider = remote.name(), "Remote enricher configured");
        self.remote = Some(remote);
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn has_local(&self) -> bool {
        self.local.is_some()
    }

    pub fn has_remote(&self) -> bool {
        self.remote.is_some()
    }

    /// Start a live session over `frames`. Must be called inside a Tokio runtime.
    pub fn start_live<S>(&self, frames: S, config: PipelineConfig) -> EngineResult<LiveSession>
    where
        S: Stream<Item = Frame> + Send + 'static,
    {
        self.check_adapters(&config)?;
        Ok(LiveSession::start(
            frames,
            config,
            self.config.ledger,
            self.config.live_event_buffer,
            self.local.clone(),
            self.remote.clone(),
        ))
    }

    /// Run `config` over recorded frames and score it against `ground_truth`.
    pub async fn run_evaluation(
        &self,
        frames: &FrameSequence,
        ground_truth: &[GroundTruthItem],
        config: PipelineConfig,
        cancel: &CancelToken,
    ) -> EngineResult<PipelineRunResult> {
        self.run_evaluation_with_progress(frames, ground_truth, config, cancel, None)
            .await
    }

    /// [`run_evaluation`](Self::run_evaluation) with progress updates. A
    /// cancelled run's partial result is scored as well.
    pub async fn run_evaluation_with_progress(
        &self,
        frames: &FrameSequence,
        ground_truth: &[GroundTruthItem],
        config: PipelineConfig,
        cancel: &CancelToken,
        progress: Option<&ProgressSender>,
    ) -> EngineResult<PipelineRunResult> {
        let fuzzy_threshold = self.config.fuzzy_threshold;
        let score = |run: PipelineRunResult| {
            let summary = score_run(&run.objects, ground_truth, fuzzy_threshold);
            run.with_score(summary)
        };

        match self.runner().run(frames, config, cancel, progress).await {
            Ok(run) => Ok(score(run)),
            Err(EngineError::RunCancelled { partial }) => Err(EngineError::RunCancelled {
                partial: Box::new(score(*partial)),
            }),
            Err(e) => Err(e),
        }
    }

    fn runner(&self) -> PipelineRunner {
        let mut runner = PipelineRunner::new(self.config.ledger);
        if let Some(local) = &self.local {
            runner = runner.with_local(local.clone());
        }
        if let Some(remote) = &self.remote {
            runner = runner.with_remote(Arc::clone(remote));
        }
        runner
    }

    fn check_adapters(&self, config: &PipelineConfig) -> EngineResult<()> {
        if config.adapters.uses_local() && self.local.is_none() {
            return Err(EngineError::config(format!(
                "pipeline {} needs a local detector",
                config.label()
            )));
        }
        if config.adapters.uses_remote() && self.remote.is_none() {
            return Err(EngineError::config(format!(
                "pipeline {} needs a remote enricher",
                config.label()
            )));
        }
        Ok(())
    }
}

/// Padded crop of `bbox` from a frame, for review thumbnails.
pub fn crop_thumbnail(frame: &Frame, bbox: &BoundingBox, padding: f64) -> DynamicImage {
    spotter_vision::crop_thumbnail(&frame.image, bbox, padding)
}

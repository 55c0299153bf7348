//! Pipeline runner: replays a recorded frame sequence through one pipeline
//! configuration and collects the resulting ledger.
//!
//! The runner's collection loop is the only owner of the run's ledger.
//! Concurrent remote calls report back over a channel and their results are
//! merged in completion order; the ledger's timestamp guard keeps the newest
//! frame's data regardless of arrival order.

mod sampling;

pub use sampling::subsample_evenly;

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use spotter_enrich::{CancelToken, EnrichError, EnrichRequest, EnrichResult, RemoteEnricher};
use spotter_models::{
    AdapterSet, CandidateObject, EnrichedObject, PipelineConfig, PipelineRunResult, RunId,
    RunStats, SkipReason, SubmissionPolicy,
};
use spotter_vision::{Frame, FrameSequence, LocalDetectorAdapter, VisionResult};
use tokio::sync::{mpsc, Semaphore};
use tracing::{debug, Instrument};

use crate::error::{EngineError, EngineResult};
use crate::ledger::{DetectionLedger, LedgerConfig};
use crate::logging::RunLogger;
use crate::metrics;
use crate::progress::ProgressSender;

/// Completed remote call from a spawned task.
struct RemoteOutcome {
    frame_index: u64,
    timestamp_ms: u64,
    result: EnrichResult<Vec<EnrichedObject>>,
}

/// Per-run mutable state, owned by the collection loop.
struct RunState<'a> {
    ledger: DetectionLedger,
    stats: RunStats,
    logger: RunLogger,
    progress: Option<&'a ProgressSender>,
    stopped_early: bool,
}

impl<'a> RunState<'a> {
    fn apply_local(&mut self, frame: &Frame, result: VisionResult<Vec<CandidateObject>>) {
        self.stats.local_calls += 1;
        match result {
            Ok(candidates) => {
                self.ledger
                    .apply_local(frame.index, frame.timestamp_ms, &candidates);
            }
            Err(e) => self.skip(frame.index, SkipReason::LocalFailure, &e.to_string()),
        }
    }

    /// Apply a finished remote call. Returns `false` when the adapter gave up
    /// because the run was cancelled; that frame is neither processed nor
    /// skipped.
    fn apply_remote(&mut self, outcome: RemoteOutcome) -> bool {
        match outcome.result {
            Ok(items) => {
                let events = self
                    .ledger
                    .apply_remote(outcome.frame_index, outcome.timestamp_ms, &items);
                debug!(
                    frame_index = outcome.frame_index,
                    items = items.len(),
                    events = events.len(),
                    "Remote result applied"
                );
            }
            Err(EnrichError::Cancelled) => {
                debug!(frame_index = outcome.frame_index, "Remote call abandoned on cancellation");
                self.stopped_early = true;
                return false;
            }
            Err(e) => self.skip(outcome.frame_index, e.skip_reason(), &e.to_string()),
        }
        true
    }

    fn skip(&mut self, frame_index: u64, reason: SkipReason, message: &str) {
        self.stats.skipped.record(reason);
        metrics::record_skip(reason);
        self.logger.log_skip(frame_index, reason, message);
    }

    fn frame_done(&mut self) {
        self.stats.frames_processed += 1;
        metrics::record_frame_processed("replay");

        let processed = self.stats.frames_processed;
        let sampled = self.stats.frames_sampled.max(1);
        self.logger.log_progress(processed, sampled);
        if let Some(progress) = self.progress {
            progress.send(
                processed as f64 / sampled as f64,
                format!("{}: frame {}/{}", self.logger.pipeline(), processed, sampled),
            );
        }
    }
}

/// Runs pipeline configurations over recorded frames.
#[derive(Clone)]
pub struct PipelineRunner {
    local: Option<LocalDetectorAdapter>,
    remote: Option<Arc<dyn RemoteEnricher>>,
    ledger_config: LedgerConfig,
}

impl PipelineRunner {
    pub fn new(ledger_config: LedgerConfig) -> Self {
        Self {
            local: None,
            remote: None,
            ledger_config,
        }
    }

    pub fn with_local(mut self, local: LocalDetectorAdapter) -> Self {
        self.local = Some(local);
        self
    }

    pub fn with_remote(mut self, remote: Arc<dyn RemoteEnricher>) -> Self {
        self.remote = Some(remote);
        self
    }

    /// Run one configuration over `frames`.
    ///
    /// Adapter failures are counted per frame and never abort the run. On
    /// cancellation, calls already in flight are awaited and applied and the
    /// partial result is returned inside [`EngineError::RunCancelled`].
    pub async fn run(
        &self,
        frames: &FrameSequence,
        config: PipelineConfig,
        cancel: &CancelToken,
        progress: Option<&ProgressSender>,
    ) -> EngineResult<PipelineRunResult> {
        if frames.is_empty() {
            return Err(EngineError::input_not_found("frame sequence is empty"));
        }

        let local = match (config.adapters.uses_local(), &self.local) {
            (true, None) => {
                return Err(EngineError::config(format!(
                    "pipeline {} needs a local detector",
                    config.label()
                )))
            }
            (true, Some(local)) => Some(local),
            (false, _) => None,
        };
        let remote = match (config.adapters.uses_remote(), &self.remote) {
            (true, None) => {
                return Err(EngineError::config(format!(
                    "pipeline {} needs a remote enricher",
                    config.label()
                )))
            }
            (true, Some(remote)) => Some(Arc::clone(remote)),
            (false, _) => None,
        };

        let run_id = RunId::new();
        let logger = RunLogger::new(&run_id, &config.label());
        let span = logger.create_span();
        let started_at = Utc::now();
        let clock = Instant::now();

        let sampled = frames.sample(config.sample_interval_ms);
        logger.log_start(frames.len(), sampled.len());

        let mut state = RunState {
            ledger: DetectionLedger::new(self.ledger_config),
            stats: RunStats {
                frames_total: frames.len() as u32,
                frames_sampled: sampled.len() as u32,
                ..Default::default()
            },
            logger,
            progress,
            stopped_early: false,
        };

        async {
            match (remote, config.adapters, config.policy) {
                (None, _, _) | (_, AdapterSet::LocalOnly, _) => {
                    run_local_only(local, &sampled, cancel, &mut state).await
                }
                (Some(remote), _, SubmissionPolicy::SequentialWithContext) => {
                    run_sequential(local, remote, &sampled, cancel, &mut state).await
                }
                (Some(remote), _, SubmissionPolicy::BoundedConcurrent { max_in_flight }) => {
                    run_concurrent(local, remote, max_in_flight, &sampled, cancel, &mut state).await
                }
                (Some(remote), _, SubmissionPolicy::SingleBatch { max_images }) => {
                    run_batch(local, remote, max_images, &sampled, cancel, &mut state).await
                }
            }
        }
        .instrument(span)
        .await;

        let duration_ms = clock.elapsed().as_millis() as u64;
        metrics::record_run(state.logger.pipeline(), duration_ms);

        let mut stats = state.stats;
        stats.cancelled = state.stopped_early;
        let result = PipelineRunResult {
            id: run_id,
            config,
            objects: state.ledger.snapshot(),
            stats,
            started_at,
            duration_ms,
            score: None,
        };

        if state.stopped_early {
            state
                .logger
                .log_cancelled(result.stats.frames_processed, result.stats.frames_sampled);
            return Err(EngineError::RunCancelled {
                partial: Box::new(result),
            });
        }

        state.logger.log_completion(&result);
        Ok(result)
    }
}

async fn run_local_only(
    local: Option<&LocalDetectorAdapter>,
    frames: &[Frame],
    cancel: &CancelToken,
    state: &mut RunState<'_>,
) {
    for frame in frames {
        if cancel.is_cancelled() {
            state.stopped_early = true;
            return;
        }
        if let Some(local) = local {
            let result = local.detect(frame).await;
            state.apply_local(frame, result);
        }
        state.frame_done();
    }
}

async fn run_sequential(
    local: Option<&LocalDetectorAdapter>,
    remote: Arc<dyn RemoteEnricher>,
    frames: &[Frame],
    cancel: &CancelToken,
    state: &mut RunState<'_>,
) {
    for frame in frames {
        if cancel.is_cancelled() {
            state.stopped_early = true;
            return;
        }
        if let Some(local) = local {
            let result = local.detect(frame).await;
            state.apply_local(frame, result);
        }

        let request = EnrichRequest::single(frame.clone()).with_context(state.ledger.names());
        state.stats.remote_calls += 1;
        let result = remote.identify(&request, cancel).await;
        let completed = state.apply_remote(RemoteOutcome {
            frame_index: frame.index,
            timestamp_ms: frame.timestamp_ms,
            result,
        });
        if !completed {
            return;
        }
        state.frame_done();
    }
}

async fn run_concurrent(
    local: Option<&LocalDetectorAdapter>,
    remote: Arc<dyn RemoteEnricher>,
    max_in_flight: usize,
    frames: &[Frame],
    cancel: &CancelToken,
    state: &mut RunState<'_>,
) {
    let semaphore = Arc::new(Semaphore::new(max_in_flight.max(1)));
    // Sized so completed calls never wait on the collection loop.
    let (tx, mut rx) = mpsc::channel::<RemoteOutcome>(frames.len().max(1));

    for frame in frames {
        if cancel.is_cancelled() {
            state.stopped_early = true;
            break;
        }

        while let Ok(outcome) = rx.try_recv() {
            if state.apply_remote(outcome) {
                state.frame_done();
            }
        }

        let permit = tokio::select! {
            permit = Arc::clone(&semaphore).acquire_owned() => match permit {
                Ok(permit) => permit,
                Err(_) => break,
            },
            _ = cancel.cancelled() => {
                state.stopped_early = true;
                break;
            }
        };

        if let Some(local) = local {
            let result = local.detect(frame).await;
            state.apply_local(frame, result);
        }

        let remote = Arc::clone(&remote);
        let tx = tx.clone();
        let cancel = cancel.clone();
        let request = EnrichRequest::single(frame.clone());
        let (frame_index, timestamp_ms) = (frame.index, frame.timestamp_ms);
        state.stats.remote_calls += 1;

        tokio::spawn(
            async move {
                let _permit = permit;
                let result = remote.identify(&request, &cancel).await;
                let _ = tx
                    .send(RemoteOutcome {
                        frame_index,
                        timestamp_ms,
                        result,
                    })
                    .await;
            }
            .in_current_span(),
        );
    }

    // Drain in-flight calls, including after cancellation.
    drop(tx);
    while let Some(outcome) = rx.recv().await {
        if state.apply_remote(outcome) {
            state.frame_done();
        }
    }
}

/// Local pass over every frame, then one request with up to `max_images`
/// evenly spaced frames. Frames count as processed once the batch call
/// finishes, or once their local pass is done if the run stops first.
async fn run_batch(
    local: Option<&LocalDetectorAdapter>,
    remote: Arc<dyn RemoteEnricher>,
    max_images: usize,
    frames: &[Frame],
    cancel: &CancelToken,
    state: &mut RunState<'_>,
) {
    let mut detected = 0;
    if let Some(local) = local {
        for frame in frames {
            if cancel.is_cancelled() {
                break;
            }
            let result = local.detect(frame).await;
            state.apply_local(frame, result);
            detected += 1;
        }
    }

    let selected = subsample_evenly(frames, max_images);
    let Some(anchor) = selected.last() else {
        return;
    };
    let (frame_index, timestamp_ms) = (anchor.index, anchor.timestamp_ms);

    let completed = if cancel.is_cancelled() {
        state.stopped_early = true;
        false
    } else {
        debug!(images = selected.len(), frame_index, "Submitting batch request");
        let request = EnrichRequest::batch(selected);
        state.stats.remote_calls += 1;
        let result = remote.identify(&request, cancel).await;
        state.apply_remote(RemoteOutcome {
            frame_index,
            timestamp_ms,
            result,
        })
    };

    let done = if completed { frames.len() } else { detected };
    for _ in 0..done {
        state.frame_done();
    }
}

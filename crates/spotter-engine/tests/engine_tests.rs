//! Engine tests against scripted adapters.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use image::{DynamicImage, RgbImage};
use spotter_engine::{
    CancelToken, DetectionEngine, EngineConfig, EngineError, LedgerEvent, LiveEvents,
    LiveSession, ProgressSender,
};
use spotter_enrich::{parse_response, EnrichError, EnrichRequest, EnrichResult, RemoteEnricher};
use spotter_models::{
    AdapterSet, BoundingBox, CandidateObject, EnrichedObject, GroundTruthItem, PipelineConfig,
    PipelinePreset, Provenance, SubmissionPolicy, TrackState,
};
use spotter_vision::{Frame, FrameSequence, LocalDetector, VisionResult};

type Responder = Box<dyn Fn(u64) -> EnrichResult<Vec<EnrichedObject>> + Send + Sync>;

#[derive(Debug, Clone)]
struct RecordedCall {
    frame_indices: Vec<u64>,
    context: Vec<String>,
}

/// Remote enricher answering by anchor frame index, with optional per-frame delays.
struct ScriptedEnricher {
    respond: Responder,
    delays: HashMap<u64, Duration>,
    calls: Mutex<Vec<RecordedCall>>,
    cancel_on: Option<(u64, CancelToken)>,
}

impl ScriptedEnricher {
    fn new(respond: impl Fn(u64) -> EnrichResult<Vec<EnrichedObject>> + Send + Sync + 'static) -> Self {
        Self {
            respond: Box::new(respond),
            delays: HashMap::new(),
            calls: Mutex::new(Vec::new()),
            cancel_on: None,
        }
    }

    fn with_delay(mut self, frame_index: u64, delay: Duration) -> Self {
        self.delays.insert(frame_index, delay);
        self
    }

    fn cancelling_on(mut self, frame_index: u64, cancel: CancelToken) -> Self {
        self.cancel_on = Some((frame_index, cancel));
        self
    }

    fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl RemoteEnricher for ScriptedEnricher {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn identify(
        &self,
        request: &EnrichRequest,
        _cancel: &CancelToken,
    ) -> EnrichResult<Vec<EnrichedObject>> {
        let anchor = request.anchor().map(|f| f.index).unwrap_or_default();
        self.calls.lock().unwrap().push(RecordedCall {
            frame_indices: request.frames.iter().map(|f| f.index).collect(),
            context: request.context.clone(),
        });

        let delay = self.delays.get(&anchor).copied().unwrap_or(Duration::from_millis(10));
        tokio::time::sleep(delay).await;

        if let Some((index, cancel)) = &self.cancel_on {
            if *index == anchor {
                cancel.cancel();
            }
        }

        (self.respond)(anchor)
    }
}

/// Remote enricher that stalls before submission until cancelled.
struct StallingEnricher {
    calls: AtomicUsize,
}

#[async_trait]
impl RemoteEnricher for StallingEnricher {
    fn name(&self) -> &str {
        "stalling"
    }

    async fn identify(
        &self,
        _request: &EnrichRequest,
        cancel: &CancelToken,
    ) -> EnrichResult<Vec<EnrichedObject>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::select! {
            _ = tokio::time::sleep(Duration::from_secs(10)) => Ok(Vec::new()),
            _ = cancel.cancelled() => Err(EnrichError::Cancelled),
        }
    }
}

/// Local detector returning the same candidates for every frame.
struct FixedDetector {
    candidates: Vec<CandidateObject>,
    calls: AtomicUsize,
}

impl LocalDetector for FixedDetector {
    fn name(&self) -> &str {
        "fixed"
    }

    fn detect(&self, _image: &DynamicImage) -> VisionResult<Vec<CandidateObject>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.candidates.clone())
    }
}

fn frame(index: u64, timestamp_ms: u64) -> Frame {
    Frame::new(index, timestamp_ms, DynamicImage::ImageRgb8(RgbImage::new(8, 8)))
}

/// `n` frames one second apart.
fn sequence(n: u64) -> FrameSequence {
    FrameSequence::from_frames((0..n).map(|i| frame(i, i * 1000)).collect())
}

fn bottle_box() -> BoundingBox {
    BoundingBox::new(0.2, 0.3, 0.6, 0.5).unwrap()
}

fn bottle_detector() -> Arc<FixedDetector> {
    Arc::new(FixedDetector {
        candidates: vec![CandidateObject {
            class_id: 39,
            label: "bottle".to_string(),
            confidence: 0.8,
            bbox: bottle_box(),
        }],
        calls: AtomicUsize::new(0),
    })
}

/// Detector reporting three separate objects per frame.
fn tabletop_detector() -> Arc<FixedDetector> {
    let candidates = ["bottle", "cup", "laptop"]
        .iter()
        .enumerate()
        .map(|(i, label)| {
            let offset = i as f64 * 0.3;
            CandidateObject {
                class_id: i,
                label: label.to_string(),
                confidence: 0.9,
                bbox: BoundingBox::new(0.1, offset, 0.3, offset + 0.2).unwrap(),
            }
        })
        .collect();
    Arc::new(FixedDetector {
        candidates,
        calls: AtomicUsize::new(0),
    })
}

/// Wait for a live session's frame loop to finish.
async fn wait_until_stopped(session: &LiveSession) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while !session.is_stopped() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap();
}

async fn next_event(events: &mut LiveEvents) -> LedgerEvent {
    tokio::time::timeout(Duration::from_secs(2), events.next())
        .await
        .unwrap()
        .unwrap()
}

fn remote_only(policy: SubmissionPolicy) -> PipelineConfig {
    PipelineConfig::new(AdapterSet::RemoteOnly, policy).with_sample_interval_ms(0)
}

fn engine_with(remote: Arc<ScriptedEnricher>) -> DetectionEngine {
    DetectionEngine::new(EngineConfig::default()).with_remote(remote)
}

#[tokio::test]
async fn test_out_of_order_results_keep_latest_frame_data() {
    let remote = Arc::new(
        ScriptedEnricher::new(|frame| {
            let item = match frame {
                2 => EnrichedObject {
                    color: Some("red".to_string()),
                    ..EnrichedObject::named("Mug")
                },
                3 => EnrichedObject {
                    color: Some("blue".to_string()),
                    ..EnrichedObject::named("Mug")
                },
                _ => EnrichedObject::named("Lamp"),
            };
            Ok(vec![item])
        })
        .with_delay(2, Duration::from_millis(300)),
    );
    let engine = engine_with(Arc::clone(&remote));

    let config = remote_only(SubmissionPolicy::BoundedConcurrent { max_in_flight: 2 });
    let run = engine
        .run_evaluation(&sequence(5), &[], config, &CancelToken::new())
        .await
        .unwrap();

    assert_eq!(run.stats.remote_calls, 5);
    assert_eq!(run.stats.frames_processed, 5);
    assert_eq!(run.objects.len(), 2);

    let mug = run.objects.iter().find(|o| o.name == "Mug").unwrap();
    assert_eq!(mug.color.as_deref(), Some("blue"));
    assert_eq!(mug.timestamp_ms, 3000);
}

#[tokio::test]
async fn test_malformed_response_skips_frame() {
    let remote = Arc::new(ScriptedEnricher::new(|_| parse_response(r#"{"items": [ {"name": "#)));
    let engine = engine_with(remote);

    let run = engine
        .run_evaluation(
            &sequence(1),
            &[],
            remote_only(SubmissionPolicy::SequentialWithContext),
            &CancelToken::new(),
        )
        .await
        .unwrap();

    assert!(run.objects.is_empty());
    assert_eq!(run.stats.skipped.parse_failure, 1);
    assert_eq!(run.skipped_frames(), 1);
    assert_eq!(run.stats.frames_processed, 1);
}

#[tokio::test]
async fn test_adapter_errors_counted_by_reason() {
    let remote = Arc::new(ScriptedEnricher::new(|frame| match frame {
        0 => Err(EnrichError::Timeout(Duration::from_secs(10))),
        1 => Err(EnrichError::HttpStatus {
            status: 503,
            body: "unavailable".to_string(),
        }),
        _ => Ok(vec![EnrichedObject::named("Kettle")]),
    }));
    let engine = engine_with(remote);

    let run = engine
        .run_evaluation(
            &sequence(3),
            &[],
            remote_only(SubmissionPolicy::SequentialWithContext),
            &CancelToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(run.stats.skipped.timeout, 1);
    assert_eq!(run.stats.skipped.http_error, 1);
    assert_eq!(run.objects.len(), 1);
}

#[tokio::test]
async fn test_hybrid_bootstrap_is_enriched_in_place() {
    let remote = Arc::new(ScriptedEnricher::new(|_| {
        Ok(vec![EnrichedObject::named("Glass Wine Bottle").with_bbox(bottle_box())])
    }));
    let engine = DetectionEngine::new(EngineConfig::default())
        .with_local_detector(bottle_detector())
        .with_remote(remote);

    let config = PipelinePreset::HybridSequential.config();
    let run = engine
        .run_evaluation(&sequence(1), &[], config, &CancelToken::new())
        .await
        .unwrap();

    assert_eq!(run.objects.len(), 1);
    let item = &run.objects[0];
    assert_eq!(item.name, "Glass Wine Bottle");
    assert_eq!(item.state, TrackState::Enriched);
    assert_eq!(item.provenance, Provenance::Merged);
    assert_eq!(run.stats.local_calls, 1);
    assert_eq!(run.stats.remote_calls, 1);
}

#[tokio::test]
async fn test_repeated_result_within_window_is_one_item() {
    let remote = Arc::new(ScriptedEnricher::new(|_| Ok(vec![EnrichedObject::named("Toaster")])));
    let engine = engine_with(Arc::clone(&remote));

    let run = engine
        .run_evaluation(
            &sequence(3),
            &[],
            remote_only(SubmissionPolicy::SequentialWithContext),
            &CancelToken::new(),
        )
        .await
        .unwrap();
    assert_eq!(run.objects.len(), 1);

    let calls = remote.calls();
    assert!(calls[0].context.is_empty());
    assert_eq!(calls[1].context, vec!["Toaster".to_string()]);

    // Seen again long after the refresh window: a second instance.
    let far_apart = FrameSequence::from_frames(vec![frame(0, 0), frame(1, 15_000)]);
    let run = engine
        .run_evaluation(
            &far_apart,
            &[],
            remote_only(SubmissionPolicy::SequentialWithContext),
            &CancelToken::new(),
        )
        .await
        .unwrap();
    assert_eq!(run.objects.len(), 2);
}

#[tokio::test]
async fn test_single_batch_subsamples_and_stamps_last_frame() {
    let remote = Arc::new(ScriptedEnricher::new(|_| Ok(vec![EnrichedObject::named("Sofa")])));
    let engine = engine_with(Arc::clone(&remote));

    let run = engine
        .run_evaluation(
            &sequence(20),
            &[],
            remote_only(SubmissionPolicy::SingleBatch { max_images: 16 }),
            &CancelToken::new(),
        )
        .await
        .unwrap();

    let calls = remote.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].frame_indices.len(), 16);
    assert_eq!(calls[0].frame_indices.last(), Some(&19));
    assert_eq!(run.objects[0].frame_index, 19);
    assert_eq!(run.objects[0].timestamp_ms, 19_000);
    assert_eq!(run.stats.frames_processed, 20);
}

#[tokio::test]
async fn test_evaluation_scores_against_ground_truth() {
    let remote = Arc::new(ScriptedEnricher::new(|_| {
        Ok(vec![EnrichedObject::named("red chair"), EnrichedObject::named("floor lamp")])
    }));
    let engine = engine_with(remote);
    let ground_truth = vec![GroundTruthItem::new("Red Chair"), GroundTruthItem::new("Lamp")];

    let run = engine
        .run_evaluation(
            &sequence(1),
            &ground_truth,
            remote_only(SubmissionPolicy::SequentialWithContext),
            &CancelToken::new(),
        )
        .await
        .unwrap();

    let score = run.score.unwrap();
    assert_eq!(score.recall, 1.0);
    assert_eq!(score.precision, 1.0);
    assert_eq!(score.matched_count, 2);
}

#[tokio::test]
async fn test_cancellation_returns_partial_result() {
    let cancel = CancelToken::new();
    let remote = Arc::new(
        ScriptedEnricher::new(|frame| Ok(vec![EnrichedObject::named(format!("Item {}", frame))]))
            .cancelling_on(1, cancel.clone()),
    );
    let engine = engine_with(remote);
    let (progress, mut progress_rx) = ProgressSender::channel(16);

    let err = engine
        .run_evaluation_with_progress(
            &sequence(5),
            &[GroundTruthItem::new("Item 0")],
            remote_only(SubmissionPolicy::SequentialWithContext),
            &cancel,
            Some(&progress),
        )
        .await
        .unwrap_err();

    assert!(err.is_cancelled());
    let partial = err.into_partial().unwrap();
    assert!(partial.stats.cancelled);
    assert_eq!(partial.stats.frames_processed, 2);
    assert_eq!(partial.objects.len(), 2);
    assert!(partial.score.is_some());

    let first = progress_rx.recv().await.unwrap();
    assert!((first.fraction - 0.2).abs() < 1e-9);
}

#[tokio::test]
async fn test_cancelled_concurrent_run_applies_in_flight_calls() {
    let cancel = CancelToken::new();
    let remote = Arc::new(
        ScriptedEnricher::new(|frame| Ok(vec![EnrichedObject::named(format!("Item {}", frame))]))
            .with_delay(0, Duration::from_millis(200))
            .cancelling_on(1, cancel.clone()),
    );
    let engine = engine_with(remote);

    let err = engine
        .run_evaluation(
            &sequence(6),
            &[],
            remote_only(SubmissionPolicy::BoundedConcurrent { max_in_flight: 2 }),
            &cancel,
        )
        .await
        .unwrap_err();

    let partial = err.into_partial().unwrap();
    let mut names: Vec<_> = partial.objects.iter().map(|o| o.name.clone()).collect();
    names.sort();
    assert!(names.contains(&"Item 0".to_string()));
    assert!(names.contains(&"Item 1".to_string()));
    assert!(partial.stats.frames_processed < 6);
}

#[tokio::test]
async fn test_empty_sequence_is_input_not_found() {
    let remote = Arc::new(ScriptedEnricher::new(|_| Ok(Vec::new())));
    let engine = engine_with(remote);

    let err = engine
        .run_evaluation(
            &FrameSequence::from_frames(Vec::new()),
            &[],
            PipelinePreset::RemoteSequential.config(),
            &CancelToken::new(),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InputNotFound(_)));
}

#[tokio::test]
async fn test_local_only_run() {
    let detector = bottle_detector();
    let engine = DetectionEngine::new(EngineConfig::default())
        .with_local_detector(Arc::clone(&detector) as Arc<dyn LocalDetector>);

    let run = engine
        .run_evaluation(
            &sequence(4),
            &[GroundTruthItem::new("Wine Bottle")],
            PipelinePreset::LocalOnly.config(),
            &CancelToken::new(),
        )
        .await
        .unwrap();

    // Unthrottled replay: every sampled frame is detected.
    assert_eq!(detector.calls.load(Ordering::SeqCst), 4);
    assert_eq!(run.objects.len(), 1);
    assert_eq!(run.objects[0].state, TrackState::Bootstrapped);
    assert_eq!(run.score.unwrap().recall, 1.0);
}

#[tokio::test]
async fn test_live_session_streams_upgrade_event() {
    let remote = Arc::new(
        ScriptedEnricher::new(|_| {
            Ok(vec![EnrichedObject::named("Glass Wine Bottle").with_bbox(bottle_box())])
        })
        .with_delay(0, Duration::from_millis(50)),
    );
    let engine = DetectionEngine::new(EngineConfig::default())
        .with_local_detector(bottle_detector())
        .with_remote(remote);

    let frames = futures::stream::iter(vec![frame(0, 0)]);
    let mut session = engine
        .start_live(frames, PipelinePreset::HybridSequential.config())
        .unwrap();

    let inserted = next_event(session.events()).await;
    let updated = next_event(session.events()).await;

    assert!(matches!(inserted, LedgerEvent::Inserted(_)));
    assert_eq!(inserted.object().name, "bottle");
    assert!(matches!(updated, LedgerEvent::Updated(_)));
    assert_eq!(updated.object().name, "Glass Wine Bottle");
    assert_eq!(inserted.object().id, updated.object().id);

    let saved = session
        .mark_saved(updated.object().id.clone())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(saved.state, TrackState::Saved);

    let mut events = session.finish();
    let last = next_event(&mut events).await;
    assert_eq!(last.object().state, TrackState::Saved);
    let end = tokio::time::timeout(Duration::from_secs(2), events.next())
        .await
        .unwrap();
    assert!(end.is_none());
}

#[tokio::test]
async fn test_recorded_session_from_disk() {
    let dir = tempfile::tempdir().unwrap();
    for i in 0..3 {
        RgbImage::new(8, 8)
            .save(dir.path().join(format!("frame_{:03}.png", i)))
            .unwrap();
    }

    let frames = FrameSequence::load_dir(dir.path(), 1.0).unwrap();
    assert_eq!(frames.len(), 3);

    let remote = Arc::new(ScriptedEnricher::new(|_| Ok(vec![EnrichedObject::named("Desk")])));
    let engine = engine_with(Arc::clone(&remote));
    let run = engine
        .run_evaluation(
            &frames,
            &[GroundTruthItem::new("desk")],
            PipelinePreset::RemoteSequential.config(),
            &CancelToken::new(),
        )
        .await
        .unwrap();

    // One frame per second at the default sampling interval.
    assert_eq!(run.stats.frames_sampled, 3);
    assert_eq!(remote.calls().len(), 3);
    assert_eq!(run.score.unwrap().recall, 1.0);

    let missing = FrameSequence::load_dir(dir.path().join("missing"), 1.0).unwrap_err();
    let err: EngineError = missing.into();
    assert!(matches!(err, EngineError::InputNotFound(_)));
}

#[tokio::test]
async fn test_cancel_during_pending_call_returns_promptly() {
    let remote = Arc::new(StallingEnricher {
        calls: AtomicUsize::new(0),
    });
    let engine = DetectionEngine::new(EngineConfig::default())
        .with_remote(Arc::clone(&remote) as Arc<dyn RemoteEnricher>);

    let cancel = CancelToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        trigger.cancel();
    });

    let err = tokio::time::timeout(
        Duration::from_secs(2),
        engine.run_evaluation(
            &sequence(3),
            &[],
            remote_only(SubmissionPolicy::SequentialWithContext),
            &cancel,
        ),
    )
    .await
    .expect("cancelled run should not wait out the remote call")
    .unwrap_err();

    let partial = err.into_partial().unwrap();
    assert_eq!(remote.calls.load(Ordering::SeqCst), 1);
    assert_eq!(partial.stats.remote_calls, 1);
    assert_eq!(partial.stats.frames_processed, 0);
    assert_eq!(partial.stats.skipped.total(), 0);
}

#[tokio::test]
async fn test_cancelled_batch_call_returns_promptly() {
    let remote = Arc::new(StallingEnricher {
        calls: AtomicUsize::new(0),
    });
    let engine = DetectionEngine::new(EngineConfig::default())
        .with_local_detector(bottle_detector())
        .with_remote(Arc::clone(&remote) as Arc<dyn RemoteEnricher>);

    let cancel = CancelToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        trigger.cancel();
    });

    let err = tokio::time::timeout(
        Duration::from_secs(2),
        engine.run_evaluation(&sequence(4), &[], PipelinePreset::HybridBatch.config(), &cancel),
    )
    .await
    .expect("cancelled run should not wait out the batch call")
    .unwrap_err();

    let partial = err.into_partial().unwrap();
    assert_eq!(partial.stats.local_calls, 4);
    // Local work finished for every frame before the batch was abandoned.
    assert_eq!(partial.stats.frames_processed, 4);
    assert_eq!(partial.objects.len(), 1);
}

#[tokio::test]
async fn test_concurrent_progress_follows_completions() {
    let remote = Arc::new(
        ScriptedEnricher::new(|_| Ok(Vec::new())).with_delay(0, Duration::from_millis(300)),
    );
    let engine = engine_with(remote);
    let (progress, mut progress_rx) = ProgressSender::channel(16);

    let config = remote_only(SubmissionPolicy::BoundedConcurrent { max_in_flight: 2 });
    let frames = sequence(3);
    let cancel = CancelToken::new();
    let run = engine.run_evaluation_with_progress(&frames, &[], config, &cancel, Some(&progress));

    let early = async {
        tokio::time::sleep(Duration::from_millis(150)).await;
        let mut seen = Vec::new();
        while let Ok(update) = progress_rx.try_recv() {
            seen.push(update.fraction);
        }
        seen
    };

    let (run, early) = tokio::join!(run, early);
    let run = run.unwrap();

    // Frame 0 is still in flight: frames 1 and 2 are the only ones done.
    assert_eq!(early.len(), 2);
    assert!(early.iter().all(|f| *f < 1.0));

    let last = progress_rx.recv().await.unwrap();
    assert_eq!(last.fraction, 1.0);
    assert_eq!(run.stats.frames_processed, 3);
}

#[tokio::test]
async fn test_live_session_survives_unread_events() {
    let detector = tabletop_detector();
    let mut config = EngineConfig::default();
    config.live_event_buffer = 1;
    let engine = DetectionEngine::new(config)
        .with_local_detector(Arc::clone(&detector) as Arc<dyn LocalDetector>);

    let frames = futures::stream::iter(vec![frame(0, 0)]);
    let session = engine
        .start_live(frames, PipelinePreset::LocalOnly.config())
        .unwrap();

    wait_until_stopped(&session).await;
    let snapshot = tokio::time::timeout(Duration::from_secs(2), session.snapshot())
        .await
        .expect("snapshot blocked behind unread events")
        .unwrap();
    assert_eq!(snapshot.len(), 3);

    let saved = tokio::time::timeout(Duration::from_secs(2), session.mark_saved(snapshot[0].id.clone()))
        .await
        .expect("mark_saved blocked behind unread events")
        .unwrap();
    assert!(saved.is_some());
}

#[tokio::test]
async fn test_live_remote_drops_frames_while_call_in_flight() {
    let remote = Arc::new(
        ScriptedEnricher::new(|_| Ok(vec![EnrichedObject::named("Kettle")]))
            .with_delay(0, Duration::from_millis(300)),
    );
    let engine = engine_with(Arc::clone(&remote));

    // Thirty frames 100 ms apart, delivered at once.
    let frames = futures::stream::iter((0..30).map(|i| frame(i, i * 100)).collect::<Vec<_>>());
    let config = PipelineConfig::new(AdapterSet::RemoteOnly, SubmissionPolicy::SequentialWithContext)
        .with_sample_interval_ms(1000);
    let session = engine.start_live(frames, config).unwrap();

    wait_until_stopped(&session).await;
    tokio::time::sleep(Duration::from_millis(500)).await;

    let calls = remote.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].frame_indices, vec![0]);
    assert_eq!(session.snapshot().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_live_remote_submits_once_per_sample_interval() {
    let remote = Arc::new(ScriptedEnricher::new(|_| Ok(Vec::new())));
    let engine = engine_with(Arc::clone(&remote));

    // 100 ms of media time per frame, paced so each call finishes before the next frame.
    let frames = futures::stream::iter((0..30).map(|i| frame(i, i * 100)).collect::<Vec<_>>())
        .then(|f| async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            f
        });
    let config = PipelineConfig::new(AdapterSet::RemoteOnly, SubmissionPolicy::SequentialWithContext)
        .with_sample_interval_ms(1000);
    let session = engine.start_live(frames, config).unwrap();

    wait_until_stopped(&session).await;
    tokio::time::sleep(Duration::from_millis(100)).await;

    let submitted: Vec<u64> = remote.calls().iter().map(|c| c.frame_indices[0]).collect();
    assert_eq!(submitted, vec![0, 10, 20]);
}

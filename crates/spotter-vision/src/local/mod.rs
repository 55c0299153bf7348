//! Local on-device detector adapter.
//!
//! The backend runs synchronously on the blocking pool. The live path is
//! throttled to one inference per interval; frames arriving faster are dropped,
//! never queued.

mod nms;
mod vocabulary;
#[cfg(feature = "onnx")]
mod yolo;

pub use nms::{finalize_candidates, non_maximum_suppression};
pub use vocabulary::{class_label, COCO_CLASSES};
#[cfg(feature = "onnx")]
pub use yolo::{YoloConfig, YoloDetector};

use std::sync::Arc;
use std::time::Duration;

use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};
use image::DynamicImage;
use spotter_models::CandidateObject;
use tracing::{debug, trace};

use crate::error::{VisionError, VisionResult};
use crate::frame::Frame;

/// Throttle for the live detection path.
pub type InferenceLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Synchronous detector backend.
pub trait LocalDetector: Send + Sync {
    /// Backend name for logs.
    fn name(&self) -> &str;

    /// Whether the backend returns raw, overlapping proposals that need NMS.
    fn emits_raw_proposals(&self) -> bool {
        false
    }

    /// Detect candidates in a full frame image.
    fn detect(&self, image: &DynamicImage) -> VisionResult<Vec<CandidateObject>>;
}

/// Local adapter configuration.
#[derive(Debug, Clone)]
pub struct LocalDetectorConfig {
    /// Minimum spacing between live inferences
    pub interval: Duration,
    pub confidence_threshold: f64,
    /// IoU above which same-class proposals are suppressed
    pub nms_threshold: f64,
    pub max_candidates: usize,
}

impl Default for LocalDetectorConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(100),
            confidence_threshold: 0.3,
            nms_threshold: 0.45,
            max_candidates: 20,
        }
    }
}

/// Async adapter around a [`LocalDetector`] backend.
#[derive(Clone)]
pub struct LocalDetectorAdapter {
    backend: Arc<dyn LocalDetector>,
    config: LocalDetectorConfig,
    limiter: Option<Arc<InferenceLimiter>>,
}

impl LocalDetectorAdapter {
    pub fn new(backend: Arc<dyn LocalDetector>, config: LocalDetectorConfig) -> Self {
        // A zero interval disables throttling.
        let limiter = Quota::with_period(config.interval)
            .map(|quota| Arc::new(RateLimiter::direct(quota)));

        Self {
            backend,
            config,
            limiter,
        }
    }

    pub fn config(&self) -> &LocalDetectorConfig {
        &self.config
    }

    pub fn backend_name(&self) -> &str {
        self.backend.name()
    }

    /// Unthrottled detection, used when replaying recorded frames.
    pub async fn detect(&self, frame: &Frame) -> VisionResult<Vec<CandidateObject>> {
        let backend = Arc::clone(&self.backend);
        let image = Arc::clone(&frame.image);
        let config = self.config.clone();

        let candidates = tokio::task::spawn_blocking(move || {
            let raw = backend.detect(&image)?;
            let nms = backend.emits_raw_proposals().then_some(config.nms_threshold);
            Ok::<_, VisionError>(finalize_candidates(
                raw,
                config.confidence_threshold,
                nms,
                config.max_candidates,
            ))
        })
        .await
        .map_err(|e| VisionError::internal(format!("Detection task failed: {}", e)))??;

        debug!(
            backend = self.backend.name(),
            frame_index = frame.index,
            count = candidates.len(),
            "Local detection completed"
        );

        Ok(candidates)
    }

    /// Throttled detection for the live path.
    ///
    /// Returns `Ok(None)` when the call arrives before the interval has elapsed.
    pub async fn try_detect(&self, frame: &Frame) -> VisionResult<Option<Vec<CandidateObject>>> {
        if let Some(limiter) = &self.limiter {
            if limiter.check().is_err() {
                trace!(frame_index = frame.index, "Local detection throttled");
                return Ok(None);
            }
        }

        self.detect(frame).await.map(Some)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::RgbImage;
    use spotter_models::BoundingBox;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct ScriptedDetector {
        raw: bool,
        calls: AtomicUsize,
        output: Vec<CandidateObject>,
    }

    impl LocalDetector for ScriptedDetector {
        fn name(&self) -> &str {
            "scripted"
        }

        fn emits_raw_proposals(&self) -> bool {
            self.raw
        }

        fn detect(&self, _image: &DynamicImage) -> VisionResult<Vec<CandidateObject>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.output.clone())
        }
    }

    fn frame() -> Frame {
        Frame::new(0, 0, DynamicImage::ImageRgb8(RgbImage::new(4, 4)))
    }

    fn bottle(confidence: f64, x: f64) -> CandidateObject {
        CandidateObject {
            class_id: 39,
            label: "bottle".to_string(),
            confidence,
            bbox: BoundingBox::new(0.2, x, 0.6, x + 0.2).unwrap(),
        }
    }

    fn adapter(raw: bool, interval_ms: u64, output: Vec<CandidateObject>) -> (LocalDetectorAdapter, Arc<ScriptedDetector>) {
        let backend = Arc::new(ScriptedDetector {
            raw,
            calls: AtomicUsize::new(0),
            output,
        });
        let config = LocalDetectorConfig {
            interval: Duration::from_millis(interval_ms),
            ..Default::default()
        };
        (LocalDetectorAdapter::new(backend.clone(), config), backend)
    }

    #[tokio::test]
    async fn test_try_detect_drops_fast_calls() {
        let (adapter, backend) = adapter(false, 60_000, vec![bottle(0.9, 0.1)]);

        let first = adapter.try_detect(&frame()).await.unwrap();
        assert_eq!(first.map(|c| c.len()), Some(1));

        let second = adapter.try_detect(&frame()).await.unwrap();
        assert!(second.is_none());
        assert_eq!(backend.calls.load(Ordering::SeqCst), 1);

        // The unthrottled path is unaffected.
        assert_eq!(adapter.detect(&frame()).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_zero_interval_never_throttles() {
        let (adapter, backend) = adapter(false, 0, vec![]);
        for _ in 0..3 {
            assert!(adapter.try_detect(&frame()).await.unwrap().is_some());
        }
        assert_eq!(backend.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_nms_only_for_raw_backends() {
        let overlapping = vec![bottle(0.9, 0.1), bottle(0.8, 0.11), bottle(0.1, 0.5)];

        let (raw, _) = adapter(true, 0, overlapping.clone());
        let result = raw.detect(&frame()).await.unwrap();
        assert_eq!(result.len(), 1);

        let (filtered, _) = adapter(false, 0, overlapping);
        let result = filtered.detect(&frame()).await.unwrap();
        assert_eq!(result.len(), 2);
        assert!(result[0].confidence > result[1].confidence);
    }
}

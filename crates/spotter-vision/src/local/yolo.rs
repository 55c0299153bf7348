//! YOLOv8 ONNX backend.
//!
//! Output tensor layout is `[1, 84, 8400]`: 4 box values (cx, cy, w, h in
//! input pixels) followed by 80 COCO class scores for each of 8400 proposals.

use std::path::Path;
use std::sync::Mutex;

use image::{DynamicImage, GenericImageView};
use ndarray::Array;
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use ort::value::{Tensor, Value};
use spotter_models::{BoundingBox, CandidateObject};
use tracing::{debug, info};

use super::vocabulary::{class_label, COCO_CLASSES};
use super::LocalDetector;
use crate::error::{VisionError, VisionResult};

const NUM_PROPOSALS: usize = 8400;
const BOX_FEATURES: usize = 4;

/// YOLO backend configuration.
#[derive(Debug, Clone)]
pub struct YoloConfig {
    /// Path to ONNX model file
    pub model_path: String,
    /// Input image size (model expects square input)
    pub input_size: u32,
    /// Pre-filter applied before proposals leave the backend
    pub min_score: f32,
}

impl Default for YoloConfig {
    fn default() -> Self {
        Self {
            model_path: "models/yolov8n.onnx".to_string(),
            input_size: 640,
            min_score: 0.1,
        }
    }
}

impl YoloConfig {
    /// Load from environment (`YOLO_MODEL_PATH`).
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            model_path: std::env::var("YOLO_MODEL_PATH").unwrap_or(defaults.model_path),
            ..defaults
        }
    }

    pub fn with_model_path(mut self, model_path: impl Into<String>) -> Self {
        self.model_path = model_path.into();
        self
    }

    pub fn is_model_available(&self) -> bool {
        Path::new(&self.model_path).exists()
    }
}

/// Object detector running a YOLOv8 model through ONNX Runtime.
pub struct YoloDetector {
    session: Mutex<Session>,
    config: YoloConfig,
}

impl YoloDetector {
    /// Load the model. Fails when the file is missing or cannot be loaded.
    pub fn new(config: YoloConfig) -> VisionResult<Self> {
        let model_path = Path::new(&config.model_path);
        if !model_path.exists() {
            return Err(VisionError::model_not_found(&config.model_path));
        }

        let session = Mutex::new(create_session(model_path)?);
        info!(
            model_path = %config.model_path,
            input_size = config.input_size,
            "YOLO detector initialized"
        );

        Ok(Self { session, config })
    }

    pub fn config(&self) -> &YoloConfig {
        &self.config
    }

    /// Resize to the model input, scale to [0, 1], lay out as NCHW.
    fn preprocess(&self, img: &DynamicImage) -> VisionResult<Value> {
        let input_size = self.config.input_size;
        let resized = img.resize_exact(
            input_size,
            input_size,
            image::imageops::FilterType::Triangle,
        );

        let rgb = resized.to_rgb8();
        let side = input_size as usize;
        let mut chw_data: Vec<f32> = Vec::with_capacity(3 * side * side);

        for c in 0..3 {
            for pixel in rgb.pixels() {
                chw_data.push(pixel[c] as f32 / 255.0);
            }
        }

        let shape = vec![1usize, 3, side, side];
        Tensor::from_array((shape, chw_data.into_boxed_slice()))
            .map(Value::from)
            .map_err(|e| VisionError::internal(format!("Failed to create tensor: {}", e)))
    }

    fn run_inference(&self, input: Value) -> VisionResult<Vec<f32>> {
        let mut session = self
            .session
            .lock()
            .map_err(|_| VisionError::internal("Session lock poisoned"))?;

        let outputs = session
            .run(ort::inputs![input])
            .map_err(|e| VisionError::detection_failed(format!("ONNX inference failed: {}", e)))?;

        let output = outputs
            .get("output0")
            .ok_or_else(|| VisionError::detection_failed("Missing output0 tensor"))?;

        let tensor = output
            .try_extract_tensor::<f32>()
            .map_err(|e| VisionError::detection_failed(format!("Failed to extract tensor: {}", e)))?;

        Ok(tensor.1.iter().copied().collect())
    }

    /// Decode raw proposals. Overlaps are left for the adapter's NMS.
    fn postprocess(&self, outputs: Vec<f32>) -> VisionResult<Vec<CandidateObject>> {
        let num_classes = COCO_CLASSES.len();
        let num_features = BOX_FEATURES + num_classes;

        if outputs.len() != num_features * NUM_PROPOSALS {
            return Err(VisionError::detection_failed(format!(
                "Unexpected output size: expected {}, got {}",
                num_features * NUM_PROPOSALS,
                outputs.len()
            )));
        }

        let output_array = Array::from_shape_vec((num_features, NUM_PROPOSALS), outputs)
            .map_err(|e| VisionError::internal(format!("Failed to reshape output: {}", e)))?;
        let proposals = output_array.t();

        let input_size = self.config.input_size as f64;
        let mut candidates = Vec::new();

        for i in 0..NUM_PROPOSALS {
            let mut best_class = 0;
            let mut best_score = 0.0f32;
            for c in 0..num_classes {
                let score = proposals[[i, BOX_FEATURES + c]];
                if score > best_score {
                    best_score = score;
                    best_class = c;
                }
            }

            if best_score < self.config.min_score {
                continue;
            }

            let cx = proposals[[i, 0]] as f64 / input_size;
            let cy = proposals[[i, 1]] as f64 / input_size;
            let w = proposals[[i, 2]] as f64 / input_size;
            let h = proposals[[i, 3]] as f64 / input_size;

            let Some(bbox) = BoundingBox::from_xywh(cx - w / 2.0, cy - h / 2.0, w, h) else {
                continue;
            };

            candidates.push(CandidateObject {
                class_id: best_class,
                label: class_label(best_class).to_string(),
                confidence: best_score as f64,
                bbox,
            });
        }

        Ok(candidates)
    }
}

impl LocalDetector for YoloDetector {
    fn name(&self) -> &str {
        "yolov8"
    }

    fn emits_raw_proposals(&self) -> bool {
        true
    }

    fn detect(&self, image: &DynamicImage) -> VisionResult<Vec<CandidateObject>> {
        let (width, height) = image.dimensions();
        let input = self.preprocess(image)?;
        let outputs = self.run_inference(input)?;
        let candidates = self.postprocess(outputs)?;

        debug!(width, height, proposals = candidates.len(), "YOLO inference completed");
        Ok(candidates)
    }
}

/// Create an ONNX Runtime session, preferring CoreML on macOS.
fn create_session(model_path: &Path) -> VisionResult<Session> {
    let model_bytes = std::fs::read(model_path)?;

    let builder = Session::builder()
        .map_err(|e| VisionError::internal(format!("Failed to create session builder: {}", e)))?
        .with_optimization_level(GraphOptimizationLevel::Level3)
        .map_err(|e| VisionError::internal(format!("Failed to set optimization level: {}", e)))?;

    #[cfg(target_os = "macos")]
    {
        use ort::execution_providers::CoreMLExecutionProvider;
        if let Ok(coreml_builder) = builder
            .clone()
            .with_execution_providers([CoreMLExecutionProvider::default().build()])
        {
            if let Ok(session) = coreml_builder.commit_from_memory(&model_bytes) {
                info!("Using CoreML execution provider for local detection");
                return Ok(session);
            }
        }
        debug!("CoreML execution provider not available, using CPU");
    }

    info!("Using CPU execution provider for local detection");
    builder
        .commit_from_memory(&model_bytes)
        .map_err(|e| VisionError::internal(format!("Failed to load ONNX model: {}", e)))
}

//! Error types for frame and local detection operations.

use std::path::PathBuf;
use thiserror::Error;

/// Result type for vision operations.
pub type VisionResult<T> = Result<T, VisionError>;

/// Errors that can occur while loading frames or running local detection.
#[derive(Debug, Error)]
pub enum VisionError {
    #[error("Input not found: {0}")]
    InputNotFound(PathBuf),

    #[error("Recorded session has no frames: {0}")]
    EmptyInput(PathBuf),

    #[error("Invalid frame manifest: {0}")]
    InvalidManifest(String),

    #[error("Model not found: {0}")]
    ModelNotFound(String),

    #[error("Local detection failed: {0}")]
    DetectionFailed(String),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parse error: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl VisionError {
    /// Create a detection failure error.
    pub fn detection_failed(message: impl Into<String>) -> Self {
        Self::DetectionFailed(message.into())
    }

    /// Create a model not found error.
    pub fn model_not_found(path: impl Into<String>) -> Self {
        Self::ModelNotFound(path.into())
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Whether this error means the input itself is missing or empty.
    pub fn is_input_missing(&self) -> bool {
        matches!(self, VisionError::InputNotFound(_) | VisionError::EmptyInput(_))
    }
}

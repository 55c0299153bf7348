//! Frame handling and the local detector adapter for Spotter.
//!
//! - [`frame`]: frames, recorded sessions and JPEG upload encoding
//! - [`local`]: the throttled on-device detector adapter and its backends
//! - [`thumbnail`]: padded review crops

pub mod error;
pub mod frame;
pub mod local;
pub mod thumbnail;

pub use error::{VisionError, VisionResult};
pub use frame::{encode_jpeg, Frame, FrameSequence};
pub use local::{LocalDetector, LocalDetectorAdapter, LocalDetectorConfig};
#[cfg(feature = "onnx")]
pub use local::{YoloConfig, YoloDetector};
pub use thumbnail::{crop_thumbnail, DEFAULT_THUMBNAIL_PADDING};

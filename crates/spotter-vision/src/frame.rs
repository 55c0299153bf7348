//! Frames and recorded frame sequences.
//!
//! A recorded session is a directory of image files. Timestamps come from an
//! optional `frames.json` manifest; without one they are derived from a
//! nominal frame rate and the sorted file order.

use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{ColorType, DynamicImage, GenericImageView};
use serde::Deserialize;
use tracing::{debug, info};

use crate::error::{VisionError, VisionResult};

/// Name of the optional manifest inside a recorded-session directory.
pub const MANIFEST_FILE: &str = "frames.json";

const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png"];

/// A single captured frame.
#[derive(Debug, Clone)]
pub struct Frame {
    /// Position in the source sequence
    pub index: u64,
    /// Monotonically increasing capture timestamp
    pub timestamp_ms: u64,
    pub image: Arc<DynamicImage>,
}

impl Frame {
    pub fn new(index: u64, timestamp_ms: u64, image: DynamicImage) -> Self {
        Self {
            index,
            timestamp_ms,
            image: Arc::new(image),
        }
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.image.dimensions()
    }

    /// Encode the frame as JPEG for upload, downscaling so the longest side is
    /// at most `max_dim` pixels.
    pub fn encode_jpeg(&self, max_dim: u32, quality: u8) -> VisionResult<Vec<u8>> {
        encode_jpeg(&self.image, max_dim, quality)
    }
}

/// Encode an image as JPEG, downscaling to fit within `max_dim`.
pub fn encode_jpeg(image: &DynamicImage, max_dim: u32, quality: u8) -> VisionResult<Vec<u8>> {
    let (width, height) = image.dimensions();
    let resized;
    let source = if max_dim > 0 && width.max(height) > max_dim {
        resized = image.resize(max_dim, max_dim, FilterType::Triangle);
        &resized
    } else {
        image
    };

    let rgb = source.to_rgb8();
    let mut buffer = Cursor::new(Vec::new());
    JpegEncoder::new_with_quality(&mut buffer, quality.clamp(1, 100)).encode(
        rgb.as_raw(),
        rgb.width(),
        rgb.height(),
        ColorType::Rgb8,
    )?;

    Ok(buffer.into_inner())
}

#[derive(Debug, Deserialize)]
struct ManifestEntry {
    file: String,
    timestamp_ms: u64,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Manifest {
    Wrapped { frames: Vec<ManifestEntry> },
    Bare(Vec<ManifestEntry>),
}

impl Manifest {
    fn into_entries(self) -> Vec<ManifestEntry> {
        match self {
            Manifest::Wrapped { frames } => frames,
            Manifest::Bare(frames) => frames,
        }
    }
}

/// Ordered frames of a recorded session.
#[derive(Debug, Clone, Default)]
pub struct FrameSequence {
    frames: Vec<Frame>,
    source: Option<PathBuf>,
}

impl FrameSequence {
    /// Build a sequence from frames already in memory. Frames are ordered by
    /// timestamp.
    pub fn from_frames(mut frames: Vec<Frame>) -> Self {
        frames.sort_by_key(|f| (f.timestamp_ms, f.index));
        Self {
            frames,
            source: None,
        }
    }

    /// Load a recorded session directory.
    ///
    /// `fps` is used to derive timestamps when the directory has no manifest.
    pub fn load_dir(dir: impl AsRef<Path>, fps: f64) -> VisionResult<Self> {
        let dir = dir.as_ref();
        if !dir.is_dir() {
            return Err(VisionError::InputNotFound(dir.to_path_buf()));
        }

        let manifest_path = dir.join(MANIFEST_FILE);
        let entries: Vec<(PathBuf, u64)> = if manifest_path.is_file() {
            let raw = std::fs::read_to_string(&manifest_path)?;
            let manifest: Manifest = serde_json::from_str(&raw)?;
            let mut entries = manifest
                .into_entries()
                .into_iter()
                .map(|e| (dir.join(e.file), e.timestamp_ms))
                .collect::<Vec<_>>();
            entries.sort_by_key(|(_, ts)| *ts);
            for (path, _) in &entries {
                if !path.is_file() {
                    return Err(VisionError::InvalidManifest(format!(
                        "listed frame is missing: {}",
                        path.display()
                    )));
                }
            }
            entries
        } else {
            if !(fps.is_finite() && fps > 0.0) {
                return Err(VisionError::InvalidManifest(format!(
                    "no manifest and invalid fps {}",
                    fps
                )));
            }
            let mut paths = list_images(dir)?;
            paths.sort();
            let frame_ms = 1000.0 / fps;
            paths
                .into_iter()
                .enumerate()
                .map(|(i, p)| (p, (i as f64 * frame_ms).round() as u64))
                .collect()
        };

        if entries.is_empty() {
            return Err(VisionError::EmptyInput(dir.to_path_buf()));
        }

        let mut frames = Vec::with_capacity(entries.len());
        for (index, (path, timestamp_ms)) in entries.into_iter().enumerate() {
            debug!(path = %path.display(), timestamp_ms, "Loading frame");
            let image = image::open(&path)?;
            frames.push(Frame::new(index as u64, timestamp_ms, image));
        }

        info!(
            dir = %dir.display(),
            frames = frames.len(),
            "Loaded recorded session"
        );

        Ok(Self {
            frames,
            source: Some(dir.to_path_buf()),
        })
    }

    pub fn frames(&self) -> &[Frame] {
        &self.frames
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    /// Frames spaced at least `interval_ms` apart in frame time. The first
    /// frame is always kept.
    pub fn sample(&self, interval_ms: u64) -> Vec<Frame> {
        let mut sampled = Vec::new();
        let mut last_kept: Option<u64> = None;

        for frame in &self.frames {
            let keep = match last_kept {
                None => true,
                Some(last) => frame.timestamp_ms >= last.saturating_add(interval_ms),
            };
            if keep {
                last_kept = Some(frame.timestamp_ms);
                sampled.push(frame.clone());
            }
        }

        sampled
    }
}

fn list_images(dir: &Path) -> VisionResult<Vec<PathBuf>> {
    let mut paths = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        let is_image = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| IMAGE_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
            .unwrap_or(false);
        if path.is_file() && is_image {
            paths.push(path);
        }
    }
    Ok(paths)
}

//! Normalized bounding-box geometry.
//!
//! Every box in Spotter lives in normalized frame coordinates with a top-left
//! origin, stored in `(y_min, x_min, y_max, x_max)` order to match the layout
//! vision-language services emit.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Axis-aligned box in normalized [0, 1] coordinates.
///
/// Construction clamps to [0, 1] and re-orders swapped corners, so a value of
/// this type always satisfies `y_min < y_max` and `x_min < x_max`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(try_from = "RawBoundingBox")]
pub struct BoundingBox {
    y_min: f64,
    x_min: f64,
    y_max: f64,
    x_max: f64,
}

/// Unchecked wire form; deserialized boxes go through [`BoundingBox::new`].
#[derive(Deserialize)]
struct RawBoundingBox {
    y_min: f64,
    x_min: f64,
    y_max: f64,
    x_max: f64,
}

impl TryFrom<RawBoundingBox> for BoundingBox {
    type Error = String;

    fn try_from(raw: RawBoundingBox) -> Result<Self, Self::Error> {
        BoundingBox::new(raw.y_min, raw.x_min, raw.y_max, raw.x_max).ok_or_else(|| {
            format!(
                "empty or non-finite bounding box [{}, {}, {}, {}]",
                raw.y_min, raw.x_min, raw.y_max, raw.x_max
            )
        })
    }
}

impl BoundingBox {
    /// Create a box from normalized corners.
    ///
    /// Returns `None` when the box is empty after clamping or when any
    /// coordinate is not finite.
    pub fn new(y_min: f64, x_min: f64, y_max: f64, x_max: f64) -> Option<Self> {
        if ![y_min, x_min, y_max, x_max].iter().all(|v| v.is_finite()) {
            return None;
        }

        let (y0, y1) = (y_min.min(y_max).clamp(0.0, 1.0), y_min.max(y_max).clamp(0.0, 1.0));
        let (x0, x1) = (x_min.min(x_max).clamp(0.0, 1.0), x_min.max(x_max).clamp(0.0, 1.0));

        if y0 >= y1 || x0 >= x1 {
            return None;
        }

        Some(Self {
            y_min: y0,
            x_min: x0,
            y_max: y1,
            x_max: x1,
        })
    }

    /// Create a box from `[y_min, x_min, y_max, x_max]` expressed on a
    /// provider-specific scale (e.g. 1000 for Gemini `box_2d`).
    pub fn from_scaled(coords: [f64; 4], scale: f64) -> Option<Self> {
        if !(scale.is_finite() && scale > 0.0) {
            return None;
        }
        Self::new(
            coords[0] / scale,
            coords[1] / scale,
            coords[2] / scale,
            coords[3] / scale,
        )
    }

    /// Create a box from a normalized top-left corner and size.
    pub fn from_xywh(x: f64, y: f64, width: f64, height: f64) -> Option<Self> {
        Self::new(y, x, y + height, x + width)
    }

    #[inline]
    pub fn y_min(&self) -> f64 {
        self.y_min
    }

    #[inline]
    pub fn x_min(&self) -> f64 {
        self.x_min
    }

    #[inline]
    pub fn y_max(&self) -> f64 {
        self.y_max
    }

    #[inline]
    pub fn x_max(&self) -> f64 {
        self.x_max
    }

    /// Box width.
    #[inline]
    pub fn width(&self) -> f64 {
        self.x_max - self.x_min
    }

    /// Box height.
    #[inline]
    pub fn height(&self) -> f64 {
        self.y_max - self.y_min
    }

    /// Box area (fraction of the frame).
    #[inline]
    pub fn area(&self) -> f64 {
        self.width() * self.height()
    }

    /// Center point as `(x, y)`.
    #[inline]
    pub fn center(&self) -> (f64, f64) {
        (
            (self.x_min + self.x_max) / 2.0,
            (self.y_min + self.y_max) / 2.0,
        )
    }

    /// Whether `other` lies fully inside this box.
    pub fn contains(&self, other: &BoundingBox) -> bool {
        self.y_min <= other.y_min
            && self.x_min <= other.x_min
            && self.y_max >= other.y_max
            && self.x_max >= other.x_max
    }

    /// Expand the box by `padding_fraction` of its own width/height on every
    /// side, then clamp to the frame.
    ///
    /// Negative padding is treated as zero so the result always contains the
    /// input box.
    pub fn crop_with_padding(&self, padding_fraction: f64) -> BoundingBox {
        let padding = if padding_fraction.is_finite() {
            padding_fraction.max(0.0)
        } else {
            0.0
        };
        let pad_y = self.height() * padding;
        let pad_x = self.width() * padding;

        BoundingBox {
            y_min: (self.y_min - pad_y).max(0.0),
            x_min: (self.x_min - pad_x).max(0.0),
            y_max: (self.y_max + pad_y).min(1.0),
            x_max: (self.x_max + pad_x).min(1.0),
        }
    }

    /// Compute Intersection over Union with another box.
    pub fn iou(&self, other: &BoundingBox) -> f64 {
        intersection_over_union(self, other)
    }

    /// Convert to a pixel rectangle `(x, y, width, height)` for a frame of the
    /// given size. The rectangle is at least one pixel wide and high.
    pub fn to_pixel_rect(&self, frame_width: u32, frame_height: u32) -> (u32, u32, u32, u32) {
        let fw = frame_width as f64;
        let fh = frame_height as f64;

        let x = (self.x_min * fw).floor().min((frame_width.saturating_sub(1)) as f64) as u32;
        let y = (self.y_min * fh).floor().min((frame_height.saturating_sub(1)) as f64) as u32;
        let x2 = (self.x_max * fw).ceil().min(fw) as u32;
        let y2 = (self.y_max * fh).ceil().min(fh) as u32;

        (x, y, x2.saturating_sub(x).max(1), y2.saturating_sub(y).max(1))
    }
}

/// Standard IoU; returns 0 when boxes do not overlap.
pub fn intersection_over_union(a: &BoundingBox, b: &BoundingBox) -> f64 {
    let y1 = a.y_min.max(b.y_min);
    let x1 = a.x_min.max(b.x_min);
    let y2 = a.y_max.min(b.y_max);
    let x2 = a.x_max.min(b.x_max);

    if x2 <= x1 || y2 <= y1 {
        return 0.0;
    }

    let intersection = (x2 - x1) * (y2 - y1);
    let union = a.area() + b.area() - intersection;

    if union > 0.0 {
        intersection / union
    } else {
        0.0
    }
}

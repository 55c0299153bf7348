//! Review thumbnails cropped from frames.

use image::{DynamicImage, GenericImageView};
use spotter_models::BoundingBox;

/// Default padding around a detection when cropping its thumbnail.
pub const DEFAULT_THUMBNAIL_PADDING: f64 = 0.1;

/// Crop the region of `bbox`, expanded by `padding` of its own size, out of a
/// frame image. The same crop is used for live thumbnails and review crops.
pub fn crop_thumbnail(image: &DynamicImage, bbox: &BoundingBox, padding: f64) -> DynamicImage {
    let (width, height) = image.dimensions();
    let padded = bbox.crop_with_padding(padding);
    let (x, y, w, h) = padded.to_pixel_rect(width, height);
    image.crop_imm(x, y, w, h)
}

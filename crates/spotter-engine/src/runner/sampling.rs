//! Frame selection for batched requests.

use spotter_vision::Frame;

/// Pick up to `max` frames spread evenly across `frames`, always keeping the
/// last one (batched results are attributed to it).
pub fn subsample_evenly(frames: &[Frame], max: usize) -> Vec<Frame> {
    let n = frames.len();
    if n == 0 || max == 0 {
        return Vec::new();
    }
    if n <= max {
        return frames.to_vec();
    }
    if max == 1 {
        return vec![frames[n - 1].clone()];
    }

    (0..max)
        .map(|i| i * (n - 1) / (max - 1))
        .map(|idx| frames[idx].clone())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, RgbImage};

    fn frames(n: u64) -> Vec<Frame> {
        (0..n)
            .map(|i| Frame::new(i, i * 100, DynamicImage::ImageRgb8(RgbImage::new(1, 1))))
            .collect()
    }

    fn indices(selected: &[Frame]) -> Vec<u64> {
        selected.iter().map(|f| f.index).collect()
    }

    #[test]
    fn test_keeps_all_when_under_limit() {
        assert_eq!(indices(&subsample_evenly(&frames(5), 16)), vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn test_even_spread_includes_ends() {
        let selected = subsample_evenly(&frames(31), 16);
        assert_eq!(selected.len(), 16);
        assert_eq!(selected[0].index, 0);
        assert_eq!(selected[15].index, 30);
        assert!(selected.windows(2).all(|w| w[0].index < w[1].index));
    }

    #[test]
    fn test_single_image_is_last_frame() {
        assert_eq!(indices(&subsample_evenly(&frames(7), 1)), vec![6]);
        assert!(subsample_evenly(&frames(0), 4).is_empty());
    }
}

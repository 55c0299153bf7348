//! Candidate post-processing: threshold, per-class NMS and cap.

use std::cmp::Ordering;

use spotter_models::CandidateObject;

fn by_confidence_desc(a: &CandidateObject, b: &CandidateObject) -> Ordering {
    b.confidence
        .partial_cmp(&a.confidence)
        .unwrap_or(Ordering::Equal)
}

/// Suppress same-class candidates overlapping a higher-confidence one by more
/// than `iou_threshold`. Different classes never suppress each other.
pub fn non_maximum_suppression(
    mut candidates: Vec<CandidateObject>,
    iou_threshold: f64,
) -> Vec<CandidateObject> {
    if candidates.is_empty() {
        return candidates;
    }

    candidates.sort_by(by_confidence_desc);

    let mut keep = Vec::new();
    let mut suppressed = vec![false; candidates.len()];

    for i in 0..candidates.len() {
        if suppressed[i] {
            continue;
        }

        for j in (i + 1)..candidates.len() {
            if suppressed[j] || candidates[i].class_id != candidates[j].class_id {
                continue;
            }
            if candidates[i].bbox.iou(&candidates[j].bbox) > iou_threshold {
                suppressed[j] = true;
            }
        }

        keep.push(candidates[i].clone());
    }

    keep
}

/// Drop candidates under `confidence_threshold`, optionally run NMS, then keep
/// the `max_candidates` most confident in descending order.
pub fn finalize_candidates(
    candidates: Vec<CandidateObject>,
    confidence_threshold: f64,
    nms_threshold: Option<f64>,
    max_candidates: usize,
) -> Vec<CandidateObject> {
    let filtered: Vec<CandidateObject> = candidates
        .into_iter()
        .filter(|c| c.confidence.is_finite() && c.confidence >= confidence_threshold)
        .collect();

    let mut result = match nms_threshold {
        Some(threshold) => non_maximum_suppression(filtered, threshold),
        None => filtered,
    };

    result.sort_by(by_confidence_desc);
    result.truncate(max_candidates);
    result
}

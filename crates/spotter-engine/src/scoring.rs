//! Ground-truth scoring for evaluation runs.

use std::cmp::Ordering;

use spotter_models::{
    match_normalized, name_quality, normalize_name, DetectedObject, GroundTruthItem, MatchDetail,
    MatchMode, MatchType, NameMatch, ScoreSummary,
};

/// Score detected objects against a ground-truth list.
///
/// Ground-truth items are matched in list order. Each one takes the best tier
/// available among unclaimed detections (exact, then substring, then fuzzy at
/// `fuzzy_threshold`); within a tier the most confident, then most recent,
/// detection wins. A detection is claimed at most once.
pub fn score_run(
    objects: &[DetectedObject],
    ground_truth: &[GroundTruthItem],
    fuzzy_threshold: f64,
) -> ScoreSummary {
    let mode = MatchMode::Offline { fuzzy_threshold };

    let mut ranked: Vec<(&DetectedObject, String)> = objects
        .iter()
        .map(|obj| (obj, normalize_name(&obj.name)))
        .collect();
    ranked.sort_by(|(a, _), (b, _)| {
        b.ranking_confidence()
            .partial_cmp(&a.ranking_confidence())
            .unwrap_or(Ordering::Equal)
            .then_with(|| b.timestamp_ms.cmp(&a.timestamp_ms))
    });

    let mut claimed = vec![false; ranked.len()];
    let mut details = Vec::with_capacity(ground_truth.len());

    for item in ground_truth {
        let target = normalize_name(&item.name);

        let mut best: Option<(usize, NameMatch)> = None;
        for (idx, (_, name)) in ranked.iter().enumerate() {
            if claimed[idx] {
                continue;
            }
            let name_match = match_normalized(&target, name, mode);
            if !name_match.match_type.is_match() {
                continue;
            }
            let better = match &best {
                None => true,
                Some((_, current)) => name_match.match_type.rank() < current.match_type.rank(),
            };
            if better {
                best = Some((idx, name_match));
                if name_match.match_type == MatchType::Exact {
                    break;
                }
            }
        }

        let detail = match best {
            Some((idx, name_match)) => {
                claimed[idx] = true;
                let obj = ranked[idx].0;
                MatchDetail {
                    ground_truth: item.name.clone(),
                    match_type: name_match.match_type,
                    matched_name: Some(obj.name.clone()),
                    matched_id: Some(obj.id.clone()),
                    similarity: name_match.similarity,
                    name_quality: name_quality(&name_match, fuzzy_threshold),
                }
            }
            None => MatchDetail {
                ground_truth: item.name.clone(),
                match_type: MatchType::None,
                matched_name: None,
                matched_id: None,
                similarity: 0.0,
                name_quality: 0.0,
            },
        };
        details.push(detail);
    }

    let matched_count = details.iter().filter(|d| d.match_type.is_match()).count();
    let ground_truth_count = ground_truth.len();
    let detected_count = objects.len();

    let recall = if ground_truth_count == 0 {
        1.0
    } else {
        matched_count as f64 / ground_truth_count as f64
    };
    let precision = if detected_count == 0 {
        1.0
    } else {
        matched_count as f64 / detected_count as f64
    };
    let avg_name_quality = if ground_truth_count == 0 {
        0.0
    } else {
        details.iter().map(|d| d.name_quality).sum::<f64>() / ground_truth_count as f64
    };

    ScoreSummary {
        recall,
        precision,
        matched_count,
        ground_truth_count,
        detected_count,
        avg_name_quality,
        details,
    }
}

//! Detection ledger: the live set of tracked items for one session or run.
//!
//! Items move `Bootstrapped` → `Enriched` → `Saved`. Local candidates
//! bootstrap items under generic class names; remote results rename and
//! enrich them in place, keeping the original id. Every merge is guarded by
//! the frame timestamp of the data already applied, so results arriving out
//! of order never overwrite newer data.
//!
//! The ledger itself is synchronous and single-owner. Live sessions wrap it in
//! an actor (see [`actor`]); evaluation runs own it in the collection loop.

pub mod actor;

pub use actor::{spawn_ledger, LedgerHandle};

use spotter_models::{
    match_normalized, normalize_name, BoundingBox, CandidateObject, DetectedObject,
    EnrichedObject, ItemId, MatchMode, Provenance, TrackState,
};
use tracing::{debug, trace};

use crate::metrics;

/// Ledger limits and thresholds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LedgerConfig {
    /// Most items tracked at once
    pub capacity: usize,
    /// A remote match within this frame-time distance refreshes an item
    pub refresh_window_ms: u64,
    /// Box overlap at which a region is considered the same object
    pub handoff_iou: f64,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            capacity: 200,
            refresh_window_ms: 10_000,
            handoff_iou: 0.3,
        }
    }
}

/// A change to the ledger. Each carries a snapshot of the affected item.
#[derive(Debug, Clone, PartialEq)]
pub enum LedgerEvent {
    Inserted(DetectedObject),
    Updated(DetectedObject),
    Removed(DetectedObject),
}

impl LedgerEvent {
    pub fn object(&self) -> &DetectedObject {
        match self {
            LedgerEvent::Inserted(o) | LedgerEvent::Updated(o) | LedgerEvent::Removed(o) => o,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            LedgerEvent::Inserted(_) => "inserted",
            LedgerEvent::Updated(_) => "updated",
            LedgerEvent::Removed(_) => "removed",
        }
    }
}

#[derive(Debug, Clone)]
struct TrackedItem {
    object: DetectedObject,
    normalized: String,
    /// Creation order
    seq: u64,
    /// Frame timestamp of the last applied local refresh
    last_local_ms: Option<u64>,
    /// Frame timestamp of the last applied remote merge
    last_remote_ms: Option<u64>,
    /// Frame timestamp the current box came from
    box_ms: u64,
}

impl TrackedItem {
    fn state(&self) -> TrackState {
        self.object.state
    }

    fn touch(&mut self, frame_index: u64, timestamp_ms: u64) {
        if timestamp_ms >= self.object.timestamp_ms {
            self.object.timestamp_ms = timestamp_ms;
            self.object.frame_index = frame_index;
        }
    }

    fn set_box(&mut self, bbox: BoundingBox, timestamp_ms: u64) {
        if timestamp_ms >= self.box_ms {
            self.object.bbox = Some(bbox);
            self.box_ms = timestamp_ms;
        }
    }
}

/// Owned set of tracked items.
#[derive(Debug, Clone)]
pub struct DetectionLedger {
    config: LedgerConfig,
    items: Vec<TrackedItem>,
    next_seq: u64,
}

impl DetectionLedger {
    pub fn new(config: LedgerConfig) -> Self {
        Self {
            config: LedgerConfig {
                capacity: config.capacity.max(1),
                ..config
            },
            items: Vec::new(),
            next_seq: 0,
        }
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get(&self, id: &ItemId) -> Option<&DetectedObject> {
        self.items.iter().find(|i| &i.object.id == id).map(|i| &i.object)
    }

    /// All items in creation order.
    pub fn snapshot(&self) -> Vec<DetectedObject> {
        self.items.iter().map(|i| i.object.clone()).collect()
    }

    /// Names of tracked items, used as context for remote calls.
    pub fn names(&self) -> Vec<String> {
        self.items.iter().map(|i| i.object.name.clone()).collect()
    }

    /// Apply local detector candidates from one frame.
    pub fn apply_local(
        &mut self,
        frame_index: u64,
        timestamp_ms: u64,
        candidates: &[CandidateObject],
    ) -> Vec<LedgerEvent> {
        let mut events = Vec::new();

        for candidate in candidates {
            // Once a region has a remote identity, local output only moves its box.
            if let Some(idx) = self.best_overlap(&candidate.bbox, |s| s != TrackState::Bootstrapped) {
                let item = &mut self.items[idx];
                if item.state() == TrackState::Enriched && timestamp_ms >= item.box_ms {
                    item.set_box(candidate.bbox, timestamp_ms);
                    item.last_local_ms = Some(item.last_local_ms.map_or(timestamp_ms, |t| t.max(timestamp_ms)));
                    item.touch(frame_index, timestamp_ms);
                    trace!(id = %item.object.id, "Box refined by local detector");
                    events.push(LedgerEvent::Updated(item.object.clone()));
                }
                continue;
            }

            let normalized = normalize_name(&candidate.label);
            if normalized.is_empty() {
                continue;
            }

            if let Some(idx) = self.best_name_match(&normalized) {
                let item = &mut self.items[idx];
                if item.state() != TrackState::Bootstrapped {
                    continue;
                }

                let newer = item.last_local_ms.map_or(true, |last| timestamp_ms > last);
                let better_in_same_frame = item.last_local_ms == Some(timestamp_ms)
                    && candidate.confidence > item.object.ranking_confidence();
                if newer || better_in_same_frame {
                    item.set_box(candidate.bbox, timestamp_ms);
                    item.object.confidence = Some(candidate.confidence);
                    item.last_local_ms = Some(timestamp_ms);
                    item.touch(frame_index, timestamp_ms);
                    events.push(LedgerEvent::Updated(item.object.clone()));
                }
                continue;
            }

            let object = DetectedObject {
                id: ItemId::new(),
                name: candidate.label.clone(),
                brand: None,
                color: None,
                size: None,
                category: None,
                confidence: Some(candidate.confidence),
                bbox: Some(candidate.bbox),
                frame_index,
                timestamp_ms,
                ocr_text: Vec::new(),
                provenance: Provenance::Local,
                state: TrackState::Bootstrapped,
            };
            self.insert(object, normalized, Some(timestamp_ms), None, &mut events);
        }

        metrics::record_ledger_events(&events);
        events
    }

    /// Apply remote results for the frame with `timestamp_ms`.
    pub fn apply_remote(
        &mut self,
        frame_index: u64,
        timestamp_ms: u64,
        results: &[EnrichedObject],
    ) -> Vec<LedgerEvent> {
        let mut events = Vec::new();

        for result in results {
            let normalized = normalize_name(&result.name);
            if normalized.is_empty() {
                continue;
            }

            if let Some(idx) = self.best_name_match(&normalized) {
                match self.items[idx].state() {
                    TrackState::Saved => {
                        trace!(name = %result.name, "Matches a saved item, suppressed");
                        continue;
                    }
                    TrackState::Bootstrapped => {
                        self.merge_remote(idx, result, &normalized, frame_index, timestamp_ms, &mut events);
                        continue;
                    }
                    TrackState::Enriched => {
                        let last = self.items[idx].last_remote_ms.unwrap_or(0);
                        if timestamp_ms < last {
                            debug!(
                                name = %result.name,
                                timestamp_ms,
                                last_update_ms = last,
                                "Dropping stale remote result"
                            );
                            continue;
                        }
                        if timestamp_ms - last <= self.config.refresh_window_ms {
                            self.merge_remote(idx, result, &normalized, frame_index, timestamp_ms, &mut events);
                            continue;
                        }
                        // Seen again long after: treat as a new instance.
                    }
                }
            } else if let Some(bbox) = &result.bbox {
                if let Some(idx) = self.best_overlap(bbox, |s| s == TrackState::Bootstrapped) {
                    self.merge_remote(idx, result, &normalized, frame_index, timestamp_ms, &mut events);
                    continue;
                }
            }

            let object = DetectedObject {
                id: ItemId::new(),
                name: result.name.trim().to_string(),
                brand: result.brand.clone(),
                color: result.color.clone(),
                size: result.size.clone(),
                category: result.category.clone(),
                confidence: result.confidence,
                bbox: result.bbox,
                frame_index,
                timestamp_ms,
                ocr_text: result.ocr_text.clone(),
                provenance: Provenance::Remote,
                state: TrackState::Enriched,
            };
            self.insert(object, normalized, None, Some(timestamp_ms), &mut events);
        }

        metrics::record_ledger_events(&events);
        events
    }

    /// Hand an item off to the inventory. Saved items are read-only.
    pub fn mark_saved(&mut self, id: &ItemId) -> Option<LedgerEvent> {
        let item = self.items.iter_mut().find(|i| &i.object.id == id)?;
        if item.state() == TrackState::Saved {
            return None;
        }
        item.object.state = TrackState::Saved;
        let event = LedgerEvent::Updated(item.object.clone());
        metrics::record_ledger_events(std::slice::from_ref(&event));
        Some(event)
    }

    fn merge_remote(
        &mut self,
        idx: usize,
        result: &EnrichedObject,
        normalized: &str,
        frame_index: u64,
        timestamp_ms: u64,
        events: &mut Vec<LedgerEvent>,
    ) {
        let item = &mut self.items[idx];
        let was = item.state();

        item.object.name = result.name.trim().to_string();
        item.normalized = normalized.to_string();
        if let Some(bbox) = result.bbox {
            item.set_box(bbox, timestamp_ms);
        }
        if result.brand.is_some() {
            item.object.brand = result.brand.clone();
        }
        if result.color.is_some() {
            item.object.color = result.color.clone();
        }
        if result.size.is_some() {
            item.object.size = result.size.clone();
        }
        if result.category.is_some() {
            item.object.category = result.category.clone();
        }
        if result.confidence.is_some() {
            item.object.confidence = result.confidence;
        }
        for token in &result.ocr_text {
            if !item.object.ocr_text.contains(token) {
                item.object.ocr_text.push(token.clone());
            }
        }

        item.object.state = TrackState::Enriched;
        if item.object.provenance == Provenance::Local {
            item.object.provenance = Provenance::Merged;
        }
        item.last_remote_ms = Some(timestamp_ms);
        item.touch(frame_index, timestamp_ms);

        if was == TrackState::Bootstrapped {
            debug!(id = %item.object.id, name = %item.object.name, "Item enriched");
        }
        events.push(LedgerEvent::Updated(item.object.clone()));
    }

    fn insert(
        &mut self,
        object: DetectedObject,
        normalized: String,
        last_local_ms: Option<u64>,
        last_remote_ms: Option<u64>,
        events: &mut Vec<LedgerEvent>,
    ) {
        if self.items.len() >= self.config.capacity {
            if let Some(evicted) = self.evict() {
                events.push(LedgerEvent::Removed(evicted));
            }
        }

        let box_ms = object.timestamp_ms;
        trace!(id = %object.id, name = %object.name, state = object.state.as_str(), "Item inserted");
        events.push(LedgerEvent::Inserted(object.clone()));
        self.items.push(TrackedItem {
            object,
            normalized,
            seq: self.next_seq,
            last_local_ms,
            last_remote_ms,
            box_ms,
        });
        self.next_seq += 1;
    }

    /// Remove the oldest item of the lowest-priority state.
    fn evict(&mut self) -> Option<DetectedObject> {
        let idx = self
            .items
            .iter()
            .enumerate()
            .min_by_key(|(_, i)| (i.state().eviction_rank(), i.object.timestamp_ms, i.seq))
            .map(|(idx, _)| idx)?;

        let removed = self.items.remove(idx).object;
        debug!(id = %removed.id, name = %removed.name, "Evicted item at capacity");
        Some(removed)
    }

    /// Best live name match: exact before substring, then most recent.
    fn best_name_match(&self, normalized: &str) -> Option<usize> {
        self.items
            .iter()
            .enumerate()
            .filter_map(|(idx, item)| {
                let m = match_normalized(normalized, &item.normalized, MatchMode::Live);
                m.match_type
                    .is_match()
                    .then_some((idx, m.match_type.rank(), item.object.timestamp_ms))
            })
            .min_by(|a, b| a.1.cmp(&b.1).then(b.2.cmp(&a.2)))
            .map(|(idx, _, _)| idx)
    }

    /// Item in an accepted state whose box overlaps `bbox` the most, at or
    /// above the handoff threshold.
    fn best_overlap(&self, bbox: &BoundingBox, accept: impl Fn(TrackState) -> bool) -> Option<usize> {
        self.items
            .iter()
            .enumerate()
            .filter(|(_, item)| accept(item.state()))
            .filter_map(|(idx, item)| item.object.bbox.map(|b| (idx, b.iou(bbox))))
            .filter(|(_, iou)| *iou >= self.config.handoff_iou)
            .max_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal))
            .map(|(idx, _)| idx)
    }
}

impl Default for DetectionLedger {
    fn default() -> Self {
        Self::new(LedgerConfig::default())
    }
}

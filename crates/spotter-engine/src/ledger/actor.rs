//! Actor that owns a live session's ledger.
//!
//! Adapters never touch the ledger directly: they send results through a
//! [`LedgerHandle`], the actor applies them one at a time and forwards the
//! resulting events to the session's subscriber.
//!
//! Forwarding never waits on the subscriber. When the event buffer is full the
//! event is dropped and counted; [`LedgerHandle::snapshot`] stays authoritative.

use spotter_models::{CandidateObject, DetectedObject, EnrichedObject, ItemId};
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use super::{DetectionLedger, LedgerConfig, LedgerEvent};
use crate::error::{EngineError, EngineResult};
use crate::metrics;

const COMMAND_BUFFER: usize = 64;

enum LedgerCommand {
    Local {
        frame_index: u64,
        timestamp_ms: u64,
        candidates: Vec<CandidateObject>,
    },
    Remote {
        frame_index: u64,
        timestamp_ms: u64,
        results: Vec<EnrichedObject>,
    },
    MarkSaved {
        id: ItemId,
        reply: oneshot::Sender<Option<DetectedObject>>,
    },
    Snapshot {
        reply: oneshot::Sender<Vec<DetectedObject>>,
    },
    Names {
        reply: oneshot::Sender<Vec<String>>,
    },
}

/// Cloneable handle to a ledger actor.
#[derive(Clone)]
pub struct LedgerHandle {
    tx: mpsc::Sender<LedgerCommand>,
}

impl LedgerHandle {
    pub async fn apply_local(
        &self,
        frame_index: u64,
        timestamp_ms: u64,
        candidates: Vec<CandidateObject>,
    ) -> EngineResult<()> {
        self.send(LedgerCommand::Local {
            frame_index,
            timestamp_ms,
            candidates,
        })
        .await
    }

    pub async fn apply_remote(
        &self,
        frame_index: u64,
        timestamp_ms: u64,
        results: Vec<EnrichedObject>,
    ) -> EngineResult<()> {
        self.send(LedgerCommand::Remote {
            frame_index,
            timestamp_ms,
            results,
        })
        .await
    }

    /// Mark an item saved. Returns the frozen item, or `None` if it is unknown
    /// or already saved.
    pub async fn mark_saved(&self, id: ItemId) -> EngineResult<Option<DetectedObject>> {
        let (reply, rx) = oneshot::channel();
        self.send(LedgerCommand::MarkSaved { id, reply }).await?;
        rx.await.map_err(|_| EngineError::channel_closed("mark_saved reply dropped"))
    }

    pub async fn snapshot(&self) -> EngineResult<Vec<DetectedObject>> {
        let (reply, rx) = oneshot::channel();
        self.send(LedgerCommand::Snapshot { reply }).await?;
        rx.await.map_err(|_| EngineError::channel_closed("snapshot reply dropped"))
    }

    pub async fn names(&self) -> EngineResult<Vec<String>> {
        let (reply, rx) = oneshot::channel();
        self.send(LedgerCommand::Names { reply }).await?;
        rx.await.map_err(|_| EngineError::channel_closed("names reply dropped"))
    }

    async fn send(&self, command: LedgerCommand) -> EngineResult<()> {
        self.tx
            .send(command)
            .await
            .map_err(|_| EngineError::channel_closed("ledger actor stopped"))
    }
}

/// Spawn a ledger actor.
///
/// Events go to `events`; a dropped receiver is ignored and a full buffer
/// drops the event. The actor stops when every handle is dropped and yields
/// the final ledger.
pub fn spawn_ledger(
    config: LedgerConfig,
    events: mpsc::Sender<LedgerEvent>,
) -> (LedgerHandle, JoinHandle<DetectionLedger>) {
    let (tx, rx) = mpsc::channel(COMMAND_BUFFER);
    let handle = tokio::spawn(run_actor(DetectionLedger::new(config), rx, events));
    (LedgerHandle { tx }, handle)
}

async fn run_actor(
    mut ledger: DetectionLedger,
    mut commands: mpsc::Receiver<LedgerCommand>,
    events: mpsc::Sender<LedgerEvent>,
) -> DetectionLedger {
    debug!(capacity = ledger.config().capacity, "Ledger actor started");
    let mut dropped: u64 = 0;

    while let Some(command) = commands.recv().await {
        let produced = match command {
            LedgerCommand::Local {
                frame_index,
                timestamp_ms,
                candidates,
            } => ledger.apply_local(frame_index, timestamp_ms, &candidates),
            LedgerCommand::Remote {
                frame_index,
                timestamp_ms,
                results,
            } => ledger.apply_remote(frame_index, timestamp_ms, &results),
            LedgerCommand::MarkSaved { id, reply } => {
                let event = ledger.mark_saved(&id);
                let _ = reply.send(event.as_ref().map(|e| e.object().clone()));
                event.into_iter().collect()
            }
            LedgerCommand::Snapshot { reply } => {
                let _ = reply.send(ledger.snapshot());
                Vec::new()
            }
            LedgerCommand::Names { reply } => {
                let _ = reply.send(ledger.names());
                Vec::new()
            }
        };

        for event in produced {
            match events.try_send(event) {
                Ok(()) => {}
                Err(TrySendError::Full(event)) => {
                    dropped += 1;
                    metrics::record_event_dropped(event.kind());
                    debug!(kind = event.kind(), dropped, "Event buffer full, dropping event");
                }
                // Subscriber gone; keep applying so snapshots stay correct.
                Err(TrySendError::Closed(_)) => {}
            }
        }
    }

    info!(items = ledger.len(), dropped_events = dropped, "Ledger actor stopped");
    ledger
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use spotter_models::{BoundingBox, TrackState};

    #[tokio::test]
    async fn test_actor_applies_in_order_and_emits_events() {
        let (events_tx, mut events_rx) = mpsc::channel(16);
        let (handle, join) = spawn_ledger(LedgerConfig::default(), events_tx);

        let bbox = BoundingBox::new(0.1, 0.1, 0.4, 0.3).unwrap();
        handle
            .apply_local(
                0,
                0,
                vec![CandidateObject {
                    class_id: 39,
                    label: "bottle".to_string(),
                    confidence: 0.8,
                    bbox,
                }],
            )
            .await
            .unwrap();
        handle
            .apply_remote(1, 1000, vec![EnrichedObject::named("Glass Wine Bottle").with_bbox(bbox)])
            .await
            .unwrap();

        let inserted = events_rx.recv().await.unwrap();
        let updated = events_rx.recv().await.unwrap();
        assert!(matches!(inserted, LedgerEvent::Inserted(_)));
        assert!(matches!(updated, LedgerEvent::Updated(_)));
        assert_eq!(inserted.object().id, updated.object().id);

        let saved = handle.mark_saved(updated.object().id.clone()).await.unwrap().unwrap();
        assert_eq!(saved.state, TrackState::Saved);

        assert_eq!(handle.names().await.unwrap(), vec!["Glass Wine Bottle".to_string()]);
        assert_eq!(handle.snapshot().await.unwrap().len(), 1);

        drop(handle);
        let ledger = join.await.unwrap();
        assert_eq!(ledger.len(), 1);
    }

    #[tokio::test]
    async fn test_dropped_subscriber_does_not_stop_actor() {
        let (events_tx, events_rx) = mpsc::channel(1);
        drop(events_rx);
        let (handle, _join) = spawn_ledger(LedgerConfig::default(), events_tx);

        handle
            .apply_remote(0, 0, vec![EnrichedObject::named("Toaster")])
            .await
            .unwrap();
        assert_eq!(handle.snapshot().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_full_event_buffer_does_not_block_commands() {
        let (events_tx, mut events_rx) = mpsc::channel(1);
        let (handle, _join) = spawn_ledger(LedgerConfig::default(), events_tx);

        let candidates = ["bottle", "cup", "laptop"]
            .iter()
            .enumerate()
            .map(|(i, label)| {
                let offset = i as f64 * 0.3;
                CandidateObject {
                    class_id: i,
                    label: label.to_string(),
                    confidence: 0.9,
                    bbox: BoundingBox::new(0.0, offset, 0.2, offset + 0.2).unwrap(),
                }
            })
            .collect();
        handle.apply_local(0, 0, candidates).await.unwrap();

        let snapshot = tokio::time::timeout(Duration::from_secs(1), handle.snapshot())
            .await
            .expect("ledger actor stalled on a full event buffer")
            .unwrap();
        assert_eq!(snapshot.len(), 3);

        let saved = tokio::time::timeout(
            Duration::from_secs(1),
            handle.mark_saved(snapshot[0].id.clone()),
        )
        .await
        .expect("ledger actor stalled on a full event buffer")
        .unwrap();
        assert!(saved.is_some());

        // Only the first event fit.
        assert!(matches!(events_rx.recv().await, Some(LedgerEvent::Inserted(_))));
        assert!(events_rx.try_recv().is_err());
    }
}

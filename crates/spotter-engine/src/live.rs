//! Live detection sessions.
//!
//! A session consumes a frame stream, runs the local detector on every frame
//! it admits and submits frames to the remote enricher at most once per
//! sample interval, one call at a time. All results go through the session's
//! ledger actor; consumers read the resulting [`LedgerEvent`]s as a stream.

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures::{Stream, StreamExt};
use spotter_enrich::{CancelToken, EnrichRequest, InFlightGate, InFlightPermit, RemoteEnricher};
use spotter_models::{DetectedObject, ItemId, PipelineConfig, SubmissionPolicy};
use spotter_vision::{Frame, LocalDetectorAdapter};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn, Instrument};

use crate::error::EngineResult;
use crate::ledger::{spawn_ledger, LedgerConfig, LedgerEvent, LedgerHandle};
use crate::metrics;

/// Stream of ledger events for one live session.
///
/// Ends after [`LiveSession::finish`] once every pending result is applied.
pub struct LiveEvents {
    rx: mpsc::Receiver<LedgerEvent>,
}

impl LiveEvents {
    fn closed() -> Self {
        let (_, rx) = mpsc::channel(1);
        Self { rx }
    }
}

impl Stream for LiveEvents {
    type Item = LedgerEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}

/// A running live session.
pub struct LiveSession {
    events: LiveEvents,
    ledger: LedgerHandle,
    cancel: CancelToken,
    frame_loop: JoinHandle<()>,
}

impl LiveSession {
    pub(crate) fn start<S>(
        frames: S,
        config: PipelineConfig,
        ledger_config: LedgerConfig,
        event_buffer: usize,
        local: Option<LocalDetectorAdapter>,
        remote: Option<Arc<dyn RemoteEnricher>>,
    ) -> Self
    where
        S: Stream<Item = Frame> + Send + 'static,
    {
        let (events_tx, events_rx) = mpsc::channel(event_buffer.max(1));
        let (ledger, _actor) = spawn_ledger(ledger_config, events_tx);
        let cancel = CancelToken::new();

        let frame_loop = FrameLoop {
            ledger: ledger.clone(),
            local: local.filter(|_| config.adapters.uses_local()),
            remote: remote.filter(|_| config.adapters.uses_remote()),
            gate: InFlightGate::new(),
            cancel: cancel.clone(),
            send_context: matches!(config.policy, SubmissionPolicy::SequentialWithContext),
            sample_interval_ms: config.sample_interval_ms,
            last_remote_ms: None,
        };

        let span = tracing::info_span!("live", pipeline = %config.label());
        let task = tokio::spawn(frame_loop.run(frames).instrument(span));

        Self {
            events: LiveEvents { rx: events_rx },
            ledger,
            cancel,
            frame_loop: task,
        }
    }

    /// Ledger events in the order they were applied.
    pub fn events(&mut self) -> &mut LiveEvents {
        &mut self.events
    }

    /// Freeze an item. Returns it, or `None` if unknown or already saved.
    pub async fn mark_saved(&self, id: ItemId) -> EngineResult<Option<DetectedObject>> {
        self.ledger.mark_saved(id).await
    }

    pub async fn snapshot(&self) -> EngineResult<Vec<DetectedObject>> {
        self.ledger.snapshot().await
    }

    /// Stop consuming frames. Remote calls already sent still land.
    pub fn stop(&self) {
        self.cancel.cancel();
    }

    pub fn is_stopped(&self) -> bool {
        self.cancel.is_cancelled() || self.frame_loop.is_finished()
    }

    /// Stop the session and keep only its event stream, which drains the
    /// remaining events and then ends.
    pub fn finish(mut self) -> LiveEvents {
        self.cancel.cancel();
        std::mem::replace(&mut self.events, LiveEvents::closed())
    }
}

impl Drop for LiveSession {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

struct FrameLoop {
    ledger: LedgerHandle,
    local: Option<LocalDetectorAdapter>,
    remote: Option<Arc<dyn RemoteEnricher>>,
    gate: InFlightGate,
    cancel: CancelToken,
    send_context: bool,
    sample_interval_ms: u64,
    last_remote_ms: Option<u64>,
}

impl FrameLoop {
    async fn run<S>(mut self, frames: S)
    where
        S: Stream<Item = Frame> + Send + 'static,
    {
        info!("Live session started");
        let mut frames = Box::pin(frames);
        let cancel = self.cancel.clone();

        loop {
            let frame = tokio::select! {
                _ = cancel.cancelled() => break,
                next = frames.next() => match next {
                    Some(frame) => frame,
                    None => break,
                },
            };

            if self.handle_frame(frame).await.is_err() {
                warn!("Ledger actor stopped, ending live session");
                break;
            }
        }

        info!("Live session stopped");
    }

    async fn handle_frame(&mut self, frame: Frame) -> EngineResult<()> {
        metrics::record_frame_processed("live");

        if let Some(local) = &self.local {
            match local.try_detect(&frame).await {
                Ok(Some(candidates)) => {
                    self.ledger
                        .apply_local(frame.index, frame.timestamp_ms, candidates)
                        .await?;
                }
                Ok(None) => {}
                Err(e) => debug!(frame_index = frame.index, error = %e, "Local detection failed"),
            }
        }

        if let Some(permit) = self.admit_remote(&frame) {
            self.submit_remote(frame, permit).await?;
        }

        Ok(())
    }

    /// Admit a remote submission when the sample interval has elapsed and no
    /// call is in flight.
    fn admit_remote(&mut self, frame: &Frame) -> Option<InFlightPermit> {
        self.remote.as_ref()?;

        if let Some(last) = self.last_remote_ms {
            if frame.timestamp_ms < last.saturating_add(self.sample_interval_ms) {
                return None;
            }
        }

        let permit = self.gate.try_enter()?;
        self.last_remote_ms = Some(frame.timestamp_ms);
        Some(permit)
    }

    async fn submit_remote(&self, frame: Frame, permit: InFlightPermit) -> EngineResult<()> {
        let Some(remote) = self.remote.as_ref().map(Arc::clone) else {
            return Ok(());
        };

        let context = if self.send_context {
            self.ledger.names().await?
        } else {
            Vec::new()
        };

        let ledger = self.ledger.clone();
        let cancel = self.cancel.clone();
        let (frame_index, timestamp_ms) = (frame.index, frame.timestamp_ms);
        let request = EnrichRequest::single(frame).with_context(context);

        tokio::spawn(
            async move {
                let _permit = permit;
                match remote.identify(&request, &cancel).await {
                    Ok(items) => {
                        if let Err(e) = ledger.apply_remote(frame_index, timestamp_ms, items).await {
                            debug!(frame_index, error = %e, "Dropped remote result");
                        }
                    }
                    Err(e) if e.is_cancelled() => {
                        debug!(frame_index, "Remote call abandoned, session stopped");
                    }
                    Err(e) => {
                        metrics::record_skip(e.skip_reason());
                        warn!(
                            frame_index,
                            reason = e.skip_reason().as_str(),
                            "Remote enrichment failed: {}", e
                        );
                    }
                }
            }
            .in_current_span(),
        );

        Ok(())
    }
}

//! Remote enricher contract.

use async_trait::async_trait;
use spotter_models::EnrichedObject;
use spotter_vision::Frame;

use crate::cancel::CancelToken;
use crate::error::EnrichResult;

/// One identification request.
#[derive(Debug, Clone)]
pub struct EnrichRequest {
    /// Frames to send, oldest first. Results are attributed to the last one.
    pub frames: Vec<Frame>,
    /// Names of items already found in this session
    pub context: Vec<String>,
}

impl EnrichRequest {
    pub fn single(frame: Frame) -> Self {
        Self {
            frames: vec![frame],
            context: Vec::new(),
        }
    }

    pub fn batch(frames: Vec<Frame>) -> Self {
        Self {
            frames,
            context: Vec::new(),
        }
    }

    pub fn with_context(mut self, context: Vec<String>) -> Self {
        self.context = context;
        self
    }

    /// Frame the results are stamped with.
    pub fn anchor(&self) -> Option<&Frame> {
        self.frames.last()
    }
}

/// A remote vision-language identifier.
#[async_trait]
pub trait RemoteEnricher: Send + Sync {
    /// Provider name for logs.
    fn name(&self) -> &str;

    /// Identify objects in the request's frames.
    ///
    /// Implementations check `cancel` before any network I/O starts and
    /// return [`EnrichError::Cancelled`](crate::EnrichError::Cancelled) if it
    /// is set. A request already on the wire runs to completion.
    async fn identify(
        &self,
        request: &EnrichRequest,
        cancel: &CancelToken,
    ) -> EnrichResult<Vec<EnrichedObject>>;
}

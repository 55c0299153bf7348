//! One-call-at-a-time admission for a logical stream of remote calls.

use std::sync::Arc;

use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// Admits a submission only when no other call is in flight. Rejected
/// submissions are dropped by the caller, never queued.
#[derive(Debug, Clone)]
pub struct InFlightGate {
    semaphore: Arc<Semaphore>,
}

/// Held for the duration of an admitted call.
#[derive(Debug)]
pub struct InFlightPermit {
    _permit: OwnedSemaphorePermit,
}

impl InFlightGate {
    pub fn new() -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(1)),
        }
    }

    /// Try to start a call. `None` when one is already in flight.
    pub fn try_enter(&self) -> Option<InFlightPermit> {
        Arc::clone(&self.semaphore)
            .try_acquire_owned()
            .ok()
            .map(|permit| InFlightPermit { _permit: permit })
    }

    pub fn is_busy(&self) -> bool {
        self.semaphore.available_permits() == 0
    }
}

impl Default for InFlightGate {
    fn default() -> Self {
        Self::new()
    }
}

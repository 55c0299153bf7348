//! Run progress reporting.

use tokio::sync::mpsc;

/// Progress update for a pipeline run.
#[derive(Debug, Clone, PartialEq)]
pub struct RunProgress {
    /// Completed share of sampled frames, in [0, 1]
    pub fraction: f64,
    pub status: String,
}

/// Non-blocking progress sender. Updates are dropped when the receiver lags.
#[derive(Debug, Clone)]
pub struct ProgressSender {
    tx: mpsc::Sender<RunProgress>,
}

impl ProgressSender {
    pub fn new(tx: mpsc::Sender<RunProgress>) -> Self {
        Self { tx }
    }

    /// Create a sender and its receiver.
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<RunProgress>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self::new(tx), rx)
    }

    pub fn send(&self, fraction: f64, status: impl Into<String>) {
        let _ = self.tx.try_send(RunProgress {
            fraction: fraction.clamp(0.0, 1.0),
            status: status.into(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_send_never_blocks() {
        let (sender, mut rx) = ProgressSender::channel(1);
        sender.send(0.5, "half");
        sender.send(2.0, "dropped, channel full");

        let first = rx.try_recv().unwrap();
        assert_eq!(first.status, "half");
        assert!(rx.try_recv().is_err());

        sender.send(2.0, "done");
        assert_eq!(rx.try_recv().unwrap().fraction, 1.0);
    }
}

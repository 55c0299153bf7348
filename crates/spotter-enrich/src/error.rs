//! Remote enricher error types.

use std::time::Duration;

use spotter_models::SkipReason;
use thiserror::Error;

pub type EnrichResult<T> = Result<T, EnrichError>;

/// Errors from a remote enrichment call. All of them are non-fatal to a run;
/// the frame is skipped and the reason counted.
#[derive(Debug, Error)]
pub enum EnrichError {
    #[error("Remote call timed out after {}ms", .0.as_millis())]
    Timeout(Duration),

    #[error("Remote service returned {status}: {body}")]
    HttpStatus { status: u16, body: String },

    #[error("Unparseable response: {0}")]
    Unparseable(String),

    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Image encoding failed: {0}")]
    Encoding(String),

    #[error("Remote call cancelled before submission")]
    Cancelled,
}

impl EnrichError {
    pub fn unparseable(message: impl Into<String>) -> Self {
        Self::Unparseable(message.into())
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, EnrichError::Cancelled)
    }

    /// Skip counter this failure is recorded under. Callers should check
    /// [`is_cancelled`](Self::is_cancelled) first; a cancelled call is not a skip.
    pub fn skip_reason(&self) -> SkipReason {
        match self {
            EnrichError::Timeout(_) => SkipReason::AdapterTimeout,
            EnrichError::HttpStatus { .. } => SkipReason::AdapterHttpError,
            EnrichError::Unparseable(_) => SkipReason::AdapterParseFailure,
            EnrichError::Transport(e) if e.is_timeout() => SkipReason::AdapterTimeout,
            EnrichError::Transport(_)
            | EnrichError::Config(_)
            | EnrichError::Encoding(_)
            | EnrichError::Cancelled => SkipReason::AdapterTransport,
        }
    }

    /// Short label for metrics and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            EnrichError::Cancelled => "cancelled",
            other => other.skip_reason().as_str(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_skip_reason_mapping() {
        assert_eq!(
            EnrichError::Timeout(Duration::from_secs(10)).skip_reason(),
            SkipReason::AdapterTimeout
        );
        assert_eq!(
            EnrichError::HttpStatus {
                status: 503,
                body: String::new()
            }
            .skip_reason(),
            SkipReason::AdapterHttpError
        );
        assert_eq!(
            EnrichError::unparseable("{oops").skip_reason(),
            SkipReason::AdapterParseFailure
        );
        assert_eq!(
            EnrichError::config("missing key").skip_reason(),
            SkipReason::AdapterTransport
        );
    }

    #[test]
    fn test_cancelled_kind() {
        assert!(EnrichError::Cancelled.is_cancelled());
        assert_eq!(EnrichError::Cancelled.kind(), "cancelled");
        assert!(!EnrichError::Timeout(Duration::from_secs(1)).is_cancelled());
    }

    #[test]
    fn test_display() {
        let err = EnrichError::Timeout(Duration::from_millis(1500));
        assert_eq!(err.to_string(), "Remote call timed out after 1500ms");
    }
}

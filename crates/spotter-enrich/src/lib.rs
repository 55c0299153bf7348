//! Remote enrichment adapter for Spotter.
//!
//! Sends frames to a vision-language model and turns its free-form answer
//! into [`spotter_models::EnrichedObject`]s. Every call has a timeout, and
//! callers use [`InFlightGate`] to keep at most one call per stream in flight.

pub mod cancel;
pub mod client;
pub mod enricher;
pub mod error;
pub mod gate;
pub mod metrics;
pub mod parser;
pub mod prompt;
pub mod types;

pub use cancel::CancelToken;
pub use client::{EnricherConfig, GeminiEnricher};
pub use enricher::{EnrichRequest, RemoteEnricher};
pub use error::{EnrichError, EnrichResult};
pub use gate::{InFlightGate, InFlightPermit};
pub use parser::parse_response;

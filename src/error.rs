//! Error taxonomy for the ingestion pipeline and aggregation engine.
//!
//! Mirrors the failure modes called out by the read/ingest API contract: caller input
//! errors surface as [`AggregatorError::BadRequest`], capacity exhaustion as
//! [`AggregatorError::Backpressure`], internal faults (callback panics, unexpected state)
//! as [`AggregatorError::Internal`], and orderly termination as [`AggregatorError::Shutdown`].

use thiserror::Error;

/// Errors surfaced by the ingestion and aggregation core.
#[derive(Debug, Error)]
pub enum AggregatorError {
    /// Malformed input: missing required fields, oversize batch, invalid JSON.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// The ingress queue is at capacity; the caller should retry with backoff.
    #[error("backpressure: queue is full")]
    Backpressure,

    /// An internal fault occurred (callback panic, unexpected state). Always recovered
    /// internally; never expected to reach a caller, but kept typed for tests and logging.
    #[error("internal error: {0}")]
    Internal(String),

    /// The aggregator is shutting down and can no longer accept work.
    #[error("aggregator is shutting down")]
    Shutdown,
}

/// Convenience alias for fallible operations within this crate.
pub type Result<T> = std::result::Result<T, AggregatorError>;

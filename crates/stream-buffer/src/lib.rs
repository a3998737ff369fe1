//! Time-Bounded Stream Buffer
//!
//! Maintains a sliding window of opaque byte frames, jointly bounded by a
//! maximum frame count (ring capacity) and a maximum age (retention
//! window). Producers feed payloads through a bounded ingress mailbox; a
//! single worker task owns the ring, trims aged frames after every
//! ingestion, and services deep-copy snapshot requests on demand. Built
//! for applications that answer "what happened in the last N seconds?".

mod config;
mod engine;
mod frame;
mod metrics;
mod ring;

pub use config::StreamBufferConfig;
pub use engine::{InputSink, StreamBuffer};
pub use frame::{Frame, Snapshot};
pub use metrics::Metrics;

use thiserror::Error;

/// Stream buffer error types
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StreamBufferError {
    /// The engine has not been started, or has been permanently stopped.
    #[error("stream buffer is not running")]
    NotRunning,

    /// The caller's deadline expired before the snapshot was delivered.
    #[error("snapshot request cancelled")]
    Cancelled,
}

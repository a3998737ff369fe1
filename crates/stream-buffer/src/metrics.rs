//! Engine metrics

use serde::Serialize;
use std::sync::atomic::AtomicU64;
use std::time::{Duration, SystemTime};

/// Monotonic counters shared between the worker, the input sinks, and
/// metric readers. Read with plain atomic loads, no lock required.
#[derive(Debug, Default)]
pub(crate) struct Counters {
    /// Total frames ingested by the worker.
    pub(crate) frames_processed: AtomicU64,
    /// Frames refused at the ingress mailbox boundary.
    pub(crate) frames_dropped: AtomicU64,
    /// Frames evicted because they aged past the window.
    pub(crate) frames_trimmed: AtomicU64,
    /// Snapshots successfully delivered to a requester.
    pub(crate) snapshots_sent: AtomicU64,
}

/// Point-in-time performance statistics for a
/// [`StreamBuffer`](crate::StreamBuffer).
///
/// Counters never decrease and cannot be reset.
#[derive(Debug, Clone, Serialize)]
pub struct Metrics {
    /// Total frames ingested by the worker.
    pub frames_processed: u64,
    /// Frames refused at the ingress mailbox boundary.
    pub frames_dropped: u64,
    /// Frames evicted because they aged past the window.
    pub frames_trimmed: u64,
    /// Snapshots successfully delivered to a requester.
    pub snapshots_sent: u64,
    /// Current fill ratio, 0.0 to 1.0.
    pub buffer_utilization: f64,
    /// Time since the engine was constructed.
    pub uptime: Duration,
    /// Frames currently retained.
    pub frame_count: usize,
    /// Ring capacity in frames.
    pub capacity: usize,
    /// Configured retention window.
    pub window_duration: Duration,
    /// Timestamp of the most recent ingestion, or `None`.
    pub last_frame_time: Option<SystemTime>,
}

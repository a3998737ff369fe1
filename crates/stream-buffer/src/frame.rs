//! Frame and snapshot types

use serde::{Deserialize, Serialize};
use std::time::{Duration, SystemTime};

/// One retained record: an owned payload plus ingestion metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Frame {
    /// Opaque payload bytes (may be empty).
    pub payload: Vec<u8>,
    /// Wall-clock time of ingestion.
    pub timestamp: SystemTime,
    /// Monotonic id assigned at ingestion, never reused.
    pub sequence: u64,
}

/// Immutable point-in-time copy of the ring contents.
///
/// Frames are ordered oldest to newest and own their payloads exclusively:
/// nothing in a snapshot aliases ring memory, so the caller may hold it for
/// as long as it likes while ingestion continues.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    /// Retained frames, oldest first.
    pub frames: Vec<Frame>,
    /// Timestamp of the first frame, or `None` when empty.
    pub start_time: Option<SystemTime>,
    /// Timestamp of the last frame, or `None` when empty.
    pub end_time: Option<SystemTime>,
    /// When the snapshot was constructed.
    pub created_at: SystemTime,
}

impl Snapshot {
    /// Number of frames captured.
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    /// Whether the snapshot captured no frames.
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Time spanned between the first and last frame.
    pub fn duration(&self) -> Duration {
        match (self.start_time, self.end_time) {
            (Some(start), Some(end)) => end.duration_since(start).unwrap_or(Duration::ZERO),
            _ => Duration::ZERO,
        }
    }
}

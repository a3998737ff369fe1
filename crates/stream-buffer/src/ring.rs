//! Circular frame storage with age-based trimming

use buffer_pool::BufferPool;
use std::time::{Duration, SystemTime};

use crate::frame::{Frame, Snapshot};

/// Fixed-capacity ring of frames.
///
/// `head` is the next write index; the `count` occupied slots immediately
/// precede it in ring order, so the logically-oldest frame sits at
/// `(head - count) mod capacity`. Only the engine worker mutates the ring;
/// readers take the shared side of the engine lock.
pub(crate) struct FrameRing {
    slots: Vec<Option<Frame>>,
    head: usize,
    count: usize,
    next_seq: u64,
    window: Duration,
    last_frame_time: Option<SystemTime>,
}

impl FrameRing {
    pub(crate) fn new(capacity: usize, window: Duration) -> Self {
        Self {
            slots: (0..capacity).map(|_| None).collect(),
            head: 0,
            count: 0,
            next_seq: 0,
            window,
            last_frame_time: None,
        }
    }

    /// Number of frames currently retained.
    pub(crate) fn len(&self) -> usize {
        self.count
    }

    /// Timestamp of the most recent ingestion, or `None`.
    pub(crate) fn last_frame_time(&self) -> Option<SystemTime> {
        self.last_frame_time
    }

    /// Ingest one payload and trim aged frames.
    ///
    /// When the ring is saturated the slot at `head` holds the oldest frame;
    /// its payload goes back to the pool before the overwrite. The payload
    /// is copied into pooled storage, so the caller's buffer is never
    /// retained. Returns the number of frames trimmed by age.
    pub(crate) fn ingest(&mut self, data: &[u8], now: SystemTime, pool: &BufferPool) -> usize {
        let capacity = self.slots.len();

        if self.count == capacity {
            if let Some(evicted) = self.slots[self.head].take() {
                pool.release(evicted.payload);
            }
        }

        let mut payload = pool.acquire();
        payload.extend_from_slice(data);

        self.slots[self.head] = Some(Frame {
            payload,
            timestamp: now,
            sequence: self.next_seq,
        });
        self.next_seq += 1;
        self.head = (self.head + 1) % capacity;
        if self.count < capacity {
            self.count += 1;
        }
        self.last_frame_time = Some(now);

        self.trim(now, pool)
    }

    /// Release frames strictly older than `now - window`, oldest first,
    /// stopping at the first frame still inside the window. A frame whose
    /// age is exactly the window survives.
    fn trim(&mut self, now: SystemTime, pool: &BufferPool) -> usize {
        let capacity = self.slots.len();
        let Some(cutoff) = now.checked_sub(self.window) else {
            return 0;
        };

        let mut trimmed = 0;
        while self.count > 0 {
            let oldest = (self.head + capacity - self.count) % capacity;
            let expired = matches!(&self.slots[oldest], Some(frame) if frame.timestamp < cutoff);
            if !expired {
                break;
            }
            if let Some(frame) = self.slots[oldest].take() {
                pool.release(frame.payload);
            }
            self.count -= 1;
            trimmed += 1;
        }
        trimmed
    }

    /// Deep-copy the current contents, oldest to newest.
    ///
    /// Every payload in the result is drawn from the pool and copied, so a
    /// snapshot never aliases ring memory.
    pub(crate) fn snapshot(&self, now: SystemTime, pool: &BufferPool) -> Snapshot {
        if self.count == 0 {
            return Snapshot {
                frames: Vec::new(),
                start_time: None,
                end_time: None,
                created_at: now,
            };
        }

        let capacity = self.slots.len();
        let oldest = (self.head + capacity - self.count) % capacity;

        let mut frames = Vec::with_capacity(self.count);
        for i in 0..self.count {
            let idx = (oldest + i) % capacity;
            if let Some(src) = &self.slots[idx] {
                let mut payload = pool.acquire();
                payload.extend_from_slice(&src.payload);
                frames.push(Frame {
                    payload,
                    timestamp: src.timestamp,
                    sequence: src.sequence,
                });
            }
        }

        Snapshot {
            start_time: frames.first().map(|f| f.timestamp),
            end_time: frames.last().map(|f| f.timestamp),
            created_at: now,
            frames,
        }
    }

    /// Release every retained payload back to the pool and clear the ring.
    pub(crate) fn drain(&mut self, pool: &BufferPool) {
        for slot in &mut self.slots {
            if let Some(frame) = slot.take() {
                pool.release(frame.payload);
            }
        }
        self.count = 0;
    }
}

//! Recyclable Byte Buffer Pool
//!
//! Amortizes allocation cost for payloads of roughly consistent size.
//! Buffers come back from the pool with zero length and their capacity
//! intact, so a steady-state producer stops allocating once the pool has
//! warmed up.

use parking_lot::Mutex;
use tracing::trace;

/// Default threshold above which buffers are not recycled (8 MiB).
pub const DEFAULT_MAX_RECYCLE_SIZE: usize = 8 * 1024 * 1024;

/// Pool of reusable byte buffers with a size-capped freelist.
///
/// The pool is an opportunistic cache, not a strict freelist: `acquire`
/// falls back to a fresh allocation sized by `size_hint` whenever the pool
/// is empty, and `release` keeps a buffer only while its capacity is at
/// most `max_recycle_size`, so a single oversized payload cannot pin
/// memory for the lifetime of the pool.
pub struct BufferPool {
    size_hint: usize,
    max_recycle_size: usize,
    free: Mutex<Vec<Vec<u8>>>,
}

impl BufferPool {
    /// Create a pool whose fresh allocations carry `size_hint` capacity.
    pub fn new(size_hint: usize) -> Self {
        Self {
            size_hint,
            max_recycle_size: DEFAULT_MAX_RECYCLE_SIZE,
            free: Mutex::new(Vec::new()),
        }
    }

    /// Set the maximum capacity a buffer may have and still be recycled.
    /// Zero falls back to the default.
    pub fn with_max_recycle_size(mut self, max: usize) -> Self {
        if max > 0 {
            self.max_recycle_size = max;
        }
        self
    }

    /// Take a buffer from the pool, or allocate one if the pool is empty.
    /// The returned buffer always has zero length.
    pub fn acquire(&self) -> Vec<u8> {
        self.free
            .lock()
            .pop()
            .unwrap_or_else(|| Vec::with_capacity(self.size_hint))
    }

    /// Return a buffer to the pool for reuse.
    ///
    /// Buffers with zero capacity have nothing worth keeping and are
    /// dropped, as are buffers larger than the recycling threshold.
    pub fn release(&self, mut buf: Vec<u8>) {
        let capacity = buf.capacity();
        if capacity == 0 {
            return;
        }
        if capacity > self.max_recycle_size {
            trace!(capacity, "dropping oversized buffer");
            return;
        }
        buf.clear();
        self.free.lock().push(buf);
    }

    /// Number of buffers currently sitting in the freelist.
    pub fn available(&self) -> usize {
        self.free.lock().len()
    }

    /// Capacity given to fresh allocations.
    pub fn size_hint(&self) -> usize {
        self.size_hint
    }

    /// Maximum capacity a released buffer may have and still be kept.
    pub fn max_recycle_size(&self) -> usize {
        self.max_recycle_size
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_acquire_allocates_with_hint() {
        let pool = BufferPool::new(64);
        let buf = pool.acquire();
        assert_eq!(buf.len(), 0);
        assert!(buf.capacity() >= 64);
    }

    #[test]
    fn test_release_and_reuse_preserves_capacity() {
        let pool = BufferPool::new(16);

        let mut buf = pool.acquire();
        buf.extend_from_slice(&[0xAB; 100]);
        let capacity = buf.capacity();
        pool.release(buf);
        assert_eq!(pool.available(), 1);

        let reused = pool.acquire();
        assert_eq!(reused.len(), 0, "recycled buffer must come back empty");
        assert_eq!(reused.capacity(), capacity);
        assert_eq!(pool.available(), 0);
    }

    #[test]
    fn test_oversized_buffer_not_recycled() {
        let pool = BufferPool::new(16).with_max_recycle_size(128);

        let mut big = pool.acquire();
        big.reserve(1024);
        pool.release(big);
        assert_eq!(pool.available(), 0, "oversized buffer must be dropped");

        let mut small = pool.acquire();
        small.extend_from_slice(&[1, 2, 3]);
        pool.release(small);
        assert_eq!(pool.available(), 1);
    }

    #[test]
    fn test_release_at_threshold_is_kept() {
        let pool = BufferPool::new(64).with_max_recycle_size(128);
        let buf = pool.acquire();
        assert!(buf.capacity() >= 64);
        assert!(buf.capacity() <= 128);
        pool.release(buf);
        assert_eq!(pool.available(), 1);
    }

    #[test]
    fn test_zero_capacity_release_is_noop() {
        let pool = BufferPool::new(16);
        pool.release(Vec::new());
        assert_eq!(pool.available(), 0);
    }

    #[test]
    fn test_zero_max_recycle_falls_back_to_default() {
        let pool = BufferPool::new(16).with_max_recycle_size(0);
        assert_eq!(pool.max_recycle_size(), DEFAULT_MAX_RECYCLE_SIZE);
    }

    #[test]
    fn test_multiple_cycles() {
        let pool = BufferPool::new(32).with_max_recycle_size(256);

        for round in 0..10 {
            let mut buf = pool.acquire();
            assert_eq!(buf.len(), 0);
            buf.extend((0..100).map(|i| (round * i) as u8));
            pool.release(buf);
        }
        // Sequential rounds reuse the same buffer.
        assert_eq!(pool.available(), 1);
    }

    #[test]
    fn test_cross_thread_acquire_release() {
        let pool = Arc::new(BufferPool::new(64));

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let pool = Arc::clone(&pool);
                thread::spawn(move || {
                    for _ in 0..100 {
                        let mut buf = pool.acquire();
                        buf.extend_from_slice(&[0x55; 32]);
                        pool.release(buf);
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }
        assert!(pool.available() >= 1);
        assert!(pool.available() <= 4);
    }
}

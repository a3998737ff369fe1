//! Event loop and control plane
//!
//! A single worker task is the sole ring mutator. Producers and snapshot
//! consumers reach it only through bounded mailboxes; metrics readers take
//! the shared side of the ring lock. Lifecycle is `created → running →
//! final_stopped`, and the terminal state cannot be left.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime};

use buffer_pool::BufferPool;
use parking_lot::{Mutex, RwLock};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time;
use tracing::{debug, info, warn};

use crate::config::StreamBufferConfig;
use crate::frame::Snapshot;
use crate::metrics::{Counters, Metrics};
use crate::ring::FrameRing;
use crate::StreamBufferError;

/// Snapshot-request mailbox depth.
const SNAPSHOT_QUEUE_DEPTH: usize = 10;

/// A queued snapshot request. The receiver half of `reply` doubles as the
/// cancellation signal: once the requester drops it, the worker discards
/// or reclaims instead of delivering.
struct SnapshotRequest {
    reply: oneshot::Sender<Snapshot>,
}

/// State shared between the engine handle, the worker task, and input
/// sinks.
struct Shared {
    config: StreamBufferConfig,
    ring: RwLock<FrameRing>,
    pool: Arc<BufferPool>,
    counters: Counters,
    running: AtomicBool,
    final_stopped: AtomicBool,
    created_at: Instant,
}

/// Receiver ends handed to the worker on `start`.
struct Mailboxes {
    ingress_rx: mpsc::Receiver<Vec<u8>>,
    snap_rx: mpsc::Receiver<SnapshotRequest>,
    shutdown_rx: watch::Receiver<bool>,
}

/// Time-bounded in-memory ring buffer for opaque byte frames.
///
/// Construction is inert; call [`start`](Self::start) to spawn the worker
/// and [`stop`](Self::stop) to shut it down permanently. All methods take
/// `&self`, so the engine can be shared behind an `Arc`.
pub struct StreamBuffer {
    shared: Arc<Shared>,
    ingress_tx: mpsc::Sender<Vec<u8>>,
    snap_tx: mpsc::Sender<SnapshotRequest>,
    shutdown_tx: watch::Sender<bool>,
    mailboxes: Mutex<Option<Mailboxes>>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl StreamBuffer {
    /// Create an engine from `config`. Zero-valued fields fall back to
    /// their defaults. No background activity until [`start`](Self::start).
    pub fn new(config: StreamBufferConfig) -> Self {
        let config = config.normalized();

        let pool = Arc::new(
            BufferPool::new(config.frame_size).with_max_recycle_size(config.max_recycle_size),
        );
        let ring = FrameRing::new(config.capacity, config.window);

        let (ingress_tx, ingress_rx) = mpsc::channel(config.ingress_depth);
        let (snap_tx, snap_rx) = mpsc::channel(SNAPSHOT_QUEUE_DEPTH);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        Self {
            shared: Arc::new(Shared {
                config,
                ring: RwLock::new(ring),
                pool,
                counters: Counters::default(),
                running: AtomicBool::new(false),
                final_stopped: AtomicBool::new(false),
                created_at: Instant::now(),
            }),
            ingress_tx,
            snap_tx,
            shutdown_tx,
            mailboxes: Mutex::new(Some(Mailboxes {
                ingress_rx,
                snap_rx,
                shutdown_rx,
            })),
            worker: Mutex::new(None),
        }
    }

    /// Create an engine with the default configuration.
    pub fn with_defaults() -> Self {
        Self::new(StreamBufferConfig::default())
    }

    /// Spawn the worker task. Idempotent; a no-op once the engine has been
    /// stopped.
    pub fn start(&self) {
        if self.shared.final_stopped.load(Ordering::Acquire) {
            return;
        }
        if self
            .shared
            .running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return;
        }

        let Some(mailboxes) = self.mailboxes.lock().take() else {
            self.shared.running.store(false, Ordering::Release);
            return;
        };

        info!(
            capacity = self.shared.config.capacity,
            window_ms = self.shared.config.window.as_millis() as u64,
            "starting stream buffer"
        );

        let worker = Worker {
            shared: Arc::clone(&self.shared),
            ingress_rx: mailboxes.ingress_rx,
            snap_rx: mailboxes.snap_rx,
            shutdown_rx: mailboxes.shutdown_rx,
        };
        *self.worker.lock() = Some(tokio::spawn(worker.run()));
    }

    /// Stop the engine permanently.
    ///
    /// Signals the worker, waits for it to finish its current iteration,
    /// then releases every retained payload back to the pool. Idempotent;
    /// once stopped the engine cannot be restarted.
    pub async fn stop(&self) {
        if self
            .shared
            .running
            .compare_exchange(true, false, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return;
        }
        self.shared.final_stopped.store(true, Ordering::Release);
        let _ = self.shutdown_tx.send(true);

        let handle = self.worker.lock().take();
        if let Some(handle) = handle {
            if let Err(err) = handle.await {
                warn!("stream buffer worker task failed: {}", err);
            }
        }

        let released = {
            let mut ring = self.shared.ring.write();
            let released = ring.len();
            ring.drain(&self.shared.pool);
            released
        };
        info!(released, "stream buffer stopped");
    }

    /// Whether the engine is running and has not been permanently stopped.
    pub fn is_running(&self) -> bool {
        self.shared.running.load(Ordering::Acquire)
            && !self.shared.final_stopped.load(Ordering::Acquire)
    }

    /// Write-only handle to the ingress mailbox. Cloneable and usable from
    /// any task or thread.
    pub fn input_sink(&self) -> InputSink {
        InputSink {
            tx: self.ingress_tx.clone(),
            shared: Arc::clone(&self.shared),
        }
    }

    /// Capture a deep-copy snapshot of the current buffer contents.
    ///
    /// `wait` bounds the whole exchange: enqueueing the request and
    /// awaiting the worker's reply. When the deadline trips first the
    /// request is cancelled; if the worker has already built the snapshot
    /// it reclaims every payload back to the pool, and `snapshots_sent`
    /// is not incremented.
    ///
    /// # Errors
    ///
    /// [`StreamBufferError::NotRunning`] before `start` or after `stop`;
    /// [`StreamBufferError::Cancelled`] when `wait` expires first.
    pub async fn snapshot(&self, wait: Duration) -> Result<Snapshot, StreamBufferError> {
        if !self.is_running() {
            return Err(StreamBufferError::NotRunning);
        }

        let (reply_tx, reply_rx) = oneshot::channel();
        let request = SnapshotRequest { reply: reply_tx };

        let exchange = async {
            self.snap_tx
                .send(request)
                .await
                .map_err(|_| StreamBufferError::NotRunning)?;
            reply_rx.await.map_err(|_| StreamBufferError::NotRunning)
        };

        match time::timeout(wait, exchange).await {
            Ok(result) => result,
            Err(_) => Err(StreamBufferError::Cancelled),
        }
    }

    /// Current performance statistics. Takes only the shared side of the
    /// ring lock.
    pub fn metrics(&self) -> Metrics {
        let (frame_count, last_frame_time) = {
            let ring = self.shared.ring.read();
            (ring.len(), ring.last_frame_time())
        };

        let capacity = self.shared.config.capacity;
        let buffer_utilization = if capacity > 0 {
            frame_count as f64 / capacity as f64
        } else {
            0.0
        };

        Metrics {
            frames_processed: self.shared.counters.frames_processed.load(Ordering::Relaxed),
            frames_dropped: self.shared.counters.frames_dropped.load(Ordering::Relaxed),
            frames_trimmed: self.shared.counters.frames_trimmed.load(Ordering::Relaxed),
            snapshots_sent: self.shared.counters.snapshots_sent.load(Ordering::Relaxed),
            buffer_utilization,
            uptime: self.shared.created_at.elapsed(),
            frame_count,
            capacity,
            window_duration: self.shared.config.window,
            last_frame_time,
        }
    }
}

/// Write-only handle to the ingress mailbox.
///
/// Payloads are copied into pooled storage on ingestion, so the producer
/// may reuse its source buffer immediately after handoff. Sending after
/// the engine has stopped is allowed; the payload is simply discarded.
#[derive(Clone)]
pub struct InputSink {
    tx: mpsc::Sender<Vec<u8>>,
    shared: Arc<Shared>,
}

impl InputSink {
    /// Non-blocking offer. Returns `false` and counts the payload as
    /// dropped when the mailbox is full or the engine has stopped.
    pub fn try_send(&self, payload: Vec<u8>) -> bool {
        match self.tx.try_send(payload) {
            Ok(()) => true,
            Err(_) => {
                self.shared
                    .counters
                    .frames_dropped
                    .fetch_add(1, Ordering::Relaxed);
                false
            }
        }
    }

    /// Blocking send: waits for mailbox space. Returns `false` only when
    /// the engine has stopped and the payload was discarded.
    pub async fn send(&self, payload: Vec<u8>) -> bool {
        self.tx.send(payload).await.is_ok()
    }
}

/// The single worker: sole ring mutator, multiplexing ingress frames,
/// snapshot requests, and shutdown.
struct Worker {
    shared: Arc<Shared>,
    ingress_rx: mpsc::Receiver<Vec<u8>>,
    snap_rx: mpsc::Receiver<SnapshotRequest>,
    shutdown_rx: watch::Receiver<bool>,
}

impl Worker {
    async fn run(mut self) {
        debug!("stream buffer worker started");

        loop {
            tokio::select! {
                changed = self.shutdown_rx.changed() => {
                    if changed.is_err() || *self.shutdown_rx.borrow() {
                        break;
                    }
                }
                payload = self.ingress_rx.recv() => {
                    match payload {
                        Some(data) => self.ingest(data),
                        None => break,
                    }
                }
                request = self.snap_rx.recv() => {
                    match request {
                        Some(request) => self.serve_snapshot(request),
                        None => break,
                    }
                }
            }
        }

        self.shared.running.store(false, Ordering::Release);
        debug!("stream buffer worker exited");
    }

    /// Run the ingestion algorithm for one payload: overwrite on capacity
    /// pressure, copy into pooled storage, trim by age.
    fn ingest(&self, data: Vec<u8>) {
        let now = SystemTime::now();
        let trimmed = {
            let mut ring = self.shared.ring.write();
            ring.ingest(&data, now, &self.shared.pool)
        };

        self.shared
            .counters
            .frames_processed
            .fetch_add(1, Ordering::Relaxed);
        if trimmed > 0 {
            self.shared
                .counters
                .frames_trimmed
                .fetch_add(trimmed as u64, Ordering::Relaxed);
            debug!(trimmed, "trimmed frames past the retention window");
        }
    }

    /// Build and deliver one snapshot, honoring cancellation before the
    /// build and reclaiming payloads when delivery fails after it.
    fn serve_snapshot(&self, request: SnapshotRequest) {
        if request.reply.is_closed() {
            debug!("snapshot request already cancelled, discarding");
            return;
        }

        let snapshot = {
            let ring = self.shared.ring.read();
            ring.snapshot(SystemTime::now(), &self.shared.pool)
        };

        match request.reply.send(snapshot) {
            Ok(()) => {
                self.shared
                    .counters
                    .snapshots_sent
                    .fetch_add(1, Ordering::Relaxed);
            }
            Err(abandoned) => {
                warn!(
                    frames = abandoned.frames.len(),
                    "snapshot abandoned by requester, reclaiming payloads"
                );
                for frame in abandoned.frames {
                    self.shared.pool.release(frame.payload);
                }
            }
        }
    }
}

//! Stream Buffer Demo
//!
//! Feeds synthetic frames into a stream buffer at a steady rate, captures
//! periodic snapshots, exports each capture to disk, and reports buffer
//! metrics on exit.

mod export;

use std::path::PathBuf;
use std::time::Duration;

use stream_buffer::{StreamBuffer, StreamBufferConfig};
use tokio::time;
use tracing::{error, info, warn, Level};
use tracing_subscriber::FmtSubscriber;

/// Synthetic producer rate.
const FRAME_RATE: u32 = 30;

/// How long the producer runs.
const RUN_DURATION: Duration = Duration::from_secs(20);

/// Pause between snapshot captures.
const CAPTURE_INTERVAL: Duration = Duration::from_secs(5);

/// Deadline for each snapshot request.
const CAPTURE_WAIT: Duration = Duration::from_millis(500);

/// Filler bytes appended to each frame header (~100 KiB payloads).
const FRAME_FILL: usize = 100 * 1024;

#[tokio::main]
async fn main() {
    init_logging();

    info!("=== Stream Buffer Demo v{} ===", env!("CARGO_PKG_VERSION"));

    let buffer = StreamBuffer::new(StreamBufferConfig {
        window: Duration::from_secs(10),
        capacity: 600,
        frame_size: FRAME_FILL + 64,
        ..StreamBufferConfig::default()
    });
    buffer.start();

    let sink = buffer.input_sink();
    let producer = tokio::spawn(async move {
        let total = FRAME_RATE as usize * RUN_DURATION.as_secs() as usize;
        let mut ticker = time::interval(Duration::from_secs(1) / FRAME_RATE);
        for n in 0..total {
            ticker.tick().await;
            if !sink.try_send(synthetic_frame(n)) {
                warn!(frame = n, "ingress mailbox full, frame dropped");
            }
        }
        info!(frames = total, "producer finished");
    });

    let out_dir = PathBuf::from("out");
    for capture in 1..=3u32 {
        time::sleep(CAPTURE_INTERVAL).await;

        match buffer.snapshot(CAPTURE_WAIT).await {
            Ok(snapshot) => {
                info!(
                    capture,
                    frames = snapshot.len(),
                    span_ms = snapshot.duration().as_millis() as u64,
                    "captured snapshot"
                );
                let dir = out_dir.join(format!("capture-{capture:02}"));
                match export::write_snapshot(&dir, &snapshot) {
                    Ok(report) => info!(
                        files = report.files,
                        bytes = report.bytes,
                        "snapshot exported to {}",
                        report.dir.display()
                    ),
                    Err(err) => error!("snapshot export failed: {}", err),
                }
            }
            Err(err) => warn!("snapshot request failed: {}", err),
        }
    }

    if let Err(err) = producer.await {
        error!("producer task failed: {}", err);
    }
    buffer.stop().await;

    let metrics = buffer.metrics();
    info!(
        frames_processed = metrics.frames_processed,
        frames_dropped = metrics.frames_dropped,
        frames_trimmed = metrics.frames_trimmed,
        snapshots_sent = metrics.snapshots_sent,
        utilization_pct = (metrics.buffer_utilization * 100.0) as u64,
        uptime_ms = metrics.uptime.as_millis() as u64,
        "final metrics"
    );
}

/// Initialize logging
fn init_logging() {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .with_target(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .expect("Failed to set tracing subscriber");
}

/// Build one synthetic payload: a readable header followed by
/// deterministic filler bytes standing in for opaque frame content.
fn synthetic_frame(n: usize) -> Vec<u8> {
    let header = format!("frame:{n};");
    let mut payload = Vec::with_capacity(header.len() + FRAME_FILL);
    payload.extend_from_slice(header.as_bytes());
    payload.extend((0..FRAME_FILL).map(|i| ((n + i) % 251) as u8));
    payload
}

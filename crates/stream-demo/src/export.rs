//! Snapshot disk export
//!
//! Writes a captured snapshot as one file per frame payload plus a JSON
//! manifest describing the capture.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::Serialize;
use stream_buffer::Snapshot;

/// Summary of a completed export.
pub struct ExportReport {
    /// Directory the snapshot was written to.
    pub dir: PathBuf,
    /// Files written, payloads plus the manifest.
    pub files: usize,
    /// Total payload bytes written.
    pub bytes: usize,
}

/// Manifest written alongside the exported payloads.
#[derive(Debug, Serialize)]
struct Manifest {
    frame_count: usize,
    first_sequence: Option<u64>,
    last_sequence: Option<u64>,
    start_time_ms: Option<u64>,
    end_time_ms: Option<u64>,
    created_at_ms: u64,
    payload_bytes: usize,
}

/// Write each frame payload to `dir` as `frame-<sequence>.bin`, plus a
/// `manifest.json` describing the capture. The directory is created if it
/// does not exist.
pub fn write_snapshot(dir: &Path, snapshot: &Snapshot) -> io::Result<ExportReport> {
    fs::create_dir_all(dir)?;

    let mut bytes = 0;
    for frame in &snapshot.frames {
        let path = dir.join(format!("frame-{:06}.bin", frame.sequence));
        fs::write(&path, &frame.payload)?;
        bytes += frame.payload.len();
    }

    let manifest = Manifest {
        frame_count: snapshot.len(),
        first_sequence: snapshot.frames.first().map(|f| f.sequence),
        last_sequence: snapshot.frames.last().map(|f| f.sequence),
        start_time_ms: snapshot.start_time.map(unix_millis),
        end_time_ms: snapshot.end_time.map(unix_millis),
        created_at_ms: unix_millis(snapshot.created_at),
        payload_bytes: bytes,
    };
    let json = serde_json::to_vec_pretty(&manifest).map_err(io::Error::other)?;
    fs::write(dir.join("manifest.json"), json)?;

    Ok(ExportReport {
        dir: dir.to_path_buf(),
        files: snapshot.len() + 1,
        bytes,
    })
}

fn unix_millis(time: SystemTime) -> u64 {
    time.duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use stream_buffer::Frame;

    fn sample_snapshot() -> Snapshot {
        let start = SystemTime::UNIX_EPOCH + Duration::from_secs(1_700_000_000);
        let end = start + Duration::from_millis(100);
        Snapshot {
            frames: vec![
                Frame {
                    payload: b"first payload".to_vec(),
                    timestamp: start,
                    sequence: 7,
                },
                Frame {
                    payload: b"second payload".to_vec(),
                    timestamp: end,
                    sequence: 8,
                },
            ],
            start_time: Some(start),
            end_time: Some(end),
            created_at: end,
        }
    }

    #[test]
    fn test_write_snapshot_creates_payloads_and_manifest() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("capture");
        let snapshot = sample_snapshot();

        let report = write_snapshot(&dir, &snapshot).unwrap();
        assert_eq!(report.files, 3);
        assert_eq!(report.bytes, b"first payload".len() + b"second payload".len());

        assert_eq!(
            fs::read(dir.join("frame-000007.bin")).unwrap(),
            b"first payload"
        );
        assert_eq!(
            fs::read(dir.join("frame-000008.bin")).unwrap(),
            b"second payload"
        );

        let manifest: serde_json::Value =
            serde_json::from_slice(&fs::read(dir.join("manifest.json")).unwrap()).unwrap();
        assert_eq!(manifest["frame_count"], 2);
        assert_eq!(manifest["first_sequence"], 7);
        assert_eq!(manifest["last_sequence"], 8);
        assert_eq!(manifest["payload_bytes"], 27);
    }

    #[test]
    fn test_write_empty_snapshot() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("empty");
        let snapshot = Snapshot {
            frames: Vec::new(),
            start_time: None,
            end_time: None,
            created_at: SystemTime::now(),
        };

        let report = write_snapshot(&dir, &snapshot).unwrap();
        assert_eq!(report.files, 1);
        assert_eq!(report.bytes, 0);

        let manifest: serde_json::Value =
            serde_json::from_slice(&fs::read(dir.join("manifest.json")).unwrap()).unwrap();
        assert_eq!(manifest["frame_count"], 0);
        assert!(manifest["first_sequence"].is_null());
        assert!(manifest["start_time_ms"].is_null());
    }
}

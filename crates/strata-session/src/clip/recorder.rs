use std::path::{Path, PathBuf};
use std::sync::mpsc::{sync_channel, SyncSender, TrySendError};
use std::sync::Arc;
use std::thread::JoinHandle;

use strata_3d::io::ply::write_ply_binary;

use super::{frame_file_name, ClipError, ClipManifest, MANIFEST_NAME, MANIFEST_VERSION};
use crate::frame::Frame;

// frames buffered between the tick loop and the writer thread
const WRITE_QUEUE_DEPTH: usize = 32;

/// Summary of a finalized clip.
#[derive(Debug, Clone)]
pub struct ClipInfo {
    /// The clip directory.
    pub path: PathBuf,
    /// Number of frames persisted.
    pub frame_count: u64,
    /// Frames dropped because of write failures.
    pub dropped: u64,
}

struct WriterOutcome {
    written: u64,
    dropped: u64,
    timestamps_us: Vec<u64>,
}

/// Records frames into a clip directory through a bounded background queue.
///
/// Appends never block the tick cadence: a full queue or a failed write
/// drops that one frame with a warning and recording continues. Frames are
/// persisted strictly in arrival order; [`finish`](Self::finish) drains the
/// queue and writes the manifest that makes the clip playable.
pub struct ClipRecorder {
    dir: PathBuf,
    sender: Option<SyncSender<Arc<Frame>>>,
    handle: Option<JoinHandle<WriterOutcome>>,
    queue_drops: u64,
}

impl ClipRecorder {
    /// Create a recorder over a fresh clip directory.
    ///
    /// The directory is created when missing (its parent must exist). A
    /// directory that already holds a finalized clip is refused: clips are
    /// write-once.
    pub fn create(dir: impl AsRef<Path>) -> Result<Self, ClipError> {
        let dir = dir.as_ref().to_path_buf();

        if dir.exists() {
            if !dir.is_dir() {
                return Err(ClipError::Unavailable(format!(
                    "{} is not a directory",
                    dir.display()
                )));
            }
            if dir.join(MANIFEST_NAME).exists() {
                return Err(ClipError::Unavailable(format!(
                    "{} already holds a finalized clip",
                    dir.display()
                )));
            }
        } else {
            std::fs::create_dir(&dir).map_err(|e| {
                ClipError::Unavailable(format!("cannot create {}: {e}", dir.display()))
            })?;
        }

        let (sender, receiver) = sync_channel::<Arc<Frame>>(WRITE_QUEUE_DEPTH);

        let writer_dir = dir.clone();
        let handle = std::thread::spawn(move || {
            let mut outcome = WriterOutcome {
                written: 0,
                dropped: 0,
                timestamps_us: Vec::new(),
            };
            while let Ok(frame) = receiver.recv() {
                let path = writer_dir.join(frame_file_name(outcome.written));
                match write_ply_binary(&path, &frame.cloud) {
                    Ok(()) => {
                        outcome.timestamps_us.push(frame.timestamp_us);
                        outcome.written += 1;
                    }
                    Err(e) => {
                        log::warn!(
                            "frame write failed for seq {}, skipping: {e}",
                            frame.seq
                        );
                        outcome.dropped += 1;
                        // leave no partially written record behind
                        let _ = std::fs::remove_file(&path);
                    }
                }
            }
            outcome
        });

        Ok(Self {
            dir,
            sender: Some(sender),
            handle: Some(handle),
            queue_drops: 0,
        })
    }

    /// The clip directory being recorded into.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Queue a frame for persistence without blocking.
    ///
    /// A full queue drops the frame with a warning.
    pub fn append(&mut self, frame: &Arc<Frame>) {
        let Some(sender) = &self.sender else {
            return;
        };
        match sender.try_send(frame.clone()) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                self.queue_drops += 1;
                log::warn!("recording queue full, dropping frame seq {}", frame.seq);
            }
            Err(TrySendError::Disconnected(_)) => {
                log::warn!("recording writer is gone, dropping frame seq {}", frame.seq);
            }
        }
    }

    /// Drain the queue, write the manifest and close the clip.
    pub fn finish(mut self) -> Result<ClipInfo, ClipError> {
        drop(self.sender.take());

        let outcome = match self.handle.take() {
            Some(handle) => handle
                .join()
                .map_err(|_| ClipError::Unavailable("clip writer thread panicked".to_string()))?,
            None => {
                return Err(ClipError::Unavailable(
                    "clip recorder already finished".to_string(),
                ))
            }
        };

        let manifest = ClipManifest {
            format_version: MANIFEST_VERSION,
            frame_count: outcome.written,
            timestamps_us: outcome.timestamps_us,
        };
        let json = serde_json::to_string_pretty(&manifest)?;
        std::fs::write(self.dir.join(MANIFEST_NAME), json)?;

        Ok(ClipInfo {
            path: self.dir.clone(),
            frame_count: outcome.written,
            dropped: outcome.dropped + self.queue_drops,
        })
    }
}

impl Drop for ClipRecorder {
    fn drop(&mut self) {
        // an unfinished recorder still joins its writer; without a manifest
        // the directory stays unplayable
        drop(self.sender.take());
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strata_3d::pointcloud::PointCloud;

    fn frame(seq: u64) -> Arc<Frame> {
        Arc::new(Frame::new(
            seq,
            seq * 2000,
            PointCloud::new(vec![[seq as f64, 0.5, -0.5]], Some(vec![[8, 8, 8]])),
        ))
    }

    #[test]
    fn test_record_and_finish() -> Result<(), ClipError> {
        let tmp = tempfile::tempdir()?;
        let dir = tmp.path().join("clip_a");

        let mut recorder = ClipRecorder::create(&dir)?;
        for i in 0..10 {
            recorder.append(&frame(i));
        }
        let info = recorder.finish()?;

        assert_eq!(info.frame_count, 10);
        assert_eq!(info.dropped, 0);
        assert!(dir.join(MANIFEST_NAME).exists());
        assert!(dir.join(frame_file_name(9)).exists());
        Ok(())
    }

    #[test]
    fn test_create_rejects_missing_parent() {
        let result = ClipRecorder::create("/nonexistent/parent/clip");
        assert!(matches!(result, Err(ClipError::Unavailable(_))));
    }

    #[test]
    fn test_create_rejects_finalized_clip() -> Result<(), ClipError> {
        let tmp = tempfile::tempdir()?;
        let dir = tmp.path().join("clip_b");

        ClipRecorder::create(&dir)?.finish()?;
        assert!(matches!(
            ClipRecorder::create(&dir),
            Err(ClipError::Unavailable(_))
        ));
        Ok(())
    }

    #[test]
    fn test_create_rejects_file_path() -> Result<(), ClipError> {
        let tmp = tempfile::tempdir()?;
        let path = tmp.path().join("not_a_dir");
        std::fs::write(&path, b"blocker")?;

        assert!(matches!(
            ClipRecorder::create(&path),
            Err(ClipError::Unavailable(_))
        ));
        Ok(())
    }
}

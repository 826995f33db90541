use std::path::{Path, PathBuf};
use std::sync::Arc;

use strata_3d::io::ply::read_ply_binary;

use super::{frame_file_name, ClipError, ClipManifest, MANIFEST_NAME, MANIFEST_VERSION};
use crate::frame::Frame;

/// Sequential reader replaying a finalized clip frame by frame.
///
/// The cursor only moves forward; [`next`](Self::next) returns `Ok(None)`
/// once the pass is complete, and [`rewind`](Self::rewind) starts a new one.
pub struct ClipPlayer {
    dir: PathBuf,
    manifest: ClipManifest,
    cursor: u64,
}

impl ClipPlayer {
    /// Open a clip directory for playback.
    ///
    /// Refuses directories without a finalized manifest.
    pub fn open(dir: impl AsRef<Path>) -> Result<Self, ClipError> {
        let dir = dir.as_ref().to_path_buf();

        let manifest_path = dir.join(MANIFEST_NAME);
        if !manifest_path.exists() {
            return Err(ClipError::Unavailable(format!(
                "{} holds no finalized clip",
                dir.display()
            )));
        }

        let json = std::fs::read_to_string(&manifest_path)?;
        let manifest: ClipManifest = serde_json::from_str(&json)?;
        if manifest.format_version != MANIFEST_VERSION {
            return Err(ClipError::Unavailable(format!(
                "unsupported clip format version {}",
                manifest.format_version
            )));
        }

        Ok(Self {
            dir,
            manifest,
            cursor: 0,
        })
    }

    /// Number of frames in the clip.
    pub fn len(&self) -> u64 {
        self.manifest.frame_count
    }

    /// Check if the clip holds no frames.
    pub fn is_empty(&self) -> bool {
        self.manifest.frame_count == 0
    }

    /// The cursor position, equal to the number of frames already replayed
    /// in the current pass.
    pub fn position(&self) -> u64 {
        self.cursor
    }

    /// Move the cursor back to the first frame.
    pub fn rewind(&mut self) {
        self.cursor = 0;
    }

    /// Return the frame at the cursor and advance it.
    ///
    /// `Ok(None)` signals the end of the clip.
    pub fn next(&mut self) -> Result<Option<Arc<Frame>>, ClipError> {
        if self.cursor >= self.manifest.frame_count {
            return Ok(None);
        }

        let index = self.cursor;
        let cloud = read_ply_binary(self.dir.join(frame_file_name(index)))?;
        let timestamp_us = self
            .manifest
            .timestamps_us
            .get(index as usize)
            .copied()
            .unwrap_or(0);

        self.cursor += 1;
        Ok(Some(Arc::new(Frame::new(index, timestamp_us, cloud))))
    }
}

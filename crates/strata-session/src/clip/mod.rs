//! Append-only on-disk frame sequences.
//!
//! A clip is a directory of `frame_NNNNNN.ply` records in strictly
//! increasing sequence order, plus a `clip.json` manifest written when the
//! recording is finalized. A finalized clip is write-once; playback refuses
//! directories without a manifest.

mod player;
mod recorder;

pub use player::ClipPlayer;
pub use recorder::{ClipInfo, ClipRecorder};

use serde::{Deserialize, Serialize};

/// Error types for clip storage.
#[derive(Debug, thiserror::Error)]
pub enum ClipError {
    /// The clip directory is missing, unwritable or not a clip.
    #[error("clip unavailable: {0}")]
    Unavailable(String),

    /// I/O failure while touching clip storage.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// A frame record could not be read.
    #[error(transparent)]
    Record(#[from] strata_3d::io::ply::PlyError),

    /// The manifest held malformed JSON.
    #[error("malformed clip manifest")]
    Manifest(#[from] serde_json::Error),
}

pub(crate) const MANIFEST_NAME: &str = "clip.json";
pub(crate) const MANIFEST_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct ClipManifest {
    pub format_version: u32,
    pub frame_count: u64,
    pub timestamps_us: Vec<u64>,
}

pub(crate) fn frame_file_name(index: u64) -> String {
    format!("frame_{index:06}.ply")
}

use std::path::Path;

use serde::{Deserialize, Serialize};

use strata_3d::plane::RansacParams;
use strata_icp::TrackerConfig;

use crate::error::SessionError;

/// What playback does once the clip cursor runs past the last frame.
///
/// The choice is an explicit configuration decision, never an implicit
/// default at the call site.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EndOfClipPolicy {
    /// Rewind to the first frame and keep playing.
    Loop,
    /// Fall back to the live streaming mode.
    ReturnToStreaming,
}

/// Floor extraction tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FloorConfig {
    /// Sampling-consensus parameters of the plane search.
    pub ransac: RansacParams,
    /// The up axis of the sensor frame the floor normal must align with.
    pub up_axis: [f64; 3],
    /// Maximum tilt of the fitted normal from the up axis, in degrees.
    /// Candidates beyond it are rejected as walls.
    pub max_tilt_deg: f64,
    /// Height of the floor plane in the aligned frame.
    pub floor_offset: f64,
}

impl Default for FloorConfig {
    fn default() -> Self {
        Self {
            ransac: RansacParams::default(),
            up_axis: [0.0, 0.0, 1.0],
            max_tilt_deg: 30.0,
            floor_offset: 0.0,
        }
    }
}

/// Axis-aligned crop box in floor-aligned coordinates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CropBox {
    /// Minimum corner.
    pub min: [f64; 3],
    /// Maximum corner.
    pub max: [f64; 3],
}

/// Session-wide configuration.
///
/// Every tunable threshold lives here, fixed at session construction and
/// never mutated afterwards.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Floor extraction tuning.
    pub floor: FloorConfig,
    /// Tracker tuning.
    pub tracker: TrackerConfig,
    /// End-of-clip playback policy.
    pub end_of_clip: EndOfClipPolicy,
    /// Optional crop applied when extracting a template, in floor-aligned
    /// coordinates.
    pub template_crop: Option<CropBox>,
}

impl Default for EndOfClipPolicy {
    fn default() -> Self {
        EndOfClipPolicy::ReturnToStreaming
    }
}

impl SessionConfig {
    /// Persist the configuration as pretty-printed JSON.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), SessionError> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Load a configuration previously written by [`save`](Self::save).
    pub fn load(path: impl AsRef<Path>) -> Result<Self, SessionError> {
        let json = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&json)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_settings_roundtrip() -> Result<(), SessionError> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("settings.json");

        let mut config = SessionConfig::default();
        config.floor.max_tilt_deg = 12.5;
        config.end_of_clip = EndOfClipPolicy::Loop;
        config.template_crop = Some(CropBox {
            min: [-0.5, -0.5, 0.0],
            max: [0.5, 0.5, 1.0],
        });
        config.tracker.min_correspondences = 77;

        config.save(&path)?;
        let loaded = SessionConfig::load(&path)?;

        assert_eq!(loaded.floor.max_tilt_deg, 12.5);
        assert_eq!(loaded.end_of_clip, EndOfClipPolicy::Loop);
        assert_eq!(loaded.tracker.min_correspondences, 77);
        let crop = loaded.template_crop.expect("crop survives the roundtrip");
        assert_eq!(crop.min, [-0.5, -0.5, 0.0]);
        Ok(())
    }

    #[test]
    fn test_load_missing_file() {
        assert!(matches!(
            SessionConfig::load("/nonexistent/settings.json"),
            Err(SessionError::SettingsIo(_))
        ));
    }
}

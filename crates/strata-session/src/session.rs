use std::path::Path;
use std::sync::Arc;

use strata_3d::plane::PlaneModel;
use strata_3d::pointcloud::PointCloud;
use strata_3d::transforms::RigidTransform;
use strata_icp::IcpFramedTracker;

use crate::clip::{ClipInfo, ClipPlayer, ClipRecorder};
use crate::config::{CropBox, EndOfClipPolicy, SessionConfig};
use crate::error::SessionError;
use crate::floor::{FloorExtractor, FloorModel};
use crate::frame::Frame;
use crate::source::FrameSource;

/// The per-frame processing mode. Exactly one is active; transitions go
/// through [`SessionController::set_operation_mode`] only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationMode {
    /// Process frames from the live sensor feed.
    Streaming,
    /// Replay frames from a recorded clip.
    ClipPlayback,
    /// Track the template pose over live frames.
    Tracking,
}

/// Read-only per-tick state for external consumers (the view layer).
///
/// Rebuilt wholesale every tick, so readers always observe a consistent
/// snapshot and never a partially updated transform.
#[derive(Debug, Clone)]
pub struct SessionSnapshot {
    /// The active operation mode.
    pub mode: OperationMode,
    /// The frame processed this tick, if one was available.
    pub frame: Option<Arc<Frame>>,
    /// The floor alignment transform; identity until the first extraction.
    pub floor_transform: RigidTransform,
    /// The fitted floor plane, once extracted.
    pub floor_plane: Option<PlaneModel>,
    /// The template pose, present while a tracker is alive.
    pub tracking_transform: Option<RigidTransform>,
    /// Set when the tracker lost the template and the pose is frozen.
    pub tracking_stale: bool,
}

/// Orchestrates the per-frame update across the frame source, the floor
/// extractor, the tracker and clip recording/playback.
///
/// One [`spin_once`](Self::spin_once) call processes exactly one frame end
/// to end; nothing suspends mid-tick. The controller is the single writer
/// of the current frame and transforms, published per tick through
/// [`snapshot`](Self::snapshot).
pub struct SessionController<S: FrameSource> {
    config: SessionConfig,
    source: S,
    mode: OperationMode,

    floor_extractor: FloorExtractor,
    floor: Option<FloorModel>,
    floor_update_requested: bool,

    template: Option<Arc<PointCloud>>,
    tracker: Option<IcpFramedTracker>,
    tracking_stale: bool,

    recorder: Option<ClipRecorder>,
    player: Option<ClipPlayer>,

    current: Option<Arc<Frame>>,
}

impl<S: FrameSource> SessionController<S> {
    /// Create a controller in streaming mode over the given source.
    pub fn new(source: S, config: SessionConfig) -> Self {
        let floor_extractor = FloorExtractor::new(config.floor.clone());
        Self {
            config,
            source,
            mode: OperationMode::Streaming,
            floor_extractor,
            floor: None,
            floor_update_requested: false,
            template: None,
            tracker: None,
            tracking_stale: false,
            recorder: None,
            player: None,
            current: None,
        }
    }

    /// The active operation mode.
    pub fn mode(&self) -> OperationMode {
        self.mode
    }

    /// The session configuration.
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Block until the sensor delivers its first frame and adopt it.
    pub fn wait_for_first_frame(&mut self) {
        let frame = self.source.wait_for_first_frame();
        self.current = Some(frame);
    }

    /// Ask for a floor model refresh on the next tick that sees a frame.
    pub fn request_floor_update(&mut self) {
        self.floor_update_requested = true;
    }

    /// Load a clip for playback mode.
    pub fn set_playback_clip(&mut self, dir: impl AsRef<Path>) -> Result<(), SessionError> {
        self.player = Some(ClipPlayer::open(dir)?);
        Ok(())
    }

    /// Switch the operation mode.
    ///
    /// Transition rules:
    /// - any mode to `Streaming` always succeeds and halts active playback
    ///   and recording cleanly;
    /// - `ClipPlayback` is entered from `Streaming` only and needs a clip
    ///   loaded via [`set_playback_clip`](Self::set_playback_clip);
    /// - `Tracking` is entered from `Streaming` or `ClipPlayback`, needs a
    ///   template from [`extract_template`](Self::extract_template), and
    ///   restarts the tracker from an identity seed.
    ///
    /// A rejected transition leaves the session untouched.
    pub fn set_operation_mode(&mut self, mode: OperationMode) -> Result<(), SessionError> {
        if mode == self.mode {
            return Ok(());
        }

        // validate, and build whatever the target mode needs, before any
        // state mutation
        let tracker = match mode {
            OperationMode::Streaming => None,
            OperationMode::ClipPlayback => {
                if self.mode != OperationMode::Streaming {
                    return Err(SessionError::InvalidState(format!(
                        "cannot enter playback from {:?}",
                        self.mode
                    )));
                }
                if self.player.is_none() {
                    return Err(SessionError::InvalidState(
                        "no clip loaded for playback".to_string(),
                    ));
                }
                None
            }
            OperationMode::Tracking => Some(self.build_tracker()?),
        };

        // leaving a mode cancels its in-flight operation: the playback
        // cursor resets, and a transition to streaming closes recording
        match mode {
            OperationMode::Streaming => {
                self.finalize_recording();
                if let Some(player) = self.player.as_mut() {
                    player.rewind();
                }
                self.tracker = None;
                self.tracking_stale = false;
            }
            OperationMode::ClipPlayback => {
                if let Some(player) = self.player.as_mut() {
                    player.rewind();
                }
                self.tracker = None;
                self.tracking_stale = false;
            }
            OperationMode::Tracking => {
                if let Some(player) = self.player.as_mut() {
                    player.rewind();
                }
                self.tracker = tracker;
                self.tracking_stale = false;
            }
        }

        log::info!("operation mode: {:?} -> {:?}", self.mode, mode);
        self.mode = mode;
        Ok(())
    }

    /// Capture the current frame as the tracking template.
    ///
    /// With a crop box configured, only the points inside the box (tested in
    /// floor-aligned coordinates) make it into the template. A new template
    /// replaces any previous one and restarts a running tracker.
    pub fn extract_template(&mut self) -> Result<(), SessionError> {
        let frame = self.current.clone().ok_or_else(|| {
            SessionError::InvalidState("no frame available to extract a template from".to_string())
        })?;

        let cloud = match &self.config.template_crop {
            Some(crop) => crop_aligned(&frame.cloud, &self.floor_transform(), crop),
            None => frame.cloud.clone(),
        };
        if cloud.is_empty() {
            return Err(SessionError::InvalidState(
                "template crop removed every point".to_string(),
            ));
        }

        log::info!(
            "extracted template with {} points from frame seq {}",
            cloud.len(),
            frame.seq
        );
        self.template = Some(Arc::new(cloud));
        self.tracking_stale = false;

        self.tracker = match self.mode {
            OperationMode::Tracking => Some(self.build_tracker()?),
            _ => None,
        };
        Ok(())
    }

    /// Persist the current tuning parameters for reuse across sessions.
    pub fn save_template_settings(&self, path: impl AsRef<Path>) -> Result<(), SessionError> {
        self.config.save(path)
    }

    /// Start recording every processed frame into a new clip directory.
    pub fn record_new_clip(&mut self, dir: impl AsRef<Path>) -> Result<(), SessionError> {
        if self.recorder.is_some() {
            return Err(SessionError::InvalidState(
                "recording already in progress".to_string(),
            ));
        }
        let recorder = ClipRecorder::create(dir)?;
        log::info!("recording into {}", recorder.dir().display());
        self.recorder = Some(recorder);
        Ok(())
    }

    /// Finalize the active recording, if any.
    pub fn stop_recording(&mut self) -> Result<Option<ClipInfo>, SessionError> {
        match self.recorder.take() {
            Some(recorder) => Ok(Some(recorder.finish()?)),
            None => Ok(None),
        }
    }

    /// Process one frame end to end and publish the updated snapshot.
    ///
    /// Selects the frame by mode, refreshes the floor model when requested,
    /// updates the tracker pose in tracking mode and forwards the frame to
    /// an active recording. Algorithmic failures degrade to the previous
    /// known-good state instead of propagating.
    pub fn spin_once(&mut self) -> Result<SessionSnapshot, SessionError> {
        let frame = match self.mode {
            OperationMode::Streaming | OperationMode::Tracking => self.source.current_frame(),
            OperationMode::ClipPlayback => self.advance_playback()?,
        };

        if let Some(frame) = frame {
            if self.floor_update_requested {
                self.floor_update_requested = false;
                self.update_floor(&frame);
            }
            if self.mode == OperationMode::Tracking {
                self.update_tracking(&frame);
            }
            if let Some(recorder) = self.recorder.as_mut() {
                recorder.append(&frame);
            }
            self.current = Some(frame);
        }

        Ok(self.snapshot())
    }

    /// The read-only state exposed to external consumers.
    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            mode: self.mode,
            frame: self.current.clone(),
            floor_transform: self.floor_transform(),
            floor_plane: self.floor.as_ref().map(|f| f.plane.clone()),
            tracking_transform: self.tracker.as_ref().map(|t| t.pose().clone()),
            tracking_stale: self.tracking_stale,
        }
    }

    fn floor_transform(&self) -> RigidTransform {
        self.floor
            .as_ref()
            .map(|f| f.aligned_from_sensor.clone())
            .unwrap_or_default()
    }

    fn build_tracker(&self) -> Result<IcpFramedTracker, SessionError> {
        let template = self.template.as_ref().ok_or_else(|| {
            SessionError::InvalidState("cannot start tracking without a template".to_string())
        })?;
        IcpFramedTracker::new(template, self.config.tracker.clone())
            .map_err(|e| SessionError::InvalidState(format!("template is not trackable: {e}")))
    }

    fn update_floor(&mut self, frame: &Arc<Frame>) {
        match self.floor_extractor.extract(&frame.cloud) {
            Ok(model) => {
                log::debug!(
                    "floor refreshed: {} inliers (ratio {:.3})",
                    model.plane.inlier_count,
                    model.plane.inlier_ratio
                );
                self.floor = Some(model);
            }
            Err(e) => {
                // keep the previous transform so the view does not jump
                log::warn!("floor extraction failed, keeping previous model: {e}");
            }
        }
    }

    fn update_tracking(&mut self, frame: &Arc<Frame>) {
        let Some(tracker) = self.tracker.as_mut() else {
            return;
        };
        match tracker.track(&frame.cloud) {
            Ok(_) => self.tracking_stale = false,
            Err(e) => {
                if !self.tracking_stale {
                    log::warn!("tracking lost, freezing last good pose: {e}");
                }
                self.tracking_stale = true;
            }
        }
    }

    fn advance_playback(&mut self) -> Result<Option<Arc<Frame>>, SessionError> {
        let stepped = match self.player.as_mut() {
            Some(player) => player.next()?,
            None => {
                return Err(SessionError::InvalidState(
                    "playback mode without a clip".to_string(),
                ))
            }
        };
        if let Some(frame) = stepped {
            return Ok(Some(frame));
        }

        match self.config.end_of_clip {
            EndOfClipPolicy::Loop => {
                log::debug!("end of clip, looping");
                match self.player.as_mut() {
                    Some(player) => {
                        player.rewind();
                        Ok(player.next()?)
                    }
                    None => Ok(None),
                }
            }
            EndOfClipPolicy::ReturnToStreaming => {
                log::info!("end of clip, falling back to streaming");
                self.mode = OperationMode::Streaming;
                self.finalize_recording();
                if let Some(player) = self.player.as_mut() {
                    player.rewind();
                }
                Ok(self.source.current_frame())
            }
        }
    }

    fn finalize_recording(&mut self) {
        if let Some(recorder) = self.recorder.take() {
            match recorder.finish() {
                Ok(info) => log::info!(
                    "recording finalized: {} frames in {}",
                    info.frame_count,
                    info.path.display()
                ),
                Err(e) => log::warn!("failed to finalize recording: {e}"),
            }
        }
    }
}

/// Keep the points whose floor-aligned position falls inside the box.
fn crop_aligned(
    cloud: &PointCloud,
    aligned_from_sensor: &RigidTransform,
    crop: &CropBox,
) -> PointCloud {
    let inside = |p: &[f64; 3]| {
        let q = aligned_from_sensor.transform_point(p);
        q[0] >= crop.min[0]
            && q[0] <= crop.max[0]
            && q[1] >= crop.min[1]
            && q[1] <= crop.max[1]
            && q[2] >= crop.min[2]
            && q[2] <= crop.max[2]
    };

    match cloud.colors() {
        Some(colors) => {
            let (points, colors) = cloud
                .points()
                .iter()
                .zip(colors.iter())
                .filter(|(p, _)| inside(p))
                .map(|(p, c)| (*p, *c))
                .unzip();
            PointCloud::new(points, Some(colors))
        }
        None => PointCloud::new(
            cloud.points().iter().filter(|p| inside(p)).copied().collect(),
            None,
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::{FrameProducer, SharedFrameSource};

    fn session() -> (SessionController<SharedFrameSource>, FrameProducer) {
        let (source, producer) = SharedFrameSource::new();
        (
            SessionController::new(source, SessionConfig::default()),
            producer,
        )
    }

    fn frame(seq: u64) -> Frame {
        Frame::new(
            seq,
            seq * 1000,
            PointCloud::new(vec![[0.0, 0.0, 0.0], [1.0, 0.0, 0.0]], None),
        )
    }

    #[test]
    fn test_tracking_without_template_is_rejected() {
        let (mut controller, _producer) = session();

        let result = controller.set_operation_mode(OperationMode::Tracking);
        assert!(matches!(result, Err(SessionError::InvalidState(_))));
        assert_eq!(controller.mode(), OperationMode::Streaming);
    }

    #[test]
    fn test_playback_without_clip_is_rejected() {
        let (mut controller, _producer) = session();

        let result = controller.set_operation_mode(OperationMode::ClipPlayback);
        assert!(matches!(result, Err(SessionError::InvalidState(_))));
        assert_eq!(controller.mode(), OperationMode::Streaming);
    }

    #[test]
    fn test_streaming_is_always_reachable() {
        let (mut controller, _producer) = session();
        assert!(controller
            .set_operation_mode(OperationMode::Streaming)
            .is_ok());
        assert_eq!(controller.mode(), OperationMode::Streaming);
    }

    #[test]
    fn test_playback_is_not_reachable_from_tracking() -> Result<(), SessionError> {
        let (mut controller, producer) = session();

        producer.publish(frame(0));
        controller.spin_once()?;
        controller.extract_template()?;

        // direct Tracking -> ClipPlayback is not a legal edge even with a
        // clip loaded; the session has to pass through Streaming
        let tmp = tempfile::tempdir().expect("tempdir");
        let clip_dir = tmp.path().join("clip");
        {
            let mut recorder = crate::clip::ClipRecorder::create(&clip_dir)?;
            recorder.append(&Arc::new(frame(0)));
            recorder.finish()?;
        }
        controller.set_playback_clip(&clip_dir)?;
        controller.set_operation_mode(OperationMode::Tracking)?;

        let result = controller.set_operation_mode(OperationMode::ClipPlayback);
        assert!(matches!(result, Err(SessionError::InvalidState(_))));
        assert_eq!(controller.mode(), OperationMode::Tracking);
        Ok(())
    }

    #[test]
    fn test_extract_template_requires_a_frame() {
        let (mut controller, _producer) = session();
        assert!(matches!(
            controller.extract_template(),
            Err(SessionError::InvalidState(_))
        ));
    }

    #[test]
    fn test_spin_once_adopts_published_frame() -> Result<(), SessionError> {
        let (mut controller, producer) = session();

        let snapshot = controller.spin_once()?;
        assert!(snapshot.frame.is_none());

        producer.publish(frame(3));
        let snapshot = controller.spin_once()?;
        assert_eq!(snapshot.frame.expect("frame was published").seq, 3);
        Ok(())
    }

    #[test]
    fn test_double_record_is_rejected() -> Result<(), SessionError> {
        let (mut controller, _producer) = session();
        let tmp = tempfile::tempdir().expect("tempdir");

        controller.record_new_clip(tmp.path().join("a"))?;
        assert!(matches!(
            controller.record_new_clip(tmp.path().join("b")),
            Err(SessionError::InvalidState(_))
        ));
        controller.stop_recording()?;
        Ok(())
    }

    #[test]
    fn test_stop_recording_when_idle_is_a_noop() -> Result<(), SessionError> {
        let (mut controller, _producer) = session();
        assert!(controller.stop_recording()?.is_none());
        Ok(())
    }
}

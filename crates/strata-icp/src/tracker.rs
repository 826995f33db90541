use serde::{Deserialize, Serialize};

use strata_3d::pointcloud::PointCloud;
use strata_3d::transforms::RigidTransform;

use crate::registration::{
    register_point_to_point, IcpCriteria, IcpError, IcpResult, TargetIndex,
};

/// Error types for framed tracking.
///
/// Every variant means the same thing to callers: this tick's registration
/// is not trustworthy and the previous pose should be kept.
#[derive(Debug, thiserror::Error)]
pub enum TrackError {
    /// The template is mostly occluded in the current frame.
    #[error("tracking lost: only {found} correspondences, need {required}")]
    TooFewCorrespondences {
        /// Correspondences accepted in the last iteration.
        found: usize,
        /// Configured minimum.
        required: usize,
    },

    /// Residual error stayed above the divergence threshold.
    #[error("tracking lost: rmse {rmse} above divergence threshold {threshold}")]
    Diverged {
        /// RMSE after the iteration cap.
        rmse: f64,
        /// Configured divergence threshold.
        threshold: f64,
    },

    /// Registration could not run at all.
    #[error(transparent)]
    Registration(#[from] IcpError),
}

/// Tuning parameters for [`IcpFramedTracker`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackerConfig {
    /// Convergence criteria of the inner ICP loop.
    pub criteria: IcpCriteria,
    /// Minimum accepted correspondences for a trustworthy pose.
    pub min_correspondences: usize,
    /// RMSE above which the registration counts as diverged.
    pub divergence_rmse: f64,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            criteria: IcpCriteria::default(),
            min_correspondences: 50,
            divergence_rmse: 0.1,
        }
    }
}

/// Frame-over-frame rigid tracker against a fixed template cloud.
///
/// Each [`track`](Self::track) call registers the incoming frame onto the
/// template, seeded with the previous tick's pose so small per-tick motion
/// converges in a few iterations and symmetric templates stay locked to the
/// branch they started on. On failure the stored pose is left untouched.
pub struct IcpFramedTracker {
    template: TargetIndex,
    config: TrackerConfig,
    pose: RigidTransform,
}

impl IcpFramedTracker {
    /// Create a tracker for the given template cloud.
    pub fn new(template: &PointCloud, config: TrackerConfig) -> Result<Self, IcpError> {
        if template.is_empty() {
            return Err(IcpError::EmptyCloud);
        }
        Ok(Self {
            template: TargetIndex::new(template.points()),
            config,
            pose: RigidTransform::identity(),
        })
    }

    /// The current pose, mapping frame coordinates onto the template.
    pub fn pose(&self) -> &RigidTransform {
        &self.pose
    }

    /// Number of points in the tracked template.
    pub fn template_len(&self) -> usize {
        self.template.len()
    }

    /// Reset the pose seed to identity.
    pub fn reset(&mut self) {
        self.pose = RigidTransform::identity();
    }

    /// Register the frame onto the template and update the pose.
    ///
    /// Fails with [`TrackError`] when the result is not trustworthy; the
    /// stored pose is only updated on success.
    pub fn track(&mut self, frame: &PointCloud) -> Result<&RigidTransform, TrackError> {
        let result = register_point_to_point(
            frame.points(),
            &self.template,
            &self.pose,
            &self.config.criteria,
        )?;

        self.accept(result)
    }

    fn accept(&mut self, result: IcpResult) -> Result<&RigidTransform, TrackError> {
        if result.num_correspondences < self.config.min_correspondences {
            return Err(TrackError::TooFewCorrespondences {
                found: result.num_correspondences,
                required: self.config.min_correspondences,
            });
        }
        if result.rmse > self.config.divergence_rmse {
            return Err(TrackError::Diverged {
                rmse: result.rmse,
                threshold: self.config.divergence_rmse,
            });
        }

        log::debug!(
            "tracker pose updated after {} iterations (rmse {:.6})",
            result.num_iterations,
            result.rmse
        );
        self.pose = result.transform;
        Ok(&self.pose)
    }
}

use strata_3d::linalg::dot3;
use strata_3d::plane::{fit_plane_ransac, PlaneFitError, PlaneModel};
use strata_3d::pointcloud::PointCloud;
use strata_3d::transforms::{rotation_between_unit_vectors, RigidTransform};

use crate::config::FloorConfig;

/// Error types for floor extraction.
#[derive(Debug, thiserror::Error)]
pub enum FloorError {
    /// The plane search failed; callers keep the previous floor transform.
    #[error(transparent)]
    Fit(#[from] PlaneFitError),

    /// The best plane tilts too far from up to be a floor (a wall, usually).
    #[error("fitted plane tilts {tilt_deg:.1} degrees from up, limit is {limit_deg:.1}")]
    NotAFloor {
        /// Tilt of the fitted normal from the up axis.
        tilt_deg: f64,
        /// Configured limit.
        limit_deg: f64,
    },
}

/// A fitted floor: the plane model plus the rigid transform into the
/// floor-aligned reference frame.
#[derive(Debug, Clone)]
pub struct FloorModel {
    /// The fitted plane, in sensor coordinates.
    pub plane: PlaneModel,
    /// Maps sensor coordinates into the floor-aligned frame: the plane
    /// normal goes to up and plane points to the configured height.
    pub aligned_from_sensor: RigidTransform,
}

/// Fits a floor plane to frames and derives the alignment transform.
pub struct FloorExtractor {
    config: FloorConfig,
    up: [f64; 3],
}

impl FloorExtractor {
    /// Create an extractor with the given tuning.
    pub fn new(config: FloorConfig) -> Self {
        let norm = dot3(&config.up_axis, &config.up_axis).sqrt();
        let up = if norm < 1e-12 {
            [0.0, 0.0, 1.0]
        } else {
            [
                config.up_axis[0] / norm,
                config.up_axis[1] / norm,
                config.up_axis[2] / norm,
            ]
        };
        Self { config, up }
    }

    /// Fit the floor plane of a frame and derive the alignment transform.
    ///
    /// Rejects planes whose normal tilts more than the configured limit from
    /// the up axis, so a dominant wall never replaces the floor.
    pub fn extract(&self, cloud: &PointCloud) -> Result<FloorModel, FloorError> {
        let fit = fit_plane_ransac(cloud.points(), &self.config.ransac)?;

        let normal = fit.model.normal();
        let alignment = dot3(&normal, &self.up);

        let tilt_deg = alignment.abs().clamp(0.0, 1.0).acos().to_degrees();
        if tilt_deg > self.config.max_tilt_deg {
            return Err(FloorError::NotAFloor {
                tilt_deg,
                limit_deg: self.config.max_tilt_deg,
            });
        }

        // orient the normal towards up before deriving the rotation
        let (oriented_normal, oriented_d) = if alignment >= 0.0 {
            (normal, fit.model.coefficients[3])
        } else {
            (
                [-normal[0], -normal[1], -normal[2]],
                -fit.model.coefficients[3],
            )
        };

        let rotation = rotation_between_unit_vectors(&oriented_normal, &self.up);

        // plane points sit at height -d along the oriented normal; lift them
        // to the configured floor offset
        let height = self.config.floor_offset + oriented_d;
        let translation = [
            self.up[0] * height,
            self.up[1] * height,
            self.up[2] * height,
        ];

        Ok(FloorModel {
            plane: fit.model,
            aligned_from_sensor: RigidTransform::new(rotation, translation),
        })
    }
}

use kiddo::immutable::float::kdtree::ImmutableKdTree;
use serde::{Deserialize, Serialize};

use strata_3d::transforms::RigidTransform;

use crate::ops::find_correspondences;
use crate::ops::fit_rigid_transform;

/// Error types for the registration module.
#[derive(Debug, thiserror::Error)]
pub enum IcpError {
    /// Source or target point set is empty.
    #[error("cannot register an empty point cloud")]
    EmptyCloud,

    /// Too few correspondences survived outlier rejection to fit a transform.
    #[error("degenerate correspondence set: {0} pairs")]
    DegenerateCorrespondences(usize),
}

/// Nearest-neighbor search structure over a fixed target point set.
///
/// Built once per target and reused across registrations against it.
pub struct TargetIndex {
    points: Vec<[f64; 3]>,
    kdtree: ImmutableKdTree<f64, u32, 3, 32>,
}

impl TargetIndex {
    /// Build the index over the given points.
    ///
    /// PRECONDITION: points is non-empty.
    pub fn new(points: &[[f64; 3]]) -> Self {
        debug_assert!(!points.is_empty());
        Self {
            points: points.to_vec(),
            kdtree: ImmutableKdTree::new_from_slice(points),
        }
    }

    /// The indexed points.
    pub fn points(&self) -> &[[f64; 3]] {
        &self.points
    }

    /// Number of indexed points.
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Check if the index holds no points.
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Index and Euclidean distance of the nearest indexed point.
    pub(crate) fn nearest(&self, p: &[f64; 3]) -> (usize, f64) {
        let nn = self.kdtree.nearest_one::<kiddo::SquaredEuclidean>(p);
        (nn.item as usize, nn.distance.sqrt())
    }
}

/// Convergence criteria for the ICP loop.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IcpCriteria {
    /// Maximum number of iterations to perform.
    pub max_iterations: usize,
    /// Convergence tolerance as the difference in RMSE between two
    /// consecutive iterations.
    pub tolerance: f64,
}

impl Default for IcpCriteria {
    fn default() -> Self {
        Self {
            max_iterations: 30,
            tolerance: 1e-6,
        }
    }
}

/// Result of the ICP algorithm.
///
/// The transform maps the source onto the target frame.
#[derive(Debug, Clone)]
pub struct IcpResult {
    /// Estimated rigid transform.
    pub transform: RigidTransform,
    /// Total number of iterations performed until convergence.
    pub num_iterations: usize,
    /// Last computed RMSE over the accepted correspondences.
    pub rmse: f64,
    /// Number of correspondences accepted in the last iteration.
    pub num_correspondences: usize,
}

/// Iterative closest point registration using point-to-point distance.
///
/// Each iteration finds nearest-neighbor correspondences from the
/// transformed source into the target index, fits a rigid delta with the
/// Kabsch solution, composes it into the running estimate, and stops once
/// the RMSE change drops below `criteria.tolerance` or the iteration budget
/// is exhausted.
///
/// # Arguments
///
/// * `source` - Source points to align onto the target.
/// * `target` - Prebuilt index over the target points.
/// * `initial` - Seed transform from the source to the target frame.
/// * `criteria` - Convergence criteria.
pub fn register_point_to_point(
    source: &[[f64; 3]],
    target: &TargetIndex,
    initial: &RigidTransform,
    criteria: &IcpCriteria,
) -> Result<IcpResult, IcpError> {
    if source.is_empty() || target.is_empty() {
        return Err(IcpError::EmptyCloud);
    }

    let mut result = IcpResult {
        transform: initial.clone(),
        num_iterations: 0,
        rmse: f64::INFINITY,
        num_correspondences: 0,
    };

    // seed the working copy with the initial transform
    let mut current = vec![[0.0; 3]; source.len()];
    initial.transform_points(source, &mut current);

    let mut scratch = vec![[0.0; 3]; source.len()];

    for i in 0..criteria.max_iterations {
        let correspondences = find_correspondences(&current, target);
        log::debug!(
            "icp iteration {}: {} correspondences",
            i,
            correspondences.source.len()
        );

        if correspondences.source.len() < 3 {
            return Err(IcpError::DegenerateCorrespondences(
                correspondences.source.len(),
            ));
        }

        let delta = fit_rigid_transform(&correspondences.source, &correspondences.target);

        delta.transform_points(&current, &mut scratch);
        std::mem::swap(&mut current, &mut scratch);

        result.transform = delta.compose(&result.transform);
        result.num_iterations += 1;
        result.num_correspondences = correspondences.source.len();

        let rmse = (correspondences.distances.iter().map(|d| d * d).sum::<f64>()
            / correspondences.distances.len() as f64)
            .sqrt();

        if (result.rmse - rmse).abs() < criteria.tolerance {
            log::debug!("icp converged in {} iterations with rmse {}", i, rmse);
            result.rmse = rmse;
            break;
        }
        result.rmse = rmse;
    }

    Ok(result)
}

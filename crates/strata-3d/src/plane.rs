use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::linalg::{cross3, dot3};

/// Error types for plane fitting.
#[derive(Debug, thiserror::Error)]
pub enum PlaneFitError {
    /// Not enough points to form a plane candidate.
    #[error("not enough points to fit a plane: {0}")]
    NotEnoughPoints(usize),

    /// No candidate plane reached the minimum inlier ratio.
    #[error("no plane satisfied the inlier ratio threshold")]
    NoPlaneFound,
}

/// A fitted plane `ax + by + cz + d = 0` with unit normal `(a, b, c)`.
///
/// The normal is oriented so that the origin lies on its non-negative side
/// (`d >= 0`). Models are replaced wholesale on refit, never mutated.
#[derive(Debug, Clone, PartialEq)]
pub struct PlaneModel {
    /// The plane coefficients `[a, b, c, d]`.
    pub coefficients: [f64; 4],
    /// Number of points within the fit distance threshold.
    pub inlier_count: usize,
    /// Inlier count over total point count.
    pub inlier_ratio: f64,
}

impl PlaneModel {
    /// The unit normal `(a, b, c)`.
    pub fn normal(&self) -> [f64; 3] {
        [
            self.coefficients[0],
            self.coefficients[1],
            self.coefficients[2],
        ]
    }

    /// Signed distance from a point to the plane.
    pub fn signed_distance(&self, p: &[f64; 3]) -> f64 {
        dot3(&self.normal(), p) + self.coefficients[3]
    }

    /// Absolute distance from a point to the plane.
    pub fn distance(&self, p: &[f64; 3]) -> f64 {
        self.signed_distance(p).abs()
    }
}

/// Sampling-consensus parameters for [`fit_plane_ransac`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RansacParams {
    /// Maximum point-to-plane distance for a point to count as inlier.
    pub distance_threshold: f64,
    /// Inlier ratio a candidate must reach for the search to stop early,
    /// and the minimum ratio for a fit to be accepted at all.
    pub min_inlier_ratio: f64,
    /// Iteration budget for the candidate search.
    pub max_iterations: usize,
    /// Seed for the deterministic sampling RNG.
    pub seed: u64,
}

impl Default for RansacParams {
    fn default() -> Self {
        Self {
            distance_threshold: 0.02,
            min_inlier_ratio: 0.3,
            max_iterations: 200,
            seed: 7,
        }
    }
}

/// Result of a successful plane fit: the model and its inlier indices.
#[derive(Debug, Clone)]
pub struct PlaneFit {
    /// The fitted plane.
    pub model: PlaneModel,
    /// Indices of the inlier points in the input slice.
    pub inliers: Vec<usize>,
}

/// Fit a plane to a point set with random sampling consensus.
///
/// Samples 3-point candidates, keeps the one with the most inliers within
/// `distance_threshold`, and stops early once `min_inlier_ratio` is reached.
/// The winning candidate is refined by a least-squares fit over its inliers
/// (smallest right singular vector of the centered inlier matrix).
///
/// Fails with [`PlaneFitError::NoPlaneFound`] when no candidate reaches the
/// minimum inlier ratio within the iteration budget.
pub fn fit_plane_ransac(
    points: &[[f64; 3]],
    params: &RansacParams,
) -> Result<PlaneFit, PlaneFitError> {
    if points.len() < 3 {
        return Err(PlaneFitError::NotEnoughPoints(points.len()));
    }

    let n = points.len();
    let mut rng = StdRng::seed_from_u64(params.seed);

    let mut best: Option<([f64; 4], usize)> = None;

    for i in 0..params.max_iterations {
        let Some(candidate) = sample_candidate(points, &mut rng) else {
            continue;
        };

        let inlier_count = points
            .iter()
            .filter(|p| plane_distance(&candidate, p) <= params.distance_threshold)
            .count();

        if best.as_ref().map_or(true, |(_, count)| inlier_count > *count) {
            best = Some((candidate, inlier_count));
        }

        let ratio = inlier_count as f64 / n as f64;
        if ratio >= params.min_inlier_ratio {
            log::debug!(
                "plane candidate accepted after {} iterations (inlier ratio {:.3})",
                i + 1,
                ratio
            );
            break;
        }
    }

    let (candidate, inlier_count) = best.ok_or(PlaneFitError::NoPlaneFound)?;
    if (inlier_count as f64 / n as f64) < params.min_inlier_ratio {
        return Err(PlaneFitError::NoPlaneFound);
    }

    let inliers: Vec<usize> = (0..n)
        .filter(|&i| plane_distance(&candidate, &points[i]) <= params.distance_threshold)
        .collect();

    // least-squares refinement over the consensus set
    let refined = refit_plane(points, &inliers).unwrap_or(candidate);
    let inliers: Vec<usize> = (0..n)
        .filter(|&i| plane_distance(&refined, &points[i]) <= params.distance_threshold)
        .collect();

    let inlier_count = inliers.len();
    let model = PlaneModel {
        coefficients: orient_towards_origin(refined),
        inlier_count,
        inlier_ratio: inlier_count as f64 / n as f64,
    };

    Ok(PlaneFit { model, inliers })
}

/// Build a unit-normal plane from 3 randomly sampled points.
///
/// Returns `None` for degenerate (collinear or repeated) samples.
fn sample_candidate(points: &[[f64; 3]], rng: &mut StdRng) -> Option<[f64; 4]> {
    let n = points.len();
    let i0 = rng.random_range(0..n);
    let mut i1 = rng.random_range(0..n);
    while i1 == i0 {
        i1 = rng.random_range(0..n);
    }
    let mut i2 = rng.random_range(0..n);
    while i2 == i0 || i2 == i1 {
        i2 = rng.random_range(0..n);
    }

    let (p0, p1, p2) = (points[i0], points[i1], points[i2]);
    let e1 = [p1[0] - p0[0], p1[1] - p0[1], p1[2] - p0[2]];
    let e2 = [p2[0] - p0[0], p2[1] - p0[1], p2[2] - p0[2]];
    let normal = cross3(&e1, &e2);
    let norm = dot3(&normal, &normal).sqrt();
    if norm < 1e-12 {
        return None;
    }

    let normal = [normal[0] / norm, normal[1] / norm, normal[2] / norm];
    let d = -dot3(&normal, &p0);
    Some([normal[0], normal[1], normal[2], d])
}

fn plane_distance(coefficients: &[f64; 4], p: &[f64; 3]) -> f64 {
    (coefficients[0] * p[0] + coefficients[1] * p[1] + coefficients[2] * p[2] + coefficients[3])
        .abs()
}

/// Least-squares plane through the given inliers: centroid plus the smallest
/// right singular vector of the centered point matrix.
fn refit_plane(points: &[[f64; 3]], inliers: &[usize]) -> Option<[f64; 4]> {
    if inliers.len() < 3 {
        return None;
    }

    let mut centroid = [0.0; 3];
    for &idx in inliers {
        for (c, v) in centroid.iter_mut().zip(points[idx].iter()) {
            *c += v;
        }
    }
    for c in centroid.iter_mut() {
        *c /= inliers.len() as f64;
    }

    let mut a = faer::Mat::<f64>::zeros(inliers.len(), 3);
    for (row, &idx) in inliers.iter().enumerate() {
        for col in 0..3 {
            a.write(row, col, points[idx][col] - centroid[col]);
        }
    }

    let svd = a.svd();
    let v = svd.v();
    let normal = [v.read(0, 2), v.read(1, 2), v.read(2, 2)];
    let norm = dot3(&normal, &normal).sqrt();
    if norm < 1e-12 {
        return None;
    }

    let normal = [normal[0] / norm, normal[1] / norm, normal[2] / norm];
    let d = -dot3(&normal, &centroid);
    Some([normal[0], normal[1], normal[2], d])
}

/// Flip the coefficients so the origin sits on the non-negative side.
fn orient_towards_origin(coefficients: [f64; 4]) -> [f64; 4] {
    if coefficients[3] < 0.0 {
        [
            -coefficients[0],
            -coefficients[1],
            -coefficients[2],
            -coefficients[3],
        ]
    } else {
        coefficients
    }
}

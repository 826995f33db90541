use crate::linalg::{cross3, dot3, matmul33, transform_points3d};

/// Compute the rotation matrix from an axis and angle.
///
/// # Arguments
///
/// * `axis` - The axis of rotation.
/// * `angle` - The angle of rotation in radians.
///
/// # Returns
///
/// The row-major rotation matrix.
///
/// Example:
///
/// ```
/// use strata_3d::transforms::axis_angle_to_rotation_matrix;
///
/// let axis = [1.0, 0.0, 0.0];
/// let angle = std::f64::consts::PI / 2.0;
/// let rotation = axis_angle_to_rotation_matrix(&axis, angle).unwrap();
/// ```
pub fn axis_angle_to_rotation_matrix(
    axis: &[f64; 3],
    angle: f64,
) -> Result<[[f64; 3]; 3], &'static str> {
    let magnitude = dot3(axis, axis).sqrt();
    if magnitude < 1e-10 {
        return Err("cannot compute rotation matrix from a zero vector");
    }
    let x = axis[0] / magnitude;
    let y = axis[1] / magnitude;
    let z = axis[2] / magnitude;

    let c = angle.cos();
    let s = angle.sin();
    let t = 1.0 - c;

    Ok([
        [c + x * x * t, x * y * t - z * s, x * z * t + y * s],
        [x * y * t + z * s, c + y * y * t, y * z * t - x * s],
        [x * z * t - y * s, y * z * t + x * s, c + z * z * t],
    ])
}

/// Compute the rotation carrying one unit vector onto another.
///
/// Both inputs must be unit length. The antipodal case resolves to a half
/// turn about an arbitrary perpendicular axis.
pub fn rotation_between_unit_vectors(from: &[f64; 3], to: &[f64; 3]) -> [[f64; 3]; 3] {
    let c = dot3(from, to).clamp(-1.0, 1.0);

    if c > 1.0 - 1e-12 {
        return RigidTransform::identity().rotation;
    }

    let axis = if c < -1.0 + 1e-12 {
        // antipodal: any axis perpendicular to `from`
        let candidate = if from[0].abs() < 0.9 {
            [1.0, 0.0, 0.0]
        } else {
            [0.0, 1.0, 0.0]
        };
        cross3(from, &candidate)
    } else {
        cross3(from, to)
    };

    let angle = c.acos();
    // axis is non-zero by construction of the branches above
    axis_angle_to_rotation_matrix(&axis, angle).unwrap_or(RigidTransform::identity().rotation)
}

/// A rigid transform: a row-major orthonormal rotation plus a translation.
///
/// Composition and inversion keep the rotation orthonormal within numerical
/// tolerance; `is_orthonormal` re-checks the invariant explicitly.
#[derive(Debug, Clone, PartialEq)]
pub struct RigidTransform {
    /// Row-major rotation matrix.
    pub rotation: [[f64; 3]; 3],
    /// Translation vector.
    pub translation: [f64; 3],
}

impl RigidTransform {
    /// The identity transform.
    pub fn identity() -> Self {
        Self {
            rotation: [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]],
            translation: [0.0, 0.0, 0.0],
        }
    }

    /// Create a transform from a rotation and translation.
    pub fn new(rotation: [[f64; 3]; 3], translation: [f64; 3]) -> Self {
        Self {
            rotation,
            translation,
        }
    }

    /// Compose with another transform, applying `rhs` first.
    ///
    /// `a.compose(&b)` maps a point `p` to `a(b(p))`.
    pub fn compose(&self, rhs: &RigidTransform) -> RigidTransform {
        let mut rotation = [[0.0; 3]; 3];
        matmul33(&self.rotation, &rhs.rotation, &mut rotation);

        let mut translation = [0.0; 3];
        for (i, row) in self.rotation.iter().enumerate() {
            translation[i] = dot3(row, &rhs.translation) + self.translation[i];
        }

        RigidTransform::new(rotation, translation)
    }

    /// The inverse transform: `R' = R^T`, `t' = -R^T * t`.
    pub fn inverse(&self) -> RigidTransform {
        let mut rotation = [[0.0; 3]; 3];
        for (i, row) in self.rotation.iter().enumerate() {
            for (j, val) in row.iter().enumerate() {
                rotation[j][i] = *val;
            }
        }
        let translation = [
            -dot3(&rotation[0], &self.translation),
            -dot3(&rotation[1], &self.translation),
            -dot3(&rotation[2], &self.translation),
        ];
        RigidTransform::new(rotation, translation)
    }

    /// Apply the transform to a single point.
    pub fn transform_point(&self, p: &[f64; 3]) -> [f64; 3] {
        [
            dot3(&self.rotation[0], p) + self.translation[0],
            dot3(&self.rotation[1], p) + self.translation[1],
            dot3(&self.rotation[2], p) + self.translation[2],
        ]
    }

    /// Apply the transform to a set of points into a pre-allocated slice.
    pub fn transform_points(&self, src: &[[f64; 3]], dst: &mut [[f64; 3]]) {
        transform_points3d(src, &self.rotation, &self.translation, dst);
    }

    /// Check that the rotation is orthonormal within `tol`.
    pub fn is_orthonormal(&self, tol: f64) -> bool {
        let r = &self.rotation;
        let cols = [
            [r[0][0], r[1][0], r[2][0]],
            [r[0][1], r[1][1], r[2][1]],
            [r[0][2], r[1][2], r[2][2]],
        ];
        for i in 0..3 {
            for j in 0..3 {
                let expected = if i == j { 1.0 } else { 0.0 };
                if (dot3(&cols[i], &cols[j]) - expected).abs() > tol {
                    return false;
                }
            }
        }
        let det = dot3(&cross3(&cols[0], &cols[1]), &cols[2]);
        (det - 1.0).abs() <= tol
    }
}

impl Default for RigidTransform {
    fn default() -> Self {
        Self::identity()
    }
}

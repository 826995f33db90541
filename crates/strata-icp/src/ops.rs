use glam::{DMat3, DVec3};

use strata_3d::transforms::RigidTransform;

use crate::registration::TargetIndex;

/// Matched point pairs with their Euclidean distances.
pub(crate) struct Correspondences {
    pub source: Vec<[f64; 3]>,
    pub target: Vec<[f64; 3]>,
    pub distances: Vec<f64>,
}

/// Find nearest-neighbor correspondences from source points into the target
/// index, rejecting outlier matches with a median-absolute-deviation gate.
pub(crate) fn find_correspondences(
    source: &[[f64; 3]],
    target: &TargetIndex,
) -> Correspondences {
    let nn_results = source
        .iter()
        .map(|p| target.nearest(p))
        .collect::<Vec<_>>();

    // median distance and median absolute deviation
    let mut distances = nn_results.iter().map(|nn| nn.1).collect::<Vec<_>>();
    distances.sort_by(|a, b| a.total_cmp(b));
    let median_dist = distances[distances.len() / 2];

    let mut dmed = distances
        .iter()
        .map(|d| (d - median_dist).abs())
        .collect::<Vec<_>>();
    dmed.sort_by(|a, b| a.total_cmp(b));
    let mad = dmed[dmed.len() / 2];
    let sigma_d = 1.4826 * mad;
    let gate = median_dist + 3.0 * sigma_d;

    let mut correspondences = Correspondences {
        source: Vec::with_capacity(source.len()),
        target: Vec::with_capacity(source.len()),
        distances: Vec::with_capacity(source.len()),
    };
    for (i, (item, distance)) in nn_results.iter().enumerate() {
        if *distance <= gate {
            correspondences.source.push(source[i]);
            correspondences.target.push(target.points()[*item]);
            correspondences.distances.push(*distance);
        }
    }

    correspondences
}

/// Compute the centroids of two equally sized point sets.
pub(crate) fn compute_centroids(points1: &[[f64; 3]], points2: &[[f64; 3]]) -> (DVec3, DVec3) {
    let mut centroid1 = DVec3::ZERO;
    let mut centroid2 = DVec3::ZERO;

    for (p1, p2) in points1.iter().zip(points2.iter()) {
        centroid1 += DVec3::from_array(*p1);
        centroid2 += DVec3::from_array(*p2);
    }

    centroid1 /= points1.len() as f64;
    centroid2 /= points2.len() as f64;

    (centroid1, centroid2)
}

/// Fit the rigid transform mapping source points onto target points with the
/// SVD-based Kabsch solution over the cross-covariance matrix.
///
/// PRECONDITION: both slices have the same length, at least 3.
pub(crate) fn fit_rigid_transform(
    points_in_src: &[[f64; 3]],
    points_in_dst: &[[f64; 3]],
) -> RigidTransform {
    debug_assert_eq!(points_in_src.len(), points_in_dst.len());
    debug_assert!(points_in_src.len() >= 3);

    let (src_centroid, dst_centroid) = compute_centroids(points_in_src, points_in_dst);

    // cross covariance H = sum[(src - src_mean) * (dst - dst_mean)^T]
    let mut h = DMat3::ZERO;
    for (p_in_src, p_in_dst) in points_in_src.iter().zip(points_in_dst.iter()) {
        let src_centered = DVec3::from_array(*p_in_src) - src_centroid;
        let dst_centered = DVec3::from_array(*p_in_dst) - dst_centroid;
        h += DMat3::from_cols(
            src_centered * dst_centered.x,
            src_centered * dst_centered.y,
            src_centered * dst_centered.z,
        );
    }

    // H is column-major in glam; hand it to faer row by row
    let h_faer = faer::mat![
        [h.x_axis.x, h.y_axis.x, h.z_axis.x],
        [h.x_axis.y, h.y_axis.y, h.z_axis.y],
        [h.x_axis.z, h.y_axis.z, h.z_axis.z],
    ];
    let svd = h_faer.svd();

    let u = mat3_from_faer(&svd.u());
    let v = mat3_from_faer(&svd.v());

    // R = V * U^T, correcting the reflection case
    let mut r = v * u.transpose();
    if r.determinant() < 0.0 {
        let v_corrected = DMat3::from_cols(v.x_axis, v.y_axis, -v.z_axis);
        r = v_corrected * u.transpose();
    }

    let t = dst_centroid - r * src_centroid;

    let mut rotation = [[0.0; 3]; 3];
    for (j, col) in [r.x_axis, r.y_axis, r.z_axis].iter().enumerate() {
        rotation[0][j] = col.x;
        rotation[1][j] = col.y;
        rotation[2][j] = col.z;
    }

    RigidTransform::new(rotation, t.to_array())
}

fn mat3_from_faer(m: &faer::MatRef<'_, f64>) -> DMat3 {
    DMat3::from_cols(
        DVec3::new(m.read(0, 0), m.read(1, 0), m.read(2, 0)),
        DVec3::new(m.read(0, 1), m.read(1, 1), m.read(2, 1)),
        DVec3::new(m.read(0, 2), m.read(1, 2), m.read(2, 2)),
    )
}

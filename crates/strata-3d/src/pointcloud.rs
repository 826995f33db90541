use glam::DVec3;

/// A point cloud with per-point positions and optional colors.
#[derive(Debug, Clone, PartialEq)]
pub struct PointCloud {
    // The points in the point cloud.
    points: Vec<[f64; 3]>,
    // The colors of the points.
    colors: Option<Vec<[u8; 3]>>,
}

impl PointCloud {
    /// Create a new point cloud from points and colors (optional).
    ///
    /// PRECONDITION: when colors are given, their length matches the points.
    pub fn new(points: Vec<[f64; 3]>, colors: Option<Vec<[u8; 3]>>) -> Self {
        if let Some(colors) = &colors {
            debug_assert_eq!(points.len(), colors.len());
        }
        Self { points, colors }
    }

    /// Get the number of points in the point cloud.
    #[inline]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Check if the point cloud is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Get as reference the points in the point cloud.
    pub fn points(&self) -> &[[f64; 3]] {
        &self.points
    }

    /// Get as reference the colors of the points in the point cloud.
    pub fn colors(&self) -> Option<&[[u8; 3]]> {
        self.colors.as_deref()
    }

    /// Get the minimum bound of the point cloud.
    pub fn min_bound(&self) -> DVec3 {
        self.points
            .iter()
            .map(|p| DVec3::from_array(*p))
            .fold(DVec3::INFINITY, |a, b| a.min(b))
    }

    /// Get the maximum bound of the point cloud.
    pub fn max_bound(&self) -> DVec3 {
        self.points
            .iter()
            .map(|p| DVec3::from_array(*p))
            .fold(DVec3::NEG_INFINITY, |a, b| a.max(b))
    }

    /// Extract the points inside an axis-aligned box as a new point cloud.
    ///
    /// Colors, when present, follow their points.
    pub fn crop_aabb(&self, min: &[f64; 3], max: &[f64; 3]) -> PointCloud {
        let inside = |p: &[f64; 3]| {
            p[0] >= min[0]
                && p[0] <= max[0]
                && p[1] >= min[1]
                && p[1] <= max[1]
                && p[2] >= min[2]
                && p[2] <= max[2]
        };

        match &self.colors {
            Some(colors) => {
                let (points, colors) = self
                    .points
                    .iter()
                    .zip(colors.iter())
                    .filter(|(p, _)| inside(p))
                    .map(|(p, c)| (*p, *c))
                    .unzip();
                PointCloud::new(points, Some(colors))
            }
            None => {
                let points = self.points.iter().filter(|p| inside(p)).copied().collect();
                PointCloud::new(points, None)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pointcloud() {
        let cloud = PointCloud::new(
            vec![[0.0, 0.0, 0.0], [1.0, 0.0, 0.0]],
            Some(vec![[255, 0, 0], [0, 255, 0]]),
        );

        assert_eq!(cloud.len(), 2);
        assert!(!cloud.is_empty());

        if let Some(colors) = cloud.colors() {
            assert_eq!(colors.len(), 2);
        }

        assert_eq!(cloud.min_bound(), DVec3::new(0.0, 0.0, 0.0));
        assert_eq!(cloud.max_bound(), DVec3::new(1.0, 0.0, 0.0));
    }

    #[test]
    fn test_crop_aabb() {
        let cloud = PointCloud::new(
            vec![[0.0, 0.0, 0.0], [0.5, 0.5, 0.5], [2.0, 2.0, 2.0]],
            Some(vec![[1, 1, 1], [2, 2, 2], [3, 3, 3]]),
        );

        let cropped = cloud.crop_aabb(&[-1.0, -1.0, -1.0], &[1.0, 1.0, 1.0]);
        assert_eq!(cropped.len(), 2);
        assert_eq!(cropped.points()[1], [0.5, 0.5, 0.5]);
        assert_eq!(cropped.colors().unwrap()[1], [2, 2, 2]);
    }

    #[test]
    fn test_crop_aabb_no_colors() {
        let cloud = PointCloud::new(vec![[0.0, 0.0, 0.0], [3.0, 0.0, 0.0]], None);
        let cropped = cloud.crop_aabb(&[-1.0, -1.0, -1.0], &[1.0, 1.0, 1.0]);
        assert_eq!(cropped.len(), 1);
        assert!(cropped.colors().is_none());
    }
}

use strata_3d::pointcloud::PointCloud;

/// One captured depth-sensor frame.
///
/// Frames are immutable once captured and shared read-only as `Arc<Frame>`;
/// the session controller is the only writer of the "current frame" slot.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    /// Monotonic sequence index assigned by the producer.
    pub seq: u64,
    /// Capture timestamp in microseconds.
    pub timestamp_us: u64,
    /// The captured point set.
    pub cloud: PointCloud,
}

impl Frame {
    /// Create a new frame.
    pub fn new(seq: u64, timestamp_us: u64, cloud: PointCloud) -> Self {
        Self {
            seq,
            timestamp_us,
            cloud,
        }
    }
}

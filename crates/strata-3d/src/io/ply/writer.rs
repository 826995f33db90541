use std::io::{BufWriter, Write};
use std::path::Path;

use super::PlyError;
use crate::pointcloud::PointCloud;

/// Write a point cloud as a binary little-endian PLY file.
///
/// Positions are stored as `double` so they round-trip bit exact; colors,
/// when present, as `uchar` red/green/blue.
pub fn write_ply_binary(path: impl AsRef<Path>, cloud: &PointCloud) -> Result<(), PlyError> {
    let file = std::fs::File::create(path)?;
    let mut writer = BufWriter::new(file);

    writer.write_all(b"ply\n")?;
    writer.write_all(b"format binary_little_endian 1.0\n")?;
    writer.write_all(format!("element vertex {}\n", cloud.len()).as_bytes())?;
    writer.write_all(b"property double x\n")?;
    writer.write_all(b"property double y\n")?;
    writer.write_all(b"property double z\n")?;
    if cloud.colors().is_some() {
        writer.write_all(b"property uchar red\n")?;
        writer.write_all(b"property uchar green\n")?;
        writer.write_all(b"property uchar blue\n")?;
    }
    writer.write_all(b"end_header\n")?;

    match cloud.colors() {
        Some(colors) => {
            for (point, color) in cloud.points().iter().zip(colors.iter()) {
                for v in point {
                    writer.write_all(&v.to_le_bytes())?;
                }
                writer.write_all(color)?;
            }
        }
        None => {
            for point in cloud.points() {
                for v in point {
                    writer.write_all(&v.to_le_bytes())?;
                }
            }
        }
    }

    writer.flush()?;
    Ok(())
}

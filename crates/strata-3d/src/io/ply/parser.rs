use std::io::{BufRead, Read};
use std::path::Path;

use super::PlyError;
use crate::pointcloud::PointCloud;

#[derive(Debug, Clone, Copy, PartialEq)]
enum PlyDataType {
    Float32,
    Float64,
    UInt8,
}

impl PlyDataType {
    fn size(&self) -> usize {
        match self {
            PlyDataType::Float32 => 4,
            PlyDataType::Float64 => 8,
            PlyDataType::UInt8 => 1,
        }
    }
}

#[derive(Debug)]
struct PlyPropertyDefinition {
    name: String,
    data_type: PlyDataType,
    offset: usize,
}

struct PlyHeader {
    vertex_count: usize,
    properties: Vec<PlyPropertyDefinition>,
    stride: usize,
}

impl PlyHeader {
    fn find(&self, name: &str) -> Option<&PlyPropertyDefinition> {
        self.properties.iter().find(|p| p.name == name)
    }
}

fn parse_data_type(type_str: &str) -> Result<PlyDataType, PlyError> {
    match type_str {
        "float" | "float32" => Ok(PlyDataType::Float32),
        "double" | "float64" => Ok(PlyDataType::Float64),
        "uchar" | "uint8" => Ok(PlyDataType::UInt8),
        other => Err(PlyError::UnsupportedProperty(other.to_string())),
    }
}

fn parse_header<R: BufRead>(reader: &mut R) -> Result<PlyHeader, PlyError> {
    let mut line = String::new();
    let mut vertex_count = None;
    let mut is_binary_little_endian = false;
    let mut is_ply = false;
    let mut properties = Vec::new();
    let mut offset = 0;

    loop {
        line.clear();
        if reader.read_line(&mut line)? == 0 {
            break;
        }
        let trimmed = line.trim();

        if trimmed == "ply" {
            is_ply = true;
            continue;
        }
        if trimmed == "end_header" {
            break;
        }
        if trimmed.starts_with("comment") {
            continue;
        }

        if trimmed.starts_with("format binary_little_endian") {
            is_binary_little_endian = true;
        } else if trimmed.starts_with("element vertex") {
            vertex_count = trimmed.split_whitespace().last().and_then(|s| s.parse().ok());
        } else if trimmed.starts_with("property") {
            let parts: Vec<&str> = trimmed.split_whitespace().collect();
            if parts.len() < 3 {
                return Err(PlyError::InvalidHeader(trimmed.to_string()));
            }
            let data_type = parse_data_type(parts[1])?;
            properties.push(PlyPropertyDefinition {
                name: parts[2].to_string(),
                data_type,
                offset,
            });
            offset += data_type.size();
        }
    }

    if !is_ply || !is_binary_little_endian {
        return Err(PlyError::InvalidHeader(
            "expected a binary little-endian ply file".to_string(),
        ));
    }

    let vertex_count = vertex_count
        .ok_or_else(|| PlyError::InvalidHeader("missing element vertex count".to_string()))?;

    Ok(PlyHeader {
        vertex_count,
        properties,
        stride: offset,
    })
}

fn read_scalar(buffer: &[u8], def: &PlyPropertyDefinition) -> f64 {
    match def.data_type {
        PlyDataType::Float32 => {
            let mut bytes = [0u8; 4];
            bytes.copy_from_slice(&buffer[def.offset..def.offset + 4]);
            f32::from_le_bytes(bytes) as f64
        }
        PlyDataType::Float64 => {
            let mut bytes = [0u8; 8];
            bytes.copy_from_slice(&buffer[def.offset..def.offset + 8]);
            f64::from_le_bytes(bytes)
        }
        PlyDataType::UInt8 => buffer[def.offset] as f64,
    }
}

/// Read a binary little-endian PLY file into a point cloud.
///
/// Requires `x`, `y`, `z` float properties; `red`/`green`/`blue` uchar
/// properties are picked up when present, other properties are skipped.
pub fn read_ply_binary(path: impl AsRef<Path>) -> Result<PointCloud, PlyError> {
    let file = std::fs::File::open(path)?;
    let mut reader = std::io::BufReader::new(file);
    let header = parse_header(&mut reader)?;

    let mut coord_defs = Vec::with_capacity(3);
    for name in ["x", "y", "z"] {
        let def = header
            .find(name)
            .ok_or_else(|| PlyError::UnsupportedProperty(format!("missing property {name}")))?;
        if def.data_type == PlyDataType::UInt8 {
            return Err(PlyError::UnsupportedProperty(format!(
                "property {name} must be a float type"
            )));
        }
        coord_defs.push(def);
    }

    let color_defs = match (header.find("red"), header.find("green"), header.find("blue")) {
        (Some(r), Some(g), Some(b))
            if [r, g, b].iter().all(|d| d.data_type == PlyDataType::UInt8) =>
        {
            Some([r, g, b])
        }
        _ => None,
    };

    let mut buffer = vec![0u8; header.stride];
    let mut points = Vec::with_capacity(header.vertex_count);
    let mut colors = color_defs.map(|_| Vec::with_capacity(header.vertex_count));

    for _ in 0..header.vertex_count {
        reader.read_exact(&mut buffer)?;

        points.push([
            read_scalar(&buffer, coord_defs[0]),
            read_scalar(&buffer, coord_defs[1]),
            read_scalar(&buffer, coord_defs[2]),
        ]);

        if let (Some(colors), Some(defs)) = (colors.as_mut(), color_defs.as_ref()) {
            colors.push([
                buffer[defs[0].offset],
                buffer[defs[1].offset],
                buffer[defs[2].offset],
            ]);
        }
    }

    Ok(PointCloud::new(points, colors))
}

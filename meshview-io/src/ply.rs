//! PLY format support

use crate::error::{IoError, IoResult};
use crate::registry::MeshReader;
use meshview_core::{CellArray, DataArray, Point3f, PolyMesh, Result, Rgb8, Vector3f};
use ply_rs::{
    parser::Parser,
    ply::{DefaultElement, Property},
};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

/// Per-vertex properties read as the active scalars, in priority order
const SCALAR_PROPERTIES: [&str; 3] = ["intensity", "scalar", "quality"];

pub struct PlyReader;

impl MeshReader for PlyReader {
    fn read_mesh(&self, path: &Path) -> Result<PolyMesh> {
        let file = File::open(path)?;
        let mut reader = BufReader::new(file);
        parse_ply(&mut reader).map_err(|e| e.into_error("PLY"))
    }

    fn format_name(&self) -> &'static str {
        "PLY"
    }
}

/// Parse an ASCII or binary PLY stream
///
/// A file without faces becomes one vertex cell per point.
pub fn parse_ply<R: BufRead>(reader: &mut R) -> IoResult<PolyMesh> {
    let parser = Parser::<DefaultElement>::new();
    let ply = parser
        .read_ply(reader)
        .map_err(|e| IoError::InvalidFormat { format: e.to_string() })?;

    let empty = Vec::new();
    let vertices = ply.payload.get("vertex").unwrap_or(&empty);
    let points = vertices
        .iter()
        .map(|v| {
            Ok(Point3f::new(
                scalar_property(v, "x")?,
                scalar_property(v, "y")?,
                scalar_property(v, "z")?,
            ))
        })
        .collect::<IoResult<Vec<_>>>()?;

    let mut polys = CellArray::new();
    if let Some(faces) = ply.payload.get("face") {
        for (i, face) in faces.iter().enumerate() {
            let indices = face_indices(face)
                .ok_or_else(|| IoError::parse(i, "face without vertex indices"))?;
            polys.push(&indices);
        }
    }

    let mut mesh = if polys.is_empty() {
        PolyMesh::from_points(points)
    } else {
        PolyMesh::from_points_and_polys(points, polys)
    };

    if let Some(normals) = collect_all(vertices, |v| {
        Some(Vector3f::new(
            scalar_property(v, "nx").ok()?,
            scalar_property(v, "ny").ok()?,
            scalar_property(v, "nz").ok()?,
        ))
    }) {
        mesh.set_normals(normals);
    }

    let colors = collect_all(vertices, |v| color(v, ["red", "green", "blue"]))
        .or_else(|| collect_all(vertices, |v| color(v, ["diffuse_red", "diffuse_green", "diffuse_blue"])));
    if let Some(colors) = colors {
        mesh.set_colors(colors);
    }

    for name in SCALAR_PROPERTIES {
        if let Some(values) = collect_all(vertices, |v| scalar_property(v, name).ok()) {
            mesh.set_point_scalars(DataArray::scalars(name, values));
            break;
        }
    }

    Ok(mesh)
}

/// Map every element, or `None` when any element lacks the property
fn collect_all<T>(elements: &[DefaultElement], f: impl Fn(&DefaultElement) -> Option<T>) -> Option<Vec<T>> {
    if elements.is_empty() {
        return None;
    }
    elements.iter().map(f).collect()
}

/// Extract a property value as f32 from a PLY element
fn scalar_property(element: &DefaultElement, name: &str) -> IoResult<f32> {
    match element.get(name) {
        Some(Property::Float(val)) => Ok(*val),
        Some(Property::Double(val)) => Ok(*val as f32),
        Some(Property::Int(val)) => Ok(*val as f32),
        Some(Property::UInt(val)) => Ok(*val as f32),
        Some(Property::Short(val)) => Ok(*val as f32),
        Some(Property::UShort(val)) => Ok(*val as f32),
        Some(Property::Char(val)) => Ok(*val as f32),
        Some(Property::UChar(val)) => Ok(*val as f32),
        _ => Err(IoError::InvalidFormat {
            format: format!("property '{}' not found or not a scalar", name),
        }),
    }
}

fn color(element: &DefaultElement, names: [&str; 3]) -> Option<Rgb8> {
    let channel = |name: &str| match element.get(name) {
        Some(Property::UChar(v)) => Some(*v),
        Some(Property::Float(v)) => Some((v.clamp(0.0, 1.0) * 255.0).round() as u8),
        Some(Property::Double(v)) => Some((v.clamp(0.0, 1.0) * 255.0).round() as u8),
        _ => None,
    };
    Some([channel(names[0])?, channel(names[1])?, channel(names[2])?])
}

/// Extract face indices from a PLY face element
fn face_indices(element: &DefaultElement) -> Option<Vec<usize>> {
    let list = element.get("vertex_indices").or_else(|| element.get("vertex_index"))?;
    Some(match list {
        Property::ListInt(indices) => indices.iter().map(|&i| i as usize).collect(),
        Property::ListUInt(indices) => indices.iter().map(|&i| i as usize).collect(),
        Property::ListShort(indices) => indices.iter().map(|&i| i as usize).collect(),
        Property::ListUShort(indices) => indices.iter().map(|&i| i as usize).collect(),
        Property::ListUChar(indices) => indices.iter().map(|&i| i as usize).collect(),
        Property::ListChar(indices) => indices.iter().map(|&i| i as usize).collect(),
        _ => return None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn parse(text: &str) -> IoResult<PolyMesh> {
        parse_ply(&mut Cursor::new(text.as_bytes().to_vec()))
    }

    #[test]
    fn test_ascii_mesh_with_colors() {
        let text = "ply
format ascii 1.0
element vertex 4
property float x
property float y
property float z
property uchar red
property uchar green
property uchar blue
element face 1
property list uchar int vertex_indices
end_header
0 0 0 255 0 0
1 0 0 0 255 0
1 1 0 0 0 255
0 1 0 10 20 30
4 0 1 2 3
";
        let mesh = parse(text).unwrap();
        assert_eq!(mesh.point_count(), 4);
        assert_eq!(mesh.polys.cell(0), &[0, 1, 2, 3]);
        assert_eq!(mesh.colors.as_ref().unwrap()[3], [10, 20, 30]);
        assert!(mesh.normals.is_none());
    }

    #[test]
    fn test_point_cloud_with_intensity() {
        let text = "ply
format ascii 1.0
element vertex 3
property float x
property float y
property float z
property float nx
property float ny
property float nz
property float intensity
end_header
0 0 0 0 0 1 0.5
1 0 0 0 0 1 2.5
0 1 0 0 0 1 1.0
";
        let mesh = parse(text).unwrap();
        assert_eq!(mesh.verts.len(), 3);
        assert!(mesh.polys.is_empty());
        assert_eq!(mesh.scalar_range(), [0.5, 2.5]);
        assert_eq!(mesh.normals.unwrap()[1], Vector3f::z());
    }

    #[test]
    fn test_missing_coordinate_is_an_error() {
        let text = "ply
format ascii 1.0
element vertex 1
property float x
property float y
end_header
0 0
";
        assert!(parse(text).is_err());
    }

    #[test]
    fn test_garbage_is_rejected() {
        assert!(parse("not a ply file\n").is_err());
    }
}

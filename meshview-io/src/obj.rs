//! OBJ format support

use crate::error::{IoError, IoResult};
use crate::registry::MeshReader;
use meshview_core::{Point3f, PolyMesh, Result, Vector3f};
use obj::ObjData;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

pub struct ObjReader;

impl MeshReader for ObjReader {
    fn read_mesh(&self, path: &Path) -> Result<PolyMesh> {
        let file = File::open(path)?;
        parse_obj(BufReader::new(file)).map_err(|e| e.into_error("OBJ"))
    }

    fn format_name(&self) -> &'static str {
        "Wavefront OBJ"
    }
}

/// Parse OBJ geometry from a reader
///
/// Groups and objects are flattened into a single mesh. Normals are kept
/// only when every corner uses the normal with its own position index,
/// since the mesh stores one normal per point.
pub fn parse_obj<R: BufRead>(reader: R) -> IoResult<PolyMesh> {
    let data = ObjData::load_buf(reader).map_err(|e| IoError::InvalidFormat { format: e.to_string() })?;

    let mut mesh = PolyMesh::new();
    mesh.points = data
        .position
        .iter()
        .map(|p| Point3f::new(p[0], p[1], p[2]))
        .collect();

    let mut normals_match = data.normal.len() == data.position.len();
    let polygons = data
        .objects
        .iter()
        .flat_map(|o| o.groups.iter())
        .flat_map(|g| g.polys.iter());
    for polygon in polygons {
        let ids: Vec<usize> = polygon.0.iter().map(|t| t.0).collect();
        if let Some(&bad) = ids.iter().find(|&&i| i >= mesh.points.len()) {
            return Err(IoError::parse(0, format!("face references missing vertex {}", bad + 1)));
        }
        normals_match &= polygon.0.iter().all(|t| t.2 == Some(t.0));
        match ids.len() {
            0 => {}
            1 => mesh.verts.push(&ids),
            2 => mesh.lines.push(&ids),
            _ => mesh.polys.push(&ids),
        }
    }

    if normals_match && !mesh.polys.is_empty() {
        mesh.set_normals(
            data.normal
                .iter()
                .map(|n| Vector3f::new(n[0], n[1], n[2]))
                .collect(),
        );
    }
    if mesh.cell_count() == 0 {
        let points = std::mem::take(&mut mesh.points);
        mesh = PolyMesh::from_points(points);
    }
    Ok(mesh)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_quad_with_matching_normals() {
        let text = "\
v 0 0 0
v 1 0 0
v 1 1 0
v 0 1 0
vn 0 0 1
vn 0 0 1
vn 0 0 1
vn 0 0 1
f 1//1 2//2 3//3 4//4
";
        let mesh = parse_obj(Cursor::new(text)).unwrap();
        assert_eq!(mesh.point_count(), 4);
        assert_eq!(mesh.polys.cell(0), &[0, 1, 2, 3]);
        assert_eq!(mesh.normals.unwrap()[2], Vector3f::z());
    }

    #[test]
    fn test_mismatched_normal_indices_are_dropped() {
        let text = "\
v 0 0 0
v 1 0 0
v 0 1 0
vn 0 0 1
vn 0 0 -1
vn 1 0 0
f 1//2 2//1 3//3
";
        let mesh = parse_obj(Cursor::new(text)).unwrap();
        assert_eq!(mesh.polys.len(), 1);
        assert!(mesh.normals.is_none());
    }

    #[test]
    fn test_groups_are_flattened() {
        let text = "\
v 0 0 0
v 1 0 0
v 0 1 0
v 0 0 1
g first
f 1 2 3
g second
f 1 3 4
";
        let mesh = parse_obj(Cursor::new(text)).unwrap();
        assert_eq!(mesh.polys.len(), 2);
    }

    #[test]
    fn test_vertices_only_become_point_cloud() {
        let mesh = parse_obj(Cursor::new("v 0 0 0\nv 1 2 3\n")).unwrap();
        assert_eq!(mesh.verts.len(), 2);
    }
}

//! STL format support
//!
//! Binary files are recognised by their size (`84 + 50 * n` bytes), anything
//! else starting with `solid` is parsed as ASCII. Facets share points, so
//! identical coordinates are merged.

use crate::error::{IoError, IoResult};
use crate::registry::MeshReader;
use byteorder::{LittleEndian, ReadBytesExt};
use meshview_core::{CellArray, Point3f, PolyMesh, Result};
use std::collections::HashMap;
use std::io::Cursor;
use std::path::Path;

const HEADER_LEN: usize = 80;
const FACET_LEN: usize = 50;

pub struct StlReader;

impl MeshReader for StlReader {
    fn read_mesh(&self, path: &Path) -> Result<PolyMesh> {
        let bytes = std::fs::read(path)?;
        parse_stl(&bytes).map_err(|e| e.into_error("STL"))
    }

    fn format_name(&self) -> &'static str {
        "STL"
    }
}

/// Parse ASCII or binary STL
pub fn parse_stl(bytes: &[u8]) -> IoResult<PolyMesh> {
    let triangles = if is_binary(bytes) {
        parse_binary(bytes)?
    } else if starts_with_solid(bytes) {
        parse_ascii(bytes)?
    } else {
        return Err(IoError::InvalidFormat {
            format: "neither binary STL nor ASCII 'solid'".to_string(),
        });
    };
    Ok(merge_points(&triangles))
}

fn is_binary(bytes: &[u8]) -> bool {
    if bytes.len() < HEADER_LEN + 4 {
        return false;
    }
    let count = u32::from_le_bytes([bytes[80], bytes[81], bytes[82], bytes[83]]) as usize;
    bytes.len() == HEADER_LEN + 4 + count * FACET_LEN
}

fn starts_with_solid(bytes: &[u8]) -> bool {
    let start = bytes
        .iter()
        .position(|b| !b.is_ascii_whitespace())
        .unwrap_or(bytes.len());
    bytes[start..].starts_with(b"solid")
}

fn parse_binary(bytes: &[u8]) -> IoResult<Vec<[Point3f; 3]>> {
    let mut cursor = Cursor::new(&bytes[HEADER_LEN..]);
    let count = cursor.read_u32::<LittleEndian>()? as usize;
    let mut triangles = Vec::with_capacity(count);
    let read_point = |cursor: &mut Cursor<&[u8]>| -> IoResult<Point3f> {
        Ok(Point3f::new(
            cursor.read_f32::<LittleEndian>()?,
            cursor.read_f32::<LittleEndian>()?,
            cursor.read_f32::<LittleEndian>()?,
        ))
    };
    for _ in 0..count {
        // Facet normals are recomputed later
        read_point(&mut cursor)?;
        let triangle = [
            read_point(&mut cursor)?,
            read_point(&mut cursor)?,
            read_point(&mut cursor)?,
        ];
        cursor.read_u16::<LittleEndian>()?;
        triangles.push(triangle);
    }
    Ok(triangles)
}

fn parse_ascii(bytes: &[u8]) -> IoResult<Vec<[Point3f; 3]>> {
    let text = String::from_utf8_lossy(bytes);
    let mut triangles = Vec::new();
    let mut corners = Vec::with_capacity(3);

    for (index, line) in text.lines().enumerate() {
        let mut tokens = line.split_whitespace();
        match tokens.next() {
            Some("vertex") => {
                let coords = tokens
                    .map(|t| t.parse::<f32>())
                    .collect::<std::result::Result<Vec<_>, _>>()
                    .map_err(|_| IoError::parse(index + 1, "invalid vertex coordinate"))?;
                if coords.len() != 3 {
                    return Err(IoError::parse(index + 1, "vertex needs three coordinates"));
                }
                corners.push(Point3f::new(coords[0], coords[1], coords[2]));
            }
            Some("endloop") => {
                if corners.len() != 3 {
                    return Err(IoError::parse(
                        index + 1,
                        format!("facet with {} vertices", corners.len()),
                    ));
                }
                triangles.push([corners[0], corners[1], corners[2]]);
                corners.clear();
            }
            _ => {}
        }
    }
    if !corners.is_empty() {
        return Err(IoError::UnexpectedEof {
            context: "facet loop".to_string(),
        });
    }
    Ok(triangles)
}

fn point_key(p: &Point3f) -> [u32; 3] {
    // -0.0 and 0.0 are the same point
    let bits = |v: f32| if v == 0.0 { 0 } else { v.to_bits() };
    [bits(p.x), bits(p.y), bits(p.z)]
}

fn merge_points(triangles: &[[Point3f; 3]]) -> PolyMesh {
    let mut ids: HashMap<[u32; 3], usize> = HashMap::new();
    let mut points = Vec::new();
    let mut polys = CellArray::new();
    for triangle in triangles {
        let cell = triangle.map(|p| {
            *ids.entry(point_key(&p)).or_insert_with(|| {
                points.push(p);
                points.len() - 1
            })
        });
        polys.push(&cell);
    }
    PolyMesh::from_points_and_polys(points, polys)
}

#[cfg(test)]
mod tests {
    use super::*;
    use byteorder::WriteBytesExt;

    const ASCII_TETRA: &str = "solid tetra
facet normal 0 0 -1
  outer loop
    vertex 0 0 0
    vertex 0 1 0
    vertex 1 0 0
  endloop
endfacet
facet normal 0 -1 0
  outer loop
    vertex 0 0 0
    vertex 1 0 0
    vertex 0 0 1
  endloop
endfacet
facet normal -1 0 0
  outer loop
    vertex -0 0 0
    vertex 0 0 1
    vertex 0 1 0
  endloop
endfacet
facet normal 1 1 1
  outer loop
    vertex 1 0 0
    vertex 0 1 0
    vertex 0 0 1
  endloop
endfacet
endsolid tetra
";

    #[test]
    fn test_ascii_points_are_merged() {
        let mesh = parse_stl(ASCII_TETRA.as_bytes()).unwrap();
        assert_eq!(mesh.polys.len(), 4);
        assert_eq!(mesh.point_count(), 4);
        mesh.validate().unwrap();
    }

    fn binary(triangles: &[[[f32; 3]; 3]]) -> Vec<u8> {
        // Header deliberately starts with "solid" like many exporters write
        let mut bytes = b"solid binary".to_vec();
        bytes.resize(HEADER_LEN, 0);
        bytes.write_u32::<LittleEndian>(triangles.len() as u32).unwrap();
        for triangle in triangles {
            for v in [0.0f32; 3] {
                bytes.write_f32::<LittleEndian>(v).unwrap();
            }
            for corner in triangle {
                for &v in corner {
                    bytes.write_f32::<LittleEndian>(v).unwrap();
                }
            }
            bytes.write_u16::<LittleEndian>(0).unwrap();
        }
        bytes
    }

    #[test]
    fn test_binary_with_solid_header() {
        let bytes = binary(&[
            [[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]],
            [[1.0, 0.0, 0.0], [1.0, 1.0, 0.0], [0.0, 1.0, 0.0]],
        ]);
        let mesh = parse_stl(&bytes).unwrap();
        assert_eq!(mesh.polys.len(), 2);
        assert_eq!(mesh.point_count(), 4);
        assert_eq!(mesh.polys.cell(1), &[1, 3, 2]);
    }

    #[test]
    fn test_truncated_facet() {
        let text = "solid x\nfacet normal 0 0 1\nouter loop\nvertex 0 0 0\nvertex 1 0 0\nendloop\nendfacet\n";
        assert!(parse_stl(text.as_bytes()).is_err());
    }

    #[test]
    fn test_unknown_content() {
        assert!(parse_stl(b"hello").is_err());
    }
}

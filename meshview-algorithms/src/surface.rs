//! Boundary surface extraction for unstructured grids

use crate::triangulate::strip_triangles;
use meshview_core::{CellArray, CellType, PolyMesh, UnstructuredGrid};
use std::collections::HashMap;

const TETRA_FACES: &[&[usize]] = &[&[0, 1, 3], &[1, 2, 3], &[2, 0, 3], &[0, 2, 1]];
const HEXAHEDRON_FACES: &[&[usize]] = &[
    &[0, 4, 7, 3],
    &[1, 2, 6, 5],
    &[0, 1, 5, 4],
    &[3, 7, 6, 2],
    &[0, 3, 2, 1],
    &[4, 5, 6, 7],
];
const VOXEL_FACES: &[&[usize]] = &[
    &[0, 4, 6, 2],
    &[1, 3, 7, 5],
    &[0, 1, 5, 4],
    &[2, 6, 7, 3],
    &[0, 2, 3, 1],
    &[4, 5, 7, 6],
];
const WEDGE_FACES: &[&[usize]] = &[&[0, 1, 2], &[3, 5, 4], &[0, 3, 4, 1], &[1, 4, 5, 2], &[2, 5, 3, 0]];
const PYRAMID_FACES: &[&[usize]] = &[&[0, 3, 2, 1], &[0, 1, 4], &[1, 2, 4], &[2, 3, 4], &[3, 0, 4]];

/// Local faces of a 3D cell, outward oriented
pub fn cell_faces(cell_type: CellType) -> &'static [&'static [usize]] {
    match cell_type {
        CellType::Tetra => TETRA_FACES,
        CellType::Hexahedron => HEXAHEDRON_FACES,
        CellType::Voxel => VOXEL_FACES,
        CellType::Wedge => WEDGE_FACES,
        CellType::Pyramid => PYRAMID_FACES,
        _ => &[],
    }
}

/// Extract the outer surface of an unstructured grid as polygonal data
///
/// Faces of 3D cells that are shared by two cells are interior and dropped;
/// the rest are emitted with their owning cell's orientation. Vertex, line
/// and 2D cells pass through (pixels are reordered into quads and strips
/// become triangles). Only points referenced by the output survive, and all
/// point and cell attributes follow their cells.
pub fn extract_surface(grid: &UnstructuredGrid) -> PolyMesh {
    let mut verts: Vec<(usize, Vec<usize>)> = Vec::new();
    let mut lines: Vec<(usize, Vec<usize>)> = Vec::new();
    let mut polys: Vec<(usize, Vec<usize>)> = Vec::new();
    // Sorted face ids -> (owning cell, oriented face, use count)
    let mut faces: HashMap<Vec<usize>, (usize, Vec<usize>, u32)> = HashMap::new();
    let mut face_order: Vec<Vec<usize>> = Vec::new();

    for (cell_id, (cell, &cell_type)) in grid.cells.iter().zip(&grid.cell_types).enumerate() {
        match cell_type {
            CellType::Vertex | CellType::PolyVertex => verts.push((cell_id, cell.to_vec())),
            CellType::Line | CellType::PolyLine => lines.push((cell_id, cell.to_vec())),
            CellType::Triangle | CellType::Polygon | CellType::Quad => {
                polys.push((cell_id, cell.to_vec()))
            }
            CellType::Pixel if cell.len() == 4 => {
                polys.push((cell_id, vec![cell[0], cell[1], cell[3], cell[2]]))
            }
            CellType::TriangleStrip => {
                for tri in strip_triangles(cell) {
                    polys.push((cell_id, tri.to_vec()));
                }
            }
            _ => {
                for local in cell_faces(cell_type) {
                    if local.iter().any(|&i| i >= cell.len()) {
                        continue;
                    }
                    let face: Vec<usize> = local.iter().map(|&i| cell[i]).collect();
                    let mut key = face.clone();
                    key.sort_unstable();
                    faces
                        .entry(key.clone())
                        .and_modify(|entry| entry.2 += 1)
                        .or_insert_with(|| {
                            face_order.push(key);
                            (cell_id, face, 1)
                        });
                }
            }
        }
    }

    for key in &face_order {
        if let Some((cell_id, face, 1)) = faces.remove(key) {
            polys.push((cell_id, face));
        }
    }

    // Compact points to those referenced by the output cells
    let mut point_map: Vec<Option<usize>> = vec![None; grid.points.len()];
    let mut kept: Vec<usize> = Vec::new();
    let mut map_cells = |cells: &[(usize, Vec<usize>)]| -> CellArray {
        cells
            .iter()
            .map(|(_, cell)| {
                cell.iter()
                    .filter_map(|&id| {
                        let slot = point_map.get_mut(id)?;
                        Some(*slot.get_or_insert_with(|| {
                            kept.push(id);
                            kept.len() - 1
                        }))
                    })
                    .collect::<Vec<_>>()
            })
            .collect()
    };

    let mut mesh = PolyMesh::new();
    mesh.verts = map_cells(&verts);
    mesh.lines = map_cells(&lines);
    mesh.polys = map_cells(&polys);
    mesh.points = kept.iter().map(|&i| grid.points[i]).collect();

    if let Some(normals) = &grid.normals {
        mesh.set_normals(kept.iter().map(|&i| normals[i]).collect());
    }
    if let Some(colors) = &grid.colors {
        mesh.set_colors(kept.iter().map(|&i| colors[i]).collect());
    }
    if let Some(scalars) = &grid.point_scalars {
        mesh.set_point_scalars(scalars.gather(kept.iter().copied()));
    }
    if let Some(scalars) = &grid.cell_scalars {
        let source = verts.iter().chain(&lines).chain(&polys).map(|(cell_id, _)| *cell_id);
        mesh.set_cell_scalars(scalars.gather(source));
    }

    log::debug!(
        "surface of {} cells: {} points, {} polygons",
        grid.cell_count(),
        mesh.point_count(),
        mesh.polys.len()
    );
    mesh
}

#[cfg(test)]
mod tests {
    use super::*;
    use meshview_core::{DataArray, Point3f};

    fn cube_points(offset: f32) -> Vec<Point3f> {
        vec![
            Point3f::new(offset, 0.0, 0.0),
            Point3f::new(offset + 1.0, 0.0, 0.0),
            Point3f::new(offset + 1.0, 1.0, 0.0),
            Point3f::new(offset, 1.0, 0.0),
            Point3f::new(offset, 0.0, 1.0),
            Point3f::new(offset + 1.0, 0.0, 1.0),
            Point3f::new(offset + 1.0, 1.0, 1.0),
            Point3f::new(offset, 1.0, 1.0),
        ]
    }

    #[test]
    fn test_single_tetra_has_four_faces() {
        let mut grid = UnstructuredGrid::new();
        grid.points = vec![
            Point3f::new(0.0, 0.0, 0.0),
            Point3f::new(1.0, 0.0, 0.0),
            Point3f::new(0.0, 1.0, 0.0),
            Point3f::new(0.0, 0.0, 1.0),
            Point3f::new(5.0, 5.0, 5.0),
        ];
        grid.push_cell(CellType::Tetra, &[0, 1, 2, 3]);
        let mesh = extract_surface(&grid);
        assert_eq!(mesh.polys.len(), 4);
        // The unused point is dropped
        assert_eq!(mesh.point_count(), 4);
    }

    #[test]
    fn test_shared_hexahedron_face_is_interior() {
        let mut grid = UnstructuredGrid::new();
        let mut points = cube_points(0.0);
        points.extend([
            Point3f::new(2.0, 0.0, 0.0),
            Point3f::new(2.0, 1.0, 0.0),
            Point3f::new(2.0, 0.0, 1.0),
            Point3f::new(2.0, 1.0, 1.0),
        ]);
        grid.points = points;
        grid.push_cell(CellType::Hexahedron, &[0, 1, 2, 3, 4, 5, 6, 7]);
        grid.push_cell(CellType::Hexahedron, &[1, 8, 9, 2, 5, 10, 11, 6]);
        grid.cell_scalars = Some(DataArray::scalars("id", vec![10.0, 20.0]));

        let mesh = extract_surface(&grid);
        assert_eq!(mesh.polys.len(), 10);
        assert_eq!(mesh.point_count(), 12);
        let cell_scalars = mesh.cell_scalars.unwrap();
        assert_eq!(cell_scalars.len(), 10);
        assert_eq!(cell_scalars.values.iter().filter(|&&v| v == 10.0).count(), 5);
    }

    #[test]
    fn test_lower_dimensional_cells_pass_through() {
        let mut grid = UnstructuredGrid::new();
        grid.points = cube_points(0.0);
        grid.push_cell(CellType::Vertex, &[0]);
        grid.push_cell(CellType::Line, &[0, 1]);
        grid.push_cell(CellType::Pixel, &[0, 1, 3, 2]);
        grid.point_scalars = Some(DataArray::scalars("s", (0..8).map(|v| v as f32).collect()));

        let mesh = extract_surface(&grid);
        assert_eq!(mesh.verts.len(), 1);
        assert_eq!(mesh.lines.len(), 1);
        assert_eq!(mesh.polys.len(), 1);
        assert_eq!(mesh.point_count(), 4);
        // Pixel corners come out in polygon order
        let quad: Vec<Point3f> = mesh.polys.cell(0).iter().map(|&i| mesh.points[i]).collect();
        assert_eq!(quad[2], Point3f::new(1.0, 1.0, 0.0));
        assert_eq!(mesh.point_scalars.unwrap().len(), 4);
    }
}

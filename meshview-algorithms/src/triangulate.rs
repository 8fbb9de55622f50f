//! Triangle and edge lists for drawing

use meshview_core::{CellArray, PolyMesh};
use std::collections::HashSet;

/// Fan-triangulate one convex polygon
pub fn fan_triangles(cell: &[usize]) -> impl Iterator<Item = [usize; 3]> + '_ {
    (1..cell.len().saturating_sub(1)).map(move |i| [cell[0], cell[i], cell[i + 1]])
}

/// Triangles of a triangle strip, with alternating winding fixed up
pub fn strip_triangles(strip: &[usize]) -> Vec<[usize; 3]> {
    strip
        .windows(3)
        .enumerate()
        .filter(|(_, w)| w[0] != w[1] && w[1] != w[2] && w[0] != w[2])
        .map(|(i, w)| if i % 2 == 0 { [w[0], w[1], w[2]] } else { [w[1], w[0], w[2]] })
        .collect()
}

/// Append the triangles of `strips` to the polygons of `mesh`
///
/// Returns, for every cell of the result in verts/lines/polys order, the
/// index of the source cell when strips are counted after polygons. Callers
/// use it to expand cell data that was attached to the strips.
pub fn append_strips(mesh: &mut PolyMesh, strips: &CellArray) -> Vec<usize> {
    let before = mesh.cell_count();
    let mut source: Vec<usize> = (0..before).collect();
    for (i, strip) in strips.iter().enumerate() {
        for tri in strip_triangles(strip) {
            mesh.polys.push(&tri);
            source.push(before + i);
        }
    }
    source
}

/// Triangulate every polygon of a cell array
pub fn triangulate(polys: &CellArray) -> Vec<[usize; 3]> {
    polys.iter().flat_map(fan_triangles).collect()
}

/// Segments of every line and polyline
pub fn line_segments(lines: &CellArray) -> Vec<[usize; 2]> {
    lines
        .iter()
        .flat_map(|cell| cell.windows(2).map(|w| [w[0], w[1]]))
        .collect()
}

/// Unique polygon edges, used for wireframe drawing
pub fn polygon_edges(mesh: &PolyMesh) -> Vec<[usize; 2]> {
    let mut seen = HashSet::new();
    let mut edges = Vec::new();
    for cell in mesh.polys.iter() {
        for i in 0..cell.len() {
            let (a, b) = (cell[i], cell[(i + 1) % cell.len()]);
            if a != b && seen.insert((a.min(b), a.max(b))) {
                edges.push([a, b]);
            }
        }
    }
    edges
}

#[cfg(test)]
mod tests {
    use super::*;
    use meshview_core::Point3f;

    #[test]
    fn test_fan_triangulation() {
        let polys: CellArray = [vec![0usize, 1, 2, 3, 4], vec![5, 6]].into_iter().collect();
        let tris = triangulate(&polys);
        assert_eq!(tris, vec![[0, 1, 2], [0, 2, 3], [0, 3, 4]]);
    }

    #[test]
    fn test_strip_winding_alternates() {
        let tris = strip_triangles(&[0, 1, 2, 3, 4]);
        assert_eq!(tris, vec![[0, 1, 2], [2, 1, 3], [2, 3, 4]]);
    }

    #[test]
    fn test_strip_skips_degenerate_triangles() {
        let tris = strip_triangles(&[0, 1, 2, 2, 3, 4]);
        assert_eq!(tris.len(), 2);
    }

    #[test]
    fn test_append_strips_maps_source_cells() {
        let polys: CellArray = [[0usize, 1, 2]].into_iter().collect();
        let mut mesh = PolyMesh::from_points_and_polys(vec![Point3f::origin(); 6], polys);
        let strips: CellArray = [vec![1usize, 2, 3, 4], vec![2, 3, 5]].into_iter().collect();
        let source = append_strips(&mut mesh, &strips);
        assert_eq!(mesh.polys.len(), 4);
        assert_eq!(source, vec![0, 1, 1, 2]);
    }

    #[test]
    fn test_polygon_edges_are_unique() {
        let polys: CellArray = [[0usize, 1, 2], [0, 2, 3]].into_iter().collect();
        let mesh = PolyMesh::from_points_and_polys(vec![Point3f::origin(); 4], polys);
        assert_eq!(polygon_edges(&mesh).len(), 5);
    }

    #[test]
    fn test_line_segments() {
        let lines: CellArray = [vec![0usize, 1, 2], vec![3, 4]].into_iter().collect();
        assert_eq!(line_segments(&lines), vec![[0, 1], [1, 2], [3, 4]]);
    }
}

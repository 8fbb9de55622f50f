//! Point normals with sharp-edge splitting

use meshview_core::{PolyMesh, Point3f, Vector3f};
use std::collections::HashMap;

/// Feature angle used when a mesh arrives without normals
pub const DEFAULT_FEATURE_ANGLE: f32 = 90.0;

/// Newell normal of a polygon, unit length or zero for degenerate polygons
pub fn polygon_normal(points: &[Point3f], cell: &[usize]) -> Vector3f {
    let mut n = Vector3f::zeros();
    for (i, &a) in cell.iter().enumerate() {
        let p = points[a];
        let q = points[cell[(i + 1) % cell.len()]];
        n.x += (p.y - q.y) * (p.z + q.z);
        n.y += (p.z - q.z) * (p.x + q.x);
        n.z += (p.x - q.x) * (p.y + q.y);
    }
    n.try_normalize(f32::EPSILON).unwrap_or_else(Vector3f::zeros)
}

/// Compute point normals for a mesh
///
/// Every polygon corner receives the sum of the normals of the polygons
/// around that point whose angle to the corner's own polygon is smaller than
/// `feature_angle` (degrees). Corners of the same point that end up with
/// different smoothing groups are split into separate points, so sharp edges
/// stay crisp. Point scalars and colors are duplicated along with the points;
/// cell order and cell scalars are left untouched.
///
/// Points used only by vertex or line cells get a zero normal.
///
/// # Arguments
/// * `mesh` - Input mesh; existing normals are ignored
/// * `feature_angle` - Angle in degrees above which an edge is sharp
///
/// # Returns
/// * `PolyMesh` - Copy of `mesh` with normals set
pub fn compute_normals(mesh: &PolyMesh, feature_angle: f32) -> PolyMesh {
    let cos_feature = (feature_angle as f64).to_radians().cos() as f32;
    let face_normals: Vec<Vector3f> = mesh
        .polys
        .iter()
        .map(|cell| polygon_normal(&mesh.points, cell))
        .collect();

    // Polygons around each point
    let mut incident: Vec<Vec<usize>> = vec![Vec::new(); mesh.points.len()];
    for (face, cell) in mesh.polys.iter().enumerate() {
        for &id in cell {
            if incident[id].last() != Some(&face) {
                incident[id].push(face);
            }
        }
    }

    let mut out = mesh.clone();
    let mut normals = vec![Vector3f::zeros(); mesh.points.len()];
    // Source point of every output point
    let mut origin: Vec<usize> = (0..mesh.points.len()).collect();
    // (point, polygon) -> output point
    let mut corner_point: HashMap<(usize, usize), usize> = HashMap::new();

    for (point, faces) in incident.iter().enumerate() {
        let mut groups: Vec<(Vec<usize>, usize)> = Vec::new();
        for &face in faces {
            let n = face_normals[face];
            let group: Vec<usize> = faces
                .iter()
                .copied()
                .filter(|&other| other == face || n.dot(&face_normals[other]) > cos_feature)
                .collect();

            let target = match groups.iter().find(|(g, _)| *g == group) {
                Some((_, id)) => *id,
                None => {
                    let sum: Vector3f = group.iter().map(|&f| face_normals[f]).sum();
                    let normal = sum.try_normalize(f32::EPSILON).unwrap_or_else(Vector3f::zeros);
                    let id = if groups.is_empty() {
                        normals[point] = normal;
                        point
                    } else {
                        out.points.push(mesh.points[point]);
                        normals.push(normal);
                        origin.push(point);
                        out.points.len() - 1
                    };
                    groups.push((group, id));
                    id
                }
            };
            corner_point.insert((point, face), target);
        }
    }

    let split = out.points.len() - mesh.points.len();
    if split > 0 {
        log::debug!("split {} points along sharp edges", split);
        out.polys = mesh
            .polys
            .iter()
            .enumerate()
            .map(|(face, cell)| {
                cell.iter()
                    .map(|&id| corner_point.get(&(id, face)).copied().unwrap_or(id))
                    .collect::<Vec<_>>()
            })
            .collect();
        out.point_scalars = mesh.point_scalars.as_ref().map(|s| s.gather(origin.iter().copied()));
        out.colors = mesh
            .colors
            .as_ref()
            .map(|c| origin.iter().map(|&i| c[i]).collect());
    }

    out.normals = Some(normals);
    out
}

/// Compute normals only when the mesh has none
pub fn ensure_normals(mesh: PolyMesh, feature_angle: f32) -> PolyMesh {
    if mesh.normals.is_some() {
        mesh
    } else {
        compute_normals(&mesh, feature_angle)
    }
}

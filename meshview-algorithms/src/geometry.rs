//! Procedural geometry: spheres, tubes and mesh appending

use meshview_core::{CellArray, DataArray, PolyMesh, Point3f, Vector3f};
use std::f32::consts::PI;

/// Tessellated sphere with poles, normals pointing outward
///
/// `theta_resolution` is the number of longitude segments (at least 3) and
/// `phi_resolution` the number of latitude bands (at least 2).
pub fn sphere(center: Point3f, radius: f32, theta_resolution: usize, phi_resolution: usize) -> PolyMesh {
    let theta_res = theta_resolution.max(3);
    let phi_res = phi_resolution.max(2);

    let mut points = vec![center + Vector3f::z() * radius, center - Vector3f::z() * radius];
    let mut normals = vec![Vector3f::z(), -Vector3f::z()];
    for j in 1..phi_res {
        let phi = PI * j as f32 / phi_res as f32;
        for i in 0..theta_res {
            let theta = 2.0 * PI * i as f32 / theta_res as f32;
            let n = Vector3f::new(phi.sin() * theta.cos(), phi.sin() * theta.sin(), phi.cos());
            points.push(center + n * radius);
            normals.push(n);
        }
    }

    let ring = |j: usize, i: usize| 2 + (j - 1) * theta_res + i % theta_res;
    let mut polys = CellArray::new();
    for i in 0..theta_res {
        polys.push(&[0, ring(1, i), ring(1, i + 1)]);
    }
    for j in 1..phi_res - 1 {
        for i in 0..theta_res {
            let (a, b) = (ring(j, i), ring(j, i + 1));
            let (c, d) = (ring(j + 1, i), ring(j + 1, i + 1));
            polys.push(&[a, c, b]);
            polys.push(&[b, c, d]);
        }
    }
    for i in 0..theta_res {
        polys.push(&[1, ring(phi_res - 1, i + 1), ring(phi_res - 1, i)]);
    }

    let mut mesh = PolyMesh::from_points_and_polys(points, polys);
    mesh.set_normals(normals);
    mesh
}

/// Uncapped tube of `sides` faces around the segment `a`-`b`
///
/// Returns an empty mesh for a zero-length segment.
pub fn tube(a: Point3f, b: Point3f, radius: f32, sides: usize) -> PolyMesh {
    let sides = sides.max(3);
    let axis = match (b - a).try_normalize(f32::EPSILON) {
        Some(axis) => axis,
        None => return PolyMesh::new(),
    };
    // Any vector not parallel to the axis seeds the frame
    let seed = if axis.x.abs() < 0.9 { Vector3f::x() } else { Vector3f::y() };
    let u = axis.cross(&seed).normalize();
    let v = axis.cross(&u);

    let mut points = Vec::with_capacity(2 * sides);
    let mut normals = Vec::with_capacity(2 * sides);
    for end in [a, b] {
        for k in 0..sides {
            let angle = 2.0 * PI * k as f32 / sides as f32;
            let n = u * angle.cos() + v * angle.sin();
            points.push(end + n * radius);
            normals.push(n);
        }
    }

    let polys: CellArray = (0..sides)
        .map(|k| {
            let next = (k + 1) % sides;
            [k, next, sides + next, sides + k]
        })
        .collect();
    let mut mesh = PolyMesh::from_points_and_polys(points, polys);
    mesh.set_normals(normals);
    mesh
}

/// Append meshes into one, shifting cell ids
pub fn append_meshes<'a>(meshes: impl IntoIterator<Item = &'a PolyMesh>) -> PolyMesh {
    let mut out = PolyMesh::new();
    for mesh in meshes {
        out.append(mesh);
    }
    out
}

/// Copy `glyph` to every point, scaled per point, with a constant scalar per copy
///
/// The glyph is assumed centered at the origin.
pub fn glyph_points(
    glyph: &PolyMesh,
    centers: &[Point3f],
    scales: &[f32],
    scalars: Option<&[f32]>,
    scalar_name: &str,
) -> PolyMesh {
    let mut out = PolyMesh::new();
    for (i, center) in centers.iter().enumerate() {
        let scale = scales.get(i).copied().unwrap_or(1.0);
        let mut copy = glyph.clone();
        for p in &mut copy.points {
            *p = center + p.coords * scale;
        }
        if let Some(values) = scalars {
            let value = values.get(i).copied().unwrap_or(0.0);
            copy.set_point_scalars(DataArray::scalars(scalar_name, vec![value; copy.point_count()]));
        }
        out.append(&copy);
    }
    out
}

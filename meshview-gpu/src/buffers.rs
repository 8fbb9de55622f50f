//! CPU-side vertex and index data for drawing a mesh

use bytemuck::{Pod, Zeroable};
use meshview_algorithms::{fan_triangles, line_segments, polygon_edges, triangulate};
use meshview_core::{srgb_to_linear, ColorTransferFunction, PolyMesh, Rgb};

const WHITE: Rgb = [1.0, 1.0, 1.0];

/// Vertex layout shared by every mesh pipeline
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Pod, Zeroable)]
pub struct MeshVertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub color: [f32; 3],
}

impl MeshVertex {
    const ATTRIBUTES: [wgpu::VertexAttribute; 3] = wgpu::vertex_attr_array![
        0 => Float32x3,
        1 => Float32x3,
        2 => Float32x3
    ];

    /// Buffer layout; points use it per instance
    pub fn desc(step_mode: wgpu::VertexStepMode) -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<MeshVertex>() as wgpu::BufferAddress,
            step_mode,
            attributes: &Self::ATTRIBUTES,
        }
    }
}

/// Everything needed to draw one mesh
///
/// `triangles`, `lines` and `edges` index into `vertices`; `points` holds
/// one instance per vertex cell.
#[derive(Debug, Clone, Default)]
pub struct MeshBuffers {
    pub vertices: Vec<MeshVertex>,
    pub triangles: Vec<u32>,
    pub lines: Vec<u32>,
    pub edges: Vec<u32>,
    pub points: Vec<MeshVertex>,
}

impl MeshBuffers {
    /// Build buffers, coloring by direct colors, point scalars or cell
    /// scalars in that order of preference
    pub fn from_mesh(mesh: &PolyMesh, lookup_table: &ColorTransferFunction) -> Self {
        match &mesh.cell_scalars {
            Some(_) if mesh.colors.is_none() && mesh.point_scalars.is_none() => {
                Self::per_cell(mesh, lookup_table)
            }
            _ => Self::shared(mesh, lookup_table),
        }
    }

    fn shared(mesh: &PolyMesh, lookup_table: &ColorTransferFunction) -> Self {
        let colors: Vec<Rgb> = match (&mesh.colors, &mesh.point_scalars) {
            (Some(colors), _) => colors
                .iter()
                .map(|&c| c.map(|v| v as f32 / 255.0))
                .collect(),
            (None, Some(scalars)) => (0..scalars.len())
                .map(|i| lookup_table.map(scalars.mapped_value(i)))
                .collect(),
            (None, None) => vec![WHITE; mesh.point_count()],
        };
        let colors: Vec<Rgb> = colors.into_iter().map(linear_color).collect();

        let vertices: Vec<MeshVertex> = mesh
            .points
            .iter()
            .enumerate()
            .map(|(i, p)| MeshVertex {
                position: [p.x, p.y, p.z],
                normal: normal_of(mesh, i),
                color: colors.get(i).copied().unwrap_or(WHITE),
            })
            .collect();

        let points = mesh
            .verts
            .iter()
            .flatten()
            .filter_map(|&id| vertices.get(id).copied())
            .collect();

        Self {
            triangles: triangulate(&mesh.polys).into_iter().flatten().map(|i| i as u32).collect(),
            lines: line_segments(&mesh.lines).into_iter().flatten().map(|i| i as u32).collect(),
            edges: polygon_edges(mesh).into_iter().flatten().map(|i| i as u32).collect(),
            points,
            vertices,
        }
    }

    /// Unshared vertices so each cell gets a flat color
    fn per_cell(mesh: &PolyMesh, lookup_table: &ColorTransferFunction) -> Self {
        let mut buffers = Self::default();
        let Some(scalars) = &mesh.cell_scalars else {
            return buffers;
        };
        let cell_color = |cell: usize| {
            if cell < scalars.len() {
                linear_color(lookup_table.map(scalars.mapped_value(cell)))
            } else {
                WHITE
            }
        };
        let vertex = |id: usize, color: Rgb| {
            let p = mesh.points[id];
            MeshVertex {
                position: [p.x, p.y, p.z],
                normal: normal_of(mesh, id),
                color,
            }
        };

        let mut cell = 0;
        for ids in mesh.verts.iter() {
            let color = cell_color(cell);
            buffers.points.extend(ids.iter().map(|&id| vertex(id, color)));
            cell += 1;
        }
        for ids in mesh.lines.iter() {
            let color = cell_color(cell);
            for segment in ids.windows(2) {
                buffers.push_indexed(segment.iter().map(|&id| vertex(id, color)), Primitive::Line);
            }
            cell += 1;
        }
        for ids in mesh.polys.iter() {
            let color = cell_color(cell);
            for triangle in fan_triangles(ids) {
                buffers.push_indexed(triangle.iter().map(|&id| vertex(id, color)), Primitive::Triangle);
            }
            for i in 0..ids.len() {
                let (a, b) = (ids[i], ids[(i + 1) % ids.len()]);
                if a != b {
                    buffers.push_indexed([vertex(a, color), vertex(b, color)], Primitive::Edge);
                }
            }
            cell += 1;
        }
        buffers
    }

    fn push_indexed(&mut self, vertices: impl IntoIterator<Item = MeshVertex>, primitive: Primitive) {
        for v in vertices {
            let index = self.vertices.len() as u32;
            self.vertices.push(v);
            match primitive {
                Primitive::Triangle => self.triangles.push(index),
                Primitive::Line => self.lines.push(index),
                Primitive::Edge => self.edges.push(index),
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.triangles.is_empty() && self.lines.is_empty() && self.points.is_empty()
    }
}

#[derive(Clone, Copy)]
enum Primitive {
    Triangle,
    Line,
    Edge,
}

fn normal_of(mesh: &PolyMesh, id: usize) -> [f32; 3] {
    mesh.normals
        .as_ref()
        .and_then(|normals| normals.get(id))
        .map(|n| [n.x, n.y, n.z])
        .unwrap_or([0.0; 3])
}

/// Vertex colors are written to sRGB targets, which encode on store
pub fn linear_color(display: Rgb) -> Rgb {
    display.map(srgb_to_linear)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use meshview_core::{linear_to_srgb, CellArray, DataArray, Point3f, RAMP_HIGH_COLOR, RAMP_LOW_COLOR};

    fn quad() -> PolyMesh {
        let points = vec![
            Point3f::new(0.0, 0.0, 0.0),
            Point3f::new(1.0, 0.0, 0.0),
            Point3f::new(1.0, 1.0, 0.0),
            Point3f::new(0.0, 1.0, 0.0),
        ];
        let mut polys = CellArray::new();
        polys.push(&[0, 1, 2, 3]);
        PolyMesh::from_points_and_polys(points, polys)
    }

    #[test]
    fn test_point_scalars_go_through_lookup_table() {
        let mut mesh = quad();
        mesh.set_point_scalars(DataArray::scalars("s", vec![0.0, 1.0, 1.0, 0.0]));
        let lut = ColorTransferFunction::scalar_ramp([0.0, 1.0]);
        let buffers = MeshBuffers::from_mesh(&mesh, &lut);

        assert_eq!(buffers.vertices.len(), 4);
        assert_eq!(buffers.triangles, vec![0, 1, 2, 0, 2, 3]);
        assert_eq!(buffers.edges.len(), 8);
        // The sRGB target encodes back to the ramp's display colors
        for (got, want) in buffers.vertices[0].color.iter().zip(RAMP_LOW_COLOR) {
            assert_relative_eq!(linear_to_srgb(*got), want, epsilon = 1e-4);
        }
        for (got, want) in buffers.vertices[1].color.iter().zip(RAMP_HIGH_COLOR) {
            assert_relative_eq!(linear_to_srgb(*got), want, epsilon = 1e-4);
        }
        assert!(buffers.vertices[1].color[0] < RAMP_HIGH_COLOR[0]);
    }

    #[test]
    fn test_direct_colors_win() {
        let mut mesh = quad();
        mesh.set_colors(vec![[255, 0, 128]; 4]);
        mesh.set_point_scalars(DataArray::scalars("s", vec![0.0; 4]));
        let buffers = MeshBuffers::from_mesh(&mesh, &ColorTransferFunction::scalar_ramp([0.0, 1.0]));
        let [r, g, b] = buffers.vertices[3].color;
        assert_relative_eq!(r, 1.0, epsilon = 1e-5);
        assert_eq!(g, 0.0);
        assert_relative_eq!(linear_to_srgb(b), 128.0 / 255.0, epsilon = 1e-4);
    }

    #[test]
    fn test_cell_scalars_unshare_vertices() {
        let mut mesh = quad();
        mesh.polys.push(&[1, 2, 3]);
        mesh.set_cell_scalars(DataArray::scalars("c", vec![0.0, 1.0]));
        let lut = ColorTransferFunction::scalar_ramp([0.0, 1.0]);
        let buffers = MeshBuffers::from_mesh(&mesh, &lut);

        // Two triangles for the quad, one for the triangle
        assert_eq!(buffers.triangles.len(), 9);
        assert_eq!(buffers.edges.len(), 14);
        let last = buffers.vertices[buffers.triangles[8] as usize];
        assert_relative_eq!(linear_to_srgb(last.color[1]), RAMP_HIGH_COLOR[1], epsilon = 1e-4);
    }

    #[test]
    fn test_points_lines_and_plain_white() {
        let mut mesh = PolyMesh::from_points(vec![Point3f::origin(), Point3f::new(1.0, 0.0, 0.0)]);
        mesh.lines.push(&[0, 1]);
        let buffers = MeshBuffers::from_mesh(&mesh, &ColorTransferFunction::scalar_ramp([0.0, 1.0]));
        assert_eq!(buffers.points.len(), 2);
        assert_eq!(buffers.lines, vec![0, 1]);
        assert!(buffers.triangles.is_empty());
        assert_eq!(buffers.points[1].color, WHITE);
        assert_eq!(buffers.points[1].normal, [0.0; 3]);
        assert!(!buffers.is_empty());
    }

    #[test]
    fn test_vertex_layout_size() {
        assert_eq!(std::mem::size_of::<MeshVertex>(), 36);
        let layout = MeshVertex::desc(wgpu::VertexStepMode::Instance);
        assert_eq!(layout.array_stride, 36);
        assert_eq!(layout.attributes.len(), 3);
    }
}

//! One mesh in the scene plus how to draw it

use meshview_core::{Bounds, ColorTransferFunction, Drawable, PolyMesh};
use meshview_gpu::Representation;

/// Point size in pixels for vertex cells
pub const DEFAULT_POINT_SIZE: f32 = 3.0;

#[derive(Debug, Clone)]
pub struct RenderItem {
    pub mesh: PolyMesh,
    pub lookup_table: ColorTransferFunction,
    pub point_size: f32,
    pub representation: Representation,
    /// Sample the attached volume through object-space texture coordinates
    pub textured: bool,
}

impl RenderItem {
    /// Wrap `mesh` with a ramp over its scalar range
    pub fn new(mesh: PolyMesh) -> Self {
        let lookup_table = ColorTransferFunction::scalar_ramp(mesh.scalar_range());
        Self {
            mesh,
            lookup_table,
            point_size: DEFAULT_POINT_SIZE,
            representation: Representation::default(),
            textured: false,
        }
    }

    pub fn bounds(&self) -> Option<Bounds> {
        self.mesh.bounding_box()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use meshview_core::{DataArray, Point3f};

    #[test]
    fn test_ramp_covers_scalar_range() {
        let mut mesh = PolyMesh::from_points(vec![Point3f::origin(), Point3f::new(1.0, 0.0, 0.0)]);
        mesh.set_point_scalars(DataArray::scalars("t", vec![-2.0, 5.0]));
        let item = RenderItem::new(mesh);
        let stops = item.lookup_table.stops();
        assert_eq!(stops.len(), 2);
        assert_eq!(stops[0].value, -2.0);
        assert_eq!(stops[1].value, 5.0);
        assert_eq!(item.point_size, 3.0);
        assert!(!item.textured);
    }
}

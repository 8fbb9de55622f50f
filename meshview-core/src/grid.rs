//! Unstructured grids of mixed linear cells

use crate::{mesh::{CellArray, DataArray}, point::*};
use serde::{Deserialize, Serialize};

/// Linear cell types, numbered as in VTK files
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CellType {
    Vertex,
    PolyVertex,
    Line,
    PolyLine,
    Triangle,
    TriangleStrip,
    Polygon,
    Pixel,
    Quad,
    Tetra,
    Voxel,
    Hexahedron,
    Wedge,
    Pyramid,
}

impl CellType {
    /// Map a VTK cell type id; `None` for nonlinear or unknown cells
    pub fn from_vtk_id(id: u32) -> Option<Self> {
        Some(match id {
            1 => CellType::Vertex,
            2 => CellType::PolyVertex,
            3 => CellType::Line,
            4 => CellType::PolyLine,
            5 => CellType::Triangle,
            6 => CellType::TriangleStrip,
            7 => CellType::Polygon,
            8 => CellType::Pixel,
            9 => CellType::Quad,
            10 => CellType::Tetra,
            11 => CellType::Voxel,
            12 => CellType::Hexahedron,
            13 => CellType::Wedge,
            14 => CellType::Pyramid,
            _ => return None,
        })
    }

    /// Topological dimension of the cell
    pub fn dimension(self) -> u8 {
        match self {
            CellType::Vertex | CellType::PolyVertex => 0,
            CellType::Line | CellType::PolyLine => 1,
            CellType::Triangle
            | CellType::TriangleStrip
            | CellType::Polygon
            | CellType::Pixel
            | CellType::Quad => 2,
            _ => 3,
        }
    }
}

/// Points plus arbitrary cells, each tagged with its type
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UnstructuredGrid {
    pub points: Vec<Point3f>,
    pub cells: CellArray,
    pub cell_types: Vec<CellType>,
    pub normals: Option<Vec<Vector3f>>,
    pub point_scalars: Option<DataArray>,
    pub cell_scalars: Option<DataArray>,
    pub colors: Option<Vec<Rgb8>>,
}

impl UnstructuredGrid {
    pub fn new() -> Self {
        Self::default()
    }

    /// Push a cell with its type
    pub fn push_cell(&mut self, cell_type: CellType, ids: &[usize]) {
        self.cells.push(ids);
        self.cell_types.push(cell_type);
    }

    pub fn cell_count(&self) -> usize {
        self.cell_types.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vtk_ids() {
        assert_eq!(CellType::from_vtk_id(10), Some(CellType::Tetra));
        assert_eq!(CellType::from_vtk_id(12), Some(CellType::Hexahedron));
        assert_eq!(CellType::from_vtk_id(24), None);
        assert_eq!(CellType::Pixel.dimension(), 2);
        assert_eq!(CellType::Wedge.dimension(), 3);
    }
}

//! Polygonal mesh data structures

use crate::point::*;
use serde::{Deserialize, Serialize};

/// Variable-length cells stored as flat connectivity plus offsets
///
/// Cell `i` spans `connectivity[offsets[i]..offsets[i + 1]]`; `offsets`
/// always starts with `0`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CellArray {
    offsets: Vec<usize>,
    connectivity: Vec<usize>,
}

impl CellArray {
    /// Create an empty cell array
    pub fn new() -> Self {
        Self {
            offsets: vec![0],
            connectivity: Vec::new(),
        }
    }

    /// Build from VTK-style offsets and connectivity
    ///
    /// Accepts offsets either with or without the leading zero.
    pub fn from_offsets(offsets: Vec<usize>, connectivity: Vec<usize>) -> Option<Self> {
        let mut offsets = offsets;
        if offsets.first() != Some(&0) {
            offsets.insert(0, 0);
        }
        let monotonic = offsets.windows(2).all(|w| w[0] <= w[1]);
        if !monotonic || offsets.last().copied() != Some(connectivity.len()) {
            return None;
        }
        Some(Self { offsets, connectivity })
    }

    /// Push a single cell
    pub fn push(&mut self, cell: &[usize]) {
        self.connectivity.extend_from_slice(cell);
        self.offsets.push(self.connectivity.len());
    }

    /// Number of cells
    pub fn len(&self) -> usize {
        self.offsets.len() - 1
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Cell by index
    pub fn cell(&self, index: usize) -> &[usize] {
        &self.connectivity[self.offsets[index]..self.offsets[index + 1]]
    }

    /// Iterate over cells
    pub fn iter(&self) -> impl Iterator<Item = &[usize]> + '_ {
        self.offsets
            .windows(2)
            .map(move |w| &self.connectivity[w[0]..w[1]])
    }

    /// Total number of point references
    pub fn connectivity_len(&self) -> usize {
        self.connectivity.len()
    }

    /// Largest referenced point id
    pub fn max_point_id(&self) -> Option<usize> {
        self.connectivity.iter().copied().max()
    }

    /// Append all cells of `other`, shifting point ids by `point_offset`
    pub fn append(&mut self, other: &CellArray, point_offset: usize) {
        for cell in other.iter() {
            self.connectivity.extend(cell.iter().map(|&id| id + point_offset));
            self.offsets.push(self.connectivity.len());
        }
    }

    /// Rewrite every point id through `map`
    pub fn remap(&mut self, map: impl Fn(usize) -> usize) {
        for id in &mut self.connectivity {
            *id = map(*id);
        }
    }
}

impl Default for CellArray {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: AsRef<[usize]>> FromIterator<C> for CellArray {
    fn from_iter<I: IntoIterator<Item = C>>(iter: I) -> Self {
        let mut cells = CellArray::new();
        for cell in iter {
            cells.push(cell.as_ref());
        }
        cells
    }
}

/// A named attribute array of `components`-sized tuples
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataArray {
    pub name: String,
    pub components: usize,
    pub values: Vec<f32>,
}

impl DataArray {
    /// Create a data array; `values.len()` must be a multiple of `components`
    pub fn new(name: impl Into<String>, components: usize, values: Vec<f32>) -> Self {
        let components = components.max(1);
        debug_assert_eq!(values.len() % components, 0);
        Self {
            name: name.into(),
            components,
            values,
        }
    }

    /// Single-component array
    pub fn scalars(name: impl Into<String>, values: Vec<f32>) -> Self {
        Self::new(name, 1, values)
    }

    /// Number of tuples
    pub fn len(&self) -> usize {
        self.values.len() / self.components
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Tuple by index
    pub fn tuple(&self, index: usize) -> &[f32] {
        let start = index * self.components;
        &self.values[start..start + self.components]
    }

    /// Value used for color mapping: the component itself for one-component
    /// arrays, the tuple magnitude otherwise
    pub fn mapped_value(&self, index: usize) -> f32 {
        let tuple = self.tuple(index);
        if tuple.len() == 1 {
            tuple[0]
        } else {
            tuple.iter().map(|v| v * v).sum::<f32>().sqrt()
        }
    }

    /// Range of [`DataArray::mapped_value`] over all tuples
    pub fn range(&self) -> Option<[f32; 2]> {
        let mut values = (0..self.len()).map(|i| self.mapped_value(i)).filter(|v| v.is_finite());
        let first = values.next()?;
        Some(values.fold([first, first], |[lo, hi], v| [lo.min(v), hi.max(v)]))
    }

    /// Gather tuples by index into a new array
    pub fn gather(&self, indices: impl IntoIterator<Item = usize>) -> Self {
        let mut values = Vec::new();
        for index in indices {
            values.extend_from_slice(self.tuple(index));
        }
        Self::new(self.name.clone(), self.components, values)
    }
}

/// A polygonal mesh: points, vertex/line/polygon cells and attributes
///
/// Cell ids follow the order verts, lines, polys, which is also the order of
/// `cell_scalars` tuples.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolyMesh {
    pub points: Vec<Point3f>,
    pub verts: CellArray,
    pub lines: CellArray,
    pub polys: CellArray,
    pub normals: Option<Vec<Vector3f>>,
    pub point_scalars: Option<DataArray>,
    pub cell_scalars: Option<DataArray>,
    pub colors: Option<Vec<Rgb8>>,
}

impl PolyMesh {
    /// Create a new empty mesh
    pub fn new() -> Self {
        Self {
            points: Vec::new(),
            verts: CellArray::new(),
            lines: CellArray::new(),
            polys: CellArray::new(),
            normals: None,
            point_scalars: None,
            cell_scalars: None,
            colors: None,
        }
    }

    /// Create a mesh from points and polygons
    pub fn from_points_and_polys(points: Vec<Point3f>, polys: CellArray) -> Self {
        Self {
            points,
            polys,
            ..Self::new()
        }
    }

    /// Create a point cloud: one vertex cell per point
    pub fn from_points(points: Vec<Point3f>) -> Self {
        let verts = (0..points.len()).map(|i| [i]).collect();
        Self {
            points,
            verts,
            ..Self::new()
        }
    }

    /// Get the number of points
    pub fn point_count(&self) -> usize {
        self.points.len()
    }

    /// Get the number of cells of all kinds
    pub fn cell_count(&self) -> usize {
        self.verts.len() + self.lines.len() + self.polys.len()
    }

    /// Check if the mesh has no points
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Add a point to the mesh
    pub fn add_point(&mut self, point: Point3f) -> usize {
        let index = self.points.len();
        self.points.push(point);
        index
    }

    /// Set point normals; ignored when the count does not match
    pub fn set_normals(&mut self, normals: Vec<Vector3f>) {
        if normals.len() == self.points.len() {
            self.normals = Some(normals);
        }
    }

    /// Set direct point colors; ignored when the count does not match
    pub fn set_colors(&mut self, colors: Vec<Rgb8>) {
        if colors.len() == self.points.len() {
            self.colors = Some(colors);
        }
    }

    /// Set point scalars; ignored when the tuple count does not match
    pub fn set_point_scalars(&mut self, scalars: DataArray) {
        if scalars.len() == self.points.len() {
            self.point_scalars = Some(scalars);
        }
    }

    /// Set cell scalars; ignored when the tuple count does not match
    pub fn set_cell_scalars(&mut self, scalars: DataArray) {
        if scalars.len() == self.cell_count() {
            self.cell_scalars = Some(scalars);
        }
    }

    /// Scalar range used for color mapping
    ///
    /// Point scalars win over cell scalars; a mesh without scalars maps
    /// over `[0, 1]`.
    pub fn scalar_range(&self) -> [f32; 2] {
        self.point_scalars
            .as_ref()
            .and_then(DataArray::range)
            .or_else(|| self.cell_scalars.as_ref().and_then(DataArray::range))
            .unwrap_or([0.0, 1.0])
    }

    /// Check that every cell references an existing point
    pub fn validate(&self) -> crate::Result<()> {
        let count = self.points.len();
        for (kind, cells) in [("vertex", &self.verts), ("line", &self.lines), ("polygon", &self.polys)] {
            if let Some(max) = cells.max_point_id() {
                if max >= count {
                    return Err(crate::Error::InvalidData(format!(
                        "{} cell references point {} but the mesh has {} points",
                        kind, max, count
                    )));
                }
            }
        }
        Ok(())
    }

    /// Append another mesh
    ///
    /// Attributes survive only when both meshes carry them, and cell
    /// scalars are dropped because appending reorders cell ids.
    pub fn append(&mut self, other: &PolyMesh) {
        let offset = self.points.len();
        let was_empty = self.points.is_empty();

        self.normals = match (self.normals.take(), &other.normals) {
            (Some(mut a), Some(b)) => {
                a.extend_from_slice(b);
                Some(a)
            }
            (None, Some(b)) if was_empty => Some(b.clone()),
            _ => None,
        };
        self.colors = match (self.colors.take(), &other.colors) {
            (Some(mut a), Some(b)) => {
                a.extend_from_slice(b);
                Some(a)
            }
            (None, Some(b)) if was_empty => Some(b.clone()),
            _ => None,
        };
        self.point_scalars = match (self.point_scalars.take(), &other.point_scalars) {
            (Some(mut a), Some(b)) if a.components == b.components => {
                a.values.extend_from_slice(&b.values);
                Some(a)
            }
            (None, Some(b)) if was_empty => Some(b.clone()),
            _ => None,
        };
        self.cell_scalars = if was_empty { other.cell_scalars.clone() } else { None };

        self.points.extend_from_slice(&other.points);
        self.verts.append(&other.verts, offset);
        self.lines.append(&other.lines, offset);
        self.polys.append(&other.polys, offset);
    }

    /// Clear the mesh
    pub fn clear(&mut self) {
        *self = Self::new();
    }
}

impl Default for PolyMesh {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quad() -> PolyMesh {
        let points = vec![
            Point3f::new(0.0, 0.0, 0.0),
            Point3f::new(1.0, 0.0, 0.0),
            Point3f::new(1.0, 1.0, 0.0),
            Point3f::new(0.0, 1.0, 0.0),
        ];
        PolyMesh::from_points_and_polys(points, [[0usize, 1, 2, 3]].into_iter().collect())
    }

    #[test]
    fn test_cell_array_iteration() {
        let cells: CellArray = vec![vec![0usize, 1, 2], vec![2, 3]].into_iter().collect();
        assert_eq!(cells.len(), 2);
        assert_eq!(cells.cell(0), &[0, 1, 2]);
        assert_eq!(cells.iter().nth(1).unwrap(), &[2, 3]);
        assert_eq!(cells.max_point_id(), Some(3));
    }

    #[test]
    fn test_cell_array_from_offsets() {
        let cells = CellArray::from_offsets(vec![3, 5], vec![0, 1, 2, 2, 3]).unwrap();
        assert_eq!(cells.len(), 2);
        assert!(CellArray::from_offsets(vec![0, 4], vec![0, 1]).is_none());
    }

    #[test]
    fn test_scalar_range_prefers_point_scalars() {
        let mut mesh = quad();
        assert_eq!(mesh.scalar_range(), [0.0, 1.0]);

        mesh.set_cell_scalars(DataArray::scalars("c", vec![7.0]));
        assert_eq!(mesh.scalar_range(), [7.0, 7.0]);

        mesh.set_point_scalars(DataArray::scalars("p", vec![-1.0, 2.0, 0.5, 3.0]));
        assert_eq!(mesh.scalar_range(), [-1.0, 3.0]);
    }

    #[test]
    fn test_vector_scalars_use_magnitude() {
        let array = DataArray::new("v", 3, vec![3.0, 4.0, 0.0, 0.0, 0.0, 1.0]);
        assert_eq!(array.range(), Some([1.0, 5.0]));
    }

    #[test]
    fn test_mismatched_attributes_are_ignored() {
        let mut mesh = quad();
        mesh.set_point_scalars(DataArray::scalars("p", vec![1.0]));
        assert!(mesh.point_scalars.is_none());
        mesh.set_colors(vec![[255, 0, 0]; 3]);
        assert!(mesh.colors.is_none());
    }

    #[test]
    fn test_append_shifts_ids() {
        let mut a = quad();
        let b = quad();
        a.append(&b);
        assert_eq!(a.point_count(), 8);
        assert_eq!(a.polys.len(), 2);
        assert_eq!(a.polys.cell(1), &[4, 5, 6, 7]);
        assert!(a.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_dangling_ids() {
        let mesh = PolyMesh::from_points_and_polys(
            vec![Point3f::origin()],
            [[0usize, 1, 2]].into_iter().collect(),
        );
        assert!(mesh.validate().is_err());
    }
}

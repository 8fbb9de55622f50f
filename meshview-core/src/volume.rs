//! Volumetric scalar fields on regular grids

use crate::{DataArray, Modified, Point3f, TimeStamp, Vector3f};
use serde::{Deserialize, Serialize};

/// A regular 3D grid of samples with 1, 3 or 4 components per sample
///
/// Samples are stored x-fastest, then y, then z.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VolumeField {
    pub dimensions: [usize; 3],
    pub origin: Point3f,
    pub spacing: Vector3f,
    scalars: Option<DataArray>,
    mtime: TimeStamp,
}

impl VolumeField {
    /// Create a field without scalars
    pub fn new(dimensions: [usize; 3]) -> Self {
        Self {
            dimensions,
            origin: Point3f::origin(),
            spacing: Vector3f::new(1.0, 1.0, 1.0),
            scalars: None,
            mtime: TimeStamp::now(),
        }
    }

    /// Create a field with scalars; the tuple count must match the grid
    pub fn with_scalars(dimensions: [usize; 3], scalars: DataArray) -> crate::Result<Self> {
        let mut field = Self::new(dimensions);
        field.set_scalars(scalars)?;
        Ok(field)
    }

    /// Number of grid samples
    pub fn sample_count(&self) -> usize {
        self.dimensions.iter().product()
    }

    /// Linear index of sample `(i, j, k)`
    pub fn index(&self, i: usize, j: usize, k: usize) -> usize {
        i + self.dimensions[0] * (j + self.dimensions[1] * k)
    }

    /// Active scalars, if any
    pub fn scalars(&self) -> Option<&DataArray> {
        self.scalars.as_ref()
    }

    /// Replace the scalars and bump the modification time
    pub fn set_scalars(&mut self, scalars: DataArray) -> crate::Result<()> {
        if scalars.len() != self.sample_count() {
            return Err(crate::Error::InvalidData(format!(
                "volume has {} samples but scalars have {} tuples",
                self.sample_count(),
                scalars.len()
            )));
        }
        if !matches!(scalars.components, 1 | 3 | 4) {
            return Err(crate::Error::InvalidData(format!(
                "volume scalars must have 1, 3 or 4 components, got {}",
                scalars.components
            )));
        }
        self.scalars = Some(scalars);
        self.mtime.modified();
        Ok(())
    }

    /// Drop the scalars
    pub fn clear_scalars(&mut self) {
        self.scalars = None;
        self.mtime.modified();
    }

    /// Mark the field as changed without touching it
    pub fn modified(&mut self) {
        self.mtime.modified();
    }
}

impl Modified for VolumeField {
    fn mtime(&self) -> TimeStamp {
        self.mtime
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_index_is_x_fastest() {
        let field = VolumeField::new([4, 3, 2]);
        assert_eq!(field.sample_count(), 24);
        assert_eq!(field.index(1, 0, 0), 1);
        assert_eq!(field.index(0, 1, 0), 4);
        assert_eq!(field.index(0, 0, 1), 12);
    }

    #[test]
    fn test_scalar_validation() {
        let mut field = VolumeField::new([2, 2, 2]);
        assert!(field.set_scalars(DataArray::scalars("s", vec![0.0; 7])).is_err());
        assert!(field.set_scalars(DataArray::new("s", 2, vec![0.0; 16])).is_err());
        assert!(field.set_scalars(DataArray::scalars("s", vec![0.0; 8])).is_ok());
    }

    #[test]
    fn test_set_scalars_bumps_mtime() {
        let mut field = VolumeField::new([1, 1, 1]);
        let before = field.mtime();
        field.set_scalars(DataArray::scalars("s", vec![1.0])).unwrap();
        assert!(field.mtime() > before);
    }
}

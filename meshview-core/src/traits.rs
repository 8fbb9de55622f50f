//! Core traits for meshview

use crate::{point::*, mesh::PolyMesh, volume::VolumeField};
use serde::{Deserialize, Serialize};

/// Axis-aligned bounding box
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub min: Point3f,
    pub max: Point3f,
}

impl Bounds {
    /// Bounds of a set of points, `None` when empty
    pub fn from_points<'a>(points: impl IntoIterator<Item = &'a Point3f>) -> Option<Self> {
        let mut iter = points.into_iter();
        let first = *iter.next()?;
        let mut bounds = Bounds { min: first, max: first };
        for p in iter {
            bounds.expand(p);
        }
        Some(bounds)
    }

    /// Grow to include a point
    pub fn expand(&mut self, p: &Point3f) {
        self.min = self.min.inf(p);
        self.max = self.max.sup(p);
    }

    /// Smallest box containing both
    pub fn union(&self, other: &Bounds) -> Bounds {
        Bounds {
            min: self.min.inf(&other.min),
            max: self.max.sup(&other.max),
        }
    }

    pub fn center(&self) -> Point3f {
        nalgebra::center(&self.min, &self.max)
    }

    /// Half the diagonal length
    pub fn radius(&self) -> f32 {
        (self.max - self.min).norm() * 0.5
    }
}

/// Trait for drawable/renderable objects
pub trait Drawable {
    /// Get the bounding box of the object, `None` when it has no extent
    fn bounding_box(&self) -> Option<Bounds>;

    /// Get the center point of the object
    fn center(&self) -> Point3f {
        self.bounding_box()
            .map(|b| b.center())
            .unwrap_or_else(Point3f::origin)
    }
}

impl Drawable for PolyMesh {
    fn bounding_box(&self) -> Option<Bounds> {
        Bounds::from_points(&self.points)
    }
}

impl Drawable for VolumeField {
    fn bounding_box(&self) -> Option<Bounds> {
        if self.sample_count() == 0 {
            return None;
        }
        let extent = Vector3f::new(
            (self.dimensions[0] - 1) as f32 * self.spacing.x,
            (self.dimensions[1] - 1) as f32 * self.spacing.y,
            (self.dimensions[2] - 1) as f32 * self.spacing.z,
        );
        let far = self.origin + extent;
        Some(Bounds {
            min: self.origin.inf(&far),
            max: self.origin.sup(&far),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_mesh_bounds() {
        let mesh = PolyMesh::from_points(vec![
            Point3f::new(-1.0, 0.0, 2.0),
            Point3f::new(3.0, -2.0, 0.0),
        ]);
        let b = mesh.bounding_box().unwrap();
        assert_eq!(b.min, Point3f::new(-1.0, -2.0, 0.0));
        assert_eq!(b.max, Point3f::new(3.0, 0.0, 2.0));
        assert_eq!(mesh.center(), Point3f::new(1.0, -1.0, 1.0));
        assert_relative_eq!(b.radius(), 3.0);
    }

    #[test]
    fn test_empty_mesh_has_no_bounds() {
        assert!(PolyMesh::new().bounding_box().is_none());
        assert_eq!(PolyMesh::new().center(), Point3f::origin());
    }

    #[test]
    fn test_volume_bounds_follow_spacing() {
        let mut field = VolumeField::new([3, 2, 1]);
        field.spacing = Vector3f::new(0.5, 2.0, 1.0);
        let b = field.bounding_box().unwrap();
        assert_eq!(b.min, Point3f::origin());
        assert_eq!(b.max, Point3f::new(1.0, 2.0, 0.0));
    }
}

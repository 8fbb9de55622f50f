//! Core data structures and traits for meshview
//!
//! This crate provides the fundamental types shared by the readers, the
//! geometry filters and the renderer: polygonal meshes with attributes, unstructured grids,
//! volumetric scalar fields, color transfer functions and modification
//! timestamps.

pub mod point;
pub mod mesh;
pub mod grid;
pub mod volume;
pub mod color;
pub mod timestamp;
pub mod traits;
pub mod error;

pub use point::*;
pub use mesh::*;
pub use grid::*;
pub use volume::*;
pub use color::*;
pub use timestamp::*;
pub use traits::*;
pub use error::*;

/// Re-export commonly used types from nalgebra
pub use nalgebra::{Point3, Vector3, Matrix3, Matrix4, Rotation3, Unit};

// Type aliases for easier imports
pub type Point = Point3f;
pub type Mesh = PolyMesh;

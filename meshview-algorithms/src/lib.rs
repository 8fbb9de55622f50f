//! # meshview algorithms
//!
//! Geometry filters applied between the readers and the renderer.
//!
//! This crate computes feature-angle normals, extracts the boundary surface
//! of unstructured grids, triangulates polygons and strips for drawing,
//! synthesizes sphere and tube geometry for molecule files, and pads volume
//! fields to power-of-two dimensions for texture upload.

pub mod normals;
pub mod surface;
pub mod triangulate;
pub mod geometry;
pub mod padding;

// Re-export commonly used items
pub use normals::*;
pub use surface::*;
pub use triangulate::*;
pub use geometry::*;
pub use padding::*;

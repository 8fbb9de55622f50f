//! # meshview
//!
//! A small stereoscopic viewer for meshes and molecules.
//!
//! This is the umbrella crate that ties the workspace together. Use it to
//! get everything in one place, or depend on the individual crates.
//!
//! ## Crates
//!
//! - **Core**: mesh, volume and color data structures plus modification times
//! - **Algorithms**: normals, surface extraction, triangulation and padding
//! - **I/O**: VTK legacy and XML, PLY, OBJ, STL and PDB readers
//! - **GPU**: 3D textures, shader program caches and the stereo scene renderer
//! - **Visualization**: camera, rotation scheduler, viewer state and window
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use meshview::prelude::*;
//!
//! fn main() -> meshview::Result<()> {
//!     let mut viewer = Viewer::default();
//!     viewer.add_file("molecule.pdb")?;
//!     InteractiveViewer::new(viewer).run()
//! }
//! ```

// Re-export core functionality
pub use meshview_core::*;

// Re-export sub-crates
pub use meshview_algorithms as algorithms;
pub use meshview_gpu as gpu;
pub use meshview_io as io;
pub use meshview_visualization as visualization;

/// Convenient imports for common use cases
pub mod prelude {
    pub use meshview_core::*;
    pub use meshview_io::{read_mesh, read_volume, MeshFormat, MeshRegistry, PdbGeometryOptions};
    pub use meshview_gpu::{Representation, ShaderFallback, StereoMode, TextureOptions, TextureQuality};
    pub use meshview_visualization::{Camera, InteractiveViewer, Viewer, ViewerConfig};
}

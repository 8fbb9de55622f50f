//! Interactive viewing of meshes
//!
//! This crate holds the viewer state and the window around it:
//! - Orbit camera with stereo eye views
//! - Fixed-period rotation scheduler
//! - Mesh items with scalar color ramps
//! - winit event loop with keyboard shortcuts

pub mod camera;
pub mod interactive_viewer;
pub mod render_item;
pub mod scheduler;
pub mod viewer;

pub use camera::*;
pub use interactive_viewer::*;
pub use render_item::*;
pub use scheduler::*;
pub use viewer::*;

use meshview_core::{PolyMesh, Result};

/// Show one mesh in an interactive window
pub fn show_mesh(mesh: PolyMesh) -> Result<()> {
    let mut viewer = Viewer::default();
    viewer.add_mesh(mesh);
    InteractiveViewer::new(viewer).run()
}

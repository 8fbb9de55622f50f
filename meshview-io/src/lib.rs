//! Mesh and volume readers
//!
//! This crate reads the formats the viewer accepts: legacy and XML VTK, PLY,
//! OBJ, STL and PDB. Unstructured grids are reduced to their outer surface
//! and PDB molecules are turned into ball-and-stick geometry on load.

pub mod error;
pub mod obj;
pub mod pdb;
pub mod ply;
pub mod registry;
pub mod stl;
pub mod vtk_legacy;
pub mod vtk_xml;

pub use error::*;
pub use pdb::{ball_and_stick, Molecule, PdbGeometryOptions, PdbReader};
pub use registry::{supported_extensions_list, MeshFormat, MeshReader, MeshRegistry};

use meshview_core::{Error, PolyMesh, Result, VolumeField};
use std::path::Path;

/// Auto-detect format and read a mesh with the default readers
pub fn read_mesh<P: AsRef<Path>>(path: P) -> Result<PolyMesh> {
    MeshRegistry::with_default_readers().read_mesh(path.as_ref())
}

/// Read a volume from legacy `.vtk` structured points or `.vti` image data
pub fn read_volume<P: AsRef<Path>>(path: P) -> Result<VolumeField> {
    let path = path.as_ref();
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);
    let field = match extension.as_deref() {
        Some("vtk") => vtk_legacy::read_volume(path)?,
        Some("vti") => vtk_xml::read_image_data(path)?,
        _ => {
            return Err(Error::UnsupportedFormat(format!(
                "{}: volumes should end in VTK or VTI",
                path.display()
            )))
        }
    };
    log::info!(
        "read volume {} with dimensions {:?}",
        path.display(),
        field.dimensions
    );
    Ok(field)
}

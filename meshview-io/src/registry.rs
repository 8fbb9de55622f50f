//! Format dispatch for mesh reading
//!
//! Formats are chosen from the file extension alone, so an unknown extension
//! is rejected before the file is ever opened. Each format maps to a
//! [`MeshReader`] trait object that downstream code can replace.

use meshview_core::{Error, PolyMesh, Result};
use std::collections::HashMap;
use std::fmt;
use std::path::Path;

/// File formats the viewer can load as meshes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MeshFormat {
    VtkLegacy,
    VtkPolyData,
    VtkUnstructuredGrid,
    Ply,
    Obj,
    Stl,
    Pdb,
}

impl MeshFormat {
    pub const ALL: [MeshFormat; 7] = [
        MeshFormat::VtkLegacy,
        MeshFormat::VtkPolyData,
        MeshFormat::Ply,
        MeshFormat::Obj,
        MeshFormat::Stl,
        MeshFormat::VtkUnstructuredGrid,
        MeshFormat::Pdb,
    ];

    /// Lowercase extension without the dot
    pub fn extension(self) -> &'static str {
        match self {
            MeshFormat::VtkLegacy => "vtk",
            MeshFormat::VtkPolyData => "vtp",
            MeshFormat::VtkUnstructuredGrid => "vtu",
            MeshFormat::Ply => "ply",
            MeshFormat::Obj => "obj",
            MeshFormat::Stl => "stl",
            MeshFormat::Pdb => "pdb",
        }
    }

    /// Match an extension, ignoring case
    pub fn from_extension(ext: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|f| f.extension().eq_ignore_ascii_case(ext))
    }

    /// Pick the format of `path` from its extension
    ///
    /// # Errors
    /// * `Error::UnsupportedFormat` naming the supported extensions
    pub fn from_path(path: &Path) -> Result<Self> {
        path.extension()
            .and_then(|ext| ext.to_str())
            .and_then(Self::from_extension)
            .ok_or_else(|| {
                Error::UnsupportedFormat(format!(
                    "{}: should end in {}",
                    path.display(),
                    supported_extensions_list()
                ))
            })
    }
}

impl fmt::Display for MeshFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MeshFormat::VtkLegacy => "VTK legacy",
            MeshFormat::VtkPolyData => "VTK XML PolyData",
            MeshFormat::VtkUnstructuredGrid => "VTK XML UnstructuredGrid",
            MeshFormat::Ply => "PLY",
            MeshFormat::Obj => "Wavefront OBJ",
            MeshFormat::Stl => "STL",
            MeshFormat::Pdb => "Protein Data Bank",
        };
        f.write_str(name)
    }
}

/// Human-readable list such as `VTK, VTP, PLY, OBJ, STL, VTU, or PDB`
pub fn supported_extensions_list() -> String {
    let names: Vec<String> = MeshFormat::ALL
        .iter()
        .map(|f| f.extension().to_ascii_uppercase())
        .collect();
    match names.split_last() {
        Some((last, rest)) if !rest.is_empty() => format!("{}, or {}", rest.join(", "), last),
        Some((last, _)) => last.clone(),
        None => String::new(),
    }
}

/// Trait for reading meshes from files
pub trait MeshReader: Send + Sync {
    /// Read a mesh from the given path
    fn read_mesh(&self, path: &Path) -> Result<PolyMesh>;

    /// Get the format name this reader handles
    fn format_name(&self) -> &'static str;
}

/// Registry mapping each format to its reader
pub struct MeshRegistry {
    readers: HashMap<MeshFormat, Box<dyn MeshReader>>,
}

impl MeshRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self {
            readers: HashMap::new(),
        }
    }

    /// Registry with the built-in reader for every format
    pub fn with_default_readers() -> Self {
        let mut registry = Self::new();
        registry.register(MeshFormat::VtkLegacy, Box::new(crate::vtk_legacy::LegacyVtkReader));
        registry.register(MeshFormat::VtkPolyData, Box::new(crate::vtk_xml::XmlPolyDataReader));
        registry.register(
            MeshFormat::VtkUnstructuredGrid,
            Box::new(crate::vtk_xml::XmlUnstructuredGridReader),
        );
        registry.register(MeshFormat::Ply, Box::new(crate::ply::PlyReader));
        registry.register(MeshFormat::Obj, Box::new(crate::obj::ObjReader));
        registry.register(MeshFormat::Stl, Box::new(crate::stl::StlReader));
        registry.register(MeshFormat::Pdb, Box::new(crate::pdb::PdbReader::default()));
        registry
    }

    /// Register or replace the reader for a format
    pub fn register(&mut self, format: MeshFormat, reader: Box<dyn MeshReader>) {
        self.readers.insert(format, reader);
    }

    /// Check if a format has a reader
    pub fn supports(&self, format: MeshFormat) -> bool {
        self.readers.contains_key(&format)
    }

    /// Formats with a registered reader, in display order
    pub fn supported_formats(&self) -> Vec<MeshFormat> {
        MeshFormat::ALL
            .into_iter()
            .filter(|f| self.readers.contains_key(f))
            .collect()
    }

    /// Read a mesh, choosing the reader from the extension
    pub fn read_mesh(&self, path: &Path) -> Result<PolyMesh> {
        let format = MeshFormat::from_path(path)?;
        let reader = self.readers.get(&format).ok_or_else(|| {
            Error::UnsupportedFormat(format!("no reader registered for {}", format))
        })?;
        log::info!("reading {} as {}", path.display(), reader.format_name());
        let mesh = reader.read_mesh(path)?;
        mesh.validate()?;
        log::debug!(
            "{}: {} points, {} cells",
            path.display(),
            mesh.point_count(),
            mesh.cell_count()
        );
        Ok(mesh)
    }
}

impl Default for MeshRegistry {
    fn default() -> Self {
        Self::with_default_readers()
    }
}

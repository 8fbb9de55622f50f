//! Protein Data Bank reader with ball-and-stick geometry
//!
//! Atoms of the first model are read with `pdbtbx`. Bonds are inferred from
//! covalent radii, then every atom becomes a sphere and every bond an
//! uncapped tube, all carrying the atomic number as point scalar.

use crate::error::{IoError, IoResult};
use crate::registry::MeshReader;
use meshview_algorithms::{glyph_points, sphere, tube};
use meshview_core::{DataArray, Point3f, PolyMesh, Result};
use pdbtbx::{Format, ReadOptions, StrictnessLevel, PDB};
use std::collections::HashMap;
use std::path::Path;

/// Name of the point scalar array on generated geometry
pub const ATOM_TYPE_SCALARS: &str = "atom_type";

/// Bonding radii in Å by atomic number: covalent, van der Waals
///
/// These are the classic molecular-viewer values; elements missing here use
/// the radii `pdbtbx` ships.
const RADII: &[(usize, f32, f32)] = &[
    (1, 0.32, 1.20),
    (5, 0.82, 1.92),
    (6, 0.77, 1.70),
    (7, 0.75, 1.55),
    (8, 0.73, 1.52),
    (9, 0.72, 1.47),
    (11, 1.54, 2.27),
    (12, 1.36, 1.73),
    (15, 1.06, 1.80),
    (16, 1.02, 1.80),
    (17, 0.99, 1.75),
    (19, 2.03, 2.75),
    (20, 1.74, 2.31),
    (26, 1.17, 2.00),
    (29, 1.17, 1.40),
    (30, 1.25, 1.39),
    (34, 1.16, 1.90),
    (35, 1.14, 1.85),
    (53, 1.33, 1.98),
];

/// Carbon-like radii for atoms without a recognizable element
const UNKNOWN_RADII: (f32, f32) = (0.77, 1.70);

#[derive(Debug, Clone, PartialEq)]
pub struct Atom {
    pub position: Point3f,
    /// Zero when the element is unknown
    pub atomic_number: u32,
    pub covalent_radius: f32,
    pub vdw_radius: f32,
}

impl Atom {
    fn new(position: Point3f, element: Option<&pdbtbx::Element>) -> Self {
        let Some(element) = element else {
            return Self {
                position,
                atomic_number: 0,
                covalent_radius: UNKNOWN_RADII.0,
                vdw_radius: UNKNOWN_RADII.1,
            };
        };
        let atomic_number = element.atomic_number();
        let (covalent_radius, vdw_radius) = match RADII.iter().find(|r| r.0 == atomic_number) {
            Some(&(_, covalent, vdw)) => (covalent, vdw),
            None => {
                let radius = element.atomic_radius();
                (
                    radius.covalent_single as f32,
                    radius.van_der_waals.unwrap_or(radius.unbound) as f32,
                )
            }
        };
        Self {
            position,
            atomic_number: atomic_number as u32,
            covalent_radius,
            vdw_radius,
        }
    }

    pub fn is_hydrogen(&self) -> bool {
        self.atomic_number == 1
    }
}

/// Atoms plus the bonds inferred between them
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Molecule {
    pub atoms: Vec<Atom>,
    pub bonds: Vec<[usize; 2]>,
}

/// Geometry and bonding constants for PDB loading
#[derive(Debug, Clone, PartialEq)]
pub struct PdbGeometryOptions {
    /// Sphere radius as a fraction of the van der Waals radius
    pub sphere_scale: f32,
    pub sphere_theta_resolution: usize,
    pub sphere_phi_resolution: usize,
    pub tube_radius: f32,
    pub tube_sides: usize,
    /// Bond tolerance on the sum of covalent radii
    pub bond_scale: f32,
    /// Bond tolerance when either atom is a hydrogen
    pub hb_scale: f32,
}

impl Default for PdbGeometryOptions {
    fn default() -> Self {
        Self {
            sphere_scale: 0.25,
            sphere_theta_resolution: 8,
            sphere_phi_resolution: 8,
            tube_radius: 0.2,
            tube_sides: 6,
            bond_scale: 1.0,
            hb_scale: 1.0,
        }
    }
}

#[derive(Default)]
pub struct PdbReader {
    pub options: PdbGeometryOptions,
}

impl PdbReader {
    pub fn new(options: PdbGeometryOptions) -> Self {
        Self { options }
    }
}

impl MeshReader for PdbReader {
    fn read_mesh(&self, path: &Path) -> Result<PolyMesh> {
        if !path.exists() {
            return Err(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("{} does not exist", path.display()),
            )
            .into());
        }
        let molecule = read_molecule(path, &self.options).map_err(|e| e.into_error("PDB"))?;
        log::debug!(
            "{}: {} atoms, {} bonds",
            path.display(),
            molecule.atoms.len(),
            molecule.bonds.len()
        );
        Ok(ball_and_stick(&molecule, &self.options))
    }

    fn format_name(&self) -> &'static str {
        "Protein Data Bank"
    }
}

/// Read a PDB file leniently and infer bonds
pub fn read_molecule(path: &Path, options: &PdbGeometryOptions) -> IoResult<Molecule> {
    let path_str = path.to_string_lossy();
    let (pdb, warnings) = ReadOptions::default()
        .set_format(Format::Pdb)
        .set_level(StrictnessLevel::Loose)
        .read(&*path_str)
        .map_err(|errors| IoError::InvalidFormat {
            format: errors
                .iter()
                .map(|e| e.to_string())
                .collect::<Vec<_>>()
                .join("; "),
        })?;
    for warning in &warnings {
        log::debug!("{}: {}", path.display(), warning);
    }
    molecule_from_pdb(&pdb, options)
}

/// Atoms of the first model plus their bonds
pub fn molecule_from_pdb(pdb: &PDB, options: &PdbGeometryOptions) -> IoResult<Molecule> {
    let atoms: Vec<Atom> = pdb
        .models()
        .next()
        .map(|model| {
            model
                .atoms()
                .map(|atom| {
                    let position = Point3f::new(atom.x() as f32, atom.y() as f32, atom.z() as f32);
                    let element = atom.element().cloned().or_else(|| element_from_name(atom.name()));
                    if element.is_none() {
                        log::warn!("atom {}: unknown element, using carbon radii", atom.serial_number());
                    }
                    Atom::new(position, element.as_ref())
                })
                .collect()
        })
        .unwrap_or_default();
    if atoms.is_empty() {
        return Err(IoError::InvalidFormat {
            format: "no ATOM or HETATM records".to_string(),
        });
    }
    let bonds = find_bonds(&atoms, options);
    Ok(Molecule { atoms, bonds })
}

/// Element from the first letter of an atom name such as `CA` or `1HB`
fn element_from_name(name: &str) -> Option<pdbtbx::Element> {
    name.trim()
        .chars()
        .find(|c| !c.is_ascii_digit())
        .filter(char::is_ascii_alphabetic)
        .and_then(|c| pdbtbx::Element::from_symbol(c.to_string()))
}

/// Bond atoms closer than the scaled sum of their covalent radii
///
/// Atoms are bucketed into cubes as wide as the longest possible bond, so
/// only neighboring buckets are compared.
pub fn find_bonds(atoms: &[Atom], options: &PdbGeometryOptions) -> Vec<[usize; 2]> {
    let max_radius = atoms
        .iter()
        .map(|a| a.element.covalent_radius)
        .fold(0.0f32, f32::max);
    let cell = 2.0 * max_radius * options.bond_scale.max(options.hb_scale);
    if cell <= 0.0 {
        return Vec::new();
    }

    let key = |p: &Point3f| {
        [
            (p.x / cell).floor() as i64,
            (p.y / cell).floor() as i64,
            (p.z / cell).floor() as i64,
        ]
    };
    let mut buckets: HashMap<[i64; 3], Vec<usize>> = HashMap::new();
    for (i, atom) in atoms.iter().enumerate() {
        buckets.entry(key(&atom.position)).or_default().push(i);
    }

    let mut bonds = Vec::new();
    for (i, a) in atoms.iter().enumerate() {
        let [x, y, z] = key(&a.position);
        for dx in -1..=1 {
            for dy in -1..=1 {
                for dz in -1..=1 {
                    let Some(candidates) = buckets.get(&[x + dx, y + dy, z + dz]) else {
                        continue;
                    };
                    for &j in candidates.iter().filter(|&&j| j > i) {
                        let b = &atoms[j];
                        let scale = if a.is_hydrogen() || b.is_hydrogen() {
                            options.hb_scale
                        } else {
                            options.bond_scale
                        };
                        let limit = (a.covalent_radius + b.covalent_radius) * scale;
                        if (a.position - b.position).norm_squared() <= limit * limit {
                            bonds.push([i, j]);
                        }
                    }
                }
            }
        }
    }
    bonds.sort_unstable();
    bonds
}

/// Build the ball-and-stick mesh: spheres for atoms, tubes for bonds
pub fn ball_and_stick(molecule: &Molecule, options: &PdbGeometryOptions) -> PolyMesh {
    let unit = sphere(
        Point3f::origin(),
        1.0,
        options.sphere_theta_resolution,
        options.sphere_phi_resolution,
    );
    let centers: Vec<Point3f> = molecule.atoms.iter().map(|a| a.position).collect();
    let scales: Vec<f32> = molecule
        .atoms
        .iter()
        .map(|a| a.vdw_radius * options.sphere_scale)
        .collect();
    let types: Vec<f32> = molecule
        .atoms
        .iter()
        .map(|a| a.atomic_number as f32)
        .collect();
    let mut mesh = glyph_points(&unit, &centers, &scales, Some(&types), ATOM_TYPE_SCALARS);

    for &[i, j] in &molecule.bonds {
        let mut stick = tube(
            molecule.atoms[i].position,
            molecule.atoms[j].position,
            options.tube_radius,
            options.tube_sides,
        );
        if stick.is_empty() {
            continue;
        }
        let half = stick.point_count() / 2;
        let values = std::iter::repeat(types[i])
            .take(half)
            .chain(std::iter::repeat(types[j]).take(half))
            .collect();
        stick.set_point_scalars(DataArray::scalars(ATOM_TYPE_SCALARS, values));
        mesh.append(&stick);
    }
    mesh
}

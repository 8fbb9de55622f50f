//! Legacy VTK (`.vtk`) format support
//!
//! Handles ASCII and big-endian BINARY files with POLYDATA,
//! UNSTRUCTURED_GRID and STRUCTURED_POINTS datasets, both the classic cell
//! layout and the `OFFSETS`/`CONNECTIVITY` layout of version 5 files.

use crate::error::{IoError, IoResult};
use crate::registry::MeshReader;
use byteorder::{BigEndian, ByteOrder};
use meshview_algorithms::{append_strips, extract_surface};
use meshview_core::{
    CellArray, CellType, DataArray, Point3f, PolyMesh, Result, Rgb8, UnstructuredGrid, Vector3f,
    VolumeField,
};
use std::path::Path;

const FORMAT: &str = "VTK";

pub struct LegacyVtkReader;

impl MeshReader for LegacyVtkReader {
    fn read_mesh(&self, path: &Path) -> Result<PolyMesh> {
        let bytes = std::fs::read(path)?;
        parse_mesh(&bytes)
    }

    fn format_name(&self) -> &'static str {
        "VTK legacy"
    }
}

/// Parse a legacy file into a mesh
///
/// Unstructured grids are reduced to their surface. Structured datasets are
/// reported and yield an empty mesh.
pub fn parse_mesh(bytes: &[u8]) -> Result<PolyMesh> {
    let dataset = parse_dataset(bytes).map_err(|e| e.into_error(FORMAT))?;
    Ok(match dataset {
        LegacyDataset::PolyData(mesh) => mesh,
        LegacyDataset::UnstructuredGrid(grid) => extract_surface(&grid),
        LegacyDataset::StructuredPoints(_) => {
            log::error!("unsupported: STRUCTURED_POINTS datasets cannot be shown as a mesh");
            PolyMesh::new()
        }
        LegacyDataset::Other(kind) => {
            log::error!("unsupported: {} datasets", kind);
            PolyMesh::new()
        }
    })
}

/// Read a STRUCTURED_POINTS file as a volume
pub fn read_volume(path: &Path) -> Result<VolumeField> {
    let bytes = std::fs::read(path)?;
    parse_volume(&bytes)
}

/// Parse a STRUCTURED_POINTS file as a volume
pub fn parse_volume(bytes: &[u8]) -> Result<VolumeField> {
    match parse_dataset(bytes).map_err(|e| e.into_error(FORMAT))? {
        LegacyDataset::StructuredPoints(field) => Ok(field),
        LegacyDataset::PolyData(_) => Err(not_a_volume("POLYDATA")),
        LegacyDataset::UnstructuredGrid(_) => Err(not_a_volume("UNSTRUCTURED_GRID")),
        LegacyDataset::Other(kind) => Err(not_a_volume(&kind)),
    }
}

fn not_a_volume(kind: &str) -> meshview_core::Error {
    meshview_core::Error::Unsupported(format!("{} is not a STRUCTURED_POINTS volume", kind))
}

/// Dataset kinds a legacy file can hold
#[derive(Debug)]
pub enum LegacyDataset {
    PolyData(PolyMesh),
    UnstructuredGrid(UnstructuredGrid),
    StructuredPoints(VolumeField),
    Other(String),
}

/// Parse any legacy file
pub fn parse_dataset(bytes: &[u8]) -> IoResult<LegacyDataset> {
    let mut s = Scanner::new(bytes);

    let version = s.line();
    if !version.trim_start().starts_with("# vtk DataFile") {
        return Err(IoError::InvalidFormat {
            format: "missing '# vtk DataFile' header".to_string(),
        });
    }
    let _title = s.line();
    let encoding = s.token("file type")?;
    s.binary = if encoding.eq_ignore_ascii_case("BINARY") {
        true
    } else if encoding.eq_ignore_ascii_case("ASCII") {
        false
    } else {
        return Err(s.error(format!("expected ASCII or BINARY, found '{}'", encoding)));
    };

    s.expect("DATASET")?;
    let kind = s.token("dataset type")?.to_ascii_uppercase();
    match kind.as_str() {
        "POLYDATA" => parse_polydata(&mut s).map(LegacyDataset::PolyData),
        "UNSTRUCTURED_GRID" => parse_unstructured(&mut s).map(LegacyDataset::UnstructuredGrid),
        "STRUCTURED_POINTS" => parse_structured_points(&mut s).map(LegacyDataset::StructuredPoints),
        _ => Ok(LegacyDataset::Other(kind)),
    }
}

fn parse_polydata(s: &mut Scanner) -> IoResult<PolyMesh> {
    let mut mesh = PolyMesh::new();
    let mut strips = CellArray::new();
    let mut attributes = Attributes::default();

    while let Some(keyword) = s.next_keyword() {
        match keyword.as_str() {
            "POINTS" => mesh.points = s.points()?,
            "VERTICES" => mesh.verts = s.cells()?,
            "LINES" => mesh.lines = s.cells()?,
            "POLYGONS" => mesh.polys = s.cells()?,
            "TRIANGLE_STRIPS" => strips = s.cells()?,
            "METADATA" => s.skip_metadata(),
            "FIELD" => s.skip_field()?,
            "POINT_DATA" | "CELL_DATA" => {
                parse_attributes(s, &keyword, &mut attributes)?;
                break;
            }
            other => return Err(s.error(format!("unexpected keyword '{}' in POLYDATA", other))),
        }
    }

    // Strips become triangles; their cell data is repeated per triangle
    let source_cells = append_strips(&mut mesh, &strips);
    attributes.apply(&mut mesh, (!strips.is_empty()).then_some(source_cells.as_slice()));
    Ok(mesh)
}

fn parse_unstructured(s: &mut Scanner) -> IoResult<UnstructuredGrid> {
    let mut grid = UnstructuredGrid::new();
    let mut cells = CellArray::new();
    let mut type_ids: Vec<u32> = Vec::new();
    let mut attributes = Attributes::default();

    while let Some(keyword) = s.next_keyword() {
        match keyword.as_str() {
            "POINTS" => grid.points = s.points()?,
            "CELLS" => cells = s.cells()?,
            "CELL_TYPES" => {
                let count = s.usize("cell type count")?;
                type_ids = s
                    .values(count, "int")?
                    .into_iter()
                    .map(|v| v as u32)
                    .collect();
            }
            "METADATA" => s.skip_metadata(),
            "FIELD" => s.skip_field()?,
            "POINT_DATA" | "CELL_DATA" => {
                parse_attributes(s, &keyword, &mut attributes)?;
                break;
            }
            other => {
                return Err(s.error(format!("unexpected keyword '{}' in UNSTRUCTURED_GRID", other)))
            }
        }
    }

    if type_ids.len() != cells.len() {
        return Err(s.error(format!(
            "{} cells but {} cell types",
            cells.len(),
            type_ids.len()
        )));
    }

    let mut kept = Vec::with_capacity(cells.len());
    for (index, (cell, &id)) in cells.iter().zip(&type_ids).enumerate() {
        match CellType::from_vtk_id(id) {
            Some(cell_type) => {
                grid.push_cell(cell_type, cell);
                kept.push(index);
            }
            None => log::warn!("skipping cell {} of unsupported type {}", index, id),
        }
    }

    grid.normals = attributes.point.normals.take();
    grid.colors = attributes.point.colors.take();
    grid.point_scalars = attributes.point.scalars.take();
    grid.cell_scalars = attributes.cell.scalars.take().map(|s| s.gather(kept.iter().copied()));
    Ok(grid)
}

fn parse_structured_points(s: &mut Scanner) -> IoResult<VolumeField> {
    let mut dimensions = None;
    let mut origin = Point3f::origin();
    let mut spacing = Vector3f::new(1.0, 1.0, 1.0);
    let mut attributes = Attributes::default();

    while let Some(keyword) = s.next_keyword() {
        match keyword.as_str() {
            "DIMENSIONS" => {
                dimensions = Some([
                    s.usize("x dimension")?,
                    s.usize("y dimension")?,
                    s.usize("z dimension")?,
                ])
            }
            "SPACING" | "ASPECT_RATIO" => spacing = Vector3f::new(s.f32()?, s.f32()?, s.f32()?),
            "ORIGIN" => origin = Point3f::new(s.f32()?, s.f32()?, s.f32()?),
            "METADATA" => s.skip_metadata(),
            "FIELD" => s.skip_field()?,
            "POINT_DATA" | "CELL_DATA" => {
                parse_attributes(s, &keyword, &mut attributes)?;
                break;
            }
            other => {
                return Err(s.error(format!("unexpected keyword '{}' in STRUCTURED_POINTS", other)))
            }
        }
    }

    let dimensions = dimensions.ok_or_else(|| s.error("STRUCTURED_POINTS without DIMENSIONS"))?;
    let mut field = VolumeField::new(dimensions);
    field.origin = origin;
    field.spacing = spacing;

    let scalars = match (attributes.point.scalars.take(), attributes.point.colors.take()) {
        (Some(scalars), _) => Some(scalars),
        (None, Some(colors)) => Some(DataArray::new(
            "colors",
            3,
            colors.iter().flatten().map(|&c| c as f32 / 255.0).collect(),
        )),
        (None, None) => None,
    };
    if let Some(scalars) = scalars {
        field
            .set_scalars(scalars)
            .map_err(|e| s.error(e.to_string()))?;
    }
    Ok(field)
}

/// Point and cell attributes picked from the data sections
#[derive(Debug, Default)]
struct Attributes {
    point: AttributeSet,
    cell: AttributeSet,
}

#[derive(Debug, Default)]
struct AttributeSet {
    scalars: Option<DataArray>,
    colors: Option<Vec<Rgb8>>,
    normals: Option<Vec<Vector3f>>,
}

impl Attributes {
    /// Attach attributes whose counts match the mesh; `cell_map` expands
    /// cell data when strips were split
    fn apply(mut self, mesh: &mut PolyMesh, cell_map: Option<&[usize]>) {
        if let Some(normals) = self.point.normals.take() {
            mesh.set_normals(normals);
        }
        if let Some(colors) = self.point.colors.take() {
            mesh.set_colors(colors);
        }
        if let Some(scalars) = self.point.scalars.take() {
            mesh.set_point_scalars(scalars);
        }
        if let Some(scalars) = self.cell.scalars.take() {
            let scalars = match cell_map {
                Some(map) if map.iter().all(|&i| i < scalars.len()) => {
                    scalars.gather(map.iter().copied())
                }
                _ => scalars,
            };
            mesh.set_cell_scalars(scalars);
        }
        if self.cell.colors.is_some() || self.cell.normals.is_some() {
            log::debug!("cell colors and cell normals are not used for shading");
        }
    }
}

fn parse_attributes(s: &mut Scanner, first: &str, attributes: &mut Attributes) -> IoResult<()> {
    let mut on_points = first == "POINT_DATA";
    let mut count = s.usize("attribute count")?;

    while let Some(keyword) = s.next_keyword() {
        let target = if on_points { &mut attributes.point } else { &mut attributes.cell };
        match keyword.as_str() {
            "POINT_DATA" | "CELL_DATA" => {
                on_points = keyword == "POINT_DATA";
                count = s.usize("attribute count")?;
            }
            "SCALARS" => {
                let name = s.token("scalars name")?;
                let data_type = s.token("scalars type")?;
                let mut components = 1;
                let next = s.peek_token().unwrap_or_default();
                if let Ok(n) = next.parse::<usize>() {
                    s.token("component count")?;
                    components = n;
                }
                if s.peek_token().is_some_and(|t| t.eq_ignore_ascii_case("LOOKUP_TABLE")) {
                    s.token("LOOKUP_TABLE")?;
                    s.token("lookup table name")?;
                }
                let values = s.values(count * components, &data_type)?;
                if target.scalars.is_none() {
                    target.scalars = Some(DataArray::new(
                        name,
                        components,
                        values.into_iter().map(|v| v as f32).collect(),
                    ));
                }
            }
            "COLOR_SCALARS" => {
                let _name = s.token("color scalars name")?;
                let components = s.usize("color component count")?;
                let values = if s.binary {
                    s.values(count * components, "unsigned_char")?
                        .into_iter()
                        .map(|v| v / 255.0)
                        .collect()
                } else {
                    s.values(count * components, "float")?
                };
                if target.colors.is_none() {
                    target.colors = Some(colors_from_tuples(&values, components));
                }
            }
            "NORMALS" => {
                let _name = s.token("normals name")?;
                let data_type = s.token("normals type")?;
                let values = s.values(count * 3, &data_type)?;
                if target.normals.is_none() {
                    target.normals = Some(
                        values
                            .chunks_exact(3)
                            .map(|c| Vector3f::new(c[0] as f32, c[1] as f32, c[2] as f32))
                            .collect(),
                    );
                }
            }
            "VECTORS" => {
                s.token("vectors name")?;
                let data_type = s.token("vectors type")?;
                s.values(count * 3, &data_type)?;
            }
            "TENSORS" | "TENSORS6" => {
                let per = if keyword == "TENSORS" { 9 } else { 6 };
                s.token("tensors name")?;
                let data_type = s.token("tensors type")?;
                s.values(count * per, &data_type)?;
            }
            "TEXTURE_COORDINATES" => {
                s.token("texture coordinates name")?;
                let dim = s.usize("texture coordinates dimension")?;
                let data_type = s.token("texture coordinates type")?;
                s.values(count * dim, &data_type)?;
            }
            "LOOKUP_TABLE" => {
                s.token("lookup table name")?;
                let size = s.usize("lookup table size")?;
                if s.binary {
                    s.values(size * 4, "unsigned_char")?;
                } else {
                    s.values(size * 4, "float")?;
                }
            }
            "FIELD" => s.skip_field()?,
            "METADATA" => s.skip_metadata(),
            other => return Err(s.error(format!("unexpected keyword '{}' in attribute data", other))),
        }
    }
    Ok(())
}

fn colors_from_tuples(values: &[f64], components: usize) -> Vec<Rgb8> {
    let to_u8 = |v: f64| (v.clamp(0.0, 1.0) * 255.0).round() as u8;
    values
        .chunks_exact(components.max(1))
        .map(|c| match c.len() {
            1 | 2 => [to_u8(c[0]); 3],
            _ => [to_u8(c[0]), to_u8(c[1]), to_u8(c[2])],
        })
        .collect()
}

/// Byte cursor mixing whitespace-separated tokens with binary blocks
struct Scanner<'a> {
    bytes: &'a [u8],
    pos: usize,
    line: usize,
    binary: bool,
}

impl<'a> Scanner<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self {
            bytes,
            pos: 0,
            line: 1,
            binary: false,
        }
    }

    fn error(&self, message: impl Into<String>) -> IoError {
        IoError::parse(self.line, message)
    }

    /// Rest of the current line, consuming the newline
    fn line(&mut self) -> String {
        let start = self.pos;
        while self.pos < self.bytes.len() && self.bytes[self.pos] != b'\n' {
            self.pos += 1;
        }
        let text = String::from_utf8_lossy(&self.bytes[start..self.pos]).trim_end().to_string();
        if self.pos < self.bytes.len() {
            self.pos += 1;
            self.line += 1;
        }
        text
    }

    fn skip_whitespace(&mut self) {
        while let Some(&b) = self.bytes.get(self.pos) {
            if !b.is_ascii_whitespace() {
                break;
            }
            if b == b'\n' {
                self.line += 1;
            }
            self.pos += 1;
        }
    }

    fn raw_token(&mut self) -> Option<&'a str> {
        self.skip_whitespace();
        let start = self.pos;
        while self.pos < self.bytes.len() && !self.bytes[self.pos].is_ascii_whitespace() {
            self.pos += 1;
        }
        if start == self.pos {
            return None;
        }
        std::str::from_utf8(&self.bytes[start..self.pos]).ok()
    }

    fn token(&mut self, context: &str) -> IoResult<String> {
        self.raw_token()
            .map(str::to_string)
            .ok_or_else(|| IoError::UnexpectedEof {
                context: context.to_string(),
            })
    }

    fn peek_token(&mut self) -> Option<String> {
        let (pos, line) = (self.pos, self.line);
        let token = self.raw_token().map(str::to_string);
        self.pos = pos;
        self.line = line;
        token
    }

    /// Next section keyword in upper case, `None` at end of input
    fn next_keyword(&mut self) -> Option<String> {
        self.raw_token().map(str::to_ascii_uppercase)
    }

    fn expect(&mut self, keyword: &str) -> IoResult<()> {
        let found = self.token(keyword)?;
        if found.eq_ignore_ascii_case(keyword) {
            Ok(())
        } else {
            Err(self.error(format!("expected {}, found '{}'", keyword, found)))
        }
    }

    fn usize(&mut self, context: &str) -> IoResult<usize> {
        let token = self.token(context)?;
        token
            .parse()
            .map_err(|_| self.error(format!("invalid {} '{}'", context, token)))
    }

    fn f32(&mut self) -> IoResult<f32> {
        let token = self.token("number")?;
        token
            .parse()
            .map_err(|_| self.error(format!("invalid number '{}'", token)))
    }

    /// Move past the end of the current line, where binary blocks start
    fn skip_line_end(&mut self) {
        while self.pos < self.bytes.len() && self.bytes[self.pos] != b'\n' {
            self.pos += 1;
        }
        if self.pos < self.bytes.len() {
            self.pos += 1;
            self.line += 1;
        }
    }

    /// Read `count` values of a VTK data type, ASCII or big-endian binary
    fn values(&mut self, count: usize, data_type: &str) -> IoResult<Vec<f64>> {
        if !self.binary {
            let mut out = Vec::with_capacity(count);
            for _ in 0..count {
                let token = self.token("data values")?;
                let value = token
                    .parse::<f64>()
                    .map_err(|_| self.error(format!("invalid value '{}'", token)))?;
                out.push(value);
            }
            return Ok(out);
        }

        let size = type_size(data_type)
            .ok_or_else(|| IoError::Unsupported(format!("binary data type '{}'", data_type)))?;
        self.skip_line_end();
        let end = self.pos + count * size;
        let block = self.bytes.get(self.pos..end).ok_or_else(|| IoError::UnexpectedEof {
            context: format!("{} binary {} values", count, data_type),
        })?;
        self.pos = end;
        Ok(decode_big_endian(block, data_type, size))
    }

    fn points(&mut self) -> IoResult<Vec<Point3f>> {
        let count = self.usize("point count")?;
        let data_type = self.token("point data type")?;
        let values = self.values(count * 3, &data_type)?;
        Ok(values
            .chunks_exact(3)
            .map(|c| Point3f::new(c[0] as f32, c[1] as f32, c[2] as f32))
            .collect())
    }

    /// Cell section in either layout
    fn cells(&mut self) -> IoResult<CellArray> {
        let first = self.usize("cell count")?;
        let size = self.usize("cell list size")?;

        if self.peek_token().is_some_and(|t| t.eq_ignore_ascii_case("OFFSETS")) {
            self.token("OFFSETS")?;
            let offset_type = self.token("offsets type")?;
            let offsets = self.values(first, &offset_type)?;
            self.expect("CONNECTIVITY")?;
            let conn_type = self.token("connectivity type")?;
            let connectivity = self.values(size, &conn_type)?;
            return CellArray::from_offsets(
                offsets.into_iter().map(|v| v as usize).collect(),
                connectivity.into_iter().map(|v| v as usize).collect(),
            )
            .ok_or_else(|| self.error("cell offsets do not match connectivity"));
        }

        let raw = self.values(size, "int")?;
        let mut cells = CellArray::new();
        let mut i = 0;
        for _ in 0..first {
            let n = *raw.get(i).ok_or_else(|| self.error("cell list shorter than declared"))? as usize;
            let ids = raw
                .get(i + 1..i + 1 + n)
                .ok_or_else(|| self.error("cell list shorter than declared"))?;
            let ids: Vec<usize> = ids.iter().map(|&v| v as usize).collect();
            cells.push(&ids);
            i += n + 1;
        }
        Ok(cells)
    }

    /// Skip a FIELD block: `FIELD name n` then `n` arrays
    fn skip_field(&mut self) -> IoResult<()> {
        self.token("field name")?;
        let arrays = self.usize("field array count")?;
        for _ in 0..arrays {
            let name = self.token("field array name")?;
            if name == "NULL_ARRAY" {
                continue;
            }
            let components = self.usize("field components")?;
            let tuples = self.usize("field tuples")?;
            let data_type = self.token("field data type")?;
            self.values(components * tuples, &data_type)?;
        }
        Ok(())
    }

    /// Skip a METADATA block, which ends at the first blank line
    fn skip_metadata(&mut self) {
        self.skip_line_end();
        loop {
            if self.pos >= self.bytes.len() {
                return;
            }
            if self.line().trim().is_empty() {
                return;
            }
        }
    }
}

fn type_size(data_type: &str) -> Option<usize> {
    Some(match data_type.to_ascii_lowercase().as_str() {
        "char" | "unsigned_char" => 1,
        "short" | "unsigned_short" => 2,
        "int" | "unsigned_int" | "float" | "vtkidtype" => 4,
        "long" | "unsigned_long" | "double" | "vtktypeint64" | "vtktypeuint64" => 8,
        _ => return None,
    })
}

fn decode_big_endian(block: &[u8], data_type: &str, size: usize) -> Vec<f64> {
    let data_type = data_type.to_ascii_lowercase();
    block
        .chunks_exact(size)
        .map(|b| match data_type.as_str() {
            "char" => b[0] as i8 as f64,
            "unsigned_char" => b[0] as f64,
            "short" => BigEndian::read_i16(b) as f64,
            "unsigned_short" => BigEndian::read_u16(b) as f64,
            "int" | "vtkidtype" => BigEndian::read_i32(b) as f64,
            "unsigned_int" => BigEndian::read_u32(b) as f64,
            "float" => BigEndian::read_f32(b) as f64,
            "long" | "vtktypeint64" => BigEndian::read_i64(b) as f64,
            "unsigned_long" | "vtktypeuint64" => BigEndian::read_u64(b) as f64,
            _ => BigEndian::read_f64(b),
        })
        .collect()
}

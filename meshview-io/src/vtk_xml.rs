//! VTK XML (`.vtp`, `.vtu`, `.vti`) format support
//!
//! Data arrays may be `ascii`, inline `binary` (base64) or `appended`, in
//! raw or base64 encoding, with 32 or 64-bit block headers in either byte
//! order. Blocks written with `vtkZLibDataCompressor` are inflated with
//! `flate2`; other compressors are rejected.

use crate::error::{IoError, IoResult};
use crate::registry::MeshReader;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use byteorder::{BigEndian, ByteOrder, LittleEndian};
use flate2::read::ZlibDecoder;
use meshview_algorithms::{append_strips, extract_surface};
use meshview_core::{
    CellArray, CellType, DataArray, Point3f, PolyMesh, Result, Rgb8, UnstructuredGrid, Vector3f,
    VolumeField,
};
use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;
use std::collections::HashMap;
use std::io::Read;
use std::path::Path;

const FORMAT: &str = "VTK XML";

pub struct XmlPolyDataReader;
pub struct XmlUnstructuredGridReader;

impl MeshReader for XmlPolyDataReader {
    fn read_mesh(&self, path: &Path) -> Result<PolyMesh> {
        let bytes = std::fs::read(path)?;
        parse_polydata(&bytes)
    }

    fn format_name(&self) -> &'static str {
        "VTK XML PolyData"
    }
}

impl MeshReader for XmlUnstructuredGridReader {
    fn read_mesh(&self, path: &Path) -> Result<PolyMesh> {
        let bytes = std::fs::read(path)?;
        let grid = parse_unstructured_grid(&bytes)?;
        Ok(extract_surface(&grid))
    }

    fn format_name(&self) -> &'static str {
        "VTK XML UnstructuredGrid"
    }
}

/// Parse a `.vtp` document
pub fn parse_polydata(bytes: &[u8]) -> Result<PolyMesh> {
    parse_polydata_inner(bytes).map_err(|e| e.into_error(FORMAT))
}

/// Parse a `.vtu` document
pub fn parse_unstructured_grid(bytes: &[u8]) -> Result<UnstructuredGrid> {
    parse_unstructured_inner(bytes).map_err(|e| e.into_error(FORMAT))
}

/// Read a `.vti` ImageData file as a volume
pub fn read_image_data(path: &Path) -> Result<VolumeField> {
    let bytes = std::fs::read(path)?;
    parse_image_data(&bytes)
}

/// Parse a `.vti` document
pub fn parse_image_data(bytes: &[u8]) -> Result<VolumeField> {
    parse_image_inner(bytes).map_err(|e| e.into_error(FORMAT))
}

fn parse_polydata_inner(bytes: &[u8]) -> IoResult<PolyMesh> {
    let document = Document::parse(bytes, "PolyData")?;
    let mut mesh = PolyMesh::new();

    for piece in document.pieces() {
        let mut part = PolyMesh::new();
        part.points = document.points(piece)?;
        part.verts = document.cells(piece, "Verts")?;
        part.lines = document.cells(piece, "Lines")?;
        part.polys = document.cells(piece, "Polys")?;
        let strips = document.cells(piece, "Strips")?;
        let source_cells = append_strips(&mut part, &strips);

        let point_data = document.attributes(piece, "PointData")?;
        if let Some(normals) = point_data.normals {
            part.set_normals(normals);
        }
        if let Some(colors) = point_data.colors {
            part.set_colors(colors);
        }
        if let Some(scalars) = point_data.scalars {
            part.set_point_scalars(scalars);
        }
        if let Some(scalars) = document.attributes(piece, "CellData")?.scalars {
            if source_cells.iter().all(|&i| i < scalars.len()) {
                part.set_cell_scalars(scalars.gather(source_cells.iter().copied()));
            }
        }
        mesh.append(&part);
    }
    Ok(mesh)
}

fn parse_unstructured_inner(bytes: &[u8]) -> IoResult<UnstructuredGrid> {
    let document = Document::parse(bytes, "UnstructuredGrid")?;
    let mut grid = UnstructuredGrid::new();

    for piece in document.pieces() {
        let offset = grid.points.len();
        let points = document.points(piece)?;
        let cells = document.cells(piece, "Cells")?;
        let types = match piece.child("Cells").and_then(|c| c.data_array("types")) {
            Some(array) => document.decode(array)?,
            None => Vec::new(),
        };
        if types.len() != cells.len() {
            return Err(IoError::parse(
                0,
                format!("{} cells but {} cell types", cells.len(), types.len()),
            ));
        }

        let point_data = document.attributes(piece, "PointData")?;
        let cell_data = document.attributes(piece, "CellData")?;
        let mut kept = Vec::with_capacity(cells.len());
        for (index, (cell, &id)) in cells.iter().zip(&types).enumerate() {
            match CellType::from_vtk_id(id as u32) {
                Some(cell_type) => {
                    let shifted: Vec<usize> = cell.iter().map(|&i| i + offset).collect();
                    grid.push_cell(cell_type, &shifted);
                    kept.push(index);
                }
                None => log::warn!("skipping cell {} of unsupported type {}", index, id),
            }
        }

        let first_piece = offset == 0;
        grid.points.extend(points);
        grid.normals = merge(grid.normals.take(), point_data.normals, first_piece);
        grid.colors = merge(grid.colors.take(), point_data.colors, first_piece);
        grid.point_scalars = merge_data(grid.point_scalars.take(), point_data.scalars, first_piece);
        grid.cell_scalars = merge_data(
            grid.cell_scalars.take(),
            cell_data.scalars.map(|s| s.gather(kept.iter().copied())),
            first_piece,
        );
    }
    Ok(grid)
}

fn merge<T>(acc: Option<Vec<T>>, next: Option<Vec<T>>, first: bool) -> Option<Vec<T>> {
    match (acc, next) {
        (Some(mut a), Some(b)) => {
            a.extend(b);
            Some(a)
        }
        (None, Some(b)) if first => Some(b),
        _ => None,
    }
}

fn merge_data(acc: Option<DataArray>, next: Option<DataArray>, first: bool) -> Option<DataArray> {
    match (acc, next) {
        (Some(mut a), Some(b)) if a.components == b.components => {
            a.values.extend(b.values);
            Some(a)
        }
        (None, Some(b)) if first => Some(b),
        _ => None,
    }
}

fn parse_image_inner(bytes: &[u8]) -> IoResult<VolumeField> {
    let document = Document::parse(bytes, "ImageData")?;
    let image = document
        .dataset()
        .ok_or_else(|| IoError::parse(0, "missing ImageData element"))?;
    let piece = document
        .pieces()
        .first()
        .copied()
        .ok_or_else(|| IoError::parse(0, "ImageData without a Piece"))?;

    let extent_text = piece
        .attr("Extent")
        .or_else(|| image.attr("WholeExtent"))
        .ok_or_else(|| IoError::parse(0, "ImageData without an extent"))?;
    let extent = parse_numbers::<i64>(extent_text)?;
    if extent.len() != 6 {
        return Err(IoError::parse(0, format!("bad extent '{}'", extent_text)));
    }
    let dimensions = [
        (extent[1] - extent[0] + 1).max(0) as usize,
        (extent[3] - extent[2] + 1).max(0) as usize,
        (extent[5] - extent[4] + 1).max(0) as usize,
    ];

    let mut field = VolumeField::new(dimensions);
    if let Some(origin) = image.attr("Origin") {
        let o = parse_numbers::<f32>(origin)?;
        if o.len() == 3 {
            field.origin = Point3f::new(o[0], o[1], o[2]);
        }
    }
    if let Some(spacing) = image.attr("Spacing") {
        let s = parse_numbers::<f32>(spacing)?;
        if s.len() == 3 {
            field.spacing = Vector3f::new(s[0], s[1], s[2]);
        }
    }

    // A volume needs scalars, so fall back to the first array
    let point_data = piece.child("PointData");
    let array = point_data.and_then(|pd| {
        pd.attr("Scalars")
            .and_then(|name| pd.data_array(name))
            .or_else(|| pd.children_named("DataArray").next())
    });
    if let Some(array) = array {
        let components = array.components();
        let values = document.decode(array)?;
        let scalars = DataArray::new(
            array.attr("Name").unwrap_or("scalars"),
            components,
            values.into_iter().map(|v| v as f32).collect(),
        );
        field
            .set_scalars(scalars)
            .map_err(|e| IoError::parse(0, e.to_string()))?;
    }
    Ok(field)
}

fn parse_numbers<T: std::str::FromStr>(text: &str) -> IoResult<Vec<T>> {
    text.split_whitespace()
        .map(|t| {
            t.parse::<T>()
                .map_err(|_| IoError::parse(0, format!("invalid number '{}'", t)))
        })
        .collect()
}

/// Minimal element tree
#[derive(Debug, Default)]
struct Element {
    name: String,
    attributes: HashMap<String, String>,
    children: Vec<Element>,
    text: String,
}

impl Element {
    fn from_start(start: &BytesStart<'_>) -> IoResult<Self> {
        let mut element = Element {
            name: String::from_utf8_lossy(start.name().as_ref()).into_owned(),
            ..Default::default()
        };
        for attr in start.attributes() {
            let attr = attr.map_err(|e| IoError::parse(0, e.to_string()))?;
            let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
            let value = attr
                .unescape_value()
                .map_err(|e| IoError::parse(0, e.to_string()))?
                .into_owned();
            element.attributes.insert(key, value);
        }
        Ok(element)
    }

    fn attr(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }

    fn child(&self, name: &str) -> Option<&Element> {
        self.children.iter().find(|c| c.name == name)
    }

    fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Element> + 'a {
        self.children.iter().filter(move |c| c.name == name)
    }

    fn data_array(&self, name: &str) -> Option<&Element> {
        self.children_named("DataArray").find(|c| c.attr("Name") == Some(name))
    }

    fn components(&self) -> usize {
        self.attr("NumberOfComponents")
            .and_then(|n| n.parse().ok())
            .unwrap_or(1)
    }
}

fn parse_tree(text: &str) -> IoResult<Element> {
    let mut reader = Reader::from_str(text);
    reader.config_mut().trim_text(true);

    let mut stack = vec![Element {
        name: "#document".to_string(),
        ..Default::default()
    }];
    loop {
        match reader.read_event() {
            Ok(Event::Start(start)) => stack.push(Element::from_start(&start)?),
            Ok(Event::Empty(start)) => {
                let element = Element::from_start(&start)?;
                if let Some(parent) = stack.last_mut() {
                    parent.children.push(element);
                }
            }
            Ok(Event::End(_)) => {
                if stack.len() < 2 {
                    return Err(IoError::parse(0, "unbalanced closing tag"));
                }
                if let (Some(element), Some(parent)) = (stack.pop(), stack.last_mut()) {
                    parent.children.push(element);
                }
            }
            Ok(Event::Text(text)) => {
                let text = text.unescape().map_err(|e| IoError::parse(0, e.to_string()))?;
                if let Some(top) = stack.last_mut() {
                    top.text.push_str(&text);
                }
            }
            Ok(Event::CData(data)) => {
                if let Some(top) = stack.last_mut() {
                    top.text.push_str(&String::from_utf8_lossy(&data));
                }
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => return Err(IoError::parse(0, format!("malformed XML: {}", e))),
        }
    }

    match (stack.pop(), stack.is_empty()) {
        (Some(root), true) => Ok(root),
        _ => Err(IoError::parse(0, "unclosed XML elements")),
    }
}

/// Split `<AppendedData>` out of the document, since raw blocks are not XML
fn split_appended(bytes: &[u8]) -> (Vec<u8>, Option<&[u8]>) {
    let Some(tag) = find(bytes, b"<AppendedData") else {
        return (bytes.to_vec(), None);
    };
    let Some(close) = find(&bytes[tag..], b">").map(|i| tag + i) else {
        return (bytes.to_vec(), None);
    };
    let Some(marker) = find(&bytes[close..], b"_").map(|i| close + i) else {
        return (bytes.to_vec(), None);
    };
    let end = rfind(bytes, b"</AppendedData>").unwrap_or(bytes.len());
    if end <= marker {
        return (bytes.to_vec(), None);
    }

    let mut xml = bytes[..=close].to_vec();
    xml.extend_from_slice(&bytes[end..]);
    (xml, Some(&bytes[marker + 1..end]))
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

fn rfind(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).rposition(|w| w == needle)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Endian {
    Little,
    Big,
}

/// Parsed document plus everything needed to decode its arrays
struct Document<'a> {
    root: Element,
    dataset_type: &'static str,
    endian: Endian,
    header_size: usize,
    appended: Option<&'a [u8]>,
    appended_base64: bool,
    compressed: bool,
}

/// Active attributes of one `PointData`/`CellData` section
#[derive(Default)]
struct ActiveAttributes {
    scalars: Option<DataArray>,
    colors: Option<Vec<Rgb8>>,
    normals: Option<Vec<Vector3f>>,
}

impl<'a> Document<'a> {
    fn parse(bytes: &'a [u8], dataset_type: &'static str) -> IoResult<Self> {
        let (xml, appended) = split_appended(bytes);
        let text = std::str::from_utf8(&xml)
            .map_err(|_| IoError::InvalidFormat { format: "document is not UTF-8".to_string() })?;
        let root = parse_tree(text)?;

        let file = root
            .child("VTKFile")
            .ok_or_else(|| IoError::InvalidFormat { format: "missing VTKFile element".to_string() })?;
        if file.attr("type") != Some(dataset_type) {
            return Err(IoError::InvalidFormat {
                format: format!(
                    "expected a {} file, found {}",
                    dataset_type,
                    file.attr("type").unwrap_or("no type")
                ),
            });
        }
        let compressed = match file.attr("compressor") {
            None | Some("") => false,
            Some("vtkZLibDataCompressor") => true,
            Some(other) => return Err(IoError::Unsupported(format!("compressed data ({})", other))),
        };

        let endian = match file.attr("byte_order") {
            Some("BigEndian") => Endian::Big,
            _ => Endian::Little,
        };
        let header_size = match file.attr("header_type") {
            Some("UInt64") => 8,
            _ => 4,
        };
        let appended_base64 = file
            .child("AppendedData")
            .and_then(|a| a.attr("encoding"))
            .map(|e| e == "base64")
            .unwrap_or(false);

        Ok(Self {
            root,
            dataset_type,
            endian,
            header_size,
            appended,
            appended_base64,
            compressed,
        })
    }

    fn dataset(&self) -> Option<&Element> {
        self.root.child("VTKFile")?.child(self.dataset_type)
    }

    fn pieces(&self) -> Vec<&Element> {
        match self.dataset() {
            Some(dataset) => dataset.children_named("Piece").collect(),
            None => Vec::new(),
        }
    }

    fn points(&self, piece: &Element) -> IoResult<Vec<Point3f>> {
        let Some(array) = piece
            .child("Points")
            .and_then(|p| p.children_named("DataArray").next())
        else {
            return Ok(Vec::new());
        };
        let values = self.decode(array)?;
        Ok(values
            .chunks_exact(3)
            .map(|c| Point3f::new(c[0] as f32, c[1] as f32, c[2] as f32))
            .collect())
    }

    fn cells(&self, piece: &Element, section: &str) -> IoResult<CellArray> {
        let Some(section) = piece.child(section) else {
            return Ok(CellArray::new());
        };
        let (Some(conn), Some(offsets)) = (section.data_array("connectivity"), section.data_array("offsets"))
        else {
            return Ok(CellArray::new());
        };
        let connectivity: Vec<usize> = self.decode(conn)?.into_iter().map(|v| v as usize).collect();
        let offsets: Vec<usize> = self.decode(offsets)?.into_iter().map(|v| v as usize).collect();
        CellArray::from_offsets(offsets, connectivity)
            .ok_or_else(|| IoError::parse(0, format!("{} offsets do not match connectivity", section.name)))
    }

    fn attributes(&self, piece: &Element, section: &str) -> IoResult<ActiveAttributes> {
        let mut active = ActiveAttributes::default();
        let Some(section) = piece.child(section) else {
            return Ok(active);
        };

        if let Some(array) = section.attr("Scalars").and_then(|name| section.data_array(name)) {
            let components = array.components();
            let values = self.decode(array)?;
            if array.attr("type") == Some("UInt8") && components >= 3 {
                active.colors = Some(
                    values
                        .chunks_exact(components)
                        .map(|c| [c[0] as u8, c[1] as u8, c[2] as u8])
                        .collect(),
                );
            } else {
                active.scalars = Some(DataArray::new(
                    array.attr("Name").unwrap_or("scalars"),
                    components,
                    values.into_iter().map(|v| v as f32).collect(),
                ));
            }
        }
        if let Some(array) = section.attr("Normals").and_then(|name| section.data_array(name)) {
            let values = self.decode(array)?;
            active.normals = Some(
                values
                    .chunks_exact(3)
                    .map(|c| Vector3f::new(c[0] as f32, c[1] as f32, c[2] as f32))
                    .collect(),
            );
        }
        Ok(active)
    }

    /// Decode a `DataArray` element into numbers
    fn decode(&self, array: &Element) -> IoResult<Vec<f64>> {
        let data_type = array.attr("type").unwrap_or("Float32");
        let size = type_size(data_type)
            .ok_or_else(|| IoError::Unsupported(format!("data array type '{}'", data_type)))?;

        match array.attr("format").unwrap_or("ascii") {
            "ascii" => parse_numbers::<f64>(&array.text),
            "binary" => {
                let block = self.inline_block(&array.text)?;
                Ok(self.decode_values(&block, data_type, size))
            }
            "appended" => {
                let offset: usize = array
                    .attr("offset")
                    .and_then(|o| o.trim().parse().ok())
                    .ok_or_else(|| IoError::parse(0, "appended array without offset"))?;
                let block = self.appended_block(offset)?;
                Ok(self.decode_values(&block, data_type, size))
            }
            other => Err(IoError::Unsupported(format!("data array format '{}'", other))),
        }
    }

    fn read_header(&self, bytes: &[u8]) -> usize {
        match (self.header_size, self.endian) {
            (8, Endian::Little) => LittleEndian::read_u64(bytes) as usize,
            (8, Endian::Big) => BigEndian::read_u64(bytes) as usize,
            (_, Endian::Little) => LittleEndian::read_u32(bytes) as usize,
            (_, Endian::Big) => BigEndian::read_u32(bytes) as usize,
        }
    }

    fn read_words(&self, bytes: &[u8], count: usize) -> Vec<usize> {
        bytes
            .chunks_exact(self.header_size)
            .take(count)
            .map(|word| self.read_header(word))
            .collect()
    }

    /// Bytes taken by a compression header over `nblocks` blocks
    fn compressed_header_len(&self, nblocks: usize) -> IoResult<usize> {
        nblocks
            .checked_add(3)
            .and_then(|words| words.checked_mul(self.header_size))
            .ok_or_else(|| IoError::parse(0, format!("bad compressed block count {}", nblocks)))
    }

    /// Inline base64 block: a byte-count header followed by the data, either
    /// encoded together or as two separate base64 runs
    fn inline_block(&self, text: &str) -> IoResult<Vec<u8>> {
        let clean: String = text.chars().filter(|c| !c.is_whitespace()).collect();
        if self.compressed {
            return self.inline_compressed(&clean);
        }
        let hs = self.header_size;

        if let Ok(bytes) = STANDARD.decode(&clean) {
            if bytes.len() >= hs {
                let n = self.read_header(&bytes[..hs]);
                if hs + n <= bytes.len() {
                    return Ok(bytes[hs..hs + n].to_vec());
                }
            }
        }

        let header_chars = hs.div_ceil(3) * 4;
        let header = clean
            .get(..header_chars)
            .and_then(|h| STANDARD.decode(h).ok())
            .filter(|h| h.len() >= hs)
            .ok_or_else(|| IoError::parse(0, "bad base64 block header"))?;
        let n = self.read_header(&header[..hs]);
        let data = STANDARD
            .decode(&clean[header_chars..])
            .map_err(|e| IoError::parse(0, format!("bad base64 data: {}", e)))?;
        data.get(..n)
            .map(<[u8]>::to_vec)
            .ok_or_else(|| IoError::UnexpectedEof { context: "base64 data block".to_string() })
    }

    /// Inline compressed block: the block table and the zlib data are
    /// usually separate base64 runs, older writers encode them together
    fn inline_compressed(&self, clean: &str) -> IoResult<Vec<u8>> {
        let hs = self.header_size;
        let split = || -> IoResult<Vec<u8>> {
            let prefix = clean
                .get(..hs * 4)
                .and_then(|p| STANDARD.decode(p).ok())
                .ok_or_else(|| IoError::parse(0, "bad base64 compression header"))?;
            let nblocks = self.read_words(&prefix, 1)[0];
            let header_chars = self.compressed_header_len(nblocks)?.div_ceil(3) * 4;
            let header = clean
                .get(..header_chars)
                .and_then(|h| STANDARD.decode(h).ok())
                .ok_or_else(|| IoError::parse(0, "bad base64 compression header"))?;
            let data = STANDARD
                .decode(&clean[header_chars..])
                .map_err(|e| IoError::parse(0, format!("bad base64 data: {}", e)))?;
            inflate_blocks(&self.read_words(&header, 3 + nblocks), &data)
        };
        split().or_else(|split_err| {
            let bytes = STANDARD.decode(clean).map_err(|_| split_err)?;
            let nblocks = *self.read_words(&bytes, 1).first().ok_or_else(|| IoError::UnexpectedEof {
                context: "compression header".to_string(),
            })?;
            let header_len = self.compressed_header_len(nblocks)?;
            let data = bytes.get(header_len..).ok_or_else(|| IoError::UnexpectedEof {
                context: "compression header".to_string(),
            })?;
            inflate_blocks(&self.read_words(&bytes, 3 + nblocks), data)
        })
    }

    fn appended_block(&self, offset: usize) -> IoResult<Vec<u8>> {
        let appended = self
            .appended
            .ok_or_else(|| IoError::parse(0, "appended array but no AppendedData"))?;
        if self.compressed {
            return self.appended_compressed(appended, offset);
        }
        let hs = self.header_size;
        let eof = || IoError::UnexpectedEof { context: "appended data".to_string() };

        if !self.appended_base64 {
            let header = appended.get(offset..offset + hs).ok_or_else(eof)?;
            let n = self.read_header(header);
            return appended
                .get(offset + hs..offset + hs + n)
                .map(<[u8]>::to_vec)
                .ok_or_else(eof);
        }

        let header_chars = hs.div_ceil(3) * 4;
        let header_text = appended.get(offset..offset + header_chars).ok_or_else(eof)?;
        let header = STANDARD
            .decode(header_text)
            .map_err(|e| IoError::parse(0, format!("bad base64 header: {}", e)))?;
        if header.len() < hs {
            return Err(eof());
        }
        let n = self.read_header(&header[..hs]);
        let start = offset + header_chars;
        let data_text = appended.get(start..start + n.div_ceil(3) * 4).ok_or_else(eof)?;
        let data = STANDARD
            .decode(data_text)
            .map_err(|e| IoError::parse(0, format!("bad base64 data: {}", e)))?;
        data.get(..n).map(<[u8]>::to_vec).ok_or_else(eof)
    }

    fn appended_compressed(&self, appended: &[u8], offset: usize) -> IoResult<Vec<u8>> {
        let hs = self.header_size;
        let eof = || IoError::UnexpectedEof { context: "appended compressed data".to_string() };

        if !self.appended_base64 {
            let first = appended.get(offset..offset + hs).ok_or_else(eof)?;
            let nblocks = self.read_header(first);
            let header_len = self.compressed_header_len(nblocks)?;
            let header = appended.get(offset..offset + header_len).ok_or_else(eof)?;
            let words = self.read_words(header, 3 + nblocks);
            let total = compressed_total(&words[3..]).ok_or_else(eof)?;
            let start = offset + header_len;
            let data = appended.get(start..start + total).ok_or_else(eof)?;
            return inflate_blocks(&words, data);
        }

        let decode = |text: &[u8]| {
            STANDARD
                .decode(text)
                .map_err(|e| IoError::parse(0, format!("bad base64 data: {}", e)))
        };
        let prefix = decode(appended.get(offset..offset + hs * 4).ok_or_else(eof)?)?;
        let nblocks = self.read_words(&prefix, 1)[0];
        let header_chars = self.compressed_header_len(nblocks)?.div_ceil(3) * 4;
        let header = decode(appended.get(offset..offset + header_chars).ok_or_else(eof)?)?;
        let words = self.read_words(&header, 3 + nblocks);
        if words.len() < 3 + nblocks {
            return Err(eof());
        }
        let total = compressed_total(&words[3..]).ok_or_else(eof)?;
        let start = offset + header_chars;
        let data = decode(appended.get(start..start + total.div_ceil(3) * 4).ok_or_else(eof)?)?;
        inflate_blocks(&words, &data)
    }

    fn decode_values(&self, block: &[u8], data_type: &str, size: usize) -> Vec<f64> {
        match self.endian {
            Endian::Little => decode_typed::<LittleEndian>(block, data_type, size),
            Endian::Big => decode_typed::<BigEndian>(block, data_type, size),
        }
    }
}

fn compressed_total(sizes: &[usize]) -> Option<usize> {
    sizes.iter().try_fold(0usize, |total, &size| total.checked_add(size))
}

/// Inflate zlib blocks described by `[nblocks, block_size, last_size, sizes..]`
fn inflate_blocks(header: &[usize], data: &[u8]) -> IoResult<Vec<u8>> {
    let &[nblocks, block_size, last_size, ..] = header else {
        return Err(IoError::UnexpectedEof { context: "compression header".to_string() });
    };
    let sizes = header
        .get(3..3 + nblocks)
        .ok_or_else(|| IoError::UnexpectedEof { context: "compression header".to_string() })?;

    let mut out = Vec::with_capacity(nblocks.saturating_mul(block_size).min(data.len() * 8));
    let mut start = 0;
    for (i, &size) in sizes.iter().enumerate() {
        let expected = if i + 1 == nblocks && last_size != 0 {
            last_size
        } else {
            block_size
        };
        let compressed = start
            .checked_add(size)
            .and_then(|end| data.get(start..end))
            .ok_or_else(|| IoError::UnexpectedEof { context: format!("compressed block {}", i) })?;
        let before = out.len();
        ZlibDecoder::new(compressed)
            .read_to_end(&mut out)
            .map_err(|e| IoError::parse(0, format!("compressed block {}: {}", i, e)))?;
        if out.len() - before != expected {
            return Err(IoError::parse(
                0,
                format!(
                    "compressed block {} inflates to {} bytes, expected {}",
                    i,
                    out.len() - before,
                    expected
                ),
            ));
        }
        start += size;
    }
    Ok(out)
}

fn type_size(data_type: &str) -> Option<usize> {
    Some(match data_type {
        "Int8" | "UInt8" => 1,
        "Int16" | "UInt16" => 2,
        "Int32" | "UInt32" | "Float32" => 4,
        "Int64" | "UInt64" | "Float64" => 8,
        _ => return None,
    })
}

fn decode_typed<B: ByteOrder>(block: &[u8], data_type: &str, size: usize) -> Vec<f64> {
    block
        .chunks_exact(size)
        .map(|b| match data_type {
            "Int8" => b[0] as i8 as f64,
            "UInt8" => b[0] as f64,
            "Int16" => B::read_i16(b) as f64,
            "UInt16" => B::read_u16(b) as f64,
            "Int32" => B::read_i32(b) as f64,
            "UInt32" => B::read_u32(b) as f64,
            "Int64" => B::read_i64(b) as f64,
            "UInt64" => B::read_u64(b) as f64,
            "Float32" => B::read_f32(b) as f64,
            _ => B::read_f64(b),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use byteorder::WriteBytesExt;

    const ASCII_VTP: &str = r#"<?xml version="1.0"?>
<VTKFile type="PolyData" version="0.1" byte_order="LittleEndian">
  <PolyData>
    <Piece NumberOfPoints="4" NumberOfVerts="0" NumberOfLines="0" NumberOfStrips="0" NumberOfPolys="2">
      <PointData Scalars="temperature">
        <DataArray type="Float32" Name="temperature" format="ascii">1 2 3 4</DataArray>
      </PointData>
      <CellData Scalars="id">
        <DataArray type="Int32" Name="id" format="ascii">10 20</DataArray>
      </CellData>
      <Points>
        <DataArray type="Float32" NumberOfComponents="3" format="ascii">
          0 0 0 1 0 0 1 1 0 0 1 0
        </DataArray>
      </Points>
      <Polys>
        <DataArray type="Int32" Name="connectivity" format="ascii">0 1 2 0 2 3</DataArray>
        <DataArray type="Int32" Name="offsets" format="ascii">3 6</DataArray>
      </Polys>
    </Piece>
  </PolyData>
</VTKFile>
"#;

    #[test]
    fn test_ascii_polydata() {
        let mesh = parse_polydata(ASCII_VTP.as_bytes()).unwrap();
        assert_eq!(mesh.point_count(), 4);
        assert_eq!(mesh.polys.len(), 2);
        assert_eq!(mesh.polys.cell(1), &[0, 2, 3]);
        assert_eq!(mesh.scalar_range(), [1.0, 4.0]);
        assert_eq!(mesh.cell_scalars.unwrap().values, vec![10.0, 20.0]);
    }

    #[test]
    fn test_scalars_attribute_selects_active_array() {
        let text = ASCII_VTP.replace(r#"<PointData Scalars="temperature">"#, "<PointData>");
        let mesh = parse_polydata(text.as_bytes()).unwrap();
        assert!(mesh.point_scalars.is_none());
    }

    fn le_block_u32(values: &[f32]) -> Vec<u8> {
        let mut block = Vec::new();
        block.write_u32::<LittleEndian>((values.len() * 4) as u32).unwrap();
        for &v in values {
            block.write_f32::<LittleEndian>(v).unwrap();
        }
        block
    }

    #[test]
    fn test_inline_binary_joint_and_split_encodings() {
        let points = [0.0f32, 0.0, 0.0, 2.0, 0.0, 0.0, 0.0, 2.0, 0.0];
        let joint = STANDARD.encode(le_block_u32(&points));

        let mut header = Vec::new();
        header.write_u32::<LittleEndian>(36).unwrap();
        let data: Vec<u8> = points.iter().flat_map(|v| v.to_le_bytes()).collect();
        let split = format!("{}{}", STANDARD.encode(header), STANDARD.encode(data));

        for encoded in [joint, split] {
            let text = format!(
                r#"<VTKFile type="PolyData" byte_order="LittleEndian" header_type="UInt32"><PolyData>
<Piece NumberOfPoints="3" NumberOfPolys="1"><Points>
<DataArray type="Float32" NumberOfComponents="3" format="binary">{}</DataArray></Points>
<Polys><DataArray type="Int64" Name="connectivity" format="ascii">0 1 2</DataArray>
<DataArray type="Int64" Name="offsets" format="ascii">3</DataArray></Polys>
</Piece></PolyData></VTKFile>"#,
                encoded
            );
            let mesh = parse_polydata(text.as_bytes()).unwrap();
            assert_eq!(mesh.points[2], Point3f::new(0.0, 2.0, 0.0));
            assert_eq!(mesh.polys.len(), 1);
        }
    }

    #[test]
    fn test_appended_raw_big_endian_uint64() {
        let mut appended = Vec::new();
        appended.write_u64::<BigEndian>(36).unwrap();
        for v in [0.0f32, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0] {
            appended.write_f32::<BigEndian>(v).unwrap();
        }
        let conn_offset = appended.len();
        appended.write_u64::<BigEndian>(24).unwrap();
        for v in [0i64, 1, 2] {
            appended.write_i64::<BigEndian>(v).unwrap();
        }

        let mut bytes = format!(
            r#"<VTKFile type="PolyData" byte_order="BigEndian" header_type="UInt64"><PolyData>
<Piece NumberOfPoints="3" NumberOfLines="1"><Points>
<DataArray type="Float32" NumberOfComponents="3" format="appended" offset="0"/></Points>
<Lines><DataArray type="Int64" Name="connectivity" format="appended" offset="{}"/>
<DataArray type="Int64" Name="offsets" format="ascii">3</DataArray></Lines>
</Piece></PolyData>
<AppendedData encoding="raw">
_"#,
            conn_offset
        )
        .into_bytes();
        bytes.extend_from_slice(&appended);
        bytes.extend_from_slice(b"\n</AppendedData>\n</VTKFile>\n");

        let mesh = parse_polydata(&bytes).unwrap();
        assert_eq!(mesh.points[1], Point3f::new(1.0, 0.0, 0.0));
        assert_eq!(mesh.lines.cell(0), &[0, 1, 2]);
    }

    /// Split `data` into zlib blocks, returning the block table and the
    /// concatenated compressed bytes
    fn zlib_blocks(data: &[u8], block_size: usize) -> (Vec<u64>, Vec<u8>) {
        use flate2::{write::ZlibEncoder, Compression};
        use std::io::Write;

        let chunks: Vec<&[u8]> = data.chunks(block_size).collect();
        let last = data.len() % block_size;
        let mut table = vec![chunks.len() as u64, block_size as u64, last as u64];
        let mut compressed = Vec::new();
        for chunk in chunks {
            let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
            encoder.write_all(chunk).unwrap();
            let block = encoder.finish().unwrap();
            table.push(block.len() as u64);
            compressed.extend_from_slice(&block);
        }
        (table, compressed)
    }

    const TRIANGLE: [f32; 9] = [0.0, 0.0, 0.0, 3.0, 0.0, 0.0, 0.0, 3.0, 0.0];

    fn compressed_polydata(attrs: &str, points_array: &str, appended: Option<(&str, &[u8])>) -> Vec<u8> {
        let mut bytes = format!(
            r#"<VTKFile type="PolyData" compressor="vtkZLibDataCompressor" {}><PolyData>
<Piece NumberOfPoints="3" NumberOfPolys="1"><Points>{}</Points>
<Polys><DataArray type="Int32" Name="connectivity" format="ascii">0 1 2</DataArray>
<DataArray type="Int32" Name="offsets" format="ascii">3</DataArray></Polys>
</Piece></PolyData>"#,
            attrs, points_array
        )
        .into_bytes();
        if let Some((encoding, data)) = appended {
            bytes.extend_from_slice(format!("\n<AppendedData encoding=\"{}\">\n_", encoding).as_bytes());
            bytes.extend_from_slice(data);
            bytes.extend_from_slice(b"\n</AppendedData>");
        }
        bytes.extend_from_slice(b"</VTKFile>\n");
        bytes
    }

    #[test]
    fn test_zlib_inline_binary() {
        let raw: Vec<u8> = TRIANGLE.iter().flat_map(|v| v.to_le_bytes()).collect();
        let (table, data) = zlib_blocks(&raw, 24);
        assert_eq!(table[..3], [2, 24, 12]);

        let mut header = Vec::new();
        for word in &table {
            header.write_u32::<LittleEndian>(*word as u32).unwrap();
        }
        let split = format!("{}{}", STANDARD.encode(&header), STANDARD.encode(&data));
        let joint = STANDARD.encode([header, data].concat());

        for encoded in [split, joint] {
            let array = format!(
                r#"<DataArray type="Float32" NumberOfComponents="3" format="binary">{}</DataArray>"#,
                encoded
            );
            let bytes = compressed_polydata(r#"byte_order="LittleEndian""#, &array, None);
            let mesh = parse_polydata(&bytes).unwrap();
            assert_eq!(mesh.points[1], Point3f::new(3.0, 0.0, 0.0));
            assert_eq!(mesh.points[2], Point3f::new(0.0, 3.0, 0.0));
        }
    }

    #[test]
    fn test_zlib_appended_raw_uint64() {
        let raw: Vec<u8> = TRIANGLE.iter().flat_map(|v| v.to_be_bytes()).collect();
        let (table, data) = zlib_blocks(&raw, 16);
        let mut appended = Vec::new();
        for word in &table {
            appended.write_u64::<BigEndian>(*word).unwrap();
        }
        appended.extend_from_slice(&data);

        let array = r#"<DataArray type="Float32" NumberOfComponents="3" format="appended" offset="0"/>"#;
        let bytes = compressed_polydata(
            r#"byte_order="BigEndian" header_type="UInt64""#,
            array,
            Some(("raw", &appended)),
        );
        let mesh = parse_polydata(&bytes).unwrap();
        assert_eq!(mesh.points[2], Point3f::new(0.0, 3.0, 0.0));
        assert_eq!(mesh.polys.len(), 1);
    }

    #[test]
    fn test_zlib_appended_base64() {
        let raw: Vec<u8> = TRIANGLE.iter().flat_map(|v| v.to_le_bytes()).collect();
        let (table, data) = zlib_blocks(&raw, 36);
        let mut header = Vec::new();
        for word in &table {
            header.write_u32::<LittleEndian>(*word as u32).unwrap();
        }
        let appended = format!("{}{}", STANDARD.encode(&header), STANDARD.encode(&data));

        let array = r#"<DataArray type="Float32" NumberOfComponents="3" format="appended" offset="0"/>"#;
        let bytes = compressed_polydata(
            r#"byte_order="LittleEndian""#,
            array,
            Some(("base64", appended.as_bytes())),
        );
        let mesh = parse_polydata(&bytes).unwrap();
        assert_eq!(mesh.points[1], Point3f::new(3.0, 0.0, 0.0));
    }

    #[test]
    fn test_corrupt_zlib_block() {
        let raw: Vec<u8> = TRIANGLE.iter().flat_map(|v| v.to_le_bytes()).collect();
        let (table, mut data) = zlib_blocks(&raw, 36);
        data[4] ^= 0xff;
        data[5] ^= 0xff;
        let mut header = Vec::new();
        for word in &table {
            header.write_u32::<LittleEndian>(*word as u32).unwrap();
        }
        let array = format!(
            r#"<DataArray type="Float32" NumberOfComponents="3" format="binary">{}{}</DataArray>"#,
            STANDARD.encode(&header),
            STANDARD.encode(&data)
        );
        let bytes = compressed_polydata(r#"byte_order="LittleEndian""#, &array, None);
        assert!(parse_polydata(&bytes).is_err());
    }

    #[test]
    fn test_other_compressors_are_rejected() {
        let text = ASCII_VTP.replace(
            r#"byte_order="LittleEndian">"#,
            r#"byte_order="LittleEndian" compressor="vtkLZ4DataCompressor">"#,
        );
        let err = parse_polydata(text.as_bytes()).unwrap_err();
        assert!(matches!(err, meshview_core::Error::Unsupported(_)));
    }

    #[test]
    fn test_wrong_dataset_type() {
        assert!(parse_unstructured_grid(ASCII_VTP.as_bytes()).is_err());
    }

    #[test]
    fn test_unstructured_grid_with_two_pieces() {
        let piece = r#"<Piece NumberOfPoints="4" NumberOfCells="1">
<Points><DataArray type="Float64" NumberOfComponents="3" format="ascii">0 0 0 1 0 0 0 1 0 0 0 1</DataArray></Points>
<Cells>
<DataArray type="Int32" Name="connectivity" format="ascii">0 1 2 3</DataArray>
<DataArray type="Int32" Name="offsets" format="ascii">4</DataArray>
<DataArray type="UInt8" Name="types" format="ascii">10</DataArray>
</Cells></Piece>"#;
        let text = format!(
            r#"<VTKFile type="UnstructuredGrid"><UnstructuredGrid>{}{}</UnstructuredGrid></VTKFile>"#,
            piece, piece
        );
        let grid = parse_unstructured_grid(text.as_bytes()).unwrap();
        assert_eq!(grid.points.len(), 8);
        assert_eq!(grid.cells.cell(1), &[4, 5, 6, 7]);
        let surface = extract_surface(&grid);
        assert_eq!(surface.polys.len(), 8);
    }

    #[test]
    fn test_image_data_volume() {
        let text = r#"<VTKFile type="ImageData" version="1.0">
<ImageData WholeExtent="0 2 0 1 0 0" Origin="0 0 0" Spacing="1 2 3">
<Piece Extent="0 2 0 1 0 0">
<PointData Scalars="density">
<DataArray type="Float32" Name="density" format="ascii">0 1 2 3 4 5</DataArray>
</PointData>
</Piece></ImageData></VTKFile>"#;
        let field = parse_image_data(text.as_bytes()).unwrap();
        assert_eq!(field.dimensions, [3, 2, 1]);
        assert_eq!(field.spacing, Vector3f::new(1.0, 2.0, 3.0));
        assert_eq!(field.scalars().unwrap().values[5], 5.0);
    }
}

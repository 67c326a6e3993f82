//! PLY header parsing.
//!
//! The header is a block of newline-terminated ASCII lines starting with `ply` and ending with
//! `end_header`. It declares the data encoding and, in file order, every element with its row
//! count and property layout.

use crate::error::{PlyError, PlyResult};
use tracing::debug;

/// Encoding of the data section.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlyFormat {
    Ascii,
    BinaryLittleEndian,
    BinaryBigEndian,
}

impl PlyFormat {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "ascii" => Some(Self::Ascii),
            "binary_little_endian" => Some(Self::BinaryLittleEndian),
            "binary_big_endian" => Some(Self::BinaryBigEndian),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PlyFormat::Ascii => "ascii",
            PlyFormat::BinaryLittleEndian => "binary_little_endian",
            PlyFormat::BinaryBigEndian => "binary_big_endian",
        }
    }
}

/// Numeric type of a scalar property or of a list's count/values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScalarType {
    Int8,
    UInt8,
    Int16,
    UInt16,
    Int32,
    UInt32,
    Float32,
    Float64,
}

impl ScalarType {
    /// Parse a type token. Both the classic names (`uchar`) and the sized names (`uint8`) are
    /// accepted.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "char" | "int8" => Some(Self::Int8),
            "uchar" | "uint8" => Some(Self::UInt8),
            "short" | "int16" => Some(Self::Int16),
            "ushort" | "uint16" => Some(Self::UInt16),
            "int" | "int32" => Some(Self::Int32),
            "uint" | "uint32" => Some(Self::UInt32),
            "float" | "float32" => Some(Self::Float32),
            "double" | "float64" => Some(Self::Float64),
            _ => None,
        }
    }

    /// Classic type name, as written by most exporters.
    pub fn as_str(&self) -> &'static str {
        match self {
            ScalarType::Int8 => "char",
            ScalarType::UInt8 => "uchar",
            ScalarType::Int16 => "short",
            ScalarType::UInt16 => "ushort",
            ScalarType::Int32 => "int",
            ScalarType::UInt32 => "uint",
            ScalarType::Float32 => "float",
            ScalarType::Float64 => "double",
        }
    }

    pub fn size_bytes(&self) -> usize {
        match self {
            ScalarType::Int8 | ScalarType::UInt8 => 1,
            ScalarType::Int16 | ScalarType::UInt16 => 2,
            ScalarType::Int32 | ScalarType::UInt32 | ScalarType::Float32 => 4,
            ScalarType::Float64 => 8,
        }
    }

    pub fn is_integer(&self) -> bool {
        !matches!(self, ScalarType::Float32 | ScalarType::Float64)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PropertyKind {
    Scalar(ScalarType),
    List { count: ScalarType, value: ScalarType },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertyDescriptor {
    pub name: String,
    pub kind: PropertyKind,
}

impl PropertyDescriptor {
    pub fn is_scalar(&self) -> bool {
        matches!(self.kind, PropertyKind::Scalar(_))
    }

    pub fn is_list(&self) -> bool {
        matches!(self.kind, PropertyKind::List { .. })
    }
}

/// A named table of rows declared by an `element` line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementDescriptor {
    pub name: String,
    pub row_count: usize,
    pub properties: Vec<PropertyDescriptor>,
}

impl ElementDescriptor {
    /// Index of the property with the given name.
    pub fn property_index(&self, name: &str) -> Option<usize> {
        self.properties.iter().position(|p| p.name == name)
    }

    /// Size in bytes of one row when every property is a scalar, `None` if any list is present.
    pub fn fixed_row_size(&self) -> Option<usize> {
        self.properties
            .iter()
            .map(|p| match p.kind {
                PropertyKind::Scalar(ty) => Some(ty.size_bytes()),
                PropertyKind::List { .. } => None,
            })
            .sum()
    }
}

/// Parsed header: encoding, elements in file order, and where the data section begins.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlyHeader {
    pub format: PlyFormat,
    pub elements: Vec<ElementDescriptor>,
    pub data_offset: usize,
}

impl PlyHeader {
    pub fn element(&self, name: &str) -> Option<&ElementDescriptor> {
        self.elements.iter().find(|e| e.name == name)
    }
}

/// Split off the next line, returning it without its `\n` / `\r\n` terminator together with the
/// offset just past the terminator.
fn next_line(bytes: &[u8], start: usize) -> Option<(&[u8], usize)> {
    if start >= bytes.len() {
        return None;
    }
    let rest = &bytes[start..];
    match rest.iter().position(|&b| b == b'\n') {
        Some(i) => {
            let line = &rest[..i];
            let line = line.strip_suffix(b"\r").unwrap_or(line);
            Some((line, start + i + 1))
        }
        None => Some((rest, bytes.len())),
    }
}

/// Parse the header at the start of `bytes`.
pub fn parse_header(bytes: &[u8]) -> PlyResult<PlyHeader> {
    let mut offset = 0;
    let mut line_no = 0usize;
    let mut format: Option<PlyFormat> = None;
    let mut elements: Vec<ElementDescriptor> = Vec::new();
    let mut data_offset: Option<usize> = None;

    while let Some((raw, next)) = next_line(bytes, offset) {
        offset = next;
        line_no += 1;

        let line = std::str::from_utf8(raw)
            .map_err(|_| PlyError::header(format!("line {line_no} is not valid UTF-8")))?
            .trim();

        if line_no == 1 {
            if line != "ply" {
                return Err(PlyError::header("first line must be \"ply\""));
            }
            continue;
        }

        let mut it = line.split_whitespace();
        let Some(keyword) = it.next() else {
            continue;
        };

        match keyword {
            "end_header" => {
                data_offset = Some(offset);
                break;
            }
            "comment" | "obj_info" => {}
            "format" => {
                if format.is_some() {
                    return Err(PlyError::header("duplicate format line"));
                }
                let token = it.next().unwrap_or("");
                let f = PlyFormat::parse(token)
                    .ok_or_else(|| PlyError::header(format!("unsupported format {token:?}")))?;
                if it.next().is_none() {
                    return Err(PlyError::header("format line is missing a version"));
                }
                format = Some(f);
            }
            "element" => {
                let name = it
                    .next()
                    .ok_or_else(|| PlyError::header(format!("line {line_no}: bad element")))?;
                let count_str = it.next().ok_or_else(|| {
                    PlyError::header(format!("line {line_no}: element {name} has no count"))
                })?;
                let row_count: usize = count_str.parse().map_err(|_| {
                    PlyError::header(format!(
                        "line {line_no}: bad element count {count_str:?} for {name}"
                    ))
                })?;
                elements.push(ElementDescriptor {
                    name: name.to_string(),
                    row_count,
                    properties: Vec::new(),
                });
            }
            "property" => {
                let current = elements.last_mut().ok_or_else(|| {
                    PlyError::header(format!("line {line_no}: property before any element"))
                })?;
                current.properties.push(parse_property(&mut it, line_no)?);
            }
            other => {
                debug!("Skipping unknown header keyword {:?} on line {}", other, line_no);
            }
        }
    }

    if line_no == 0 {
        return Err(PlyError::header("empty file"));
    }
    let data_offset =
        data_offset.ok_or_else(|| PlyError::header("reached end of file before end_header"))?;
    let format = format.ok_or_else(|| PlyError::header("missing format line"))?;

    debug!(
        "Parsed PLY header: format={}, {} element(s), data at byte {}",
        format.as_str(),
        elements.len(),
        data_offset
    );

    Ok(PlyHeader {
        format,
        elements,
        data_offset,
    })
}

fn parse_property<'a>(
    it: &mut impl Iterator<Item = &'a str>,
    line_no: usize,
) -> PlyResult<PropertyDescriptor> {
    let bad = || PlyError::header(format!("line {line_no}: bad property"));
    let type_of = |token: &str| {
        ScalarType::parse(token).ok_or_else(|| {
            PlyError::header(format!("line {line_no}: unknown type {token:?}"))
        })
    };

    let first = it.next().ok_or_else(bad)?;
    if first == "list" {
        let count = type_of(it.next().ok_or_else(bad)?)?;
        let value = type_of(it.next().ok_or_else(bad)?)?;
        let name = it.next().ok_or_else(bad)?;
        if !count.is_integer() {
            return Err(PlyError::header(format!(
                "line {line_no}: list {name} has a non-integer count type"
            )));
        }
        Ok(PropertyDescriptor {
            name: name.to_string(),
            kind: PropertyKind::List { count, value },
        })
    } else {
        let ty = type_of(first)?;
        let name = it.next().ok_or_else(bad)?;
        Ok(PropertyDescriptor {
            name: name.to_string(),
            kind: PropertyKind::Scalar(ty),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CUBE_HEADER: &str = "ply\n\
        format binary_little_endian 1.0\n\
        comment made by hand\n\
        element vertex 8\n\
        property float x\n\
        property float y\n\
        property float z\n\
        property uchar red\n\
        element face 6\n\
        property list uchar int vertex_indices\n\
        end_header\n";

    fn expect_header_error(text: &str) -> String {
        match parse_header(text.as_bytes()) {
            Err(PlyError::MalformedHeader(msg)) => msg,
            other => panic!("expected MalformedHeader, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_elements_in_order() {
        let header = parse_header(CUBE_HEADER.as_bytes()).unwrap();
        assert_eq!(header.format, PlyFormat::BinaryLittleEndian);
        assert_eq!(header.data_offset, CUBE_HEADER.len());
        assert_eq!(header.elements.len(), 2);

        let vertex = &header.elements[0];
        assert_eq!(vertex.name, "vertex");
        assert_eq!(vertex.row_count, 8);
        assert_eq!(vertex.properties.len(), 4);
        assert_eq!(vertex.properties[3].kind, PropertyKind::Scalar(ScalarType::UInt8));
        assert_eq!(vertex.fixed_row_size(), Some(13));

        let face = &header.elements[1];
        assert_eq!(face.row_count, 6);
        assert_eq!(
            face.properties[0].kind,
            PropertyKind::List {
                count: ScalarType::UInt8,
                value: ScalarType::Int32
            }
        );
        assert_eq!(face.fixed_row_size(), None);
    }

    #[test]
    fn test_type_aliases() {
        let pairs = [
            ("char", "int8"),
            ("uchar", "uint8"),
            ("short", "int16"),
            ("ushort", "uint16"),
            ("int", "int32"),
            ("uint", "uint32"),
            ("float", "float32"),
            ("double", "float64"),
        ];
        for (classic, sized) in pairs {
            assert_eq!(ScalarType::parse(classic), ScalarType::parse(sized));
            assert!(ScalarType::parse(classic).is_some());
        }
        assert_eq!(ScalarType::parse("half"), None);
    }

    #[test]
    fn test_crlf_line_endings() {
        let text = "ply\r\nformat ascii 1.0\r\nelement vertex 1\r\nproperty double x\r\nend_header\r\n0.5\r\n";
        let header = parse_header(text.as_bytes()).unwrap();
        assert_eq!(header.format, PlyFormat::Ascii);
        assert_eq!(&text.as_bytes()[header.data_offset..], b"0.5\r\n");
        assert_eq!(header.elements[0].properties[0].name, "x");
    }

    #[test]
    fn test_unknown_keywords_are_skipped() {
        let text = "ply\nformat ascii 1.0\nobj_info scanner v2\nfrobnicate 3\nelement vertex 0\nend_header\n";
        let header = parse_header(text.as_bytes()).unwrap();
        assert_eq!(header.elements.len(), 1);
    }

    #[test]
    fn test_missing_magic() {
        let msg = expect_header_error("format ascii 1.0\nend_header\n");
        assert!(msg.contains("ply"));
    }

    #[test]
    fn test_missing_format() {
        let msg = expect_header_error("ply\nelement vertex 1\nproperty float x\nend_header\n");
        assert!(msg.contains("format"));
    }

    #[test]
    fn test_duplicate_format() {
        expect_header_error("ply\nformat ascii 1.0\nformat ascii 1.0\nend_header\n");
    }

    #[test]
    fn test_unsupported_format() {
        expect_header_error("ply\nformat binary_middle_endian 1.0\nend_header\n");
    }

    #[test]
    fn test_property_before_element() {
        let msg = expect_header_error("ply\nformat ascii 1.0\nproperty float x\nend_header\n");
        assert!(msg.contains("before any element"));
    }

    #[test]
    fn test_unknown_property_type() {
        let msg = expect_header_error(
            "ply\nformat ascii 1.0\nelement vertex 1\nproperty half x\nend_header\n",
        );
        assert!(msg.contains("half"));
    }

    #[test]
    fn test_non_numeric_count() {
        expect_header_error("ply\nformat ascii 1.0\nelement vertex many\nend_header\n");
        expect_header_error("ply\nformat ascii 1.0\nelement vertex -3\nend_header\n");
    }

    #[test]
    fn test_float_list_count_rejected() {
        expect_header_error(
            "ply\nformat ascii 1.0\nelement face 1\nproperty list float int vertex_indices\nend_header\n",
        );
    }

    #[test]
    fn test_missing_end_header() {
        let msg = expect_header_error(
            "ply\nformat ascii 1.0\nelement vertex 1\nproperty float x\n",
        );
        assert!(msg.contains("end_header"));
    }

    #[test]
    fn test_end_header_without_trailing_newline() {
        let text = "ply\nformat ascii 1.0\nend_header";
        let header = parse_header(text.as_bytes()).unwrap();
        assert_eq!(header.data_offset, text.len());
        assert!(header.elements.is_empty());
    }
}

//! Element decoding: turns the rows of one element into typed, contiguous buffers.

use crate::error::{PlyError, PlyResult};
use crate::ply::cursor::DataCursor;
use crate::ply::header::{ElementDescriptor, PlyFormat, PropertyKind};
use std::collections::HashMap;
use tracing::debug;

/// Numeric type a requested scalar group is coerced into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputType {
    Float32,
    UInt8,
    Int32,
}

/// Dense storage for one decoded group.
#[derive(Debug, Clone, PartialEq)]
pub enum BufferData {
    Float32(Vec<f32>),
    UInt8(Vec<u8>),
    Int32(Vec<i32>),
}

impl BufferData {
    fn zeroed(ty: OutputType, len: usize) -> Self {
        match ty {
            OutputType::Float32 => BufferData::Float32(vec![0.0; len]),
            OutputType::UInt8 => BufferData::UInt8(vec![0; len]),
            OutputType::Int32 => BufferData::Int32(vec![0; len]),
        }
    }

    // `as` saturates on overflow and maps NaN to zero for the integer targets.
    fn set(&mut self, i: usize, v: f64) {
        match self {
            BufferData::Float32(d) => d[i] = v as f32,
            BufferData::UInt8(d) => d[i] = v as u8,
            BufferData::Int32(d) => d[i] = v as i32,
        }
    }
}

/// Values of one property group, `stride` components per row.
#[derive(Debug, Clone, PartialEq)]
pub struct GroupBuffer {
    pub stride: usize,
    pub data: BufferData,
}

impl GroupBuffer {
    pub fn rows(&self) -> usize {
        let len = match &self.data {
            BufferData::Float32(d) => d.len(),
            BufferData::UInt8(d) => d.len(),
            BufferData::Int32(d) => d.len(),
        };
        if self.stride == 0 { 0 } else { len / self.stride }
    }

    /// Reinterpret as fixed-width `f32` rows. `None` if the type or stride differ.
    pub fn into_f32_rows<const N: usize>(self) -> Option<Vec<[f32; N]>> {
        match self.data {
            BufferData::Float32(d) if self.stride == N => Some(to_rows(&d)),
            _ => None,
        }
    }

    /// Reinterpret as fixed-width `u8` rows. `None` if the type or stride differ.
    pub fn into_u8_rows<const N: usize>(self) -> Option<Vec<[u8; N]>> {
        match self.data {
            BufferData::UInt8(d) if self.stride == N => Some(to_rows(&d)),
            _ => None,
        }
    }
}

fn to_rows<T: Copy + Default, const N: usize>(flat: &[T]) -> Vec<[T; N]> {
    flat.chunks_exact(N)
        .map(|chunk| {
            let mut row = [T::default(); N];
            row.copy_from_slice(chunk);
            row
        })
        .collect()
}

/// Variable-length vertex index lists, one per face row.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FaceList {
    offsets: Vec<usize>,
    indices: Vec<u32>,
}

impl FaceList {
    pub fn with_capacity(rows: usize) -> Self {
        let mut offsets = Vec::with_capacity(rows.saturating_add(1));
        offsets.push(0);
        Self {
            offsets,
            indices: Vec::with_capacity(rows.saturating_mul(3)),
        }
    }

    pub fn from_rows<I, R>(rows: I) -> Self
    where
        I: IntoIterator<Item = R>,
        R: AsRef<[u32]>,
    {
        let mut list = Self::with_capacity(0);
        for row in rows {
            list.push_row(row.as_ref());
        }
        list
    }

    pub fn push_row(&mut self, row: &[u32]) {
        if self.offsets.is_empty() {
            self.offsets.push(0);
        }
        self.indices.extend_from_slice(row);
        self.offsets.push(self.indices.len());
    }

    pub fn len(&self) -> usize {
        self.offsets.len().saturating_sub(1)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn row(&self, i: usize) -> &[u32] {
        &self.indices[self.offsets[i]..self.offsets[i + 1]]
    }

    pub fn iter(&self) -> impl Iterator<Item = &[u32]> + '_ {
        (0..self.len()).map(move |i| self.row(i))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct ScalarRequest {
    group: &'static str,
    columns: Vec<usize>,
    output: OutputType,
}

/// Which properties of an element to materialize. Everything else is parsed and dropped.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ElementRequest {
    scalars: Vec<ScalarRequest>,
    lists: Vec<(&'static str, usize)>,
}

impl ElementRequest {
    pub fn new() -> Self {
        Self::default()
    }

    /// Gather the scalar properties at `columns` into `group`, one row per element row.
    pub fn scalars(mut self, group: &'static str, columns: Vec<usize>, output: OutputType) -> Self {
        self.scalars.push(ScalarRequest {
            group,
            columns,
            output,
        });
        self
    }

    /// Gather the list property at `column` into the face list `group`.
    pub fn list(mut self, group: &'static str, column: usize) -> Self {
        self.lists.push((group, column));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.scalars.is_empty() && self.lists.is_empty()
    }
}

/// Result of decoding one element.
#[derive(Debug, Default)]
pub struct DecodedElementBuffer {
    rows: usize,
    groups: HashMap<&'static str, GroupBuffer>,
    lists: HashMap<&'static str, FaceList>,
}

impl DecodedElementBuffer {
    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn group(&self, name: &str) -> Option<&GroupBuffer> {
        self.groups.get(name)
    }

    pub fn take_group(&mut self, name: &str) -> Option<GroupBuffer> {
        self.groups.remove(name)
    }

    pub fn take_list(&mut self, name: &str) -> Option<FaceList> {
        self.lists.remove(name)
    }
}

#[derive(Debug, Clone, Copy)]
enum Slot {
    Skip,
    Scalar { group: usize, component: usize },
    List { group: usize },
}

/// Decode all rows of `element`, leaving `cursor` just past its last byte.
pub fn decode_element(
    element: &ElementDescriptor,
    cursor: &mut DataCursor<'_>,
    request: &ElementRequest,
) -> PlyResult<DecodedElementBuffer> {
    if request.is_empty() {
        skip_element(element, cursor)?;
        return Ok(DecodedElementBuffer {
            rows: element.row_count,
            ..Default::default()
        });
    }

    check_row_budget(element, cursor)?;
    let rows = element.row_count;
    let mut slots = vec![Slot::Skip; element.properties.len()];

    let mut buffers = Vec::with_capacity(request.scalars.len());
    for (group, req) in request.scalars.iter().enumerate() {
        for (component, &column) in req.columns.iter().enumerate() {
            match element.properties.get(column) {
                Some(p) if p.is_scalar() => slots[column] = Slot::Scalar { group, component },
                _ => return Err(invalid_column(element, req.group, column)),
            }
        }
        let stride = req.columns.len();
        let len = rows
            .checked_mul(stride)
            .ok_or_else(|| overflow(cursor))?;
        buffers.push(GroupBuffer {
            stride,
            data: BufferData::zeroed(req.output, len),
        });
    }

    let mut lists = Vec::with_capacity(request.lists.len());
    for (group, &(name, column)) in request.lists.iter().enumerate() {
        match element.properties.get(column) {
            Some(p) if p.is_list() => slots[column] = Slot::List { group },
            _ => return Err(invalid_column(element, name, column)),
        }
        lists.push(FaceList::with_capacity(rows));
    }

    let mut scratch: Vec<f64> = Vec::new();
    let mut indices: Vec<u32> = Vec::new();

    for row in 0..rows {
        for (slot, prop) in slots.iter().zip(&element.properties) {
            match (*slot, prop.kind) {
                (Slot::Scalar { group, component }, PropertyKind::Scalar(ty)) => {
                    let v = cursor.read_scalar(ty)?;
                    let buf = &mut buffers[group];
                    buf.data.set(row * buf.stride + component, v);
                }
                (Slot::List { group }, PropertyKind::List { count, value }) => {
                    cursor.read_list(count, value, &mut scratch)?;
                    indices.clear();
                    for &v in &scratch {
                        if !(0.0..=i32::MAX as f64).contains(&v) || v.fract() != 0.0 {
                            return Err(PlyError::IndexOutOfRange {
                                face: row,
                                index: v,
                            });
                        }
                        indices.push(v as u32);
                    }
                    lists[group].push_row(&indices);
                }
                (_, kind) => cursor.skip_property(kind)?,
            }
        }
    }

    debug!(
        "Decoded element {:?}: {} rows, {} scalar group(s), {} list group(s), cursor at {}",
        element.name,
        rows,
        buffers.len(),
        lists.len(),
        cursor.offset()
    );

    Ok(DecodedElementBuffer {
        rows,
        groups: request
            .scalars
            .iter()
            .map(|r| r.group)
            .zip(buffers)
            .collect(),
        lists: request
            .lists
            .iter()
            .map(|&(name, _)| name)
            .zip(lists)
            .collect(),
    })
}

/// Advance `cursor` past every row of `element` without keeping any values.
pub fn skip_element(element: &ElementDescriptor, cursor: &mut DataCursor<'_>) -> PlyResult<()> {
    if element.properties.is_empty() {
        return Ok(());
    }
    check_row_budget(element, cursor)?;

    let binary = cursor.format() != PlyFormat::Ascii;
    match element.fixed_row_size() {
        Some(size) if binary => {
            let len = size
                .checked_mul(element.row_count)
                .ok_or_else(|| overflow(cursor))?;
            cursor.skip_bytes(len)?;
        }
        _ => {
            for _ in 0..element.row_count {
                for prop in &element.properties {
                    cursor.skip_property(prop.kind)?;
                }
            }
        }
    }
    debug!("Skipped element {:?} ({} rows)", element.name, element.row_count);
    Ok(())
}

/// Smallest number of bytes one row of `element` can occupy.
///
/// Binary rows need every scalar plus every list count; an ASCII row needs at least one byte per
/// property token.
fn min_row_bytes(element: &ElementDescriptor, format: PlyFormat) -> usize {
    match format {
        PlyFormat::Ascii => element.properties.len(),
        PlyFormat::BinaryLittleEndian | PlyFormat::BinaryBigEndian => element
            .properties
            .iter()
            .map(|p| match p.kind {
                PropertyKind::Scalar(ty) => ty.size_bytes(),
                PropertyKind::List { count, .. } => count.size_bytes(),
            })
            .sum(),
    }
}

/// Reject a declared row count the rest of the data section cannot possibly hold, before any
/// buffer is sized from it.
fn check_row_budget(element: &ElementDescriptor, cursor: &DataCursor<'_>) -> PlyResult<()> {
    let available = cursor.remaining();
    let needed = min_row_bytes(element, cursor.format())
        .checked_mul(element.row_count)
        .ok_or_else(|| overflow(cursor))?;
    if needed > available {
        return Err(PlyError::TruncatedData {
            offset: cursor.offset(),
            needed: needed - available,
        });
    }
    Ok(())
}

fn overflow(cursor: &DataCursor<'_>) -> PlyError {
    PlyError::TruncatedData {
        offset: cursor.offset(),
        needed: usize::MAX,
    }
}

fn invalid_column(element: &ElementDescriptor, group: &str, column: usize) -> PlyError {
    PlyError::MissingPrerequisite(format!(
        "group {group:?} requested column {column} of element {:?} with the wrong kind",
        element.name
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ply::header::{PropertyDescriptor, ScalarType};

    fn scalar(name: &str, ty: ScalarType) -> PropertyDescriptor {
        PropertyDescriptor {
            name: name.to_string(),
            kind: PropertyKind::Scalar(ty),
        }
    }

    fn list(name: &str) -> PropertyDescriptor {
        PropertyDescriptor {
            name: name.to_string(),
            kind: PropertyKind::List {
                count: ScalarType::UInt8,
                value: ScalarType::Int32,
            },
        }
    }

    fn vertex_element(rows: usize) -> ElementDescriptor {
        ElementDescriptor {
            name: "vertex".to_string(),
            row_count: rows,
            properties: vec![
                scalar("x", ScalarType::Float64),
                scalar("y", ScalarType::Float64),
                scalar("confidence", ScalarType::Int16),
                scalar("z", ScalarType::Float64),
                scalar("red", ScalarType::UInt8),
            ],
        }
    }

    #[test]
    fn test_selective_decode_with_coercion() {
        let mut bytes = Vec::new();
        for i in 0..2 {
            let base = i as f64;
            bytes.extend_from_slice(&(base + 0.5).to_le_bytes());
            bytes.extend_from_slice(&(base + 1.5).to_le_bytes());
            bytes.extend_from_slice(&(-7i16).to_le_bytes());
            bytes.extend_from_slice(&(base + 2.5).to_le_bytes());
            bytes.push(200 + i as u8);
        }
        bytes.extend_from_slice(b"tail");

        let el = vertex_element(2);
        let request = ElementRequest::new()
            .scalars("position", vec![0, 1, 3], OutputType::Float32)
            .scalars("color", vec![4], OutputType::Int32);
        let mut cursor = DataCursor::new(&bytes, 0, PlyFormat::BinaryLittleEndian);
        let mut decoded = decode_element(&el, &mut cursor, &request).unwrap();

        assert_eq!(decoded.rows(), 2);
        assert_eq!(cursor.remaining(), 4);

        let position = decoded.take_group("position").unwrap();
        assert_eq!(position.rows(), 2);
        assert_eq!(
            position.into_f32_rows::<3>().unwrap(),
            vec![[0.5, 1.5, 2.5], [1.5, 2.5, 3.5]]
        );
        let color = decoded.take_group("color").unwrap();
        assert_eq!(color.data, BufferData::Int32(vec![200, 201]));
    }

    #[test]
    fn test_narrowing_to_u8_saturates() {
        let el = ElementDescriptor {
            name: "vertex".to_string(),
            row_count: 1,
            properties: vec![
                scalar("red", ScalarType::Float32),
                scalar("green", ScalarType::Int32),
                scalar("blue", ScalarType::UInt8),
            ],
        };
        let request = ElementRequest::new().scalars("color", vec![0, 1, 2], OutputType::UInt8);
        let mut cursor = DataCursor::new(b"300.7 -4 17", 0, PlyFormat::Ascii);
        let mut decoded = decode_element(&el, &mut cursor, &request).unwrap();
        let color = decoded.take_group("color").unwrap();
        assert_eq!(color.into_u8_rows::<3>().unwrap(), vec![[255, 0, 17]]);
    }

    #[test]
    fn test_face_lists_big_endian() {
        let el = ElementDescriptor {
            name: "face".to_string(),
            row_count: 2,
            properties: vec![scalar("flags", ScalarType::UInt8), list("vertex_indices")],
        };
        let mut bytes = vec![1u8, 3];
        for i in [0i32, 1, 2] {
            bytes.extend_from_slice(&i.to_be_bytes());
        }
        bytes.extend_from_slice(&[0u8, 4]);
        for i in [2i32, 3, 4, 5] {
            bytes.extend_from_slice(&i.to_be_bytes());
        }

        let request = ElementRequest::new().list("faces", 1);
        let mut cursor = DataCursor::new(&bytes, 0, PlyFormat::BinaryBigEndian);
        let mut decoded = decode_element(&el, &mut cursor, &request).unwrap();
        let faces = decoded.take_list("faces").unwrap();

        assert_eq!(faces.len(), 2);
        assert_eq!(faces.row(0), &[0, 1, 2]);
        assert_eq!(faces.row(1), &[2, 3, 4, 5]);
        assert_eq!(cursor.remaining(), 0);
    }

    #[test]
    fn test_negative_face_index_rejected() {
        let el = ElementDescriptor {
            name: "face".to_string(),
            row_count: 1,
            properties: vec![list("vertex_indices")],
        };
        let request = ElementRequest::new().list("faces", 0);
        let mut cursor = DataCursor::new(b"3 0 -1 2", 0, PlyFormat::Ascii);
        assert!(matches!(
            decode_element(&el, &mut cursor, &request),
            Err(PlyError::IndexOutOfRange { face: 0, .. })
        ));
    }

    #[test]
    fn test_truncated_element() {
        let el = vertex_element(2);
        let bytes = vec![0u8; 27 + 10];
        let request = ElementRequest::new().scalars("position", vec![0, 1, 3], OutputType::Float32);
        let mut cursor = DataCursor::new(&bytes, 0, PlyFormat::BinaryLittleEndian);
        assert!(matches!(
            decode_element(&el, &mut cursor, &request),
            Err(PlyError::TruncatedData { .. })
        ));
    }

    #[test]
    fn test_oversized_row_count_is_truncated() {
        let bytes = vec![0u8; 64];
        let request = ElementRequest::new().scalars("position", vec![0, 1, 3], OutputType::Float32);

        for rows in [usize::MAX, 1 << 62, 3] {
            let el = vertex_element(rows);
            let mut cursor = DataCursor::new(&bytes, 0, PlyFormat::BinaryLittleEndian);
            assert!(matches!(
                decode_element(&el, &mut cursor, &request),
                Err(PlyError::TruncatedData { offset: 0, .. })
            ));

            let mut cursor = DataCursor::new(&bytes, 0, PlyFormat::BinaryLittleEndian);
            assert!(matches!(
                skip_element(&el, &mut cursor),
                Err(PlyError::TruncatedData { .. })
            ));
        }
    }

    #[test]
    fn test_oversized_face_count_is_truncated() {
        let el = ElementDescriptor {
            name: "face".to_string(),
            row_count: usize::MAX,
            properties: vec![list("vertex_indices")],
        };
        let request = ElementRequest::new().list("faces", 0);
        let mut cursor = DataCursor::new(b"3 0 1 2\n", 0, PlyFormat::Ascii);
        assert!(matches!(
            decode_element(&el, &mut cursor, &request),
            Err(PlyError::TruncatedData { .. })
        ));
        assert_eq!(cursor.offset(), 0);
    }

    #[test]
    fn test_skip_element_without_properties() {
        let el = ElementDescriptor {
            name: "marker".to_string(),
            row_count: usize::MAX,
            properties: Vec::new(),
        };
        let mut cursor = DataCursor::new(b"1 2", 0, PlyFormat::Ascii);
        skip_element(&el, &mut cursor).unwrap();
        assert_eq!(cursor.offset(), 0);
    }

    #[test]
    fn test_skip_fixed_and_list_elements() {
        let el = vertex_element(3);
        let mut bytes = vec![0u8; 27 * 3];
        bytes.extend_from_slice(&[2, 0, 0, 0, 9, 0, 0, 0, 8]);
        bytes.push(0xAA);

        let mut cursor = DataCursor::new(&bytes, 0, PlyFormat::BinaryLittleEndian);
        skip_element(&el, &mut cursor).unwrap();
        assert_eq!(cursor.offset(), 81);

        let faces = ElementDescriptor {
            name: "face".to_string(),
            row_count: 1,
            properties: vec![list("vertex_indices")],
        };
        skip_element(&faces, &mut cursor).unwrap();
        assert_eq!(cursor.remaining(), 1);
    }

    #[test]
    fn test_scalar_request_on_list_column_is_an_error() {
        let el = ElementDescriptor {
            name: "face".to_string(),
            row_count: 0,
            properties: vec![list("vertex_indices")],
        };
        let request = ElementRequest::new().scalars("position", vec![0], OutputType::Float32);
        let mut cursor = DataCursor::new(&[], 0, PlyFormat::BinaryLittleEndian);
        assert!(matches!(
            decode_element(&el, &mut cursor, &request),
            Err(PlyError::MissingPrerequisite(_))
        ));
    }

    #[test]
    fn test_face_list_rows() {
        let faces = FaceList::from_rows([vec![0u32, 1, 2], vec![3, 4, 5, 6]]);
        assert_eq!(faces.len(), 2);
        assert!(!faces.is_empty());
        let rows: Vec<&[u32]> = faces.iter().collect();
        assert_eq!(rows[1], &[3, 4, 5, 6]);
        assert!(FaceList::default().is_empty());
    }
}

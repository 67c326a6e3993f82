//! PLY mesh loading functions

use crate::error::{PlyError, PlyResult};
use crate::mesh::{ExtractionResult, MeshRequest};
use crate::ply::cursor::DataCursor;
use crate::ply::decode::{
    DecodedElementBuffer, ElementRequest, OutputType, decode_element, skip_element,
};
use crate::ply::header::{ElementDescriptor, PlyHeader, parse_header};
use crate::ply::semantic::{FACE_ELEMENT, Role, VERTEX_ELEMENT, find_face_indices, find_role};
use crate::triangulation::{requires_triangulation, triangulate_faces};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use tracing::{debug, info, warn};

const FACE_GROUP: &str = "faces";

/// Per-vertex buffers, fixed once the vertex element has been decoded.
#[derive(Debug)]
struct VertexData {
    positions: Vec<[f32; 3]>,
    normals: Vec<[f32; 3]>,
    uv: Vec<[f32; 2]>,
    color: Vec<[u8; 3]>,
}

/// Where the element walk stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DriverState {
    Seeking,
    HaveVerts,
    HaveFaces,
    Done,
}

/// Load a triangle mesh from a PLY file.
///
/// The whole file is read into memory, decoded, and dropped before returning; the result owns
/// every buffer it exposes.
#[tracing::instrument(skip_all, fields(path = %path.as_ref().display()))]
pub fn extract_mesh<P: AsRef<Path>>(path: P, request: MeshRequest) -> PlyResult<ExtractionResult> {
    let path = path.as_ref();
    debug!("Loading PLY mesh from: {}", path.display());

    let bytes = std::fs::read(path).map_err(|e| not_readable(path, e.to_string()))?;
    if !has_magic(&bytes) {
        warn!("File does not start with the PLY magic line");
        return Err(not_readable(path, "not a PLY file (bad magic line)"));
    }

    extract_mesh_from_bytes(&bytes, request)
}

/// Decode a triangle mesh from an in-memory PLY file.
pub fn extract_mesh_from_bytes(bytes: &[u8], request: MeshRequest) -> PlyResult<ExtractionResult> {
    let header = parse_header(bytes)?;
    let mut cursor = DataCursor::new(bytes, header.data_offset, header.format);

    let mut state = DriverState::Seeking;
    let mut vertices: Option<VertexData> = None;
    let mut indices: Option<Vec<[i32; 3]>> = None;

    for element in &header.elements {
        if state == DriverState::Done {
            break;
        }

        if element.name == VERTEX_ELEMENT && vertices.is_none() {
            if let Some(columns) = find_role(element, Role::Position) {
                vertices = Some(decode_vertices(element, &mut cursor, columns, &request)?);
                state = if indices.is_some() {
                    DriverState::Done
                } else {
                    DriverState::HaveVerts
                };
                continue;
            }
            warn!("Element {:?} has no x/y/z properties, skipping", element.name);
        } else if element.name == FACE_ELEMENT && indices.is_none() {
            if let Some(column) = find_face_indices(element) {
                indices = Some(decode_faces(
                    element,
                    &mut cursor,
                    column,
                    vertices.as_ref(),
                    &request,
                )?);
                state = if vertices.is_some() {
                    DriverState::Done
                } else {
                    DriverState::HaveFaces
                };
                continue;
            }
            warn!("Element {:?} has no vertex index list, skipping", element.name);
        }

        skip_element(element, &mut cursor)?;
    }

    debug!("Element walk finished in state {:?}", state);

    let vertices = vertices.ok_or(PlyError::IncompleteMesh("missing vertices"))?;
    let indices = indices.ok_or(PlyError::IncompleteMesh("missing faces"))?;

    info!(
        "PLY mesh parsed: {} vertices, {} triangles (format {})",
        vertices.positions.len(),
        indices.len(),
        header.format.as_str()
    );

    Ok(ExtractionResult {
        positions: vertices.positions,
        indices,
        normals: vertices.normals,
        uv: vertices.uv,
        color: vertices.color,
    })
}

/// Read only the header of a PLY file.
pub fn read_header<P: AsRef<Path>>(path: P) -> PlyResult<PlyHeader> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|e| not_readable(path, e.to_string()))?;
    let mut reader = BufReader::new(file);

    let mut buf = Vec::new();
    loop {
        let start = buf.len();
        let n = reader
            .read_until(b'\n', &mut buf)
            .map_err(|e| not_readable(path, e.to_string()))?;
        if n == 0 {
            break;
        }
        if start == 0 && !has_magic(&buf) {
            return Err(not_readable(path, "not a PLY file (bad magic line)"));
        }
        if buf[start..].trim_ascii() == b"end_header" {
            break;
        }
    }

    parse_header(&buf)
}

/// Check if a PLY file declares face data without decoding it.
pub fn ply_has_faces<P: AsRef<Path>>(path: P) -> PlyResult<bool> {
    let header = read_header(path)?;
    Ok(header
        .element(FACE_ELEMENT)
        .is_some_and(|face| face.row_count > 0 && find_face_indices(face).is_some()))
}

fn has_magic(bytes: &[u8]) -> bool {
    let line = bytes.split(|&b| b == b'\n').next().unwrap_or(&[]);
    // Same leniency as the header parser, which trims every line.
    line.trim_ascii() == b"ply"
}

fn not_readable(path: &Path, reason: impl Into<String>) -> PlyError {
    PlyError::FileNotReadable {
        path: path.to_path_buf(),
        reason: reason.into(),
    }
}

/// Look up an optional role, logging when a requested one is absent.
fn optional_role(element: &ElementDescriptor, role: Role, wanted: bool) -> Option<Vec<usize>> {
    if !wanted {
        return None;
    }
    let found = find_role(element, role);
    if found.is_none() {
        debug!("No {} properties in vertex element, returning empty", role.group_name());
    }
    found
}

fn decode_vertices(
    element: &ElementDescriptor,
    cursor: &mut DataCursor<'_>,
    position_columns: Vec<usize>,
    request: &MeshRequest,
) -> PlyResult<VertexData> {
    let mut elem_request = ElementRequest::new().scalars(
        Role::Position.group_name(),
        position_columns,
        OutputType::Float32,
    );
    for (role, wanted, output) in [
        (Role::Normal, request.read_normals, OutputType::Float32),
        (Role::TexCoord, request.read_uv, OutputType::Float32),
        (Role::Color, request.read_color, OutputType::UInt8),
    ] {
        if let Some(columns) = optional_role(element, role, wanted) {
            elem_request = elem_request.scalars(role.group_name(), columns, output);
        }
    }

    let mut decoded = decode_element(element, cursor, &elem_request)?;

    let positions = take_f32_rows::<3>(&mut decoded, Role::Position)?.ok_or_else(|| {
        PlyError::MissingPrerequisite("vertex positions were not decoded".to_string())
    })?;
    let normals = take_f32_rows::<3>(&mut decoded, Role::Normal)?.unwrap_or_default();
    let uv = take_f32_rows::<2>(&mut decoded, Role::TexCoord)?.unwrap_or_default();
    let color = match decoded.take_group(Role::Color.group_name()) {
        Some(group) => group
            .into_u8_rows::<3>()
            .ok_or_else(|| layout_mismatch(Role::Color))?,
        None => Vec::new(),
    };

    debug!(
        "Vertex element: {} rows (normals: {}, uv: {}, color: {})",
        positions.len(),
        !normals.is_empty(),
        !uv.is_empty(),
        !color.is_empty()
    );

    Ok(VertexData {
        positions,
        normals,
        uv,
        color,
    })
}

fn take_f32_rows<const N: usize>(
    decoded: &mut DecodedElementBuffer,
    role: Role,
) -> PlyResult<Option<Vec<[f32; N]>>> {
    match decoded.take_group(role.group_name()) {
        Some(group) => group
            .into_f32_rows::<N>()
            .map(Some)
            .ok_or_else(|| layout_mismatch(role)),
        None => Ok(None),
    }
}

fn layout_mismatch(role: Role) -> PlyError {
    PlyError::MissingPrerequisite(format!(
        "{} group decoded with an unexpected layout",
        role.group_name()
    ))
}

fn decode_faces(
    element: &ElementDescriptor,
    cursor: &mut DataCursor<'_>,
    column: usize,
    vertices: Option<&VertexData>,
    request: &MeshRequest,
) -> PlyResult<Vec<[i32; 3]>> {
    let mut decoded = decode_element(element, cursor, &ElementRequest::new().list(FACE_GROUP, column))?;
    let faces = decoded.take_list(FACE_GROUP).ok_or_else(|| {
        PlyError::MissingPrerequisite("face index lists were not decoded".to_string())
    })?;

    let positions = vertices.map(|v| v.positions.as_slice());
    if positions.is_none() && requires_triangulation(&faces) {
        if request.require_vertex_positions {
            return Err(PlyError::MissingPrerequisite(
                "need vertex positions to triangulate faces".to_string(),
            ));
        }
        warn!("Face element precedes vertex positions; polygons fall back to a naive fan");
    }

    triangulate_faces(&faces, positions)
}

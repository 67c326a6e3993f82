//! PLY file parsing and decoding

pub mod cursor;
pub mod decode;
pub mod header;
mod loader;
pub mod semantic;

pub use cursor::DataCursor;
pub use decode::{DecodedElementBuffer, ElementRequest, FaceList, OutputType};
pub use header::{
    ElementDescriptor, PlyFormat, PlyHeader, PropertyDescriptor, PropertyKind, ScalarType,
    parse_header,
};
pub use loader::{extract_mesh, extract_mesh_from_bytes, ply_has_faces, read_header};
pub use semantic::Role;

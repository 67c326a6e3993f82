//! Plymesh Data Crate
//!
//! Decodes triangle meshes from PLY files (ASCII and binary) into contiguous buffers of
//! positions, triangle indices, and optional normals, texture coordinates, and colors.
//! Polygon faces are triangulated on the way out.

pub mod error;
pub mod mesh;
pub mod ply;
pub mod triangulation;

pub use error::{PlyError, PlyResult};
pub use mesh::{ExtractionResult, MeshRequest};
pub use ply::{PlyHeader, extract_mesh, extract_mesh_from_bytes, ply_has_faces, read_header};
pub use triangulation::{ProjectionPlane, triangulate_faces, triangulate_polygon};

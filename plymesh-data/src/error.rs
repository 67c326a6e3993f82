//! Error types for PLY decoding.

use std::path::PathBuf;
use thiserror::Error;

/// Result type for PLY decoding operations.
pub type PlyResult<T> = Result<T, PlyError>;

/// Errors that can occur while extracting a mesh from a PLY file.
///
/// Every variant is fatal: the extraction call aborts and no partial mesh is returned.
#[derive(Debug, Error)]
pub enum PlyError {
    /// The file is missing, unreadable, or does not start with the `ply` magic line.
    #[error("cannot read PLY file {}: {reason}", .path.display())]
    FileNotReadable { path: PathBuf, reason: String },

    #[error("malformed PLY header: {0}")]
    MalformedHeader(String),

    /// The data section ended before the layout declared in the header was satisfied.
    #[error("truncated PLY data at byte {offset}: needed {needed} more byte(s)")]
    TruncatedData { offset: usize, needed: usize },

    /// An ASCII token could not be parsed as its declared numeric type.
    #[error("malformed PLY data at byte {offset}: cannot parse {token:?}")]
    MalformedData { offset: usize, token: String },

    #[error("malformed geometry: face {face} has {count} indices, need at least 3")]
    MalformedGeometry { face: usize, count: usize },

    #[error("malformed geometry: face {face} references vertex index {index}")]
    IndexOutOfRange { face: usize, index: f64 },

    #[error("incomplete mesh: {0}")]
    IncompleteMesh(&'static str),

    /// Internal ordering violation: polygons needed positions that were not decoded yet.
    #[error("missing prerequisite: {0}")]
    MissingPrerequisite(String),
}

impl PlyError {
    pub(crate) fn header(msg: impl Into<String>) -> Self {
        PlyError::MalformedHeader(msg.into())
    }

    /// True for both geometry variants, which bindings surface as a single condition.
    pub fn is_malformed_geometry(&self) -> bool {
        matches!(
            self,
            PlyError::MalformedGeometry { .. } | PlyError::IndexOutOfRange { .. }
        )
    }
}

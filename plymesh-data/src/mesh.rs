//! Extraction request and result types.
//!
//! These are plain CPU-side buffers; nothing here borrows from the decoder.

use glam::Vec3;

/// Which optional per-vertex attributes to extract.
///
/// An attribute that is requested but absent from the file comes back as an empty buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MeshRequest {
    pub read_normals: bool,
    pub read_uv: bool,
    pub read_color: bool,
    /// Fail with `MissingPrerequisite` instead of fanning polygons naively when the face element
    /// comes before the vertex element.
    pub require_vertex_positions: bool,
}

impl MeshRequest {
    /// Positions and faces only.
    pub fn geometry_only() -> Self {
        Self {
            read_normals: false,
            read_uv: false,
            read_color: false,
            require_vertex_positions: false,
        }
    }

    pub fn with_normals(mut self, read: bool) -> Self {
        self.read_normals = read;
        self
    }

    pub fn with_uv(mut self, read: bool) -> Self {
        self.read_uv = read;
        self
    }

    pub fn with_color(mut self, read: bool) -> Self {
        self.read_color = read;
        self
    }

    pub fn with_required_vertex_positions(mut self, require: bool) -> Self {
        self.require_vertex_positions = require;
        self
    }
}

impl Default for MeshRequest {
    fn default() -> Self {
        Self {
            read_normals: true,
            read_uv: true,
            read_color: true,
            require_vertex_positions: false,
        }
    }
}

/// A triangle mesh decoded from a PLY file.
///
/// Every optional buffer is either empty or has exactly one row per vertex. The type is
/// deliberately not `Clone`: the caller owns the only copy of the buffers.
#[derive(Debug, PartialEq)]
pub struct ExtractionResult {
    /// Vertex positions, N rows.
    pub positions: Vec<[f32; 3]>,
    /// Triangle vertex indices, M rows.
    pub indices: Vec<[i32; 3]>,
    /// Per-vertex normals, N or 0 rows.
    pub normals: Vec<[f32; 3]>,
    /// Texture coordinates, N or 0 rows.
    pub uv: Vec<[f32; 2]>,
    /// RGB vertex colors, N or 0 rows.
    pub color: Vec<[u8; 3]>,
}

impl ExtractionResult {
    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len()
    }

    pub fn has_normals(&self) -> bool {
        !self.normals.is_empty()
    }

    pub fn has_uv(&self) -> bool {
        !self.uv.is_empty()
    }

    pub fn has_color(&self) -> bool {
        !self.color.is_empty()
    }

    /// Axis-aligned bounds of the positions, `None` for an empty mesh.
    pub fn bounds(&self) -> Option<(Vec3, Vec3)> {
        if self.positions.is_empty() {
            return None;
        }
        let mut min = Vec3::splat(f32::MAX);
        let mut max = Vec3::splat(f32::MIN);
        for p in &self.positions {
            let p = Vec3::from_array(*p);
            min = min.min(p);
            max = max.max(p);
        }
        Some((min, max))
    }

    /// Hand out the five buffers: positions, indices, normals, uv, color.
    #[allow(clippy::type_complexity)]
    pub fn into_parts(
        self,
    ) -> (
        Vec<[f32; 3]>,
        Vec<[i32; 3]>,
        Vec<[f32; 3]>,
        Vec<[f32; 2]>,
        Vec<[u8; 3]>,
    ) {
        (self.positions, self.indices, self.normals, self.uv, self.color)
    }
}

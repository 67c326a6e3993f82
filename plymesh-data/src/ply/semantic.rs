//! Property name conventions for vertex attributes and face index lists.

use crate::ply::header::ElementDescriptor;

/// Name of the element holding per-vertex data.
pub const VERTEX_ELEMENT: &str = "vertex";
/// Name of the element holding polygon index lists.
pub const FACE_ELEMENT: &str = "face";

/// Geometric meaning of a group of scalar vertex properties.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    Position,
    Normal,
    TexCoord,
    Color,
}

const POSITION_NAMES: &[&[&str]] = &[&["x", "y", "z"]];
const NORMAL_NAMES: &[&[&str]] = &[&["nx", "ny", "nz"]];
const TEXCOORD_NAMES: &[&[&str]] = &[
    &["u", "v"],
    &["s", "t"],
    &["texture_u", "texture_v"],
    &["texture_s", "texture_t"],
];
const COLOR_NAMES: &[&[&str]] = &[&["red", "green", "blue"]];
const FACE_INDEX_NAMES: &[&str] = &["vertex_indices", "vertex_index"];

impl Role {
    /// Candidate name tuples in priority order.
    pub fn candidates(&self) -> &'static [&'static [&'static str]] {
        match self {
            Role::Position => POSITION_NAMES,
            Role::Normal => NORMAL_NAMES,
            Role::TexCoord => TEXCOORD_NAMES,
            Role::Color => COLOR_NAMES,
        }
    }

    /// Number of components in the role's output rows.
    pub fn arity(&self) -> usize {
        match self {
            Role::TexCoord => 2,
            Role::Position | Role::Normal | Role::Color => 3,
        }
    }

    pub fn group_name(&self) -> &'static str {
        match self {
            Role::Position => "position",
            Role::Normal => "normal",
            Role::TexCoord => "uv",
            Role::Color => "color",
        }
    }
}

/// Find the property indices carrying `role`, in component order.
///
/// Name tuples are tried in priority order and the first tuple whose every name exists as a
/// scalar property wins. Matching is case-sensitive.
pub fn find_role(element: &ElementDescriptor, role: Role) -> Option<Vec<usize>> {
    role.candidates().iter().find_map(|names| {
        names
            .iter()
            .map(|name| scalar_index(element, name))
            .collect::<Option<Vec<usize>>>()
    })
}

/// Find the list property holding per-face vertex indices.
pub fn find_face_indices(element: &ElementDescriptor) -> Option<usize> {
    FACE_INDEX_NAMES.iter().find_map(|name| {
        element
            .property_index(name)
            .filter(|&i| element.properties[i].is_list())
    })
}

fn scalar_index(element: &ElementDescriptor, name: &str) -> Option<usize> {
    element
        .property_index(name)
        .filter(|&i| element.properties[i].is_scalar())
}

//! Serializable reports of a decoded mesh or a parsed header.

use glam::Vec3;
use plymesh_data::ply::PropertyKind;
use plymesh_data::{ExtractionResult, PlyHeader};
use serde::Serialize;
use std::fmt;
use std::path::Path;

/// Axis-aligned bounds of the vertex positions.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Bounds {
    pub min: [f32; 3],
    pub max: [f32; 3],
}

impl Bounds {
    fn new(min: Vec3, max: Vec3) -> Self {
        Self {
            min: min.to_array(),
            max: max.to_array(),
        }
    }

    pub fn extent(&self) -> [f32; 3] {
        (Vec3::from_array(self.max) - Vec3::from_array(self.min)).to_array()
    }
}

/// What came out of a full extraction.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MeshSummary {
    pub path: String,
    pub vertices: usize,
    pub triangles: usize,
    pub has_normals: bool,
    pub has_uv: bool,
    pub has_color: bool,
    pub bounds: Option<Bounds>,
}

impl MeshSummary {
    pub fn new(path: &Path, mesh: &ExtractionResult) -> Self {
        Self {
            path: path.display().to_string(),
            vertices: mesh.vertex_count(),
            triangles: mesh.triangle_count(),
            has_normals: mesh.has_normals(),
            has_uv: mesh.has_uv(),
            has_color: mesh.has_color(),
            bounds: mesh.bounds().map(|(min, max)| Bounds::new(min, max)),
        }
    }
}

fn yes_no(flag: bool) -> &'static str {
    if flag { "yes" } else { "no" }
}

impl fmt::Display for MeshSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.path)?;
        writeln!(f, "  vertices:  {}", self.vertices)?;
        writeln!(f, "  triangles: {}", self.triangles)?;
        writeln!(f, "  normals:   {}", yes_no(self.has_normals))?;
        writeln!(f, "  uv:        {}", yes_no(self.has_uv))?;
        write!(f, "  color:     {}", yes_no(self.has_color))?;
        if let Some(bounds) = &self.bounds {
            write!(
                f,
                "\n  bounds:    {:?} .. {:?} (extent {:?})",
                bounds.min,
                bounds.max,
                bounds.extent()
            )?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ElementSummary {
    pub name: String,
    pub rows: usize,
    /// Property declarations as they appear in the header, e.g. `float x`.
    pub properties: Vec<String>,
}

/// The header of a PLY file, without decoding any data.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HeaderSummary {
    pub path: String,
    pub format: String,
    pub data_offset: usize,
    pub elements: Vec<ElementSummary>,
}

impl HeaderSummary {
    pub fn new(path: &Path, header: &PlyHeader) -> Self {
        let elements = header
            .elements
            .iter()
            .map(|element| ElementSummary {
                name: element.name.clone(),
                rows: element.row_count,
                properties: element
                    .properties
                    .iter()
                    .map(|p| match p.kind {
                        PropertyKind::Scalar(ty) => format!("{} {}", ty.as_str(), p.name),
                        PropertyKind::List { count, value } => {
                            format!("list {} {} {}", count.as_str(), value.as_str(), p.name)
                        }
                    })
                    .collect(),
            })
            .collect();

        Self {
            path: path.display().to_string(),
            format: header.format.as_str().to_string(),
            data_offset: header.data_offset,
            elements,
        }
    }
}

impl fmt::Display for HeaderSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.path)?;
        write!(f, "  format {} (data at byte {})", self.format, self.data_offset)?;
        for element in &self.elements {
            write!(f, "\n  element {} {}", element.name, element.rows)?;
            for property in &element.properties {
                write!(f, "\n    property {}", property)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use plymesh_data::ply::parse_header;

    fn sample_mesh() -> ExtractionResult {
        ExtractionResult {
            positions: vec![[-1.0, 0.0, 2.0], [1.0, 3.0, 2.0], [0.0, 1.0, 5.0]],
            indices: vec![[0, 1, 2]],
            normals: vec![[0.0, 0.0, 1.0]; 3],
            uv: Vec::new(),
            color: Vec::new(),
        }
    }

    #[test]
    fn test_mesh_summary() {
        let summary = MeshSummary::new(Path::new("tri.ply"), &sample_mesh());
        assert_eq!(summary.vertices, 3);
        assert_eq!(summary.triangles, 1);
        assert!(summary.has_normals && !summary.has_uv && !summary.has_color);

        let bounds = summary.bounds.unwrap();
        assert_eq!(bounds.min, [-1.0, 0.0, 2.0]);
        assert_eq!(bounds.max, [1.0, 3.0, 5.0]);
        assert_eq!(bounds.extent(), [2.0, 3.0, 3.0]);

        let text = summary.to_string();
        assert!(text.starts_with("tri.ply\n"));
        assert!(text.contains("triangles: 1"));
        assert!(text.contains("normals:   yes"));
        assert!(text.contains("bounds:"));
    }

    #[test]
    fn test_mesh_summary_json() {
        let summary = MeshSummary::new(Path::new("tri.ply"), &sample_mesh());
        let value = serde_json::to_value(&summary).unwrap();
        assert_eq!(value["vertices"], 3);
        assert_eq!(value["has_uv"], false);
        assert_eq!(value["bounds"]["max"][2], 5.0);
    }

    #[test]
    fn test_header_summary() {
        let text = "ply\nformat binary_big_endian 1.0\nelement vertex 8\n\
                    property float32 x\nproperty uint8 red\n\
                    element face 6\nproperty list uchar int vertex_indices\nend_header\n";
        let header = parse_header(text.as_bytes()).unwrap();
        let summary = HeaderSummary::new(Path::new("cube.ply"), &header);

        assert_eq!(summary.format, "binary_big_endian");
        assert_eq!(summary.data_offset, text.len());
        assert_eq!(summary.elements.len(), 2);
        assert_eq!(summary.elements[0].properties, vec!["float x", "uchar red"]);
        assert_eq!(
            summary.elements[1].properties,
            vec!["list uchar int vertex_indices"]
        );

        let rendered = summary.to_string();
        assert!(rendered.contains("element face 6"));
        assert!(rendered.contains("    property list uchar int vertex_indices"));
    }
}

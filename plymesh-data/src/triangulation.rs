//! Polygon triangulation for PLY faces.
//!
//! Faces are stored as variable-length vertex index lists. Triangles pass through untouched;
//! larger polygons are split into `k - 2` triangles. When vertex positions are available the
//! polygon is projected onto the plane facing its best-fit normal and ear-clipped there, which
//! keeps concave polygons from producing flipped triangles. Without positions, or when the
//! polygon is too degenerate for the projection to mean anything, the naive fan from the first
//! vertex is used.
//!
//! The decomposition is best-effort for self-intersecting polygons: the triangle count is always
//! `k - 2`, but coverage is only guaranteed for simple polygons.

use crate::error::{PlyError, PlyResult};
use crate::ply::FaceList;
use glam::{Vec2, Vec3};
use tracing::debug;

/// Coordinate plane a polygon is projected onto before 2D ear clipping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProjectionPlane {
    XY,
    XZ,
    YZ,
}

impl ProjectionPlane {
    /// Pick the plane that drops the dominant axis of `normal`, so the projected polygon keeps
    /// the largest possible area.
    pub fn from_normal(normal: Vec3) -> Self {
        let a = normal.abs();
        if a.z >= a.x && a.z >= a.y {
            ProjectionPlane::XY
        } else if a.y >= a.x && a.y >= a.z {
            ProjectionPlane::XZ
        } else {
            ProjectionPlane::YZ
        }
    }

    pub fn project(&self, p: Vec3) -> Vec2 {
        match self {
            ProjectionPlane::XY => Vec2::new(p.x, p.y),
            ProjectionPlane::XZ => Vec2::new(p.x, p.z),
            ProjectionPlane::YZ => Vec2::new(p.y, p.z),
        }
    }
}

/// Best-fit normal of a (possibly non-planar) polygon using Newell's method. Not normalized.
pub fn polygon_normal(points: &[Vec3]) -> Vec3 {
    let n = points.len();
    let mut normal = Vec3::ZERO;
    for i in 0..n {
        let cur = points[i];
        let next = points[(i + 1) % n];
        normal.x += (cur.y - next.y) * (cur.z + next.z);
        normal.y += (cur.z - next.z) * (cur.x + next.x);
        normal.z += (cur.x - next.x) * (cur.y + next.y);
    }
    normal
}

/// True when any face is not already a triangle.
pub fn requires_triangulation(faces: &FaceList) -> bool {
    faces.iter().any(|row| row.len() != 3)
}

/// Number of triangles [`triangulate_faces`] will produce.
pub fn triangle_count(faces: &FaceList) -> PlyResult<usize> {
    faces.iter().enumerate().try_fold(0usize, |acc, (face, row)| {
        if row.len() < 3 {
            return Err(PlyError::MalformedGeometry {
                face,
                count: row.len(),
            });
        }
        Ok(acc + row.len() - 2)
    })
}

/// Triangulate every face into a flat `[i32; 3]` index buffer.
///
/// `positions` is used to pick a stable split for polygons; pass `None` to get the naive fan.
/// Indices above `i32::MAX` are rejected here too, since `faces` need not come from the decoder.
pub fn triangulate_faces(
    faces: &FaceList,
    positions: Option<&[[f32; 3]]>,
) -> PlyResult<Vec<[i32; 3]>> {
    let total = triangle_count(faces)?;
    let mut out: Vec<[i32; 3]> = Vec::with_capacity(total);
    let mut scratch: Vec<[u32; 3]> = Vec::new();
    let mut fallbacks = 0usize;

    for (face, row) in faces.iter().enumerate() {
        if let Some(&index) = row.iter().find(|&&i| i > i32::MAX as u32) {
            return Err(PlyError::IndexOutOfRange {
                face,
                index: index as f64,
            });
        }

        if row.len() == 3 {
            out.push([row[0] as i32, row[1] as i32, row[2] as i32]);
            continue;
        }

        scratch.clear();
        if !triangulate_polygon_into(row, positions, &mut scratch) {
            fallbacks += 1;
        }
        out.extend(
            scratch
                .iter()
                .map(|t| [t[0] as i32, t[1] as i32, t[2] as i32]),
        );
    }

    debug!(
        "Triangulated {} faces into {} triangles ({} naive fan fallback(s))",
        faces.len(),
        out.len(),
        fallbacks
    );

    Ok(out)
}

/// Split one polygon into `polygon.len() - 2` triangles, preserving its winding.
///
/// Returns an empty list for polygons with fewer than 3 vertices.
pub fn triangulate_polygon(polygon: &[u32], positions: Option<&[[f32; 3]]>) -> Vec<[u32; 3]> {
    let mut out = Vec::with_capacity(polygon.len().saturating_sub(2));
    triangulate_polygon_into(polygon, positions, &mut out);
    out
}

/// Naive fan around the first vertex.
pub fn fan_triangulate(polygon: &[u32]) -> Vec<[u32; 3]> {
    let mut out = Vec::with_capacity(polygon.len().saturating_sub(2));
    fan_into(polygon, &mut out);
    out
}

fn fan_into(polygon: &[u32], out: &mut Vec<[u32; 3]>) {
    for i in 1..polygon.len().saturating_sub(1) {
        out.push([polygon[0], polygon[i], polygon[i + 1]]);
    }
}

/// Returns false when the position-guided path could not run and the naive fan was used.
fn triangulate_polygon_into(
    polygon: &[u32],
    positions: Option<&[[f32; 3]]>,
    out: &mut Vec<[u32; 3]>,
) -> bool {
    if polygon.len() < 3 {
        return true;
    }
    if polygon.len() == 3 {
        out.push([polygon[0], polygon[1], polygon[2]]);
        return true;
    }

    let points: Option<Vec<Vec3>> = positions.and_then(|pos| {
        polygon
            .iter()
            .map(|&i| pos.get(i as usize).map(|p| Vec3::from_array(*p)))
            .collect()
    });
    let Some(points) = points else {
        fan_into(polygon, out);
        return false;
    };

    let normal = polygon_normal(&points);
    if !normal.is_finite() || normal.length_squared() == 0.0 {
        fan_into(polygon, out);
        return false;
    }

    let plane = ProjectionPlane::from_normal(normal);
    let projected: Vec<Vec2> = points.iter().map(|&p| plane.project(p)).collect();
    let signed_area = projected
        .iter()
        .zip(projected.iter().cycle().skip(1))
        .map(|(a, b)| a.perp_dot(*b))
        .sum::<f32>();
    if signed_area == 0.0 || !signed_area.is_finite() {
        fan_into(polygon, out);
        return false;
    }

    let mut local = Vec::with_capacity(polygon.len() - 2);
    let clipped = clip_ears(&projected, signed_area.signum(), &mut local);
    out.extend(
        local
            .iter()
            .map(|t| [polygon[t[0]], polygon[t[1]], polygon[t[2]]]),
    );
    clipped
}

/// Ear clipping over a projected polygon whose orientation has sign `sign`.
///
/// The search for each ear starts at the second remaining vertex, so convex polygons come out
/// as the same fan the naive path would produce. If no ear can be found the rest is fanned and
/// `false` is returned.
fn clip_ears(points: &[Vec2], sign: f32, out: &mut Vec<[usize; 3]>) -> bool {
    let mut remaining: Vec<usize> = (0..points.len()).collect();

    while remaining.len() > 3 {
        let m = remaining.len();
        let ear = (0..m).map(|step| (step + 1) % m).find(|&i| {
            let a = remaining[(i + m - 1) % m];
            let b = remaining[i];
            let c = remaining[(i + 1) % m];
            let (pa, pb, pc) = (points[a], points[b], points[c]);

            if (pb - pa).perp_dot(pc - pb) * sign <= 0.0 {
                return false;
            }
            !remaining
                .iter()
                .filter(|&&j| j != a && j != b && j != c)
                .any(|&j| strictly_inside(points[j], pa, pb, pc, sign))
        });

        match ear {
            Some(i) => {
                out.push([remaining[(i + m - 1) % m], remaining[i], remaining[(i + 1) % m]]);
                remaining.remove(i);
            }
            None => {
                for k in 1..m - 1 {
                    out.push([remaining[0], remaining[k], remaining[k + 1]]);
                }
                return false;
            }
        }
    }

    out.push([remaining[0], remaining[1], remaining[2]]);
    true
}

fn strictly_inside(p: Vec2, a: Vec2, b: Vec2, c: Vec2, sign: f32) -> bool {
    (b - a).perp_dot(p - a) * sign > 0.0
        && (c - b).perp_dot(p - b) * sign > 0.0
        && (a - c).perp_dot(p - c) * sign > 0.0
}

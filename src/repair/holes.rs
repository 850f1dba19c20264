// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Hole filling by ear clipping

use crate::geometry::{Mesh, Triangle};
use crate::integrity::{boundary_loops, BoundaryLoop};
use nalgebra::{Point3, Vector3};
use rayon::prelude::*;
use tracing::{debug, info, warn};

/// Close every boundary loop whose perimeter is below `max_hole_size`.
///
/// Larger loops stay open: callers check `is_watertight` afterwards and re-threshold.
pub fn fill_holes(mesh: &Mesh, max_hole_size: f64) -> Mesh {
    let mut out = mesh.clone();
    fill_holes_in_place(&mut out, max_hole_size);
    out
}

/// In-place variant of [`fill_holes`], returning the number of holes closed
pub fn fill_holes_in_place(mesh: &mut Mesh, max_hole_size: f64) -> usize {
    let loops = boundary_loops(mesh);
    if loops.is_empty() {
        return 0;
    }

    let (fillable, skipped): (Vec<_>, Vec<_>) = loops
        .into_iter()
        .partition(|hole| hole.perimeter(mesh) < max_hole_size && !has_pinch(hole));
    for hole in &skipped {
        debug!(
            vertices = hole.len(),
            perimeter = hole.perimeter(mesh),
            max_hole_size,
            "leaving hole open"
        );
    }

    let patches: Vec<Vec<Triangle>> = fillable
        .par_iter()
        .map(|hole| fill_hole_ear_clipping(mesh, hole))
        .collect();
    let filled = patches.len();
    for patch in patches {
        mesh.triangles.extend(patch);
    }

    if filled > 0 {
        mesh.recompute_normals();
        info!(filled, left_open = skipped.len(), "filled holes");
    }
    filled
}

/// Like [`fill_holes_in_place`], but the loop with the longest perimeter is treated as the
/// outer rim of an open surface and always left open
pub fn fill_inner_holes(mesh: &mut Mesh, max_hole_size: f64) -> usize {
    let loops = boundary_loops(mesh);
    let Some(rim) = loops
        .iter()
        .enumerate()
        .max_by(|(_, a), (_, b)| a.perimeter(mesh).total_cmp(&b.perimeter(mesh)))
        .map(|(i, _)| i)
    else {
        return 0;
    };
    let patches: Vec<Vec<Triangle>> = loops
        .par_iter()
        .enumerate()
        .filter(|(i, hole)| {
            *i != rim && hole.perimeter(mesh) < max_hole_size && !has_pinch(hole)
        })
        .map(|(_, hole)| fill_hole_ear_clipping(mesh, hole))
        .collect();
    let filled = patches.len();
    for patch in patches {
        mesh.triangles.extend(patch);
    }
    if filled > 0 {
        mesh.recompute_normals();
        debug!(filled, "filled inner holes");
    }
    filled
}

/// A loop passing twice through one vertex cannot be patched as a disk
fn has_pinch(hole: &BoundaryLoop) -> bool {
    let mut sorted = hole.vertices.clone();
    sorted.sort_unstable();
    sorted.windows(2).any(|w| w[0] == w[1])
}

/// Triangulate one hole. The patch runs against the loop direction so its winding matches
/// the surrounding faces.
pub(crate) fn fill_hole_ear_clipping(mesh: &Mesh, hole: &BoundaryLoop) -> Vec<Triangle> {
    let ring: Vec<usize> = hole.vertices.iter().rev().copied().collect();
    let n = ring.len();
    if n < 3 {
        return Vec::new();
    }
    let positions: Vec<Point3<f64>> = ring.iter().map(|&i| mesh.position(i)).collect();
    let normal = newell_normal(&positions);

    let mut remaining: Vec<usize> = (0..n).collect();
    let mut triangles = Vec::with_capacity(n - 2);
    while remaining.len() > 3 {
        let m = remaining.len();
        let ear = (0..m).find(|&i| {
            let prev = remaining[(i + m - 1) % m];
            let next = remaining[(i + 1) % m];
            is_ear(&positions, &remaining, prev, remaining[i], next, &normal)
        });
        let Some(i) = ear else {
            warn!(remaining = m, "ear clipping stuck, closing the rest as a fan");
            break;
        };
        let prev = remaining[(i + m - 1) % m];
        let next = remaining[(i + 1) % m];
        triangles.push(Triangle::new([ring[prev], ring[remaining[i]], ring[next]]));
        remaining.remove(i);
    }

    if remaining.len() >= 3 {
        let center = remaining[0];
        for w in remaining[1..].windows(2) {
            triangles.push(Triangle::new([ring[center], ring[w[0]], ring[w[1]]]));
        }
    }
    triangles
}

/// Average plane normal of a closed polygon
pub(crate) fn newell_normal(positions: &[Point3<f64>]) -> Vector3<f64> {
    let n = positions.len();
    let mut normal = Vector3::zeros();
    for i in 0..n {
        let p = positions[i];
        let q = positions[(i + 1) % n];
        normal.x += (p.y - q.y) * (p.z + q.z);
        normal.y += (p.z - q.z) * (p.x + q.x);
        normal.z += (p.x - q.x) * (p.y + q.y);
    }
    normal
        .try_normalize(f64::MIN_POSITIVE)
        .unwrap_or_else(Vector3::z)
}

fn is_ear(
    positions: &[Point3<f64>],
    remaining: &[usize],
    prev: usize,
    curr: usize,
    next: usize,
    normal: &Vector3<f64>,
) -> bool {
    let (a, b, c) = (positions[prev], positions[curr], positions[next]);
    // Convex corner: the ear turns the same way as the polygon
    if (b - a).cross(&(c - a)).dot(normal) <= 0.0 {
        return false;
    }
    let (u, v) = plane_basis(normal);
    let project = |p: &Point3<f64>| (p.coords.dot(&u), p.coords.dot(&v));
    let (a2, b2, c2) = (project(&a), project(&b), project(&c));
    remaining
        .iter()
        .filter(|&&i| i != prev && i != curr && i != next)
        .all(|&i| !point_in_triangle(project(&positions[i]), a2, b2, c2))
}

/// Orthonormal basis of the plane with the given normal, oriented so that
/// counter-clockwise in (u, v) matches the normal
pub(crate) fn plane_basis(normal: &Vector3<f64>) -> (Vector3<f64>, Vector3<f64>) {
    let helper = if normal.x.abs() < 0.9 {
        Vector3::x()
    } else {
        Vector3::y()
    };
    let u = normal.cross(&helper).normalize();
    let v = normal.cross(&u);
    (u, v)
}

fn point_in_triangle(p: (f64, f64), a: (f64, f64), b: (f64, f64), c: (f64, f64)) -> bool {
    let sign = |p1: (f64, f64), p2: (f64, f64), p3: (f64, f64)| {
        (p1.0 - p3.0) * (p2.1 - p3.1) - (p2.0 - p3.0) * (p1.1 - p3.1)
    };
    let d1 = sign(p, a, b);
    let d2 = sign(p, b, c);
    let d3 = sign(p, c, a);
    let has_neg = d1 < 0.0 || d2 < 0.0 || d3 < 0.0;
    let has_pos = d1 > 0.0 || d2 > 0.0 || d3 > 0.0;
    !(has_neg && has_pos)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Primitive;
    use crate::integrity::{is_manifold, is_watertight};
    use nalgebra::Vector3;

    fn open_box() -> Mesh {
        let mut mesh = Primitive::cube(Vector3::new(1.0, 1.0, 1.0), false).to_mesh();
        // Drop the two faces of the top side
        let Mesh {
            vertices,
            triangles,
        } = &mut mesh;
        triangles.retain(|t| !t.indices.iter().all(|&i| vertices[i].position.z > 0.5));
        mesh
    }

    #[test]
    fn test_fill_open_box() {
        let mesh = open_box();
        assert_eq!(mesh.triangle_count(), 10);
        assert!(!is_watertight(&mesh));

        let filled = fill_holes(&mesh, 10.0);
        assert_eq!(filled.triangle_count(), 12);
        assert!(is_watertight(&filled));
        assert!(is_manifold(&filled));
        assert!((filled.signed_volume() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_hole_above_threshold_stays_open() {
        let mesh = open_box();
        // Perimeter of the top square is 4
        let filled = fill_holes(&mesh, 3.9);
        assert_eq!(filled.triangle_count(), 10);
    }

    #[test]
    fn test_inner_holes_keep_rim() {
        let mut mesh = Primitive::hemisphere(10.0, 32).to_mesh();
        // Punch a hole near the pole by dropping the faces around the top vertex
        let pole = mesh
            .vertices
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.position.z.total_cmp(&b.1.position.z))
            .map(|(i, _)| i)
            .unwrap();
        mesh.triangles.retain(|t| !t.indices.contains(&pole));
        mesh.remove_unreferenced_vertices();
        assert_eq!(boundary_loops(&mesh).len(), 2);

        let filled = fill_inner_holes(&mut mesh, 1e6);
        assert_eq!(filled, 1);
        assert_eq!(boundary_loops(&mesh).len(), 1);
    }

    #[test]
    fn test_fill_holed_sphere() {
        let mesh = Primitive::holed_sphere(10.0, 32, 2).to_mesh();
        let rim = &boundary_loops(&mesh)[0];
        let perimeter = rim.perimeter(&mesh);

        let kept_open = fill_holes(&mesh, perimeter * 0.99);
        assert!(!is_watertight(&kept_open));

        let closed = fill_holes(&mesh, perimeter * 1.01);
        assert!(is_watertight(&closed));
        assert!(is_manifold(&closed));
        assert!(closed.signed_volume() > 0.0);
    }
}

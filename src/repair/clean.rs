// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Point merging and degenerate geometry removal

use crate::geometry::{Mesh, Triangle};
use ahash::{AHashMap, AHashSet};
use nalgebra::Point3;
use tracing::debug;

/// Merge points within `tolerance`, drop collapsed and zero-area faces and unused points.
///
/// Idempotent: the surviving points are pairwise at least `tolerance` apart.
pub fn clean(mesh: &Mesh, tolerance: f64) -> Mesh {
    let mut out = mesh.clone();
    let merged = weld_vertices(&mut out, tolerance);
    let degenerate = remove_degenerate_faces(&mut out);
    let unreferenced = out.remove_unreferenced_vertices();
    out.recompute_normals();
    debug!(
        merged,
        degenerate,
        unreferenced,
        vertices = out.vertex_count(),
        faces = out.triangle_count(),
        "cleaned mesh"
    );
    out
}

/// Weld vertices closer than `tolerance` into the lowest-indexed vertex of their cluster.
///
/// A non-positive tolerance merges only exactly coincident points. Returns the number of
/// vertices merged away.
pub fn weld_vertices(mesh: &mut Mesh, tolerance: f64) -> usize {
    if mesh.vertices.is_empty() {
        return 0;
    }
    let remap = if tolerance > 0.0 {
        tolerance_remap(mesh, tolerance)
    } else {
        exact_remap(mesh)
    };

    let merged = remap.iter().enumerate().filter(|(i, &r)| *i != r).count();
    if merged == 0 {
        return 0;
    }
    for triangle in &mut mesh.triangles {
        for index in &mut triangle.indices {
            *index = remap[*index];
        }
    }
    mesh.triangles.retain(|t| !t.has_repeated_index());
    merged
}

fn exact_remap(mesh: &Mesh) -> Vec<usize> {
    let mut first: AHashMap<[u64; 3], usize> = AHashMap::with_capacity(mesh.vertices.len());
    mesh.vertices
        .iter()
        .enumerate()
        .map(|(i, v)| {
            // +0.0 and -0.0 must collide
            let key = [v.position.x, v.position.y, v.position.z].map(|c| (c + 0.0).to_bits());
            *first.entry(key).or_insert(i)
        })
        .collect()
}

fn tolerance_remap(mesh: &Mesh, tolerance: f64) -> Vec<usize> {
    let cell_size = tolerance * 2.0;
    let mut grid: AHashMap<(i64, i64, i64), Vec<usize>> = AHashMap::new();
    for (i, vertex) in mesh.vertices.iter().enumerate() {
        grid.entry(cell_of(&vertex.position, cell_size))
            .or_default()
            .push(i);
    }

    let mut remap: Vec<usize> = (0..mesh.vertices.len()).collect();
    for i in 0..mesh.vertices.len() {
        if remap[i] != i {
            continue;
        }
        let p = mesh.vertices[i].position;
        let (cx, cy, cz) = cell_of(&p, cell_size);
        for dx in -1..=1 {
            for dy in -1..=1 {
                for dz in -1..=1 {
                    let Some(candidates) = grid.get(&(cx + dx, cy + dy, cz + dz)) else {
                        continue;
                    };
                    for &j in candidates {
                        if j <= i || remap[j] != j {
                            continue;
                        }
                        if (mesh.vertices[j].position - p).norm() < tolerance {
                            remap[j] = i;
                        }
                    }
                }
            }
        }
    }
    remap
}

fn cell_of(p: &Point3<f64>, cell_size: f64) -> (i64, i64, i64) {
    (
        (p.x / cell_size).floor() as i64,
        (p.y / cell_size).floor() as i64,
        (p.z / cell_size).floor() as i64,
    )
}

/// Drop faces with repeated indices or zero area, returning how many were removed
pub fn remove_degenerate_faces(mesh: &mut Mesh) -> usize {
    let before = mesh.triangles.len();
    let vertices = &mesh.vertices;
    mesh.triangles.retain(|t| {
        if t.has_repeated_index() {
            return false;
        }
        let [a, b, c] = t.indices.map(|i| vertices[i].position);
        let cross = (b - a).cross(&(c - a));
        let longest = (b - a)
            .norm_squared()
            .max((c - b).norm_squared())
            .max((a - c).norm_squared());
        cross.norm() > f64::EPSILON * longest
    });
    before - mesh.triangles.len()
}

/// Drop faces spanning the same vertex set as an earlier face, whatever their winding
pub fn remove_duplicate_faces(mesh: &mut Mesh) -> usize {
    let before = mesh.triangles.len();
    let mut seen: AHashSet<[usize; 3]> = AHashSet::with_capacity(before);
    mesh.triangles.retain(|t| {
        let mut key = t.indices;
        key.sort_unstable();
        seen.insert(key)
    });
    before - mesh.triangles.len()
}

/// Single consistent surface: no collapsed or duplicate faces, no unused points
pub fn extract_surface(mesh: &Mesh) -> Mesh {
    let mut out = Mesh {
        vertices: mesh.vertices.clone(),
        triangles: mesh
            .triangles
            .iter()
            .filter(|t| !t.has_repeated_index())
            .copied()
            .collect::<Vec<Triangle>>(),
    };
    let duplicates = remove_duplicate_faces(&mut out);
    out.remove_unreferenced_vertices();
    out.recompute_normals();
    if duplicates > 0 {
        debug!(duplicates, "removed duplicate faces");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Primitive;
    use nalgebra::Vector3;

    /// Cube with every face carrying its own three points
    fn triangle_soup_cube() -> Mesh {
        let cube = Primitive::cube(Vector3::new(2.0, 2.0, 2.0), false).to_mesh();
        let mut soup = Mesh::new();
        for f in 0..cube.triangle_count() {
            let base = soup.vertex_count();
            for p in cube.triangle_positions(f) {
                soup.add_point(p);
            }
            soup.add_triangle(Triangle::new([base, base + 1, base + 2]));
        }
        soup
    }

    #[test]
    fn test_clean_welds_soup() {
        let soup = triangle_soup_cube();
        assert_eq!(soup.vertex_count(), 36);
        let cleaned = clean(&soup, 0.01);
        assert_eq!(cleaned.vertex_count(), 8);
        assert_eq!(cleaned.triangle_count(), 12);
        assert!(crate::integrity::is_watertight(&cleaned));
    }

    #[test]
    fn test_clean_is_idempotent() {
        let mut mesh = Primitive::sphere(3.0, 24).to_mesh();
        // Jitter a few points within tolerance of each other
        let extra = mesh.add_point(mesh.vertices[5].position + Vector3::new(0.003, 0.0, 0.0));
        let [a, b, _] = mesh.triangles[7].indices;
        mesh.add_triangle(Triangle::new([a, b, extra]));

        let once = clean(&mesh, 0.01);
        let twice = clean(&once, 0.01);
        assert_eq!(once.vertex_count(), twice.vertex_count());
        assert_eq!(once.triangle_count(), twice.triangle_count());
    }

    #[test]
    fn test_zero_area_faces_dropped() {
        let mut mesh = Mesh::from_parts(
            vec![
                Point3::new(0.0, 0.0, 0.0),
                Point3::new(1.0, 0.0, 0.0),
                Point3::new(2.0, 0.0, 0.0),
                Point3::new(0.0, 1.0, 0.0),
            ],
            vec![[0, 1, 2], [0, 1, 3]],
        );
        assert_eq!(remove_degenerate_faces(&mut mesh), 1);
        assert_eq!(mesh.triangle_count(), 1);
    }

    #[test]
    fn test_extract_surface_drops_duplicates() {
        let mut mesh = Primitive::cube(Vector3::new(1.0, 1.0, 1.0), false).to_mesh();
        let flipped = mesh.triangles[3].flipped();
        mesh.add_triangle(flipped);
        mesh.add_point(Point3::new(9.0, 9.0, 9.0));
        let surface = extract_surface(&mesh);
        assert_eq!(surface.triangle_count(), 12);
        assert_eq!(surface.vertex_count(), 8);
    }
}

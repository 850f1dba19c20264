// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Prism extrusion and planar cutting

use crate::envelope::{triangulate_loops, Envelope};
use crate::error::{ShellError, ShellResult, Stage};
use crate::geometry::{Axis, Mesh, Triangle};
use crate::integrity::boundary_loops;
use ahash::AHashMap;
use nalgebra::Point2;
use tracing::debug;

/// Sweep the envelope surface down to its floor.
///
/// Side walls follow every boundary loop of the surface and a flat base closes the bottom,
/// so the prism is closed whenever `with_top` is set. Without the top, the prism is open
/// along the envelope's boundary and ready to be stitched to the part of the mesh above it.
pub fn extrude(envelope: &Envelope, with_top: bool) -> ShellResult<Mesh> {
    if envelope.depth() <= 0.0 {
        return Err(ShellError::degenerate(
            Stage::Drape,
            format!("extrusion depth {} is not positive", envelope.depth()),
        ));
    }
    let top = &envelope.surface;
    let loops = boundary_loops(top);
    if loops.is_empty() {
        return Err(ShellError::degenerate(
            Stage::Drape,
            "envelope surface has no boundary to extrude",
        ));
    }

    let axis = envelope.axis;
    let (a, (u, v)) = (axis.index(), axis.others());
    let mut prism = Mesh {
        vertices: top.vertices.clone(),
        triangles: if with_top {
            top.triangles.clone()
        } else {
            Vec::new()
        },
    };

    let mut bottom: AHashMap<usize, usize> = AHashMap::new();
    for hole in &loops {
        for &t in &hole.vertices {
            bottom.entry(t).or_insert_with(|| {
                let mut p = top.position(t);
                p[a] = envelope.floor;
                prism.add_point(p)
            });
        }
    }

    // Boundary edges run with the face winding, so walls take them backwards
    for hole in &loops {
        let n = hole.len();
        for i in 0..n {
            let (s, e) = (hole.vertices[i], hole.vertices[(i + 1) % n]);
            let (sb, eb) = (bottom[&s], bottom[&e]);
            prism.add_triangle(Triangle::new([e, s, sb]));
            prism.add_triangle(Triangle::new([e, sb, eb]));
        }
    }

    let flat: Vec<Vec<Point2<f64>>> = loops
        .iter()
        .map(|hole| {
            hole.vertices
                .iter()
                .map(|&i| {
                    let p = top.position(i);
                    Point2::new(p[u.index()], p[v.index()])
                })
                .collect()
        })
        .collect();
    let rings: Vec<&[Point2<f64>]> = flat.iter().map(Vec::as_slice).collect();
    let ids: Vec<usize> = loops
        .iter()
        .flat_map(|hole| hole.vertices.iter().map(|i| bottom[i]))
        .collect();
    let base = triangulate_loops(&rings).map_err(|e| {
        ShellError::unavailable(Stage::Drape, format!("cannot triangulate prism base: {}", e))
    })?;
    // Base faces point down the axis
    for [i, j, k] in base {
        prism.add_triangle(Triangle::new([ids[i], ids[k], ids[j]]));
    }

    prism.remove_unreferenced_vertices();
    prism.recompute_normals();
    debug!(
        loops = loops.len(),
        faces = prism.triangle_count(),
        with_top,
        "extruded envelope"
    );
    Ok(prism)
}

/// Part of `mesh` on or above the plane `axis = level`.
///
/// Crossing points are computed exactly as by [`crate::envelope::slice_segments`], so the cut
/// boundary lands on the same coordinates as the slice contour.
pub fn cut_above(mesh: &Mesh, axis: Axis, level: f64) -> Mesh {
    let a = axis.index();
    let mut out = Mesh {
        vertices: mesh.vertices.clone(),
        triangles: Vec::with_capacity(mesh.triangles.len()),
    };
    let mut crossings: AHashMap<(usize, usize), usize> = AHashMap::new();
    let mut crossing = |out: &mut Mesh, p: usize, q: usize| -> usize {
        let key = (p.min(q), p.max(q));
        *crossings.entry(key).or_insert_with(|| {
            let (lo, hi) = (mesh.position(key.0), mesh.position(key.1));
            let t = (level - lo[a]) / (hi[a] - lo[a]);
            let mut point = lo + (hi - lo) * t.clamp(0.0, 1.0);
            point[a] = level;
            out.add_point(point)
        })
    };

    for triangle in &mesh.triangles {
        let idx = triangle.indices;
        let above = idx.map(|i| mesh.vertices[i].position[a] >= level);
        match above.iter().filter(|&&b| b).count() {
            3 => out.add_triangle(*triangle),
            0 => {}
            1 => {
                // Rotate so the kept corner comes first, preserving winding
                let r = above.iter().position(|&b| b).unwrap_or(0);
                let [k, b, c] = [idx[r], idx[(r + 1) % 3], idx[(r + 2) % 3]];
                let pb = crossing(&mut out, k, b);
                let pc = crossing(&mut out, c, k);
                out.add_triangle(Triangle::new([k, pb, pc]));
            }
            _ => {
                let r = above.iter().position(|&b| !b).unwrap_or(0);
                let [d, k0, k1] = [idx[r], idx[(r + 1) % 3], idx[(r + 2) % 3]];
                let p0 = crossing(&mut out, d, k0);
                let p1 = crossing(&mut out, k1, d);
                out.add_triangle(Triangle::new([k0, k1, p1]));
                out.add_triangle(Triangle::new([k0, p1, p0]));
            }
        }
    }
    out.remove_unreferenced_vertices();
    out.recompute_normals();
    out
}

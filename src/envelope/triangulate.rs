// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Constrained Delaunay triangulation of planar polygons

use crate::error::{ShellError, ShellResult, Stage};
use ahash::{AHashMap, AHashSet};
use nalgebra::Point2;
use spade::handles::{FixedFaceHandle, FixedVertexHandle, InnerTag};
use spade::{ConstrainedDelaunayTriangulation, Point2 as SpadePoint2, Triangulation};
use std::collections::VecDeque;
use tracing::warn;

type Cdt = ConstrainedDelaunayTriangulation<SpadePoint2<f64>>;

/// Triangulate one closed polygon. Indices refer to `points`; triangles are counter-clockwise.
pub fn triangulate_polygon(points: &[Point2<f64>]) -> ShellResult<Vec<[usize; 3]>> {
    triangulate_loops(&[points])
}

/// Triangulate the region bounded by closed loops (outer boundaries and holes, nested by
/// parity). Indices refer to the loops concatenated in order.
pub fn triangulate_loops(loops: &[&[Point2<f64>]]) -> ShellResult<Vec<[usize; 3]>> {
    let total: usize = loops.iter().map(|l| l.len()).sum();
    if loops.iter().all(|l| l.len() < 3) {
        return Err(ShellError::degenerate(
            Stage::Envelope,
            format!("polygon has {} points, at least 3 are required", total),
        ));
    }

    let mut cdt = Cdt::new();
    // Coincident input points collapse onto one CDT vertex; keep the first index
    let mut source: AHashMap<FixedVertexHandle, usize> = AHashMap::with_capacity(total);
    let mut skipped = 0usize;
    let mut offset = 0;
    for ring in loops {
        let mut handles = Vec::with_capacity(ring.len());
        for (i, p) in ring.iter().enumerate() {
            let handle = cdt.insert(SpadePoint2::new(p.x, p.y)).map_err(|e| {
                ShellError::unavailable(Stage::Envelope, format!("triangulation insert: {}", e))
            })?;
            source.entry(handle).or_insert(offset + i);
            handles.push(handle);
        }
        for i in 0..handles.len() {
            let (from, to) = (handles[i], handles[(i + 1) % handles.len()]);
            if from == to {
                continue;
            }
            if cdt.can_add_constraint(from, to) {
                cdt.add_constraint(from, to);
            } else {
                skipped += 1;
            }
        }
        offset += ring.len();
    }
    if skipped > 0 {
        warn!(skipped, "self-intersecting contour, dropped crossing constraint edges");
    }

    let interior = interior_faces(&cdt);
    let mut triangles = Vec::with_capacity(interior.len());
    for face in cdt.inner_faces() {
        if !interior.contains(&face.fix()) {
            continue;
        }
        let [a, b, c] = face.vertices();
        let (Some(&ia), Some(&ib), Some(&ic)) = (
            source.get(&a.fix()),
            source.get(&b.fix()),
            source.get(&c.fix()),
        ) else {
            continue;
        };
        let (pa, pb, pc) = (a.position(), b.position(), c.position());
        let area = (pb.x - pa.x) * (pc.y - pa.y) - (pb.y - pa.y) * (pc.x - pa.x);
        if area > 0.0 {
            triangles.push([ia, ib, ic]);
        } else if area < 0.0 {
            triangles.push([ia, ic, ib]);
        }
    }

    if triangles.is_empty() {
        return Err(ShellError::unavailable(
            Stage::Envelope,
            "triangulation produced no interior faces",
        ));
    }
    Ok(triangles)
}

/// Inner faces reached across an odd number of constraint edges from the outer face
fn interior_faces(cdt: &Cdt) -> AHashSet<FixedFaceHandle<InnerTag>> {
    let mut depth: AHashMap<FixedFaceHandle<InnerTag>, u32> = AHashMap::new();
    let mut queue = VecDeque::new();
    let outer = cdt.outer_face().fix();

    for edge in cdt.directed_edges() {
        if edge.face().fix() != outer {
            continue;
        }
        if let Some(inner) = edge.rev().face().as_inner() {
            let d = u32::from(cdt.is_constraint_edge(edge.as_undirected().fix()));
            if depth.insert(inner.fix(), d).is_none() {
                queue.push_back(inner.fix());
            }
        }
    }

    while let Some(face) = queue.pop_front() {
        let d = depth[&face];
        for edge in cdt.face(face).adjacent_edges() {
            let Some(neighbor) = edge.rev().face().as_inner() else {
                continue;
            };
            if depth.contains_key(&neighbor.fix()) {
                continue;
            }
            let crossing = u32::from(cdt.is_constraint_edge(edge.as_undirected().fix()));
            depth.insert(neighbor.fix(), d + crossing);
            queue.push_back(neighbor.fix());
        }
    }

    depth
        .into_iter()
        .filter(|(_, d)| d % 2 == 1)
        .map(|(face, _)| face)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn area(points: &[Point2<f64>], triangles: &[[usize; 3]]) -> f64 {
        triangles
            .iter()
            .map(|&[a, b, c]| {
                let (pa, pb, pc) = (points[a], points[b], points[c]);
                ((pb - pa).x * (pc - pa).y - (pb - pa).y * (pc - pa).x) / 2.0
            })
            .sum()
    }

    #[test]
    fn test_square() {
        let square = vec![
            Point2::new(0.0, 0.0),
            Point2::new(1.0, 0.0),
            Point2::new(1.0, 1.0),
            Point2::new(0.0, 1.0),
        ];
        let triangles = triangulate_polygon(&square).unwrap();
        assert_eq!(triangles.len(), 2);
        assert!((area(&square, &triangles) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_concave_polygon_excludes_notch() {
        // L shape of area 3
        let l_shape = vec![
            Point2::new(0.0, 0.0),
            Point2::new(2.0, 0.0),
            Point2::new(2.0, 1.0),
            Point2::new(1.0, 1.0),
            Point2::new(1.0, 2.0),
            Point2::new(0.0, 2.0),
        ];
        let triangles = triangulate_polygon(&l_shape).unwrap();
        assert_eq!(triangles.len(), 4);
        assert!((area(&l_shape, &triangles) - 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_ring_with_hole() {
        let outer = [
            Point2::new(0.0, 0.0),
            Point2::new(4.0, 0.0),
            Point2::new(4.0, 4.0),
            Point2::new(0.0, 4.0),
        ];
        let hole = [
            Point2::new(1.0, 1.0),
            Point2::new(1.0, 3.0),
            Point2::new(3.0, 3.0),
            Point2::new(3.0, 1.0),
        ];
        let triangles = triangulate_loops(&[&outer, &hole]).unwrap();
        let all: Vec<Point2<f64>> = outer.iter().chain(hole.iter()).copied().collect();
        assert!((area(&all, &triangles) - 12.0).abs() < 1e-12);
    }

    #[test]
    fn test_too_few_points() {
        let segment = vec![Point2::new(0.0, 0.0), Point2::new(1.0, 0.0)];
        assert!(triangulate_polygon(&segment).is_err());
    }
}

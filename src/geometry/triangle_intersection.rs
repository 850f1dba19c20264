// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Triangle-triangle intersection
//!
//! Non-coplanar pairs intersect along a segment of the line shared by their planes. Each
//! segment endpoint is the crossing of one triangle edge with the other triangle's plane, and
//! is reported symbolically (which edge of which triangle) so callers can share the point
//! between every face that touches that edge. A vertex lying exactly on the other plane is
//! treated as lying on its positive side, which keeps the decision consistent for every pair
//! that shares that vertex.

use super::predicates::orient3d;
use nalgebra::{Point3, Vector3};

/// Endpoint of an intersection segment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SegmentEnd {
    /// Edge `(i, (i + 1) % 3)` of the first triangle crosses the second triangle's plane
    EdgeOfA(usize),
    /// Edge `(i, (i + 1) % 3)` of the second triangle crosses the first triangle's plane
    EdgeOfB(usize),
}

/// Type of triangle-triangle intersection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntersectionType {
    /// No intersection
    None,
    /// Triangles are coplanar; overlap is not resolved here
    Coplanar,
    /// Triangles intersect along a line segment
    Segment { start: SegmentEnd, end: SegmentEnd },
}

/// Point where segment `p -> q` crosses the plane of `tri`.
///
/// Callers must pass the edge in a canonical order to get bit-identical results.
pub fn edge_plane_point(p: &Point3<f64>, q: &Point3<f64>, tri: &[Point3<f64>; 3]) -> Point3<f64> {
    let dp = orient3d(&tri[0], &tri[1], &tri[2], p);
    let dq = orient3d(&tri[0], &tri[1], &tri[2], q);
    let denom = dp - dq;
    if denom == 0.0 {
        return nalgebra::center(p, q);
    }
    let t = (dp / denom).clamp(0.0, 1.0);
    p + (q - p) * t
}

/// Intersect two triangles
pub fn triangle_triangle_intersection(
    tri_a: &[Point3<f64>; 3],
    tri_b: &[Point3<f64>; 3],
) -> IntersectionType {
    let da = tri_a.map(|p| orient3d(&tri_b[0], &tri_b[1], &tri_b[2], &p));
    if da.iter().all(|&d| d == 0.0) {
        return IntersectionType::Coplanar;
    }
    let db = tri_b.map(|p| orient3d(&tri_a[0], &tri_a[1], &tri_a[2], &p));

    let side_a = da.map(|d| d >= 0.0);
    let side_b = db.map(|d| d >= 0.0);
    if side_a.iter().all(|&s| s == side_a[0]) || side_b.iter().all(|&s| s == side_b[0]) {
        return IntersectionType::None;
    }

    let normal_a = (tri_a[1] - tri_a[0]).cross(&(tri_a[2] - tri_a[0]));
    let normal_b = (tri_b[1] - tri_b[0]).cross(&(tri_b[2] - tri_b[0]));
    let direction = normal_a.cross(&normal_b);
    if direction.norm_squared() == 0.0 {
        return IntersectionType::None;
    }

    let interval_a = crossing_interval(tri_a, &da, &side_a, &direction, SegmentEnd::EdgeOfA);
    let interval_b = crossing_interval(tri_b, &db, &side_b, &direction, SegmentEnd::EdgeOfB);
    let (Some(interval_a), Some(interval_b)) = (interval_a, interval_b) else {
        return IntersectionType::None;
    };

    // Overlap of the two intervals along the shared line
    let lo = if interval_b.0 .0 > interval_a.0 .0 {
        interval_b.0
    } else {
        interval_a.0
    };
    let hi = if interval_b.1 .0 < interval_a.1 .0 {
        interval_b.1
    } else {
        interval_a.1
    };
    if lo.0 >= hi.0 || lo.1 == hi.1 {
        return IntersectionType::None;
    }

    IntersectionType::Segment {
        start: lo.1,
        end: hi.1,
    }
}

type IntervalEnd = (f64, SegmentEnd);

/// Sorted parameters along `direction` of the two edge crossings of `tri`
fn crossing_interval(
    tri: &[Point3<f64>; 3],
    distances: &[f64; 3],
    sides: &[bool; 3],
    direction: &Vector3<f64>,
    tag: fn(usize) -> SegmentEnd,
) -> Option<(IntervalEnd, IntervalEnd)> {
    let mut ends = Vec::with_capacity(2);
    for i in 0..3 {
        let j = (i + 1) % 3;
        if sides[i] == sides[j] {
            continue;
        }
        let denom = distances[i] - distances[j];
        let t = if denom == 0.0 {
            0.5
        } else {
            (distances[i] / denom).clamp(0.0, 1.0)
        };
        let point = tri[i] + (tri[j] - tri[i]) * t;
        ends.push((direction.dot(&point.coords), tag(i)));
    }
    if ends.len() != 2 {
        return None;
    }
    if ends[0].0 <= ends[1].0 {
        Some((ends[0], ends[1]))
    } else {
        Some((ends[1], ends[0]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tri(a: [f64; 3], b: [f64; 3], c: [f64; 3]) -> [Point3<f64>; 3] {
        [Point3::from(a), Point3::from(b), Point3::from(c)]
    }

    #[test]
    fn test_crossing_triangles_give_segment() {
        let a = tri([0.0, 0.0, 0.0], [4.0, 0.0, 0.0], [0.0, 4.0, 0.0]);
        let b = tri([1.0, 1.0, -1.0], [1.0, 1.0, 1.0], [3.0, -1.0, 0.0]);
        match triangle_triangle_intersection(&a, &b) {
            IntersectionType::Segment { start, end } => assert_ne!(start, end),
            other => panic!("expected segment, got {:?}", other),
        }
    }

    #[test]
    fn test_separated_triangles() {
        let a = tri([0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]);
        let b = tri([0.0, 0.0, 1.0], [1.0, 0.0, 1.0], [0.0, 1.0, 2.0]);
        assert_eq!(triangle_triangle_intersection(&a, &b), IntersectionType::None);
    }

    #[test]
    fn test_coplanar() {
        let a = tri([0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]);
        let b = tri([0.2, 0.2, 0.0], [2.0, 0.0, 0.0], [0.0, 2.0, 0.0]);
        assert_eq!(triangle_triangle_intersection(&a, &b), IntersectionType::Coplanar);
    }

    #[test]
    fn test_plane_crossing_outside_triangle() {
        // b crosses a's plane, but away from a
        let a = tri([0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]);
        let b = tri([5.0, 5.0, -1.0], [5.0, 5.0, 1.0], [6.0, 5.0, 0.0]);
        assert_eq!(triangle_triangle_intersection(&a, &b), IntersectionType::None);
    }

    #[test]
    fn test_edge_plane_point() {
        let plane = tri([0.0, 0.0, 1.0], [1.0, 0.0, 1.0], [0.0, 1.0, 1.0]);
        let p = edge_plane_point(&Point3::new(0.0, 0.0, 0.0), &Point3::new(0.0, 0.0, 4.0), &plane);
        assert!((p.z - 1.0).abs() < 1e-12);
    }
}

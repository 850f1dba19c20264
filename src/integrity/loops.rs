// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Boundary loop detection

use crate::geometry::Mesh;
use ahash::AHashMap;
use tracing::{debug, warn};

/// Closed chain of boundary vertices.
///
/// Vertices follow the winding of the adjacent faces, so a patch closing the loop must use
/// each edge in the opposite direction.
#[derive(Debug, Clone, PartialEq)]
pub struct BoundaryLoop {
    pub vertices: Vec<usize>,
}

impl BoundaryLoop {
    pub fn len(&self) -> usize {
        self.vertices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    pub fn perimeter(&self, mesh: &Mesh) -> f64 {
        let n = self.vertices.len();
        (0..n)
            .map(|i| {
                let a = mesh.vertices[self.vertices[i]].position;
                let b = mesh.vertices[self.vertices[(i + 1) % n]].position;
                (b - a).norm()
            })
            .sum()
    }
}

/// Trace every boundary loop of the mesh
pub fn boundary_loops(mesh: &Mesh) -> Vec<BoundaryLoop> {
    // Count directed half-edges; a boundary half-edge has no opposite twin
    let mut half_edges: AHashMap<(usize, usize), usize> = AHashMap::new();
    for triangle in &mesh.triangles {
        if triangle.has_repeated_index() {
            continue;
        }
        for edge in triangle.edges() {
            *half_edges.entry(edge).or_insert(0) += 1;
        }
    }

    let mut outgoing: AHashMap<usize, Vec<usize>> = AHashMap::new();
    let mut boundary: Vec<(usize, usize)> = Vec::new();
    for (&(a, b), &count) in &half_edges {
        let twins = half_edges.get(&(b, a)).copied().unwrap_or(0);
        if count == 1 && twins == 0 {
            outgoing.entry(a).or_default().push(b);
            boundary.push((a, b));
        }
    }
    if boundary.is_empty() {
        return Vec::new();
    }
    // Deterministic traversal order
    boundary.sort_unstable();
    for targets in outgoing.values_mut() {
        targets.sort_unstable();
    }

    let mut loops = Vec::new();
    for &(start, first) in &boundary {
        let Some(targets) = outgoing.get_mut(&start) else {
            continue;
        };
        let Some(pos) = targets.iter().position(|&t| t == first) else {
            continue;
        };
        targets.swap_remove(pos);

        let mut vertices = vec![start];
        let mut current = first;
        let mut closed = false;
        while let Some(targets) = outgoing.get_mut(&current) {
            if current == start {
                closed = true;
                break;
            }
            vertices.push(current);
            let Some(next) = targets.pop() else {
                break;
            };
            current = next;
        }
        if !closed && current == start {
            closed = true;
        }

        if closed && vertices.len() >= 3 {
            loops.push(BoundaryLoop { vertices });
        } else if !closed {
            warn!(start, length = vertices.len(), "boundary chain does not close");
        }
    }

    debug!(loops = loops.len(), edges = boundary.len(), "traced boundary loops");
    loops
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Primitive;
    use std::f64::consts::PI;

    #[test]
    fn test_hemisphere_rim() {
        let mesh = Primitive::hemisphere(5.0, 32).to_mesh();
        let loops = boundary_loops(&mesh);
        assert_eq!(loops.len(), 1);
        assert_eq!(loops[0].len(), 32);
        let perimeter = loops[0].perimeter(&mesh);
        assert!(perimeter < 2.0 * PI * 5.0);
        assert!(perimeter > 0.95 * 2.0 * PI * 5.0);
    }

    #[test]
    fn test_closed_mesh_has_no_loops() {
        let mesh = Primitive::sphere(5.0, 16).to_mesh();
        assert!(boundary_loops(&mesh).is_empty());
    }

    #[test]
    fn test_loop_follows_face_winding() {
        let mesh = Primitive::hemisphere(1.0, 16).to_mesh();
        let rim = &boundary_loops(&mesh)[0];
        let n = rim.len();
        // Every rim edge appears in a face in loop order
        for i in 0..n {
            let (a, b) = (rim.vertices[i], rim.vertices[(i + 1) % n]);
            assert!(mesh.triangles.iter().any(|t| t.edges().contains(&(a, b))));
        }
    }
}

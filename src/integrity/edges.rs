// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Edge connectivity

use crate::geometry::Mesh;
use ahash::AHashMap;

/// Undirected edge stored with the smaller vertex index first
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Edge {
    pub v0: usize,
    pub v1: usize,
}

impl Edge {
    pub fn new(v0: usize, v1: usize) -> Self {
        if v0 < v1 {
            Self { v0, v1 }
        } else {
            Self { v0: v1, v1: v0 }
        }
    }
}

/// Faces incident to one undirected edge, split by traversal direction
#[derive(Debug, Clone, Default)]
pub struct EdgeUse {
    /// Faces traversing the edge from `v0` to `v1`
    pub forward: Vec<usize>,
    /// Faces traversing the edge from `v1` to `v0`
    pub backward: Vec<usize>,
}

impl EdgeUse {
    pub fn face_count(&self) -> usize {
        self.forward.len() + self.backward.len()
    }

    pub fn is_boundary(&self) -> bool {
        self.face_count() == 1
    }

    pub fn is_non_manifold(&self) -> bool {
        self.face_count() > 2
    }

    /// Two faces traversing the edge in the same direction
    pub fn is_inconsistent(&self) -> bool {
        self.face_count() == 2 && (self.forward.len() == 2 || self.backward.len() == 2)
    }

    pub fn faces(&self) -> impl Iterator<Item = usize> + '_ {
        self.forward.iter().chain(self.backward.iter()).copied()
    }
}

/// Map from every undirected edge to the faces using it
#[derive(Debug, Clone, Default)]
pub struct EdgeMap {
    edges: AHashMap<Edge, EdgeUse>,
}

impl EdgeMap {
    pub fn build(mesh: &Mesh) -> Self {
        let mut edges: AHashMap<Edge, EdgeUse> = AHashMap::with_capacity(mesh.triangles.len() * 2);
        for (face, triangle) in mesh.triangles.iter().enumerate() {
            if triangle.has_repeated_index() {
                continue;
            }
            for (a, b) in triangle.edges() {
                let entry = edges.entry(Edge::new(a, b)).or_default();
                if a < b {
                    entry.forward.push(face);
                } else {
                    entry.backward.push(face);
                }
            }
        }
        Self { edges }
    }

    pub fn len(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    pub fn get(&self, a: usize, b: usize) -> Option<&EdgeUse> {
        self.edges.get(&Edge::new(a, b))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Edge, &EdgeUse)> {
        self.edges.iter()
    }

    pub fn boundary_edges(&self) -> impl Iterator<Item = Edge> + '_ {
        self.edges
            .iter()
            .filter(|(_, u)| u.is_boundary())
            .map(|(e, _)| *e)
    }

    pub fn boundary_edge_count(&self) -> usize {
        self.edges.values().filter(|u| u.is_boundary()).count()
    }

    pub fn non_manifold_edge_count(&self) -> usize {
        self.edges.values().filter(|u| u.is_non_manifold()).count()
    }

    pub fn inconsistent_edge_count(&self) -> usize {
        self.edges.values().filter(|u| u.is_inconsistent()).count()
    }

    /// Faces sharing an edge with `face` (through manifold edges only)
    pub fn manifold_neighbors<'a>(
        &'a self,
        mesh: &'a Mesh,
        face: usize,
    ) -> impl Iterator<Item = usize> + 'a {
        mesh.triangles[face]
            .edges()
            .into_iter()
            .filter_map(move |(a, b)| self.get(a, b))
            .filter(|u| u.face_count() == 2)
            .flat_map(move |u| u.faces().filter(move |&f| f != face).collect::<Vec<_>>())
    }
}

/// Count vertices whose incident faces do not form a single fan
pub fn non_manifold_vertex_count(mesh: &Mesh) -> usize {
    let mut incident: Vec<Vec<usize>> = vec![Vec::new(); mesh.vertices.len()];
    for (face, triangle) in mesh.triangles.iter().enumerate() {
        if triangle.has_repeated_index() {
            continue;
        }
        for &v in &triangle.indices {
            incident[v].push(face);
        }
    }

    let mut count = 0;
    let mut parent: Vec<usize> = Vec::new();
    let mut by_neighbor: AHashMap<usize, usize> = AHashMap::new();
    for (v, faces) in incident.iter().enumerate() {
        if faces.len() < 2 {
            continue;
        }
        // Union faces around v that share an edge (v, w)
        parent.clear();
        parent.extend(0..faces.len());
        by_neighbor.clear();
        for (slot, &face) in faces.iter().enumerate() {
            for &w in &mesh.triangles[face].indices {
                if w == v {
                    continue;
                }
                match by_neighbor.get(&w) {
                    Some(&other) => union(&mut parent, slot, other),
                    None => {
                        by_neighbor.insert(w, slot);
                    }
                }
            }
        }
        let roots = (0..faces.len()).filter(|&i| find(&mut parent, i) == i).count();
        if roots > 1 {
            count += 1;
        }
    }
    count
}

pub(crate) fn find(parent: &mut [usize], mut i: usize) -> usize {
    while parent[i] != i {
        parent[i] = parent[parent[i]];
        i = parent[i];
    }
    i
}

pub(crate) fn union(parent: &mut [usize], a: usize, b: usize) {
    let ra = find(parent, a);
    let rb = find(parent, b);
    if ra != rb {
        parent[ra] = rb;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{Primitive, Triangle};
    use nalgebra::{Point3, Vector3};

    #[test]
    fn test_cube_edges() {
        let mesh = Primitive::cube(Vector3::new(1.0, 1.0, 1.0), false).to_mesh();
        let map = EdgeMap::build(&mesh);
        assert_eq!(map.len(), 18);
        assert_eq!(map.boundary_edge_count(), 0);
        assert_eq!(map.inconsistent_edge_count(), 0);
    }

    #[test]
    fn test_flipped_face_is_inconsistent() {
        let mut mesh = Primitive::cube(Vector3::new(1.0, 1.0, 1.0), false).to_mesh();
        mesh.triangles[0] = mesh.triangles[0].flipped();
        let map = EdgeMap::build(&mesh);
        assert_eq!(map.inconsistent_edge_count(), 3);
    }

    #[test]
    fn test_bowtie_vertex() {
        // Two triangles touching at a single vertex
        let mesh = Mesh::from_parts(
            vec![
                Point3::new(0.0, 0.0, 0.0),
                Point3::new(1.0, 0.0, 0.0),
                Point3::new(0.0, 1.0, 0.0),
                Point3::new(-1.0, 0.0, 0.0),
                Point3::new(0.0, -1.0, 0.0),
            ],
            vec![[0, 1, 2], [0, 3, 4]],
        );
        assert_eq!(non_manifold_vertex_count(&mesh), 1);

        let mut fan = mesh.clone();
        fan.triangles = vec![Triangle::new([0, 1, 2]), Triangle::new([0, 2, 3])];
        assert_eq!(non_manifold_vertex_count(&fan), 0);
    }
}

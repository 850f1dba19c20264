// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Splitting faces along intersection segments

use super::intersect::{CutGraph, FaceCuts};
use crate::geometry::Mesh;
use ahash::AHashMap;
use nalgebra::{Point3, Vector3};
use rayon::prelude::*;
use spade::handles::FixedVertexHandle;
use spade::{ConstrainedDelaunayTriangulation, Point2 as SpadePoint2, Triangulation};
use tracing::{debug, warn};

type Cdt = ConstrainedDelaunayTriangulation<SpadePoint2<f64>>;

/// Piece of an input face, indexed into the cut graph's point table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Fragment {
    pub tri: [usize; 3],
    /// Edge `(k, k + 1)` lies on a cut segment
    pub cut: [bool; 3],
}

impl Fragment {
    pub fn whole(tri: [usize; 3]) -> Self {
        Self {
            tri,
            cut: [false; 3],
        }
    }

    pub fn edge(&self, k: usize) -> (usize, usize) {
        let (p, q) = (self.tri[k], self.tri[(k + 1) % 3]);
        (p.min(q), p.max(q))
    }

    pub fn normal(&self, positions: &[Point3<f64>]) -> Vector3<f64> {
        let [a, b, c] = self.tri.map(|i| positions[i]);
        (b - a).cross(&(c - a))
    }

    pub fn centroid(&self, positions: &[Point3<f64>]) -> Point3<f64> {
        let [a, b, c] = self.tri.map(|i| positions[i]);
        Point3::from((a.coords + b.coords + c.coords) / 3.0)
    }

    pub fn area(&self, positions: &[Point3<f64>]) -> f64 {
        self.normal(positions).norm() * 0.5
    }
}

/// Fragments of every face of `mesh`, operand `which` of `graph`.
///
/// Uncut faces pass through whole. A face whose triangulation fails also passes through
/// whole, leaving a crack the final weld may or may not close.
pub(crate) fn split_faces(mesh: &Mesh, which: usize, graph: &CutGraph) -> Vec<Fragment> {
    let pieces: Vec<(Vec<Fragment>, bool)> = (0..mesh.triangle_count())
        .into_par_iter()
        .map(|face| {
            let local = mesh.triangles[face].indices;
            let whole = Fragment::whole(local.map(|v| graph.canonical(graph.global(which, v))));
            match graph.cuts[which].get(&face) {
                None => (vec![whole], true),
                Some(cuts) => match split_face(mesh, which, face, graph, cuts) {
                    Some(fragments) => (fragments, true),
                    None => (vec![whole], false),
                },
            }
        })
        .collect();

    let failed = pieces.iter().filter(|(_, ok)| !ok).count();
    if failed > 0 {
        warn!(failed, mesh = which, "could not split faces, kept them whole");
    }
    let fragments: Vec<Fragment> = pieces
        .into_iter()
        .flat_map(|(fragments, _)| fragments)
        .collect();
    debug!(
        mesh = which,
        faces = mesh.triangle_count(),
        fragments = fragments.len(),
        "split faces"
    );
    fragments
}

/// Constrained triangulation of one face with its cut points and segments.
///
/// Points are referred to by their canonical id, so coincident points from different
/// sources become one vertex.
fn split_face(
    mesh: &Mesh,
    which: usize,
    face: usize,
    graph: &CutGraph,
    cuts: &FaceCuts,
) -> Option<Vec<Fragment>> {
    let local = mesh.triangles[face].indices;
    let corners = local.map(|v| graph.canonical(graph.global(which, v)));
    let normal = mesh.face_cross(face);
    if normal.norm_squared() == 0.0 {
        return None;
    }
    let drop = normal.iamax();
    let (u, v) = ((drop + 1) % 3, (drop + 2) % 3);
    let project = |p: &Point3<f64>| SpadePoint2::new(p[u], p[v]);

    // Bit k set: the point lies on face edge (k, k + 1)
    let mut on_edge: AHashMap<usize, u8> = AHashMap::new();
    for k in 0..3 {
        on_edge.insert(corners[k], (1 << k) | (1 << ((k + 2) % 3)));
        let (p, q) = (local[k], local[(k + 1) % 3]);
        if let Some(points) = graph.edge_points[which].get(&(p.min(q), p.max(q))) {
            for &id in points {
                *on_edge.entry(graph.canonical(id)).or_insert(0) |= 1 << k;
            }
        }
    }

    let mut cdt = Cdt::new();
    let mut handles: AHashMap<usize, FixedVertexHandle> = AHashMap::new();
    let mut source: AHashMap<FixedVertexHandle, usize> = AHashMap::new();
    let points = cuts.points.iter().map(|&id| graph.canonical(id));
    for id in corners.into_iter().chain(points) {
        if handles.contains_key(&id) {
            continue;
        }
        let handle = cdt.insert(project(&graph.positions[id])).ok()?;
        handles.insert(id, handle);
        source.entry(handle).or_insert(id);
    }

    let mut crossing = 0;
    for &[s, e] in &cuts.segments {
        let (s, e) = (graph.canonical(s), graph.canonical(e));
        let (Some(&from), Some(&to)) = (handles.get(&s), handles.get(&e)) else {
            continue;
        };
        if from == to {
            continue;
        }
        if cdt.can_add_constraint(from, to) {
            cdt.add_constraint(from, to);
        } else {
            crossing += 1;
        }
    }
    if crossing > 0 {
        debug!(face, mesh = which, crossing, "skipped crossing cut segments");
    }

    let mut fragments = Vec::with_capacity(cdt.num_inner_faces());
    for inner in cdt.inner_faces() {
        let ids = inner.vertices().map(|h| source.get(&h.fix()).copied());
        let [Some(a), Some(b), Some(c)] = ids else {
            continue;
        };
        let mask = |id: usize| on_edge.get(&id).copied().unwrap_or(0);
        // Slivers along one input edge lie outside the face
        if mask(a) & mask(b) & mask(c) != 0 {
            continue;
        }
        let constrained: Vec<(usize, usize)> = inner
            .adjacent_edges()
            .iter()
            .filter(|edge| cdt.is_constraint_edge(edge.as_undirected().fix()))
            .filter_map(|edge| {
                let from = source.get(&edge.from().fix())?;
                let to = source.get(&edge.to().fix())?;
                Some(((*from).min(*to), (*from).max(*to)))
            })
            .collect();

        let [pa, pb, pc] = [a, b, c].map(|i| graph.positions[i]);
        let cross = (pb - pa).cross(&(pc - pa));
        let tri = if cross.dot(&normal) >= 0.0 {
            [a, b, c]
        } else {
            [a, c, b]
        };
        let mut fragment = Fragment::whole(tri);
        for k in 0..3 {
            fragment.cut[k] = constrained.contains(&fragment.edge(k));
        }
        fragments.push(fragment);
    }
    (!fragments.is_empty()).then_some(fragments)
}

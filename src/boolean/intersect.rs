// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Intersection curves between two meshes
//!
//! Every intersection point is the crossing of one mesh's edge with one face of the other
//! mesh, and is keyed by that (edge, face) pair. Faces that share the edge, and the pierced
//! face, all refer to the same point, so the split surfaces stay connected.
//!
//! Faces of the two meshes lying in one plane do not cross. They are overlaid instead: each
//! receives the other's vertices and edge points that fall inside it, the crossings of the two
//! outlines, and the other's edges as constraint segments.

use crate::geometry::{
    edge_plane_point, orient2d, triangle_triangle_intersection, IntersectionType, Mesh,
    SegmentEnd, BVH,
};
use ahash::AHashMap;
use nalgebra::{Point2, Point3};
use rayon::prelude::*;
use tracing::debug;

/// Index of the first and second operand
pub(crate) const MESH_A: usize = 0;
pub(crate) const MESH_B: usize = 1;

/// Edge `edge` of mesh `mesh` crossing face `face` of the other mesh
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct PierceKey {
    mesh: usize,
    edge: (usize, usize),
    face: usize,
}

/// Extra points and constraint segments of one face
#[derive(Debug, Clone, Default)]
pub(crate) struct FaceCuts {
    pub points: Vec<usize>,
    pub segments: Vec<[usize; 2]>,
}

/// Shared point table and per-face cuts of both operands.
///
/// Point ids: vertices of A, then vertices of B, then intersection points.
#[derive(Debug, Clone)]
pub(crate) struct CutGraph {
    pub positions: Vec<Point3<f64>>,
    pub offsets: [usize; 2],
    pub first_pierce: usize,
    pub cuts: [AHashMap<usize, FaceCuts>; 2],
    /// Intersection points lying on each (sorted) edge of each mesh
    pub edge_points: [AHashMap<(usize, usize), Vec<usize>>; 2],
    pub coplanar_pairs: usize,
    /// Lowest id at the exact same position as each point
    canonical: Vec<usize>,
}

/// Where a projected point lies relative to a triangle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Location {
    Interior,
    Edge(usize),
    Corner,
}

/// (edge of A, edge of B) -> crossing point id
type Crossings = AHashMap<((usize, usize), (usize, usize)), usize>;

impl CutGraph {
    /// Whether `id` is an intersection point rather than an input vertex
    pub fn is_pierce(&self, id: usize) -> bool {
        id >= self.first_pierce
    }

    /// Whether `id` is anything but a vertex of operand `mesh`
    pub fn is_foreign(&self, mesh: usize, id: usize) -> bool {
        let end = if mesh == MESH_A {
            self.offsets[MESH_B]
        } else {
            self.first_pierce
        };
        !(self.offsets[mesh]..end).contains(&id)
    }

    pub fn global(&self, mesh: usize, vertex: usize) -> usize {
        self.offsets[mesh] + vertex
    }

    pub fn canonical(&self, id: usize) -> usize {
        self.canonical.get(id).copied().unwrap_or(id)
    }

    fn add_edge_point(&mut self, mesh: usize, edge: (usize, usize), id: usize) {
        let points = self.edge_points[mesh].entry(edge).or_default();
        if !points.contains(&id) {
            points.push(id);
        }
    }

    /// Overlay every coplanar face pair; returns the number of outline crossings created
    fn overlay_coplanar(&mut self, meshes: [&Mesh; 2], pairs: &[(usize, usize)]) -> usize {
        let mut crossings = Crossings::new();
        for &(fa, fb) in pairs {
            let drop = meshes[MESH_A].face_cross(fa).iamax();
            let faces = [fa, fb];
            for host in [MESH_A, MESH_B] {
                let guest = 1 - host;
                self.overlay_face(meshes, host, faces[host], faces[guest], drop, &mut crossings);
            }
        }
        crossings.len()
    }

    /// Cut face `host_face` of `host` by face `guest_face` of the other mesh, both lying in
    /// one plane that is projected by dropping coordinate `drop`
    fn overlay_face(
        &mut self,
        meshes: [&Mesh; 2],
        host: usize,
        host_face: usize,
        guest_face: usize,
        drop: usize,
        crossings: &mut Crossings,
    ) {
        let guest = 1 - host;
        let host_local = meshes[host].triangles[host_face].indices;
        let guest_local = meshes[guest].triangles[guest_face].indices;
        let corners = host_local.map(|v| project(&self.positions[self.global(host, v)], drop));
        let area = orient2d(&corners[0], &corners[1], &corners[2]);
        if area == 0.0 {
            return;
        }
        let winding = if area > 0.0 { 1.0 } else { -1.0 };
        let locate = |p: &Point2<f64>| -> Option<Location> {
            let mut zero = Vec::with_capacity(2);
            for k in 0..3 {
                let side = winding * orient2d(&corners[k], &corners[(k + 1) % 3], p);
                if side < 0.0 {
                    return None;
                }
                if side == 0.0 {
                    zero.push(k);
                }
            }
            Some(match zero.as_slice() {
                [] => Location::Interior,
                [k] => Location::Edge(*k),
                _ => Location::Corner,
            })
        };
        let host_edge = |k: usize| sorted(host_local[k], host_local[(k + 1) % 3]);

        // Guest vertices and guest edge points that fall on the host face
        let mut guest_points: Vec<usize> = guest_local.map(|v| self.global(guest, v)).to_vec();
        for k in 0..3 {
            let edge = sorted(guest_local[k], guest_local[(k + 1) % 3]);
            if let Some(points) = self.edge_points[guest].get(&edge) {
                guest_points.extend(points.iter().copied());
            }
        }
        for id in guest_points {
            let Some(location) = locate(&project(&self.positions[id], drop)) else {
                continue;
            };
            if let Location::Edge(k) = location {
                self.add_edge_point(host, host_edge(k), id);
            }
            self.cuts[host].entry(host_face).or_default().points.push(id);
        }

        // Guest edges, split where they meet the host outline, become constraints
        for k in 0..3 {
            let guest_edge = sorted(guest_local[k], guest_local[(k + 1) % 3]);
            let ends = [guest_edge.0, guest_edge.1].map(|v| self.global(guest, v));
            let (p, q) = (self.positions[ends[0]], self.positions[ends[1]]);
            let (p2, q2) = (project(&p, drop), project(&q, drop));
            let length_sq = (q - p).norm_squared();
            if length_sq == 0.0 {
                continue;
            }

            let mut on_edge = ends.to_vec();
            if let Some(points) = self.edge_points[guest].get(&guest_edge) {
                on_edge.extend(points.iter().copied());
            }
            let mut along: Vec<(f64, usize)> = on_edge
                .into_iter()
                .filter(|&id| locate(&project(&self.positions[id], drop)).is_some())
                .map(|id| ((self.positions[id] - p).dot(&(q - p)) / length_sq, id))
                .collect();

            for h in 0..3 {
                let (c0, c1) = (corners[h], corners[(h + 1) % 3]);
                let (o1, o2) = (orient2d(&c0, &c1, &p2), orient2d(&c0, &c1, &q2));
                let (o3, o4) = (orient2d(&p2, &q2, &c0), orient2d(&p2, &q2, &c1));
                if o1 * o2 >= 0.0 || o3 * o4 >= 0.0 {
                    continue;
                }
                let t = o1 / (o1 - o2);
                let key = if host == MESH_A {
                    (host_edge(h), guest_edge)
                } else {
                    (guest_edge, host_edge(h))
                };
                let id = match crossings.get(&key) {
                    Some(&id) => id,
                    None => {
                        self.positions.push(p + (q - p) * t);
                        let id = self.positions.len() - 1;
                        crossings.insert(key, id);
                        self.add_edge_point(host, host_edge(h), id);
                        self.add_edge_point(guest, guest_edge, id);
                        id
                    }
                };
                along.push((t, id));
            }

            along.sort_by(|x, y| x.0.total_cmp(&y.0));
            along.dedup_by_key(|entry| entry.1);
            if along.len() < 2 {
                continue;
            }
            let entry = self.cuts[host].entry(host_face).or_default();
            for pair in along.windows(2) {
                entry.points.extend([pair[0].1, pair[1].1]);
                entry.segments.push([pair[0].1, pair[1].1]);
            }
        }
    }

    /// Points on an edge belong to every face around that edge
    fn spread_edge_points(&mut self, meshes: [&Mesh; 2]) {
        for mesh in [MESH_A, MESH_B] {
            if self.edge_points[mesh].is_empty() {
                continue;
            }
            for (face, triangle) in meshes[mesh].triangles.iter().enumerate() {
                for (p, q) in triangle.edges() {
                    if let Some(points) = self.edge_points[mesh].get(&sorted(p, q)) {
                        self.cuts[mesh]
                            .entry(face)
                            .or_default()
                            .points
                            .extend(points.iter().copied());
                    }
                }
            }
        }
        for table in &mut self.cuts {
            for face in table.values_mut() {
                face.points.sort_unstable();
                face.points.dedup();
            }
        }
    }

    /// Map every point to the lowest id at bit-identical coordinates
    fn build_canonical(&mut self) {
        let mut seen: AHashMap<[u64; 3], usize> = AHashMap::new();
        self.canonical = self
            .positions
            .iter()
            .enumerate()
            .map(|(id, p)| {
                // Adding zero folds -0.0 into 0.0
                let key = [p.x, p.y, p.z].map(|c| (c + 0.0).to_bits());
                *seen.entry(key).or_insert(id)
            })
            .collect();
    }
}

fn project(p: &Point3<f64>, drop: usize) -> Point2<f64> {
    Point2::new(p[(drop + 1) % 3], p[(drop + 2) % 3])
}

fn sorted(a: usize, b: usize) -> (usize, usize) {
    (a.min(b), a.max(b))
}

/// Intersect every face of `a` with every nearby face of `b`
pub(crate) fn intersect(a: &Mesh, b: &Mesh, margin: f64) -> CutGraph {
    let bvh = BVH::from_mesh(b, margin);
    let results: Vec<(usize, usize, IntersectionType)> = (0..a.triangle_count())
        .into_par_iter()
        .flat_map_iter(|fa| {
            let tri_a = a.triangle_positions(fa);
            let query = a.face_bounding_box(fa).expanded(margin);
            bvh.query_triangles(&query)
                .into_iter()
                .filter_map(move |fb| {
                    match triangle_triangle_intersection(&tri_a, &b.triangle_positions(fb)) {
                        IntersectionType::None => None,
                        hit => Some((fa, fb, hit)),
                    }
                })
        })
        .collect();

    let offsets = [0, a.vertex_count()];
    let first_pierce = a.vertex_count() + b.vertex_count();
    let mut positions: Vec<Point3<f64>> = a
        .vertices
        .iter()
        .chain(&b.vertices)
        .map(|v| v.position)
        .collect();
    let mut ids: AHashMap<PierceKey, usize> = AHashMap::new();
    let mut cuts: [AHashMap<usize, FaceCuts>; 2] = [AHashMap::new(), AHashMap::new()];
    let mut edge_points: [AHashMap<(usize, usize), Vec<usize>>; 2] =
        [AHashMap::new(), AHashMap::new()];
    let mut coplanar = Vec::new();
    let meshes = [a, b];

    let mut resolve = |end: SegmentEnd, fa: usize, fb: usize, positions: &mut Vec<Point3<f64>>| {
        let (mesh, own_face, other_face, i) = match end {
            SegmentEnd::EdgeOfA(i) => (MESH_A, fa, fb, i),
            SegmentEnd::EdgeOfB(i) => (MESH_B, fb, fa, i),
        };
        let indices = meshes[mesh].triangles[own_face].indices;
        let edge = sorted(indices[i], indices[(i + 1) % 3]);
        let key = PierceKey {
            mesh,
            edge,
            face: other_face,
        };
        *ids.entry(key).or_insert_with(|| {
            let source = meshes[mesh];
            let target = meshes[1 - mesh].triangle_positions(other_face);
            positions.push(edge_plane_point(
                &source.position(edge.0),
                &source.position(edge.1),
                &target,
            ));
            edge_points[mesh].entry(edge).or_default().push(positions.len() - 1);
            positions.len() - 1
        })
    };

    let mut segments = 0;
    for (fa, fb, hit) in results {
        let IntersectionType::Segment { start, end } = hit else {
            coplanar.push((fa, fb));
            continue;
        };
        let s = resolve(start, fa, fb, &mut positions);
        let e = resolve(end, fa, fb, &mut positions);
        if s == e {
            continue;
        }
        segments += 1;
        for (mesh, face) in [(MESH_A, fa), (MESH_B, fb)] {
            let entry = cuts[mesh].entry(face).or_default();
            entry.points.extend([s, e]);
            entry.segments.push([s, e]);
        }
    }

    let mut graph = CutGraph {
        positions,
        offsets,
        first_pierce,
        cuts,
        edge_points,
        coplanar_pairs: coplanar.len(),
        canonical: Vec::new(),
    };
    let crossings = graph.overlay_coplanar(meshes, &coplanar);
    graph.spread_edge_points(meshes);
    graph.build_canonical();

    debug!(
        segments,
        points = graph.positions.len() - first_pierce,
        cut_faces_a = graph.cuts[MESH_A].len(),
        cut_faces_b = graph.cuts[MESH_B].len(),
        coplanar_pairs = graph.coplanar_pairs,
        crossings,
        "intersected meshes"
    );
    graph
}

// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Quadric error metric decimation and the post-decimation healing sequence

use super::clean::{clean, extract_surface};
use super::components::extract_largest_component;
use super::holes::fill_holes;
use super::orientation::fix_normals;
use crate::geometry::Mesh;
use crate::integrity::EdgeMap;
use crate::timing::OperationTimer;
use nalgebra::{Matrix3, Point3, Vector3};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BinaryHeap;
use tracing::{debug, info};

/// Settings of [`decimate_with_healing`]
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DecimationParams {
    /// Decimate only meshes with more faces than this
    pub threshold_faces: usize,
    /// Fraction of faces to remove, in [0, 1)
    pub target_reduction: f64,
    /// Hole size of the fill pass after decimation
    pub post_decimation_hole_size: f64,
    pub clean_tolerance: f64,
}

impl Default for DecimationParams {
    fn default() -> Self {
        Self {
            threshold_faces: 8000,
            target_reduction: 0.5,
            post_decimation_hole_size: 500.0,
            clean_tolerance: 0.01,
        }
    }
}

/// Plane quadric: `p^T A p + 2 b.p + c`
#[derive(Debug, Clone, Copy)]
struct Quadric {
    a: Matrix3<f64>,
    b: Vector3<f64>,
    c: f64,
}

impl Quadric {
    fn zero() -> Self {
        Self {
            a: Matrix3::zeros(),
            b: Vector3::zeros(),
            c: 0.0,
        }
    }

    fn from_plane(normal: &Vector3<f64>, point: &Point3<f64>) -> Self {
        let d = -normal.dot(&point.coords);
        Self {
            a: normal * normal.transpose(),
            b: normal * d,
            c: d * d,
        }
    }

    fn add(&self, other: &Quadric) -> Quadric {
        Quadric {
            a: self.a + other.a,
            b: self.b + other.b,
            c: self.c + other.c,
        }
    }

    fn error(&self, p: &Point3<f64>) -> f64 {
        let v = p.coords;
        (v.dot(&(self.a * v)) + 2.0 * self.b.dot(&v) + self.c).max(0.0)
    }

    fn minimizer(&self) -> Option<Point3<f64>> {
        if self.a.determinant().abs() < 1e-12 {
            return None;
        }
        self.a.try_inverse().map(|inv| Point3::from(-(inv * self.b)))
    }
}

/// Queued edge collapse; entries go stale when either endpoint changes
#[derive(Debug, Clone, Copy)]
struct Candidate {
    cost: f64,
    keep: usize,
    drop: usize,
    stamps: (u32, u32),
    target: Point3<f64>,
}

impl PartialEq for Candidate {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Candidate {}

impl PartialOrd for Candidate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Candidate {
    // Reversed so the max-heap pops the cheapest collapse
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .cost
            .total_cmp(&self.cost)
            .then_with(|| other.keep.cmp(&self.keep))
            .then_with(|| other.drop.cmp(&self.drop))
    }
}

struct Collapser {
    positions: Vec<Point3<f64>>,
    faces: Vec<[usize; 3]>,
    alive: Vec<bool>,
    incident: Vec<Vec<usize>>,
    quadrics: Vec<Quadric>,
    stamps: Vec<u32>,
    locked: Vec<bool>,
    removed: Vec<bool>,
}

impl Collapser {
    fn new(mesh: &Mesh) -> Self {
        let n = mesh.vertices.len();
        let positions: Vec<Point3<f64>> = mesh.vertices.iter().map(|v| v.position).collect();
        let faces: Vec<[usize; 3]> = mesh.triangles.iter().map(|t| t.indices).collect();
        let mut incident = vec![Vec::new(); n];
        let mut quadrics = vec![Quadric::zero(); n];
        for (f, face) in faces.iter().enumerate() {
            let cross = mesh.face_cross(f);
            let area = cross.norm();
            for &v in face {
                incident[v].push(f);
            }
            if area <= 0.0 {
                continue;
            }
            // Area weighted so large flat faces dominate
            let plane = Quadric::from_plane(&(cross / area), &positions[face[0]]);
            let weighted = Quadric {
                a: plane.a * area,
                b: plane.b * area,
                c: plane.c * area,
            };
            for &v in face {
                quadrics[v] = quadrics[v].add(&weighted);
            }
        }

        // Boundary and non-manifold vertices never move
        let mut locked = vec![false; n];
        for (edge, usage) in EdgeMap::build(mesh).iter() {
            if usage.face_count() != 2 {
                locked[edge.v0] = true;
                locked[edge.v1] = true;
            }
        }

        Self {
            positions,
            alive: vec![true; faces.len()],
            faces,
            incident,
            quadrics,
            stamps: vec![0; n],
            locked,
            removed: vec![false; n],
        }
    }

    fn neighbors(&self, v: usize) -> Vec<usize> {
        let mut out: Vec<usize> = self.incident[v]
            .iter()
            .flat_map(|&f| self.faces[f])
            .filter(|&w| w != v)
            .collect();
        out.sort_unstable();
        out.dedup();
        out
    }

    fn candidate(&self, keep: usize, drop: usize) -> Option<Candidate> {
        if self.locked[keep] || self.locked[drop] {
            return None;
        }
        let q = self.quadrics[keep].add(&self.quadrics[drop]);
        let (p, r) = (self.positions[keep], self.positions[drop]);
        let midpoint = nalgebra::center(&p, &r);
        let mut target = midpoint;
        let mut cost = q.error(&midpoint);
        for option in [q.minimizer(), Some(p), Some(r)].into_iter().flatten() {
            // Stay near the edge; far minimizers come from nearly flat neighborhoods
            if (option - midpoint).norm() > (p - r).norm() * 2.0 {
                continue;
            }
            let e = q.error(&option);
            if e < cost {
                cost = e;
                target = option;
            }
        }
        Some(Candidate {
            cost,
            keep,
            drop,
            stamps: (self.stamps[keep], self.stamps[drop]),
            target,
        })
    }

    fn is_current(&self, c: &Candidate) -> bool {
        !self.removed[c.keep]
            && !self.removed[c.drop]
            && self.stamps[c.keep] == c.stamps.0
            && self.stamps[c.drop] == c.stamps.1
    }

    /// Link condition: the endpoints may only share the two vertices opposite the edge
    fn satisfies_link(&self, keep: usize, drop: usize) -> bool {
        let shared_faces = self.incident[keep]
            .iter()
            .filter(|&&f| self.faces[f].contains(&drop))
            .count();
        if shared_faces != 2 {
            return false;
        }
        let a = self.neighbors(keep);
        let b = self.neighbors(drop);
        let common = a.iter().filter(|v| b.binary_search(v).is_ok()).count();
        common == 2
    }

    /// Reject collapses that would turn a surviving face over or squash it flat
    fn preserves_orientation(&self, keep: usize, drop: usize, target: &Point3<f64>) -> bool {
        for &v in &[keep, drop] {
            for &f in &self.incident[v] {
                let face = self.faces[f];
                if face.contains(&keep) && face.contains(&drop) {
                    continue;
                }
                let before = face.map(|i| self.positions[i]);
                let after = face.map(|i| if i == v { *target } else { self.positions[i] });
                let n0 = (before[1] - before[0]).cross(&(before[2] - before[0]));
                let n1 = (after[1] - after[0]).cross(&(after[2] - after[0]));
                if n1.norm_squared() <= n0.norm_squared() * 1e-6 || n0.dot(&n1) <= 0.0 {
                    return false;
                }
            }
        }
        true
    }

    /// Merge `drop` into `keep`, returning the number of faces removed
    fn collapse(&mut self, keep: usize, drop: usize, target: Point3<f64>) -> usize {
        let mut killed = 0;
        let drop_faces = std::mem::take(&mut self.incident[drop]);
        for f in drop_faces {
            if !self.alive[f] {
                continue;
            }
            if self.faces[f].contains(&keep) {
                self.alive[f] = false;
                killed += 1;
                for v in self.faces[f] {
                    if v != drop {
                        self.incident[v].retain(|&g| g != f);
                    }
                }
            } else {
                for slot in &mut self.faces[f] {
                    if *slot == drop {
                        *slot = keep;
                    }
                }
                self.incident[keep].push(f);
            }
        }
        self.positions[keep] = target;
        self.quadrics[keep] = self.quadrics[keep].add(&self.quadrics[drop]);
        self.removed[drop] = true;
        self.stamps[keep] += 1;
        killed
    }

    fn into_mesh(self) -> Mesh {
        let faces: Vec<[usize; 3]> = self
            .faces
            .iter()
            .zip(&self.alive)
            .filter(|(_, &alive)| alive)
            .map(|(face, _)| *face)
            .collect();
        let mut mesh = Mesh::from_parts(self.positions, faces);
        mesh.remove_unreferenced_vertices();
        mesh.recompute_normals();
        mesh
    }
}

/// Collapse edges in order of quadric error until `target_reduction` of the faces are gone.
///
/// Open boundaries and non-manifold edges are left untouched, and collapses that would flip a
/// face are skipped, so the result may keep more faces than requested.
pub fn decimate(mesh: &Mesh, target_reduction: f64) -> Mesh {
    let reduction = target_reduction.clamp(0.0, 1.0);
    let original = mesh.triangle_count();
    let target = ((original as f64) * (1.0 - reduction)).ceil() as usize;
    if original == 0 || target >= original {
        return mesh.clone();
    }

    let mut state = Collapser::new(mesh);
    let mut heap = BinaryHeap::new();
    let mut edges: Vec<_> = EdgeMap::build(mesh).iter().map(|(e, _)| *e).collect();
    edges.sort_unstable();
    for edge in edges {
        if let Some(c) = state.candidate(edge.v0, edge.v1) {
            heap.push(c);
        }
    }

    let mut remaining = original;
    let mut collapses = 0usize;
    let mut rejected = 0usize;
    while remaining > target {
        let Some(c) = heap.pop() else {
            break;
        };
        if !state.is_current(&c) {
            continue;
        }
        if !state.satisfies_link(c.keep, c.drop)
            || !state.preserves_orientation(c.keep, c.drop, &c.target)
        {
            rejected += 1;
            continue;
        }
        remaining -= state.collapse(c.keep, c.drop, c.target);
        collapses += 1;
        for w in state.neighbors(c.keep) {
            if let Some(next) = state.candidate(c.keep, w) {
                heap.push(next);
            }
        }
    }

    let out = state.into_mesh();
    debug!(
        original,
        remaining = out.triangle_count(),
        collapses,
        rejected,
        "decimated mesh"
    );
    out
}

/// Decimate large meshes, then repair what decimation broke:
/// clean, extract surface, fill holes, keep the largest component, clean, fix normals.
///
/// Meshes at or below `threshold_faces` are returned unchanged.
pub fn decimate_with_healing(mesh: &Mesh, params: &DecimationParams) -> Mesh {
    if mesh.triangle_count() <= params.threshold_faces {
        debug!(
            faces = mesh.triangle_count(),
            threshold = params.threshold_faces,
            "below decimation threshold"
        );
        return mesh.clone();
    }
    let _timer = OperationTimer::new("decimate_with_healing");
    let decimated = decimate(mesh, params.target_reduction);
    let surface = extract_surface(&clean(&decimated, params.clean_tolerance));
    let filled = fill_holes(&surface, params.post_decimation_hole_size);
    let largest = extract_largest_component(&filled);
    let healed = fix_normals(&clean(&largest, params.clean_tolerance));
    info!(
        before = mesh.triangle_count(),
        after = healed.triangle_count(),
        "decimated and healed"
    );
    healed
}

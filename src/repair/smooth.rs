// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Laplacian relaxation

use crate::geometry::Mesh;
use crate::integrity::EdgeMap;
use nalgebra::{Point3, Vector3};

/// Smoothing stencil of every vertex.
///
/// Interior vertices average over all edge neighbors. Vertices on an open boundary only
/// average over their boundary neighbors so the rim slides along itself instead of
/// shrinking inward. Vertices touching a non-manifold edge are left in place.
#[derive(Debug, Clone)]
pub(crate) struct Stencil {
    pub neighbors: Vec<Vec<usize>>,
}

impl Stencil {
    pub fn build(mesh: &Mesh) -> Self {
        let edges = EdgeMap::build(mesh);
        let n = mesh.vertices.len();
        let mut all: Vec<Vec<usize>> = vec![Vec::new(); n];
        let mut rim: Vec<Vec<usize>> = vec![Vec::new(); n];
        let mut pinned = vec![false; n];

        for (edge, usage) in edges.iter() {
            let (a, b) = (edge.v0, edge.v1);
            all[a].push(b);
            all[b].push(a);
            if usage.is_boundary() {
                rim[a].push(b);
                rim[b].push(a);
            } else if usage.is_non_manifold() {
                pinned[a] = true;
                pinned[b] = true;
            }
        }

        let neighbors = (0..n)
            .map(|v| {
                if pinned[v] {
                    Vec::new()
                } else if !rim[v].is_empty() {
                    std::mem::take(&mut rim[v])
                } else {
                    let mut list = std::mem::take(&mut all[v]);
                    list.sort_unstable();
                    list
                }
            })
            .collect();
        Self { neighbors }
    }

    /// Remove vertices from the stencil so they never move
    pub fn pin(&mut self, vertices: impl IntoIterator<Item = usize>) {
        for v in vertices {
            if let Some(list) = self.neighbors.get_mut(v) {
                list.clear();
            }
        }
    }

    /// Umbrella vector (neighbor average minus position) of every vertex
    pub fn laplacian(&self, positions: &[Point3<f64>]) -> Vec<Vector3<f64>> {
        self.neighbors
            .iter()
            .enumerate()
            .map(|(v, list)| {
                if list.is_empty() {
                    return Vector3::zeros();
                }
                let sum = list
                    .iter()
                    .fold(Vector3::zeros(), |acc, &w| acc + positions[w].coords);
                sum / list.len() as f64 - positions[v].coords
            })
            .collect()
    }
}

/// Move every vertex `relaxation` of the way toward its neighbor average, `iterations` times
pub fn laplacian_smooth(mesh: &Mesh, iterations: usize, relaxation: f64) -> Mesh {
    let mut out = mesh.clone();
    if iterations == 0 || relaxation <= 0.0 {
        return out;
    }
    let stencil = Stencil::build(mesh);
    let mut positions: Vec<Point3<f64>> = mesh.vertices.iter().map(|v| v.position).collect();
    for _ in 0..iterations {
        let delta = stencil.laplacian(&positions);
        for (p, d) in positions.iter_mut().zip(delta) {
            *p += d * relaxation;
        }
    }
    for (vertex, p) in out.vertices.iter_mut().zip(positions) {
        vertex.position = p;
    }
    out.recompute_normals();
    out
}

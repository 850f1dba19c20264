// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Boolean operations on triangle meshes
//!
//! Both operands are split along their intersection curves, faces lying in a shared plane
//! are overlaid, the pieces are grouped into patches bounded by those curves, and every patch
//! is located against the other operand by its generalized winding number. The operation then keeps the patches it needs and the
//! result is welded and re-oriented.
//!
//! Inputs that are not closed manifolds are accepted. Their status is logged and the result
//! carries a [`crate::error::QualityWarning`] when it is not a closed manifold itself.

mod classify;
mod intersect;
mod retriangulate;

use crate::error::{Checked, ShellError, ShellResult, Stage};
use crate::geometry::{Mesh, Triangle, Vertex};
use crate::integrity::{is_manifold, is_watertight, quality_warning};
use crate::repair::{fix_normals, remove_degenerate_faces, weld_vertices};
use crate::timing::OperationTimer;
use ahash::AHashMap;
use classify::{classify_patches, patches, PatchSide};
use intersect::{intersect, CutGraph, MESH_A, MESH_B};
use retriangulate::{split_faces, Fragment};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use tracing::{debug, info};

/// Relative tolerance used to weld the operands and the result
const WELD_TOLERANCE: f64 = 1e-9;
/// Relative distance of the inside/outside samples from a fragment
const SAMPLE_OFFSET: f64 = 1e-5;

/// Boolean operation type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BooleanOp {
    Union,
    Difference,
    Intersection,
}

impl fmt::Display for BooleanOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Union => f.write_str("union"),
            Self::Difference => f.write_str("difference"),
            Self::Intersection => f.write_str("intersection"),
        }
    }
}

impl BooleanOp {
    /// Whether a patch of `mesh` with `side` survives, and whether it must be flipped
    fn keep(self, mesh: usize, side: PatchSide) -> Option<bool> {
        use PatchSide::*;
        let keep = match (self, mesh == MESH_A, side) {
            (Self::Union, true, Outside | Shared) => true,
            (Self::Union, false, Outside) => true,
            (Self::Difference, true, Outside | Opposite) => true,
            (Self::Difference, false, Inside) => return Some(true),
            (Self::Intersection, true, Inside | Shared) => true,
            (Self::Intersection, false, Inside) => true,
            _ => false,
        };
        keep.then_some(false)
    }
}

/// `a` minus `b`
pub fn difference(a: &Mesh, b: &Mesh) -> ShellResult<Checked<Mesh>> {
    boolean(a, b, BooleanOp::Difference)
}

/// `a` plus `b`
pub fn union(a: &Mesh, b: &Mesh) -> ShellResult<Checked<Mesh>> {
    boolean(a, b, BooleanOp::Union)
}

/// Common volume of `a` and `b`
pub fn intersection(a: &Mesh, b: &Mesh) -> ShellResult<Checked<Mesh>> {
    boolean(a, b, BooleanOp::Intersection)
}

/// Apply `op` to `a` and `b`.
///
/// Fails with an input error when either operand is empty, and reports the stage as
/// unavailable when the result has no faces.
pub fn boolean(a: &Mesh, b: &Mesh, op: BooleanOp) -> ShellResult<Checked<Mesh>> {
    if a.is_empty() || b.is_empty() {
        return Err(ShellError::input(format!(
            "boolean {} needs two non-empty meshes",
            op
        )));
    }
    let _timer = OperationTimer::new("boolean");
    for (name, mesh) in [("a", a), ("b", b)] {
        info!(
            op = %op,
            operand = name,
            faces = mesh.triangle_count(),
            manifold = is_manifold(mesh),
            watertight = is_watertight(mesh),
            "boolean operand"
        );
    }

    let scale = a.bounding_box().union(&b.bounding_box()).diagonal().max(1.0);
    let tolerance = WELD_TOLERANCE * scale;
    let a = prepare(a, tolerance);
    let b = prepare(b, tolerance);

    let result = if !a.bounding_box().intersects(&b.bounding_box()) {
        debug!(op = %op, "operands are disjoint");
        disjoint(a, b, op)
    } else {
        let graph = intersect(&a, &b, tolerance);
        let kept = select(&a, &b, &graph, op, SAMPLE_OFFSET * scale);
        assemble(&graph, &kept)
    };
    let result = finish(result, tolerance);

    if result.triangles.is_empty() {
        return Err(ShellError::unavailable(
            Stage::Boolean,
            format!("boolean {} produced an empty mesh", op),
        ));
    }
    info!(
        op = %op,
        vertices = result.vertex_count(),
        faces = result.triangle_count(),
        "boolean complete"
    );
    let warnings = quality_warning(&result, Stage::Boolean).into_iter().collect();
    Ok(Checked::with_warnings(result, warnings))
}

fn prepare(mesh: &Mesh, tolerance: f64) -> Mesh {
    let mut out = mesh.clone();
    weld_vertices(&mut out, tolerance);
    remove_degenerate_faces(&mut out);
    out.remove_unreferenced_vertices();
    fix_normals(&out)
}

fn disjoint(a: Mesh, b: Mesh, op: BooleanOp) -> Mesh {
    match op {
        BooleanOp::Difference => a,
        BooleanOp::Union => {
            let mut out = a;
            out.merge(&b);
            out
        }
        BooleanOp::Intersection => Mesh::new(),
    }
}

/// Fragments of both operands that survive `op`, flipped where needed
fn select(a: &Mesh, b: &Mesh, graph: &CutGraph, op: BooleanOp, offset: f64) -> Vec<[usize; 3]> {
    let mut kept = Vec::new();
    for (which, mesh, other) in [(MESH_A, a, b), (MESH_B, b, a)] {
        let fragments: Vec<Fragment> = split_faces(mesh, which, graph);
        let groups = patches(&fragments, graph, which);
        let sides = classify_patches(&fragments, &groups, &graph.positions, other, offset);

        let mut tally: AHashMap<PatchSide, usize> = AHashMap::new();
        for (group, side) in groups.iter().zip(&sides) {
            *tally.entry(*side).or_default() += group.len();
            let Some(flip) = op.keep(which, *side) else {
                continue;
            };
            kept.extend(group.iter().map(|&i| {
                let [p, q, r] = fragments[i].tri;
                if flip {
                    [p, r, q]
                } else {
                    [p, q, r]
                }
            }));
        }
        debug!(
            mesh = which,
            patches = groups.len(),
            inside = tally.get(&PatchSide::Inside).copied().unwrap_or(0),
            outside = tally.get(&PatchSide::Outside).copied().unwrap_or(0),
            on_boundary = tally.get(&PatchSide::Shared).copied().unwrap_or(0)
                + tally.get(&PatchSide::Opposite).copied().unwrap_or(0),
            "classified fragments"
        );
    }
    kept
}

fn assemble(graph: &CutGraph, kept: &[[usize; 3]]) -> Mesh {
    Mesh {
        vertices: graph.positions.iter().map(|p| Vertex::at(*p)).collect(),
        triangles: kept.iter().map(|&t| Triangle::new(t)).collect(),
    }
}

/// Weld, drop slivers, cancel coincident faces of opposite winding and re-orient
fn finish(mut mesh: Mesh, tolerance: f64) -> Mesh {
    weld_vertices(&mut mesh, tolerance);
    remove_degenerate_faces(&mut mesh);
    let cancelled = cancel_coincident_faces(&mut mesh);
    if cancelled > 0 {
        debug!(cancelled, "removed coincident faces");
    }
    mesh.remove_unreferenced_vertices();
    fix_normals(&mesh)
}

/// Faces over the same vertices cancel in pairs of opposite winding, and at most one copy of
/// the prevailing winding survives. Returns the number of faces removed.
fn cancel_coincident_faces(mesh: &mut Mesh) -> usize {
    let before = mesh.triangles.len();
    // Sorted vertex set -> (faces wound one way, faces wound the other way)
    let mut groups: AHashMap<[usize; 3], (Vec<usize>, Vec<usize>)> = AHashMap::new();
    for (i, triangle) in mesh.triangles.iter().enumerate() {
        let mut key = triangle.indices;
        key.sort_unstable();
        let entry = groups.entry(key).or_default();
        if is_even_permutation(&triangle.indices, &key) {
            entry.0.push(i);
        } else {
            entry.1.push(i);
        }
    }
    let mut keep = vec![false; before];
    for (forward, backward) in groups.values() {
        match forward.len().cmp(&backward.len()) {
            Ordering::Greater => keep[forward[0]] = true,
            Ordering::Less => keep[backward[0]] = true,
            Ordering::Equal => {}
        }
    }
    let mut index = 0;
    mesh.triangles.retain(|_| {
        index += 1;
        keep[index - 1]
    });
    before - mesh.triangles.len()
}

fn is_even_permutation(indices: &[usize; 3], sorted: &[usize; 3]) -> bool {
    let rotations = [
        [sorted[0], sorted[1], sorted[2]],
        [sorted[1], sorted[2], sorted[0]],
        [sorted[2], sorted[0], sorted[1]],
    ];
    rotations.contains(indices)
}

// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Grouping fragments into patches and locating each patch against the other solid

use super::intersect::CutGraph;
use super::retriangulate::Fragment;
use crate::geometry::{classify_sample, is_inside, Classification, Mesh};
use crate::integrity::{find, union};
use ahash::{AHashMap, AHashSet};
use nalgebra::Point3;
use rayon::prelude::*;

/// Where a patch lies relative to the other operand
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum PatchSide {
    Inside,
    Outside,
    /// On the other boundary, both surfaces facing the same way
    Shared,
    /// On the other boundary, surfaces facing each other
    Opposite,
}

/// Edge-connected groups of fragments of operand `which` that never cross the intersection
/// curve.
///
/// An edge is a cut when some fragment has it on a cut segment, or when neither endpoint is
/// a vertex of `which`. The second rule may split a region more finely than needed.
pub(crate) fn patches(fragments: &[Fragment], graph: &CutGraph, which: usize) -> Vec<Vec<usize>> {
    let mut cut_edges: AHashSet<(usize, usize)> = AHashSet::new();
    for fragment in fragments {
        for k in 0..3 {
            let (p, q) = fragment.edge(k);
            if fragment.cut[k] || (graph.is_foreign(which, p) && graph.is_foreign(which, q)) {
                cut_edges.insert((p, q));
            }
        }
    }

    let mut parent: Vec<usize> = (0..fragments.len()).collect();
    let mut by_edge: AHashMap<(usize, usize), usize> = AHashMap::new();
    for (i, fragment) in fragments.iter().enumerate() {
        for k in 0..3 {
            let edge = fragment.edge(k);
            if cut_edges.contains(&edge) {
                continue;
            }
            match by_edge.get(&edge) {
                Some(&j) => union(&mut parent, i, j),
                None => {
                    by_edge.insert(edge, i);
                }
            }
        }
    }

    let mut groups: AHashMap<usize, Vec<usize>> = AHashMap::new();
    for i in 0..fragments.len() {
        let root = find(&mut parent, i);
        groups.entry(root).or_default().push(i);
    }
    let mut out: Vec<Vec<usize>> = groups.into_values().collect();
    out.sort_unstable_by_key(|group| group[0]);
    out
}

/// Classify every patch against `other` by majority over its largest fragments
pub(crate) fn classify_patches(
    fragments: &[Fragment],
    patches: &[Vec<usize>],
    positions: &[Point3<f64>],
    other: &Mesh,
    offset: f64,
) -> Vec<PatchSide> {
    patches
        .par_iter()
        .map(|patch| classify_patch(fragments, patch, positions, other, offset))
        .collect()
}

const SAMPLES: usize = 3;

fn classify_patch(
    fragments: &[Fragment],
    patch: &[usize],
    positions: &[Point3<f64>],
    other: &Mesh,
    offset: f64,
) -> PatchSide {
    let mut ranked: Vec<(usize, f64)> = patch
        .iter()
        .map(|&i| (i, fragments[i].area(positions)))
        .filter(|(_, area)| *area > 0.0)
        .collect();
    ranked.sort_by(|a, b| b.1.total_cmp(&a.1));

    let mut votes: Vec<(PatchSide, usize)> = Vec::with_capacity(SAMPLES);
    for &(i, _) in ranked.iter().take(SAMPLES) {
        let fragment = &fragments[i];
        let center = fragment.centroid(positions);
        let normal = fragment.normal(positions).normalize();
        let side = match classify_sample(other, &center, &normal, offset) {
            Classification::Inside => PatchSide::Inside,
            Classification::Outside => PatchSide::Outside,
            Classification::OnBoundary => {
                if is_inside(other, &(center + normal * offset)) {
                    PatchSide::Opposite
                } else {
                    PatchSide::Shared
                }
            }
        };
        match votes.iter_mut().find(|(s, _)| *s == side) {
            Some((_, count)) => *count += 1,
            None => votes.push((side, 1)),
        }
    }
    // Ties go to the largest fragment's vote
    let mut winner: Option<(PatchSide, usize)> = None;
    for (side, count) in votes {
        if winner.map_or(true, |(_, best)| count > best) {
            winner = Some((side, count));
        }
    }
    winner.map_or(PatchSide::Outside, |(side, _)| side)
}

#[cfg(test)]
mod tests {
    use super::super::intersect::{intersect, MESH_A};
    use super::super::retriangulate::split_faces;
    use super::*;
    use crate::geometry::Primitive;
    use nalgebra::Vector3;

    #[test]
    fn test_uncut_cube_is_one_patch() {
        let a = Primitive::cube(Vector3::new(2.0, 2.0, 2.0), true).to_mesh();
        let b = Primitive::sphere(0.5, 12).to_mesh();
        let graph = intersect(&a, &b, 1e-9);
        let fragments = split_faces(&a, MESH_A, &graph);
        let groups = patches(&fragments, &graph, MESH_A);
        assert_eq!(groups.len(), 1);
        let sides = classify_patches(&fragments, &groups, &graph.positions, &b, 1e-4);
        assert_eq!(sides, vec![PatchSide::Outside]);
    }

    #[test]
    fn test_cut_cube_has_inside_and_outside() {
        let a = Primitive::cube(Vector3::new(2.0, 2.0, 2.0), true).to_mesh();
        let mut b = a.clone();
        b.translate(&Vector3::new(0.5, 0.6, 0.7));
        let graph = intersect(&a, &b, 1e-9);
        let fragments = split_faces(&a, MESH_A, &graph);
        let groups = patches(&fragments, &graph, MESH_A);
        assert!(groups.len() >= 2);
        let sides = classify_patches(&fragments, &groups, &graph.positions, &b, 1e-4);
        assert!(sides.contains(&PatchSide::Inside));
        assert!(sides.contains(&PatchSide::Outside));
    }

    #[test]
    fn test_touching_faces_are_opposite() {
        let a = Primitive::cube(Vector3::new(2.0, 2.0, 2.0), true).to_mesh();
        let mut b = a.clone();
        b.translate(&Vector3::new(2.0, 0.0, 0.0));
        let fragments: Vec<Fragment> = (0..a.triangle_count())
            .map(|face| Fragment::whole(a.triangles[face].indices))
            .collect();
        let positions: Vec<Point3<f64>> = a.vertices.iter().map(|v| v.position).collect();
        let touching: Vec<Vec<usize>> = (0..a.triangle_count())
            .filter(|&f| a.face_normal(f).x > 0.9)
            .map(|f| vec![f])
            .collect();
        let sides = classify_patches(&fragments, &touching, &positions, &b, 1e-4);
        assert!(sides.iter().all(|s| *s == PatchSide::Opposite));
    }
}

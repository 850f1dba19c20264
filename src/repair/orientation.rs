// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Face orientation repair
//!
//! Winding is made consistent by flood fill across manifold edges. Each closed shell is then
//! oriented by how deeply it is nested inside the other shells: outer shells face outward
//! (positive volume), cavities face inward.

use crate::geometry::{winding_number, BoundingBox, Mesh};
use crate::integrity::EdgeMap;
use std::collections::VecDeque;
use tracing::{debug, info};

/// One edge-connected set of faces
#[derive(Debug, Clone)]
struct Shell {
    faces: Vec<usize>,
    closed: bool,
}

/// Make winding consistent per component and orient every shell, then recompute normals
pub fn fix_normals(mesh: &Mesh) -> Mesh {
    let mut out = mesh.clone();
    fix_normals_in_place(&mut out);
    out
}

/// In-place variant of [`fix_normals`], returning the number of faces flipped
pub fn fix_normals_in_place(mesh: &mut Mesh) -> usize {
    if mesh.triangles.is_empty() {
        return 0;
    }
    let (shells, mut flipped) = orient_consistently(mesh);
    flipped += orient_shells(mesh, &shells);
    mesh.recompute_normals();
    if flipped > 0 {
        info!(flipped, shells = shells.len(), "fixed face orientation");
    } else {
        debug!(shells = shells.len(), "face orientation already consistent");
    }
    flipped
}

/// Flood fill across edges shared by exactly two faces, flipping neighbors that traverse
/// the shared edge in the same direction.
fn orient_consistently(mesh: &mut Mesh) -> (Vec<Shell>, usize) {
    let edges = EdgeMap::build(mesh);
    let mut visited = vec![false; mesh.triangles.len()];
    let mut shells = Vec::new();
    let mut flipped = 0;

    for start in 0..mesh.triangles.len() {
        if visited[start] || mesh.triangles[start].has_repeated_index() {
            continue;
        }
        visited[start] = true;
        let mut faces = vec![start];
        let mut closed = true;
        let mut queue = VecDeque::from([start]);

        while let Some(face) = queue.pop_front() {
            for (a, b) in mesh.triangles[face].edges() {
                let Some(usage) = edges.get(a, b) else {
                    continue;
                };
                if usage.face_count() != 2 {
                    if usage.is_boundary() {
                        closed = false;
                    }
                    continue;
                }
                for neighbor in usage.faces() {
                    if neighbor == face || visited[neighbor] {
                        continue;
                    }
                    visited[neighbor] = true;
                    // Consistent neighbors traverse the edge as b -> a
                    if mesh.triangles[neighbor].edges().contains(&(a, b)) {
                        mesh.triangles[neighbor] = mesh.triangles[neighbor].flipped();
                        flipped += 1;
                    }
                    faces.push(neighbor);
                    queue.push_back(neighbor);
                }
            }
        }
        shells.push(Shell { faces, closed });
    }
    (shells, flipped)
}

/// Orient closed shells by nesting depth and open shells by their volume about their own center
fn orient_shells(mesh: &mut Mesh, shells: &[Shell]) -> usize {
    let closed: Vec<(usize, Mesh, BoundingBox)> = shells
        .iter()
        .enumerate()
        .filter(|(_, s)| s.closed)
        .map(|(i, s)| {
            let sub = mesh.submesh(&s.faces);
            let bbox = sub.bounding_box();
            (i, sub, bbox)
        })
        .collect();

    let mut flipped = 0;
    for (index, shell) in shells.iter().enumerate() {
        let want_positive = if shell.closed {
            let Some(sample) = shell
                .faces
                .first()
                .map(|&f| mesh.position(mesh.triangles[f].indices[0]))
            else {
                continue;
            };
            let depth = closed
                .iter()
                .filter(|(other, sub, bbox)| {
                    *other != index
                        && bbox.contains_point(&sample)
                        && winding_number(sub, &sample).abs() > 0.5
                })
                .count();
            depth % 2 == 0
        } else {
            true
        };

        let volume = if shell.closed {
            mesh.signed_volume_of(shell.faces.iter().copied())
        } else {
            volume_about_center(mesh, &shell.faces)
        };
        if volume != 0.0 && (volume > 0.0) != want_positive {
            for &f in &shell.faces {
                mesh.triangles[f] = mesh.triangles[f].flipped();
            }
            flipped += shell.faces.len();
        }
    }
    flipped
}

/// Signed volume of the cone from the faces' centroid; positive when an open surface faces
/// away from its own center
fn volume_about_center(mesh: &Mesh, faces: &[usize]) -> f64 {
    let mut bbox = BoundingBox::empty();
    for &f in faces {
        for p in mesh.triangle_positions(f) {
            bbox.expand_to_include(&p);
        }
    }
    let center = bbox.center();
    faces
        .iter()
        .map(|&f| {
            let [a, b, c] = mesh.triangle_positions(f);
            (a - center).dot(&(b - center).cross(&(c - center))) / 6.0
        })
        .sum()
}

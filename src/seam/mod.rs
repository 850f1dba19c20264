// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Seam finishing after the boolean cut
//!
//! Faces inside an axis-aligned clip box are smoothed with Taubin's λ|μ filter while every
//! vertex used by a face outside the box is pinned, so the two parts stay stitched along the
//! box boundary and nothing outside the box moves. Holes opened by the smoothing are filled
//! and a single consistent surface is extracted from the result.

mod taubin;

pub use taubin::{mu_for, taubin_smooth, LAMBDA};

use crate::error::{Checked, ShellError, ShellResult, Stage};
use crate::geometry::{BoundingBox, Mesh};
use crate::integrity::quality_warning;
use crate::repair::{extract_surface, fill_holes_in_place, Stencil};
use crate::timing::OperationTimer;
use nalgebra::Point3;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Parameters of [`finish_seam`]
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SeamParams {
    pub clip_bounds: BoundingBox,
    pub smoothing_iterations: usize,
    pub pass_band: f64,
    /// Largest hole perimeter closed after smoothing
    pub fill_hole_size: f64,
}

impl Default for SeamParams {
    fn default() -> Self {
        Self {
            clip_bounds: BoundingBox::from_bounds([-25.0, 22.0, -23.0, 23.0, -12.0, -6.0]),
            smoothing_iterations: 70,
            pass_band: 0.04,
            fill_hole_size: 20.0,
        }
    }
}

/// Smooth the part of `mesh` inside `params.clip_bounds` and rejoin it with the rest
pub fn finish_seam(mesh: &Mesh, params: &SeamParams) -> ShellResult<Checked<Mesh>> {
    if mesh.is_empty() {
        return Err(ShellError::input("cannot finish the seam of an empty mesh"));
    }
    let _timer = OperationTimer::new("finish_seam");
    let clip = &params.clip_bounds;

    let (inside, outside): (Vec<usize>, Vec<usize>) = (0..mesh.triangle_count()).partition(|&f| {
        mesh.triangles[f]
            .indices
            .iter()
            .all(|&v| clip.contains_point(&mesh.vertices[v].position))
    });
    info!(
        inside = inside.len(),
        outside = outside.len(),
        "split mesh at clip box"
    );

    let mut out = mesh.clone();
    if !inside.is_empty() && params.smoothing_iterations > 0 {
        let region = Mesh {
            vertices: mesh.vertices.clone(),
            triangles: inside.iter().map(|&f| mesh.triangles[f]).collect(),
        };
        let mut stencil = Stencil::build(&region);
        stencil.pin(
            outside
                .iter()
                .flat_map(|&f| mesh.triangles[f].indices),
        );
        let mut positions: Vec<Point3<f64>> = mesh.vertices.iter().map(|v| v.position).collect();
        taubin::smooth_positions(
            &mut positions,
            &stencil,
            params.smoothing_iterations,
            params.pass_band,
        );
        let moved = positions
            .iter()
            .zip(&mesh.vertices)
            .filter(|(p, v)| **p != v.position)
            .count();
        for (vertex, p) in out.vertices.iter_mut().zip(positions) {
            vertex.position = p;
        }
        debug!(moved, "smoothed seam region");
    }

    let filled = fill_holes_in_place(&mut out, params.fill_hole_size);
    let out = extract_surface(&out);
    info!(
        filled,
        vertices = out.vertex_count(),
        faces = out.triangle_count(),
        "finished seam"
    );
    let warnings = quality_warning(&out, Stage::Seam).into_iter().collect();
    Ok(Checked::with_warnings(out, warnings))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::geometry::Primitive;
    use crate::integrity::is_watertight;

    /// Sphere with deterministic radial noise on every vertex
    fn bumpy_sphere(r: f64) -> Mesh {
        let mut mesh = Primitive::sphere(r, 32).to_mesh();
        for (i, vertex) in mesh.vertices.iter_mut().enumerate() {
            let bump = 1.0 + 0.04 * (((i * 7919) % 13) as f64 / 13.0 - 0.5);
            vertex.position = Point3::from(vertex.position.coords * bump);
        }
        mesh
    }

    fn params(clip_bounds: BoundingBox) -> SeamParams {
        SeamParams {
            clip_bounds,
            smoothing_iterations: 20,
            pass_band: 0.1,
            fill_hole_size: 20.0,
        }
    }

    fn radius_spread(mesh: &Mesh, region: &BoundingBox) -> f64 {
        let radii: Vec<f64> = mesh
            .vertices
            .iter()
            .filter(|v| region.strictly_contains_point(&v.position))
            .map(|v| v.position.coords.norm())
            .collect();
        let mean = radii.iter().sum::<f64>() / radii.len() as f64;
        radii.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / radii.len() as f64
    }

    #[test]
    fn test_points_outside_box_are_unchanged() {
        let mesh = bumpy_sphere(10.0);
        let clip = BoundingBox::from_bounds([-11.0, 11.0, -11.0, 11.0, 4.0, 11.0]);
        let finished = finish_seam(&mesh, &params(clip)).unwrap().value;
        for vertex in &mesh.vertices {
            if clip.contains_point(&vertex.position) {
                continue;
            }
            assert!(finished
                .vertices
                .iter()
                .any(|v| (v.position - vertex.position).norm() < 1e-12));
        }
    }

    #[test]
    fn test_inside_box_gets_smoother() {
        let mesh = bumpy_sphere(10.0);
        let clip = BoundingBox::from_bounds([-11.0, 11.0, -11.0, 11.0, 4.0, 11.0]);
        let finished = finish_seam(&mesh, &params(clip)).unwrap();
        let core = BoundingBox::from_bounds([-11.0, 11.0, -11.0, 11.0, 7.0, 11.0]);
        assert!(radius_spread(&finished.value, &core) < radius_spread(&mesh, &core));
        assert!(is_watertight(&finished.value));
        assert!(finished.is_clean());
    }

    #[test]
    fn test_box_missing_the_mesh_keeps_it() {
        let mesh = Primitive::sphere(5.0, 16).to_mesh();
        let clip = BoundingBox::from_bounds([20.0, 30.0, 20.0, 30.0, 20.0, 30.0]);
        let finished = finish_seam(&mesh, &params(clip)).unwrap().value;
        assert_eq!(finished.triangle_count(), mesh.triangle_count());
        assert_eq!(finished.vertex_count(), mesh.vertex_count());
    }

    #[test]
    fn test_empty_mesh_is_input_error() {
        let err = finish_seam(&Mesh::new(), &SeamParams::default()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InputInvalid);
    }
}

// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Normal offset with optional voxel healing

use super::clean::clean;
use super::components::extract_largest_component;
use super::holes::fill_holes;
use super::orientation::fix_normals;
use super::voxel::{extract_boundary_surface, voxelize};
use crate::error::{ShellError, ShellResult, Stage};
use crate::geometry::Mesh;
use crate::timing::OperationTimer;
use tracing::{info, warn};

/// Hole size used by the healing passes around voxelization
const HEALING_HOLE_SIZE: f64 = 10.0;

/// Voxel count along the diagonal when no positive resolution is given
const DEFAULT_HEALING_RESOLUTION: f64 = 100.0;

/// Move every point `distance` along its vertex normal (positive is outward).
///
/// With `healing_resolution`, the displaced surface is rebuilt from a voxel grid with voxel
/// size `length / healing_resolution`, which removes the self-intersections aggressive offsets
/// create. If voxelization produces nothing, the un-healed offset surface is returned.
pub fn offset(mesh: &Mesh, distance: f64, healing_resolution: Option<f64>) -> ShellResult<Mesh> {
    if mesh.vertices.is_empty() {
        return Err(ShellError::degenerate(
            Stage::Repair,
            "cannot compute normals of a mesh with zero points",
        ));
    }
    let _timer = OperationTimer::new("offset");

    let mut displaced = mesh.clone();
    displaced.recompute_normals();
    for vertex in &mut displaced.vertices {
        vertex.position += vertex.normal * distance;
    }
    displaced.recompute_normals();

    let Some(resolution) = healing_resolution else {
        return Ok(displaced);
    };

    let displaced = fill_holes(&clean(&displaced, 0.0), HEALING_HOLE_SIZE);
    let length = displaced.length();
    if length == 0.0 {
        warn!("offset surface has zero length, skipping voxel healing");
        return Ok(displaced);
    }
    let resolution = if resolution > 0.0 {
        resolution
    } else {
        DEFAULT_HEALING_RESOLUTION
    };
    let voxel_size = length / resolution;

    let surface = match voxelize(&displaced, voxel_size) {
        Ok(grid) => extract_boundary_surface(&grid),
        Err(e) => {
            warn!(error = %e, "voxelization failed, returning un-healed offset");
            return Ok(displaced);
        }
    };
    if surface.is_empty() {
        warn!("voxel healing produced no surface, returning un-healed offset");
        return Ok(displaced);
    }

    let healed = clean(
        &extract_largest_component(&fix_normals(&fill_holes(
            &clean(&surface, 0.0),
            HEALING_HOLE_SIZE,
        ))),
        0.0,
    );
    if healed.vertices.is_empty() {
        return Err(ShellError::degenerate(
            Stage::Repair,
            "voxel healing left a mesh with zero points",
        ));
    }
    info!(
        distance,
        voxel_size,
        faces = healed.triangle_count(),
        "offset healed through voxel grid"
    );
    Ok(healed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Primitive;
    use crate::integrity::is_watertight;

    #[test]
    fn test_offset_grows_sphere() {
        let mesh = Primitive::sphere(5.0, 32).to_mesh();
        let grown = offset(&mesh, 1.0, None).unwrap();
        let size = grown.bounding_box().size();
        assert!((size.x - 12.0).abs() < 0.2);
        assert_eq!(grown.triangle_count(), mesh.triangle_count());
    }

    #[test]
    fn test_negative_offset_shrinks() {
        let mesh = Primitive::sphere(5.0, 32).to_mesh();
        let shrunk = offset(&mesh, -1.0, None).unwrap();
        assert!(shrunk.volume() < mesh.volume());
    }

    #[test]
    fn test_healed_offset_is_closed() {
        let mesh = Primitive::sphere(5.0, 24).to_mesh();
        let healed = offset(&mesh, 0.5, Some(40.0)).unwrap();
        assert!(is_watertight(&healed));
        let exact = 4.0 / 3.0 * std::f64::consts::PI * 5.5_f64.powi(3);
        assert!(healed.volume() > exact * 0.8);
        assert!(healed.volume() < exact * 1.5);
    }

    #[test]
    fn test_offset_of_empty_mesh_fails() {
        let err = offset(&Mesh::new(), 1.0, None).unwrap_err();
        assert_eq!(err.stage(), Stage::Repair);
    }
}

// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Draping: extend an open or ragged surface into a closed solid with a flat base
//!
//! The envelope cap is swept down to the floor of the mesh and united with the mesh. A
//! watertight input goes through the boolean engine, and a failed or open union is an error.
//! An open input has no inside to unite with, so it takes the envelope union instead: the part
//! of the mesh above the cap is kept and the prism supplies the sides and the base. A result
//! that is not watertight is always reported as a failure.

mod extrude;

pub use extrude::{cut_above, extrude};

use crate::boolean;
use crate::config::PipelineConfig;
use crate::envelope::{extractor, Envelope, EnvelopeStrategy};
use crate::error::{Checked, ErrorKind, ShellError, ShellResult, Stage};
use crate::geometry::{Axis, Mesh};
use crate::integrity::{boundary_loops, is_watertight, quality_warning, EdgeMap};
use crate::repair::{clean, fill_hole_ear_clipping, fill_inner_holes, fix_normals};
use crate::timing::OperationTimer;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// Parameters of one drape attempt
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DrapeOptions {
    pub axis: Axis,
    /// Axis along which slice width is measured (slice strategy only)
    pub width_axis: Axis,
    pub strategy: EnvelopeStrategy,
    pub n_slices: usize,
    pub ray_resolution: usize,
    pub clean_tolerance: f64,
    /// Holes of an open mesh up to this perimeter are closed before draping; the largest
    /// loop, the opening itself, is left alone
    pub fill_hole_size: f64,
}

impl Default for DrapeOptions {
    fn default() -> Self {
        Self {
            axis: Axis::Z,
            width_axis: Axis::Y,
            strategy: EnvelopeStrategy::Slice,
            n_slices: 100,
            ray_resolution: 200,
            clean_tolerance: 0.01,
            fill_hole_size: 1000.0,
        }
    }
}

impl DrapeOptions {
    /// Slice count or ray grid side, whichever the strategy uses
    pub fn resolution(&self) -> usize {
        match self.strategy {
            EnvelopeStrategy::Slice => self.n_slices,
            EnvelopeStrategy::RayCast => self.ray_resolution,
        }
    }

    pub fn with_strategy(mut self, strategy: EnvelopeStrategy) -> Self {
        self.strategy = strategy;
        self
    }
}

/// Extend `mesh` into a closed solid along `options.axis`
pub fn drape(mesh: &Mesh, options: &DrapeOptions) -> ShellResult<Checked<Mesh>> {
    if mesh.is_empty() {
        return Err(ShellError::input("cannot drape an empty mesh"));
    }
    let _timer = OperationTimer::new("drape");

    let closed = is_watertight(mesh);
    let filled;
    let mesh = if closed {
        mesh
    } else {
        let mut patched = mesh.clone();
        let holes = fill_inner_holes(&mut patched, options.fill_hole_size);
        if holes > 0 {
            info!(holes, fill_hole_size = options.fill_hole_size, "filled holes before draping");
        }
        filled = patched;
        &filled
    };

    let envelope = extractor(options.strategy, options.resolution(), options.width_axis)
        .extract(mesh, options.axis)?;
    let prism = extrude(&envelope, true)?;

    let united = if closed {
        let checked = boolean::union(mesh, &prism).map_err(|e| {
            warn!(error = %e, "boolean union of mesh and prism failed");
            ShellError::unavailable(Stage::Drape, format!("union with the prism failed: {}", e))
        })?;
        if !is_watertight(&checked.value) {
            let open = EdgeMap::build(&checked.value).boundary_edge_count();
            return Err(ShellError::unavailable(
                Stage::Drape,
                format!("union with the prism has {} boundary edges", open),
            ));
        }
        checked.value
    } else {
        info!(strategy = %options.strategy, "mesh is open, using envelope union");
        envelope_union(mesh, &envelope, prism, options.clean_tolerance)?
    };

    let solid = fix_normals(&clean(&united, options.clean_tolerance));
    if !is_watertight(&solid) {
        let open = EdgeMap::build(&solid).boundary_edge_count();
        return Err(ShellError::unavailable(
            Stage::Drape,
            format!("draped solid has {} boundary edges", open),
        ));
    }
    info!(
        strategy = %options.strategy,
        vertices = solid.vertex_count(),
        faces = solid.triangle_count(),
        "draped mesh"
    );
    let warnings = quality_warning(&solid, Stage::Drape).into_iter().collect();
    Ok(Checked::with_warnings(solid, warnings))
}

/// Union of the mesh with its prism, assembled from the envelope instead of a boolean.
///
/// For a slice envelope the mesh is cut at the slice plane and the open prism is stitched to
/// the cut; any other loops left on the plane are capped. A ray-cast envelope already follows
/// the top of the mesh, so the prism is the result.
fn envelope_union(
    mesh: &Mesh,
    envelope: &Envelope,
    prism: Mesh,
    tolerance: f64,
) -> ShellResult<Mesh> {
    match envelope.strategy {
        EnvelopeStrategy::RayCast => Ok(prism),
        EnvelopeStrategy::Slice => {
            let mut solid = cut_above(mesh, envelope.axis, envelope.level);
            solid.merge(&extrude(envelope, false)?);
            let mut solid = clean(&solid, tolerance);
            cap_planar_loops(&mut solid, envelope.axis, envelope.level, tolerance);
            Ok(solid)
        }
    }
}

/// Close boundary loops lying in the plane `axis = level`
fn cap_planar_loops(mesh: &mut Mesh, axis: Axis, level: f64, tolerance: f64) {
    let a = axis.index();
    let tolerance = tolerance.max(1e-9);
    let patches: Vec<_> = boundary_loops(mesh)
        .iter()
        .filter(|hole| {
            hole.vertices
                .iter()
                .all(|&v| (mesh.vertices[v].position[a] - level).abs() <= tolerance)
        })
        .map(|hole| fill_hole_ear_clipping(mesh, hole))
        .collect();
    if !patches.is_empty() {
        info!(capped = patches.len(), "capped loops on the slice plane");
    }
    for patch in patches {
        mesh.triangles.extend(patch);
    }
}

/// Drape with the configured strategy, retrying with the other strategy and then with lower
/// resolutions and larger hole sizes, up to `config.max_retries` extra attempts
pub fn drape_with_fallback(mesh: &Mesh, config: &PipelineConfig) -> ShellResult<Checked<Mesh>> {
    let mut last_error = None;
    for attempt in 0..=config.max_retries {
        let options = config.relaxed(attempt).drape_options();
        match drape(mesh, &options) {
            Ok(result) => {
                if attempt > 0 {
                    info!(
                        attempt,
                        strategy = %options.strategy,
                        resolution = options.resolution(),
                        "drape succeeded after retry"
                    );
                }
                return Ok(result);
            }
            Err(e) if e.kind() == ErrorKind::InputInvalid => return Err(e),
            Err(e) => {
                warn!(
                    attempt,
                    strategy = %options.strategy,
                    resolution = options.resolution(),
                    error = %e,
                    "drape attempt failed"
                );
                last_error = Some(e);
            }
        }
    }
    Err(last_error.unwrap_or_else(|| ShellError::unavailable(Stage::Drape, "no drape attempt ran")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Primitive;
    use crate::integrity::is_watertight;

    #[test]
    fn test_drape_open_hemisphere_by_slice() {
        let mesh = Primitive::hemisphere(5.0, 32).to_mesh();
        let options = DrapeOptions {
            n_slices: 40,
            ..DrapeOptions::default()
        };
        let draped = drape(&mesh, &options).unwrap();
        assert!(is_watertight(&draped.value));
        let half_ball = 2.0 / 3.0 * std::f64::consts::PI * 125.0;
        let volume = draped.value.volume();
        assert!(volume > half_ball * 0.9 && volume < half_ball * 1.05);
    }

    #[test]
    fn test_drape_open_hemisphere_by_rays() {
        let mesh = Primitive::hemisphere(5.0, 32).to_mesh();
        let options = DrapeOptions {
            strategy: EnvelopeStrategy::RayCast,
            ray_resolution: 40,
            ..DrapeOptions::default()
        };
        let draped = drape(&mesh, &options).unwrap();
        assert!(is_watertight(&draped.value));
        assert!(draped.value.signed_volume() > 0.0);
    }

    #[test]
    fn test_drape_empty_mesh_is_input_error() {
        let err = drape(&Mesh::new(), &DrapeOptions::default()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InputInvalid);
    }

    #[test]
    fn test_resolution_follows_strategy() {
        let options = DrapeOptions::default();
        assert_eq!(options.resolution(), 100);
        assert_eq!(
            options.with_strategy(EnvelopeStrategy::RayCast).resolution(),
            200
        );
    }
}

// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Taubin λ|μ smoothing
//!
//! Each iteration is a shrinking Laplacian step with factor λ followed by an inflating step
//! with factor μ < -λ. The pass-band frequency `k_pb` fixes μ through `1/λ + 1/μ = k_pb`.

use crate::geometry::Mesh;
use crate::repair::Stencil;
use nalgebra::Point3;
use tracing::debug;

pub const LAMBDA: f64 = 0.5;

/// Largest usable pass band; at `1/λ` the inflating factor is unbounded
const MAX_PASS_BAND: f64 = 1.9;

/// Inflation factor μ for `pass_band`
pub fn mu_for(pass_band: f64) -> f64 {
    let k = pass_band.clamp(f64::EPSILON, MAX_PASS_BAND);
    1.0 / (k - 1.0 / LAMBDA)
}

/// Smooth every vertex of `mesh`. Open rims slide along themselves and vertices on
/// non-manifold edges stay put.
pub fn taubin_smooth(mesh: &Mesh, iterations: usize, pass_band: f64) -> Mesh {
    let stencil = Stencil::build(mesh);
    let mut out = mesh.clone();
    let mut positions: Vec<Point3<f64>> = mesh.vertices.iter().map(|v| v.position).collect();
    smooth_positions(&mut positions, &stencil, iterations, pass_band);
    for (vertex, p) in out.vertices.iter_mut().zip(positions) {
        vertex.position = p;
    }
    out.recompute_normals();
    out
}

/// Run the λ|μ iterations on `positions` using `stencil`
pub(crate) fn smooth_positions(
    positions: &mut [Point3<f64>],
    stencil: &Stencil,
    iterations: usize,
    pass_band: f64,
) {
    let mu = mu_for(pass_band);
    for _ in 0..iterations {
        for factor in [LAMBDA, mu] {
            let delta = stencil.laplacian(positions);
            for (p, d) in positions.iter_mut().zip(&delta) {
                *p += d * factor;
            }
        }
    }
    debug!(iterations, lambda = LAMBDA, mu, "taubin smoothing");
}

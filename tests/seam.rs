// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Seam finishing with the default clip box

use anyhow::Result;
use helmshell::geometry::{Mesh, Primitive};
use helmshell::integrity::is_watertight;
use helmshell::repair::laplacian_smooth;
use helmshell::seam::{finish_seam, mu_for, taubin_smooth, SeamParams, LAMBDA};
use nalgebra::{Point3, Vector3};

/// Sphere whose bottom cap dips into the default clip box, with a ragged surface
fn ragged_dome() -> Mesh {
    let mut mesh = Primitive::sphere(20.0, 48).to_mesh();
    for (i, vertex) in mesh.vertices.iter_mut().enumerate() {
        let bump = 1.0 + 0.03 * (((i * 7919) % 17) as f64 / 17.0 - 0.5);
        vertex.position = Point3::from(vertex.position.coords * bump);
    }
    mesh.translate(&Vector3::new(0.0, 0.0, 10.0));
    mesh
}

#[test]
fn test_default_seam_touches_only_the_rim() -> Result<()> {
    let mesh = ragged_dome();
    let params = SeamParams::default();
    let finished = finish_seam(&mesh, &params)?;
    println!(
        "{} -> {} faces, {} warnings",
        mesh.triangle_count(),
        finished.value.triangle_count(),
        finished.warnings.len()
    );

    assert!(is_watertight(&finished.value));
    let clip = params.clip_bounds;
    let kept = |p: &Point3<f64>| {
        finished
            .value
            .vertices
            .iter()
            .any(|v| (v.position - p).norm() < 1e-12)
    };
    let mut moved = 0;
    for vertex in &mesh.vertices {
        if kept(&vertex.position) {
            continue;
        }
        moved += 1;
        assert!(clip.contains_point(&vertex.position));
    }
    println!("{} vertices moved", moved);
    assert!(moved > 0);

    let change = (finished.value.volume() - mesh.volume()).abs() / mesh.volume();
    assert!(change < 0.01, "volume changed by {:.4}", change);
    Ok(())
}

#[test]
fn test_taubin_preserves_volume_better_than_laplacian() -> Result<()> {
    let sphere = Primitive::sphere(10.0, 32).to_mesh();
    let taubin = taubin_smooth(&sphere, 30, 0.1);
    let laplacian = laplacian_smooth(&sphere, 30, LAMBDA);

    let loss = |m: &Mesh| (sphere.volume() - m.volume()) / sphere.volume();
    println!("taubin loss {:.5}, laplacian loss {:.5}", loss(&taubin), loss(&laplacian));
    assert!(loss(&taubin).abs() < loss(&laplacian).abs());
    assert!(mu_for(0.1) < -LAMBDA);
    Ok(())
}

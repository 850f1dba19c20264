// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Draping open scans and closed solids, with and without retries

use anyhow::Result;
use helmshell::drape::{drape, drape_with_fallback, DrapeOptions};
use helmshell::envelope::{extractor, EnvelopeExtractor, EnvelopeStrategy};
use helmshell::geometry::{Axis, Mesh, Primitive};
use helmshell::integrity::{is_manifold, is_watertight};
use helmshell::{ErrorKind, PipelineConfig};
use nalgebra::Vector3;

#[test]
fn test_both_strategies_close_an_open_dome() -> Result<()> {
    let dome = Primitive::hemisphere(6.0, 32).to_mesh();
    for strategy in [EnvelopeStrategy::Slice, EnvelopeStrategy::RayCast] {
        let options = DrapeOptions {
            n_slices: 40,
            ray_resolution: 40,
            ..DrapeOptions::default()
        }
        .with_strategy(strategy);
        let draped = drape(&dome, &options)?;
        println!(
            "{}: {} faces, {} warnings",
            strategy,
            draped.value.triangle_count(),
            draped.warnings.len()
        );
        assert!(is_watertight(&draped.value), "{} left the dome open", strategy);
        assert!(draped.value.signed_volume() > 0.0);
        let bounds = draped.value.bounding_box();
        assert!(bounds.max.z <= 6.0 + 1e-6);
    }
    Ok(())
}

#[test]
fn test_slice_drape_of_dome_matches_half_ball() -> Result<()> {
    let dome = Primitive::hemisphere(5.0, 48).to_mesh();
    let options = DrapeOptions {
        n_slices: 60,
        ..DrapeOptions::default()
    };
    let draped = drape(&dome, &options)?.value;
    let half_ball = 2.0 / 3.0 * std::f64::consts::PI * 125.0;
    println!("draped volume {:.2}, half ball {:.2}", draped.volume(), half_ball);
    assert!(is_manifold(&draped));
    assert!((draped.volume() - half_ball).abs() / half_ball < 0.1);
    Ok(())
}

#[test]
fn test_envelope_faces_up_the_axis() -> Result<()> {
    let dome = Primitive::hemisphere(5.0, 32).to_mesh();
    let envelope = extractor(EnvelopeStrategy::RayCast, 30, Axis::Y).extract(&dome, Axis::Z)?;
    assert!(envelope.depth() > 0.0);
    let up: f64 = (0..envelope.surface.triangle_count())
        .map(|f| envelope.surface.face_cross(f).z)
        .sum();
    assert!(up > 0.0);
    Ok(())
}

#[test]
fn test_fallback_drapes_with_default_config() -> Result<()> {
    let dome = Primitive::hemisphere(5.0, 32).to_mesh();
    let config = PipelineConfig {
        n_slices: 40,
        ray_resolution: 40,
        ..PipelineConfig::default()
    };
    let draped = drape_with_fallback(&dome, &config)?;
    assert!(is_watertight(&draped.value));
    Ok(())
}

#[test]
fn test_fallback_reports_empty_input() {
    let err = drape_with_fallback(&Mesh::new(), &PipelineConfig::default()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InputInvalid);
}

#[test]
fn test_closed_cube_drapes_to_itself() -> Result<()> {
    let cube = Primitive::cube(Vector3::new(2.0, 2.0, 2.0), true).to_mesh();
    let options = DrapeOptions {
        n_slices: 20,
        ..DrapeOptions::default()
    };
    let draped = drape(&cube, &options)?.value;
    println!("draped cube volume {:.4}", draped.volume());
    assert!(is_watertight(&draped));
    assert!((draped.volume() - 8.0).abs() < 0.08);
    Ok(())
}

#[test]
fn test_closed_sphere_drapes_to_dome_on_cylinder() -> Result<()> {
    let r = 5.0;
    let ball = Primitive::sphere(r, 32).to_mesh();
    let options = DrapeOptions {
        n_slices: 40,
        ..DrapeOptions::default()
    };
    let draped = drape(&ball, &options)?.value;
    let pi = std::f64::consts::PI;
    let expected = 2.0 / 3.0 * pi * r.powi(3) + pi * r * r * r;
    println!("draped sphere volume {:.2}, expected {:.2}", draped.volume(), expected);
    assert!(is_watertight(&draped));
    assert!((draped.volume() - expected).abs() / expected < 0.05);
    assert!(draped.bounding_box().min.z >= -r - 1e-6);
    Ok(())
}

#[test]
fn test_fallback_recovers_with_the_other_strategy() -> Result<()> {
    let dome = Primitive::hemisphere(5.0, 32).to_mesh();
    // A two-ray grid only samples the bounding box corners, which miss the dome
    let config = PipelineConfig {
        drape_strategy: EnvelopeStrategy::RayCast,
        ray_resolution: 2,
        n_slices: 40,
        max_retries: 0,
        ..PipelineConfig::default()
    };
    let err = drape_with_fallback(&dome, &config).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::GeometryDegenerate);

    let config = PipelineConfig {
        max_retries: 1,
        ..config
    };
    let draped = drape_with_fallback(&dome, &config)?;
    assert!(is_watertight(&draped.value));
    assert!(draped.value.volume() > 0.0);
    Ok(())
}

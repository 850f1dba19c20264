// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Boolean operations on curved and flat operands

use anyhow::Result;
use helmshell::boolean::{boolean, BooleanOp};
use helmshell::geometry::{Mesh, Primitive};
use helmshell::integrity::{check, is_watertight};
use helmshell::{difference, intersection, union};
use nalgebra::Vector3;

fn box_at(size: [f64; 3], center: [f64; 3]) -> Mesh {
    let mut mesh = Primitive::cube(Vector3::new(size[0], size[1], size[2]), true).to_mesh();
    mesh.translate(&Vector3::new(center[0], center[1], center[2]));
    mesh
}

#[test]
fn test_sphere_minus_box_corner() -> Result<()> {
    let sphere = Primitive::sphere(5.0, 32).to_mesh();
    let corner = box_at([6.0, 6.0, 6.0], [3.1, 3.2, 3.3]);

    let cut = difference(&sphere, &corner)?;
    let report = check(&cut.value);
    println!(
        "sphere - box: {} faces, manifold={} watertight={}",
        report.triangle_count, report.manifold, report.watertight
    );
    assert!(report.manifold && report.watertight);
    assert!(cut.is_clean());
    assert!(cut.value.volume() < sphere.volume());
    assert!(cut.value.volume() > sphere.volume() * 0.75);
    Ok(())
}

#[test]
fn test_inclusion_exclusion_of_volumes() -> Result<()> {
    let a = Primitive::sphere(4.0, 24).to_mesh();
    let b = box_at([5.0, 5.0, 5.0], [3.0, 0.3, 0.4]);

    let sum = union(&a, &b)?.value;
    let common = intersection(&a, &b)?.value;
    let lhs = sum.signed_volume() + common.signed_volume();
    let rhs = a.volume() + b.volume();
    println!("|A u B| + |A n B| = {:.6}, |A| + |B| = {:.6}", lhs, rhs);
    assert!((lhs - rhs).abs() < rhs * 1e-6);

    let a_minus_b = difference(&a, &b)?.value;
    assert!((a_minus_b.signed_volume() + common.signed_volume() - a.volume()).abs() < 1e-6 * rhs);
    Ok(())
}

#[test]
fn test_helmet_like_cut_opens_cavity() -> Result<()> {
    // Template block with a draped head column pushed up through its floor
    let helmet = box_at([20.0, 20.0, 14.0], [0.0, 0.0, 5.0]);
    let column = box_at([8.0, 10.0, 14.0], [0.3, -0.2, 1.1]);

    let shell = boolean(&helmet, &column, BooleanOp::Difference)?.value;
    assert!(is_watertight(&shell));
    let expected = helmet.volume() - 8.0 * 10.0 * (8.1 - -2.0);
    println!("shell volume {:.4}, expected {:.4}", shell.signed_volume(), expected);
    assert!((shell.signed_volume() - expected).abs() < 1e-6);
    Ok(())
}

#[test]
fn test_difference_is_not_commutative() -> Result<()> {
    let a = box_at([2.0, 2.0, 2.0], [0.0, 0.0, 0.0]);
    let b = box_at([2.0, 2.0, 2.0], [1.0, 0.25, 0.35]);
    let ab = difference(&a, &b)?.value;
    let ba = difference(&b, &a)?.value;
    assert!(ab.bounding_box().min.x < -0.99);
    assert!(ba.bounding_box().max.x > 1.99);
    assert!((ab.signed_volume() - ba.signed_volume()).abs() < 1e-9);
    Ok(())
}

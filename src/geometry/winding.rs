// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Inside/outside classification by generalized winding number
//!
//! The winding number of a point is the solid angle subtended by the mesh divided by 4π.
//! It is 1 inside and 0 outside a closed, outward-facing mesh, and degrades gracefully for
//! meshes with small holes, which ray parity does not.

use super::Mesh;
use nalgebra::{Point3, Vector3};
use rayon::prelude::*;
use std::f64::consts::PI;

/// Meshes smaller than this are summed sequentially
const PARALLEL_THRESHOLD: usize = 4096;

/// Classification of a point or face fragment relative to a solid
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    /// Inside the other solid
    Inside,
    /// Outside the other solid
    Outside,
    /// On the boundary (within the sampling offset)
    OnBoundary,
}

/// Signed solid angle of triangle (a, b, c) seen from `p` (Van Oosterom–Strackee)
fn solid_angle(p: &Point3<f64>, a: &Point3<f64>, b: &Point3<f64>, c: &Point3<f64>) -> f64 {
    let a = a - p;
    let b = b - p;
    let c = c - p;
    let (la, lb, lc) = (a.norm(), b.norm(), c.norm());
    let numerator = a.dot(&b.cross(&c));
    if numerator == 0.0 {
        // p lies in the triangle's plane; count surface points as half-covered
        return 0.0;
    }
    let denominator = la * lb * lc + a.dot(&b) * lc + b.dot(&c) * la + c.dot(&a) * lb;
    2.0 * numerator.atan2(denominator)
}

/// Generalized winding number of `p` with respect to `mesh`
pub fn winding_number(mesh: &Mesh, p: &Point3<f64>) -> f64 {
    let face_angle = |f: usize| {
        let [a, b, c] = mesh.triangle_positions(f);
        solid_angle(p, &a, &b, &c)
    };
    let total: f64 = if mesh.triangle_count() >= PARALLEL_THRESHOLD {
        (0..mesh.triangle_count()).into_par_iter().map(face_angle).sum()
    } else {
        (0..mesh.triangle_count()).map(face_angle).sum()
    };
    total / (4.0 * PI)
}

pub fn is_inside(mesh: &Mesh, p: &Point3<f64>) -> bool {
    winding_number(mesh, p) > 0.5
}

/// Classify a surface sample with normal `normal`.
///
/// Samples are taken `offset` in front of and behind the surface; a fragment whose two
/// sides disagree lies on the other solid's boundary.
pub fn classify_sample(
    mesh: &Mesh,
    p: &Point3<f64>,
    normal: &Vector3<f64>,
    offset: f64,
) -> Classification {
    let center = winding_number(mesh, p);
    if (center - 0.5).abs() > 0.25 {
        return if center > 0.5 {
            Classification::Inside
        } else {
            Classification::Outside
        };
    }
    let front = is_inside(mesh, &(p + normal * offset));
    let back = is_inside(mesh, &(p - normal * offset));
    match (front, back) {
        (true, true) => Classification::Inside,
        (false, false) => Classification::Outside,
        _ => Classification::OnBoundary,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Primitive;

    #[test]
    fn test_winding_number_sphere() {
        let mesh = Primitive::sphere(5.0, 24).to_mesh();
        assert!((winding_number(&mesh, &Point3::origin()) - 1.0).abs() < 1e-6);
        assert!(winding_number(&mesh, &Point3::new(20.0, 0.0, 0.0)).abs() < 1e-6);
        assert!(is_inside(&mesh, &Point3::new(0.0, 0.0, 4.0)));
        assert!(!is_inside(&mesh, &Point3::new(0.0, 0.0, 6.0)));
    }

    #[test]
    fn test_flipped_mesh_is_negative() {
        let mut mesh = Primitive::cube(Vector3::new(2.0, 2.0, 2.0), true).to_mesh();
        mesh.flip_faces();
        assert!((winding_number(&mesh, &Point3::origin()) + 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_open_mesh_degrades_gracefully() {
        let mesh = Primitive::holed_sphere(5.0, 32, 1).to_mesh();
        let w = winding_number(&mesh, &Point3::new(0.0, 0.0, -3.0));
        assert!(w > 0.5 && w < 1.0);
    }

    #[test]
    fn test_classify_sample_on_boundary() {
        let mesh = Primitive::cube(Vector3::new(2.0, 2.0, 2.0), true).to_mesh();
        let on_face = Point3::new(0.1, 0.2, 1.0);
        let normal = Vector3::z();
        assert_eq!(
            classify_sample(&mesh, &on_face, &normal, 1e-4),
            Classification::OnBoundary
        );
        assert_eq!(
            classify_sample(&mesh, &Point3::new(0.0, 0.0, 3.0), &normal, 1e-4),
            Classification::Outside
        );
    }
}

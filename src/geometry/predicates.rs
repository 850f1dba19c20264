// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Robust geometric predicates
//!
//! Orientation tests evaluate the determinant in plain f64 first and only fall back to
//! compensated arithmetic when the result is within the rounding error bound.

use nalgebra::{Point2, Point3};

/// Relative error bound of the plain orient3d evaluation (Shewchuk's `o3derrboundA`)
const O3D_ERRBOUND: f64 = 7.771_561_172_376_103e-16;
/// Relative error bound of the plain orient2d evaluation (`ccwerrboundA`)
const O2D_ERRBOUND: f64 = 3.330_669_073_875_471_6e-16;

/// Side of an oriented plane
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaneSide {
    Front,
    Back,
    OnPlane,
}

/// Oriented volume of tetrahedron (a, b, c, d), six times its signed volume.
///
/// Positive when `d` lies on the side the normal `(b - a) x (c - a)` points to.
pub fn orient3d(a: &Point3<f64>, b: &Point3<f64>, c: &Point3<f64>, d: &Point3<f64>) -> f64 {
    let ab = b - a;
    let ac = c - a;
    let ad = d - a;

    let cx = ac.y * ad.z - ac.z * ad.y;
    let cy = ac.z * ad.x - ac.x * ad.z;
    let cz = ac.x * ad.y - ac.y * ad.x;
    let det = ab.x * cx + ab.y * cy + ab.z * cz;

    let permanent = ab.x.abs() * ((ac.y * ad.z).abs() + (ac.z * ad.y).abs())
        + ab.y.abs() * ((ac.z * ad.x).abs() + (ac.x * ad.z).abs())
        + ab.z.abs() * ((ac.x * ad.y).abs() + (ac.y * ad.x).abs());

    if det.abs() > O3D_ERRBOUND * permanent {
        return det;
    }

    let cx = diff_of_products(ac.y, ad.z, ac.z, ad.y);
    let cy = diff_of_products(ac.z, ad.x, ac.x, ad.z);
    let cz = diff_of_products(ac.x, ad.y, ac.y, ad.x);
    compensated_sum(&[
        two_product(ab.x, cx),
        two_product(ab.y, cy),
        two_product(ab.z, cz),
    ])
}

/// Twice the signed area of triangle (a, b, c); positive when counter-clockwise
pub fn orient2d(a: &Point2<f64>, b: &Point2<f64>, c: &Point2<f64>) -> f64 {
    let left = (a.x - c.x) * (b.y - c.y);
    let right = (a.y - c.y) * (b.x - c.x);
    let det = left - right;
    if det.abs() > O2D_ERRBOUND * (left.abs() + right.abs()) {
        return det;
    }
    diff_of_products(a.x - c.x, b.y - c.y, a.y - c.y, b.x - c.x)
}

/// Classify `p` against the plane through `a, b, c`, with an absolute tolerance
pub fn classify_point_plane(
    p: &Point3<f64>,
    a: &Point3<f64>,
    b: &Point3<f64>,
    c: &Point3<f64>,
    tolerance: f64,
) -> PlaneSide {
    let normal = (b - a).cross(&(c - a));
    let norm = normal.norm();
    if norm == 0.0 {
        return PlaneSide::OnPlane;
    }
    let distance = orient3d(a, b, c, p) / norm;
    if distance > tolerance {
        PlaneSide::Front
    } else if distance < -tolerance {
        PlaneSide::Back
    } else {
        PlaneSide::OnPlane
    }
}

/// `a * b` split into the rounded product and its exact rounding error
fn two_product(a: f64, b: f64) -> (f64, f64) {
    let p = a * b;
    (p, a.mul_add(b, -p))
}

/// `a * b - c * d` with the product rounding errors folded back in
fn diff_of_products(a: f64, b: f64, c: f64, d: f64) -> f64 {
    let cd = c * d;
    let err = c.mul_add(d, -cd);
    let dop = a.mul_add(b, -cd);
    dop - err
}

/// Kahan-Babuska summation of (value, error) pairs
fn compensated_sum(terms: &[(f64, f64)]) -> f64 {
    let mut sum = 0.0;
    let mut compensation = 0.0;
    for &(value, error) in terms {
        for term in [value, error] {
            let t = sum + term;
            if sum.abs() >= term.abs() {
                compensation += (sum - t) + term;
            } else {
                compensation += (term - t) + sum;
            }
            sum = t;
        }
    }
    sum + compensation
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_orient3d_sign() {
        let a = Point3::new(0.0, 0.0, 0.0);
        let b = Point3::new(1.0, 0.0, 0.0);
        let c = Point3::new(0.0, 1.0, 0.0);

        assert!(orient3d(&a, &b, &c, &Point3::new(0.0, 0.0, 1.0)) > 0.0);
        assert!(orient3d(&a, &b, &c, &Point3::new(0.0, 0.0, -1.0)) < 0.0);
        assert_eq!(orient3d(&a, &b, &c, &Point3::new(0.3, 0.3, 0.0)), 0.0);
    }

    #[test]
    fn test_orient3d_near_degenerate() {
        let a = Point3::new(0.1, 0.1, 0.1);
        let b = Point3::new(1.1, 0.1, 0.1);
        let c = Point3::new(0.1, 1.1, 0.1);
        let above = Point3::new(0.5, 0.5, 0.1 + 1e-12);
        let below = Point3::new(0.5, 0.5, 0.1 - 1e-12);
        assert!(orient3d(&a, &b, &c, &above) > 0.0);
        assert!(orient3d(&a, &b, &c, &below) < 0.0);
    }

    #[test]
    fn test_orient2d() {
        let a = Point2::new(0.0, 0.0);
        let b = Point2::new(1.0, 0.0);
        assert!(orient2d(&a, &b, &Point2::new(0.0, 1.0)) > 0.0);
        assert!(orient2d(&a, &b, &Point2::new(0.0, -1.0)) < 0.0);
        assert_eq!(orient2d(&a, &b, &Point2::new(2.0, 0.0)), 0.0);
    }

    #[test]
    fn test_classify_point_plane() {
        let a = Point3::new(0.0, 0.0, 0.0);
        let b = Point3::new(1.0, 0.0, 0.0);
        let c = Point3::new(0.0, 1.0, 0.0);
        let tol = 1e-9;
        assert_eq!(
            classify_point_plane(&Point3::new(0.0, 0.0, 2.0), &a, &b, &c, tol),
            PlaneSide::Front
        );
        assert_eq!(
            classify_point_plane(&Point3::new(0.0, 0.0, -2.0), &a, &b, &c, tol),
            PlaneSide::Back
        );
        assert_eq!(
            classify_point_plane(&Point3::new(5.0, 5.0, 0.0), &a, &b, &c, tol),
            PlaneSide::OnPlane
        );
    }
}

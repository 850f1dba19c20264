// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Geometric primitives generator
//!
//! All closed primitives share vertices between faces and are wound outward, so they are
//! manifold and watertight as generated. Spheres are Z-up.

use super::{Mesh, Triangle};
use nalgebra::{Point3, Vector3};
use std::f64::consts::PI;

/// Geometric primitives
#[derive(Debug, Clone)]
pub enum Primitive {
    Cube { size: Vector3<f64>, center: bool },
    Sphere { r: f64, segments: u32 },
    /// Upper half of a sphere, open along the equator
    Hemisphere { r: f64, segments: u32 },
    /// Sphere with the faces around the north pole removed
    HoledSphere { r: f64, segments: u32, hole_rings: u32 },
    Cylinder { h: f64, r: f64, segments: u32 },
}

impl Primitive {
    pub fn cube(size: Vector3<f64>, center: bool) -> Self {
        Self::Cube { size, center }
    }

    pub fn sphere(r: f64, segments: u32) -> Self {
        Self::Sphere {
            r,
            segments: segments.max(6),
        }
    }

    pub fn hemisphere(r: f64, segments: u32) -> Self {
        Self::Hemisphere {
            r,
            segments: segments.max(8),
        }
    }

    pub fn holed_sphere(r: f64, segments: u32, hole_rings: u32) -> Self {
        Self::HoledSphere {
            r,
            segments: segments.max(6),
            hole_rings: hole_rings.max(1),
        }
    }

    pub fn cylinder(h: f64, r: f64, segments: u32) -> Self {
        Self::Cylinder {
            h,
            r,
            segments: segments.max(3),
        }
    }

    pub fn to_mesh(&self) -> Mesh {
        let mut mesh = match self {
            Self::Cube { size, center } => generate_cube_mesh(*size, *center),
            Self::Sphere { r, segments } => {
                let rings = (*segments / 2).max(3);
                generate_sphere_band(*r, *segments, rings, 0, rings)
            }
            Self::Hemisphere { r, segments } => {
                // An even ring count puts a ring exactly on the equator
                let rings = ((*segments / 2).max(4) + 1) & !1;
                generate_sphere_band(*r, *segments, rings, 0, rings / 2)
            }
            Self::HoledSphere {
                r,
                segments,
                hole_rings,
            } => {
                let rings = (*segments / 2).max(3);
                let first = (*hole_rings).min(rings - 1);
                generate_sphere_band(*r, *segments, rings, first, rings)
            }
            Self::Cylinder { h, r, segments } => generate_cylinder_mesh(*h, *r, *segments),
        };
        mesh.remove_unreferenced_vertices();
        mesh.recompute_normals();
        mesh
    }
}

fn generate_cube_mesh(size: Vector3<f64>, center: bool) -> Mesh {
    let min = if center {
        Point3::from(-size / 2.0)
    } else {
        Point3::origin()
    };
    let max = min + size;

    let positions = vec![
        Point3::new(min.x, min.y, min.z),
        Point3::new(max.x, min.y, min.z),
        Point3::new(max.x, max.y, min.z),
        Point3::new(min.x, max.y, min.z),
        Point3::new(min.x, min.y, max.z),
        Point3::new(max.x, min.y, max.z),
        Point3::new(max.x, max.y, max.z),
        Point3::new(min.x, max.y, max.z),
    ];

    let faces = vec![
        // z+
        [4, 5, 6],
        [4, 6, 7],
        // z-
        [1, 0, 3],
        [1, 3, 2],
        // x+
        [5, 1, 2],
        [5, 2, 6],
        // x-
        [0, 4, 7],
        [0, 7, 3],
        // y+
        [7, 6, 2],
        [7, 2, 3],
        // y-
        [0, 1, 5],
        [0, 5, 4],
    ];

    Mesh::from_parts(positions, faces)
}

/// Faces of a UV sphere between latitude rings `first_band` and `last_band`.
///
/// Ring `i` sits at polar angle `PI * i / rings`; rings 0 and `rings` are the poles.
fn generate_sphere_band(
    radius: f64,
    slices: u32,
    rings: u32,
    first_band: u32,
    last_band: u32,
) -> Mesh {
    let slices = slices as usize;
    let rings = rings as usize;
    let mut mesh = Mesh::new();

    let north = mesh.add_point(Point3::new(0.0, 0.0, radius));
    let mut ring_start = Vec::with_capacity(rings);
    ring_start.push(north);
    for i in 1..rings {
        let phi = PI * i as f64 / rings as f64;
        let z = radius * phi.cos();
        let r = radius * phi.sin();
        ring_start.push(mesh.vertices.len());
        for j in 0..slices {
            let theta = 2.0 * PI * j as f64 / slices as f64;
            mesh.add_point(Point3::new(r * theta.cos(), r * theta.sin(), z));
        }
    }
    let south = mesh.add_point(Point3::new(0.0, 0.0, -radius));

    let ring = |i: usize, j: usize| ring_start[i] + j % slices;

    for band in first_band as usize..last_band as usize {
        for j in 0..slices {
            if band == 0 {
                mesh.add_triangle(Triangle::new([north, ring(1, j), ring(1, j + 1)]));
            } else if band == rings - 1 {
                mesh.add_triangle(Triangle::new([south, ring(band, j + 1), ring(band, j)]));
            } else {
                let a = ring(band, j);
                let b = ring(band, j + 1);
                let c = ring(band + 1, j);
                let d = ring(band + 1, j + 1);
                mesh.add_triangle(Triangle::new([a, c, d]));
                mesh.add_triangle(Triangle::new([a, d, b]));
            }
        }
    }

    mesh
}

fn generate_cylinder_mesh(height: f64, radius: f64, segments: u32) -> Mesh {
    let segments = segments as usize;
    let mut mesh = Mesh::new();

    let bottom_center = mesh.add_point(Point3::new(0.0, 0.0, 0.0));
    let top_center = mesh.add_point(Point3::new(0.0, 0.0, height));
    let bottom_start = mesh.vertices.len();
    for i in 0..segments {
        let theta = 2.0 * PI * i as f64 / segments as f64;
        mesh.add_point(Point3::new(radius * theta.cos(), radius * theta.sin(), 0.0));
    }
    let top_start = mesh.vertices.len();
    for i in 0..segments {
        let theta = 2.0 * PI * i as f64 / segments as f64;
        mesh.add_point(Point3::new(radius * theta.cos(), radius * theta.sin(), height));
    }

    for i in 0..segments {
        let next = (i + 1) % segments;
        let b0 = bottom_start + i;
        let b1 = bottom_start + next;
        let t0 = top_start + i;
        let t1 = top_start + next;

        mesh.add_triangle(Triangle::new([bottom_center, b1, b0]));
        mesh.add_triangle(Triangle::new([top_center, t0, t1]));
        mesh.add_triangle(Triangle::new([b0, b1, t1]));
        mesh.add_triangle(Triangle::new([b0, t1, t0]));
    }

    mesh
}

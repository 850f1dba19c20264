// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Ray-cast envelope

use super::{Envelope, EnvelopeExtractor, EnvelopeStrategy};
use crate::error::{ShellError, ShellResult, Stage};
use crate::geometry::{Axis, Mesh, Triangle};
use crate::repair::fill_inner_holes;
use crate::timing::OperationTimer;
use nalgebra::Point3;
use parry3d::math::{Point, Real, Vector};
use parry3d::query::{Ray, RayCast};
use parry3d::shape::TriMesh;
use rayon::prelude::*;
use tracing::info;

/// Height of the ray plane above the mesh, as a fraction of its extent along the axis
const PLANE_CLEARANCE: f64 = 0.01;

/// Strategy B: height field from a square grid of rays cast down the axis
#[derive(Debug, Clone, Copy)]
pub struct RayGrid {
    /// Rays per grid side
    pub resolution: usize,
}

fn to_trimesh(mesh: &Mesh) -> TriMesh {
    let vertices: Vec<Point<Real>> = mesh
        .vertices
        .iter()
        .map(|v| {
            let p = v.position.cast::<Real>();
            Point::new(p.x, p.y, p.z)
        })
        .collect();
    let indices: Vec<[u32; 3]> = mesh
        .triangles
        .iter()
        .map(|t| t.indices.map(|i| i as u32))
        .collect();
    TriMesh::new(vertices, indices)
}

impl EnvelopeExtractor for RayGrid {
    fn strategy(&self) -> EnvelopeStrategy {
        EnvelopeStrategy::RayCast
    }

    fn extract(&self, mesh: &Mesh, axis: Axis) -> ShellResult<Envelope> {
        if mesh.is_empty() {
            return Err(ShellError::degenerate(Stage::Envelope, "mesh has no faces"));
        }
        let n = self.resolution;
        if n < 2 {
            return Err(ShellError::degenerate(
                Stage::Envelope,
                format!("ray grid resolution {} is below 2", n),
            ));
        }
        let _timer = OperationTimer::new("ray_grid");

        let bbox = mesh.bounding_box();
        let (a, (u, v)) = (axis.index(), axis.others());
        let (ui, vi) = (u.index(), v.index());
        let extent = bbox.axis_extent(axis);
        let plane = bbox.max[a] + PLANE_CLEARANCE * extent;
        let max_toi = (plane - bbox.min[a]) * 1.01 + f64::EPSILON;
        let step_u = bbox.axis_extent(u) / (n - 1) as f64;
        let step_v = bbox.axis_extent(v) / (n - 1) as f64;

        let trimesh = to_trimesh(mesh);
        let direction = -axis.unit();
        let direction: Vector<Real> = Vector::new(
            direction.x as Real,
            direction.y as Real,
            direction.z as Real,
        );

        let grid_point = |index: usize| {
            let (i, j) = (index % n, index / n);
            let mut p = Point3::origin();
            p[ui] = bbox.min[ui] + i as f64 * step_u;
            p[vi] = bbox.min[vi] + j as f64 * step_v;
            p[a] = plane;
            p
        };

        let hits: Vec<Option<Point3<f64>>> = (0..n * n)
            .into_par_iter()
            .map(|index| {
                let origin = grid_point(index);
                let ray = Ray::new(
                    Point::new(origin.x as Real, origin.y as Real, origin.z as Real),
                    direction,
                );
                trimesh
                    .cast_local_ray(&ray, max_toi as Real, true)
                    .map(|toi| {
                        let mut hit = origin;
                        hit[a] = plane - toi as f64;
                        hit
                    })
            })
            .collect();

        let hit_count = hits.iter().flatten().count();
        if hit_count < 3 {
            return Err(ShellError::degenerate(
                Stage::Envelope,
                format!("only {} of {} rays hit the mesh, at least 3 are required", hit_count, n * n),
            ));
        }

        let mut surface = Mesh::with_capacity(hit_count, 2 * hit_count);
        let ids: Vec<Option<usize>> = hits
            .iter()
            .map(|hit| hit.map(|p| surface.add_point(p)))
            .collect();
        for j in 0..n - 1 {
            for i in 0..n - 1 {
                let corners = [
                    ids[i + n * j],
                    ids[i + 1 + n * j],
                    ids[i + 1 + n * (j + 1)],
                    ids[i + n * (j + 1)],
                ];
                // Counter-clockwise in (u, v), so faces point along +axis
                if let [Some(c0), Some(c1), Some(c2), Some(c3)] = corners {
                    surface.add_triangle(Triangle::new([c0, c1, c2]));
                    surface.add_triangle(Triangle::new([c0, c2, c3]));
                }
            }
        }
        if surface.triangles.is_empty() {
            return Err(ShellError::degenerate(
                Stage::Envelope,
                "no grid cell has all four corner rays hitting the mesh",
            ));
        }
        surface.remove_unreferenced_vertices();
        fill_inner_holes(&mut surface, (n * n) as f64);
        surface.recompute_normals();

        let level = surface
            .vertices
            .iter()
            .map(|v| v.position[a])
            .fold(f64::INFINITY, f64::min);
        let floor = bbox.min[a];
        if level - floor <= 0.0 {
            return Err(ShellError::degenerate(
                Stage::Envelope,
                "ray envelope reaches the floor of the mesh, extrusion depth is zero",
            ));
        }

        info!(
            axis = %axis,
            resolution = n,
            hits = hit_count,
            faces = surface.triangle_count(),
            "ray-cast envelope"
        );
        Ok(Envelope {
            strategy: EnvelopeStrategy::RayCast,
            axis,
            surface,
            level,
            floor,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::geometry::Primitive;
    use crate::integrity::boundary_loops;
    use nalgebra::Vector3;

    #[test]
    fn test_ray_grid_over_hemisphere() {
        let mesh = Primitive::hemisphere(5.0, 32).to_mesh();
        let envelope = RayGrid { resolution: 30 }.extract(&mesh, Axis::Z).unwrap();
        let top = envelope.surface.bounding_box().max.z;
        assert!((top - 5.0).abs() < 0.2);
        assert!(envelope.floor.abs() < 1e-9);
        assert!(!boundary_loops(&envelope.surface).is_empty());
        for f in 0..envelope.surface.triangle_count() {
            assert!(envelope.surface.face_normal(f).z > 0.0);
        }
    }

    #[test]
    fn test_ray_grid_along_x() {
        let mesh = Primitive::cube(Vector3::new(4.0, 2.0, 2.0), true).to_mesh();
        let envelope = RayGrid { resolution: 8 }.extract(&mesh, Axis::X).unwrap();
        assert!((envelope.level - 2.0).abs() < 1e-4);
        assert!((envelope.depth() - 4.0).abs() < 1e-4);
    }

    #[test]
    fn test_corner_grid_misses() {
        let mesh = Primitive::sphere(5.0, 16).to_mesh();
        let err = RayGrid { resolution: 2 }.extract(&mesh, Axis::Z).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::GeometryDegenerate);
    }
}

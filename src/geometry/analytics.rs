// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Size and topology summary of a mesh

use super::Mesh;
use crate::integrity;
use serde::{Deserialize, Serialize};

/// Measured quantities of a mesh, as reported by `helmshell check`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GeometryStats {
    /// Enclosed volume in cubic units (meaningful for closed meshes only)
    pub volume: f64,
    /// Total surface area in square units
    pub surface_area: f64,
    /// Bounding box [min_x, max_x, min_y, max_y, min_z, max_z]
    pub bounds: [f64; 6],
    /// Mean vertex position [x, y, z]
    pub centroid: [f64; 3],
    pub vertex_count: usize,
    pub triangle_count: usize,
    pub manifold: bool,
    pub watertight: bool,
    pub boundary_loops: usize,
}

/// Volume, area, bounds and topology of `mesh`; all zero for an empty mesh
pub fn analyze(mesh: &Mesh) -> GeometryStats {
    if mesh.is_empty() {
        return GeometryStats::default();
    }

    let report = integrity::check(mesh);
    let count = mesh.vertices.len() as f64;
    let sum = mesh
        .vertices
        .iter()
        .fold(nalgebra::Vector3::zeros(), |acc, v| acc + v.position.coords);

    GeometryStats {
        volume: mesh.volume(),
        surface_area: mesh.surface_area(),
        bounds: mesh.bounding_box().to_bounds(),
        centroid: [sum.x / count, sum.y / count, sum.z / count],
        vertex_count: mesh.vertex_count(),
        triangle_count: mesh.triangle_count(),
        manifold: report.manifold,
        watertight: report.watertight,
        boundary_loops: report.boundary_loops,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Primitive;
    use nalgebra::Vector3;

    #[test]
    fn test_analyze_cube() {
        let mesh = Primitive::cube(Vector3::new(10.0, 10.0, 10.0), true).to_mesh();
        let stats = analyze(&mesh);

        assert!((stats.volume - 1000.0).abs() < 1e-9);
        assert!((stats.surface_area - 600.0).abs() < 1e-9);
        assert_eq!(stats.vertex_count, 8);
        assert_eq!(stats.triangle_count, 12);
        assert!(stats.manifold && stats.watertight);

        assert!(stats.centroid.iter().all(|c| c.abs() < 1e-9));
    }

    #[test]
    fn test_analyze_sphere() {
        let mesh = Primitive::sphere(5.0, 32).to_mesh();
        let stats = analyze(&mesh);

        let expected_volume = 4.0 / 3.0 * std::f64::consts::PI * 5.0_f64.powi(3);
        let expected_area = 4.0 * std::f64::consts::PI * 5.0_f64.powi(2);

        assert!(
            (stats.volume - expected_volume).abs() < expected_volume * 0.05,
            "Volume {} not close to expected {}",
            stats.volume,
            expected_volume
        );
        assert!(
            (stats.surface_area - expected_area).abs() < expected_area * 0.05,
            "Surface area {} not close to expected {}",
            stats.surface_area,
            expected_area
        );
        assert!(stats.watertight);
    }

    #[test]
    fn test_empty_mesh_stats() {
        let stats = analyze(&Mesh::new());
        assert_eq!(stats.triangle_count, 0);
        assert!(!stats.watertight);
    }

    #[test]
    fn test_open_surface_stats() {
        let mesh = Primitive::hemisphere(5.0, 24).to_mesh();
        let stats = analyze(&mesh);
        assert!(stats.manifold);
        assert!(!stats.watertight);
        assert_eq!(stats.boundary_loops, 1);
    }
}

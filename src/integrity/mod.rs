// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Mesh integrity diagnostics
//!
//! Pure queries, recomputed from scratch on every call. A mesh is *manifold* when no edge
//! has more than two faces, faces sharing an edge traverse it in opposite directions, and
//! every vertex is surrounded by a single fan. Boundary edges are allowed. A mesh is
//! *watertight* when it has faces and no boundary edges.

mod batch;
mod edges;
mod loops;

pub use batch::{scan_directory, BatchReport, SUPPORTED_EXTENSIONS};
pub use edges::{non_manifold_vertex_count, Edge, EdgeMap, EdgeUse};
pub use loops::{boundary_loops, BoundaryLoop};

pub(crate) use edges::{find, union};

use crate::error::{QualityWarning, Stage};
use crate::geometry::Mesh;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Defect classes reported by [`check`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Defect {
    Empty,
    BoundaryEdges,
    NonManifoldEdges,
    InconsistentOrientation,
    NonManifoldVertices,
    DegenerateFaces,
}

impl fmt::Display for Defect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Defect::Empty => "empty mesh",
            Defect::BoundaryEdges => "open boundary",
            Defect::NonManifoldEdges => "non-manifold edges",
            Defect::InconsistentOrientation => "inconsistent face orientation",
            Defect::NonManifoldVertices => "non-manifold vertices",
            Defect::DegenerateFaces => "degenerate faces",
        };
        f.write_str(text)
    }
}

/// Full integrity report
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntegrityReport {
    pub manifold: bool,
    pub watertight: bool,
    pub vertex_count: usize,
    pub triangle_count: usize,
    pub edge_count: usize,
    pub boundary_edges: usize,
    pub boundary_loops: usize,
    pub non_manifold_edges: usize,
    pub inconsistent_edges: usize,
    pub non_manifold_vertices: usize,
    pub degenerate_faces: usize,
    pub defects: Vec<Defect>,
}

impl IntegrityReport {
    /// Turn a failing report into the warning attached to a stage's output
    pub fn warning(&self, stage: Stage) -> Option<QualityWarning> {
        if self.manifold && self.watertight {
            None
        } else {
            Some(QualityWarning {
                stage,
                manifold: self.manifold,
                watertight: self.watertight,
            })
        }
    }
}

/// True iff every edge has at most two consistently oriented faces and every vertex fan is single
pub fn is_manifold(mesh: &Mesh) -> bool {
    let edges = EdgeMap::build(mesh);
    manifold_from(&edges, mesh)
}

fn manifold_from(edges: &EdgeMap, mesh: &Mesh) -> bool {
    edges
        .iter()
        .all(|(_, u)| !u.is_non_manifold() && !u.is_inconsistent())
        && non_manifold_vertex_count(mesh) == 0
}

/// True iff the mesh has faces and extracting boundary edges yields nothing
pub fn is_watertight(mesh: &Mesh) -> bool {
    !mesh.triangles.is_empty() && EdgeMap::build(mesh).boundary_edge_count() == 0
}

/// Closed manifold: the precondition of volumetric and boolean operations
pub fn is_closed_manifold(mesh: &Mesh) -> bool {
    let edges = EdgeMap::build(mesh);
    !mesh.triangles.is_empty() && edges.boundary_edge_count() == 0 && manifold_from(&edges, mesh)
}

/// Run every diagnostic and classify the defects found
pub fn check(mesh: &Mesh) -> IntegrityReport {
    let edges = EdgeMap::build(mesh);
    let boundary_edges = edges.boundary_edge_count();
    let non_manifold_edges = edges.non_manifold_edge_count();
    let inconsistent_edges = edges.inconsistent_edge_count();
    let non_manifold_vertices = non_manifold_vertex_count(mesh);
    let degenerate_faces = (0..mesh.triangle_count())
        .filter(|&f| mesh.triangles[f].has_repeated_index() || mesh.face_area(f) == 0.0)
        .count();
    let loops = if boundary_edges > 0 {
        boundary_loops(mesh).len()
    } else {
        0
    };

    let mut defects = Vec::new();
    if mesh.triangles.is_empty() {
        defects.push(Defect::Empty);
    }
    if boundary_edges > 0 {
        defects.push(Defect::BoundaryEdges);
    }
    if non_manifold_edges > 0 {
        defects.push(Defect::NonManifoldEdges);
    }
    if inconsistent_edges > 0 {
        defects.push(Defect::InconsistentOrientation);
    }
    if non_manifold_vertices > 0 {
        defects.push(Defect::NonManifoldVertices);
    }
    if degenerate_faces > 0 {
        defects.push(Defect::DegenerateFaces);
    }

    IntegrityReport {
        manifold: non_manifold_edges == 0 && inconsistent_edges == 0 && non_manifold_vertices == 0,
        watertight: !mesh.triangles.is_empty() && boundary_edges == 0,
        vertex_count: mesh.vertex_count(),
        triangle_count: mesh.triangle_count(),
        edge_count: edges.len(),
        boundary_edges,
        boundary_loops: loops,
        non_manifold_edges,
        inconsistent_edges,
        non_manifold_vertices,
        degenerate_faces,
        defects,
    }
}

/// Quality warning for a stage output, if it is not a closed manifold
pub fn quality_warning(mesh: &Mesh, stage: Stage) -> Option<QualityWarning> {
    check(mesh).warning(stage)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{Primitive, Triangle};
    use nalgebra::Vector3;

    #[test]
    fn test_closed_cube() {
        let mesh = Primitive::cube(Vector3::new(1.0, 1.0, 1.0), false).to_mesh();
        let report = check(&mesh);
        assert!(report.manifold);
        assert!(report.watertight);
        assert!(report.defects.is_empty());
        assert!(report.warning(Stage::Repair).is_none());
    }

    #[test]
    fn test_open_hemisphere_is_manifold_not_watertight() {
        let mesh = Primitive::hemisphere(2.0, 16).to_mesh();
        let report = check(&mesh);
        assert!(report.manifold);
        assert!(!report.watertight);
        assert_eq!(report.boundary_loops, 1);
        assert_eq!(report.defects, vec![Defect::BoundaryEdges]);
        let warning = report.warning(Stage::Drape);
        assert_eq!(
            warning,
            Some(QualityWarning {
                stage: Stage::Drape,
                manifold: true,
                watertight: false
            })
        );
    }

    #[test]
    fn test_non_manifold_edge() {
        let mut mesh = Primitive::cube(Vector3::new(1.0, 1.0, 1.0), false).to_mesh();
        let extra = mesh.add_point(nalgebra::Point3::new(0.5, 0.5, 3.0));
        let [a, b, _] = mesh.triangles[0].indices;
        mesh.add_triangle(Triangle::new([a, b, extra]));
        let report = check(&mesh);
        assert!(!report.manifold);
        assert!(report.defects.contains(&Defect::NonManifoldEdges));
        assert!(!is_manifold(&mesh));
    }

    #[test]
    fn test_empty_mesh() {
        let report = check(&Mesh::new());
        assert!(!report.watertight);
        assert_eq!(report.defects, vec![Defect::Empty]);
    }
}

// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Mesh representation and utilities

use super::BoundingBox;
use crate::error::{ShellError, ShellResult};
use nalgebra::{Matrix4, Point3, Vector3};
use serde::{Deserialize, Serialize};

/// Vertex with position and normal
///
/// Normals are derived data: every operation that changes topology leaves them stale
/// until [`Mesh::recompute_normals`] runs.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Vertex {
    pub position: Point3<f64>,
    pub normal: Vector3<f64>,
}

impl Vertex {
    pub fn new(position: Point3<f64>, normal: Vector3<f64>) -> Self {
        Self { position, normal }
    }

    /// Vertex without a normal yet
    pub fn at(position: Point3<f64>) -> Self {
        Self {
            position,
            normal: Vector3::zeros(),
        }
    }

    pub fn transform(&mut self, matrix: &Matrix4<f64>) {
        self.position = matrix.transform_point(&self.position);
        // Inverse transpose for normals
        let normal_matrix = matrix
            .try_inverse()
            .map(|m| m.transpose())
            .unwrap_or(*matrix);
        self.normal = normal_matrix
            .transform_vector(&self.normal)
            .try_normalize(f64::EPSILON)
            .unwrap_or_else(Vector3::zeros);
    }
}

/// Triangle defined by three vertex indices
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Triangle {
    pub indices: [usize; 3],
}

impl Triangle {
    pub fn new(indices: [usize; 3]) -> Self {
        Self { indices }
    }

    /// Same triangle with reversed winding
    pub fn flipped(&self) -> Self {
        Self::new([self.indices[0], self.indices[2], self.indices[1]])
    }

    /// True when two corners share an index
    pub fn has_repeated_index(&self) -> bool {
        let [a, b, c] = self.indices;
        a == b || b == c || a == c
    }

    /// Directed edges in winding order
    pub fn edges(&self) -> [(usize, usize); 3] {
        let [a, b, c] = self.indices;
        [(a, b), (b, c), (c, a)]
    }
}

/// Triangular mesh
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Mesh {
    pub vertices: Vec<Vertex>,
    pub triangles: Vec<Triangle>,
}

impl Mesh {
    pub fn new() -> Self {
        Self {
            vertices: Vec::new(),
            triangles: Vec::new(),
        }
    }

    pub fn empty() -> Self {
        Self::new()
    }

    pub fn with_capacity(vertex_count: usize, triangle_count: usize) -> Self {
        Self {
            vertices: Vec::with_capacity(vertex_count),
            triangles: Vec::with_capacity(triangle_count),
        }
    }

    /// Build from raw positions and index triples, computing normals
    pub fn from_parts(points: Vec<Point3<f64>>, faces: Vec<[usize; 3]>) -> Self {
        let mut mesh = Self {
            vertices: points.into_iter().map(Vertex::at).collect(),
            triangles: faces.into_iter().map(Triangle::new).collect(),
        };
        mesh.recompute_normals();
        mesh
    }

    /// Add a vertex and return its index
    pub fn add_vertex(&mut self, vertex: Vertex) -> usize {
        let index = self.vertices.len();
        self.vertices.push(vertex);
        index
    }

    /// Add a bare position and return its index
    pub fn add_point(&mut self, position: Point3<f64>) -> usize {
        self.add_vertex(Vertex::at(position))
    }

    /// Add a triangle
    pub fn add_triangle(&mut self, triangle: Triangle) {
        self.triangles.push(triangle);
    }

    /// Transform all vertices by a matrix
    pub fn transform(&mut self, matrix: &Matrix4<f64>) {
        for vertex in &mut self.vertices {
            vertex.transform(matrix);
        }
    }

    pub fn translate(&mut self, offset: &Vector3<f64>) {
        for vertex in &mut self.vertices {
            vertex.position += offset;
        }
    }

    /// Compute bounding box
    pub fn bounding_box(&self) -> BoundingBox {
        BoundingBox::from_points(self.vertices.iter().map(|v| &v.position))
    }

    /// Bounding box diagonal, the mesh's characteristic length
    pub fn length(&self) -> f64 {
        self.bounding_box().diagonal()
    }

    /// Center of the bounding box
    pub fn center(&self) -> Point3<f64> {
        self.bounding_box().center()
    }

    /// Get vertex count
    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    /// Get triangle count
    pub fn triangle_count(&self) -> usize {
        self.triangles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.triangles.is_empty()
    }

    pub fn position(&self, index: usize) -> Point3<f64> {
        self.vertices[index].position
    }

    pub fn triangle_positions(&self, face: usize) -> [Point3<f64>; 3] {
        let [a, b, c] = self.triangles[face].indices;
        [
            self.vertices[a].position,
            self.vertices[b].position,
            self.vertices[c].position,
        ]
    }

    /// Unnormalized face normal, its length is twice the face area
    pub fn face_cross(&self, face: usize) -> Vector3<f64> {
        let [p0, p1, p2] = self.triangle_positions(face);
        (p1 - p0).cross(&(p2 - p0))
    }

    /// Unit face normal, zero for degenerate faces
    pub fn face_normal(&self, face: usize) -> Vector3<f64> {
        self.face_cross(face)
            .try_normalize(f64::MIN_POSITIVE)
            .unwrap_or_else(Vector3::zeros)
    }

    pub fn face_area(&self, face: usize) -> f64 {
        0.5 * self.face_cross(face).norm()
    }

    pub fn face_centroid(&self, face: usize) -> Point3<f64> {
        let [p0, p1, p2] = self.triangle_positions(face);
        Point3::from((p0.coords + p1.coords + p2.coords) / 3.0)
    }

    pub fn face_bounding_box(&self, face: usize) -> BoundingBox {
        let positions = self.triangle_positions(face);
        BoundingBox::from_points(positions.iter())
    }

    /// Signed enclosed volume (divergence theorem); positive for outward-facing closed meshes
    pub fn signed_volume(&self) -> f64 {
        self.signed_volume_of(0..self.triangles.len())
    }

    /// Signed volume contributed by a subset of faces
    pub fn signed_volume_of(&self, faces: impl IntoIterator<Item = usize>) -> f64 {
        faces
            .into_iter()
            .map(|f| {
                let [p0, p1, p2] = self.triangle_positions(f);
                p0.coords.dot(&p1.coords.cross(&p2.coords)) / 6.0
            })
            .sum()
    }

    /// Absolute enclosed volume
    pub fn volume(&self) -> f64 {
        self.signed_volume().abs()
    }

    pub fn surface_area(&self) -> f64 {
        (0..self.triangles.len()).map(|f| self.face_area(f)).sum()
    }

    /// Merge with another mesh (concatenation, no CSG)
    pub fn merge(&mut self, other: &Mesh) {
        let offset = self.vertices.len();
        self.vertices.extend_from_slice(&other.vertices);

        for triangle in &other.triangles {
            self.triangles.push(Triangle::new([
                triangle.indices[0] + offset,
                triangle.indices[1] + offset,
                triangle.indices[2] + offset,
            ]));
        }
    }

    /// Reverse the winding of every face
    pub fn flip_faces(&mut self) {
        for triangle in &mut self.triangles {
            *triangle = triangle.flipped();
        }
        for vertex in &mut self.vertices {
            vertex.normal = -vertex.normal;
        }
    }

    /// Area-weighted vertex normals
    pub fn recompute_normals(&mut self) {
        let mut normals = vec![Vector3::zeros(); self.vertices.len()];
        for (face, triangle) in self.triangles.iter().enumerate() {
            let cross = self.face_cross(face);
            for &i in &triangle.indices {
                normals[i] += cross;
            }
        }
        for (vertex, normal) in self.vertices.iter_mut().zip(normals) {
            vertex.normal = normal
                .try_normalize(f64::MIN_POSITIVE)
                .unwrap_or_else(|| Vector3::new(0.0, 0.0, 1.0));
        }
    }

    /// Drop vertices no face refers to, returning how many were removed
    /// Surviving vertices keep their relative order.
    pub fn remove_unreferenced_vertices(&mut self) -> usize {
        let mut used = vec![false; self.vertices.len()];
        for triangle in &self.triangles {
            for &index in &triangle.indices {
                used[index] = true;
            }
        }
        let mut remap = vec![usize::MAX; self.vertices.len()];
        let mut kept = Vec::with_capacity(self.vertices.len());
        for (index, vertex) in self.vertices.iter().enumerate() {
            if used[index] {
                remap[index] = kept.len();
                kept.push(*vertex);
            }
        }
        let removed = self.vertices.len() - kept.len();
        if removed == 0 {
            return 0;
        }
        for triangle in &mut self.triangles {
            for index in &mut triangle.indices {
                *index = remap[*index];
            }
        }
        self.vertices = kept;
        removed
    }

    /// New mesh made of the given faces, with compacted vertices
    pub fn submesh(&self, faces: &[usize]) -> Mesh {
        let mut mesh = Mesh::with_capacity(faces.len(), faces.len());
        let mut remap = vec![usize::MAX; self.vertices.len()];
        for &face in faces {
            let mut indices = [0; 3];
            for (slot, &index) in indices.iter_mut().zip(&self.triangles[face].indices) {
                if remap[index] == usize::MAX {
                    remap[index] = mesh.add_vertex(self.vertices[index]);
                }
                *slot = remap[index];
            }
            mesh.add_triangle(Triangle::new(indices));
        }
        mesh
    }

    /// Reject meshes whose faces point past the vertex array or contain non-finite points
    pub fn validate(&self) -> ShellResult<()> {
        if self.triangles.is_empty() || self.vertices.is_empty() {
            return Err(ShellError::input("mesh has no faces"));
        }
        let n = self.vertices.len();
        if let Some(t) = self
            .triangles
            .iter()
            .find(|t| t.indices.iter().any(|&i| i >= n))
        {
            return Err(ShellError::input(format!(
                "face {:?} references a vertex outside 0..{}",
                t.indices, n
            )));
        }
        if self
            .vertices
            .iter()
            .any(|v| !v.position.coords.iter().all(|c| c.is_finite()))
        {
            return Err(ShellError::input("mesh contains non-finite coordinates"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Primitive;
    use approx::assert_relative_eq;

    #[test]
    fn test_cube_volume_and_area() {
        let mesh = Primitive::cube(Vector3::new(2.0, 3.0, 4.0), false).to_mesh();
        assert_relative_eq!(mesh.signed_volume(), 24.0, epsilon = 1e-9);
        assert_relative_eq!(mesh.surface_area(), 52.0, epsilon = 1e-9);
        assert_eq!(mesh.vertex_count(), 8);
        assert_eq!(mesh.triangle_count(), 12);
    }

    #[test]
    fn test_flip_negates_volume() {
        let mut mesh = Primitive::cube(Vector3::new(1.0, 1.0, 1.0), true).to_mesh();
        mesh.flip_faces();
        assert_relative_eq!(mesh.signed_volume(), -1.0, epsilon = 1e-9);
    }

    #[test]
    fn test_merge_offsets_indices() {
        let a = Primitive::cube(Vector3::new(1.0, 1.0, 1.0), false).to_mesh();
        let mut merged = a.clone();
        merged.merge(&a);
        assert_eq!(merged.vertex_count(), 16);
        assert_eq!(merged.triangle_count(), 24);
        assert!(merged.triangles[12..]
            .iter()
            .all(|t| t.indices.iter().all(|&i| i >= 8)));
    }

    #[test]
    fn test_submesh_and_unreferenced() {
        let mut mesh = Primitive::cube(Vector3::new(1.0, 1.0, 1.0), false).to_mesh();
        let part = mesh.submesh(&[0, 1]);
        assert_eq!(part.triangle_count(), 2);
        assert_eq!(part.vertex_count(), 4);

        mesh.add_point(Point3::new(5.0, 5.0, 5.0));
        assert_eq!(mesh.remove_unreferenced_vertices(), 1);
        assert_eq!(mesh.vertex_count(), 8);
    }

    #[test]
    fn test_validate_rejects_bad_indices() {
        let mesh = Mesh {
            vertices: vec![Vertex::at(Point3::origin()), Vertex::at(Point3::new(1.0, 0.0, 0.0))],
            triangles: vec![Triangle::new([0, 1, 2])],
        };
        assert!(mesh.validate().is_err());
        assert!(Mesh::new().validate().is_err());
    }

    #[test]
    fn test_recompute_normals_points_outward() {
        let mut mesh = Primitive::sphere(3.0, 16).to_mesh();
        mesh.recompute_normals();
        for v in &mesh.vertices {
            assert!(v.normal.dot(&v.position.coords) > 0.0);
        }
    }
}

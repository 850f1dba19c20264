// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Connected component analysis

use crate::geometry::Mesh;
use crate::integrity::{find, union};
use ahash::AHashMap;
use tracing::debug;

/// Faces of every connected component (faces sharing a point are connected), largest first.
///
/// Ties are broken by the lowest face index so the order is deterministic.
pub fn connected_components(mesh: &Mesh) -> Vec<Vec<usize>> {
    let mut parent: Vec<usize> = (0..mesh.vertices.len()).collect();
    for triangle in &mesh.triangles {
        let [a, b, c] = triangle.indices;
        union(&mut parent, a, b);
        union(&mut parent, b, c);
    }

    let mut by_root: AHashMap<usize, Vec<usize>> = AHashMap::new();
    for (face, triangle) in mesh.triangles.iter().enumerate() {
        let root = find(&mut parent, triangle.indices[0]);
        by_root.entry(root).or_default().push(face);
    }

    let mut components: Vec<Vec<usize>> = by_root.into_values().collect();
    components.sort_by(|a, b| b.len().cmp(&a.len()).then(a[0].cmp(&b[0])));
    components
}

/// Keep only the component with the most faces
pub fn extract_largest_component(mesh: &Mesh) -> Mesh {
    let components = connected_components(mesh);
    match components.first() {
        Some(largest) if components.len() > 1 => {
            debug!(
                components = components.len(),
                kept_faces = largest.len(),
                "extracting largest component"
            );
            let mut faces = largest.clone();
            faces.sort_unstable();
            let mut out = mesh.submesh(&faces);
            out.recompute_normals();
            out
        }
        Some(_) => mesh.clone(),
        None => Mesh::new(),
    }
}

/// Drop every component smaller than `ratio` times the largest one.
///
/// A ratio of zero (or less) returns the input unchanged.
pub fn remove_small_components(mesh: &Mesh, ratio: f64) -> Mesh {
    if ratio <= 0.0 {
        return mesh.clone();
    }
    let components = connected_components(mesh);
    let Some(largest) = components.first().map(Vec::len) else {
        return mesh.clone();
    };
    let min_size = ratio * largest as f64;

    let mut faces: Vec<usize> = components
        .iter()
        .filter(|c| c.len() as f64 >= min_size)
        .flatten()
        .copied()
        .collect();
    if faces.len() == mesh.triangle_count() {
        return mesh.clone();
    }
    faces.sort_unstable();
    debug!(
        removed_faces = mesh.triangle_count() - faces.len(),
        ratio, "removed small components"
    );
    let mut out = mesh.submesh(&faces);
    out.recompute_normals();
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Primitive;
    use nalgebra::Vector3;

    fn three_spheres() -> Mesh {
        let mut mesh = Mesh::new();
        for (i, segments) in [12u32, 24, 36].into_iter().enumerate() {
            let mut sphere = Primitive::sphere(1.0 + i as f64, segments).to_mesh();
            sphere.translate(&Vector3::new(10.0 * i as f64, 0.0, 0.0));
            mesh.merge(&sphere);
        }
        mesh
    }

    #[test]
    fn test_components_sorted_by_size() {
        let mesh = three_spheres();
        let components = connected_components(&mesh);
        assert_eq!(components.len(), 3);
        assert!(components[0].len() > components[1].len());
        assert!(components[1].len() > components[2].len());
    }

    #[test]
    fn test_remove_small_components_bounds() {
        let mesh = three_spheres();
        let largest = connected_components(&mesh)[0].len();

        let unchanged = remove_small_components(&mesh, 0.0);
        assert_eq!(unchanged.triangle_count(), mesh.triangle_count());

        let only_largest = remove_small_components(&mesh, 1.0);
        assert_eq!(only_largest.triangle_count(), largest);
        assert_eq!(connected_components(&only_largest).len(), 1);
    }

    #[test]
    fn test_extract_largest() {
        let mesh = three_spheres();
        let largest = extract_largest_component(&mesh);
        assert_eq!(connected_components(&largest).len(), 1);
        // The 36-segment sphere sits at x = 20
        assert!(largest.bounding_box().center().x > 15.0);
    }
}

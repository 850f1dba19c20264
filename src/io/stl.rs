// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! STL via `stl_io` (ASCII and binary in, binary out)

use super::invalid;
use crate::error::ShellResult;
use crate::geometry::{Mesh, Triangle, Vertex};
use crate::repair::weld_vertices;
use nalgebra::Point3;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

/// Read an STL file. Coincident corners are welded so faces share vertices.
pub fn read_stl(path: impl AsRef<Path>) -> ShellResult<Mesh> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|e| invalid(path, e))?;
    let mut reader = BufReader::new(file);
    let stl = stl_io::read_stl(&mut reader).map_err(|e| invalid(path, e))?;

    let mut mesh = Mesh::with_capacity(stl.vertices.len(), stl.faces.len());
    for v in &stl.vertices {
        mesh.add_vertex(Vertex::at(Point3::new(
            f64::from(v[0]),
            f64::from(v[1]),
            f64::from(v[2]),
        )));
    }
    for face in &stl.faces {
        if face.vertices.iter().any(|&i| i >= stl.vertices.len()) {
            return Err(invalid(path, "face references a missing vertex"));
        }
        mesh.add_triangle(Triangle::new(face.vertices));
    }
    weld_vertices(&mut mesh, 0.0);
    mesh.remove_unreferenced_vertices();
    mesh.recompute_normals();
    Ok(mesh)
}

/// Write a binary STL file with per-face normals computed from the geometry
pub fn write_stl(mesh: &Mesh, path: impl AsRef<Path>) -> ShellResult<()> {
    let path = path.as_ref();
    let file = File::create(path).map_err(|e| invalid(path, e))?;
    let mut writer = BufWriter::new(file);

    let to_f32 = |p: Point3<f64>| [p.x as f32, p.y as f32, p.z as f32];
    let triangles: Vec<stl_io::Triangle> = (0..mesh.triangle_count())
        .map(|f| {
            let n = mesh.face_normal(f);
            let [a, b, c] = mesh.triangle_positions(f);
            stl_io::Triangle {
                normal: stl_io::Normal::new([n.x as f32, n.y as f32, n.z as f32]),
                vertices: [
                    stl_io::Vertex::new(to_f32(a)),
                    stl_io::Vertex::new(to_f32(b)),
                    stl_io::Vertex::new(to_f32(c)),
                ],
            }
        })
        .collect();
    stl_io::write_stl(&mut writer, triangles.iter()).map_err(|e| invalid(path, e))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Primitive;
    use crate::integrity::is_watertight;
    use std::io::Write;

    #[test]
    fn test_stl_roundtrip_keeps_topology() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("sphere.stl");
        let sphere = Primitive::sphere(5.0, 16).to_mesh();
        write_stl(&sphere, &path)?;

        let back = read_stl(&path)?;
        assert_eq!(back.triangle_count(), sphere.triangle_count());
        assert_eq!(back.vertex_count(), sphere.vertex_count());
        assert!(is_watertight(&back));
        assert!((back.volume() - sphere.volume()).abs() / sphere.volume() < 1e-5);
        Ok(())
    }

    #[test]
    fn test_read_ascii_stl() -> anyhow::Result<()> {
        let mut file = tempfile::Builder::new().suffix(".stl").tempfile()?;
        writeln!(
            file,
            "solid t\nfacet normal 0 0 1\nouter loop\nvertex 0 0 0\nvertex 1 0 0\nvertex 0 1 0\n\
             endloop\nendfacet\nendsolid t"
        )?;
        let mesh = read_stl(file.path())?;
        assert_eq!(mesh.triangle_count(), 1);
        assert_eq!(mesh.vertex_count(), 3);
        Ok(())
    }

    #[test]
    fn test_garbage_is_rejected() -> anyhow::Result<()> {
        let mut file = tempfile::Builder::new().suffix(".stl").tempfile()?;
        write!(file, "not a mesh")?;
        assert!(read_stl(file.path()).is_err());
        Ok(())
    }
}

// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! PLY via `ply-rs`. Polygons are fan-triangulated on read; output is ASCII.

use super::invalid;
use crate::error::ShellResult;
use crate::geometry::{Mesh, Triangle, Vertex};
use nalgebra::Point3;
use ply_rs::parser::Parser;
use ply_rs::ply::{
    Addable, DefaultElement, ElementDef, Encoding, Ply, Property, PropertyDef, PropertyType,
    ScalarType,
};
use ply_rs::writer::Writer;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

pub fn read_ply(path: impl AsRef<Path>) -> ShellResult<Mesh> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|e| invalid(path, e))?;
    let mut reader = BufReader::new(file);
    let parser = Parser::<DefaultElement>::new();
    let header = parser
        .read_header(&mut reader)
        .map_err(|e| invalid(path, format!("bad PLY header: {}", e)))?;
    let payload = parser
        .read_payload(&mut reader, &header)
        .map_err(|e| invalid(path, format!("bad PLY payload: {}", e)))?;

    let mut mesh = Mesh::new();
    for element in payload.get("vertex").into_iter().flatten() {
        let coord = |key: &str| {
            scalar(element, key).ok_or_else(|| invalid(path, format!("vertex without {}", key)))
        };
        mesh.add_vertex(Vertex::at(Point3::new(coord("x")?, coord("y")?, coord("z")?)));
    }
    for element in payload.get("face").into_iter().flatten() {
        let indices = index_list(element)
            .ok_or_else(|| invalid(path, "face references a missing vertex"))?;
        if indices.iter().any(|&i| i >= mesh.vertex_count()) {
            return Err(invalid(path, "face references a missing vertex"));
        }
        for i in 1..indices.len().saturating_sub(1) {
            mesh.add_triangle(Triangle::new([indices[0], indices[i], indices[i + 1]]));
        }
    }
    mesh.recompute_normals();
    Ok(mesh)
}

fn scalar(element: &DefaultElement, key: &str) -> Option<f64> {
    match element.get(key)? {
        Property::Float(v) => Some(f64::from(*v)),
        Property::Double(v) => Some(*v),
        Property::Int(v) => Some(f64::from(*v)),
        Property::UInt(v) => Some(f64::from(*v)),
        Property::Short(v) => Some(f64::from(*v)),
        Property::UShort(v) => Some(f64::from(*v)),
        _ => None,
    }
}

/// Face corner indices, `None` when one is negative
fn index_list(element: &DefaultElement) -> Option<Vec<usize>> {
    fn indices<T: Copy>(v: &[T]) -> Option<Vec<usize>>
    where
        usize: TryFrom<T>,
    {
        v.iter().map(|&i| usize::try_from(i).ok()).collect()
    }
    for key in ["vertex_indices", "vertex_index"] {
        let Some(property) = element.get(key) else {
            continue;
        };
        return match property {
            Property::ListInt(v) => indices(v),
            Property::ListUInt(v) => indices(v),
            Property::ListShort(v) => indices(v),
            Property::ListUShort(v) => indices(v),
            Property::ListChar(v) => indices(v),
            Property::ListUChar(v) => indices(v),
            _ => continue,
        };
    }
    Some(Vec::new())
}

/// Write an ASCII PLY file with double-precision coordinates
pub fn write_ply(mesh: &Mesh, path: impl AsRef<Path>) -> ShellResult<()> {
    let path = path.as_ref();
    let mut ply = Ply::<DefaultElement>::new();
    ply.header.encoding = Encoding::Ascii;
    ply.header.comments.push("written by helmshell".to_string());

    let mut vertex_def = ElementDef::new("vertex".to_string());
    for key in ["x", "y", "z"] {
        vertex_def.properties.add(PropertyDef::new(
            key.to_string(),
            PropertyType::Scalar(ScalarType::Double),
        ));
    }
    vertex_def.count = mesh.vertex_count();
    ply.header.elements.add(vertex_def);

    let mut face_def = ElementDef::new("face".to_string());
    face_def.properties.add(PropertyDef::new(
        "vertex_indices".to_string(),
        PropertyType::List(ScalarType::UChar, ScalarType::UInt),
    ));
    face_def.count = mesh.triangle_count();
    ply.header.elements.add(face_def);

    let vertices = mesh
        .vertices
        .iter()
        .map(|v| {
            let mut element = DefaultElement::new();
            element.insert("x".to_string(), Property::Double(v.position.x));
            element.insert("y".to_string(), Property::Double(v.position.y));
            element.insert("z".to_string(), Property::Double(v.position.z));
            element
        })
        .collect();
    ply.payload.insert("vertex".to_string(), vertices);

    let faces = mesh
        .triangles
        .iter()
        .map(|t| {
            let mut element = DefaultElement::new();
            let indices = t.indices.iter().map(|&i| i as u32).collect();
            element.insert("vertex_indices".to_string(), Property::ListUInt(indices));
            element
        })
        .collect();
    ply.payload.insert("face".to_string(), faces);

    let file = File::create(path).map_err(|e| invalid(path, e))?;
    let mut writer = BufWriter::new(file);
    Writer::new()
        .write_ply(&mut writer, &mut ply)
        .map_err(|e| invalid(path, format!("cannot write PLY: {}", e)))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_quads_are_fan_triangulated() -> anyhow::Result<()> {
        let mut file = tempfile::Builder::new().suffix(".ply").tempfile()?;
        write!(
            file,
            "ply\nformat ascii 1.0\nelement vertex 5\nproperty float x\nproperty float y\n\
             property float z\nelement face 2\nproperty list uchar int vertex_indices\n\
             end_header\n0 0 0\n1 0 0\n1 1 0\n0 1 0\n0.5 2 0\n4 0 1 2 3\n3 3 2 4\n"
        )?;
        let mesh = read_ply(file.path())?;
        assert_eq!(mesh.vertex_count(), 5);
        assert_eq!(mesh.triangle_count(), 3);
        assert_eq!(mesh.triangles[1].indices, [0, 2, 3]);
        Ok(())
    }

    #[test]
    fn test_ply_keeps_double_precision() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("tri.ply");
        let mesh = Mesh::from_parts(
            vec![
                Point3::new(0.1, 0.2, 0.3),
                Point3::new(1.000000001, 0.0, 0.0),
                Point3::new(0.0, 1.0, 0.0),
            ],
            vec![[0, 1, 2]],
        );
        write_ply(&mesh, &path)?;
        let back = read_ply(&path)?;
        assert!((back.vertices[1].position.x - 1.000000001).abs() < 1e-12);
        assert_eq!(back.triangles[0].indices, [0, 1, 2]);
        Ok(())
    }

    #[test]
    fn test_out_of_range_index_is_rejected() -> anyhow::Result<()> {
        let mut file = tempfile::Builder::new().suffix(".ply").tempfile()?;
        write!(
            file,
            "ply\nformat ascii 1.0\nelement vertex 3\nproperty float x\nproperty float y\n\
             property float z\nelement face 1\nproperty list uchar int vertex_indices\n\
             end_header\n0 0 0\n1 0 0\n0 1 0\n3 0 1 7\n"
        )?;
        assert!(read_ply(file.path()).is_err());
        Ok(())
    }

    #[test]
    fn test_negative_index_is_rejected() -> anyhow::Result<()> {
        let mut file = tempfile::Builder::new().suffix(".ply").tempfile()?;
        write!(
            file,
            "ply\nformat ascii 1.0\nelement vertex 3\nproperty float x\nproperty float y\n\
             property float z\nelement face 1\nproperty list uchar int vertex_indices\n\
             end_header\n0 0 0\n1 0 0\n0 1 0\n3 0 1 -1\n"
        )?;
        let err = read_ply(file.path()).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::InputInvalid);
        assert!(err.to_string().contains("missing vertex"));
        Ok(())
    }

    #[test]
    fn test_ushort_indices() -> anyhow::Result<()> {
        let mut file = tempfile::Builder::new().suffix(".ply").tempfile()?;
        write!(
            file,
            "ply\nformat ascii 1.0\nelement vertex 3\nproperty float x\nproperty float y\n\
             property float z\nelement face 1\nproperty list uchar ushort vertex_indices\n\
             end_header\n0 0 0\n1 0 0\n0 1 0\n3 0 1 2\n"
        )?;
        let mesh = read_ply(file.path())?;
        assert_eq!(mesh.triangles[0].indices, [0, 1, 2]);
        Ok(())
    }
}

// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Reading and writing STL and PLY through the extension dispatch

use anyhow::Result;
use helmshell::geometry::Primitive;
use helmshell::integrity::check;
use helmshell::io::{read_mesh, write_mesh, MeshFormat};
use helmshell::ErrorKind;

#[test]
fn test_roundtrip_both_formats() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let sphere = Primitive::sphere(12.5, 24).to_mesh();

    for (name, format) in [("head.stl", MeshFormat::Stl), ("head.PLY", MeshFormat::Ply)] {
        let path = dir.path().join(name);
        write_mesh(&sphere, &path)?;
        let size = std::fs::metadata(&path)?.len();
        let back = read_mesh(&path)?;
        let report = check(&back);
        println!(
            "{}: {} bytes, {} vertices, {} faces",
            name, size, report.vertex_count, report.triangle_count
        );

        assert_eq!(MeshFormat::from_path(&path), Some(format));
        assert_eq!(report.triangle_count, sphere.triangle_count());
        assert_eq!(report.vertex_count, sphere.vertex_count());
        assert!(report.manifold && report.watertight);
        assert!((back.volume() - sphere.volume()).abs() / sphere.volume() < 1e-5);
    }
    Ok(())
}

#[test]
fn test_unsupported_and_missing_files_are_input_errors() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let obj = dir.path().join("head.obj");
    std::fs::write(&obj, "v 0 0 0\n")?;

    let err = read_mesh(&obj).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InputInvalid);
    assert!(err.to_string().contains("head.obj"));

    let err = read_mesh(dir.path().join("missing.stl")).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InputInvalid);
    Ok(())
}

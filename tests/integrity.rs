// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Integrity diagnostics on primitives and on a scanned directory

use anyhow::Result;
use helmshell::geometry::Primitive;
use helmshell::integrity::{check, is_manifold, is_watertight, scan_directory, Defect};
use helmshell::io::{write_ply, write_stl};
use nalgebra::Vector3;

#[test]
fn test_closed_primitives_are_clean() -> Result<()> {
    for (name, mesh) in [
        ("cube", Primitive::cube(Vector3::new(10.0, 10.0, 10.0), true).to_mesh()),
        ("sphere", Primitive::sphere(5.0, 24).to_mesh()),
        ("cylinder", Primitive::cylinder(8.0, 3.0, 20).to_mesh()),
    ] {
        let report = check(&mesh);
        println!(
            "{}: {} faces, manifold={} watertight={}",
            name, report.triangle_count, report.manifold, report.watertight
        );
        assert!(report.manifold, "{} should be manifold", name);
        assert!(report.watertight, "{} should be watertight", name);
        assert!(report.defects.is_empty());
    }
    Ok(())
}

#[test]
fn test_holed_sphere_has_one_boundary_loop() -> Result<()> {
    let mesh = Primitive::holed_sphere(10.0, 32, 2).to_mesh();
    let report = check(&mesh);
    println!("holed sphere: {} boundary edges", report.boundary_edges);

    assert!(report.manifold);
    assert!(!report.watertight);
    assert_eq!(report.boundary_loops, 1);
    assert!(report.defects.contains(&Defect::BoundaryEdges));
    Ok(())
}

#[test]
fn test_flipped_face_breaks_manifoldness() -> Result<()> {
    let mut mesh = Primitive::cube(Vector3::new(2.0, 2.0, 2.0), true).to_mesh();
    mesh.triangles[0] = mesh.triangles[0].flipped();

    assert!(is_watertight(&mesh));
    assert!(!is_manifold(&mesh));
    let report = check(&mesh);
    assert!(report.inconsistent_edges >= 3);
    assert!(report.defects.contains(&Defect::InconsistentOrientation));
    Ok(())
}

#[test]
fn test_scan_directory_buckets_files() -> Result<()> {
    let dir = tempfile::tempdir()?;
    write_stl(
        &Primitive::cube(Vector3::new(1.0, 1.0, 1.0), false).to_mesh(),
        dir.path().join("closed.stl"),
    )?;
    std::fs::create_dir(dir.path().join("nested"))?;
    write_ply(
        &Primitive::holed_sphere(4.0, 16, 1).to_mesh(),
        dir.path().join("nested").join("open.ply"),
    )?;
    std::fs::write(dir.path().join("legacy.obj"), "v 0 0 0\n")?;
    std::fs::write(dir.path().join("notes.txt"), "not a mesh")?;

    let report = scan_directory(dir.path())?;
    println!("{:#?}", report);

    assert_eq!(report.checked.len(), 2);
    assert_eq!(report.non_watertight.len(), 1);
    assert!(report.non_watertight[0].ends_with("open.ply"));
    assert!(report.non_manifold.is_empty());
    assert_eq!(report.skipped.len(), 1);
    assert_eq!(report.closed_count(), 1);
    Ok(())
}

#[test]
fn test_scan_of_missing_directory_fails() {
    let result = scan_directory(std::path::Path::new("/nonexistent/helmshell/scans"));
    assert!(result.is_err());
}

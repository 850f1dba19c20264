// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Batch diagnostics over a directory of mesh files

use super::check;
use crate::error::{ShellError, ShellResult};
use crate::io::read_mesh;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use walkdir::WalkDir;

/// Extensions the scanner loads; other mesh formats are skipped
pub const SUPPORTED_EXTENSIONS: &[&str] = &["stl", "ply"];

/// Mesh formats recognized but not readable by this crate
const KNOWN_UNSUPPORTED: &[&str] = &["obj", "off", "gltf", "glb", "vtk", "vtp", "3mf"];

/// Classification of every mesh file found under a directory
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchReport {
    /// Files that loaded and were checked
    pub checked: Vec<PathBuf>,
    pub non_manifold: Vec<PathBuf>,
    pub non_watertight: Vec<PathBuf>,
    /// Unreadable or unsupported files, with the reason
    pub skipped: Vec<(PathBuf, String)>,
}

impl BatchReport {
    /// Checked files that are both manifold and watertight
    pub fn closed_count(&self) -> usize {
        self.checked
            .iter()
            .filter(|p| !self.non_manifold.contains(p) && !self.non_watertight.contains(p))
            .count()
    }
}

fn extension_of(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
}

/// Classify every mesh file below `dir` into non-manifold and non-watertight buckets.
///
/// Unreadable files are skipped and logged; only a missing directory is an error.
pub fn scan_directory(dir: &Path) -> ShellResult<BatchReport> {
    if !dir.is_dir() {
        return Err(ShellError::input(format!(
            "{} is not a directory",
            dir.display()
        )));
    }

    let mut report = BatchReport::default();
    let mut files: Vec<PathBuf> = WalkDir::new(dir)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| e.into_path())
        .collect();
    files.sort();

    for path in files {
        let Some(ext) = extension_of(&path) else {
            continue;
        };
        if KNOWN_UNSUPPORTED.contains(&ext.as_str()) {
            warn!(path = %path.display(), "skipping unsupported mesh format");
            report
                .skipped
                .push((path, format!("unsupported format .{}", ext)));
            continue;
        }
        if !SUPPORTED_EXTENSIONS.contains(&ext.as_str()) {
            continue;
        }

        let mesh = match read_mesh(&path) {
            Ok(mesh) => mesh,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "skipping unreadable mesh");
                report.skipped.push((path, e.to_string()));
                continue;
            }
        };

        let result = check(&mesh);
        if !result.manifold {
            report.non_manifold.push(path.clone());
        }
        if !result.watertight {
            report.non_watertight.push(path.clone());
        }
        report.checked.push(path);
    }

    info!(
        checked = report.checked.len(),
        non_manifold = report.non_manifold.len(),
        non_watertight = report.non_watertight.len(),
        skipped = report.skipped.len(),
        "directory scan complete"
    );
    Ok(report)
}

// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Mesh file I/O
//!
//! STL and PLY are read and written. Every failure, including an unknown extension, is
//! reported as [`ErrorKind::InputInvalid`](crate::error::ErrorKind) with the path in the reason.

mod ply;
mod stl;

pub use ply::{read_ply, write_ply};
pub use stl::{read_stl, write_stl};

use crate::error::{ShellError, ShellResult};
use crate::geometry::Mesh;
use std::fmt;
use std::path::Path;
use tracing::debug;

/// Formats this crate reads and writes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MeshFormat {
    Stl,
    Ply,
}

impl MeshFormat {
    /// Format for the extension of `path`, case-insensitive
    pub fn from_path(path: impl AsRef<Path>) -> Option<Self> {
        let ext = path.as_ref().extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "stl" => Some(Self::Stl),
            "ply" => Some(Self::Ply),
            _ => None,
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            Self::Stl => "stl",
            Self::Ply => "ply",
        }
    }
}

impl fmt::Display for MeshFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

fn format_of(path: &Path) -> ShellResult<MeshFormat> {
    MeshFormat::from_path(path).ok_or_else(|| {
        ShellError::input(format!(
            "{}: unsupported mesh format (expected .stl or .ply)",
            path.display()
        ))
    })
}

pub(crate) fn invalid(path: &Path, what: impl fmt::Display) -> ShellError {
    ShellError::input(format!("{}: {}", path.display(), what))
}

/// Read a mesh, choosing the format from the file extension
pub fn read_mesh(path: impl AsRef<Path>) -> ShellResult<Mesh> {
    let path = path.as_ref();
    let mesh = match format_of(path)? {
        MeshFormat::Stl => read_stl(path)?,
        MeshFormat::Ply => read_ply(path)?,
    };
    if mesh.is_empty() {
        return Err(invalid(path, "mesh has no faces"));
    }
    debug!(
        path = %path.display(),
        vertices = mesh.vertex_count(),
        faces = mesh.triangle_count(),
        "read mesh"
    );
    Ok(mesh)
}

/// Write a mesh, choosing the format from the file extension
pub fn write_mesh(mesh: &Mesh, path: impl AsRef<Path>) -> ShellResult<()> {
    let path = path.as_ref();
    match format_of(path)? {
        MeshFormat::Stl => write_stl(mesh, path),
        MeshFormat::Ply => write_ply(mesh, path),
    }?;
    debug!(path = %path.display(), faces = mesh.triangle_count(), "wrote mesh");
    Ok(())
}

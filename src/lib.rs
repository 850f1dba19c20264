// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! helmshell
//!
//! Fits a helmet shell to a 3D head scan: mesh integrity checks and repair, draping the head
//! into a closed solid, boolean subtraction from a helmet template, and seam smoothing.
//!
//! Every component takes meshes by reference and returns new ones. Fatal failures are
//! [`ShellError`]s tagged with the failing [`Stage`]; results that are usable but not a closed
//! manifold come back as [`Checked`] values carrying [`QualityWarning`]s.

pub mod boolean;
pub mod cli;
pub mod config;
pub mod drape;
pub mod envelope;
pub mod error;
pub mod geometry;
pub mod integrity;
pub mod io;
pub mod pipeline;
pub mod repair;
pub mod seam;
pub mod timing;
pub mod transform;

pub use boolean::{difference, intersection, union, BooleanOp};
pub use config::PipelineConfig;
pub use drape::{drape, drape_with_fallback, DrapeOptions};
pub use envelope::EnvelopeStrategy;
pub use error::{Checked, ErrorKind, QualityWarning, ShellError, ShellResult, Stage};
pub use geometry::{Mesh, Primitive};
pub use integrity::{check, is_manifold, is_watertight, IntegrityReport};
pub use io::{read_mesh, write_mesh};
pub use pipeline::{HelmetPipeline, PipelineOutput};
pub use seam::{finish_seam, SeamParams};
pub use transform::Transform;

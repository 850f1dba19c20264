// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Pipeline results and how they are named on disk

use crate::error::{ShellError, ShellResult};
use crate::geometry::Mesh;
use crate::io::write_stl;
use crate::timing::StageMetrics;
use crate::transform::Transform;
use chrono::{Local, NaiveDate};
use std::path::{Path, PathBuf};
use tracing::info;

/// Finished helmet shell, the optional trimmed chin piece and per-stage metrics
#[derive(Debug, Clone)]
pub struct PipelineOutput {
    pub shell: Mesh,
    pub chin: Option<Mesh>,
    pub stages: Vec<StageMetrics>,
    pub subject_name: String,
    pub transform: Transform,
}

impl PipelineOutput {
    /// `{date}_{name}_offset{offset * 10, truncated}_DV{dz}`
    pub fn file_stem(date: NaiveDate, name: &str, transform: &Transform) -> String {
        format!(
            "{}_{}_offset{}_DV{}",
            date.format("%Y-%m-%d"),
            name,
            (transform.offset * 10.0) as i64,
            transform.dv()
        )
    }

    pub fn chin_file_stem(date: NaiveDate, name: &str) -> String {
        format!("{}_{}_chinpiece", date.format("%Y-%m-%d"), name)
    }

    /// Write the shell (and chin piece) as STL into `dir`, dated today
    pub fn write_outputs(&self, dir: impl AsRef<Path>) -> ShellResult<Vec<PathBuf>> {
        self.write_outputs_on(dir, Local::now().date_naive())
    }

    pub fn write_outputs_on(
        &self,
        dir: impl AsRef<Path>,
        date: NaiveDate,
    ) -> ShellResult<Vec<PathBuf>> {
        let dir = dir.as_ref();
        std::fs::create_dir_all(dir).map_err(|e| {
            ShellError::input(format!("{}: cannot create output directory: {}", dir.display(), e))
        })?;

        let mut written = Vec::new();
        // Not with_extension: a fractional DV already contains a dot
        let shell_path = dir.join(format!(
            "{}.stl",
            Self::file_stem(date, &self.subject_name, &self.transform)
        ));
        write_stl(&self.shell, &shell_path)?;
        written.push(shell_path);

        if let Some(chin) = &self.chin {
            let chin_path = dir.join(format!(
                "{}.stl",
                Self::chin_file_stem(date, &self.subject_name)
            ));
            write_stl(chin, &chin_path)?;
            written.push(chin_path);
        }
        info!(files = written.len(), dir = %dir.display(), "wrote pipeline outputs");
        Ok(written)
    }

    /// Total wall time of all recorded stages
    pub fn total_ms(&self) -> f64 {
        self.stages.iter().map(StageMetrics::duration_ms).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Primitive;
    use nalgebra::Vector3;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, 14).unwrap()
    }

    #[test]
    fn test_file_stem_truncates_offset() {
        let transform = Transform::default().with_translation([0.0, 0.0, -2.0]);
        assert_eq!(
            PipelineOutput::file_stem(date(), "Example", &transform),
            "2025-03-14_Example_offset7_DV-2"
        );
        let transform = Transform::default().with_offset(2.3).with_translation([0.0, 0.0, 1.5]);
        assert_eq!(
            PipelineOutput::file_stem(date(), "m1", &transform),
            "2025-03-14_m1_offset22_DV1.5"
        );
        assert_eq!(
            PipelineOutput::chin_file_stem(date(), "m1"),
            "2025-03-14_m1_chinpiece"
        );
    }

    #[test]
    fn test_write_outputs() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let cube = Primitive::cube(Vector3::new(1.0, 1.0, 1.0), false).to_mesh();
        let output = PipelineOutput {
            shell: cube.clone(),
            chin: Some(cube),
            stages: Vec::new(),
            subject_name: "Example".to_string(),
            transform: Transform::default(),
        };
        let written = output.write_outputs_on(dir.path().join("helmets"), date())?;
        assert_eq!(written.len(), 2);
        assert!(written[0].ends_with("2025-03-14_Example_offset7_DV0.stl"));
        assert!(written.iter().all(|p| p.exists()));
        Ok(())
    }
}

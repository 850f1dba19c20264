// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! End-to-end helmet pipeline
//!
//! ```text
//! head ─ prepare ─ smooth/offset ─ transform ─┬─ drape ─────┐
//!                                             │             ▼
//! helmet ─────────────────────────────────────┼──► helmet − draped − head ─ seam ─► shell
//! chin ───────────────────────────────────────┴──► chin − head ──────────────────► chin
//! ```
//!
//! Drape and the helmet subtractions are fail-stop once their relaxed retries are used up:
//! their errors end the run and carry the failing stage. The chin subtraction is optional and its failure only drops the chin piece.
//! Quality warnings of every stage are collected on the returned [`Checked`] value.

mod output;
mod preprocess;

pub use output::PipelineOutput;
pub use preprocess::{preprocess, HelmetType, Prepared, DORSAL_GAP, HEAD_ROTATION_X_DEG, POSTERIOR_GAP};

use crate::boolean::difference;
use crate::config::PipelineConfig;
use crate::drape::{drape, drape_with_fallback};
use crate::error::{Checked, ErrorKind, QualityWarning, ShellError, ShellResult, Stage};
use crate::geometry::Mesh;
use crate::io::write_ply;
use crate::repair::{
    clean, decimate_with_healing, extract_largest_component, fill_holes, fix_normals,
    laplacian_smooth, offset,
};
use crate::seam::finish_seam;
use crate::timing::{OperationTimer, StageMetrics};
use crate::transform::{Transform, SMOOTHING_ITERATIONS};
use std::fmt;
use tracing::{debug, info, warn};

/// Steps reported to the progress callback, in run order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PipelineStep {
    PrepareHead,
    FitHead,
    Drape,
    Chin,
    Subtract,
    FinishSeam,
}

impl PipelineStep {
    pub const ALL: [Self; 6] = [
        Self::PrepareHead,
        Self::FitHead,
        Self::Drape,
        Self::Chin,
        Self::Subtract,
        Self::FinishSeam,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::PrepareHead => "prepare_head",
            Self::FitHead => "fit_head",
            Self::Drape => "drape",
            Self::Chin => "chin",
            Self::Subtract => "subtract",
            Self::FinishSeam => "finish_seam",
        }
    }

    /// Component stage that errors of this step are attributed to
    pub fn stage(self) -> Stage {
        match self {
            Self::PrepareHead | Self::FitHead => Stage::Repair,
            Self::Drape => Stage::Drape,
            Self::Chin | Self::Subtract => Stage::Boolean,
            Self::FinishSeam => Stage::Seam,
        }
    }
}

impl fmt::Display for PipelineStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Progress notification
#[derive(Debug, Clone)]
pub enum StageEvent {
    Started(PipelineStep),
    Finished {
        step: PipelineStep,
        metrics: StageMetrics,
    },
    Skipped {
        step: PipelineStep,
        reason: String,
    },
    Warning(QualityWarning),
}

type ProgressFn = Box<dyn Fn(&StageEvent) + Send + Sync>;

/// Runs the full head-to-shell pipeline with one configuration
pub struct HelmetPipeline {
    config: PipelineConfig,
    progress: Option<ProgressFn>,
}

impl HelmetPipeline {
    pub fn new(config: PipelineConfig) -> Self {
        Self {
            config,
            progress: None,
        }
    }

    /// Call `f` for every [`StageEvent`]
    pub fn with_progress(mut self, f: impl Fn(&StageEvent) + Send + Sync + 'static) -> Self {
        self.progress = Some(Box::new(f));
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    fn emit(&self, event: StageEvent) {
        if let Some(progress) = &self.progress {
            progress(&event);
        }
    }

    fn finish_step(
        &self,
        step: PipelineStep,
        timer: OperationTimer,
        mesh: &Mesh,
        stages: &mut Vec<StageMetrics>,
    ) {
        let metrics = timer.finish(mesh);
        info!(
            step = %step,
            elapsed_ms = metrics.duration_ms(),
            faces = metrics.triangle_count,
            "pipeline step finished"
        );
        stages.push(metrics.clone());
        self.emit(StageEvent::Finished { step, metrics });
    }

    fn collect(&self, warnings: &mut Vec<QualityWarning>, new: Vec<QualityWarning>) {
        for warning in new {
            warn!(%warning, "quality warning");
            self.emit(StageEvent::Warning(warning.clone()));
            warnings.push(warning);
        }
    }

    /// Write an intermediate mesh to `output_dir`, if one is configured. Failures are logged.
    fn artifact(&self, name: &str, mesh: &Mesh) {
        let Some(dir) = &self.config.output_dir else {
            return;
        };
        let path = dir.join(format!("{}_{}.ply", self.config.subject_name, name));
        let written = std::fs::create_dir_all(dir)
            .map_err(|e| ShellError::input(format!("{}: {}", dir.display(), e)))
            .and_then(|_| write_ply(mesh, &path));
        match written {
            Ok(()) => info!(path = %path.display(), "wrote intermediate mesh"),
            Err(e) => warn!(error = %e, "could not write intermediate mesh"),
        }
    }

    /// Turn a preprocessed head and helmet (and chin piece) into the finished shell
    pub fn run(
        &self,
        head: &Mesh,
        helmet: &Mesh,
        chin: Option<&Mesh>,
        transform: &Transform,
    ) -> ShellResult<Checked<PipelineOutput>> {
        self.config.validate()?;
        if head.is_empty() {
            return Err(ShellError::input("head mesh is empty"));
        }
        if helmet.is_empty() {
            return Err(ShellError::input("helmet mesh is empty"));
        }
        let config = self.config.scaled_for(helmet.length());
        let mut stages = Vec::new();
        let mut warnings = Vec::new();

        self.emit(StageEvent::Started(PipelineStep::PrepareHead));
        let timer = OperationTimer::new("prepare_head");
        let prepared = prepare_head(head, &config)?;
        self.finish_step(PipelineStep::PrepareHead, timer, &prepared, &mut stages);
        self.artifact("prepared_head", &prepared);

        self.emit(StageEvent::Started(PipelineStep::FitHead));
        let timer = OperationTimer::new("fit_head");
        let fitted = fit_head(&prepared, transform, &config)?;
        self.finish_step(PipelineStep::FitHead, timer, &fitted, &mut stages);

        self.emit(StageEvent::Started(PipelineStep::Drape));
        let timer = OperationTimer::new("drape");
        let (draped, drape_warnings) = drape_with_fallback(&fitted, &config)?.into_parts();
        self.collect(&mut warnings, drape_warnings);
        self.finish_step(PipelineStep::Drape, timer, &draped, &mut stages);
        self.artifact("draped_head", &draped);

        let chin = match chin {
            Some(chin) => {
                self.emit(StageEvent::Started(PipelineStep::Chin));
                let timer = OperationTimer::new("chin");
                match difference(chin, &fitted) {
                    Ok(result) => {
                        let (piece, chin_warnings) = result.into_parts();
                        self.collect(&mut warnings, chin_warnings);
                        self.finish_step(PipelineStep::Chin, timer, &piece, &mut stages);
                        Some(piece)
                    }
                    Err(e) => {
                        warn!(error = %e, "chin subtraction failed, continuing without chin piece");
                        self.emit(StageEvent::Skipped {
                            step: PipelineStep::Chin,
                            reason: e.to_string(),
                        });
                        None
                    }
                }
            }
            None => {
                self.emit(StageEvent::Skipped {
                    step: PipelineStep::Chin,
                    reason: "no chin piece".to_string(),
                });
                None
            }
        };

        self.emit(StageEvent::Started(PipelineStep::Subtract));
        let timer = OperationTimer::new("subtract");
        let (cut, cut_warnings) = subtract_head(helmet, &draped, &fitted, &config)?.into_parts();
        self.collect(&mut warnings, cut_warnings);
        self.finish_step(PipelineStep::Subtract, timer, &cut, &mut stages);

        self.emit(StageEvent::Started(PipelineStep::FinishSeam));
        let timer = OperationTimer::new("finish_seam");
        let (shell, seam_warnings) = finish_seam(&cut, &config.seam_params())?.into_parts();
        self.collect(&mut warnings, seam_warnings);
        self.finish_step(PipelineStep::FinishSeam, timer, &shell, &mut stages);

        info!(
            faces = shell.triangle_count(),
            chin = chin.is_some(),
            warnings = warnings.len(),
            "pipeline complete"
        );
        Ok(Checked::with_warnings(
            PipelineOutput {
                shell,
                chin,
                stages,
                subject_name: config.subject_name.clone(),
                transform: *transform,
            },
            warnings,
        ))
    }
}

/// Head repair: clean, fill holes, orient, keep the largest piece, clean, and decimate
/// meshes above the face threshold
pub fn prepare_head(head: &Mesh, config: &PipelineConfig) -> ShellResult<Mesh> {
    let cleaned = clean(head, config.clean_tolerance);
    let filled = fill_holes(&cleaned, config.default_fill_hole_size);
    let oriented = fix_normals(&filled);
    let largest = extract_largest_component(&oriented);
    let prepared = clean(&largest, config.clean_tolerance);
    let prepared = decimate_with_healing(&prepared, &config.decimation_params());
    if prepared.is_empty() {
        return Err(ShellError::degenerate(
            Stage::Repair,
            "head mesh has no faces left after repair",
        ));
    }
    info!(
        faces = prepared.triangle_count(),
        vertices = prepared.vertex_count(),
        "prepared head"
    );
    Ok(prepared)
}

/// Cut the draped head and then the head itself out of the helmet.
///
/// When the engine gives up, the head is re-draped with the relaxed parameters of the next
/// retry attempt and the cut is tried again, up to `config.max_retries` times.
pub fn subtract_head(
    helmet: &Mesh,
    draped: &Mesh,
    fitted: &Mesh,
    config: &PipelineConfig,
) -> ShellResult<Checked<Mesh>> {
    let mut redraped = None;
    let mut attempt = 0;
    loop {
        let tool = redraped.as_ref().unwrap_or(draped);
        let result = difference(helmet, tool).and_then(|cut| {
            let (cut, cut_warnings) = cut.into_parts();
            if !cut_warnings.is_empty() {
                debug!("intermediate helmet cut is not closed");
            }
            difference(&cut, fitted)
        });
        let error = match result {
            Ok(cut) => return Ok(cut),
            Err(e) if e.kind() == ErrorKind::InputInvalid => return Err(e),
            Err(e) => e,
        };
        attempt += 1;
        if attempt > config.max_retries {
            return Err(error);
        }
        warn!(attempt, error = %error, "helmet subtraction failed, re-draping with relaxed parameters");
        match drape(fitted, &config.relaxed(attempt).drape_options()) {
            Ok(checked) => redraped = Some(checked.value),
            Err(e) if e.kind() == ErrorKind::InputInvalid => return Err(e),
            Err(e) => warn!(attempt, error = %e, "relaxed drape failed"),
        }
    }
}

/// Smooth, offset and place the prepared head as `transform` asks
pub fn fit_head(head: &Mesh, transform: &Transform, config: &PipelineConfig) -> ShellResult<Mesh> {
    let mut fitted = if transform.smoothing > 0.0 {
        laplacian_smooth(head, SMOOTHING_ITERATIONS, transform.smoothing)
    } else {
        head.clone()
    };
    if transform.offset != 0.0 {
        fitted = offset(&fitted, transform.offset, config.healing_resolution)?;
    }
    if !transform.is_rigid_identity() {
        fitted.transform(&transform.matrix());
    }
    Ok(fitted)
}

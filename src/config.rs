// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Pipeline configuration
//!
//! One explicit parameter set per pipeline invocation. Defaults are the values tuned for the
//! reference helmet template; hole sizes and clip bounds are in that template's units.

use crate::drape::DrapeOptions;
use crate::envelope::EnvelopeStrategy;
use crate::error::{ShellError, ShellResult};
use crate::geometry::{Axis, BoundingBox};
use crate::repair::DecimationParams;
use crate::seam::SeamParams;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::warn;

/// Default configuration file looked up by [`PipelineConfig::load`]
pub const CONFIG_FILE: &str = "helmshell.toml";

const MIN_RAY_RESOLUTION: usize = 8;
const MIN_SLICES: usize = 4;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Points closer than this are merged by `clean`
    pub clean_tolerance: f64,
    /// Largest hole perimeter closed during head preparation
    pub default_fill_hole_size: f64,
    /// Heads with more faces than this are decimated
    pub decimation_threshold_faces: usize,
    /// Fraction of faces removed by decimation
    pub decimation_target_reduction: f64,
    pub post_decimation_fill_hole_size: f64,
    /// Seam clip box [min_x, max_x, min_y, max_y, min_z, max_z]
    pub clip_bounds: [f64; 6],
    pub smoothing_iterations: usize,
    /// Taubin pass band, in (0, 2]
    pub pass_band: f64,
    pub smoothing_fill_hole_size: f64,
    pub drape_axis: Axis,
    /// Axis the slice width is measured along
    pub width_axis: Axis,
    pub drape_strategy: EnvelopeStrategy,
    pub n_slices: usize,
    pub ray_resolution: usize,
    /// Normal offset applied to the head before draping
    pub offset_distance: f64,
    /// Voxel healing after the offset: voxel size is mesh length / resolution
    pub healing_resolution: Option<f64>,
    /// Scale hole sizes and clip bounds by the helmet's size relative to `reference_length`
    pub normalize_to_bbox: bool,
    /// Bounding-box diagonal of the template the defaults were tuned on
    pub reference_length: f64,
    /// Relaxed-parameter retries of the drape stage
    pub max_retries: usize,
    /// Directory for intermediate PLY artifacts
    pub output_dir: Option<PathBuf>,
    pub subject_name: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            clean_tolerance: 0.01,
            default_fill_hole_size: 1000.0,
            decimation_threshold_faces: 8000,
            decimation_target_reduction: 0.5,
            post_decimation_fill_hole_size: 500.0,
            clip_bounds: [-25.0, 22.0, -23.0, 23.0, -12.0, -6.0],
            smoothing_iterations: 70,
            pass_band: 0.04,
            smoothing_fill_hole_size: 20.0,
            drape_axis: Axis::Z,
            width_axis: Axis::Y,
            drape_strategy: EnvelopeStrategy::Slice,
            n_slices: 100,
            ray_resolution: 200,
            offset_distance: 0.7,
            healing_resolution: None,
            normalize_to_bbox: false,
            reference_length: 80.0,
            max_retries: 2,
            output_dir: None,
            subject_name: "Example".to_string(),
        }
    }
}

impl PipelineConfig {
    /// Load configuration from file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {:?}", path.as_ref()))?;
        let config: PipelineConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {:?}", path.as_ref()))?;
        Ok(config)
    }

    /// Load `helmshell.toml` if present, then apply `HELMSHELL_*` environment overrides
    pub fn load() -> Result<Self> {
        let mut config = if PathBuf::from(CONFIG_FILE).exists() {
            Self::from_file(CONFIG_FILE)?
        } else {
            Self::default()
        };
        config.apply_env();
        Ok(config)
    }

    fn apply_env(&mut self) {
        fn parsed<T: std::str::FromStr>(key: &str) -> Option<T> {
            let value = std::env::var(key).ok()?;
            match value.parse() {
                Ok(v) => Some(v),
                Err(_) => {
                    warn!(key, value = %value, "ignoring unparsable environment override");
                    None
                }
            }
        }

        if let Some(v) = parsed("HELMSHELL_CLEAN_TOLERANCE") {
            self.clean_tolerance = v;
        }
        if let Some(v) = parsed("HELMSHELL_FILL_HOLE_SIZE") {
            self.default_fill_hole_size = v;
        }
        if let Some(v) = parsed("HELMSHELL_N_SLICES") {
            self.n_slices = v;
        }
        if let Some(v) = parsed("HELMSHELL_RAY_RESOLUTION") {
            self.ray_resolution = v;
        }
        if let Some(v) = parsed("HELMSHELL_MAX_RETRIES") {
            self.max_retries = v;
        }
        if let Some(v) = parsed::<EnvelopeStrategy>("HELMSHELL_STRATEGY") {
            self.drape_strategy = v;
        }
        if let Ok(dir) = std::env::var("HELMSHELL_OUTPUT_DIR") {
            self.output_dir = Some(PathBuf::from(dir));
        }
        if let Ok(name) = std::env::var("HELMSHELL_SUBJECT_NAME") {
            self.subject_name = name;
        }
    }

    /// Save configuration to file
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        std::fs::write(path.as_ref(), content)
            .with_context(|| format!("Failed to write config file: {:?}", path.as_ref()))?;
        Ok(())
    }

    /// Reject values no stage can work with
    pub fn validate(&self) -> ShellResult<()> {
        let finite_non_negative = [
            ("clean_tolerance", self.clean_tolerance),
            ("default_fill_hole_size", self.default_fill_hole_size),
            ("post_decimation_fill_hole_size", self.post_decimation_fill_hole_size),
            ("smoothing_fill_hole_size", self.smoothing_fill_hole_size),
        ];
        for (name, value) in finite_non_negative {
            if !value.is_finite() || value < 0.0 {
                return Err(ShellError::input(format!(
                    "{} must be a finite non-negative number, got {}",
                    name, value
                )));
            }
        }
        if !(0.0..1.0).contains(&self.decimation_target_reduction) {
            return Err(ShellError::input(format!(
                "decimation_target_reduction must be in [0, 1), got {}",
                self.decimation_target_reduction
            )));
        }
        if !(self.pass_band > 0.0 && self.pass_band <= 2.0) {
            return Err(ShellError::input(format!(
                "pass_band must be in (0, 2], got {}",
                self.pass_band
            )));
        }
        if self.clip_bounds.iter().any(|v| !v.is_finite())
            || self.clip_bounds[0] > self.clip_bounds[1]
            || self.clip_bounds[2] > self.clip_bounds[3]
            || self.clip_bounds[4] > self.clip_bounds[5]
        {
            return Err(ShellError::input(format!(
                "clip_bounds must be finite [min, max] pairs, got {:?}",
                self.clip_bounds
            )));
        }
        if self.drape_axis == self.width_axis {
            return Err(ShellError::input(format!(
                "width_axis must differ from drape_axis ({})",
                self.drape_axis
            )));
        }
        if self.n_slices < 2 || self.ray_resolution < 2 {
            return Err(ShellError::input(
                "n_slices and ray_resolution must be at least 2",
            ));
        }
        if !self.offset_distance.is_finite() {
            return Err(ShellError::input("offset_distance must be finite"));
        }
        if let Some(r) = self.healing_resolution {
            if !r.is_finite() {
                return Err(ShellError::input("healing_resolution must be finite"));
            }
        }
        if self.normalize_to_bbox && !(self.reference_length > 0.0) {
            return Err(ShellError::input(
                "reference_length must be positive when normalize_to_bbox is set",
            ));
        }
        Ok(())
    }

    /// Parameter set for retry `attempt` (0 is the configuration itself).
    ///
    /// Odd attempts switch to the other drape strategy; every second attempt halves the ray
    /// resolution and slice count and doubles the hole size filled before draping.
    pub fn relaxed(&self, attempt: usize) -> Self {
        let mut config = self.clone();
        if attempt % 2 == 1 {
            config.drape_strategy = self.drape_strategy.alternate();
        }
        let halvings = (attempt / 2).min(16) as u32;
        if halvings > 0 {
            let divisor = 1usize << halvings;
            let factor = divisor as f64;
            config.ray_resolution = (self.ray_resolution / divisor).max(MIN_RAY_RESOLUTION);
            config.n_slices = (self.n_slices / divisor).max(MIN_SLICES);
            config.default_fill_hole_size *= factor;
        }
        config
    }

    /// Copy with hole sizes and clip bounds scaled to a mesh of the given length.
    ///
    /// Without `normalize_to_bbox` the absolute thresholds are kept.
    pub fn scaled_for(&self, length: f64) -> Self {
        if !self.normalize_to_bbox || !(length > 0.0) || !(self.reference_length > 0.0) {
            return self.clone();
        }
        let factor = length / self.reference_length;
        let mut config = self.clone();
        config.default_fill_hole_size *= factor;
        config.post_decimation_fill_hole_size *= factor;
        config.smoothing_fill_hole_size *= factor;
        config.clip_bounds = self.clip_bounds.map(|v| v * factor);
        config
    }

    pub fn drape_options(&self) -> DrapeOptions {
        DrapeOptions {
            axis: self.drape_axis,
            width_axis: self.width_axis,
            strategy: self.drape_strategy,
            n_slices: self.n_slices,
            ray_resolution: self.ray_resolution,
            clean_tolerance: self.clean_tolerance,
            fill_hole_size: self.default_fill_hole_size,
        }
    }

    pub fn decimation_params(&self) -> DecimationParams {
        DecimationParams {
            threshold_faces: self.decimation_threshold_faces,
            target_reduction: self.decimation_target_reduction,
            post_decimation_hole_size: self.post_decimation_fill_hole_size,
            clean_tolerance: self.clean_tolerance,
        }
    }

    pub fn seam_params(&self) -> SeamParams {
        SeamParams {
            clip_bounds: BoundingBox::from_bounds(self.clip_bounds),
            smoothing_iterations: self.smoothing_iterations,
            pass_band: self.pass_band,
            fill_hole_size: self.smoothing_fill_hole_size,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_validate() {
        let config = PipelineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.clip_bounds, [-25.0, 22.0, -23.0, 23.0, -12.0, -6.0]);
        assert_eq!(config.smoothing_iterations, 70);
    }

    #[test]
    fn test_toml_roundtrip_with_partial_file() {
        let config: PipelineConfig =
            toml::from_str("n_slices = 40\ndrape_strategy = \"raycast\"\n").unwrap();
        assert_eq!(config.n_slices, 40);
        assert_eq!(config.drape_strategy, EnvelopeStrategy::RayCast);
        assert_eq!(config.clean_tolerance, 0.01);

        let text = toml::to_string_pretty(&config).unwrap();
        let back: PipelineConfig = toml::from_str(&text).unwrap();
        assert_eq!(back, config);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = PipelineConfig::default();
        config.pass_band = 0.0;
        assert!(config.validate().is_err());

        let mut config = PipelineConfig::default();
        config.width_axis = Axis::Z;
        assert!(config.validate().is_err());

        let mut config = PipelineConfig::default();
        config.clip_bounds = [1.0, 0.0, 0.0, 1.0, 0.0, 1.0];
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_relaxed_attempts() {
        let config = PipelineConfig::default();
        assert_eq!(config.relaxed(0), config);

        let first = config.relaxed(1);
        assert_eq!(first.drape_strategy, EnvelopeStrategy::RayCast);
        assert_eq!(first.ray_resolution, 200);

        let second = config.relaxed(2);
        assert_eq!(second.drape_strategy, EnvelopeStrategy::Slice);
        assert_eq!(second.ray_resolution, 100);
        assert_eq!(second.n_slices, 50);
        assert_eq!(second.default_fill_hole_size, 2000.0);
        assert_eq!(second.post_decimation_fill_hole_size, 500.0);
        assert_eq!(second.drape_options().fill_hole_size, 2000.0);
    }

    #[test]
    fn test_scaled_for() {
        let mut config = PipelineConfig::default();
        assert_eq!(config.scaled_for(160.0), config);

        config.normalize_to_bbox = true;
        let scaled = config.scaled_for(160.0);
        assert_eq!(scaled.clip_bounds[0], -50.0);
        assert_eq!(scaled.smoothing_fill_hole_size, 40.0);
    }
}

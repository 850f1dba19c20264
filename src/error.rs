// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Error kinds and quality metadata shared by every pipeline stage

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Pipeline stage that produced an error or a warning
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Stage {
    Integrity,
    Repair,
    Envelope,
    Drape,
    Boolean,
    Seam,
    Io,
    Pipeline,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Integrity => "integrity",
            Stage::Repair => "repair",
            Stage::Envelope => "envelope",
            Stage::Drape => "drape",
            Stage::Boolean => "boolean",
            Stage::Seam => "seam",
            Stage::Io => "io",
            Stage::Pipeline => "pipeline",
        };
        f.write_str(name)
    }
}

/// Coarse failure class, used by callers to decide whether a retry can help
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorKind {
    InputInvalid,
    GeometryDegenerate,
    OperationUnavailable,
}

/// Failure of a core operation
#[derive(Debug, Error)]
pub enum ShellError {
    /// The mesh is unreadable, empty or otherwise not a usable triangle mesh.
    #[error("invalid input: {reason}")]
    InputInvalid { reason: String },

    /// A geometric precondition of the stage does not hold for this input.
    #[error("{stage}: degenerate geometry: {precondition}")]
    GeometryDegenerate {
        stage: Stage,
        precondition: String,
    },

    /// The underlying geometric operation produced no result.
    #[error("{stage}: operation unavailable: {reason}")]
    OperationUnavailable { stage: Stage, reason: String },
}

impl ShellError {
    pub fn input(reason: impl Into<String>) -> Self {
        Self::InputInvalid {
            reason: reason.into(),
        }
    }

    pub fn degenerate(stage: Stage, precondition: impl Into<String>) -> Self {
        Self::GeometryDegenerate {
            stage,
            precondition: precondition.into(),
        }
    }

    pub fn unavailable(stage: Stage, reason: impl Into<String>) -> Self {
        Self::OperationUnavailable {
            stage,
            reason: reason.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InputInvalid { .. } => ErrorKind::InputInvalid,
            Self::GeometryDegenerate { .. } => ErrorKind::GeometryDegenerate,
            Self::OperationUnavailable { .. } => ErrorKind::OperationUnavailable,
        }
    }

    /// Stage the failure came from. Input errors are reported as I/O.
    pub fn stage(&self) -> Stage {
        match self {
            Self::InputInvalid { .. } => Stage::Io,
            Self::GeometryDegenerate { stage, .. } | Self::OperationUnavailable { stage, .. } => {
                *stage
            }
        }
    }

    /// Whether relaxing parameters (resolution, hole size, strategy) may help
    pub fn is_retryable(&self) -> bool {
        !matches!(self, Self::InputInvalid { .. })
    }
}

pub type ShellResult<T> = Result<T, ShellError>;

/// Non-fatal finding: the stage produced output but it is not a closed manifold
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QualityWarning {
    pub stage: Stage,
    pub manifold: bool,
    pub watertight: bool,
}

impl fmt::Display for QualityWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: output manifold={} watertight={}",
            self.stage, self.manifold, self.watertight
        )
    }
}

/// A result value carrying the quality warnings raised while producing it
#[derive(Debug, Clone)]
pub struct Checked<T> {
    pub value: T,
    pub warnings: Vec<QualityWarning>,
}

impl<T> Checked<T> {
    pub fn clean(value: T) -> Self {
        Self {
            value,
            warnings: Vec::new(),
        }
    }

    pub fn with_warnings(value: T, warnings: Vec<QualityWarning>) -> Self {
        Self { value, warnings }
    }

    pub fn is_clean(&self) -> bool {
        self.warnings.is_empty()
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Checked<U> {
        Checked {
            value: f(self.value),
            warnings: self.warnings,
        }
    }

    pub fn into_parts(self) -> (T, Vec<QualityWarning>) {
        (self.value, self.warnings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kind_and_stage() {
        let err = ShellError::degenerate(Stage::Envelope, "extrusion depth is zero");
        assert_eq!(err.kind(), ErrorKind::GeometryDegenerate);
        assert_eq!(err.stage(), Stage::Envelope);
        assert!(err.to_string().contains("extrusion depth"));
        assert!(err.is_retryable());

        let err = ShellError::input("empty mesh");
        assert_eq!(err.stage(), Stage::Io);
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_checked_map_keeps_warnings() {
        let warning = QualityWarning {
            stage: Stage::Boolean,
            manifold: true,
            watertight: false,
        };
        let checked = Checked::with_warnings(2, vec![warning.clone()]).map(|v| v * 2);
        assert_eq!(checked.value, 4);
        assert_eq!(checked.warnings, vec![warning]);
        assert!(!checked.is_clean());
    }
}

// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Head fitting transform

use nalgebra::{Matrix4, Rotation3, Vector3};
use serde::{Deserialize, Serialize};

/// Placement of the head inside the helmet, chosen by the operator.
///
/// Applied in a fixed order: Laplacian smoothing, normal offset, translation, then rotations
/// about X, Y and Z.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Transform {
    /// Rotation angles about X, Y and Z in degrees
    pub rotation_deg: [f64; 3],
    /// Left-right, posterior-anterior and dorsal-ventral offsets
    pub translation: [f64; 3],
    /// Distance the head surface is pushed out along its normals
    pub offset: f64,
    /// Laplacian relaxation factor in [0, 1]; zero disables smoothing
    pub smoothing: f64,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            rotation_deg: [0.0; 3],
            translation: [0.0; 3],
            offset: 0.7,
            smoothing: 0.0,
        }
    }
}

/// Iterations of the pre-offset Laplacian relaxation
pub const SMOOTHING_ITERATIONS: usize = 20;

impl Transform {
    pub fn identity() -> Self {
        Self {
            offset: 0.0,
            ..Self::default()
        }
    }

    pub fn with_offset(mut self, offset: f64) -> Self {
        self.offset = offset;
        self
    }

    pub fn with_translation(mut self, translation: [f64; 3]) -> Self {
        self.translation = translation;
        self
    }

    pub fn with_rotation(mut self, rotation_deg: [f64; 3]) -> Self {
        self.rotation_deg = rotation_deg;
        self
    }

    pub fn with_smoothing(mut self, smoothing: f64) -> Self {
        self.smoothing = smoothing;
        self
    }

    /// Rigid part: translation first, then rotation about X, Y and Z
    pub fn matrix(&self) -> Matrix4<f64> {
        let [rx, ry, rz] = self.rotation_deg.map(f64::to_radians);
        let rotation = Rotation3::from_axis_angle(&Vector3::z_axis(), rz)
            * Rotation3::from_axis_angle(&Vector3::y_axis(), ry)
            * Rotation3::from_axis_angle(&Vector3::x_axis(), rx);
        rotation.to_homogeneous() * Matrix4::new_translation(&Vector3::from(self.translation))
    }

    /// Dorsal-ventral offset, used in output names
    pub fn dv(&self) -> f64 {
        self.translation[2]
    }

    pub fn is_rigid_identity(&self) -> bool {
        self.rotation_deg == [0.0; 3] && self.translation == [0.0; 3]
    }
}

// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Initial placement of the head against the helmet template

use crate::error::{ShellError, ShellResult};
use crate::geometry::Mesh;
use nalgebra::{Rotation3, Vector3};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::info;

/// Scanner frames have the head lying on its back
pub const HEAD_ROTATION_X_DEG: f64 = 270.0;
/// Gap between the back of the head and the back of the helmet (y)
pub const POSTERIOR_GAP: f64 = 2.75;
/// Gap between the top of the head and the top of the helmet (z)
pub const DORSAL_GAP: f64 = 3.25;

/// Template family; fixes where the chin piece sits under the helmet
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HelmetType {
    Flat,
    Winged,
}

impl HelmetType {
    pub fn chin_offset(self) -> Vector3<f64> {
        match self {
            Self::Flat => Vector3::new(0.0, 7.4, -25.5),
            Self::Winged => Vector3::new(0.0, 6.0, -22.3),
        }
    }
}

impl fmt::Display for HelmetType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Flat => f.write_str("flat"),
            Self::Winged => f.write_str("winged"),
        }
    }
}

impl FromStr for HelmetType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "flat" => Ok(Self::Flat),
            "winged" => Ok(Self::Winged),
            other => Err(format!("unknown helmet type '{}' (expected flat or winged)", other)),
        }
    }
}

/// Meshes in the shared frame the pipeline works in
#[derive(Debug, Clone)]
pub struct Prepared {
    pub head: Mesh,
    pub helmet: Mesh,
    pub chin: Option<Mesh>,
}

/// Rotate the head upright, center every mesh on its bounds center and tuck the head into
/// the back and top of the helmet.
///
/// The chin piece is moved to its slot under the helmet when the helmet type is known.
pub fn preprocess(
    head: &Mesh,
    helmet: &Mesh,
    chin: Option<&Mesh>,
    helmet_type: Option<HelmetType>,
) -> ShellResult<Prepared> {
    if head.is_empty() || helmet.is_empty() {
        return Err(ShellError::input("head and helmet meshes must not be empty"));
    }
    let mut head = head.clone();
    let rotation = Rotation3::from_axis_angle(&Vector3::x_axis(), HEAD_ROTATION_X_DEG.to_radians());
    head.transform(&rotation.to_homogeneous());
    center(&mut head);

    let mut helmet = helmet.clone();
    center(&mut helmet);

    let (hb, tb) = (head.bounding_box(), helmet.bounding_box());
    let shift = Vector3::new(
        0.0,
        tb.min.y - hb.min.y - POSTERIOR_GAP,
        tb.max.z - hb.max.z - DORSAL_GAP,
    );
    head.translate(&shift);
    info!(
        dy = shift.y,
        dz = shift.z,
        "placed head against helmet"
    );

    let chin = chin.map(|chin| {
        let mut chin = chin.clone();
        center(&mut chin);
        if let Some(kind) = helmet_type {
            chin.translate(&kind.chin_offset());
        }
        chin
    });
    Ok(Prepared { head, helmet, chin })
}

fn center(mesh: &mut Mesh) {
    let c = mesh.center();
    mesh.translate(&-c.coords);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Primitive;
    use approx::assert_relative_eq;

    #[test]
    fn test_head_is_tucked_into_helmet() {
        let head = Primitive::cube(Vector3::new(4.0, 6.0, 8.0), false).to_mesh();
        let helmet = Primitive::cube(Vector3::new(20.0, 20.0, 20.0), false).to_mesh();
        let prepared = preprocess(&head, &helmet, None, None).unwrap();

        let tb = prepared.helmet.bounding_box();
        assert_relative_eq!(prepared.helmet.center(), nalgebra::Point3::origin(), epsilon = 1e-12);

        let hb = prepared.head.bounding_box();
        assert_relative_eq!(hb.min.y, tb.min.y - POSTERIOR_GAP, epsilon = 1e-9);
        assert_relative_eq!(hb.max.z, tb.max.z - DORSAL_GAP, epsilon = 1e-9);
        // 270 degrees about x swaps the y and z extents
        assert_relative_eq!(hb.size().y, 8.0, epsilon = 1e-9);
        assert_relative_eq!(hb.size().z, 6.0, epsilon = 1e-9);
        assert_relative_eq!(hb.center().x, 0.0, epsilon = 1e-9);
    }

    #[test]
    fn test_chin_goes_to_its_slot() {
        let cube = Primitive::cube(Vector3::new(2.0, 2.0, 2.0), false).to_mesh();
        let prepared = preprocess(&cube, &cube, Some(&cube), Some(HelmetType::Winged)).unwrap();
        let chin = prepared.chin.unwrap();
        assert_relative_eq!(chin.center().coords, HelmetType::Winged.chin_offset(), epsilon = 1e-12);
    }

    #[test]
    fn test_empty_head_is_rejected() {
        let helmet = Primitive::cube(Vector3::new(2.0, 2.0, 2.0), false).to_mesh();
        assert!(preprocess(&Mesh::new(), &helmet, None, None).is_err());
    }

    #[test]
    fn test_helmet_type_parse() {
        assert_eq!("Flat".parse::<HelmetType>(), Ok(HelmetType::Flat));
        assert!("round".parse::<HelmetType>().is_err());
    }
}

// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Upper envelope of a mesh along one axis
//!
//! Two interchangeable extractors produce the cap surface that draping sweeps down to the
//! floor of the mesh:
//!
//! - [`WidestSlice`] slices the mesh, keeps the cross-section that is widest along a secondary
//!   axis and triangulates its contour into a flat cap.
//! - [`RayGrid`] casts a grid of rays down the axis and keeps every grid cell whose four
//!   corner rays hit the mesh, giving a height field that follows the top of the surface.

mod raycast;
mod slice;
mod triangulate;

pub use raycast::RayGrid;
pub use slice::{slice_segments, Section, WidestSlice};
pub use triangulate::{triangulate_loops, triangulate_polygon};

use crate::error::ShellResult;
use crate::geometry::{Axis, Mesh};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Which extractor draping uses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EnvelopeStrategy {
    /// Widest-slice extrusion
    Slice,
    /// Ray-cast height field
    RayCast,
}

impl EnvelopeStrategy {
    /// The other strategy, tried when this one fails
    pub fn alternate(self) -> Self {
        match self {
            Self::Slice => Self::RayCast,
            Self::RayCast => Self::Slice,
        }
    }
}

impl fmt::Display for EnvelopeStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Slice => f.write_str("slice"),
            Self::RayCast => f.write_str("raycast"),
        }
    }
}

impl FromStr for EnvelopeStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "slice" | "a" => Ok(Self::Slice),
            "raycast" | "ray" | "b" => Ok(Self::RayCast),
            other => Err(format!(
                "unknown envelope strategy '{}' (expected slice or raycast)",
                other
            )),
        }
    }
}

/// Cap surface produced by an extractor
#[derive(Debug, Clone)]
pub struct Envelope {
    pub strategy: EnvelopeStrategy,
    pub axis: Axis,
    /// Open surface wound to face along `+axis`
    pub surface: Mesh,
    /// Lowest axis coordinate of the cap; the slice plane for [`WidestSlice`]
    pub level: f64,
    /// Minimum bound of the source mesh along the axis
    pub floor: f64,
}

impl Envelope {
    /// Extrusion depth from the cap down to the floor
    pub fn depth(&self) -> f64 {
        self.level - self.floor
    }
}

/// Contract shared by both extractors
pub trait EnvelopeExtractor: Send + Sync {
    fn strategy(&self) -> EnvelopeStrategy;

    /// Upper envelope of `mesh` along `axis`
    fn extract(&self, mesh: &Mesh, axis: Axis) -> ShellResult<Envelope>;
}

/// Extractor for `strategy`, with `resolution` slices or rays per grid side
pub fn extractor(
    strategy: EnvelopeStrategy,
    resolution: usize,
    width_axis: Axis,
) -> Box<dyn EnvelopeExtractor> {
    match strategy {
        EnvelopeStrategy::Slice => Box::new(WidestSlice {
            n_slices: resolution,
            width_axis,
        }),
        EnvelopeStrategy::RayCast => Box::new(RayGrid { resolution }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strategy_parse_and_alternate() {
        assert_eq!("slice".parse::<EnvelopeStrategy>(), Ok(EnvelopeStrategy::Slice));
        assert_eq!("RayCast".parse::<EnvelopeStrategy>(), Ok(EnvelopeStrategy::RayCast));
        assert!("voxel".parse::<EnvelopeStrategy>().is_err());
        assert_eq!(EnvelopeStrategy::Slice.alternate(), EnvelopeStrategy::RayCast);
        assert_eq!(EnvelopeStrategy::RayCast.to_string(), "raycast");
    }

    #[test]
    fn test_extractor_dispatch() {
        assert_eq!(
            extractor(EnvelopeStrategy::RayCast, 16, Axis::Y).strategy(),
            EnvelopeStrategy::RayCast
        );
        assert_eq!(
            extractor(EnvelopeStrategy::Slice, 16, Axis::Y).strategy(),
            EnvelopeStrategy::Slice
        );
    }
}

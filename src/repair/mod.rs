// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Mesh healing
//!
//! Every operation takes a mesh by reference and returns a new one. None of them fail on
//! ordinary bad input (nothing to fill, a single component): they return the best mesh they
//! can and leave quality checks to [`crate::integrity`].

mod clean;
mod components;
mod decimate;
mod holes;
mod offset;
mod orientation;
mod smooth;
mod voxel;

pub use clean::{clean, extract_surface, remove_degenerate_faces, remove_duplicate_faces, weld_vertices};
pub use components::{connected_components, extract_largest_component, remove_small_components};
pub use decimate::{decimate, decimate_with_healing, DecimationParams};
pub use holes::{fill_holes, fill_holes_in_place, fill_inner_holes};
pub use offset::offset;
pub use orientation::{fix_normals, fix_normals_in_place};
pub use smooth::laplacian_smooth;
pub use voxel::{extract_boundary_surface, voxelize, VoxelGrid};

pub(crate) use holes::{fill_hole_ear_clipping, newell_normal, plane_basis};
pub(crate) use smooth::Stencil;

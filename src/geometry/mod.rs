// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Geometry module - mesh representation and low-level queries

mod analytics;
mod bbox;
mod bvh;
mod mesh;
mod predicates;
mod primitives;
mod triangle_intersection;
mod winding;

pub use analytics::{analyze, GeometryStats};
pub use bbox::{Axis, BoundingBox};
pub use bvh::{BVHNode, BVH};
pub use mesh::{Mesh, Triangle, Vertex};
pub use predicates::{classify_point_plane, orient2d, orient3d, PlaneSide};
pub use primitives::Primitive;
pub use triangle_intersection::{
    edge_plane_point, triangle_triangle_intersection, IntersectionType, SegmentEnd,
};
pub use winding::{classify_sample, is_inside, winding_number, Classification};

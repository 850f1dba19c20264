// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Bounding Volume Hierarchy (BVH) for spatial acceleration
//! Used as the broad phase of triangle-triangle intersection

use super::{BoundingBox, Mesh};

const MAX_DEPTH: usize = 32;
const MIN_TRIANGLES: usize = 4;

/// BVH node
#[derive(Debug, Clone)]
pub struct BVHNode {
    /// Bounding box of this node
    pub bbox: BoundingBox,
    /// Left child (None for leaf)
    pub left: Option<Box<BVHNode>>,
    /// Right child (None for leaf)
    pub right: Option<Box<BVHNode>>,
    /// Triangle indices (only for leaf nodes)
    pub triangle_indices: Vec<usize>,
}

impl BVHNode {
    fn leaf(bbox: BoundingBox, triangle_indices: Vec<usize>) -> Self {
        Self {
            bbox,
            left: None,
            right: None,
            triangle_indices,
        }
    }

    fn internal(bbox: BoundingBox, left: Box<BVHNode>, right: Box<BVHNode>) -> Self {
        Self {
            bbox,
            left: Some(left),
            right: Some(right),
            triangle_indices: Vec::new(),
        }
    }

    /// Check if this is a leaf node
    pub fn is_leaf(&self) -> bool {
        self.left.is_none() && self.right.is_none()
    }
}

/// Bounding Volume Hierarchy for triangle meshes
#[derive(Debug, Clone)]
pub struct BVH {
    root: BVHNode,
}

impl BVH {
    /// Build BVH from (triangle_index, bbox) pairs
    pub fn build(triangles: Vec<(usize, BoundingBox)>) -> Self {
        if triangles.is_empty() {
            return Self {
                root: BVHNode::leaf(BoundingBox::empty(), Vec::new()),
            };
        }

        let root = Self::build_recursive(triangles, 0);
        Self { root }
    }

    /// Build over every face of a mesh, each box grown by `margin`
    pub fn from_mesh(mesh: &Mesh, margin: f64) -> Self {
        let triangles = (0..mesh.triangle_count())
            .map(|f| (f, mesh.face_bounding_box(f).expanded(margin)))
            .collect();
        Self::build(triangles)
    }

    fn build_recursive(mut triangles: Vec<(usize, BoundingBox)>, depth: usize) -> BVHNode {
        let bbox = Self::compute_union_bbox(&triangles);

        if triangles.len() <= MIN_TRIANGLES || depth >= MAX_DEPTH {
            let indices = triangles.iter().map(|(idx, _)| *idx).collect();
            return BVHNode::leaf(bbox, indices);
        }

        // Split at the median along the longest axis of the centroid spread
        let mut centers = BoundingBox::empty();
        for (_, b) in &triangles {
            centers.expand_to_include(&b.center());
        }
        let axis = centers.longest_axis().index();
        triangles.sort_by(|(_, a), (_, b)| a.center()[axis].total_cmp(&b.center()[axis]));

        let right_triangles = triangles.split_off(triangles.len() / 2);
        let left = Box::new(Self::build_recursive(triangles, depth + 1));
        let right = Box::new(Self::build_recursive(right_triangles, depth + 1));

        BVHNode::internal(bbox, left, right)
    }

    fn compute_union_bbox(triangles: &[(usize, BoundingBox)]) -> BoundingBox {
        triangles
            .iter()
            .fold(BoundingBox::empty(), |acc, (_, b)| acc.union(b))
    }

    /// Bounds of everything in the tree
    pub fn bounds(&self) -> &BoundingBox {
        &self.root.bbox
    }

    /// Query triangles whose boxes intersect the given bounding box
    pub fn query_triangles(&self, bbox: &BoundingBox) -> Vec<usize> {
        let mut result = Vec::new();
        self.query_into(bbox, &mut result);
        result
    }

    /// Same as [`query_triangles`](Self::query_triangles) but appends to a reusable buffer
    pub fn query_into(&self, bbox: &BoundingBox, result: &mut Vec<usize>) {
        let mut stack = vec![&self.root];
        while let Some(node) = stack.pop() {
            if !node.bbox.intersects(bbox) {
                continue;
            }
            if node.is_leaf() {
                result.extend_from_slice(&node.triangle_indices);
                continue;
            }
            if let Some(ref left) = node.left {
                stack.push(left);
            }
            if let Some(ref right) = node.right {
                stack.push(right);
            }
        }
    }

    #[cfg(test)]
    pub fn root(&self) -> &BVHNode {
        &self.root
    }
}

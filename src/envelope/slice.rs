// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Widest-slice envelope

use super::triangulate::triangulate_polygon;
use super::{Envelope, EnvelopeExtractor, EnvelopeStrategy};
use crate::error::{ShellError, ShellResult, Stage};
use crate::geometry::{Axis, Mesh, Triangle};
use ahash::AHashMap;
use nalgebra::{Point2, Point3};
use rayon::prelude::*;
use tracing::{debug, info, warn};

/// Minimum extrusion depth below the chosen slice
const MIN_DEPTH: f64 = 1e-6;

/// Cross-section of a mesh by the plane `axis = level`
#[derive(Debug, Clone, Default)]
pub struct Section {
    pub points: Vec<Point3<f64>>,
    /// Pairs of indices into `points`, one per cut face
    pub segments: Vec<[usize; 2]>,
}

/// Chain of section points; closed chains end where they start
#[derive(Debug, Clone)]
struct Polyline {
    points: Vec<usize>,
    closed: bool,
}

impl Section {
    /// Extent of the section points along `axis`
    pub fn width(&self, axis: Axis) -> f64 {
        let a = axis.index();
        let (lo, hi) = self
            .points
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), p| {
                (lo.min(p[a]), hi.max(p[a]))
            });
        if hi >= lo {
            hi - lo
        } else {
            0.0
        }
    }

    fn polyline_length(&self, line: &Polyline) -> f64 {
        let n = line.points.len();
        let open_end = if line.closed { n } else { n.saturating_sub(1) };
        (0..open_end)
            .map(|i| (self.points[line.points[(i + 1) % n]] - self.points[line.points[i]]).norm())
            .sum()
    }

    /// Link segments sharing a point into polylines
    fn polylines(&self) -> Vec<Polyline> {
        let mut at_point: Vec<Vec<usize>> = vec![Vec::new(); self.points.len()];
        for (s, seg) in self.segments.iter().enumerate() {
            at_point[seg[0]].push(s);
            at_point[seg[1]].push(s);
        }
        let mut used = vec![false; self.segments.len()];
        let mut lines = Vec::new();

        for start in 0..self.segments.len() {
            if used[start] {
                continue;
            }
            used[start] = true;
            let [first, second] = self.segments[start];
            let mut forward = vec![first, second];
            self.extend(&mut forward, &at_point, &mut used);
            let closed = forward.len() > 2 && forward.first() == forward.last();
            if closed {
                forward.pop();
            } else {
                // Walk the other way from the first point
                let mut backward = vec![first];
                self.extend(&mut backward, &at_point, &mut used);
                backward.reverse();
                backward.pop();
                backward.extend(forward);
                forward = backward;
            }
            lines.push(Polyline {
                points: forward,
                closed,
            });
        }
        lines
    }

    fn extend(&self, chain: &mut Vec<usize>, at_point: &[Vec<usize>], used: &mut [bool]) {
        while let Some(&tip) = chain.last() {
            let next = at_point[tip].iter().copied().find(|&s| !used[s]);
            let Some(s) = next else {
                break;
            };
            used[s] = true;
            let [a, b] = self.segments[s];
            chain.push(if a == tip { b } else { a });
            if chain.first() == chain.last() {
                break;
            }
        }
    }
}

/// Cut every face of `mesh` by the plane `axis = level`.
///
/// Points lying exactly on the plane count as above it, so each crossing sits on an edge
/// with one endpoint strictly below. Crossing points are shared by the faces on both sides
/// of their edge.
pub fn slice_segments(mesh: &Mesh, axis: Axis, level: f64) -> Section {
    let a = axis.index();
    let mut section = Section::default();
    let mut by_edge: AHashMap<(usize, usize), usize> = AHashMap::new();

    for triangle in &mesh.triangles {
        let [i0, i1, i2] = triangle.indices;
        let below = [i0, i1, i2].map(|i| mesh.vertices[i].position[a] < level);
        let count = below.iter().filter(|&&b| b).count();
        if count == 0 || count == 3 {
            continue;
        }
        let mut ends = Vec::with_capacity(2);
        for (p, q) in triangle.edges() {
            let (bp, bq) = (
                mesh.vertices[p].position[a] < level,
                mesh.vertices[q].position[a] < level,
            );
            if bp == bq {
                continue;
            }
            let key = (p.min(q), p.max(q));
            let index = *by_edge.entry(key).or_insert_with(|| {
                let (lo, hi) = (mesh.position(key.0), mesh.position(key.1));
                let t = (level - lo[a]) / (hi[a] - lo[a]);
                let mut point = lo + (hi - lo) * t.clamp(0.0, 1.0);
                point[a] = level;
                section.points.push(point);
                section.points.len() - 1
            });
            ends.push(index);
        }
        if let [s, e] = ends[..] {
            if s != e {
                section.segments.push([s, e]);
            }
        }
    }
    section
}

/// Strategy A: flat cap at the widest cross-section
#[derive(Debug, Clone, Copy)]
pub struct WidestSlice {
    pub n_slices: usize,
    /// Axis along which slice width is measured
    pub width_axis: Axis,
}

impl WidestSlice {
    /// Slice positions: from 0 when the mesh straddles it, otherwise from the minimum bound,
    /// up to the maximum bound
    fn levels(&self, min: f64, max: f64) -> Vec<f64> {
        let start = if min < 0.0 && max > 0.0 { 0.0 } else { min };
        let n = self.n_slices;
        (0..n)
            .map(|i| start + (i as f64 + 0.5) / n as f64 * (max - start))
            .collect()
    }
}

impl EnvelopeExtractor for WidestSlice {
    fn strategy(&self) -> EnvelopeStrategy {
        EnvelopeStrategy::Slice
    }

    fn extract(&self, mesh: &Mesh, axis: Axis) -> ShellResult<Envelope> {
        if mesh.is_empty() {
            return Err(ShellError::degenerate(Stage::Envelope, "mesh has no faces"));
        }
        if self.n_slices == 0 {
            return Err(ShellError::degenerate(Stage::Envelope, "slice count is zero"));
        }
        if self.width_axis == axis {
            return Err(ShellError::input(format!(
                "width axis {} must differ from the drape axis",
                axis
            )));
        }

        let bbox = mesh.bounding_box();
        let (min, max) = (bbox.min[axis.index()], bbox.max[axis.index()]);
        let levels = self.levels(min, max);

        let widest = levels
            .par_iter()
            .map(|&level| {
                let section = slice_segments(mesh, axis, level);
                (level, section.width(self.width_axis), section)
            })
            .filter(|(_, _, section)| section.points.len() > 2)
            .collect::<Vec<_>>()
            .into_iter()
            .fold(None, |best: Option<(f64, f64, Section)>, candidate| match best {
                Some(b) if b.1 >= candidate.1 => Some(b),
                _ => Some(candidate),
            });
        let Some((level, width, section)) = widest else {
            return Err(ShellError::degenerate(
                Stage::Envelope,
                format!("no slice along {} yields more than 2 points", axis),
            ));
        };

        let depth = level - min;
        if depth <= MIN_DEPTH {
            return Err(ShellError::degenerate(
                Stage::Envelope,
                format!("extrusion depth {:.3e} below the widest slice is too small", depth),
            ));
        }

        let contour = contour_points(&section)?;
        let (u, v) = axis.others();
        let flat: Vec<Point2<f64>> = contour
            .iter()
            .map(|p| Point2::new(p[u.index()], p[v.index()]))
            .collect();
        let triangles = triangulate_polygon(&flat)?;

        let mut surface = Mesh::with_capacity(contour.len(), triangles.len());
        for p in &contour {
            surface.add_point(*p);
        }
        for t in triangles {
            surface.add_triangle(Triangle::new(t));
        }
        surface.recompute_normals();

        info!(
            axis = %axis,
            level,
            width,
            contour_points = contour.len(),
            cap_faces = surface.triangle_count(),
            "widest slice envelope"
        );
        Ok(Envelope {
            strategy: EnvelopeStrategy::Slice,
            axis,
            surface,
            level,
            floor: min,
        })
    }
}

/// Longest closed polyline of the section, or the longest open one closed by a straight edge
fn contour_points(section: &Section) -> ShellResult<Vec<Point3<f64>>> {
    let lines = section.polylines();
    debug!(polylines = lines.len(), "chained slice segments");
    let longest = |closed: bool| {
        lines
            .iter()
            .filter(|l| l.closed == closed && l.points.len() >= 3)
            .max_by(|a, b| {
                section
                    .polyline_length(a)
                    .total_cmp(&section.polyline_length(b))
            })
    };
    let line = match longest(true) {
        Some(line) => line,
        None => {
            let line = longest(false).ok_or_else(|| {
                ShellError::degenerate(Stage::Envelope, "slice has no contour of 3 or more points")
            })?;
            warn!(points = line.points.len(), "slice contour is open, closing it");
            line
        }
    };

    let tolerance = 1e-9 * section.width(Axis::X).max(section.width(Axis::Y)).max(1.0);
    let mut points: Vec<Point3<f64>> = Vec::with_capacity(line.points.len());
    for &i in &line.points {
        let p = section.points[i];
        if points.last().map_or(true, |q| (p - q).norm() > tolerance) {
            points.push(p);
        }
    }
    while points.len() > 1 && (points[0] - points[points.len() - 1]).norm() <= tolerance {
        points.pop();
    }
    if points.len() < 3 {
        return Err(ShellError::degenerate(
            Stage::Envelope,
            "slice contour collapses to fewer than 3 points",
        ));
    }
    Ok(points)
}

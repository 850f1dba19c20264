// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Voxel occupancy and boundary surface extraction
//!
//! Used to heal self-intersecting surfaces: the solid is rasterized (column parity plus every
//! voxel the surface passes through) and the outer faces of the occupied voxels are emitted
//! as a closed, consistently oriented mesh.

use crate::error::{ShellError, ShellResult, Stage};
use crate::geometry::{Mesh, Triangle};
use ahash::AHashMap;
use nalgebra::{Point3, Vector3};
use rayon::prelude::*;
use tracing::{debug, info};

/// Refuse grids larger than this
pub const MAX_VOXELS: usize = 50_000_000;

/// Regular occupancy grid
#[derive(Debug, Clone)]
pub struct VoxelGrid {
    pub origin: Point3<f64>,
    pub voxel_size: f64,
    pub dims: [usize; 3],
    occupied: Vec<bool>,
}

impl VoxelGrid {
    fn index(&self, i: usize, j: usize, k: usize) -> usize {
        i + self.dims[0] * (j + self.dims[1] * k)
    }

    /// Occupancy of a cell; cells outside the grid are empty
    pub fn is_occupied(&self, i: isize, j: isize, k: isize) -> bool {
        if i < 0 || j < 0 || k < 0 {
            return false;
        }
        let (i, j, k) = (i as usize, j as usize, k as usize);
        if i >= self.dims[0] || j >= self.dims[1] || k >= self.dims[2] {
            return false;
        }
        self.occupied[self.index(i, j, k)]
    }

    pub fn occupied_count(&self) -> usize {
        self.occupied.iter().filter(|&&o| o).count()
    }

    fn cell_of(&self, p: &Point3<f64>) -> [usize; 3] {
        let local = (p - self.origin) / self.voxel_size;
        [0, 1, 2].map(|a| (local[a].floor().max(0.0) as usize).min(self.dims[a] - 1))
    }

    fn center(&self, axis: usize, cell: usize) -> f64 {
        self.origin[axis] + (cell as f64 + 0.5) * self.voxel_size
    }
}

/// Rasterize the solid bounded by `mesh` at the given voxel size
pub fn voxelize(mesh: &Mesh, voxel_size: f64) -> ShellResult<VoxelGrid> {
    if mesh.is_empty() {
        return Err(ShellError::degenerate(Stage::Repair, "cannot voxelize an empty mesh"));
    }
    if !(voxel_size > 0.0) || !voxel_size.is_finite() {
        return Err(ShellError::degenerate(
            Stage::Repair,
            format!("voxel size must be positive, got {}", voxel_size),
        ));
    }

    let bbox = mesh.bounding_box();
    let origin = bbox.min - Vector3::repeat(voxel_size);
    let size = bbox.size();
    let dims = [0, 1, 2].map(|a| (size[a] / voxel_size).ceil() as usize + 2);
    let total = dims[0].saturating_mul(dims[1]).saturating_mul(dims[2]);
    if total > MAX_VOXELS {
        return Err(ShellError::unavailable(
            Stage::Repair,
            format!("voxel grid {:?} exceeds {} cells", dims, MAX_VOXELS),
        ));
    }

    let mut grid = VoxelGrid {
        origin,
        voxel_size,
        dims,
        occupied: vec![false; total],
    };
    fill_interior(mesh, &mut grid);
    mark_surface(mesh, &mut grid);

    debug!(dims = ?grid.dims, occupied = grid.occupied_count(), "voxelized mesh");
    Ok(grid)
}

/// Column parity along Z: every column center collects the heights where it crosses the
/// surface, and cells between consecutive crossing pairs are inside.
fn fill_interior(mesh: &Mesh, grid: &mut VoxelGrid) {
    let [nx, ny, nz] = grid.dims;
    let mut crossings: Vec<Vec<f64>> = vec![Vec::new(); nx * ny];
    // Offset the sample inside the column so it never lands exactly on a mesh edge
    let jitter = [1.234_567e-7 * grid.voxel_size, 2.345_678e-7 * grid.voxel_size];

    for face in 0..mesh.triangle_count() {
        let [a, b, c] = mesh.triangle_positions(face);
        let cross = (b - a).cross(&(c - a));
        if cross.z == 0.0 {
            continue;
        }
        let fb = mesh.face_bounding_box(face);
        let [i0, j0, _] = grid.cell_of(&fb.min);
        let [i1, j1, _] = grid.cell_of(&fb.max);
        for j in j0..=j1 {
            let y = grid.center(1, j) + jitter[1];
            for i in i0..=i1 {
                let x = grid.center(0, i) + jitter[0];
                if let Some(z) = vertical_hit(&a, &b, &c, &cross, x, y) {
                    crossings[i + nx * j].push(z);
                }
            }
        }
    }

    let columns: Vec<Vec<usize>> = crossings
        .par_iter_mut()
        .map(|zs| {
            zs.sort_by(f64::total_cmp);
            let mut cells = Vec::new();
            for pair in zs.chunks_exact(2) {
                for k in 0..nz {
                    let zc = grid.center(2, k);
                    if zc >= pair[0] && zc <= pair[1] {
                        cells.push(k);
                    }
                }
            }
            cells
        })
        .collect();

    for (column, cells) in columns.into_iter().enumerate() {
        let (i, j) = (column % nx, column / nx);
        for k in cells {
            let index = grid.index(i, j, k);
            grid.occupied[index] = true;
        }
    }
}

/// Height where the vertical line through (x, y) meets triangle (a, b, c)
fn vertical_hit(
    a: &Point3<f64>,
    b: &Point3<f64>,
    c: &Point3<f64>,
    cross: &Vector3<f64>,
    x: f64,
    y: f64,
) -> Option<f64> {
    let edge = |p: &Point3<f64>, q: &Point3<f64>| (q.x - p.x) * (y - p.y) - (q.y - p.y) * (x - p.x);
    let (e0, e1, e2) = (edge(a, b), edge(b, c), edge(c, a));
    let inside = (e0 >= 0.0 && e1 >= 0.0 && e2 >= 0.0) || (e0 <= 0.0 && e1 <= 0.0 && e2 <= 0.0);
    if !inside {
        return None;
    }
    // Plane: cross . (p - a) = 0
    Some(a.z - (cross.x * (x - a.x) + cross.y * (y - a.y)) / cross.z)
}

/// Occupy every cell a surface sample falls in, so open or leaky surfaces still leave a shell
fn mark_surface(mesh: &Mesh, grid: &mut VoxelGrid) {
    let step = grid.voxel_size * 0.5;
    let cells: Vec<usize> = (0..mesh.triangle_count())
        .into_par_iter()
        .flat_map_iter(|face| {
            let [a, b, c] = mesh.triangle_positions(face);
            let longest = (b - a).norm().max((c - b).norm()).max((a - c).norm());
            let n = ((longest / step).ceil() as usize).max(1);
            let mut out = Vec::with_capacity((n + 1) * (n + 2) / 2);
            for u in 0..=n {
                for v in 0..=(n - u) {
                    let (s, t) = (u as f64 / n as f64, v as f64 / n as f64);
                    let p = a + (b - a) * s + (c - a) * t;
                    let [i, j, k] = grid.cell_of(&p);
                    out.push(grid.index(i, j, k));
                }
            }
            out
        })
        .collect();
    for index in cells {
        grid.occupied[index] = true;
    }
}

/// Faces between occupied and empty cells, wound outward, sharing grid-corner vertices
pub fn extract_boundary_surface(grid: &VoxelGrid) -> Mesh {
    let mut mesh = Mesh::new();
    let mut corners: AHashMap<[usize; 3], usize> = AHashMap::new();
    let mut corner = |mesh: &mut Mesh, c: [usize; 3]| -> usize {
        *corners.entry(c).or_insert_with(|| {
            mesh.add_point(Point3::new(
                grid.origin.x + c[0] as f64 * grid.voxel_size,
                grid.origin.y + c[1] as f64 * grid.voxel_size,
                grid.origin.z + c[2] as f64 * grid.voxel_size,
            ))
        })
    };

    let [nx, ny, nz] = grid.dims;
    for k in 0..nz {
        for j in 0..ny {
            for i in 0..nx {
                if !grid.occupied[grid.index(i, j, k)] {
                    continue;
                }
                let cell = [i, j, k];
                for axis in 0..3 {
                    let b = (axis + 1) % 3;
                    let c = (axis + 2) % 3;
                    for positive in [true, false] {
                        let mut neighbor = cell.map(|v| v as isize);
                        neighbor[axis] += if positive { 1 } else { -1 };
                        if grid.is_occupied(neighbor[0], neighbor[1], neighbor[2]) {
                            continue;
                        }
                        let mut base = cell;
                        if positive {
                            base[axis] += 1;
                        }
                        let mut p1 = base;
                        p1[b] += 1;
                        let mut p2 = p1;
                        p2[c] += 1;
                        let mut p3 = base;
                        p3[c] += 1;
                        let quad = [base, p1, p2, p3].map(|q| corner(&mut mesh, q));
                        if positive {
                            mesh.add_triangle(Triangle::new([quad[0], quad[1], quad[2]]));
                            mesh.add_triangle(Triangle::new([quad[0], quad[2], quad[3]]));
                        } else {
                            mesh.add_triangle(Triangle::new([quad[0], quad[2], quad[1]]));
                            mesh.add_triangle(Triangle::new([quad[0], quad[3], quad[2]]));
                        }
                    }
                }
            }
        }
    }
    mesh.recompute_normals();
    info!(
        vertices = mesh.vertex_count(),
        faces = mesh.triangle_count(),
        "extracted voxel surface"
    );
    mesh
}

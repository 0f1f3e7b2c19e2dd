//! Marching cubes over a sampled [`Grid`]
use super::{
    Grid, Mesh,
    types::{Corner, Edge},
};
use crate::{CancelToken, Error};
use nalgebra::Vector3;
use std::collections::HashMap;

include!(concat!(env!("OUT_DIR"), "/mc_tables.rs"));

/// Builds a triangle mesh from a sampled grid
///
/// Cells are walked in Z, Y, X order; cancellation is checked once per Z
/// slab.
pub(super) fn triangulate(
    grid: &Grid,
    threshold: f32,
    cancel: &CancelToken,
) -> Result<Mesh, Error> {
    let n = grid.resolution();
    let mut out = Builder {
        grid,
        threshold,
        vertices: HashMap::new(),
        mesh: Mesh::new(),
    };
    for k in 0..n - 1 {
        cancel.check()?;
        for j in 0..n - 1 {
            for i in 0..n - 1 {
                out.cell([i, j, k]);
            }
        }
    }
    Ok(out.mesh)
}

struct Builder<'a> {
    grid: &'a Grid,
    threshold: f32,

    /// Map from `(lattice index, axis index)` of an edge's lower corner to the
    /// vertex placed on that edge
    vertices: HashMap<(usize, usize), usize>,
    mesh: Mesh,
}

impl Builder<'_> {
    fn cell(&mut self, pos: [usize; 3]) {
        let (grid, threshold) = (self.grid, self.threshold);
        let inside =
            |c: &Corner| grid.value(offset(pos, c.offset())) < threshold;
        let mask = Corner::iter()
            .filter(inside)
            .fold(0, |acc, c| acc | (1 << c.index()));

        for tri in CELL_TO_TRIANGLES[mask] {
            let t = tri.map(|e| self.vertex(pos, e));
            self.mesh.triangles.push(Vector3::from(t));
        }
    }

    /// Returns the vertex on the given cell edge, creating it if needed
    fn vertex(&mut self, pos: [usize; 3], e: Edge) -> usize {
        let (start, end) = e.corners();
        let a = offset(pos, start.offset());
        let key = (self.grid.index(a), e.axis().index());
        if let Some(&v) = self.vertices.get(&key) {
            return v;
        }

        // Interpolate from the lower corner, so that both cells sharing this
        // edge would compute the same position
        let b = offset(pos, end.offset());
        let (va, vb) = (self.grid.value(a), self.grid.value(b));
        debug_assert!((va < self.threshold) != (vb < self.threshold));
        let t = (self.threshold - va) / (vb - va);
        let (pa, pb) = (self.grid.point(a), self.grid.point(b));

        let v = self.mesh.vertices.len();
        self.mesh.vertices.push(pa + (pb - pa) * t);
        self.vertices.insert(key, v);
        v
    }
}

fn offset(pos: [usize; 3], d: [usize; 3]) -> [usize; 3] {
    [pos[0] + d[0], pos[1] + d[1], pos[2] + d[2]]
}

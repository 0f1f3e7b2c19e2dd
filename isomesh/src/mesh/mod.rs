//! Isosurface extraction and mesh I/O
//!
//! This module implements marching cubes over a regular lattice spanning a
//! [`BoundingVolume`].  Field values are sampled at every lattice point
//! (in parallel, one Z slab at a time), then each cell is triangulated with a
//! lookup table that is generated at build time.
//!
//! Vertices are placed on crossed lattice edges by linear interpolation and
//! shared between every cell that touches the edge, so the resulting meshes
//! are closed wherever the surface stays within the volume.  Vertex ids are
//! assigned in first-use order while walking cells in Z, Y, X order; the
//! output is a pure function of the field, volume, resolution, and
//! threshold.
//!
//! The resulting [`Mesh`] can be written out as PLY (with per-vertex colors)
//! or STL (geometry only), and PLY files can be read back in.
//!
//! ```
//! use isomesh::{
//!     bounds::BoundingVolume,
//!     field::shapes::Sphere,
//!     mesh::{PlyFormat, Settings, extract},
//! };
//! use nalgebra::Vector3;
//!
//! let sphere = Sphere::new(Vector3::zeros(), 0.6);
//! let settings = Settings {
//!     resolution: 8,
//!     ..Default::default()
//! };
//! let mut mesh = extract(&sphere, &BoundingVolume::default(), &settings)?;
//! mesh.colors = vec![[128, 128, 128]; mesh.vertices.len()];
//!
//! // Open a file to write, e.g.
//! // let mut f = std::fs::File::create("out.ply")?;
//! # let mut f = vec![];
//! mesh.write_ply(&mut f, PlyFormat::default())?;
//! # Ok::<(), isomesh::Error>(())
//! ```
use crate::{
    CancelToken, Error, ThreadPool, bounds::BoundingVolume, field::Field,
};

mod grid;
mod input;
mod marching;
mod output;

#[doc(hidden)]
pub mod types;

pub use grid::Grid;
pub use output::{PlyFormat, export, export_debug};

////////////////////////////////////////////////////////////////////////////////

/// An indexed 3D mesh with optional per-vertex colors
#[derive(Clone, Default, Debug, PartialEq)]
pub struct Mesh {
    /// Triangles, as indexes into [`self.vertices`](Self::vertices)
    pub triangles: Vec<nalgebra::Vector3<usize>>,
    /// Vertex positions
    pub vertices: Vec<nalgebra::Vector3<f32>>,
    /// Vertex colors, either empty or one per vertex
    pub colors: Vec<[u8; 3]>,
}

impl Mesh {
    /// Builds a new mesh
    pub fn new() -> Self {
        Self::default()
    }

    /// Checks whether the mesh has no vertices
    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    /// Returns vertex and triangle counts
    pub fn stats(&self) -> MeshStats {
        MeshStats {
            vertices: self.vertices.len(),
            triangles: self.triangles.len(),
        }
    }

    /// Checks that every triangle index refers to a vertex
    pub fn check_indices(&self) -> Result<(), Error> {
        let count = self.vertices.len();
        match self.triangles.iter().flatten().find(|&&i| i >= count) {
            Some(&index) => Err(Error::BadIndex { index, count }),
            None => Ok(()),
        }
    }

    /// Checks that there is exactly one color per vertex
    pub fn check_colors(&self) -> Result<(), Error> {
        if self.colors.len() == self.vertices.len() {
            Ok(())
        } else {
            Err(Error::ColorCountMismatch {
                colors: self.colors.len(),
                vertices: self.vertices.len(),
            })
        }
    }
}

/// Summary of a mesh's size, for diagnostics
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct MeshStats {
    /// Number of vertices
    pub vertices: usize,
    /// Number of triangles
    pub triangles: usize,
}

impl std::fmt::Display for MeshStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} vertices and {} triangles",
            self.vertices, self.triangles
        )
    }
}

/// Settings when extracting a mesh
pub struct Settings<'a> {
    /// Number of lattice points along each axis
    ///
    /// This must be at least 2.  Memory and runtime scale with the cube of
    /// the resolution.
    pub resolution: usize,

    /// Isovalue; lattice points with `value < threshold` are inside
    pub threshold: f32,

    /// Thread pool to use for sampling
    ///
    /// If this is `None`, then sampling is done in a single thread; otherwise,
    /// the provided pool is used.
    pub threads: Option<&'a ThreadPool>,

    /// Token to cancel extraction
    pub cancel: CancelToken,
}

impl Default for Settings<'_> {
    fn default() -> Self {
        Self {
            resolution: 512,
            threshold: 0.0,
            threads: Some(&ThreadPool::Global),
            cancel: CancelToken::new(),
        }
    }
}

/// Extracts the isosurface of a field within the given volume
///
/// Returns an empty mesh (not an error) if the surface does not cross any
/// lattice cell.  The returned mesh has no colors.
pub fn extract<F: Field>(
    field: &F,
    bounds: &BoundingVolume,
    settings: &Settings,
) -> Result<Mesh, Error> {
    if settings.resolution < 2 {
        return Err(Error::InvalidResolution(settings.resolution));
    }
    let grid = Grid::build(field, bounds, settings)?;
    let mesh =
        marching::triangulate(&grid, settings.threshold, &settings.cancel)?;
    log::debug!(
        "triangulated {}³ lattice into {}",
        settings.resolution,
        mesh.stats()
    );
    Ok(mesh)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::field::shapes::Sphere;
    use nalgebra::Vector3;

    #[test]
    fn test_bad_resolution() {
        let sphere = Sphere::new(Vector3::zeros(), 0.5);
        for resolution in [0, 1] {
            let settings = Settings {
                resolution,
                ..Default::default()
            };
            assert!(matches!(
                extract(&sphere, &BoundingVolume::default(), &settings),
                Err(Error::InvalidResolution(r)) if r == resolution
            ));
        }
    }

    #[test]
    fn test_check_indices() {
        let mut mesh = Mesh {
            vertices: vec![Vector3::zeros(); 3],
            triangles: vec![Vector3::new(0, 1, 2)],
            colors: vec![],
        };
        assert!(mesh.check_indices().is_ok());
        assert!(matches!(
            mesh.check_colors(),
            Err(Error::ColorCountMismatch {
                colors: 0,
                vertices: 3
            })
        ));
        mesh.triangles.push(Vector3::new(2, 3, 0));
        assert!(matches!(
            mesh.check_indices(),
            Err(Error::BadIndex { index: 3, count: 3 })
        ));
    }

    #[test]
    fn test_cancel() {
        let sphere = Sphere::new(Vector3::zeros(), 0.5);
        let settings = Settings {
            resolution: 8,
            ..Default::default()
        };
        settings.cancel.cancel();
        assert!(matches!(
            extract(&sphere, &BoundingVolume::default(), &settings),
            Err(Error::Cancelled)
        ));
    }
}

//! Dense lattice of field values
use super::Settings;
use crate::{
    Error,
    bounds::BoundingVolume,
    field::{Field, Sampler},
};
use nalgebra::Vector3;
use rayon::prelude::*;

/// Field values sampled on a regular `resolution³` lattice
///
/// Values are stored with X varying fastest, then Y, then Z.  Only values are
/// stored; gradients are computed later, per vertex.
pub struct Grid {
    resolution: usize,
    bounds: BoundingVolume,
    values: Vec<f32>,
}

impl Grid {
    /// Samples a field at every lattice point
    ///
    /// Z slabs are sampled in parallel if `settings.threads` is set, with one
    /// [`Sampler`] per worker.  Cancellation is checked between slabs.
    pub fn build<F: Field>(
        field: &F,
        bounds: &BoundingVolume,
        settings: &Settings,
    ) -> Result<Self, Error> {
        let n = settings.resolution;
        if n < 2 {
            return Err(Error::InvalidResolution(n));
        }
        let mut values = vec![0.0; n * n * n];

        let slab = |(sampler, row): &mut (Sampler<F>, Vec<Vector3<f32>>),
                    (k, out): (usize, &mut [f32])|
         -> Result<(), Error> {
            settings.cancel.check()?;
            for (j, out) in out.chunks_exact_mut(n).enumerate() {
                row.clear();
                row.extend((0..n).map(|i| bounds.lattice_point(n, [i, j, k])));
                out.copy_from_slice(sampler.values(row)?);
            }
            Ok(())
        };

        match settings.threads {
            None => {
                let mut state = (Sampler::new(field), Vec::with_capacity(n));
                values
                    .chunks_mut(n * n)
                    .enumerate()
                    .try_for_each(|s| slab(&mut state, s))?;
            }
            Some(p) => p.run(|| {
                values.par_chunks_mut(n * n).enumerate().try_for_each_init(
                    || (Sampler::new(field), Vec::with_capacity(n)),
                    slab,
                )
            })?,
        }

        Ok(Self {
            resolution: n,
            bounds: *bounds,
            values,
        })
    }

    /// Number of lattice points along each axis
    pub fn resolution(&self) -> usize {
        self.resolution
    }

    /// Volume spanned by the lattice
    pub fn bounds(&self) -> &BoundingVolume {
        &self.bounds
    }

    /// Converts a lattice position into a flat index
    pub fn index(&self, [i, j, k]: [usize; 3]) -> usize {
        debug_assert!(i < self.resolution);
        debug_assert!(j < self.resolution);
        debug_assert!(k < self.resolution);
        i + self.resolution * (j + self.resolution * k)
    }

    /// Returns the field value at a lattice position
    pub fn value(&self, pos: [usize; 3]) -> f32 {
        self.values[self.index(pos)]
    }

    /// Returns the position of a lattice point in space
    pub fn point(&self, pos: [usize; 3]) -> Vector3<f32> {
        self.bounds.lattice_point(self.resolution, pos)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{ThreadPool, field::shapes::Sphere};

    #[test]
    fn test_grid_values() {
        let sphere = Sphere::new(Vector3::zeros(), 0.5);
        let settings = Settings {
            resolution: 3,
            threads: None,
            ..Default::default()
        };
        let g = Grid::build(&sphere, &BoundingVolume::default(), &settings)
            .unwrap();
        assert_eq!(g.value([1, 1, 1]), -0.5);
        assert_eq!(g.value([2, 1, 1]), 0.5);
        assert_eq!(g.index([2, 1, 1]), 2 + 3 + 9);
        assert_eq!(g.point([0, 2, 1]), Vector3::new(-1.0, 1.0, 0.0));
    }

    #[test]
    fn test_grid_resolution() {
        let sphere = Sphere::new(Vector3::zeros(), 0.5);
        for resolution in [0, 1] {
            let settings = Settings {
                resolution,
                ..Default::default()
            };
            assert!(matches!(
                Grid::build(&sphere, &BoundingVolume::default(), &settings),
                Err(Error::InvalidResolution(r)) if r == resolution
            ));
        }
    }

    #[test]
    fn test_grid_threads() {
        let sphere = Sphere::new(Vector3::new(0.1, -0.2, 0.3), 0.5);
        let pool = ThreadPool::with_threads(4).unwrap();
        let bounds = BoundingVolume::default();
        let mut grids = vec![];
        for threads in [None, Some(&pool), Some(&ThreadPool::Global)] {
            let settings = Settings {
                resolution: 9,
                threads,
                ..Default::default()
            };
            grids.push(Grid::build(&sphere, &bounds, &settings).unwrap());
        }
        assert_eq!(grids[0].values, grids[1].values);
        assert_eq!(grids[0].values, grids[2].values);
    }
}

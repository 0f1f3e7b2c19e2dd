//! Axis-aligned bounding volumes
use crate::Error;
use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

/// Axis-aligned box over which a field is sampled
///
/// The box is guaranteed to be finite and non-empty on every axis
/// (`min[i] < max[i]`); this is checked at construction.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawBounds")]
pub struct BoundingVolume {
    min: Vector3<f32>,
    max: Vector3<f32>,
}

#[derive(Deserialize)]
struct RawBounds {
    min: Vector3<f32>,
    max: Vector3<f32>,
}

impl TryFrom<RawBounds> for BoundingVolume {
    type Error = Error;
    fn try_from(b: RawBounds) -> Result<Self, Error> {
        Self::new(b.min, b.max)
    }
}

impl Default for BoundingVolume {
    /// Returns the `[-1, 1]` cube
    fn default() -> Self {
        Self {
            min: Vector3::repeat(-1.0),
            max: Vector3::repeat(1.0),
        }
    }
}

impl BoundingVolume {
    /// Builds a new bounding volume
    ///
    /// Returns [`Error::DegenerateBounds`] if any axis is empty, inverted, or
    /// not finite.
    pub fn new(min: Vector3<f32>, max: Vector3<f32>) -> Result<Self, Error> {
        for axis in 0..3 {
            let (lo, hi) = (min[axis], max[axis]);
            if !(lo.is_finite() && hi.is_finite() && lo < hi) {
                return Err(Error::DegenerateBounds {
                    axis,
                    min: lo,
                    max: hi,
                });
            }
        }
        Ok(Self { min, max })
    }

    /// Lower corner
    pub fn min(&self) -> Vector3<f32> {
        self.min
    }

    /// Upper corner
    pub fn max(&self) -> Vector3<f32> {
        self.max
    }

    /// Size along each axis
    pub fn size(&self) -> Vector3<f32> {
        self.max - self.min
    }

    /// Checks whether the given point is within the volume (inclusive)
    pub fn contains(&self, p: Vector3<f32>) -> bool {
        (0..3).all(|i| p[i] >= self.min[i] && p[i] <= self.max[i])
    }

    /// Returns the position of a lattice point
    ///
    /// The lattice has `resolution` points per axis, with the first and last
    /// points lying exactly on the volume's faces.
    pub fn lattice_point(
        &self,
        resolution: usize,
        index: [usize; 3],
    ) -> Vector3<f32> {
        debug_assert!(resolution >= 2);
        let scale = (resolution - 1) as f32;
        Vector3::from_fn(|i, _| {
            let frac = index[i] as f32 / scale;
            self.min[i] + frac * (self.max[i] - self.min[i])
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_degenerate() {
        let lo = Vector3::new(0.0, 0.0, 0.0);
        assert!(matches!(
            BoundingVolume::new(lo, Vector3::new(1.0, 0.0, 1.0)),
            Err(Error::DegenerateBounds { axis: 1, .. })
        ));
        assert!(matches!(
            BoundingVolume::new(lo, Vector3::new(1.0, 1.0, f32::NAN)),
            Err(Error::DegenerateBounds { axis: 2, .. })
        ));
        assert!(BoundingVolume::new(lo, Vector3::repeat(1.0)).is_ok());
    }

    #[test]
    fn test_lattice_point() {
        let b = BoundingVolume::default();
        assert_eq!(b.lattice_point(3, [0, 0, 0]), Vector3::repeat(-1.0));
        assert_eq!(b.lattice_point(3, [1, 2, 0]), Vector3::new(0.0, 1.0, -1.0));
        assert_eq!(b.lattice_point(5, [4, 4, 4]), b.max());
    }
}

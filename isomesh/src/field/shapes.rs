//! Closed-form fields and simple appearance functions
use super::{Appearance, Field};
use crate::{Error, types::Value};
use nalgebra::Vector3;

/// Sphere with the given center and radius
#[derive(Copy, Clone, Debug)]
pub struct Sphere {
    center: Vector3<f32>,
    radius: f32,
}

impl Sphere {
    /// Builds a new sphere
    pub fn new(center: Vector3<f32>, radius: f32) -> Self {
        Self { center, radius }
    }
}

impl Field for Sphere {
    fn eval<T: Value>(&self, p: [T; 3], _features: &mut [T]) -> T {
        let c = |i: usize| p[i] - T::constant(self.center[i]);
        (c(0).square() + c(1).square() + c(2).square()).sqrt()
            - T::constant(self.radius)
    }
}

/// Torus lying in the XY plane
#[derive(Copy, Clone, Debug)]
pub struct Torus {
    center: Vector3<f32>,
    /// Distance from the center to the middle of the tube
    major: f32,
    /// Radius of the tube
    minor: f32,
}

impl Torus {
    /// Builds a new torus
    pub fn new(center: Vector3<f32>, major: f32, minor: f32) -> Self {
        Self {
            center,
            major,
            minor,
        }
    }
}

impl Field for Torus {
    fn eval<T: Value>(&self, p: [T; 3], _features: &mut [T]) -> T {
        let c = |i: usize| p[i] - T::constant(self.center[i]);
        let (x, y, z) = (c(0), c(1), c(2));
        let ring = (x.square() + y.square()).sqrt() - T::constant(self.major);
        (ring.square() + z.square()).sqrt() - T::constant(self.minor)
    }
}

/// Axis-aligned box, built as the intersection of six half-spaces
///
/// This is not an exact distance outside of the box's faces, but it has the
/// correct sign everywhere and a well-defined gradient away from its edges.
#[derive(Copy, Clone, Debug)]
pub struct Cuboid {
    min: Vector3<f32>,
    max: Vector3<f32>,
}

impl Cuboid {
    /// Builds a new box
    pub fn new(min: Vector3<f32>, max: Vector3<f32>) -> Self {
        Self { min, max }
    }
}

impl Field for Cuboid {
    fn eval<T: Value>(&self, p: [T; 3], _features: &mut [T]) -> T {
        let d = |i: usize| {
            (T::constant(self.min[i]) - p[i])
                .max(p[i] - T::constant(self.max[i]))
        };
        d(0).max(d(1)).max(d(2))
    }
}

/// Union of two fields
///
/// Features are concatenated, `A`'s first.
#[derive(Copy, Clone, Debug)]
pub struct Union<A, B>(pub A, pub B);

impl<A: Field, B: Field> Field for Union<A, B> {
    fn feature_count(&self) -> usize {
        self.0.feature_count() + self.1.feature_count()
    }
    fn eval<T: Value>(&self, p: [T; 3], features: &mut [T]) -> T {
        let (fa, fb) = features.split_at_mut(self.0.feature_count());
        self.0.eval(p, fa).min(self.1.eval(p, fb))
    }
}

////////////////////////////////////////////////////////////////////////////////

/// Appearance that returns the same color everywhere
#[derive(Copy, Clone, Debug)]
pub struct ConstantColor(pub [f32; 3]);

impl Appearance for ConstantColor {
    fn eval(
        &self,
        _position: Vector3<f32>,
        _normal: Vector3<f32>,
        _view_dir: Vector3<f32>,
        _features: &[f32],
        out: &mut Vec<f32>,
    ) -> Result<(), Error> {
        out.extend(self.0);
        Ok(())
    }
}

/// Appearance that shades by surface orientation
///
/// Each channel is `0.5 + 0.5 * n` for the unit normal `n`; a zero normal
/// gives mid-gray.
#[derive(Copy, Clone, Debug, Default)]
pub struct NormalColor;

impl Appearance for NormalColor {
    fn eval(
        &self,
        _position: Vector3<f32>,
        normal: Vector3<f32>,
        _view_dir: Vector3<f32>,
        _features: &[f32],
        out: &mut Vec<f32>,
    ) -> Result<(), Error> {
        let n = normal.try_normalize(0.0).unwrap_or_else(Vector3::zeros);
        out.extend(n.iter().map(|v| 0.5 + 0.5 * v));
        Ok(())
    }
}

//! Implicit fields, appearance functions, and sampling
//!
//! A [`Field`] is a signed distance-like function: negative inside the
//! surface, positive outside, zero on the boundary.  It is written once,
//! generic over [`Value`], so that the same code runs with plain `f32` values
//! (for grid sampling) and with [`Grad`] values (for exact gradients).
//!
//! An [`Appearance`] maps a surface position, normal, and view direction (plus
//! any auxiliary features produced by the field) to an RGB color in `[0, 1]`.
//!
//! Fields and appearances own their model data but no scratch memory; a
//! [`Sampler`] wraps a field reference and owns the buffers used for
//! evaluation, so that one sampler can be built per worker.
use crate::{
    Error,
    bounds::BoundingVolume,
    types::{Grad, Value},
};
use nalgebra::Vector3;

#[cfg(feature = "mlp")]
pub mod mlp;
pub mod shapes;

/// An implicit scalar field
pub trait Field: Send + Sync {
    /// Number of auxiliary feature channels produced alongside the value
    fn feature_count(&self) -> usize {
        0
    }

    /// Region in which the field is valid, if it has one
    fn domain(&self) -> Option<BoundingVolume> {
        None
    }

    /// Evaluates the field at a single point
    ///
    /// `features` has exactly [`feature_count`](Field::feature_count) slots,
    /// which must be filled in by the implementation.
    fn eval<T: Value>(&self, p: [T; 3], features: &mut [T]) -> T;
}

impl<F: Field> Field for &F {
    fn feature_count(&self) -> usize {
        (*self).feature_count()
    }
    fn domain(&self) -> Option<BoundingVolume> {
        (*self).domain()
    }
    fn eval<T: Value>(&self, p: [T; 3], features: &mut [T]) -> T {
        (*self).eval(p, features)
    }
}

/// A function from surface samples to colors
pub trait Appearance: Send + Sync {
    /// Evaluates color channels at a single surface point
    ///
    /// Channels are pushed onto `out`, which is empty on entry; each channel
    /// is expected to be in the `[0, 1]` range.  The caller checks that
    /// exactly three channels were produced.
    fn eval(
        &self,
        position: Vector3<f32>,
        normal: Vector3<f32>,
        view_dir: Vector3<f32>,
        features: &[f32],
        out: &mut Vec<f32>,
    ) -> Result<(), Error>;
}

impl<A: Appearance> Appearance for &A {
    fn eval(
        &self,
        position: Vector3<f32>,
        normal: Vector3<f32>,
        view_dir: Vector3<f32>,
        features: &[f32],
        out: &mut Vec<f32>,
    ) -> Result<(), Error> {
        (*self).eval(position, normal, view_dir, features, out)
    }
}

////////////////////////////////////////////////////////////////////////////////

/// Surface samples with plain (untracked) values and gradients
///
/// These are produced by [`GradScope::eval`] and outlive the scope.
#[derive(Default, Debug)]
pub struct SurfaceSamples {
    /// Field values
    pub values: Vec<f32>,
    /// Field gradients, one per value
    pub gradients: Vec<Vector3<f32>>,
    features: Vec<f32>,
    feature_count: usize,
}

impl SurfaceSamples {
    /// Returns the number of samples
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Checks whether there are no samples
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Returns the auxiliary features for the given sample
    pub fn features(&self, i: usize) -> &[f32] {
        let n = self.feature_count;
        &self.features[i * n..(i + 1) * n]
    }

    fn clear(&mut self, feature_count: usize) {
        self.values.clear();
        self.gradients.clear();
        self.features.clear();
        self.feature_count = feature_count;
    }
}

/// Evaluator for a [`Field`], owning scratch memory
pub struct Sampler<'a, F> {
    field: &'a F,
    domain: Option<BoundingVolume>,

    values: Vec<f32>,
    features: Vec<f32>,

    /// Tracked (differentiated) scratch, only populated within a
    /// [`GradScope`]
    tracked: Vec<Grad>,
}

impl<'a, F: Field> Sampler<'a, F> {
    /// Builds a new sampler for the given field
    pub fn new(field: &'a F) -> Self {
        Self {
            field,
            domain: field.domain(),
            values: vec![],
            features: vec![0.0; field.feature_count()],
            tracked: vec![],
        }
    }

    /// Returns the wrapped field
    pub fn field(&self) -> &'a F {
        self.field
    }

    fn check_domain(&self, p: Vector3<f32>) -> Result<(), Error> {
        match &self.domain {
            Some(d) if !d.contains(p) => {
                Err(Error::OutOfDomain(p.x, p.y, p.z))
            }
            _ => Ok(()),
        }
    }

    fn check_value(v: f32, p: Vector3<f32>) -> Result<f32, Error> {
        if v.is_finite() {
            Ok(v)
        } else {
            Err(Error::NonFiniteField {
                value: v,
                x: p.x,
                y: p.y,
                z: p.z,
            })
        }
    }

    /// Evaluates the field value at a single point
    pub fn value(&mut self, p: Vector3<f32>) -> Result<f32, Error> {
        self.check_domain(p)?;
        let v = self.field.eval([p.x, p.y, p.z], &mut self.features[..]);
        Self::check_value(v, p)
    }

    /// Evaluates field values at a set of points, without derivatives
    pub fn values(&mut self, ps: &[Vector3<f32>]) -> Result<&[f32], Error> {
        self.values.clear();
        self.values.reserve(ps.len());
        for &p in ps {
            let v = self.value(p)?;
            self.values.push(v);
        }
        Ok(&self.values)
    }

    /// Enables derivative tracking until the returned scope is dropped
    pub fn gradients(&mut self) -> GradScope<'_, 'a, F> {
        let n = self.field.feature_count();
        self.tracked.clear();
        self.tracked.resize(n, Grad::default());
        GradScope { sampler: self }
    }
}

/// Scope in which field evaluation tracks derivatives
///
/// Tracked intermediate state is released when the scope is dropped, even if
/// evaluation failed partway through.
pub struct GradScope<'s, 'a, F: Field> {
    sampler: &'s mut Sampler<'a, F>,
}

impl<F: Field> GradScope<'_, '_, F> {
    /// Evaluates values, exact gradients, and features at a set of points
    ///
    /// Results are detached from derivative tracking and written to `out`,
    /// replacing its previous contents.
    pub fn eval(
        &mut self,
        ps: &[Vector3<f32>],
        out: &mut SurfaceSamples,
    ) -> Result<(), Error> {
        let s = &mut *self.sampler;
        let n = s.field.feature_count();
        out.clear(n);
        out.values.reserve(ps.len());
        out.gradients.reserve(ps.len());
        out.features.reserve(ps.len() * n);

        for &p in ps {
            s.check_domain(p)?;
            let g = s.field.eval(
                [Grad::x(p.x), Grad::y(p.y), Grad::z(p.z)],
                &mut s.tracked[..],
            );
            out.values.push(Sampler::<F>::check_value(g.v, p)?);
            out.gradients.push(g.gradient());
            out.features.extend(s.tracked.iter().map(|f| f.v));
        }
        Ok(())
    }
}

impl<F: Field> Drop for GradScope<'_, '_, F> {
    fn drop(&mut self) {
        self.sampler.tracked.clear();
    }
}

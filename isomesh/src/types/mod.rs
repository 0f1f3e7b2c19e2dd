//! Custom types used during evaluation
mod grad;
pub use grad::Grad;

/// Numeric type that a field can be evaluated on
///
/// Fields are written once, generic over `Value`, and evaluated either with
/// plain `f32` (values only) or with [`Grad`] (values and exact partial
/// derivatives).
pub trait Value:
    Copy
    + Send
    + Sync
    + std::fmt::Debug
    + std::ops::Add<Output = Self>
    + std::ops::Sub<Output = Self>
    + std::ops::Mul<Output = Self>
    + std::ops::Div<Output = Self>
    + std::ops::Neg<Output = Self>
{
    /// Builds a value that does not vary in space
    fn constant(v: f32) -> Self;
    /// Returns the plain value, discarding any derivatives
    fn value(&self) -> f32;

    /// Square root
    fn sqrt(self) -> Self;
    /// Absolute value
    fn abs(self) -> Self;
    /// Minimum of two values
    fn min(self, rhs: Self) -> Self;
    /// Maximum of two values
    fn max(self, rhs: Self) -> Self;
    /// Sine
    fn sin(self) -> Self;
    /// Cosine
    fn cos(self) -> Self;
    /// Exponential function
    fn exp(self) -> Self;
    /// Natural log of `1 + self`
    fn ln_1p(self) -> Self;

    /// Square
    fn square(self) -> Self {
        self * self
    }
}

impl Value for f32 {
    fn constant(v: f32) -> Self {
        v
    }
    fn value(&self) -> f32 {
        *self
    }
    fn sqrt(self) -> Self {
        f32::sqrt(self)
    }
    fn abs(self) -> Self {
        f32::abs(self)
    }
    fn min(self, rhs: Self) -> Self {
        f32::min(self, rhs)
    }
    fn max(self, rhs: Self) -> Self {
        f32::max(self, rhs)
    }
    fn sin(self) -> Self {
        f32::sin(self)
    }
    fn cos(self) -> Self {
        f32::cos(self)
    }
    fn exp(self) -> Self {
        f32::exp(self)
    }
    fn ln_1p(self) -> Self {
        f32::ln_1p(self)
    }
}

impl Value for Grad {
    fn constant(v: f32) -> Self {
        Grad::from(v)
    }
    fn value(&self) -> f32 {
        self.v
    }
    fn sqrt(self) -> Self {
        Grad::sqrt(self)
    }
    fn abs(self) -> Self {
        Grad::abs(self)
    }
    fn min(self, rhs: Self) -> Self {
        Grad::min(self, rhs)
    }
    fn max(self, rhs: Self) -> Self {
        Grad::max(self, rhs)
    }
    fn sin(self) -> Self {
        Grad::sin(self)
    }
    fn cos(self) -> Self {
        Grad::cos(self)
    }
    fn exp(self) -> Self {
        Grad::exp(self)
    }
    fn ln_1p(self) -> Self {
        Grad::ln_1p(self)
    }
}

use nalgebra::Vector3;

/// Dual number carrying a value and its partial derivatives
///
/// Arithmetic on `Grad` values is forward-mode automatic differentiation:
/// seeding the inputs with [`Grad::x`], [`Grad::y`], and [`Grad::z`] and
/// evaluating a function yields the function's exact gradient at that point.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct Grad {
    /// Value
    pub v: f32,
    /// Partial derivative with respect to `x`
    pub dx: f32,
    /// Partial derivative with respect to `y`
    pub dy: f32,
    /// Partial derivative with respect to `z`
    pub dz: f32,
}

impl Grad {
    /// Builds a new value with the given partial derivatives
    pub fn new(v: f32, dx: f32, dy: f32, dz: f32) -> Self {
        Self { v, dx, dy, dz }
    }

    /// Seeds the `x` input
    pub fn x(v: f32) -> Self {
        Self::new(v, 1.0, 0.0, 0.0)
    }

    /// Seeds the `y` input
    pub fn y(v: f32) -> Self {
        Self::new(v, 0.0, 1.0, 0.0)
    }

    /// Seeds the `z` input
    pub fn z(v: f32) -> Self {
        Self::new(v, 0.0, 0.0, 1.0)
    }

    /// Returns the partial derivative along an axis (0 = x, 1 = y, 2 = z)
    ///
    /// # Panics
    /// If the axis is not in the 0-2 range
    pub fn d(&self, axis: usize) -> f32 {
        self.gradient()[axis]
    }

    /// Returns the partial derivatives as a vector
    pub fn gradient(&self) -> Vector3<f32> {
        Vector3::new(self.dx, self.dy, self.dz)
    }

    /// Applies a unary function with value `v` and derivative `dv` at
    /// `self.v`, scaling the partials by the chain rule
    fn chain(self, v: f32, dv: f32) -> Self {
        Self::new(v, self.dx * dv, self.dy * dv, self.dz * dv)
    }

    /// Absolute value
    pub fn abs(self) -> Self {
        if self.v < 0.0 { -self } else { self }
    }

    /// Square root
    pub fn sqrt(self) -> Self {
        let v = self.v.sqrt();
        self.chain(v, 0.5 / v)
    }

    /// Sine
    pub fn sin(self) -> Self {
        self.chain(self.v.sin(), self.v.cos())
    }

    /// Cosine
    pub fn cos(self) -> Self {
        self.chain(self.v.cos(), -self.v.sin())
    }

    /// Exponential function
    pub fn exp(self) -> Self {
        let v = self.v.exp();
        self.chain(v, v)
    }

    /// Natural log of `1 + self`, accurate for small values
    pub fn ln_1p(self) -> Self {
        self.chain(self.v.ln_1p(), 1.0 / (1.0 + self.v))
    }

    /// Minimum of two values, taking the derivatives of the smaller one
    pub fn min(self, rhs: Self) -> Self {
        if self.v < rhs.v { self } else { rhs }
    }

    /// Maximum of two values, taking the derivatives of the larger one
    pub fn max(self, rhs: Self) -> Self {
        if self.v > rhs.v { self } else { rhs }
    }

    /// Checks that the two values are roughly equal, panicking otherwise
    #[cfg(test)]
    pub(crate) fn compare_eq(&self, other: Self) {
        let d = (self.v - other.v)
            .abs()
            .max((self.gradient() - other.gradient()).amax());
        assert!(d < 1e-6, "lhs != rhs ({self:?} != {other:?})");
    }
}

impl From<f32> for Grad {
    fn from(v: f32) -> Self {
        Self::new(v, 0.0, 0.0, 0.0)
    }
}

impl std::ops::Add for Grad {
    type Output = Self;
    fn add(self, rhs: Self) -> Self {
        Self::new(
            self.v + rhs.v,
            self.dx + rhs.dx,
            self.dy + rhs.dy,
            self.dz + rhs.dz,
        )
    }
}

impl std::ops::Sub for Grad {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self {
        self + (-rhs)
    }
}

impl std::ops::Mul for Grad {
    type Output = Self;
    fn mul(self, rhs: Self) -> Self {
        let (a, b) = (self.v, rhs.v);
        Self::new(
            a * b,
            a * rhs.dx + b * self.dx,
            a * rhs.dy + b * self.dy,
            a * rhs.dz + b * self.dz,
        )
    }
}

impl std::ops::Div for Grad {
    type Output = Self;
    fn div(self, rhs: Self) -> Self {
        // Quotient rule, written as `self * (1 / rhs)`
        let r = 1.0 / rhs.v;
        self * rhs.chain(r, -r * r)
    }
}

impl std::ops::Neg for Grad {
    type Output = Self;
    fn neg(self) -> Self {
        Self::new(-self.v, -self.dx, -self.dy, -self.dz)
    }
}

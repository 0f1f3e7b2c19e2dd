//! Neural fields: a geometry network and a color network
//!
//! These follow the layout used by NeuS-style surface reconstruction:
//!
//! - [`SdfNetwork`] maps a position to a signed distance plus a feature
//!   vector, using softplus activations (so the field is smooth and its
//!   gradient is well-defined everywhere)
//! - [`ColorNetwork`] maps `(position, view direction, normal, features)` to
//!   an RGB color, with ReLU activations and a sigmoid output
//!
//! Both are stored in a [`Checkpoint`], which is packed with `bincode`.
//! Training is out of scope; checkpoints are produced elsewhere.
use super::{Appearance, Field};
use crate::{Error, bounds::BoundingVolume, types::Value};
use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

/// Fully-connected layer, `y = W x + b`
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Linear {
    inputs: usize,
    outputs: usize,
    /// Row-major weights, `outputs` rows of `inputs` values
    weights: Vec<f32>,
    bias: Vec<f32>,
}

impl Linear {
    /// Builds a new layer, checking that weights and bias have the right size
    pub fn new(
        inputs: usize,
        outputs: usize,
        weights: Vec<f32>,
        bias: Vec<f32>,
    ) -> Result<Self, Error> {
        let out = Self {
            inputs,
            outputs,
            weights,
            bias,
        };
        out.validate()?;
        Ok(out)
    }

    /// Number of inputs
    pub fn inputs(&self) -> usize {
        self.inputs
    }

    /// Number of outputs
    pub fn outputs(&self) -> usize {
        self.outputs
    }

    fn validate(&self) -> Result<(), Error> {
        if self.weights.len() != self.inputs * self.outputs {
            return Err(Error::ShapeMismatch {
                what: "layer weights",
                expected: self.inputs * self.outputs,
                actual: self.weights.len(),
            });
        }
        if self.bias.len() != self.outputs {
            return Err(Error::ShapeMismatch {
                what: "layer bias",
                expected: self.outputs,
                actual: self.bias.len(),
            });
        }
        Ok(())
    }

    fn apply<T: Value>(&self, x: &[T], out: &mut Vec<T>) {
        debug_assert_eq!(x.len(), self.inputs);
        out.clear();
        out.extend(
            self.weights
                .chunks_exact(self.inputs.max(1))
                .zip(&self.bias)
                .map(|(row, &b)| {
                    row.iter()
                        .zip(x)
                        .fold(T::constant(b), |acc, (&w, &v)| {
                            acc + v * T::constant(w)
                        })
                }),
        );
    }
}

/// Checks that a stack of layers can be chained together
///
/// `extra[i]` is the number of inputs concatenated before layer `i`.
fn check_chain(
    what: &'static str,
    inputs: usize,
    layers: &[Linear],
    extra: impl Fn(usize) -> usize,
) -> Result<(), Error> {
    let mut width = inputs;
    for (i, layer) in layers.iter().enumerate() {
        layer.validate()?;
        let expected = width + extra(i);
        if layer.inputs != expected {
            return Err(Error::ShapeMismatch {
                what,
                expected,
                actual: layer.inputs,
            });
        }
        width = layer.outputs;
    }
    if layers.is_empty() {
        return Err(Error::ShapeMismatch {
            what,
            expected: 1,
            actual: 0,
        });
    }
    Ok(())
}

/// Sinusoidal positional encoding
///
/// With `n` frequencies, a 3-vector `p` is encoded as
/// `[p, sin(p), cos(p), sin(2p), cos(2p), ..., sin(2^(n-1) p), cos(...)]`.
fn encode<T: Value>(p: [T; 3], frequencies: usize, out: &mut Vec<T>) {
    out.extend(p);
    let mut f = 1.0;
    for _ in 0..frequencies {
        out.extend(p.map(|v| (v * T::constant(f)).sin()));
        out.extend(p.map(|v| (v * T::constant(f)).cos()));
        f *= 2.0;
    }
}

fn encoded_width(frequencies: usize) -> usize {
    3 + 3 * 2 * frequencies
}

/// Softplus with a sharpness parameter, falling back to the identity where
/// `beta * x` is large (as is conventional)
fn softplus<T: Value>(x: T, beta: f32) -> T {
    let bx = x * T::constant(beta);
    if bx.value() > 20.0 {
        x
    } else {
        bx.exp().ln_1p() / T::constant(beta)
    }
}

fn relu<T: Value>(x: T) -> T {
    x.max(T::constant(0.0))
}

fn sigmoid<T: Value>(x: T) -> T {
    T::constant(1.0) / (T::constant(1.0) + (-x).exp())
}

////////////////////////////////////////////////////////////////////////////////

/// Geometry network: position to signed distance and features
///
/// Output channel 0 is the distance; the remaining channels are features that
/// are handed to the [`ColorNetwork`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SdfNetwork {
    layers: Vec<Linear>,
    /// Number of positional encoding frequencies (0 disables encoding)
    multires: usize,
    /// Layers before which the encoded input is concatenated again
    skip_in: Vec<usize>,
    /// Positions are multiplied by `scale` on input, distances divided by it
    scale: f32,
    /// Softplus sharpness
    beta: f32,
}

impl SdfNetwork {
    /// Builds a new geometry network, checking layer shapes
    pub fn new(
        layers: Vec<Linear>,
        multires: usize,
        skip_in: Vec<usize>,
        scale: f32,
        beta: f32,
    ) -> Result<Self, Error> {
        let out = Self {
            layers,
            multires,
            skip_in,
            scale,
            beta,
        };
        out.validate()?;
        Ok(out)
    }

    /// Checks that layers chain together and produce at least a distance
    pub fn validate(&self) -> Result<(), Error> {
        let width = encoded_width(self.multires);
        check_chain("sdf network input", width, &self.layers, |i| {
            if i > 0 && self.skip_in.contains(&i) {
                width
            } else {
                0
            }
        })?;
        match self.layers.last() {
            Some(l) if l.outputs == 0 => Err(Error::ShapeMismatch {
                what: "sdf network output",
                expected: 1,
                actual: 0,
            }),
            _ => Ok(()),
        }
    }

    fn forward<T: Value>(&self, p: [T; 3], out: &mut Vec<T>) {
        let scale = T::constant(self.scale);
        let mut input = vec![];
        encode(p.map(|v| v * scale), self.multires, &mut input);

        let root2 = T::constant(std::f32::consts::SQRT_2);
        let mut x = input.clone();
        let last = self.layers.len() - 1;
        for (i, layer) in self.layers.iter().enumerate() {
            if i > 0 && self.skip_in.contains(&i) {
                x.extend(input.iter().cloned());
                x.iter_mut().for_each(|v| *v = *v / root2);
            }
            layer.apply(&x, out);
            if i != last {
                out.iter_mut().for_each(|v| *v = softplus(*v, self.beta));
                std::mem::swap(&mut x, out);
            }
        }
    }
}

impl Field for SdfNetwork {
    fn feature_count(&self) -> usize {
        self.layers.last().map(|l| l.outputs - 1).unwrap_or(0)
    }

    fn eval<T: Value>(&self, p: [T; 3], features: &mut [T]) -> T {
        let mut out = vec![];
        self.forward(p, &mut out);
        features.copy_from_slice(&out[1..]);
        out[0] / T::constant(self.scale)
    }
}

/// Which inputs the [`ColorNetwork`] consumes
#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum ColorMode {
    /// Position, view direction, normal, and features
    Idr,
    /// Position, normal, and features
    NoViewDir,
    /// Position, view direction, and features
    NoNormal,
}

/// Color network: surface sample to RGB
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ColorNetwork {
    layers: Vec<Linear>,
    mode: ColorMode,
    /// Number of positional encoding frequencies for the view direction
    multires_view: usize,
    /// Number of feature channels expected from the geometry network
    features: usize,
    /// Apply a sigmoid to the output, squashing it into `[0, 1]`
    squash: bool,
}

impl ColorNetwork {
    /// Builds a new color network, checking layer shapes
    pub fn new(
        layers: Vec<Linear>,
        mode: ColorMode,
        multires_view: usize,
        features: usize,
        squash: bool,
    ) -> Result<Self, Error> {
        let out = Self {
            layers,
            mode,
            multires_view,
            features,
            squash,
        };
        out.validate()?;
        Ok(out)
    }

    fn input_width(&self) -> usize {
        let view = encoded_width(self.multires_view);
        3 + self.features
            + match self.mode {
                ColorMode::Idr => view + 3,
                ColorMode::NoViewDir => 3,
                ColorMode::NoNormal => view,
            }
    }

    /// Checks that layers chain together
    pub fn validate(&self) -> Result<(), Error> {
        let width = self.input_width();
        check_chain("color network input", width, &self.layers, |_| 0)
    }

    /// Number of output channels
    pub fn outputs(&self) -> usize {
        self.layers.last().map(|l| l.outputs).unwrap_or(0)
    }
}

impl Appearance for ColorNetwork {
    fn eval(
        &self,
        position: Vector3<f32>,
        normal: Vector3<f32>,
        view_dir: Vector3<f32>,
        features: &[f32],
        out: &mut Vec<f32>,
    ) -> Result<(), Error> {
        if features.len() != self.features {
            return Err(Error::ShapeMismatch {
                what: "color network features",
                expected: self.features,
                actual: features.len(),
            });
        }
        let mut x = Vec::with_capacity(self.input_width());
        x.extend(position.iter());
        if self.mode != ColorMode::NoViewDir {
            encode(view_dir.into(), self.multires_view, &mut x);
        }
        if self.mode != ColorMode::NoNormal {
            x.extend(normal.iter());
        }
        x.extend_from_slice(features);

        let last = self.layers.len() - 1;
        let mut y = vec![];
        for (i, layer) in self.layers.iter().enumerate() {
            layer.apply(&x, &mut y);
            if i != last {
                y.iter_mut().for_each(|v| *v = relu(*v));
                std::mem::swap(&mut x, &mut y);
            }
        }
        if self.squash {
            y.iter_mut().for_each(|v| *v = sigmoid(*v));
        }
        out.extend(y);
        Ok(())
    }
}

/// Trained geometry and color networks, plus the region they were trained on
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Checkpoint {
    /// Geometry network
    pub sdf: SdfNetwork,
    /// Color network
    pub color: ColorNetwork,
    /// Object bounds, if known
    pub bounds: Option<BoundingVolume>,
}

impl Checkpoint {
    /// Reads a `bincode`-packed checkpoint and checks its layer shapes
    pub fn load<R: std::io::Read>(r: R) -> Result<Self, Error> {
        let c: Self = bincode::deserialize_from(r)?;
        c.validate()?;
        Ok(c)
    }

    /// Reads a checkpoint from a file
    pub fn from_file<P: AsRef<std::path::Path>>(
        path: P,
    ) -> Result<Self, Error> {
        let f = std::fs::File::open(path)?;
        Self::load(std::io::BufReader::new(f))
    }

    /// Writes a `bincode`-packed checkpoint
    pub fn save<W: std::io::Write>(&self, w: W) -> Result<(), Error> {
        bincode::serialize_into(w, self)?;
        Ok(())
    }

    /// Checks that both networks are well-formed and agree on features
    pub fn validate(&self) -> Result<(), Error> {
        self.sdf.validate()?;
        self.color.validate()?;
        let n = self.sdf.feature_count();
        if n != self.color.features {
            return Err(Error::ShapeMismatch {
                what: "checkpoint feature channels",
                expected: n,
                actual: self.color.features,
            });
        }
        Ok(())
    }
}

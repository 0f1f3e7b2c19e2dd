//! Per-vertex colorization
//!
//! Each vertex is colored by evaluating an [`Appearance`] at the vertex
//! position, using the field's exact gradient (computed with forward-mode
//! automatic differentiation) as the surface normal.
//!
//! Vertices are processed in consecutive batches of at most
//! [`ColorSettings::batch_size`], which bounds the amount of derivative state
//! that is alive at any given time.  Batches are independent, so they may be
//! evaluated in parallel; results are always assembled in input order, and
//! the output does not depend on batch size or thread count.
use crate::{
    CancelToken, Error, ThreadPool,
    field::{Appearance, Field, Sampler, SurfaceSamples},
};
use log::info;
use nalgebra::Vector3;
use rayon::prelude::*;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Settings when colorizing a mesh
pub struct ColorSettings<'a> {
    /// Maximum number of vertices to evaluate at once
    ///
    /// This must be non-zero; it affects peak memory but not the result.
    pub batch_size: usize,

    /// View direction passed to the appearance function for every vertex
    ///
    /// The default is the zero vector, which gives view-independent colors.
    pub view_dir: Vector3<f32>,

    /// Normalize gradients before using them as normals
    ///
    /// A zero gradient is passed through unchanged.
    pub normalize_normals: bool,

    /// Thread pool to use for colorization
    ///
    /// If this is `None`, then batches are evaluated in a single thread;
    /// otherwise, the provided pool is used.
    pub threads: Option<&'a ThreadPool>,

    /// Token to cancel colorization
    pub cancel: CancelToken,
}

impl Default for ColorSettings<'_> {
    fn default() -> Self {
        Self {
            batch_size: 1000,
            view_dir: Vector3::zeros(),
            normalize_normals: false,
            threads: Some(&ThreadPool::Global),
            cancel: CancelToken::new(),
        }
    }
}

/// Receives progress notifications during colorization
///
/// Observers are purely informational and cannot affect the result.  When
/// batches run in parallel, notifications may arrive from any worker thread,
/// but `done` is always the total number of vertices processed so far.
pub trait Observer: Sync {
    /// Called after each batch is finished
    fn batch_done(&self, done: usize, total: usize);
}

/// Observer which ignores all notifications
#[derive(Copy, Clone, Debug, Default)]
pub struct NoopObserver;

impl Observer for NoopObserver {
    fn batch_done(&self, _done: usize, _total: usize) {}
}

/// Observer which logs progress at a fixed cadence
pub struct LogObserver {
    every: usize,
    /// Highest multiple of `every` that has been logged so far
    logged: AtomicUsize,
}

impl LogObserver {
    /// Builds an observer which logs every `every` vertices
    pub fn new(every: usize) -> Self {
        Self {
            every: every.max(1),
            logged: AtomicUsize::new(0),
        }
    }
}

impl Default for LogObserver {
    fn default() -> Self {
        Self::new(10_000)
    }
}

impl Observer for LogObserver {
    fn batch_done(&self, done: usize, total: usize) {
        let step = done / self.every;
        if self.logged.fetch_max(step, Ordering::Relaxed) < step {
            info!("processed {done}/{total} vertices");
        }
    }
}

/// Converts a color channel in `[0, 1]` to a byte
///
/// Values are clamped to `[0, 1]`, then scaled and rounded down; NaN maps to
/// 0.
pub fn quantize(c: f32) -> u8 {
    if c.is_nan() {
        0
    } else {
        (c.clamp(0.0, 1.0) * 255.0).floor() as u8
    }
}

/// Per-channel minimum and maximum colors, for diagnostics
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct ColorStats {
    /// Per-channel minimum
    pub min: [u8; 3],
    /// Per-channel maximum
    pub max: [u8; 3],
}

impl ColorStats {
    /// Computes per-channel ranges, returning `None` if there are no colors
    pub fn from_colors(colors: &[[u8; 3]]) -> Option<Self> {
        let first = *colors.first()?;
        let mut out = Self {
            min: first,
            max: first,
        };
        for c in colors {
            for i in 0..3 {
                out.min[i] = out.min[i].min(c[i]);
                out.max[i] = out.max[i].max(c[i]);
            }
        }
        Some(out)
    }
}

impl std::fmt::Display for ColorStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "min={:?}, max={:?}", self.min, self.max)
    }
}

/// Per-thread colorization state
struct Worker<'a, F> {
    sampler: Sampler<'a, F>,
    samples: SurfaceSamples,
    channels: Vec<f32>,
}

impl<'a, F: Field> Worker<'a, F> {
    fn new(field: &'a F) -> Self {
        Self {
            sampler: Sampler::new(field),
            samples: SurfaceSamples::default(),
            channels: Vec::with_capacity(3),
        }
    }

    fn run<A: Appearance>(
        &mut self,
        batch: &[Vector3<f32>],
        appearance: &A,
        settings: &ColorSettings,
        out: &mut [[u8; 3]],
    ) -> Result<(), Error> {
        // Derivative tracking is only enabled for this statement
        self.sampler.gradients().eval(batch, &mut self.samples)?;

        for (i, (&p, c)) in batch.iter().zip(out.iter_mut()).enumerate() {
            let g = self.samples.gradients[i];
            let normal = if settings.normalize_normals {
                g.try_normalize(0.0).unwrap_or(g)
            } else {
                g
            };
            self.channels.clear();
            appearance.eval(
                p,
                normal,
                settings.view_dir,
                self.samples.features(i),
                &mut self.channels,
            )?;
            let [red, green, blue] = self.channels[..] else {
                return Err(Error::ShapeMismatch {
                    what: "appearance output",
                    expected: 3,
                    actual: self.channels.len(),
                });
            };
            *c = [quantize(red), quantize(green), quantize(blue)];
        }
        Ok(())
    }
}

/// Computes a color for each vertex
///
/// The result has the same length and order as `vertices`.  An empty vertex
/// list is a no-op that returns an empty color list.
///
/// Fails with [`Error::InvalidBatchSize`] if the batch size is zero, with
/// [`Error::ShapeMismatch`] if the appearance function does not return three
/// channels, with field evaluation errors from the [`Sampler`], and with
/// [`Error::Cancelled`] if the cancel token is set (which is checked before
/// each batch).
pub fn colorize<F: Field, A: Appearance>(
    vertices: &[Vector3<f32>],
    field: &F,
    appearance: &A,
    settings: &ColorSettings,
    observer: &dyn Observer,
) -> Result<Vec<[u8; 3]>, Error> {
    let n = settings.batch_size;
    if n == 0 {
        return Err(Error::InvalidBatchSize);
    }
    let total = vertices.len();
    let mut colors = vec![[0u8; 3]; total];
    let done = AtomicUsize::new(0);

    let run = |w: &mut Worker<F>,
               batch: &[Vector3<f32>],
               out: &mut [[u8; 3]]|
     -> Result<(), Error> {
        settings.cancel.check()?;
        w.run(batch, appearance, settings, out)?;
        let d = done.fetch_add(batch.len(), Ordering::Relaxed) + batch.len();
        log::debug!("finished batch of {} vertices", batch.len());
        observer.batch_done(d, total);
        Ok(())
    };

    match settings.threads {
        None => {
            let mut w = Worker::new(field);
            vertices
                .chunks(n)
                .zip(colors.chunks_mut(n))
                .try_for_each(|(batch, out)| run(&mut w, batch, out))?;
        }
        Some(p) => p.run(|| {
            vertices
                .par_chunks(n)
                .zip(colors.par_chunks_mut(n))
                .try_for_each_init(
                    || Worker::new(field),
                    |w, (batch, out)| run(w, batch, out),
                )
        })?,
    }
    Ok(colors)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        field::shapes::{ConstantColor, NormalColor, Sphere},
        types::Value,
    };
    use std::sync::Mutex;

    fn ring(n: usize) -> Vec<Vector3<f32>> {
        (0..n)
            .map(|i| {
                let a = i as f32 * 0.1;
                Vector3::new(a.cos(), a.sin(), (a * 0.3).sin()) * 0.5
            })
            .collect()
    }

    #[test]
    fn test_quantize() {
        assert_eq!(quantize(0.0), 0);
        assert_eq!(quantize(1.0), 255);
        assert_eq!(quantize(0.5), 127);
        assert_eq!(quantize(-3.0), 0);
        assert_eq!(quantize(7.0), 255);
        assert_eq!(quantize(f32::NAN), 0);
        assert_eq!(quantize(f32::INFINITY), 255);
    }

    #[test]
    fn test_batch_invariance() {
        let sphere = Sphere::new(Vector3::new(0.1, 0.0, -0.1), 0.5);
        let vs = ring(57);
        let color = |batch_size, threads| {
            let settings = ColorSettings {
                batch_size,
                threads,
                ..Default::default()
            };
            colorize(&vs, &sphere, &NormalColor, &settings, &NoopObserver)
                .unwrap()
        };
        let expected = color(vs.len(), None);
        assert_eq!(expected.len(), vs.len());
        for batch_size in [1, 7, vs.len(), vs.len() + 100] {
            assert_eq!(color(batch_size, None), expected);
            assert_eq!(color(batch_size, Some(&ThreadPool::Global)), expected);
        }
    }

    #[test]
    fn test_normals() {
        // Appearance which returns its normal directly
        struct Raw;
        impl Appearance for Raw {
            fn eval(
                &self,
                _p: Vector3<f32>,
                n: Vector3<f32>,
                _v: Vector3<f32>,
                _f: &[f32],
                out: &mut Vec<f32>,
            ) -> Result<(), Error> {
                out.extend(n.iter());
                Ok(())
            }
        }
        // Field with gradient (0.5, 0, 0) everywhere
        struct Slope;
        impl Field for Slope {
            fn eval<T: Value>(&self, p: [T; 3], _f: &mut [T]) -> T {
                p[0] * T::constant(0.5)
            }
        }
        let vs = [Vector3::zeros()];
        let mut settings = ColorSettings::default();
        let c = colorize(&vs, &Slope, &Raw, &settings, &NoopObserver);
        assert_eq!(c.unwrap(), vec![[127, 0, 0]]);

        settings.normalize_normals = true;
        let c = colorize(&vs, &Slope, &Raw, &settings, &NoopObserver);
        assert_eq!(c.unwrap(), vec![[255, 0, 0]]);
    }

    #[test]
    fn test_view_dir() {
        struct View;
        impl Appearance for View {
            fn eval(
                &self,
                _p: Vector3<f32>,
                _n: Vector3<f32>,
                v: Vector3<f32>,
                _f: &[f32],
                out: &mut Vec<f32>,
            ) -> Result<(), Error> {
                out.extend(v.iter());
                Ok(())
            }
        }
        let sphere = Sphere::new(Vector3::zeros(), 0.5);
        let vs = ring(3);
        let c = colorize(
            &vs,
            &sphere,
            &View,
            &ColorSettings::default(),
            &NoopObserver,
        );
        assert_eq!(c.unwrap(), vec![[0, 0, 0]; 3]);

        let settings = ColorSettings {
            view_dir: Vector3::new(0.0, 1.0, 0.0),
            ..Default::default()
        };
        let c = colorize(&vs, &sphere, &View, &settings, &NoopObserver);
        assert_eq!(c.unwrap(), vec![[0, 255, 0]; 3]);
    }

    #[test]
    fn test_errors() {
        let sphere = Sphere::new(Vector3::zeros(), 0.5);
        let red = ConstantColor([1.0, 0.0, 0.0]);
        let vs = ring(10);

        let settings = ColorSettings {
            batch_size: 0,
            ..Default::default()
        };
        assert!(matches!(
            colorize(&vs, &sphere, &red, &settings, &NoopObserver),
            Err(Error::InvalidBatchSize)
        ));

        struct Gray;
        impl Appearance for Gray {
            fn eval(
                &self,
                _p: Vector3<f32>,
                _n: Vector3<f32>,
                _v: Vector3<f32>,
                _f: &[f32],
                out: &mut Vec<f32>,
            ) -> Result<(), Error> {
                out.push(0.5);
                Ok(())
            }
        }
        assert!(matches!(
            colorize(&vs, &sphere, &Gray, &Default::default(), &NoopObserver),
            Err(Error::ShapeMismatch {
                expected: 3,
                actual: 1,
                ..
            })
        ));

        let settings = ColorSettings::default();
        settings.cancel.cancel();
        assert!(matches!(
            colorize(&vs, &sphere, &red, &settings, &NoopObserver),
            Err(Error::Cancelled)
        ));

        let c = colorize(&[], &sphere, &red, &settings, &NoopObserver);
        assert!(c.unwrap().is_empty());
    }

    #[test]
    fn test_observer() {
        #[derive(Default)]
        struct Record(Mutex<Vec<(usize, usize)>>);
        impl Observer for Record {
            fn batch_done(&self, done: usize, total: usize) {
                self.0.lock().unwrap().push((done, total));
            }
        }
        let sphere = Sphere::new(Vector3::zeros(), 0.5);
        let red = ConstantColor([1.0, 0.0, 0.0]);
        let vs = ring(10);
        let settings = ColorSettings {
            batch_size: 4,
            threads: None,
            ..Default::default()
        };
        let r = Record::default();
        colorize(&vs, &sphere, &red, &settings, &r).unwrap();
        assert_eq!(r.0.into_inner().unwrap(), [(4, 10), (8, 10), (10, 10)]);
    }

    #[test]
    fn test_log_observer_cadence() {
        let o = LogObserver::new(10);
        o.batch_done(4, 30);
        assert_eq!(o.logged.load(Ordering::Relaxed), 0);
        o.batch_done(12, 30);
        assert_eq!(o.logged.load(Ordering::Relaxed), 1);
        o.batch_done(30, 30);
        assert_eq!(o.logged.load(Ordering::Relaxed), 3);
    }

    #[test]
    fn test_color_stats() {
        assert_eq!(ColorStats::from_colors(&[]), None);
        let s = ColorStats::from_colors(&[[1, 200, 3], [4, 5, 6]]).unwrap();
        assert_eq!(s.min, [1, 5, 3]);
        assert_eq!(s.max, [4, 200, 6]);
    }
}

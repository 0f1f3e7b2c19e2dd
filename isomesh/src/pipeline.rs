//! Orchestration of extraction, colorization, and export
//!
//! A [`Pipeline`] is a small state machine which drives the three stages in
//! order:
//!
//! ```text
//! Initialized ──> GeometryExtracted ──> Colorized ──> Exported
//!      │
//!      └────────> EmptyGeometry
//! ```
//!
//! Transitions only go forward.  If extraction yields no vertices, the
//! pipeline stops in [`State::EmptyGeometry`] without colorizing or writing
//! anything; this is an outcome, not an error.  Any other failure is returned
//! to the caller immediately.
use crate::{
    CancelToken, Error, ThreadPool,
    bounds::BoundingVolume,
    color::{self, ColorSettings, ColorStats, LogObserver, Observer},
    field::{Appearance, Field},
    mesh::{self, Mesh, MeshStats, PlyFormat},
};
use log::info;
use nalgebra::Vector3;
use std::path::PathBuf;

/// Subdirectory of the output directory in which meshes are written
pub const OUTPUT_SUBDIR: &str = "colored_meshes";
/// File name of the colored mesh
pub const COLORED_MESH: &str = "colored_mesh.ply";
/// File name of the fixed-color debug mesh
pub const DEBUG_MESH: &str = "simple_colored_mesh.ply";

/// Pipeline state
#[derive(Copy, Clone, Debug, Eq, PartialEq, strum::Display)]
pub enum State {
    /// Nothing has been done yet
    Initialized,
    /// A non-empty mesh has been extracted
    GeometryExtracted,
    /// Every vertex has a color
    Colorized,
    /// Both meshes have been written (terminal)
    Exported,
    /// Extraction produced no vertices (terminal)
    EmptyGeometry,
}

impl State {
    /// Checks whether this is a terminal state
    pub fn is_terminal(&self) -> bool {
        matches!(self, State::Exported | State::EmptyGeometry)
    }
}

/// Settings for a full pipeline run
pub struct PipelineSettings<'a> {
    /// Directory in which the `colored_meshes` subdirectory is created
    pub out_dir: PathBuf,
    /// Volume over which the field is sampled
    pub bounds: BoundingVolume,
    /// Number of lattice points along each axis
    pub resolution: usize,
    /// Isovalue for extraction
    pub threshold: f32,
    /// Maximum number of vertices to colorize at once
    pub batch_size: usize,
    /// View direction passed to the appearance function
    pub view_dir: Vector3<f32>,
    /// Normalize gradients before using them as normals
    pub normalize_normals: bool,
    /// Color of every vertex in the debug mesh
    pub debug_color: [u8; 3],
    /// PLY encoding for both output files
    pub format: PlyFormat,
    /// Thread pool for sampling and colorization (`None` for single-threaded)
    pub threads: Option<&'a ThreadPool>,
    /// Token to cancel the run
    pub cancel: CancelToken,
}

impl Default for PipelineSettings<'_> {
    fn default() -> Self {
        let c = ColorSettings::default();
        let m = mesh::Settings::default();
        Self {
            out_dir: PathBuf::from("."),
            bounds: BoundingVolume::default(),
            resolution: m.resolution,
            threshold: m.threshold,
            batch_size: c.batch_size,
            view_dir: c.view_dir,
            normalize_normals: c.normalize_normals,
            debug_color: [255, 0, 0],
            format: PlyFormat::default(),
            threads: Some(&ThreadPool::Global),
            cancel: CancelToken::new(),
        }
    }
}

impl PipelineSettings<'_> {
    /// Returns the path of the colored mesh
    pub fn colored_path(&self) -> PathBuf {
        self.out_dir.join(OUTPUT_SUBDIR).join(COLORED_MESH)
    }

    /// Returns the path of the debug mesh
    pub fn debug_path(&self) -> PathBuf {
        self.out_dir.join(OUTPUT_SUBDIR).join(DEBUG_MESH)
    }

    fn mesh_settings(&self) -> mesh::Settings<'_> {
        mesh::Settings {
            resolution: self.resolution,
            threshold: self.threshold,
            threads: self.threads,
            cancel: self.cancel.clone(),
        }
    }

    fn color_settings(&self) -> ColorSettings<'_> {
        ColorSettings {
            batch_size: self.batch_size,
            view_dir: self.view_dir,
            normalize_normals: self.normalize_normals,
            threads: self.threads,
            cancel: self.cancel.clone(),
        }
    }
}

/// Result of a completed run
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Outcome {
    /// Both meshes were written
    Exported {
        /// Path of the colored mesh
        colored: PathBuf,
        /// Path of the fixed-color debug mesh
        debug: PathBuf,
        /// Number of vertices in each mesh
        vertices: usize,
        /// Number of triangles in each mesh
        triangles: usize,
    },
    /// No geometry was extracted, so nothing was written
    EmptyGeometry,
}

/// Pipeline state, with the mesh while it is in flight
enum Stage {
    Initialized,
    GeometryExtracted(Mesh),
    Colorized(Mesh),
    Exported,
    EmptyGeometry,
}

/// State machine driving extraction, colorization, and export
pub struct Pipeline<'a, F, A> {
    field: &'a F,
    appearance: &'a A,
    settings: PipelineSettings<'a>,
    observer: Box<dyn Observer + 'a>,

    stage: Stage,
    stats: MeshStats,
}

impl<'a, F: Field, A: Appearance> Pipeline<'a, F, A> {
    /// Builds a new pipeline, which logs colorization progress
    pub fn new(
        field: &'a F,
        appearance: &'a A,
        settings: PipelineSettings<'a>,
    ) -> Self {
        Self {
            field,
            appearance,
            settings,
            observer: Box::new(LogObserver::default()),
            stage: Stage::Initialized,
            stats: MeshStats::default(),
        }
    }

    /// Replaces the colorization progress observer
    pub fn with_observer<O: Observer + 'a>(mut self, observer: O) -> Self {
        self.observer = Box::new(observer);
        self
    }

    /// Returns the current state
    pub fn state(&self) -> State {
        match self.stage {
            Stage::Initialized => State::Initialized,
            Stage::GeometryExtracted(..) => State::GeometryExtracted,
            Stage::Colorized(..) => State::Colorized,
            Stage::Exported => State::Exported,
            Stage::EmptyGeometry => State::EmptyGeometry,
        }
    }

    /// Returns the pipeline's settings
    pub fn settings(&self) -> &PipelineSettings<'a> {
        &self.settings
    }

    /// Returns the mesh, if it has been extracted and not yet exported
    pub fn mesh(&self) -> Option<&Mesh> {
        match &self.stage {
            Stage::GeometryExtracted(mesh) | Stage::Colorized(mesh) => {
                Some(mesh)
            }
            _ => None,
        }
    }

    /// Performs a single state transition, returning the new state
    ///
    /// Stepping a pipeline in a terminal state does nothing.  If a stage
    /// fails, the pipeline stays in its previous state.
    pub fn step(&mut self) -> Result<State, Error> {
        let s = &self.settings;
        let next = match &mut self.stage {
            Stage::Initialized => {
                let mesh = extract(self.field, s)?;
                self.stats = mesh.stats();
                if mesh.is_empty() {
                    info!(
                        "no geometry extracted; \
                         skipping colorization and export"
                    );
                    Stage::EmptyGeometry
                } else {
                    Stage::GeometryExtracted(mesh)
                }
            }
            Stage::GeometryExtracted(mesh) => {
                mesh.colors = colorize(
                    mesh,
                    self.field,
                    self.appearance,
                    s,
                    self.observer.as_ref(),
                )?;
                Stage::Colorized(std::mem::take(mesh))
            }
            Stage::Colorized(mesh) => {
                export(mesh, s)?;
                Stage::Exported
            }
            Stage::Exported => return Ok(State::Exported),
            Stage::EmptyGeometry => return Ok(State::EmptyGeometry),
        };
        self.stage = next;
        Ok(self.state())
    }

    /// Runs the pipeline until it reaches a terminal state
    pub fn run(mut self) -> Result<Outcome, Error> {
        while !self.state().is_terminal() {
            self.step()?;
        }
        Ok(match self.stage {
            Stage::Exported => Outcome::Exported {
                colored: self.settings.colored_path(),
                debug: self.settings.debug_path(),
                vertices: self.stats.vertices,
                triangles: self.stats.triangles,
            },
            _ => Outcome::EmptyGeometry,
        })
    }
}

fn extract<F: Field>(field: &F, s: &PipelineSettings) -> Result<Mesh, Error> {
    // Catch a bad batch size before doing any expensive work
    if s.batch_size == 0 {
        return Err(Error::InvalidBatchSize);
    }
    info!(
        "extracting geometry with resolution {} and threshold {}",
        s.resolution, s.threshold
    );
    let mesh = mesh::extract(field, &s.bounds, &s.mesh_settings())?;
    info!("extracted {}", mesh.stats());
    Ok(mesh)
}

fn colorize<F: Field, A: Appearance>(
    mesh: &Mesh,
    field: &F,
    appearance: &A,
    s: &PipelineSettings,
    observer: &dyn Observer,
) -> Result<Vec<[u8; 3]>, Error> {
    let colors = color::colorize(
        &mesh.vertices,
        field,
        appearance,
        &s.color_settings(),
        observer,
    )?;
    info!("color array size: {} x 3", colors.len());
    if let Some(stats) = ColorStats::from_colors(&colors) {
        info!("color value range: {stats}");
    }
    Ok(colors)
}

fn export(mesh: &Mesh, s: &PipelineSettings) -> Result<(), Error> {
    std::fs::create_dir_all(s.out_dir.join(OUTPUT_SUBDIR))?;

    let colored = s.colored_path();
    mesh::export(mesh, &colored, s.format)?;
    info!("colored mesh saved to {}", colored.display());

    let debug = s.debug_path();
    mesh::export_debug(mesh, s.debug_color, &debug, s.format)?;
    info!("debug mesh saved to {}", debug.display());
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::field::shapes::{ConstantColor, Sphere};
    use std::path::Path;

    #[test]
    fn test_state_names() {
        assert_eq!(State::GeometryExtracted.to_string(), "GeometryExtracted");
        assert!(State::EmptyGeometry.is_terminal());
        assert!(!State::Colorized.is_terminal());
    }

    #[test]
    fn test_paths() {
        let s = PipelineSettings {
            out_dir: PathBuf::from("base"),
            ..Default::default()
        };
        assert_eq!(
            s.colored_path(),
            Path::new("base/colored_meshes/colored_mesh.ply")
        );
        assert_eq!(
            s.debug_path(),
            Path::new("base/colored_meshes/simple_colored_mesh.ply")
        );
    }

    #[test]
    fn test_bad_batch_size() {
        let sphere = Sphere::new(Vector3::zeros(), 0.5);
        let red = ConstantColor([1.0, 0.0, 0.0]);
        let settings = PipelineSettings {
            batch_size: 0,
            resolution: 8,
            ..Default::default()
        };
        let mut p = Pipeline::new(&sphere, &red, settings);
        assert!(matches!(p.step(), Err(Error::InvalidBatchSize)));
        assert_eq!(p.state(), State::Initialized);
    }

    #[test]
    fn test_step_in_memory() {
        let sphere = Sphere::new(Vector3::zeros(), 0.5);
        let red = ConstantColor([1.0, 0.0, 0.0]);
        let settings = PipelineSettings {
            resolution: 8,
            threads: None,
            ..Default::default()
        };
        let mut p = Pipeline::new(&sphere, &red, settings);
        assert_eq!(p.step().unwrap(), State::GeometryExtracted);
        let n = p.mesh().unwrap().vertices.len();
        assert!(n > 0);
        assert!(p.mesh().unwrap().colors.is_empty());

        assert_eq!(p.step().unwrap(), State::Colorized);
        let mesh = p.mesh().unwrap();
        assert_eq!(mesh.colors, vec![[255, 0, 0]; n]);
    }
}

use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::time::Instant;

use anyhow::{Result, bail};
use clap::{Parser, ValueEnum};
use env_logger::Env;
use log::info;
use nalgebra::Vector3;

use isomesh::{
    ThreadPool,
    bounds::BoundingVolume,
    field::{
        Appearance, Field,
        shapes::{Cuboid, NormalColor, Sphere, Torus},
    },
    mesh::PlyFormat,
    pipeline::{Outcome, Pipeline, PipelineSettings, State},
};

/// Extracts a colored mesh from an implicit surface
#[derive(Parser)]
#[clap(author, version, about, long_about = None)]
struct Args {
    /// Directory in which `colored_meshes/` is written
    #[clap(short, long, default_value = ".")]
    out: PathBuf,

    /// Trained checkpoint to mesh
    #[cfg(feature = "mlp")]
    #[clap(short, long, conflicts_with = "shape")]
    checkpoint: Option<PathBuf>,

    /// Built-in shape to mesh, shaded by its normals
    #[clap(short, long, value_enum, default_value_t = Shape::Sphere)]
    shape: Shape,

    /// Number of lattice points along each axis
    #[clap(
        short,
        long,
        default_value_t = 512,
        value_parser = clap::value_parser!(u32).range(2..)
    )]
    resolution: u32,

    /// Isovalue at which the surface is extracted
    #[clap(long, default_value_t = 0.0, allow_negative_numbers = true)]
    threshold: f32,

    /// Number of vertices to colorize at once
    #[clap(short, long, default_value_t = NonZeroUsize::new(1000).unwrap())]
    batch_size: NonZeroUsize,

    /// Number of threads to use (defaults to the global pool)
    #[clap(short, long)]
    threads: Option<NonZeroUsize>,

    /// Lower corner of the bounding volume, as `x,y,z`
    #[clap(long, value_parser = parse_vec3, allow_negative_numbers = true)]
    min: Option<Vector3<f32>>,

    /// Upper corner of the bounding volume, as `x,y,z`
    #[clap(long, value_parser = parse_vec3, allow_negative_numbers = true)]
    max: Option<Vector3<f32>>,

    /// View direction passed to the appearance function, as `x,y,z`
    #[clap(long, value_parser = parse_vec3, allow_negative_numbers = true)]
    view_dir: Option<Vector3<f32>>,

    /// Normalize gradients before using them as normals
    #[clap(long)]
    normalize_normals: bool,

    /// Write text PLY files instead of binary
    #[clap(long)]
    ascii: bool,

    /// Also write the uncolored geometry as a binary `.stl` file
    #[clap(long)]
    stl: Option<PathBuf>,
}

#[derive(ValueEnum, Copy, Clone, Debug)]
enum Shape {
    Sphere,
    Torus,
    Cube,
}

fn parse_vec3(s: &str) -> Result<Vector3<f32>, String> {
    let v = s
        .split(',')
        .map(|c| c.trim().parse::<f32>())
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| format!("invalid coordinate in {s:?}: {e}"))?;
    match v.as_slice() {
        &[x, y, z] => Ok(Vector3::new(x, y, z)),
        _ => Err(format!("expected 3 comma-separated values, got {s:?}")),
    }
}

////////////////////////////////////////////////////////////////////////////////

fn run<F: Field, A: Appearance>(
    field: &F,
    appearance: &A,
    settings: PipelineSettings,
    stl: Option<PathBuf>,
) -> Result<Outcome> {
    let start = Instant::now();
    let mut pipeline = Pipeline::new(field, appearance, settings);
    if pipeline.step()? == State::GeometryExtracted {
        info!("Extracted geometry in {:?}", start.elapsed());
        if let (Some(path), Some(mesh)) = (stl, pipeline.mesh()) {
            info!("Writing STL to {path:?}");
            mesh.write_stl(&mut std::fs::File::create(path)?)?;
        }
    }
    let out = pipeline.run()?;
    info!("Finished in {:?}", start.elapsed());
    Ok(out)
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info"))
        .init();
    let args = Args::parse();

    let pool;
    let threads = match args.threads {
        Some(n) if n.get() == 1 => None,
        Some(n) => {
            pool = ThreadPool::Custom(
                rayon::ThreadPoolBuilder::new()
                    .num_threads(n.get())
                    .build()?,
            );
            Some(&pool)
        }
        None => Some(&ThreadPool::Global),
    };

    #[cfg(feature = "mlp")]
    let checkpoint = match &args.checkpoint {
        Some(path) => {
            let now = Instant::now();
            let c = isomesh::field::mlp::Checkpoint::from_file(path)?;
            info!("Loaded checkpoint in {:?}", now.elapsed());
            Some(c)
        }
        None => None,
    };
    #[cfg(feature = "mlp")]
    let default_bounds = checkpoint.as_ref().and_then(|c| c.bounds);
    #[cfg(not(feature = "mlp"))]
    let default_bounds: Option<BoundingVolume> = None;

    let bounds = match (args.min, args.max) {
        (Some(min), Some(max)) => BoundingVolume::new(min, max)?,
        (None, None) => default_bounds.unwrap_or_default(),
        _ => bail!("--min and --max must be given together"),
    };

    let settings = PipelineSettings {
        out_dir: args.out,
        bounds,
        resolution: args.resolution as usize,
        threshold: args.threshold,
        batch_size: args.batch_size.get(),
        view_dir: args.view_dir.unwrap_or_else(Vector3::zeros),
        normalize_normals: args.normalize_normals,
        format: if args.ascii {
            PlyFormat::Ascii
        } else {
            PlyFormat::BinaryLittleEndian
        },
        threads,
        ..Default::default()
    };
    info!(
        "Meshing over {:?} to {:?} ({} output)",
        bounds.min(),
        bounds.max(),
        settings.format
    );

    #[cfg(feature = "mlp")]
    if let Some(c) = &checkpoint {
        return report(run(&c.sdf, &c.color, settings, args.stl)?);
    }

    let center = Vector3::zeros();
    let out = match args.shape {
        Shape::Sphere => {
            let sphere = Sphere::new(center, 0.5);
            run(&sphere, &NormalColor, settings, args.stl)?
        }
        Shape::Torus => {
            let torus = Torus::new(center, 0.5, 0.2);
            run(&torus, &NormalColor, settings, args.stl)?
        }
        Shape::Cube => {
            let cube = Cuboid::new(Vector3::repeat(-0.5), Vector3::repeat(0.5));
            run(&cube, &NormalColor, settings, args.stl)?
        }
    };
    report(out)
}

fn report(out: Outcome) -> Result<()> {
    match out {
        Outcome::Exported {
            colored,
            debug,
            vertices,
            triangles,
        } => {
            info!("Wrote {vertices} vertices and {triangles} triangles");
            info!("Colored mesh: {colored:?}");
            info!("Debug mesh: {debug:?}");
        }
        Outcome::EmptyGeometry => {
            info!("No surface found in the bounding volume; nothing written")
        }
    }
    Ok(())
}

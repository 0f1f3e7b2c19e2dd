//! Colored triangle meshes from implicit surfaces.
//!
//! `isomesh` turns a scalar field (negative inside, positive outside, zero on
//! the surface) and a paired appearance function into a triangle mesh with
//! per-vertex RGB colors:
//!
//! - The field is sampled on a regular lattice and triangulated with marching
//!   cubes ([`mesh::extract`])
//! - Each vertex is colored by evaluating the appearance function with the
//!   field's exact gradient as the surface normal, in fixed-size batches
//!   ([`color::colorize`])
//! - The colored mesh, plus a debug copy with a single fixed color, is written
//!   out as PLY ([`mesh::export`], [`mesh::export_debug`])
//!
//! The [`pipeline`] module drives all three stages in sequence.
//!
//! ```
//! use isomesh::{
//!     bounds::BoundingVolume,
//!     color::{ColorSettings, NoopObserver, colorize},
//!     field::shapes::{ConstantColor, Sphere},
//!     mesh::{Settings, extract},
//! };
//! use nalgebra::Vector3;
//!
//! let sphere = Sphere::new(Vector3::zeros(), 0.5);
//! let settings = Settings {
//!     resolution: 16,
//!     ..Default::default()
//! };
//! let mut mesh = extract(&sphere, &BoundingVolume::default(), &settings)?;
//! assert!(!mesh.triangles.is_empty());
//!
//! let red = ConstantColor([1.0, 0.0, 0.0]);
//! mesh.colors = colorize(
//!     &mesh.vertices,
//!     &sphere,
//!     &red,
//!     &ColorSettings::default(),
//!     &NoopObserver,
//! )?;
//! assert!(mesh.colors.iter().all(|c| *c == [255, 0, 0]));
//! # Ok::<(), isomesh::Error>(())
//! ```
//!
//! # Feature flags
#![doc = document_features::document_features!()]
#![warn(missing_docs)]

mod config;
mod error;

pub mod bounds;
pub mod color;
pub mod field;
pub mod mesh;
pub mod pipeline;
pub mod types;

pub use config::{CancelToken, ThreadPool};
pub use error::Error;

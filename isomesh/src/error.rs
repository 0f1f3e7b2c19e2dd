//! Module containing the universal error type
use thiserror::Error;

/// Universal error type for `isomesh`
#[derive(Error, Debug)]
pub enum Error {
    /// Grid resolution is too small to contain a single cell
    #[error("resolution must be at least 2 (got {0})")]
    InvalidResolution(usize),

    /// Batch size must be non-zero
    #[error("batch size must be non-zero")]
    InvalidBatchSize,

    /// Bounding volume is empty, inverted, or not finite on some axis
    #[error("degenerate bounding volume on axis {axis}: [{min}, {max}]")]
    DegenerateBounds {
        /// Axis index (0-2)
        axis: usize,
        /// Lower bound on that axis
        min: f32,
        /// Upper bound on that axis
        max: f32,
    },

    /// Position is outside of the field's valid domain
    #[error("position ({0}, {1}, {2}) is outside of the field's domain")]
    OutOfDomain(f32, f32, f32),

    /// Field returned a NaN or infinite value
    #[error("field evaluated to {value} at ({x}, {y}, {z})")]
    NonFiniteField {
        /// Value returned by the field
        value: f32,
        /// X position
        x: f32,
        /// Y position
        y: f32,
        /// Z position
        z: f32,
    },

    /// Function output or model layer has an unexpected dimension
    #[error("{what} has dimension {actual}, expected {expected}")]
    ShapeMismatch {
        /// Description of the mismatched value
        what: &'static str,
        /// Expected dimension
        expected: usize,
        /// Actual dimension
        actual: usize,
    },

    /// Mesh colors do not line up with mesh vertices
    #[error("mesh has {colors} colors for {vertices} vertices")]
    ColorCountMismatch {
        /// Number of colors
        colors: usize,
        /// Number of vertices
        vertices: usize,
    },

    /// Triangle refers to a vertex that does not exist
    #[error("triangle index {index} is out of range ({count} vertices)")]
    BadIndex {
        /// Offending index
        index: usize,
        /// Number of vertices in the mesh
        count: usize,
    },

    /// Malformed PLY file
    #[error("bad PLY file: {0}")]
    BadPly(String),

    /// Operation was cancelled through a [`CancelToken`](crate::CancelToken)
    #[error("operation was cancelled")]
    Cancelled,

    /// IO error; see inner code for details
    #[error("io error: {0}")]
    IoError(#[from] std::io::Error),

    /// Checkpoint (de)serialization error; see inner code for details
    #[cfg(feature = "mlp")]
    #[error("checkpoint error: {0}")]
    CheckpointError(#[from] bincode::Error),
}

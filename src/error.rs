use thiserror::Error;

use crate::Idx3d;

/// Failures of the volumetric core. All of them are deterministic input
/// validation failures and are never retried.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    #[error("Invalid class range table: {reason}")]
    InvalidRangeTable { reason: String },

    #[error("Rotation matrix is not invertible (determinant {determinant})")]
    SingularTransform { determinant: f64 },

    #[error("Shape mismatch for {input}: expected {expected:?}, found {found:?}")]
    ShapeMismatch {
        input: String,
        expected: Idx3d,
        found: Idx3d,
    },

    #[error("Index {index} is out of bounds for axis {axis} with extent {extent}")]
    IndexOutOfBounds {
        axis: usize,
        index: usize,
        extent: usize,
    },

    #[error("Axes {permutation:?} are not a permutation of 0, 1 and 2")]
    InvalidPermutation { permutation: [usize; 3] },

    #[error("Invalid scale factor {factor:?}")]
    InvalidScaleFactor { factor: [f64; 3] },

    #[error("Overlay code {code} is below the reserved minimum {minimum}")]
    InvalidOverlayCode { code: u8, minimum: u8 },

    #[error("Class code {code} collides with {reason}")]
    CodeCollision { code: u8, reason: String },

    #[error("Malformed run-length stream at token {position}: {reason}")]
    MalformedRleStream { position: usize, reason: String },
}

pub type Result<T> = std::result::Result<T, Error>;

//! Error type for chunked sparse matrix operations

use chunksparse_core::{CoreError, DataType};
use thiserror::Error;

/// Errors raised by the slice engine, append, and the storage backends
///
/// The selector and canonical-form kinds are decided before any storage
/// read; storage failures are passed through unchanged.
#[derive(Error, Debug)]
pub enum Error {
    #[error("index {index} is out of bounds for axis of length {bound}")]
    OutOfBounds { index: usize, bound: usize },

    #[error("range step {0} is not supported, only unit steps are")]
    UnsupportedStep(usize),

    #[error("range {start}..{stop} selects nothing")]
    EmptyRange { start: usize, stop: usize },

    #[error("not supported: {0}")]
    NotSupported(&'static str),

    #[error("minor dimension mismatch: expected {expected}, found {found}")]
    ShapeMismatch { expected: usize, found: usize },

    #[error("matrix is not in canonical form: {0}")]
    NotCanonical(&'static str),

    #[error("invalid array buffer: {0}")]
    InvalidArray(&'static str),

    /// Append on a matrix that has been sealed
    #[error("matrix is frozen, append is not permitted")]
    Frozen,

    /// Append on a backend that cannot grow
    #[error("array is read-only")]
    ReadOnly,

    #[error("stored element type {stored} does not match requested type {requested}")]
    DataTypeMismatch { stored: DataType, requested: DataType },

    /// A backend broke its own invariants
    #[error("storage error: {0}")]
    Storage(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[cfg(feature = "serde")]
    #[error(transparent)]
    Metadata(#[from] serde_json::Error),

    #[cfg(feature = "http")]
    #[error(transparent)]
    Http(#[from] reqwest::Error),
}

impl From<CoreError> for Error {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::OutOfBounds { index, bound } => Error::OutOfBounds { index, bound },
            CoreError::UnsupportedStep(step) => Error::UnsupportedStep(step),
            CoreError::EmptyRange { start, stop } => Error::EmptyRange { start, stop },
            CoreError::NotSupported(what) => Error::NotSupported(what),
            CoreError::ShapeMismatch { expected, found } => Error::ShapeMismatch { expected, found },
            CoreError::NotCanonical(why) => Error::NotCanonical(why),
            CoreError::InvalidArray(why) => Error::InvalidArray(why),
        }
    }
}

/// Result type for chunksparse operations
pub type Result<T> = std::result::Result<T, Error>;

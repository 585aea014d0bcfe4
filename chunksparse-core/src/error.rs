//! Error types for selector validation and canonical-form checks

/// Errors that can be decided without touching storage
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoreError {
    /// An integer or list position lies outside its axis
    OutOfBounds { index: usize, bound: usize },
    /// A range selector with a step other than 1
    UnsupportedStep(usize),
    /// A range whose start is not below its stop
    EmptyRange { start: usize, stop: usize },
    /// A selector combination the engine does not implement
    NotSupported(&'static str),
    /// Minor dimensions differ between append target and source
    ShapeMismatch { expected: usize, found: usize },
    /// A triple violates the compressed-format invariants
    NotCanonical(&'static str),
    /// A stored byte buffer cannot be read as an array of the element type
    InvalidArray(&'static str),
}

impl core::fmt::Display for CoreError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            CoreError::OutOfBounds { index, bound } => {
                write!(f, "index {index} is out of bounds for axis of length {bound}")
            }
            CoreError::UnsupportedStep(step) => {
                write!(f, "range step {step} is not supported, only unit steps are")
            }
            CoreError::EmptyRange { start, stop } => {
                write!(f, "range {start}..{stop} selects nothing")
            }
            CoreError::NotSupported(what) => write!(f, "not supported: {what}"),
            CoreError::ShapeMismatch { expected, found } => {
                write!(f, "minor dimension mismatch: expected {expected}, found {found}")
            }
            CoreError::NotCanonical(why) => write!(f, "matrix is not in canonical form: {why}"),
            CoreError::InvalidArray(why) => write!(f, "invalid array buffer: {why}"),
        }
    }
}

/// Result type for core operations
pub type Result<T> = core::result::Result<T, CoreError>;

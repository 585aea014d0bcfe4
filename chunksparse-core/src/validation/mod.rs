//! Validation utilities for compressed matrices
//!
//! Pure functions over in-memory slices with no I/O dependencies.

pub mod bounds;
pub mod canonical;

pub use bounds::{validate_alignment, validate_array_bounds, validate_typed_slice};
pub use canonical::{check_canonical, check_pointer_array, check_segment};

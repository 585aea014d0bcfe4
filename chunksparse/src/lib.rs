//! chunksparse - indexing over chunked compressed sparse matrices
//!
//! This library stores CSR and CSC matrices as three chunked arrays (values,
//! minor indices, major pointers) and serves NumPy-style indexing on them
//! while reading as little of the arrays as the selection allows.
//!
//! ## Architecture
//!
//! - **chunksparse-core**: format tags, selectors, the access-pattern
//!   dispatch table and canonical-form validation (no I/O)
//! - **chunksparse**: the chunked array backends, the matrix type and the
//!   lookup/slice engine
//!
//! ## Quick Start
//!
//! ```rust
//! use chunksparse::{AxisIndex, ChunkConfig, CompressedMatrix, MatrixFormat, Shape};
//!
//! fn example() -> chunksparse::Result<()> {
//!     let matrix = CompressedMatrix::from_parts(
//!         Shape::new(2, 3),
//!         MatrixFormat::Csr,
//!         vec![1.0f64, 2.0, 3.0],
//!         vec![0, 2, 1],
//!         vec![0, 2, 3],
//!         ChunkConfig::default(),
//!     )?;
//!
//!     assert_eq!(matrix.lookup(0, 2)?, 2.0);
//!
//!     let column = matrix.slice(.., 1)?;
//!     assert_eq!(column.to_dense()?, vec![0.0, 3.0]);
//!
//!     let picked = matrix.slice(vec![1, 0], AxisIndex::full())?;
//!     assert_eq!(picked.to_dense()?, vec![0.0, 3.0, 0.0, 1.0, 0.0, 2.0]);
//!     Ok(())
//! }
//! # example().unwrap();
//! ```
//!
//! ## Features
//!
//! - **mmap**: arrays backed by memory-mapped files, appendable in place
//! - **http**: read-only arrays fetched with HTTP range requests
//! - **serde**: serializable configuration and saved-matrix metadata

pub use chunksparse_core::{
    // Format definitions
    DataType, MatrixFormat, MatrixMetadata, Shape,
    // Element trait
    MatrixElement,
    // Index expressions and dispatch
    AccessPattern, AxisIndex, MajorSelection, Selector,
    // Core errors
    CoreError,
};

pub mod chunked_backend;
pub mod error;
#[cfg(feature = "http")]
pub mod http_backend;
pub mod matrix;
#[cfg(feature = "mmap")]
pub mod mmap_backend;
#[cfg(feature = "serde")]
pub mod persist;
mod slicing;

pub use chunked_backend::{ArrayRef, ChunkConfig, ChunkedArray, ChunkedVec, ReadCounts, ReadStats};
pub use error::{Error, Result};
pub use matrix::{Canonical, CompressedMatrix, MatrixState, Selection};

#[cfg(feature = "http")]
pub use http_backend::HttpArray;
#[cfg(feature = "mmap")]
pub use mmap_backend::MmapArray;

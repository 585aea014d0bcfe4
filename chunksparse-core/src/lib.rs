#![no_std]

//! chunksparse-core - format definitions for chunked compressed sparse matrices
//!
//! This crate holds everything about compressed sparse matrices that can be
//! decided without touching storage: format tags and axis mapping, the
//! element trait, index expressions and their normalization, the
//! access-pattern dispatch table, and canonical-form validation.

extern crate alloc;

pub mod dispatch;
pub mod error;
pub mod format;
pub mod selector;
pub mod traits;
pub mod validation;

pub use dispatch::{classify, AccessPattern, MajorSelection};
pub use error::*;
pub use format::*;
pub use selector::{normalize, AxisIndex, Selector};
pub use traits::*;
pub use validation::{check_canonical, check_pointer_array};

//! Element trait for values stored in compressed matrices

pub mod element;

pub use element::MatrixElement;

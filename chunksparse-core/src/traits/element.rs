//! Matrix element type constraints
//!
//! This module defines the trait that constrains what types can be
//! stored in the values array of a compressed matrix.

use crate::format::DataType;

/// Trait for types that can be stored as matrix elements
///
/// Elements must be plain old data so that chunked backends can move
/// them to and from raw byte buffers without copying field by field.
/// The additive identity is what a lookup returns for positions that
/// are not stored.
pub trait MatrixElement:
    bytemuck::Pod + PartialEq + PartialOrd + core::fmt::Debug + Send + Sync + 'static
{
    /// Get the DataType tag for this element type
    fn data_type() -> DataType;

    /// The implicit value of every position that is not stored
    fn zero() -> Self;

    /// Get the size in bytes of this element type
    fn size_bytes() -> usize {
        core::mem::size_of::<Self>()
    }
}

macro_rules! impl_matrix_element {
    ($type:ty, $tag:ident, $zero:expr) => {
        impl MatrixElement for $type {
            fn data_type() -> DataType {
                DataType::$tag
            }

            fn zero() -> Self {
                $zero
            }
        }
    };
}

impl_matrix_element!(f32, F32, 0.0);
impl_matrix_element!(f64, F64, 0.0);
impl_matrix_element!(i32, I32, 0);
impl_matrix_element!(i64, I64, 0);
impl_matrix_element!(u32, U32, 0);
impl_matrix_element!(u64, U64, 0);

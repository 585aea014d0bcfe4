//! Array bounds and alignment validation for raw element buffers
//!
//! Used before reinterpreting stored bytes as a typed array.

use crate::CoreError;

/// Validate that a byte length holds a whole number of `T`
///
/// Returns the element count.
pub const fn validate_array_bounds<T>(byte_len: usize) -> Result<usize, CoreError> {
    let element_size = core::mem::size_of::<T>();

    if element_size == 0 {
        return Err(CoreError::InvalidArray("zero-sized element type"));
    }

    if byte_len % element_size != 0 {
        return Err(CoreError::InvalidArray(
            "byte length is not a multiple of the element size",
        ));
    }

    Ok(byte_len / element_size)
}

/// Validate alignment for a pointer to typed data
pub fn validate_alignment<T>(ptr: *const u8) -> Result<(), CoreError> {
    let alignment = core::mem::align_of::<T>();
    if (ptr as usize) % alignment != 0 {
        return Err(CoreError::InvalidArray("buffer is not aligned for the element type"));
    }
    Ok(())
}

/// Combined length and alignment check for a byte slice
pub fn validate_typed_slice<T>(data: &[u8]) -> Result<usize, CoreError> {
    validate_alignment::<T>(data.as_ptr())?;
    validate_array_bounds::<T>(data.len())
}

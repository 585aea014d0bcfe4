//! Canonical-form checks for compressed triples
//!
//! A triple is canonical when the pointer array starts at zero, never
//! decreases, ends at nnz, and every segment of minor indices is strictly
//! increasing and bounded by the minor dimension.

use crate::CoreError;

/// Check the pointer array alone against the major dimension and nnz
pub fn check_pointer_array(indptr: &[u64], major_dim: usize, nnz: usize) -> Result<(), CoreError> {
    if indptr.len() != major_dim + 1 {
        return Err(CoreError::NotCanonical(
            "pointer array length must be major dimension + 1",
        ));
    }
    if indptr[0] != 0 {
        return Err(CoreError::NotCanonical("pointer array must start at zero"));
    }
    if indptr[major_dim] as usize != nnz {
        return Err(CoreError::NotCanonical("last pointer must equal nnz"));
    }
    if indptr.windows(2).any(|w| w[0] > w[1]) {
        return Err(CoreError::NotCanonical("pointer array must be non-decreasing"));
    }
    Ok(())
}

/// Check one segment of minor indices
pub fn check_segment(indices: &[u64], minor_dim: usize) -> Result<(), CoreError> {
    if indices.windows(2).any(|w| w[0] >= w[1]) {
        return Err(CoreError::NotCanonical(
            "minor indices must be strictly increasing within a segment",
        ));
    }
    if let Some(&last) = indices.last() {
        if last as usize >= minor_dim {
            return Err(CoreError::NotCanonical("minor index exceeds the minor dimension"));
        }
    }
    Ok(())
}

/// Check a full in-memory triple
pub fn check_canonical(
    values_len: usize,
    indices: &[u64],
    indptr: &[u64],
    major_dim: usize,
    minor_dim: usize,
) -> Result<(), CoreError> {
    if values_len != indices.len() {
        return Err(CoreError::NotCanonical(
            "values and minor indices differ in length",
        ));
    }
    check_pointer_array(indptr, major_dim, indices.len())?;

    for w in indptr.windows(2) {
        check_segment(&indices[w[0] as usize..w[1] as usize], minor_dim)?;
    }
    Ok(())
}

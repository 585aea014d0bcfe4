//! Compressed sparse matrix over chunked arrays
//!
//! A [`CompressedMatrix`] is the triple (values, minor indices, major
//! pointers) plus shape and layout. Indexing and transposition never
//! mutate their operand; `append` is the only mutation and requires the
//! matrix to still be [`MatrixState::Growing`].

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chunksparse_core::{
    check_canonical, check_pointer_array, classify, normalize, validation::check_segment,
    AccessPattern, AxisIndex, DataType, MajorSelection, MatrixElement, MatrixFormat, Shape,
};
use log::{debug, info, warn};

use crate::chunked_backend::{ArrayRef, ChunkConfig, ChunkedVec};
use crate::slicing::{self, Assembled, Outcome};
use crate::{Error, Result};

/// Whether a matrix still accepts appends
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatrixState {
    /// Append permitted
    Growing,
    /// Sealed by the owner or handed to persistence
    Frozen,
}

/// How much to trust arrays supplied to [`CompressedMatrix::from_arrays`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Canonical {
    /// Read the arrays and verify sortedness and bounds
    Check,
    /// Only check lengths; the source is known to be canonical
    Trusted,
}

/// Result of an indexing call
#[derive(Debug)]
pub enum Selection<T: MatrixElement> {
    Scalar(T),
    Matrix(CompressedMatrix<T>),
}

impl<T: MatrixElement> Selection<T> {
    pub fn into_scalar(self) -> Option<T> {
        match self {
            Selection::Scalar(value) => Some(value),
            Selection::Matrix(_) => None,
        }
    }

    pub fn into_matrix(self) -> Option<CompressedMatrix<T>> {
        match self {
            Selection::Scalar(_) => None,
            Selection::Matrix(matrix) => Some(matrix),
        }
    }
}

/// Sparse matrix in compressed row or column layout
pub struct CompressedMatrix<T: MatrixElement> {
    shape: Shape,
    format: MatrixFormat,
    values: ArrayRef<T>,
    indices: ArrayRef<u64>,
    indptr: ArrayRef<u64>,
    config: ChunkConfig,
    state: MatrixState,
    // saved directory whose meta.json tracks appends
    backing_dir: Option<PathBuf>,
}

impl<T: MatrixElement> std::fmt::Debug for CompressedMatrix<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompressedMatrix")
            .field("shape", &self.shape)
            .field("format", &self.format)
            .field("nnz", &self.nnz())
            .field("state", &self.state)
            .finish()
    }
}

impl<T: MatrixElement> std::fmt::Display for CompressedMatrix<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "<{} {} matrix of {}, {} stored>",
            self.format,
            self.shape,
            T::data_type(),
            self.nnz()
        )
    }
}

impl<T: MatrixElement> CompressedMatrix<T> {
    /// Build a matrix from an in-memory triple, checking canonical form
    pub fn from_parts(
        shape: Shape,
        format: MatrixFormat,
        values: Vec<T>,
        indices: Vec<u64>,
        indptr: Vec<u64>,
        config: ChunkConfig,
    ) -> Result<Self> {
        check_canonical(
            values.len(),
            &indices,
            &indptr,
            shape.major(format),
            shape.minor(format),
        )?;

        let chunk_size = config.chunk_size();
        Ok(Self {
            shape,
            format,
            values: Arc::new(ChunkedVec::from_slice(&values, chunk_size)),
            indices: Arc::new(ChunkedVec::from_slice(&indices, chunk_size)),
            indptr: Arc::new(ChunkedVec::from_slice(&indptr, chunk_size)),
            config,
            state: MatrixState::Growing,
            backing_dir: None,
        })
    }

    /// Build a matrix over already-stored arrays
    ///
    /// Lengths are always checked. With [`Canonical::Check`] the pointer
    /// array and every segment are read and validated as well.
    pub fn from_arrays(
        shape: Shape,
        format: MatrixFormat,
        values: ArrayRef<T>,
        indices: ArrayRef<u64>,
        indptr: ArrayRef<u64>,
        config: ChunkConfig,
        canonical: Canonical,
    ) -> Result<Self> {
        let matrix = Self {
            shape,
            format,
            values,
            indices,
            indptr,
            config,
            state: MatrixState::Growing,
            backing_dir: None,
        };

        if matrix.indptr.len() != matrix.major_dim() + 1 {
            return Err(Error::NotCanonical(
                "pointer array length must be major dimension + 1",
            ));
        }
        if matrix.values.len() != matrix.indices.len() {
            return Err(Error::NotCanonical(
                "values and minor indices differ in length",
            ));
        }
        if canonical == Canonical::Check {
            matrix.validate_stored()?;
        }
        Ok(matrix)
    }

    /// Wrap engine output in fresh in-memory storage
    fn derived(&self, assembled: Assembled<T>) -> Self {
        let chunk_size = self.config.chunk_size();
        Self {
            shape: Shape::from_major_minor(self.format, assembled.major_dim, assembled.minor_dim),
            format: self.format,
            values: Arc::new(ChunkedVec::from_slice(&assembled.values, chunk_size)),
            indices: Arc::new(ChunkedVec::from_slice(&assembled.indices, chunk_size)),
            indptr: Arc::new(ChunkedVec::from_slice(&assembled.indptr, chunk_size)),
            config: self.config.clone(),
            state: MatrixState::Growing,
            backing_dir: None,
        }
    }

    fn validate_stored(&self) -> Result<()> {
        let nnz = self.values.len();
        let indptr = self.indptr.range_read(0, self.major_dim() + 1)?;
        check_pointer_array(&indptr, self.major_dim(), nnz)?;

        let bounds: Vec<(usize, usize)> = indptr
            .windows(2)
            .map(|w| (w[0] as usize, w[1] as usize))
            .collect();
        slicing::scan_consecutive(self, &bounds, |_, _, segment| {
            check_segment(segment, self.minor_dim())?;
            Ok(())
        })
    }

    pub fn shape(&self) -> Shape {
        self.shape
    }

    pub fn format(&self) -> MatrixFormat {
        self.format
    }

    pub fn major_dim(&self) -> usize {
        self.shape.major(self.format)
    }

    pub fn minor_dim(&self) -> usize {
        self.shape.minor(self.format)
    }

    pub fn data_type(&self) -> DataType {
        T::data_type()
    }

    pub fn state(&self) -> MatrixState {
        self.state
    }

    pub fn config(&self) -> &ChunkConfig {
        &self.config
    }

    pub fn values(&self) -> &ArrayRef<T> {
        &self.values
    }

    pub fn indices(&self) -> &ArrayRef<u64> {
        &self.indices
    }

    pub fn indptr(&self) -> &ArrayRef<u64> {
        &self.indptr
    }

    /// Directory this matrix was loaded from, if its metadata follows appends
    pub fn backing_dir(&self) -> Option<&Path> {
        self.backing_dir.as_deref()
    }

    pub(crate) fn set_backing_dir(&mut self, dir: PathBuf) {
        self.backing_dir = Some(dir);
    }

    /// Number of stored elements
    ///
    /// A stale view counts only the elements its own segments cover. If
    /// that pointer cannot be read the shared array length is reported.
    pub fn nnz(&self) -> usize {
        if !self.is_stale() {
            return self.values.len();
        }
        slicing::read_one(&*self.indptr, self.major_dim())
            .map(|end| end as usize)
            .unwrap_or_else(|_| self.values.len())
    }

    /// Fraction of cells that are stored
    pub fn density(&self) -> f64 {
        match self.shape.size() {
            0 => 0.0,
            size => self.nnz() as f64 / size as f64,
        }
    }

    /// Uncompressed bytes across the three arrays
    pub fn nbytes(&self) -> usize {
        self.values.nbytes() + self.indices.nbytes() + self.indptr.nbytes()
    }

    /// Bytes held by the backing stores
    pub fn nbytes_stored(&self) -> usize {
        self.values.nbytes_stored() + self.indices.nbytes_stored() + self.indptr.nbytes_stored()
    }

    pub fn nchunks(&self) -> usize {
        self.values.nchunks() + self.indices.nchunks() + self.indptr.nchunks()
    }

    pub fn nchunks_initialized(&self) -> usize {
        self.values.nchunks_initialized()
            + self.indices.nchunks_initialized()
            + self.indptr.nchunks_initialized()
    }

    /// True when the shared storage has grown past this matrix's shape
    ///
    /// Happens to a transposed view after its source is appended to.
    /// Reads through a stale view still see the old, unchanged prefix.
    pub fn is_stale(&self) -> bool {
        self.indptr.len() != self.major_dim() + 1
    }

    /// Index with independent per-axis expressions
    ///
    /// Validation happens before any read. Both axes given as explicit
    /// position lists is rejected with [`Error::NotSupported`].
    pub fn get(&self, row: impl Into<AxisIndex>, col: impl Into<AxisIndex>) -> Result<Selection<T>> {
        let pattern = self.pattern(row.into(), col.into())?;
        match slicing::run(self, &pattern)? {
            Outcome::Scalar(value) => Ok(Selection::Scalar(value)),
            Outcome::Assembled(assembled) => Ok(Selection::Matrix(self.derived(assembled))),
        }
    }

    /// Value at (row, col), zero when the position is not stored
    pub fn lookup(&self, row: usize, col: usize) -> Result<T> {
        match self.pattern(row.into(), col.into())? {
            AccessPattern::Element { major, minor } => slicing::element(self, major, minor),
            _ => Err(Error::NotSupported("lookup takes a single position per axis")),
        }
    }

    /// Like [`get`](Self::get), but a single position comes back as a 1x1 matrix
    pub fn slice(
        &self,
        row: impl Into<AxisIndex>,
        col: impl Into<AxisIndex>,
    ) -> Result<CompressedMatrix<T>> {
        let pattern = match self.pattern(row.into(), col.into())? {
            AccessPattern::Element { major, minor } => AccessPattern::General {
                majors: MajorSelection::Range { start: major, stop: major + 1 },
                start: minor,
                stop: minor + 1,
            },
            pattern => pattern,
        };
        match slicing::run(self, &pattern)? {
            Outcome::Assembled(assembled) => Ok(self.derived(assembled)),
            Outcome::Scalar(_) => Err(Error::NotSupported("scalar result from a slice pattern")),
        }
    }

    fn pattern(&self, row: AxisIndex, col: AxisIndex) -> Result<AccessPattern> {
        let (major, minor) = normalize(self.shape, self.format, row, col)?;
        let pattern = classify(major, minor, self.major_dim(), self.minor_dim())?;
        debug!("{} {} {}: {} access", self.format, self.shape, T::data_type(), pattern.name());
        Ok(pattern)
    }

    /// Extend along the major axis with the segments of `other`
    ///
    /// `other` must share this matrix's layout and minor dimension. Derived
    /// counters are recomputed from the arrays afterwards, so nothing needs
    /// refreshing by hand. A matrix loaded from a directory also rewrites
    /// that directory's `meta.json`.
    ///
    /// If a write fails the three arrays are cut back to their previous
    /// lengths and the matrix is unchanged. If that fails too the matrix is
    /// sealed and [`Error::Storage`] is returned.
    pub fn append(&mut self, other: &CompressedMatrix<T>) -> Result<()> {
        if self.state == MatrixState::Frozen {
            return Err(Error::Frozen);
        }
        if other.format != self.format {
            return Err(Error::NotSupported("append between different layouts"));
        }
        if other.minor_dim() != self.minor_dim() {
            return Err(Error::ShapeMismatch {
                expected: self.minor_dim(),
                found: other.minor_dim(),
            });
        }
        if !(self.values.can_append() && self.indices.can_append() && self.indptr.can_append()) {
            return Err(Error::ReadOnly);
        }

        let other_major = other.major_dim();
        let offset = slicing::read_one(&*self.indptr, self.major_dim())?;
        let other_nnz = slicing::read_one(&*other.indptr, other_major)? as usize;
        let shape = Shape::from_major_minor(
            self.format,
            self.major_dim() + other_major,
            self.minor_dim(),
        );
        let lengths = [self.values.len(), self.indices.len(), self.indptr.len()];

        let written = self
            .extend_from(other, offset, other_nnz)
            .and_then(|_| self.sync_manifest(shape, offset as usize + other_nnz));
        if let Err(err) = written {
            warn!("append of {} segments failed, rolling back: {}", other_major, err);
            self.roll_back(lengths)?;
            return Err(err);
        }

        self.shape = shape;
        info!(
            "appended {} segments ({} elements), shape is now {}",
            other_major, other_nnz, self.shape
        );
        Ok(())
    }

    fn extend_from(
        &self,
        other: &CompressedMatrix<T>,
        offset: u64,
        other_nnz: usize,
    ) -> Result<()> {
        let other_major = other.major_dim();
        let batch = self.config.read_batch_len.max(1);

        // Bounds are fixed up front so appending a view of the same storage is safe
        let mut start = 0;
        while start < other_nnz {
            let stop = (start + batch).min(other_nnz);
            self.values.append(&other.values.range_read(start, stop)?)?;
            self.indices.append(&other.indices.range_read(start, stop)?)?;
            start = stop;
        }

        let mut start = 1;
        while start <= other_major {
            let stop = (start + batch).min(other_major + 1);
            let shifted: Vec<u64> = other
                .indptr
                .range_read(start, stop)?
                .into_iter()
                .map(|p| p + offset)
                .collect();
            self.indptr.append(&shifted)?;
            start = stop;
        }

        Ok(())
    }

    #[cfg(feature = "serde")]
    fn sync_manifest(&self, shape: Shape, nnz: usize) -> Result<()> {
        match &self.backing_dir {
            Some(dir) => {
                let manifest = crate::persist::Manifest {
                    metadata: chunksparse_core::MatrixMetadata::new(shape, T::data_type(), self.format),
                    nnz,
                };
                crate::persist::write_manifest(dir, &manifest)
            }
            None => Ok(()),
        }
    }

    #[cfg(not(feature = "serde"))]
    fn sync_manifest(&self, _shape: Shape, _nnz: usize) -> Result<()> {
        Ok(())
    }

    fn roll_back(&mut self, [values, indices, indptr]: [usize; 3]) -> Result<()> {
        let restored = self
            .values
            .truncate(values)
            .and_then(|_| self.indices.truncate(indices))
            .and_then(|_| self.indptr.truncate(indptr));

        if let Err(err) = restored {
            self.seal();
            return Err(Error::Storage(format!(
                "append failed and could not be undone, matrix sealed: {err}"
            )));
        }
        Ok(())
    }

    /// Swap layout and shape over the same three arrays
    ///
    /// No element is read or moved. The result shares storage with `self`
    /// and is frozen so the shared arrays keep a single writer.
    pub fn transpose(&self) -> CompressedMatrix<T> {
        Self {
            shape: self.shape.transposed(),
            format: self.format.flipped(),
            values: Arc::clone(&self.values),
            indices: Arc::clone(&self.indices),
            indptr: Arc::clone(&self.indptr),
            config: self.config.clone(),
            state: MatrixState::Frozen,
            backing_dir: None,
        }
    }

    /// Forbid further appends
    pub fn seal(&mut self) {
        self.state = MatrixState::Frozen;
    }

    /// Copy the triple into fresh in-memory storage
    pub fn copy_to_memory(&self) -> Result<CompressedMatrix<T>> {
        let assembled = slicing::segment_range(self, 0, self.major_dim())?;
        debug!("copied {} {} into memory", self.format, self.shape);
        Ok(self.derived(assembled))
    }

    /// Row-major dense copy of the matrix, `rows * cols` long
    pub fn to_dense(&self) -> Result<Vec<T>> {
        let assembled = slicing::segment_range(self, 0, self.major_dim())?;
        let mut dense = vec![T::zero(); self.shape.size()];
        let cols = self.shape.cols;

        for (major, w) in assembled.indptr.windows(2).enumerate() {
            for k in w[0] as usize..w[1] as usize {
                let minor = assembled.indices[k] as usize;
                let (row, col) = Shape::to_major_minor(self.format, major, minor);
                dense[row * cols + col] = assembled.values[k];
            }
        }
        Ok(dense)
    }

    /// Same shape, layout and stored triple
    pub fn content_eq(&self, other: &CompressedMatrix<T>) -> Result<bool> {
        if self.shape != other.shape || self.format != other.format {
            return Ok(false);
        }
        let ours = slicing::segment_range(self, 0, self.major_dim())?;
        let theirs = slicing::segment_range(other, 0, other.major_dim())?;
        Ok(ours == theirs)
    }
}
